//! Read planning and block landing, end to end over synthetic subfiles.

mod common;

use std::collections::BTreeMap;

use bp4::core::{Catalog, MemoryCatalog, ShapeKind, VariableEntry};
use bp4::util::{BoxDims, Dims};
use bp4::{DataKind, Deserializer, DeserializerOptions, Error};
use common::*;

/// Subfile contents by index.
type Subfiles = BTreeMap<usize, Vec<u8>>;

fn parse(built: &Built) -> (Deserializer, MemoryCatalog) {
    let mut catalog = MemoryCatalog::new();
    let mut d = Deserializer::new(DeserializerOptions::default().with_threads(2));
    d.parse_metadata(&built.buffer, &mut catalog).unwrap();
    (d, catalog)
}

fn boxed(start: &[usize], count: &[usize]) -> BoxDims {
    BoxDims::new(Dims::from_slice(start), Dims::from_slice(count))
}

/// Plan `name`, fetch each range from `subfiles` and land it in a
/// destination of `dest_len` elements.
fn read_f64(d: &mut Deserializer, catalog: &MemoryCatalog, subfiles: &Subfiles, name: &str, dest_len: usize) -> Vec<f64> {
    d.defer_variable(name);
    let plans = d.perform_gets_variables_subfile_info(catalog).unwrap().clone();
    let mut dest = vec![f64::NAN; dest_len];
    for (subfile, infos) in &plans[name] {
        for info in infos {
            let (lo, hi) = (info.seeks.0 as usize, info.seeks.1 as usize);
            let fetched = &subfiles[subfile][lo..hi];
            d.land_block(catalog, name, info, fetched, bytemuck::cast_slice_mut(&mut dest[..])).unwrap();
        }
    }
    d.take_deferred();
    dest
}

/// 8x8 global array, rows 0..4 in subfile 0 and rows 4..8 in subfile 1,
/// element (r, c) holding `r * 8 + c`.
fn global_grid(big: bool) -> (Built, Subfiles) {
    let built = MetadataBuilder::new(big)
        .process_group(1, false)
        .process_group(1, false)
        .variable(
            "grid",
            TYPE_DOUBLE,
            &[
                BlockSpec::array(1, &[4, 8], &[8, 8], &[0, 0]).at(0, 100),
                BlockSpec::array(1, &[4, 8], &[8, 8], &[4, 0]).at(1, 100),
            ],
        )
        .build();

    let mut subfiles = Subfiles::new();
    for (file, rows) in [(0usize, 0..4), (1, 4..8)] {
        let values: Vec<f64> = rows.flat_map(|r| (0..8).map(move |c| (r * 8 + c) as f64)).collect();
        let mut data = vec![0u8; 100];
        data.extend(encode_f64(&values, big));
        subfiles.insert(file, data);
    }
    (built, subfiles)
}

#[test]
fn test_selection_across_subfiles() {
    init_tracing();
    let (built, subfiles) = global_grid(false);
    let (mut d, mut catalog) = parse(&built);
    catalog
        .inquire_variable_mut("grid")
        .unwrap()
        .set_selection(boxed(&[2, 3], &[4, 2]))
        .unwrap();

    d.defer_variable("grid");
    let plans = d.perform_gets_variables_subfile_info(&catalog).unwrap();
    let plan = &plans["grid"];
    assert_eq!(plan.len(), 2);
    // Rows 2..4, cols 3..5 of block 0: elements 19 ..= 28
    assert_eq!(plan[&0][0].seeks, (100 + 19 * 8, 100 + 29 * 8));
    // Rows 4..6 of block 1: elements 3 ..= 12
    assert_eq!(plan[&1][0].seeks, (100 + 3 * 8, 100 + 13 * 8));
    d.take_deferred();

    let dest = read_f64(&mut d, &catalog, &subfiles, "grid", 8);
    let expected: Vec<f64> = (2..6).flat_map(|r| (3..5).map(move |c| (r * 8 + c) as f64)).collect();
    assert_eq!(dest, expected);
}

#[test]
fn test_big_endian_payload_swapped() {
    let (built, subfiles) = global_grid(true);
    let (mut d, catalog) = parse(&built);
    let dest = read_f64(&mut d, &catalog, &subfiles, "grid", 64);
    let expected: Vec<f64> = (0..64).map(|v| v as f64).collect();
    if cfg!(target_endian = "little") {
        assert!(!d.footer().unwrap().is_host_endian());
    }
    assert_eq!(dest, expected);
}

#[test]
fn test_column_major_file_row_major_host() {
    // File dims [2, 3] column-major; element k of the block is k
    let built = MetadataBuilder::new(false)
        .process_group(1, true)
        .variable("m", TYPE_DOUBLE, &[BlockSpec::array(1, &[2, 3], &[2, 3], &[0, 0])])
        .build();
    let values: Vec<f64> = (0..6).map(|v| v as f64).collect();
    let subfiles = Subfiles::from([(0, encode_f64(&values, false))]);

    let (mut d, catalog) = parse(&built);
    assert!(d.layout().reverse_dimensions);
    let dest = read_f64(&mut d, &catalog, &subfiles, "m", 6);

    // Host sees shape [3, 2]; host (a, b) is file (b, a) at b + 2a
    for a in 0..3 {
        for b in 0..2 {
            assert_eq!(dest[a * 2 + b], (b + 2 * a) as f64);
        }
    }
}

#[cfg(feature = "zlib")]
#[test]
fn test_zlib_block() {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let values: Vec<f64> = (0..16).map(|v| v as f64 * 0.5).collect();
    let raw = encode_f64(&values, false);
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&raw).unwrap();
    let stored = encoder.finish().unwrap();

    let built = MetadataBuilder::new(false)
        .process_group(1, false)
        .variable(
            "z",
            TYPE_DOUBLE,
            &[BlockSpec::array(1, &[16], &[16], &[0]).at(0, 10).transform(TransformSpec {
                type_name: "zlib".into(),
                pre_type: TYPE_DOUBLE,
                pre_count: vec![16],
                pre_size: raw.len() as u64,
                payload_size: stored.len() as u64,
            })],
        )
        .build();
    let mut data = vec![0u8; 10];
    data.extend(&stored);
    let subfiles = Subfiles::from([(0, data)]);

    let (mut d, mut catalog) = parse(&built);
    let ops = &catalog.inquire_variable("z").unwrap().blocks_info(0)[0].operations;
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].pre_size_of, 8);
    assert_eq!(ops[0].payload_offset, 10);

    let plan = d.sync_variable_subfile_info(&catalog, "z").unwrap();
    assert_eq!(plan[&0][0].seeks, (10, 10 + stored.len() as u64));

    assert_eq!(read_f64(&mut d, &catalog, &subfiles, "z", 16), values);

    catalog.inquire_variable_mut("z").unwrap().set_selection(boxed(&[4], &[3])).unwrap();
    assert_eq!(read_f64(&mut d, &catalog, &subfiles, "z", 3), vec![2.0, 2.5, 3.0]);
}

#[test]
fn test_unknown_codec_surfaces() {
    let built = MetadataBuilder::new(false)
        .process_group(1, false)
        .variable(
            "c",
            TYPE_DOUBLE,
            &[BlockSpec::array(1, &[4], &[4], &[0]).transform(TransformSpec {
                type_name: "zfp".into(),
                pre_type: TYPE_DOUBLE,
                pre_count: vec![4],
                pre_size: 32,
                payload_size: 12,
            })],
        )
        .build();
    let (d, catalog) = parse(&built);
    let plan = d.sync_variable_subfile_info(&catalog, "c").unwrap();
    let info = &plan[&0][0];
    assert_eq!(info.len(), 12);

    let mut dest = [0u8; 32];
    let err = d.land_block(&catalog, "c", info, &[0u8; 12], &mut dest).unwrap_err();
    assert!(matches!(err, Error::UnknownCodec(ref t) if t == "zfp"));
}

#[test]
fn test_compound_left_unresolved() {
    let (built, _) = global_grid(false);
    let (mut d, mut catalog) = parse(&built);
    catalog
        .define_variable(VariableEntry::new("particles", "", DataKind::Compound, ShapeKind::LocalArray))
        .unwrap();

    d.defer_variable("particles");
    d.defer_variable("grid");
    let plans = d.perform_gets_variables_subfile_info(&catalog).unwrap();
    assert!(plans["particles"].is_empty());
    assert!(!plans["grid"].is_empty());
    assert!(plans["grid"].values().flatten().all(|info| !info.is_empty()));
    assert_eq!(d.diagnostics().unresolved_compound, 1);

    let mut dest = [0u8; 8];
    let err = d
        .clip_memory(&catalog, "particles", &[0u8; 8], &BoxDims::scalar(), &BoxDims::scalar(), &mut dest)
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedKind { kind: DataKind::Compound, .. }));
}

#[test]
fn test_string_value() {
    let built = MetadataBuilder::new(false)
        .process_group(1, false)
        .variable("label", TYPE_STRING, &[BlockSpec::value(1, Scalar::Str("hello".into())).at(0, 20)])
        .build();
    let (d, catalog) = parse(&built);
    let plan = d.sync_variable_subfile_info(&catalog, "label").unwrap();
    assert_eq!(plan[&0][0].seeks, (20, 27));

    let mut dest = [0u8; 8];
    let err = d
        .clip_memory(&catalog, "label", b"\x05\x00hello", &BoxDims::scalar(), &BoxDims::scalar(), &mut dest)
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedKind { kind: DataKind::String, .. }));
}

#[test]
fn test_clip_memory_whole_block() {
    let (built, subfiles) = global_grid(false);
    let (d, catalog) = parse(&built);
    let block = catalog.inquire_variable("grid").unwrap().blocks_info(0)[1].block_box();
    let src = &subfiles[&1][100..];

    let mut dest = vec![-1.0f64; 64];
    d.clip_memory(&catalog, "grid", src, &block, &block, bytemuck::cast_slice_mut(&mut dest[..])).unwrap();
    assert!(dest[..32].iter().all(|&v| v == -1.0));
    let expected: Vec<f64> = (32..64).map(|v| v as f64).collect();
    assert_eq!(&dest[32..], expected.as_slice());
}

#[test]
fn test_resolution_errors() {
    let (built, _) = global_grid(false);
    let (mut d, mut catalog) = parse(&built);

    d.defer_variable("missing");
    let err = d.perform_gets_variables_subfile_info(&catalog).unwrap_err();
    assert!(matches!(err, Error::VariableNotFound(ref n) if n == "missing"));
    d.take_deferred();

    catalog.inquire_variable_mut("grid").unwrap().set_step_selection(0, 2).unwrap();
    let err = d.sync_variable_subfile_info(&catalog, "grid").unwrap_err();
    assert!(matches!(err, Error::InvalidSelection(_)));
}

#[test]
fn test_block_start_past_address_space() {
    let built = MetadataBuilder::new(false)
        .process_group(1, false)
        .variable("v", TYPE_DOUBLE, &[BlockSpec::array(1, &[4], &[8], &[u64::MAX - 1])])
        .build();
    let (mut d, catalog) = parse(&built);

    let err = d.sync_variable_subfile_info(&catalog, "v").unwrap_err();
    assert!(matches!(err, Error::Format(_)));

    d.defer_variable("v");
    let err = d.perform_gets_variables_subfile_info(&catalog).unwrap_err();
    assert!(matches!(err, Error::Format(_)));
}
