//! Variable and attribute index scans.
//!
//! Both indices are a `[count:u32][length:u64]` preamble followed by
//! element records, each led by its own u32 length word. The scan reads
//! only those length words to find record boundaries; decoding a record
//! never affects where the next one starts. That lets the variable scan
//! hand whole batches of records to a worker pool and insert the results
//! afterwards in index order.

use rayon::prelude::*;

use super::buffer::BufferReader;
use super::diagnostics::ParseDiagnostics;
use super::element::{read_characteristics, read_element_index_header, Characteristics};
use super::footer::Footer;
use super::format::*;
use crate::core::{AttributeEntry, BlockInfo, Catalog, ShapeKind, VariableEntry};
use crate::util::{Error, Result};

/// Byte range `[start, end)` of one element record, length word included.
type RecordSpan = (usize, usize);

/// Cursor over the record boundaries of one index.
struct RecordScanner<'a> {
    reader: BufferReader<'a>,
    pos: usize,
    end: usize,
}

impl<'a> RecordScanner<'a> {
    /// Read the index preamble at `start`.
    fn open(reader: BufferReader<'a>, start: u64, what: &str) -> Result<(Self, u32)> {
        let mut pos = usize::try_from(start)
            .map_err(|_| Error::format(format!("{what} index offset exceeds usize")))?;
        let count = reader.read_u32(&mut pos)?;
        let length = reader.read_usize(&mut pos)?;

        let end = pos
            .checked_add(length)
            .ok_or_else(|| Error::format(format!("{what} index length {length} overflows")))?;
        if end > reader.len() {
            return Err(Error::TruncatedBuffer { position: pos, needed: length, len: reader.len() });
        }
        tracing::debug!(index = what, count, length, "element index preamble");
        Ok((Self { reader, pos, end }, count))
    }

    /// Next record boundary, `None` once the declared length is consumed.
    fn next_record(&mut self) -> Result<Option<RecordSpan>> {
        if self.pos >= self.end {
            return Ok(None);
        }
        let start = self.pos;
        let mut pos = start;
        let length = self.reader.read_u32(&mut pos)? as usize;
        let end = start + ELEMENT_LENGTH_WORD + length;
        if end > self.end {
            return Err(Error::format(format!(
                "element record at {start} ends at {end}, past index end {}",
                self.end
            )));
        }
        self.pos = end;
        Ok(Some((start, end)))
    }

    /// Up to `n` further record boundaries.
    fn next_batch(&mut self, n: usize) -> Result<Vec<RecordSpan>> {
        let mut batch = Vec::with_capacity(n);
        while batch.len() < n {
            match self.next_record()? {
                Some(span) => batch.push(span),
                None => break,
            }
        }
        Ok(batch)
    }
}

/// Decoded variable record, ready for insertion.
struct VariableRecord {
    entry: VariableEntry,
    unknown_characteristics: usize,
}

fn shape_kind(first: Option<&Characteristics>) -> ShapeKind {
    let Some(chars) = first else {
        return ShapeKind::GlobalValue;
    };
    let shape = &chars.shape;
    if shape.is_empty() {
        ShapeKind::GlobalValue
    } else if shape.len() == 1 && shape[0] as u64 == LOCAL_VALUE_DIM {
        ShapeKind::LocalValue
    } else if shape.iter().all(|&d| d == 0) {
        ShapeKind::LocalArray
    } else {
        ShapeKind::GlobalArray
    }
}

fn decode_variable_record(reader: &BufferReader<'_>, (start, end): RecordSpan) -> Result<VariableRecord> {
    let record = reader.limited(end)?;
    let mut pos = start;
    let header = read_element_index_header(&record, &mut pos)?;

    let kind = variable_kind(header.type_code).ok_or_else(|| Error::UnknownElementType {
        type_code: header.type_code,
        name: header.name.clone(),
        offset: start,
    })?;

    let mut sets = Vec::new();
    for _ in 0..header.characteristics_sets_count {
        if pos >= end {
            break;
        }
        let metadata_offset = pos as u64;
        let chars = read_characteristics(&record, &mut pos, kind, &header.name, false)?;
        sets.push((metadata_offset, chars));
    }

    let mut entry = VariableEntry::new(&header.name, &header.path, kind, shape_kind(sets.first().map(|(_, c)| c)));
    let mut unknown_characteristics = 0;
    for (metadata_offset, chars) in sets {
        if chars.unknown_characteristic.is_some() {
            unknown_characteristics += 1;
        }
        entry.add_block(BlockInfo {
            step: chars.time_index.saturating_sub(1) as usize,
            start: chars.start,
            count: chars.count,
            shape: chars.shape,
            value: chars.values.into_iter().next(),
            min: chars.min,
            max: chars.max,
            metadata_offset,
            payload_offset: chars.payload_offset,
            file_index: chars.file_index as usize,
            operations: chars.operations,
        });
    }

    tracing::trace!(
        variable = %entry.name,
        kind = %kind,
        shape = ?entry.shape_kind,
        steps = entry.available_steps_count(),
        "variable record"
    );
    Ok(VariableRecord { entry, unknown_characteristics })
}

/// Insert one decoded record, turning record-local failures into
/// diagnostics.
fn insert_variable_record<C: Catalog>(
    decoded: Result<VariableRecord>,
    offset: usize,
    catalog: &mut C,
    diagnostics: &ParseDiagnostics,
) -> Result<()> {
    let result = decoded.and_then(|record| {
        for _ in 0..record.unknown_characteristics {
            diagnostics.record_unknown_characteristic();
        }
        catalog.define_variable(record.entry).map(|_| ())
    });

    match result {
        Err(e) if e.is_record_local() => {
            diagnostics.record_skip(offset, &e);
            Ok(())
        }
        other => other,
    }
}

/// Scan the variable index into `catalog`.
///
/// With `threads > 1` each pass reads the next `threads` record boundaries
/// and decodes that batch on a pool of `threads` workers. Decoded records
/// are then inserted in index order on the calling thread, so the catalog
/// and diagnostics do not depend on `threads`.
pub fn parse_variables_index<C: Catalog>(
    buffer: &[u8],
    footer: &Footer,
    catalog: &mut C,
    threads: usize,
    diagnostics: &ParseDiagnostics,
) -> Result<usize> {
    let reader = BufferReader::new(buffer, footer.endian);
    let (mut scanner, count) = RecordScanner::open(reader, footer.vars_index_start, "variables")?;
    let mut records = 0usize;

    if threads <= 1 {
        while let Some(span) = scanner.next_record()? {
            insert_variable_record(decode_variable_record(&reader, span), span.0, catalog, diagnostics)?;
            records += 1;
        }
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| Error::other(format!("failed to start index workers: {e}")))?;

        loop {
            let batch = scanner.next_batch(threads)?;
            if batch.is_empty() {
                break;
            }
            let decoded: Vec<Result<VariableRecord>> = pool.install(|| {
                batch
                    .par_iter()
                    .map(|&span| decode_variable_record(&reader, span))
                    .collect()
            });
            for (span, record) in batch.iter().zip(decoded) {
                insert_variable_record(record, span.0, catalog, diagnostics)?;
            }
            records += batch.len();
        }
    }

    if records != count as usize {
        tracing::debug!(declared = count, found = records, "variable index count differs from records scanned");
    }
    tracing::debug!(records, threads, "parsed variables index");
    Ok(records)
}

fn decode_attribute_record(reader: &BufferReader<'_>, (start, end): RecordSpan) -> Result<(AttributeEntry, bool)> {
    let record = reader.limited(end)?;
    let mut pos = start;
    let header = read_element_index_header(&record, &mut pos)?;

    let kind = attribute_kind(header.type_code).ok_or_else(|| Error::UnknownElementType {
        type_code: header.type_code,
        name: header.name.clone(),
        offset: start,
    })?;

    let chars = if header.characteristics_sets_count > 0 && pos < end {
        read_characteristics(&record, &mut pos, kind, &header.name, true)?
    } else {
        Characteristics::default()
    };

    let is_single_value = header.type_code != TYPE_STRING_ARRAY && chars.values.len() == 1;
    tracing::trace!(attribute = %header.name, kind = %kind, values = chars.values.len(), "attribute record");
    let entry = AttributeEntry {
        name: header.name,
        path: header.path,
        kind,
        values: chars.values,
        is_single_value,
    };
    Ok((entry, chars.unknown_characteristic.is_some()))
}

/// Scan the attribute index into `catalog`. Always sequential.
pub fn parse_attributes_index<C: Catalog>(
    buffer: &[u8],
    footer: &Footer,
    catalog: &mut C,
    diagnostics: &ParseDiagnostics,
) -> Result<usize> {
    let reader = BufferReader::new(buffer, footer.endian);
    let (mut scanner, _count) = RecordScanner::open(reader, footer.attrs_index_start, "attributes")?;
    let mut records = 0usize;

    while let Some(span) = scanner.next_record()? {
        let result = decode_attribute_record(&reader, span).and_then(|(entry, unknown)| {
            if unknown {
                diagnostics.record_unknown_characteristic();
            }
            catalog.define_attribute(entry)
        });
        match result {
            Err(e) if e.is_record_local() => diagnostics.record_skip(span.0, &e),
            other => other?,
        }
        records += 1;
    }

    tracing::debug!(records, "parsed attributes index");
    Ok(records)
}
