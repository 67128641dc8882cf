//! Test-only BP4 metadata writer.
//!
//! Produces a buffer laid out as `[padding][PG index][variables index]
//! [attributes index][minifooter]` in either byte order.

#![allow(dead_code)]

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

pub const TYPE_BYTE: i8 = 0;
pub const TYPE_SHORT: i8 = 1;
pub const TYPE_INTEGER: i8 = 2;
pub const TYPE_LONG: i8 = 4;
pub const TYPE_REAL: i8 = 5;
pub const TYPE_DOUBLE: i8 = 6;
pub const TYPE_LONG_DOUBLE: i8 = 7;
pub const TYPE_STRING: i8 = 9;
pub const TYPE_COMPLEX: i8 = 10;
pub const TYPE_DOUBLE_COMPLEX: i8 = 11;
pub const TYPE_STRING_ARRAY: i8 = 12;
pub const TYPE_LONG_DOUBLE_COMPLEX: i8 = 13;
pub const TYPE_UNSIGNED_BYTE: i8 = 50;
pub const TYPE_UNSIGNED_SHORT: i8 = 51;
pub const TYPE_UNSIGNED_INTEGER: i8 = 52;
pub const TYPE_UNSIGNED_LONG: i8 = 54;

pub const LOCAL_VALUE_DIM: u64 = u64::MAX - 2;

/// Install a test subscriber once; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Byte sink in a fixed byte order.
pub struct Writer {
    pub buf: Vec<u8>,
    big: bool,
}

macro_rules! put {
    ($($name:ident => $ty:ty, $write:ident;)*) => {
        $(
            pub fn $name(&mut self, v: $ty) -> &mut Self {
                if self.big {
                    self.buf.$write::<BigEndian>(v).unwrap();
                } else {
                    self.buf.$write::<LittleEndian>(v).unwrap();
                }
                self
            }
        )*
    };
}

impl Writer {
    pub fn new(big: bool) -> Self {
        Self { buf: Vec::new(), big }
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn i8(&mut self, v: i8) -> &mut Self {
        self.buf.push(v as u8);
        self
    }

    put! {
        u16 => u16, write_u16;
        u32 => u32, write_u32;
        u64 => u64, write_u64;
        i16 => i16, write_i16;
        i32 => i32, write_i32;
        i64 => i64, write_i64;
        f32 => f32, write_f32;
        f64 => f64, write_f64;
    }

    pub fn string(&mut self, s: &str) -> &mut Self {
        self.u16(s.len() as u16);
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    pub fn bytes(&mut self, b: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(b);
        self
    }

    pub fn scalar(&mut self, v: &Scalar) -> &mut Self {
        match v {
            Scalar::I8(x) => self.i8(*x),
            Scalar::I16(x) => self.i16(*x),
            Scalar::I32(x) => self.i32(*x),
            Scalar::I64(x) => self.i64(*x),
            Scalar::U8(x) => self.u8(*x),
            Scalar::U16(x) => self.u16(*x),
            Scalar::U32(x) => self.u32(*x),
            Scalar::U64(x) => self.u64(*x),
            Scalar::F32(x) => self.f32(*x),
            Scalar::F64(x) => self.f64(*x),
            Scalar::C32(re, im) => self.f32(*re).f32(*im),
            Scalar::C64(re, im) => self.f64(*re).f64(*im),
            Scalar::Str(s) => self.string(s),
            Scalar::Raw(b) => self.bytes(b),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }
}

/// One element value as written to the index.
#[derive(Clone, Debug)]
pub enum Scalar {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    C32(f32, f32),
    C64(f64, f64),
    Str(String),
    Raw(Vec<u8>),
}

/// Transform characteristic of a block.
#[derive(Clone, Debug)]
pub struct TransformSpec {
    pub type_name: String,
    pub pre_type: i8,
    pub pre_count: Vec<u64>,
    pub pre_size: u64,
    pub payload_size: u64,
}

/// One characteristics set of a variable record.
#[derive(Clone, Debug, Default)]
pub struct BlockSpec {
    /// 1-based step.
    pub step: u32,
    pub value: Option<Scalar>,
    pub min: Option<Scalar>,
    pub max: Option<Scalar>,
    /// Per axis `(count, shape, start)`, file order.
    pub dims: Vec<(u64, u64, u64)>,
    pub payload_offset: u64,
    pub file_index: u32,
    pub transform: Option<TransformSpec>,
    /// Raw characteristic bytes appended after the known ones.
    pub trailing: Vec<u8>,
}

impl BlockSpec {
    pub fn array(step: u32, count: &[u64], shape: &[u64], start: &[u64]) -> Self {
        Self {
            step,
            dims: count.iter().zip(shape).zip(start).map(|((&c, &s), &o)| (c, s, o)).collect(),
            ..Default::default()
        }
    }

    pub fn value(step: u32, v: Scalar) -> Self {
        Self { step, value: Some(v), ..Default::default() }
    }

    pub fn at(mut self, file_index: u32, payload_offset: u64) -> Self {
        self.file_index = file_index;
        self.payload_offset = payload_offset;
        self
    }

    pub fn min_max(mut self, min: Scalar, max: Scalar) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn transform(mut self, t: TransformSpec) -> Self {
        self.transform = Some(t);
        self
    }
}

struct PgSpec {
    step: u32,
    column_major: bool,
    rank: i32,
}

/// Buffer plus the offsets written into its footer.
pub struct Built {
    pub buffer: Vec<u8>,
    pub pg_start: u64,
    pub vars_start: u64,
    pub attrs_start: u64,
}

pub struct MetadataBuilder {
    big: bool,
    version: u8,
    has_subfiles: bool,
    pgs: Vec<PgSpec>,
    variables: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
}

impl MetadataBuilder {
    pub fn new(big: bool) -> Self {
        Self { big, version: 4, has_subfiles: true, pgs: Vec::new(), variables: Vec::new(), attributes: Vec::new() }
    }

    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn process_group(mut self, step: u32, column_major: bool) -> Self {
        let rank = self.pgs.len() as i32;
        self.pgs.push(PgSpec { step, column_major, rank });
        self
    }

    pub fn variable(mut self, name: &str, type_code: i8, blocks: &[BlockSpec]) -> Self {
        let mut sets = Writer::new(self.big);
        for block in blocks {
            let chars = self.characteristics(block);
            sets.u8(9).u32(chars.len() as u32).bytes(&chars);
        }
        let record = self.record(name, type_code, blocks.len() as u64, &sets.buf);
        self.variables.push(record);
        self
    }

    pub fn attribute(mut self, name: &str, type_code: i8, values: &[Scalar]) -> Self {
        let mut chars = Writer::new(self.big);
        chars.u8(0).u32(values.len() as u32);
        for v in values {
            chars.scalar(v);
        }
        let mut set = Writer::new(self.big);
        set.u8(1).u32(chars.len() as u32).bytes(&chars.buf);
        let record = self.record(name, type_code, 1, &set.buf);
        self.attributes.push(record);
        self
    }

    fn characteristics(&self, block: &BlockSpec) -> Vec<u8> {
        let mut w = Writer::new(self.big);
        if let Some(v) = &block.value {
            w.u8(0).scalar(v);
        }
        if let Some(v) = &block.min {
            w.u8(1).scalar(v);
        }
        if let Some(v) = &block.max {
            w.u8(2).scalar(v);
        }
        w.u8(3).u64(0);
        if !block.dims.is_empty() {
            w.u8(4).u8(block.dims.len() as u8).u16((block.dims.len() * 24) as u16);
            for &(count, shape, start) in &block.dims {
                w.u64(count).u64(shape).u64(start);
            }
        }
        w.u8(6).u64(block.payload_offset);
        w.u8(7).u32(block.file_index);
        w.u8(8).u32(block.step);
        if let Some(t) = &block.transform {
            w.u8(11).u8(t.type_name.len() as u8).bytes(t.type_name.as_bytes());
            w.i8(t.pre_type).u8(t.pre_count.len() as u8).u16((t.pre_count.len() * 24) as u16);
            for &c in &t.pre_count {
                w.u64(c).u64(c).u64(0);
            }
            w.u16(16).u64(t.pre_size).u64(t.payload_size);
        }
        w.bytes(&block.trailing);
        w.buf
    }

    fn record(&self, name: &str, type_code: i8, sets: u64, body: &[u8]) -> Vec<u8> {
        let mut inner = Writer::new(self.big);
        inner.u32(0).string("").string(name).string("").i8(type_code).u64(sets).bytes(body);
        let mut rec = Writer::new(self.big);
        rec.u32(inner.len() as u32).bytes(&inner.buf);
        rec.buf
    }

    pub fn build(self) -> Built {
        let mut w = Writer::new(self.big);
        w.bytes(&[0xAB; 16]);

        let pg_start = w.len() as u64;
        let mut pg_body = Writer::new(self.big);
        for pg in &self.pgs {
            let mut rec = Writer::new(self.big);
            rec.string("sim")
                .u8(if pg.column_major { b'y' } else { b'n' })
                .i32(pg.rank)
                .string("")
                .u32(pg.step)
                .u64(0);
            pg_body.u16(rec.len() as u16).bytes(&rec.buf);
        }
        w.u64(self.pgs.len() as u64).u64(pg_body.len() as u64).bytes(&pg_body.buf);

        let vars_start = w.len() as u64;
        let vars: Vec<u8> = self.variables.concat();
        w.u32(self.variables.len() as u32).u64(vars.len() as u64).bytes(&vars);

        let attrs_start = w.len() as u64;
        let attrs: Vec<u8> = self.attributes.concat();
        w.u32(self.attributes.len() as u32).u64(attrs.len() as u64).bytes(&attrs);

        let mut tag = [b' '; 28];
        tag[..12].copy_from_slice(b"ADIOS-BP v4 ");
        w.bytes(&tag).u64(pg_start).u64(vars_start).u64(attrs_start);
        w.u8(if self.big { 1 } else { 0 }).u8(0).u8(self.has_subfiles as u8).u8(self.version);

        Built { buffer: w.buf, pg_start, vars_start, attrs_start }
    }
}

/// Encode `values` in the given byte order.
pub fn encode_f64(values: &[f64], big: bool) -> Vec<u8> {
    let mut w = Writer::new(big);
    for &v in values {
        w.f64(v);
    }
    w.buf
}
