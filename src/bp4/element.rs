//! Element index record decoding.
//!
//! Variables and attributes share one record layout: a header naming the
//! element and its wire type, followed by one characteristics set per block
//! (variables) or a single set holding the value (attributes).

use super::buffer::BufferReader;
use super::format::*;
use crate::core::BlockOperationInfo;
use crate::util::{
    Complex32, Complex64, ComplexLongDouble, DataKind, Dims, Error, LongDouble, Result, Value,
    LONG_DOUBLE_SIZE,
};

/// Header of one element index record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementIndexHeader {
    /// Declared record length, excluding the length word itself.
    pub length: u32,
    pub member_id: u32,
    pub group_name: String,
    pub name: String,
    pub path: String,
    pub type_code: i8,
    pub characteristics_sets_count: u64,
}

/// Decoded characteristics of one set (one block, or one attribute value).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Characteristics {
    pub values: Vec<Value>,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub offset: u64,
    pub count: Dims,
    pub shape: Dims,
    pub start: Dims,
    pub var_id: Option<u32>,
    pub payload_offset: u64,
    pub file_index: u32,
    /// 1-based step.
    pub time_index: u32,
    pub operations: Vec<BlockOperationInfo>,
    /// First characteristic id this decoder could not interpret, if any.
    /// Decoding of the set stops there.
    pub unknown_characteristic: Option<u8>,
}

/// Read the header of the element record starting at `pos`.
pub fn read_element_index_header(reader: &BufferReader<'_>, pos: &mut usize) -> Result<ElementIndexHeader> {
    let length = reader.read_u32(pos)?;
    let member_id = reader.read_u32(pos)?;
    let group_name = reader.read_string(pos)?;
    let name = reader.read_string(pos)?;
    let path = reader.read_string(pos)?;
    let type_code = reader.read_i8(pos)?;
    let characteristics_sets_count = reader.read_u64(pos)?;
    Ok(ElementIndexHeader { length, member_id, group_name, name, path, type_code, characteristics_sets_count })
}

/// Decode one element of `kind` at `pos`.
pub fn read_value(reader: &BufferReader<'_>, pos: &mut usize, kind: DataKind) -> Result<Value> {
    Ok(match kind {
        DataKind::String => Value::String(reader.read_string(pos)?),
        DataKind::Int8 => Value::Int8(reader.read_i8(pos)?),
        DataKind::Int16 => Value::Int16(reader.read_i16(pos)?),
        DataKind::Int32 => Value::Int32(reader.read_i32(pos)?),
        DataKind::Int64 => Value::Int64(reader.read_i64(pos)?),
        DataKind::UInt8 => Value::UInt8(reader.read_u8(pos)?),
        DataKind::UInt16 => Value::UInt16(reader.read_u16(pos)?),
        DataKind::UInt32 => Value::UInt32(reader.read_u32(pos)?),
        DataKind::UInt64 => Value::UInt64(reader.read_u64(pos)?),
        DataKind::Float32 => Value::Float32(reader.read_f32(pos)?),
        DataKind::Float64 => Value::Float64(reader.read_f64(pos)?),
        DataKind::LongDouble => Value::LongDouble(read_long_double(reader, pos)?),
        DataKind::ComplexFloat32 => Value::ComplexFloat32(Complex32 {
            re: reader.read_f32(pos)?,
            im: reader.read_f32(pos)?,
        }),
        DataKind::ComplexFloat64 => Value::ComplexFloat64(Complex64 {
            re: reader.read_f64(pos)?,
            im: reader.read_f64(pos)?,
        }),
        DataKind::ComplexLongDouble => Value::ComplexLongDouble(ComplexLongDouble {
            re: read_long_double(reader, pos)?,
            im: read_long_double(reader, pos)?,
        }),
        DataKind::Compound => {
            return Err(Error::format(format!("compound value at {pos} cannot be decoded")))
        }
    })
}

fn read_long_double(reader: &BufferReader<'_>, pos: &mut usize) -> Result<LongDouble> {
    Ok(LongDouble(reader.read_array::<LONG_DOUBLE_SIZE>(pos)?))
}

/// Per-axis `[count][shape][start]` triples.
fn read_dimensions(reader: &BufferReader<'_>, pos: &mut usize, ndims: usize) -> Result<(Dims, Dims, Dims)> {
    let mut count = Dims::with_capacity(ndims);
    let mut shape = Dims::with_capacity(ndims);
    let mut start = Dims::with_capacity(ndims);
    for _ in 0..ndims {
        count.push(reader.read_usize(pos)?);
        // Shape may carry the LOCAL_VALUE_DIM marker, which overflows usize
        // on 32-bit hosts; saturate instead of failing.
        shape.push(usize::try_from(reader.read_u64(pos)?).unwrap_or(usize::MAX));
        start.push(reader.read_usize(pos)?);
    }
    Ok((count, shape, start))
}

fn read_transform(reader: &BufferReader<'_>, pos: &mut usize, name: &str) -> Result<BlockOperationInfo> {
    let type_len = reader.read_u8(pos)? as usize;
    let type_name = String::from_utf8(reader.take(pos, type_len)?.to_vec())?;

    let pre_type_at = *pos;
    let pre_type = reader.read_i8(pos)?;
    // Only fixed-size elements can be the input of a transform
    let (pre_kind, pre_size_of) = variable_kind(pre_type)
        .and_then(|kind| Some((kind, kind.element_size()?)))
        .ok_or_else(|| Error::UnknownElementType {
            type_code: pre_type,
            name: name.to_string(),
            offset: pre_type_at,
        })?;

    let ndims = reader.read_u8(pos)? as usize;
    let _dims_length = reader.read_u16(pos)?;
    let (pre_count, pre_shape, pre_start) = read_dimensions(reader, pos, ndims)?;

    let meta_len = reader.read_u16(pos)? as usize;
    if meta_len < 16 {
        return Err(Error::format(format!(
            "transform '{type_name}' on '{name}' has {meta_len} metadata bytes, need at least 16"
        )));
    }
    let pre_size = reader.read_u64(pos)?;
    let payload_size = reader.read_u64(pos)?;
    let metadata = reader.take(pos, meta_len - 16)?.to_vec();

    Ok(BlockOperationInfo {
        type_name,
        pre_kind,
        pre_count,
        pre_shape,
        pre_start,
        pre_size_of,
        pre_size,
        payload_offset: 0,
        payload_size,
        metadata,
    })
}

/// Read one characteristics set at `pos`.
///
/// `values_prefixed` selects the attribute encoding, where the value
/// characteristic carries a u32 element count before the elements.
pub fn read_characteristics(
    reader: &BufferReader<'_>,
    pos: &mut usize,
    kind: DataKind,
    name: &str,
    values_prefixed: bool,
) -> Result<Characteristics> {
    let _count = reader.read_u8(pos)?;
    let length = reader.read_u32(pos)? as usize;
    let end = pos
        .checked_add(length)
        .ok_or_else(|| Error::format("characteristics length overflows"))?;
    let set = reader.limited(end)?;

    let mut out = Characteristics { time_index: 1, ..Default::default() };

    while *pos < end {
        let id_at = *pos;
        let raw = set.read_u8(pos)?;
        let Some(id) = CharacteristicId::from_u8(raw) else {
            tracing::warn!(element = name, id = raw, offset = id_at, "unknown characteristic, skipping rest of set");
            out.unknown_characteristic = Some(raw);
            *pos = end;
            break;
        };

        match id {
            CharacteristicId::Value => {
                if values_prefixed {
                    let n = set.read_u32(pos)? as usize;
                    out.values = (0..n)
                        .map(|_| read_value(&set, pos, kind))
                        .collect::<Result<_>>()?;
                } else {
                    out.values = vec![read_value(&set, pos, kind)?];
                }
            }
            CharacteristicId::Min => out.min = Some(read_value(&set, pos, kind)?),
            CharacteristicId::Max => out.max = Some(read_value(&set, pos, kind)?),
            CharacteristicId::Offset => out.offset = set.read_u64(pos)?,
            CharacteristicId::Dimensions => {
                let ndims = set.read_u8(pos)? as usize;
                let _dims_length = set.read_u16(pos)?;
                (out.count, out.shape, out.start) = read_dimensions(&set, pos, ndims)?;
            }
            CharacteristicId::VarId => out.var_id = Some(set.read_u32(pos)?),
            CharacteristicId::PayloadOffset => out.payload_offset = set.read_u64(pos)?,
            CharacteristicId::FileIndex => out.file_index = set.read_u32(pos)?,
            CharacteristicId::TimeIndex => out.time_index = set.read_u32(pos)?,
            CharacteristicId::TransformType => out.operations.push(read_transform(&set, pos, name)?),
        }
    }

    for op in &mut out.operations {
        op.payload_offset = out.payload_offset;
    }
    Ok(out)
}
