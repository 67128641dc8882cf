//! BP4 format constants and wire type codes.

use crate::util::DataKind;

/// Size of the minifooter at the end of a metadata buffer.
pub const MINIFOOTER_SIZE: usize = 56;

/// Length of the version tag at the start of the minifooter.
pub const VERSION_TAG_SIZE: usize = 28;

/// Distance from the end of the buffer to the endianness byte.
pub const ENDIANNESS_FROM_END: usize = 4;

/// Distance from the end of the buffer to the subfiles flag.
/// The byte between endianness and this flag is reserved.
pub const SUBFILES_FROM_END: usize = 2;

/// Distance from the end of the buffer to the version byte.
pub const VERSION_FROM_END: usize = 1;

/// Oldest BP format version this decoder accepts.
pub const MIN_FORMAT_VERSION: u8 = 3;

/// Endianness flag values.
pub const LITTLE_ENDIAN_FLAG: u8 = 0;
pub const BIG_ENDIAN_FLAG: u8 = 1;

/// Process-group orientation marker for column-major writers.
pub const COLUMN_MAJOR_MARKER: u8 = b'y';

/// Bytes of the PG record length word, which the declared length excludes.
pub const PG_LENGTH_WORD: usize = 2;

/// Bytes of the element record length word, which the declared length excludes.
pub const ELEMENT_LENGTH_WORD: usize = 4;

/// Shape marker for a value that is local to each writer.
pub const LOCAL_VALUE_DIM: u64 = u64::MAX - 2;

// === Wire type codes ===

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

/// Kinds shared by variables and attributes.
const fn common_kind(code: i8) -> Option<DataKind> {
    Some(match code {
        TYPE_STRING => DataKind::String,
        TYPE_BYTE => DataKind::Int8,
        TYPE_SHORT => DataKind::Int16,
        TYPE_INTEGER => DataKind::Int32,
        TYPE_LONG => DataKind::Int64,
        TYPE_UNSIGNED_BYTE => DataKind::UInt8,
        TYPE_UNSIGNED_SHORT => DataKind::UInt16,
        TYPE_UNSIGNED_INTEGER => DataKind::UInt32,
        TYPE_UNSIGNED_LONG => DataKind::UInt64,
        TYPE_REAL => DataKind::Float32,
        TYPE_DOUBLE => DataKind::Float64,
        TYPE_LONG_DOUBLE => DataKind::LongDouble,
        _ => return None,
    })
}

/// Kind of a variable record's type code.
pub const fn variable_kind(code: i8) -> Option<DataKind> {
    match code {
        TYPE_COMPLEX => Some(DataKind::ComplexFloat32),
        TYPE_DOUBLE_COMPLEX => Some(DataKind::ComplexFloat64),
        TYPE_LONG_DOUBLE_COMPLEX => Some(DataKind::ComplexLongDouble),
        _ => common_kind(code),
    }
}

/// Kind of an attribute record's type code. String arrays map to
/// [`DataKind::String`]; the caller tracks the array flag.
pub const fn attribute_kind(code: i8) -> Option<DataKind> {
    match code {
        TYPE_STRING_ARRAY => Some(DataKind::String),
        _ => common_kind(code),
    }
}

/// Wire code for a kind, `None` for compound.
pub const fn type_code(kind: DataKind) -> Option<i8> {
    Some(match kind {
        DataKind::String => TYPE_STRING,
        DataKind::Int8 => TYPE_BYTE,
        DataKind::Int16 => TYPE_SHORT,
        DataKind::Int32 => TYPE_INTEGER,
        DataKind::Int64 => TYPE_LONG,
        DataKind::UInt8 => TYPE_UNSIGNED_BYTE,
        DataKind::UInt16 => TYPE_UNSIGNED_SHORT,
        DataKind::UInt32 => TYPE_UNSIGNED_INTEGER,
        DataKind::UInt64 => TYPE_UNSIGNED_LONG,
        DataKind::Float32 => TYPE_REAL,
        DataKind::Float64 => TYPE_DOUBLE,
        DataKind::LongDouble => TYPE_LONG_DOUBLE,
        DataKind::ComplexFloat32 => TYPE_COMPLEX,
        DataKind::ComplexFloat64 => TYPE_DOUBLE_COMPLEX,
        DataKind::ComplexLongDouble => TYPE_LONG_DOUBLE_COMPLEX,
        DataKind::Compound => return None,
    })
}

/// Characteristic identifiers inside an element record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CharacteristicId {
    Value = 0,
    Min = 1,
    Max = 2,
    Offset = 3,
    Dimensions = 4,
    VarId = 5,
    PayloadOffset = 6,
    FileIndex = 7,
    TimeIndex = 8,
    TransformType = 11,
}

impl CharacteristicId {
    pub const fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::Value,
            1 => Self::Min,
            2 => Self::Max,
            3 => Self::Offset,
            4 => Self::Dimensions,
            5 => Self::VarId,
            6 => Self::PayloadOffset,
            7 => Self::FileIndex,
            8 => Self::TimeIndex,
            11 => Self::TransformType,
            _ => return None,
        })
    }
}
