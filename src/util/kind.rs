//! Element kinds - the closed set of types a BP4 variable or attribute can hold.

use bytemuck::{Pod, Zeroable};
use std::cmp::Ordering;
use std::fmt;

/// Element kind of a catalog entry.
///
/// Every kind the decoder understands is listed here, so dispatch over kinds is
/// an exhaustive `match` rather than a lookup that can silently fall through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataKind {
    /// UTF-8 string (length-prefixed on the wire)
    String,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    /// x87 80-bit extended precision, stored in a 16-byte slot
    LongDouble,
    ComplexFloat32,
    ComplexFloat64,
    ComplexLongDouble,
    /// User-defined compound type. Never produced by the index parser; only
    /// external collaborators put these in a catalog.
    Compound,
}

impl DataKind {
    /// Size in bytes of a single element, `None` for kinds without a fixed size.
    #[inline]
    pub const fn element_size(self) -> Option<usize> {
        match self {
            Self::Int8 | Self::UInt8 => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32 | Self::UInt32 | Self::Float32 => Some(4),
            Self::Int64 | Self::UInt64 | Self::Float64 => Some(8),
            Self::LongDouble => Some(LONG_DOUBLE_SIZE),
            Self::ComplexFloat32 => Some(8),
            Self::ComplexFloat64 => Some(16),
            Self::ComplexLongDouble => Some(2 * LONG_DOUBLE_SIZE),
            Self::String | Self::Compound => None,
        }
    }

    /// Width of the unit that must be byte-swapped when file and host
    /// endianness differ. Complex kinds swap per component.
    #[inline]
    pub const fn swap_width(self) -> Option<usize> {
        match self {
            Self::Int8 | Self::UInt8 => None,
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32 | Self::UInt32 | Self::Float32 => Some(4),
            Self::Int64 | Self::UInt64 | Self::Float64 => Some(8),
            Self::ComplexFloat32 => Some(4),
            Self::ComplexFloat64 => Some(8),
            // The 10 significant bytes of an x87 value are not a power-of-two
            // unit; extended values are kept in file order.
            Self::LongDouble | Self::ComplexLongDouble => None,
            Self::String | Self::Compound => None,
        }
    }

    /// Returns the name of this kind as a string.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int8 => "int8_t",
            Self::Int16 => "int16_t",
            Self::Int32 => "int32_t",
            Self::Int64 => "int64_t",
            Self::UInt8 => "uint8_t",
            Self::UInt16 => "uint16_t",
            Self::UInt32 => "uint32_t",
            Self::UInt64 => "uint64_t",
            Self::Float32 => "float",
            Self::Float64 => "double",
            Self::LongDouble => "long double",
            Self::ComplexFloat32 => "float complex",
            Self::ComplexFloat64 => "double complex",
            Self::ComplexLongDouble => "long double complex",
            Self::Compound => "compound",
        }
    }

    #[inline]
    pub const fn is_complex(self) -> bool {
        matches!(self, Self::ComplexFloat32 | Self::ComplexFloat64 | Self::ComplexLongDouble)
    }

    /// Kinds whose values have a total order usable for min/max folding.
    #[inline]
    pub const fn is_ordered(self) -> bool {
        !matches!(
            self,
            Self::String
                | Self::ComplexFloat32
                | Self::ComplexFloat64
                | Self::ComplexLongDouble
                | Self::Compound
        )
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Bytes occupied by one long double on the writer side.
pub const LONG_DOUBLE_SIZE: usize = 16;

/// x87 extended-precision value as raw little-endian bytes.
///
/// Only the low 10 bytes are significant (64-bit mantissa with explicit
/// integer bit, then sign and 15-bit exponent); the rest is padding.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct LongDouble(pub [u8; LONG_DOUBLE_SIZE]);

impl LongDouble {
    /// Build from an `f64`, exact for every finite value.
    pub fn from_f64(v: f64) -> Self {
        let mut bytes = [0u8; LONG_DOUBLE_SIZE];
        let bits = v.to_bits();
        let sign = ((bits >> 63) as u16) << 15;
        let exp = ((bits >> 52) & 0x7ff) as i32;
        let frac = bits & ((1u64 << 52) - 1);

        let (exp80, mantissa) = if exp == 0 && frac == 0 {
            (0u16, 0u64)
        } else if exp == 0x7ff {
            (0x7fff, (1u64 << 63) | (frac << 11))
        } else if exp == 0 {
            // f64 subnormal: normalise into the wider exponent range
            let shift = frac.leading_zeros();
            let mantissa = frac << shift;
            let e = -1022 - (shift as i32 - 11) + 16383;
            (e as u16, mantissa)
        } else {
            ((exp - 1023 + 16383) as u16, (1u64 << 63) | (frac << 11))
        };

        bytes[0..8].copy_from_slice(&mantissa.to_le_bytes());
        bytes[8..10].copy_from_slice(&(sign | exp80).to_le_bytes());
        Self(bytes)
    }

    /// Nearest `f64` to the stored extended value.
    pub fn to_f64(self) -> f64 {
        let mantissa = u64::from_le_bytes(self.0[0..8].try_into().unwrap_or([0; 8]));
        let se = u16::from_le_bytes([self.0[8], self.0[9]]);
        let negative = se & 0x8000 != 0;
        let exp = (se & 0x7fff) as i32;

        let magnitude = if exp == 0x7fff {
            if mantissa << 1 == 0 { f64::INFINITY } else { f64::NAN }
        } else if exp == 0 && mantissa == 0 {
            0.0
        } else {
            let e = if exp == 0 { 1 - 16383 - 63 } else { exp - 16383 - 63 };
            // Split the scale so neither factor overflows on its own
            let half = e / 2;
            (mantissa as f64) * 2f64.powi(half) * 2f64.powi(e - half)
        };

        if negative { -magnitude } else { magnitude }
    }
}

impl fmt::Debug for LongDouble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}L", self.to_f64())
    }
}

/// Single-precision complex number as stored on disk (real, imaginary).
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Complex32 {
    pub re: f32,
    pub im: f32,
}

/// Double-precision complex number as stored on disk (real, imaginary).
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Complex64 {
    pub re: f64,
    pub im: f64,
}

/// Extended-precision complex number as stored on disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ComplexLongDouble {
    pub re: LongDouble,
    pub im: LongDouble,
}

// === Element trait for typed views ===

/// Trait for fixed-size types that can back a BP4 array.
pub trait Element: Pod + Zeroable + Copy + Default {
    /// The corresponding DataKind value.
    const KIND: DataKind;

    /// Size of this type in bytes.
    const SIZE: usize = std::mem::size_of::<Self>();
}

macro_rules! impl_element {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const KIND: DataKind = DataKind::$kind;
            }
        )*
    };
}

impl_element! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    LongDouble => LongDouble,
    Complex32 => ComplexFloat32,
    Complex64 => ComplexFloat64,
    ComplexLongDouble => ComplexLongDouble,
}

// === Value: one decoded element with its native representation ===

/// A single decoded element (single value, min, max, attribute item).
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    LongDouble(LongDouble),
    ComplexFloat32(Complex32),
    ComplexFloat64(Complex64),
    ComplexLongDouble(ComplexLongDouble),
}

impl Value {
    /// Kind of this value.
    pub const fn kind(&self) -> DataKind {
        match self {
            Self::String(_) => DataKind::String,
            Self::Int8(_) => DataKind::Int8,
            Self::Int16(_) => DataKind::Int16,
            Self::Int32(_) => DataKind::Int32,
            Self::Int64(_) => DataKind::Int64,
            Self::UInt8(_) => DataKind::UInt8,
            Self::UInt16(_) => DataKind::UInt16,
            Self::UInt32(_) => DataKind::UInt32,
            Self::UInt64(_) => DataKind::UInt64,
            Self::Float32(_) => DataKind::Float32,
            Self::Float64(_) => DataKind::Float64,
            Self::LongDouble(_) => DataKind::LongDouble,
            Self::ComplexFloat32(_) => DataKind::ComplexFloat32,
            Self::ComplexFloat64(_) => DataKind::ComplexFloat64,
            Self::ComplexLongDouble(_) => DataKind::ComplexLongDouble,
        }
    }

    /// Borrow the string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Lossy conversion to f64 for real numeric kinds.
    pub fn as_f64(&self) -> Option<f64> {
        Some(match *self {
            Self::Int8(v) => v as f64,
            Self::Int16(v) => v as f64,
            Self::Int32(v) => v as f64,
            Self::Int64(v) => v as f64,
            Self::UInt8(v) => v as f64,
            Self::UInt16(v) => v as f64,
            Self::UInt32(v) => v as f64,
            Self::UInt64(v) => v as f64,
            Self::Float32(v) => v as f64,
            Self::Float64(v) => v,
            Self::LongDouble(v) => v.to_f64(),
            _ => return None,
        })
    }

    /// Order two values of the same ordered kind. `None` for mixed kinds,
    /// unordered kinds and NaN.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int8(a), Self::Int8(b)) => Some(a.cmp(b)),
            (Self::Int16(a), Self::Int16(b)) => Some(a.cmp(b)),
            (Self::Int32(a), Self::Int32(b)) => Some(a.cmp(b)),
            (Self::Int64(a), Self::Int64(b)) => Some(a.cmp(b)),
            (Self::UInt8(a), Self::UInt8(b)) => Some(a.cmp(b)),
            (Self::UInt16(a), Self::UInt16(b)) => Some(a.cmp(b)),
            (Self::UInt32(a), Self::UInt32(b)) => Some(a.cmp(b)),
            (Self::UInt64(a), Self::UInt64(b)) => Some(a.cmp(b)),
            (Self::Float32(a), Self::Float32(b)) => a.partial_cmp(b),
            (Self::Float64(a), Self::Float64(b)) => a.partial_cmp(b),
            (Self::LongDouble(a), Self::LongDouble(b)) => a.to_f64().partial_cmp(&b.to_f64()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{}\"", s),
            Self::ComplexFloat32(c) => write!(f, "({}, {})", c.re, c.im),
            Self::ComplexFloat64(c) => write!(f, "({}, {})", c.re, c.im),
            Self::ComplexLongDouble(c) => write!(f, "({}, {})", c.re.to_f64(), c.im.to_f64()),
            Self::LongDouble(v) => write!(f, "{}", v.to_f64()),
            other => match other.as_f64() {
                Some(v) => write!(f, "{}", v),
                None => write!(f, "{:?}", other),
            },
        }
    }
}
