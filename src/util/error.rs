//! Error types for the BP4 decoder.

use thiserror::Error;

use super::DataKind;

/// Main error type for BP4 decoding operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Footer declares a format version older than 3
    #[error("Unsupported BP format version {found}: only version 3 and above can be read")]
    FormatVersion { found: u8 },

    /// A read would run past the end of the buffer
    #[error("Truncated buffer: reading {needed} bytes at position {position} exceeds length {len}")]
    TruncatedBuffer { position: usize, needed: usize, len: usize },

    /// Structural violation in the metadata (length overruns, bad flags)
    #[error("Invalid BP4 metadata: {0}")]
    Format(String),

    /// Element record carries a type code this decoder does not know
    #[error("Unknown element type code {type_code} for '{name}' at offset {offset}")]
    UnknownElementType { type_code: i8, name: String, offset: usize },

    /// A record tries to reinterpret an existing entry as a different kind
    #[error("Kind mismatch for '{name}': catalog has {expected}, record declares {found}")]
    KindMismatch { name: String, expected: DataKind, found: DataKind },

    /// Operation not available for the element kind
    #[error("Unsupported element kind {kind} for '{name}'")]
    UnsupportedKind { name: String, kind: DataKind },

    /// No registered decoder for a transform tag
    #[error("Unknown codec: {0}")]
    UnknownCodec(String),

    /// A registered decoder rejected its input
    #[error("Codec '{codec}' failed: {reason}")]
    CodecFailed { codec: String, reason: String },

    /// Variable not present in the catalog
    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    /// Selection does not fit the variable, block or destination
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a format error.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create an invalid selection error.
    pub fn selection(msg: impl Into<String>) -> Self {
        Self::InvalidSelection(msg.into())
    }

    /// True for errors confined to a single element record. The index scan
    /// records these as diagnostics and moves on to the next record.
    pub fn is_record_local(&self) -> bool {
        matches!(self, Self::UnknownElementType { .. } | Self::KindMismatch { .. })
    }
}

/// Result type alias for BP4 operations.
pub type Result<T> = std::result::Result<T, Error>;
