//! Minifooter parsing.
//!
//! The last bytes of a metadata buffer locate the three indices:
//!
//! ```text
//! +--------------------+
//! | Version tag        |  28 bytes
//! +--------------------+
//! | PG index start     |  u64
//! | Vars index start   |  u64
//! | Attrs index start  |  u64
//! +--------------------+
//! | Endianness         |  u8 (0 = little, 1 = big)
//! | Reserved           |  u8
//! | Subfiles flag      |  u8
//! | Version            |  u8 (>= 3)
//! +--------------------+
//! ```

use super::buffer::{BufferReader, Endian};
use super::format::*;
use crate::util::{Error, Result};

/// Parsed minifooter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Footer {
    pub endian: Endian,
    pub version: u8,
    pub has_subfiles: bool,
    pub version_tag: [u8; VERSION_TAG_SIZE],
    pub pg_index_start: u64,
    pub vars_index_start: u64,
    pub attrs_index_start: u64,
}

impl Footer {
    /// Version tag with trailing padding removed.
    pub fn version_tag_str(&self) -> String {
        String::from_utf8_lossy(&self.version_tag)
            .trim_end_matches(['\0', ' '])
            .to_string()
    }

    /// True if the file byte order matches the host.
    #[inline]
    pub fn is_host_endian(&self) -> bool {
        self.endian.is_host()
    }
}

/// Parse the minifooter at the end of `buffer`.
pub fn parse_minifooter(buffer: &[u8]) -> Result<Footer> {
    let len = buffer.len();
    if len < MINIFOOTER_SIZE {
        return Err(Error::TruncatedBuffer { position: 0, needed: MINIFOOTER_SIZE, len });
    }

    let version = buffer[len - VERSION_FROM_END];
    if version < MIN_FORMAT_VERSION {
        return Err(Error::FormatVersion { found: version });
    }

    let endian = match buffer[len - ENDIANNESS_FROM_END] {
        LITTLE_ENDIAN_FLAG => Endian::Little,
        BIG_ENDIAN_FLAG => Endian::Big,
        other => return Err(Error::format(format!("invalid endianness flag {other}"))),
    };
    let has_subfiles = buffer[len - SUBFILES_FROM_END] > 0;

    let reader = BufferReader::new(buffer, endian);
    let mut pos = len - MINIFOOTER_SIZE;
    let version_tag = reader.read_array::<VERSION_TAG_SIZE>(&mut pos)?;
    let pg_index_start = reader.read_u64(&mut pos)?;
    let vars_index_start = reader.read_u64(&mut pos)?;
    let attrs_index_start = reader.read_u64(&mut pos)?;

    let footer = Footer {
        endian,
        version,
        has_subfiles,
        version_tag,
        pg_index_start,
        vars_index_start,
        attrs_index_start,
    };
    tracing::debug!(
        version,
        ?endian,
        has_subfiles,
        pg = pg_index_start,
        vars = vars_index_start,
        attrs = attrs_index_start,
        "parsed minifooter"
    );
    Ok(footer)
}
