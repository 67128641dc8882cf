//! BP4 metadata format.
//!
//! A BP4 metadata buffer holds three indices and a fixed-size footer that
//! locates them. All integers use the byte order declared in the footer.
//!
//! ## Buffer Structure
//!
//! ```text
//! +----------------------+
//! | PG index             |  [count u64][length u64] then records
//! +----------------------+
//! | Variables index      |  [count u32][length u64] then element records
//! +----------------------+
//! | Attributes index     |  [count u32][length u64] then element records
//! +----------------------+
//! | Minifooter           |  56 bytes
//! +----------------------+
//! ```
//!
//! Element records start with a u32 length word that excludes itself,
//! followed by the header and one characteristics set per block:
//!
//! ```text
//! [length u32][member id u32][group][name][path][type i8][sets u64]
//! [count u8][length u32][characteristics ...] x sets
//! ```

mod buffer;
mod format;
mod footer;
mod pg_index;
mod element;
mod index;
mod diagnostics;
mod deserializer;

pub use buffer::{BufferReader, Endian};
pub use format::*;
pub use footer::{parse_minifooter, Footer};
pub use pg_index::{parse_pg_index, read_process_group_index, PgIndexSummary, ProcessGroupIndex};
pub use element::{read_characteristics, read_element_index_header, read_value, Characteristics, ElementIndexHeader};
pub use index::{parse_attributes_index, parse_variables_index};
pub use diagnostics::{DiagnosticsReport, ParseDiagnostics, SkippedRecord};
pub use deserializer::{Deserializer, DeserializerOptions};
