//! # BP4
//!
//! Reader-side decoder for BP4 metadata, the index layer of the ADIOS2
//! append-only container for multi-dimensional scientific arrays.
//!
//! The metadata buffer is parsed once into a catalog of variables and
//! attributes. Reads are then planned per subfile, fetched by the caller,
//! and landed into caller memory, decoding any transform first.
//!
//! ## Modules
//!
//! - [`util`] - Element kinds, boxes and errors
//! - [`bp4`] - Footer and index parsing, the [`Deserializer`](bp4::Deserializer)
//! - [`core`] - Catalog, read planning, codecs and clipping
//!
//! ## Example
//!
//! ```ignore
//! use bp4::prelude::*;
//!
//! let mut catalog = MemoryCatalog::new();
//! let mut reader = Deserializer::default();
//! reader.parse_metadata(&metadata, &mut catalog)?;
//!
//! reader.defer_variable("temperature");
//! for (name, plan) in reader.perform_gets_variables_subfile_info(&catalog)? {
//!     for (subfile, blocks) in plan {
//!         println!("{name}: {} blocks in subfile {subfile}", blocks.len());
//!     }
//! }
//! ```

pub mod util;
pub mod bp4;
pub mod core;

// Re-export commonly used types
pub use util::{DataKind, Error, Result, Value};
pub use bp4::{Deserializer, DeserializerOptions};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{BoxDims, DataKind, Dims, Error, LayoutState, Result, Value};
    pub use crate::bp4::{Deserializer, DeserializerOptions, DiagnosticsReport, Footer};
    pub use crate::core::{
        Catalog, MemoryCatalog, OperatorRegistry, ShapeKind, SubFileInfoMap, SubStreamBoxInfo,
        VariableEntry,
    };
}
