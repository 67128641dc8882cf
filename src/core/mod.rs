//! Core layer - catalog, read planning and block decoding.
//!
//! This module provides:
//! - [`Catalog`] / [`MemoryCatalog`] - Variables and attributes by name
//! - [`OperatorRegistry`] - Codec lookup and the transformed-block pipeline
//! - [`perform_gets_variables_subfile_info`] - Per-subfile read plans
//! - [`clip_contiguous_memory`] - Landing block bytes in caller memory

mod catalog;
mod operator;
mod subfile;
mod clip;

pub use catalog::{
    AttributeEntry, BlockInfo, Catalog, MemoryCatalog, Selection, ShapeKind, VariableEntry,
};
pub use operator::{
    identity_operation, BlockOperationInfo, IdentityOperator, Operator, OperatorRegistry,
    DECLARED_TRANSFORMS, IDENTITY_OPERATOR, ZLIB_OPERATOR,
};
#[cfg(feature = "zlib")]
pub use operator::ZlibOperator;
pub use subfile::{
    get_subfile_info, perform_gets_variables_subfile_info, SubFileInfoMap, SubStreamBoxInfo,
};
pub use clip::{clip_contiguous_memory, clip_interval, clip_typed, ElementSpec};
