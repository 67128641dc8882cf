//! Resolution of deferred reads into per-subfile byte ranges.
//!
//! For every pending variable the resolver walks the selected steps and
//! blocks, intersects each block with the caller's selection, and records
//! which bytes of which subfile must be fetched.

use std::collections::BTreeMap;

use super::catalog::{Catalog, ShapeKind, VariableEntry};
use super::operator::{BlockOperationInfo, OperatorRegistry};
use crate::util::{linear_interval, BoxDims, DataKind, Dims, Error, LayoutState, Result, Value};

/// Read plan for one block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubStreamBoxInfo {
    /// 0-based step.
    pub step: usize,
    /// Position of the block within its step.
    pub block_index: usize,
    /// Block extent in file order.
    pub block_box: BoxDims,
    /// Overlap of block and selection, in file order.
    pub intersection_box: BoxDims,
    /// Half-open byte range `[start, end)` in the subfile.
    pub seeks: (u64, u64),
    /// Transform chain to reverse after fetching.
    pub operations: Vec<BlockOperationInfo>,
}

impl SubStreamBoxInfo {
    /// Bytes to fetch.
    #[inline]
    pub fn len(&self) -> u64 {
        self.seeks.1 - self.seeks.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read plans keyed by subfile index.
pub type SubFileInfoMap = BTreeMap<usize, Vec<SubStreamBoxInfo>>;

/// Build the read plan for one variable's current selection.
pub fn get_subfile_info(
    variable: &VariableEntry,
    layout: LayoutState,
    registry: &OperatorRegistry,
) -> Result<SubFileInfoMap> {
    let element_size = variable.kind.element_size();
    if variable.kind == DataKind::Compound {
        return Err(Error::UnsupportedKind { name: variable.name.clone(), kind: variable.kind });
    }

    let selection = variable.selection_box(layout);
    if !selection.is_addressable() {
        return Err(Error::selection(format!(
            "selection {selection:?} of '{}' is too large to address",
            variable.name
        )));
    }
    if variable.shape_kind == ShapeKind::GlobalArray
        && variable.selection.boxed.is_some()
        && !BoxDims::from_count(&variable.shape).contains(&selection)
    {
        return Err(Error::selection(format!(
            "selection {:?} exceeds shape {:?} of '{}'",
            selection, variable.shape, variable.name
        )));
    }

    let mut map = SubFileInfoMap::new();
    for step in variable.step_range()? {
        let blocks = variable.blocks.get(&step).ok_or_else(|| {
            Error::selection(format!("'{}' was not written at step {step}", variable.name))
        })?;

        for (index, block) in blocks.iter().enumerate() {
            if variable.selection.block_id.is_some_and(|id| id != index) {
                continue;
            }

            let (block_box, selection_box) = match variable.shape_kind {
                ShapeKind::GlobalArray => (block.block_box(), selection.clone()),
                ShapeKind::LocalArray => {
                    let local = block.local_box();
                    let sel = match &variable.selection.boxed {
                        Some(_) => selection.clone(),
                        None => local.clone(),
                    };
                    (local, sel)
                }
                ShapeKind::GlobalValue => (BoxDims::scalar(), BoxDims::scalar()),
                ShapeKind::LocalValue => {
                    let sel = match &variable.selection.boxed {
                        Some(_) => selection.clone(),
                        None => BoxDims::from_count(&[blocks.len()]),
                    };
                    (BoxDims::new(Dims::from_slice(&[index]), Dims::from_slice(&[1])), sel)
                }
            };

            if !block_box.is_addressable() {
                return Err(Error::format(format!(
                    "block {index} of '{}' at step {step} spans {block_box:?}, too large to address",
                    variable.name
                )));
            }
            let Some(intersection_box) = block_box.intersection(&selection_box) else {
                continue;
            };

            let base = block.payload_offset;
            let seeks = if variable.is_single_value() {
                let size = match element_size {
                    Some(size) => size as u64,
                    None => string_value_size(variable, block.value.as_ref())?,
                };
                byte_range(variable, base, Some(0), Some(size))?
            } else if block.is_transformed() {
                let active = registry.locate(&block.operations).unwrap_or(&block.operations[0]);
                byte_range(variable, base, Some(0), Some(active.payload_size))?
            } else {
                let size = element_size.ok_or_else(|| Error::UnsupportedKind {
                    name: variable.name.clone(),
                    kind: variable.kind,
                })? as u64;
                let (first, end) = linear_interval(&block_box, &intersection_box, layout.row_major);
                let bytes = |n: usize| (n as u64).checked_mul(size);
                byte_range(variable, base, bytes(first), bytes(end))?
            };

            map.entry(block.file_index).or_default().push(SubStreamBoxInfo {
                step,
                block_index: index,
                block_box,
                intersection_box,
                seeks,
                operations: block.operations.clone(),
            });
        }
    }

    tracing::trace!(
        variable = %variable.name,
        subfiles = map.len(),
        blocks = map.values().map(Vec::len).sum::<usize>(),
        "resolved subfile info"
    );
    Ok(map)
}

/// `[base + lo, base + hi)` in the subfile. `None` bounds already overflowed.
fn byte_range(variable: &VariableEntry, base: u64, lo: Option<u64>, hi: Option<u64>) -> Result<(u64, u64)> {
    match (lo.and_then(|lo| base.checked_add(lo)), hi.and_then(|hi| base.checked_add(hi))) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(Error::format(format!(
            "byte range of '{}' past payload offset {base} overflows",
            variable.name
        ))),
    }
}

/// Strings are stored with a u16 length prefix.
fn string_value_size(variable: &VariableEntry, value: Option<&Value>) -> Result<u64> {
    let text = value.and_then(Value::as_str).ok_or_else(|| {
        Error::format(format!("string value of '{}' is missing from metadata", variable.name))
    })?;
    Ok(2 + text.len() as u64)
}

/// Rebuild the read plan of every pending variable in `deferred`.
///
/// Compound variables are left as they are. Returns how many were skipped
/// for that reason.
pub fn perform_gets_variables_subfile_info<C: Catalog + ?Sized>(
    deferred: &mut BTreeMap<String, SubFileInfoMap>,
    catalog: &C,
    layout: LayoutState,
    registry: &OperatorRegistry,
) -> Result<usize> {
    let mut unresolved_compound = 0;

    for (name, map) in deferred.iter_mut() {
        let kind = catalog
            .inquire_variable_kind(name)
            .ok_or_else(|| Error::VariableNotFound(name.clone()))?;

        if kind == DataKind::Compound {
            tracing::warn!(variable = %name, "compound variable left unresolved");
            unresolved_compound += 1;
            continue;
        }

        let variable = catalog
            .inquire_variable(name)
            .ok_or_else(|| Error::VariableNotFound(name.clone()))?;
        *map = get_subfile_info(variable, layout, registry)?;
    }
    Ok(unresolved_compound)
}
