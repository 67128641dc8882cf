//! Catalog of variables and attributes discovered in the metadata.
//!
//! The index parser only needs insertion and lookup by name; the
//! [`Catalog`] trait captures that surface so callers can route entries
//! into their own object model. [`MemoryCatalog`] is the in-crate
//! implementation.

use std::collections::BTreeMap;
use std::ops::Range;

use super::operator::BlockOperationInfo;
use crate::util::{BoxDims, DataKind, Dims, Error, LayoutState, Result, Value};

/// How a variable's extent relates to the writers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// One value shared by all writers.
    GlobalValue,
    /// Blocks tile a global N-dimensional shape.
    GlobalArray,
    /// One value per writer, exposed as a 1-D array over blocks.
    LocalValue,
    /// Independent per-writer arrays with no global shape.
    LocalArray,
}

/// Metadata of one written block.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockInfo {
    /// 0-based step.
    pub step: usize,
    /// Extent in file order.
    pub start: Dims,
    pub count: Dims,
    pub shape: Dims,
    /// Single value stored in metadata, if any.
    pub value: Option<Value>,
    pub min: Option<Value>,
    pub max: Option<Value>,
    /// Offset of the block's characteristics in the metadata.
    pub metadata_offset: u64,
    /// Offset of the block's payload in its subfile.
    pub payload_offset: u64,
    /// Subfile holding the payload.
    pub file_index: usize,
    /// Transform chain, empty for raw blocks.
    pub operations: Vec<BlockOperationInfo>,
}

impl BlockInfo {
    /// Block extent in file order.
    pub fn block_box(&self) -> BoxDims {
        BoxDims::new(self.start.clone(), self.count.clone())
    }

    /// Block extent in file order, anchored at the origin.
    pub fn local_box(&self) -> BoxDims {
        BoxDims::from_count(&self.count)
    }

    #[inline]
    pub fn is_transformed(&self) -> bool {
        !self.operations.is_empty()
    }

    fn sort_key(&self) -> (usize, u64, &[usize]) {
        (self.file_index, self.payload_offset, &self.start)
    }
}

/// Caller selection on a variable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    /// Box in host order; `None` selects everything.
    pub boxed: Option<BoxDims>,
    /// `(start, count)` over 0-based steps; `None` selects the first
    /// available step.
    pub steps: Option<(usize, usize)>,
    /// Restrict reads to one block of each step.
    pub block_id: Option<usize>,
}

/// A variable and all blocks written for it.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableEntry {
    pub name: String,
    pub path: String,
    pub kind: DataKind,
    pub shape_kind: ShapeKind,
    /// Global shape in file order, taken from the latest step.
    pub shape: Dims,
    /// Extremes folded over all blocks. Unset for unordered kinds.
    pub min: Option<Value>,
    pub max: Option<Value>,
    /// Blocks per 0-based step, each list sorted by
    /// `(file_index, payload_offset, start)`.
    pub blocks: BTreeMap<usize, Vec<BlockInfo>>,
    pub selection: Selection,
}

impl VariableEntry {
    pub fn new(name: impl Into<String>, path: impl Into<String>, kind: DataKind, shape_kind: ShapeKind) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind,
            shape_kind,
            shape: Dims::new(),
            min: None,
            max: None,
            blocks: BTreeMap::new(),
            selection: Selection::default(),
        }
    }

    /// Insert a block in sorted position and fold its extremes.
    pub fn add_block(&mut self, block: BlockInfo) {
        if self.kind.is_ordered() {
            fold_extreme(&mut self.min, block.min.as_ref().or(block.value.as_ref()), std::cmp::Ordering::Less);
            fold_extreme(&mut self.max, block.max.as_ref().or(block.value.as_ref()), std::cmp::Ordering::Greater);
        }

        let list = self.blocks.entry(block.step).or_default();
        let at = list.partition_point(|b| b.sort_key() <= block.sort_key());
        list.insert(at, block);
        self.refresh_shape();
    }

    fn refresh_shape(&mut self) {
        let Some((_, latest)) = self.blocks.last_key_value() else {
            return;
        };
        self.shape = match self.shape_kind {
            ShapeKind::LocalValue => smallvec::smallvec![latest.len()],
            _ => latest.first().map(|b| b.shape.clone()).unwrap_or_default(),
        };
    }

    /// Blocks written at `step`, empty if the step is absent.
    pub fn blocks_info(&self, step: usize) -> &[BlockInfo] {
        self.blocks.get(&step).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Blocks of every step, ordered by step.
    pub fn all_steps_blocks_info(&self) -> Vec<&[BlockInfo]> {
        self.blocks.values().map(Vec::as_slice).collect()
    }

    /// Number of steps this variable was written in.
    pub fn available_steps_count(&self) -> usize {
        self.blocks.len()
    }

    /// First step this variable was written in.
    pub fn first_step(&self) -> Option<usize> {
        self.blocks.keys().next().copied()
    }

    /// Value stored in metadata for the first step's first block.
    pub fn value_from_metadata(&self) -> Option<&Value> {
        self.blocks.values().next()?.first()?.value.as_ref()
    }

    /// True for kinds whose blocks each hold one value.
    #[inline]
    pub fn is_single_value(&self) -> bool {
        matches!(self.shape_kind, ShapeKind::GlobalValue | ShapeKind::LocalValue)
    }

    /// Global shape in host order.
    pub fn shape_in(&self, layout: LayoutState) -> Dims {
        layout.to_file_order(&self.shape)
    }

    /// Select a box, given in host order.
    pub fn set_selection(&mut self, boxed: BoxDims) -> Result<()> {
        if self.shape_kind != ShapeKind::LocalArray && boxed.rank() != self.shape.len() {
            return Err(Error::selection(format!(
                "'{}' has rank {}, selection has rank {}",
                self.name,
                self.shape.len(),
                boxed.rank()
            )));
        }
        self.selection.boxed = Some(boxed);
        Ok(())
    }

    /// Select `count` steps starting at 0-based step `start`.
    pub fn set_step_selection(&mut self, start: usize, count: usize) -> Result<()> {
        if count == 0 {
            return Err(Error::selection(format!("empty step selection on '{}'", self.name)));
        }
        if start.checked_add(count).is_none() {
            return Err(Error::selection(format!("step selection {start}+{count} on '{}' overflows", self.name)));
        }
        self.selection.steps = Some((start, count));
        Ok(())
    }

    /// Restrict reads to block `id` of each selected step.
    pub fn set_block_selection(&mut self, id: usize) {
        self.selection.block_id = Some(id);
    }

    /// Steps covered by the current selection.
    pub fn step_range(&self) -> Result<Range<usize>> {
        let (start, count) = match self.selection.steps {
            Some(steps) => steps,
            None => {
                let first = self
                    .first_step()
                    .ok_or_else(|| Error::selection(format!("'{}' has no blocks", self.name)))?;
                (first, 1)
            }
        };
        Ok(start..start + count)
    }

    /// Selection box in file order, defaulting to the full shape.
    pub fn selection_box(&self, layout: LayoutState) -> BoxDims {
        match &self.selection.boxed {
            Some(b) if layout.reverse_dimensions => b.reversed(),
            Some(b) => b.clone(),
            None => BoxDims::from_count(&self.shape),
        }
    }

    /// Absorb the blocks of another definition of the same variable.
    fn merge(&mut self, other: VariableEntry) {
        for block in other.blocks.into_values().flatten() {
            self.add_block(block);
        }
    }
}

fn fold_extreme(slot: &mut Option<Value>, candidate: Option<&Value>, wanted: std::cmp::Ordering) {
    let Some(candidate) = candidate else {
        return;
    };
    match slot {
        Some(current) => {
            if candidate.compare(current) == Some(wanted) {
                *current = candidate.clone();
            }
        }
        None => *slot = Some(candidate.clone()),
    }
}

/// An attribute and its decoded values.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeEntry {
    pub name: String,
    pub path: String,
    pub kind: DataKind,
    pub values: Vec<Value>,
    /// Written as a scalar rather than an array.
    pub is_single_value: bool,
}

impl AttributeEntry {
    /// The value of a single-value attribute.
    pub fn value(&self) -> Option<&Value> {
        if self.is_single_value { self.values.first() } else { None }
    }
}

/// Insertion and lookup surface the decoder needs from a catalog.
pub trait Catalog: Send {
    /// Kind of a variable, without borrowing the entry.
    fn inquire_variable_kind(&self, name: &str) -> Option<DataKind>;

    fn inquire_variable(&self, name: &str) -> Option<&VariableEntry>;

    fn inquire_variable_mut(&mut self, name: &str) -> Option<&mut VariableEntry>;

    /// Insert a variable, or merge its blocks into an existing entry of the
    /// same kind. A different kind fails with [`Error::KindMismatch`].
    fn define_variable(&mut self, entry: VariableEntry) -> Result<&mut VariableEntry>;

    fn inquire_attribute(&self, name: &str) -> Option<&AttributeEntry>;

    /// Insert an attribute. The first definition wins; a later one of a
    /// different kind fails with [`Error::KindMismatch`].
    fn define_attribute(&mut self, entry: AttributeEntry) -> Result<()>;
}

/// Catalog held in ordered maps.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryCatalog {
    variables: BTreeMap<String, VariableEntry>,
    attributes: BTreeMap<String, AttributeEntry>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Variables ordered by name.
    pub fn variables(&self) -> impl Iterator<Item = &VariableEntry> {
        self.variables.values()
    }

    /// Attributes ordered by name.
    pub fn attributes(&self) -> impl Iterator<Item = &AttributeEntry> {
        self.attributes.values()
    }

    pub fn variables_count(&self) -> usize {
        self.variables.len()
    }

    pub fn attributes_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.attributes.is_empty()
    }
}

impl Catalog for MemoryCatalog {
    fn inquire_variable_kind(&self, name: &str) -> Option<DataKind> {
        self.variables.get(name).map(|v| v.kind)
    }

    fn inquire_variable(&self, name: &str) -> Option<&VariableEntry> {
        self.variables.get(name)
    }

    fn inquire_variable_mut(&mut self, name: &str) -> Option<&mut VariableEntry> {
        self.variables.get_mut(name)
    }

    fn define_variable(&mut self, entry: VariableEntry) -> Result<&mut VariableEntry> {
        use std::collections::btree_map::Entry;

        match self.variables.entry(entry.name.clone()) {
            Entry::Vacant(slot) => Ok(slot.insert(entry)),
            Entry::Occupied(slot) => {
                let existing = slot.into_mut();
                if existing.kind != entry.kind {
                    return Err(Error::KindMismatch {
                        name: entry.name,
                        expected: existing.kind,
                        found: entry.kind,
                    });
                }
                existing.merge(entry);
                Ok(existing)
            }
        }
    }

    fn inquire_attribute(&self, name: &str) -> Option<&AttributeEntry> {
        self.attributes.get(name)
    }

    fn define_attribute(&mut self, entry: AttributeEntry) -> Result<()> {
        if let Some(existing) = self.attributes.get(&entry.name) {
            if existing.kind != entry.kind {
                return Err(Error::KindMismatch {
                    name: entry.name,
                    expected: existing.kind,
                    found: entry.kind,
                });
            }
            return Ok(());
        }
        self.attributes.insert(entry.name.clone(), entry);
        Ok(())
    }
}
