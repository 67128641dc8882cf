//! Metadata deserializer: ties the index parsers, read planning and block
//! decoding together around one metadata buffer.

use std::collections::BTreeMap;

use super::diagnostics::{DiagnosticsReport, ParseDiagnostics};
use super::footer::{parse_minifooter, Footer};
use super::index::{parse_attributes_index, parse_variables_index};
use super::pg_index::{parse_pg_index, PgIndexSummary};
use crate::core::{
    clip_contiguous_memory, clip_interval, get_subfile_info, identity_operation,
    perform_gets_variables_subfile_info, BlockOperationInfo, Catalog, ElementSpec, OperatorRegistry,
    ShapeKind, SubFileInfoMap, SubStreamBoxInfo, VariableEntry,
};
use crate::util::{BoxDims, DataKind, Error, LayoutState, Result};

/// Upper bound on the default number of index workers.
const MAX_DEFAULT_THREADS: usize = 8;

/// Parse options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeserializerOptions {
    /// Workers for the variable index scan. 1 parses sequentially.
    pub threads: usize,
    /// The reading host expects the last dimension to vary fastest.
    pub host_row_major: bool,
}

impl Default for DeserializerOptions {
    fn default() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .clamp(1, MAX_DEFAULT_THREADS);
        Self { threads, host_row_major: true }
    }
}

impl DeserializerOptions {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_host_row_major(mut self, host_row_major: bool) -> Self {
        self.host_row_major = host_row_major;
        self
    }
}

/// Reader-side state for one BP4 metadata buffer.
#[derive(Debug)]
pub struct Deserializer {
    options: DeserializerOptions,
    footer: Option<Footer>,
    pg: Option<PgIndexSummary>,
    layout: LayoutState,
    operators: OperatorRegistry,
    deferred: BTreeMap<String, SubFileInfoMap>,
    diagnostics: ParseDiagnostics,
}

impl Default for Deserializer {
    fn default() -> Self {
        Self::new(DeserializerOptions::default())
    }
}

impl Deserializer {
    pub fn new(options: DeserializerOptions) -> Self {
        Self {
            options,
            footer: None,
            pg: None,
            layout: LayoutState::new(true, options.host_row_major),
            operators: OperatorRegistry::default(),
            deferred: BTreeMap::new(),
            diagnostics: ParseDiagnostics::new(),
        }
    }

    /// Replace the codec registry.
    pub fn with_operators(mut self, operators: OperatorRegistry) -> Self {
        self.operators = operators;
        self
    }

    #[inline]
    pub fn options(&self) -> &DeserializerOptions {
        &self.options
    }

    #[inline]
    pub fn operators(&self) -> &OperatorRegistry {
        &self.operators
    }

    #[inline]
    pub fn operators_mut(&mut self) -> &mut OperatorRegistry {
        &mut self.operators
    }

    /// Footer of the last successfully parsed buffer.
    #[inline]
    pub fn footer(&self) -> Option<&Footer> {
        self.footer.as_ref()
    }

    #[inline]
    pub fn layout(&self) -> LayoutState {
        self.layout
    }

    /// Number of process-group records.
    pub fn pg_count(&self) -> u64 {
        self.pg.as_ref().map_or(0, |pg| pg.pg_count)
    }

    /// Number of distinct steps in the process-group index.
    pub fn steps_count(&self) -> usize {
        self.pg.as_ref().map_or(0, |pg| pg.steps_count)
    }

    /// 0-based step of the last process group.
    pub fn current_step(&self) -> usize {
        self.pg.as_ref().map_or(0, |pg| pg.current_step)
    }

    /// Snapshot of records skipped and variables left unresolved.
    pub fn diagnostics(&self) -> DiagnosticsReport {
        self.diagnostics.report()
    }

    /// True if block bytes need swapping on this host.
    fn needs_swap(&self) -> bool {
        self.footer.as_ref().is_some_and(|f| !f.is_host_endian())
    }

    /// Parse footer and all three indices of `buffer` into `catalog`.
    ///
    /// Footer and process-group index are validated before anything is
    /// stored, so a rejected buffer leaves the deserializer as it was.
    #[tracing::instrument(skip_all, fields(len = buffer.len(), threads = self.options.threads))]
    pub fn parse_metadata<C: Catalog>(&mut self, buffer: &[u8], catalog: &mut C) -> Result<()> {
        let footer = parse_minifooter(buffer)?;
        let pg = parse_pg_index(buffer, &footer, self.options.host_row_major)?;

        self.diagnostics.clear();
        self.layout = pg.layout;
        self.footer = Some(footer.clone());
        self.pg = Some(pg);

        let variables = parse_variables_index(buffer, &footer, catalog, self.options.threads, &self.diagnostics)?;
        let attributes = parse_attributes_index(buffer, &footer, catalog, &self.diagnostics)?;

        tracing::debug!(
            variables,
            attributes,
            steps = self.steps_count(),
            skipped = self.diagnostics.unknown_element_types(),
            "parsed metadata"
        );
        Ok(())
    }

    /// Queue a variable for the next [`Self::perform_gets_variables_subfile_info`].
    pub fn defer_variable(&mut self, name: impl Into<String>) {
        self.deferred.entry(name.into()).or_default();
    }

    /// Read plans of all queued variables.
    pub fn deferred(&self) -> &BTreeMap<String, SubFileInfoMap> {
        &self.deferred
    }

    /// Drain the queue and its plans.
    pub fn take_deferred(&mut self) -> BTreeMap<String, SubFileInfoMap> {
        std::mem::take(&mut self.deferred)
    }

    /// Rebuild the read plan of every queued variable.
    pub fn perform_gets_variables_subfile_info<C: Catalog + ?Sized>(
        &mut self,
        catalog: &C,
    ) -> Result<&BTreeMap<String, SubFileInfoMap>> {
        let unresolved = perform_gets_variables_subfile_info(&mut self.deferred, catalog, self.layout, &self.operators)?;
        self.diagnostics.record_unresolved_compound(unresolved);
        Ok(&self.deferred)
    }

    /// Read plan for one variable, outside the queue.
    pub fn sync_variable_subfile_info<C: Catalog + ?Sized>(&self, catalog: &C, name: &str) -> Result<SubFileInfoMap> {
        let variable = catalog
            .inquire_variable(name)
            .ok_or_else(|| Error::VariableNotFound(name.to_string()))?;
        get_subfile_info(variable, self.layout, &self.operators)
    }

    /// See [`OperatorRegistry::init_post_operator_block_data`].
    pub fn init_post_operator_block_data<'a>(
        &self,
        operations: &'a [BlockOperationInfo],
        post_op_data: &mut Vec<u8>,
        identity: bool,
    ) -> Result<&'a BlockOperationInfo> {
        self.operators.init_post_operator_block_data(operations, post_op_data, identity)
    }

    /// See [`OperatorRegistry::get_pre_operator_block_data`].
    pub fn get_pre_operator_block_data(
        &self,
        post_op_data: &[u8],
        info: &BlockOperationInfo,
        pre_op_data: &mut Vec<u8>,
    ) -> Result<()> {
        self.operators.get_pre_operator_block_data(post_op_data, info, pre_op_data)
    }

    /// Copy the intersection of a whole decoded block into `dest`, which
    /// covers the variable's current selection.
    pub fn clip_memory<C: Catalog + ?Sized>(
        &self,
        catalog: &C,
        name: &str,
        src: &[u8],
        block_box: &BoxDims,
        intersection: &BoxDims,
        dest: &mut [u8],
    ) -> Result<()> {
        let variable = catalog
            .inquire_variable(name)
            .ok_or_else(|| Error::VariableNotFound(name.to_string()))?;
        let element = self.element_spec(variable)?;
        let dest_box = self.destination_box(variable, block_box);
        clip_contiguous_memory(dest, &dest_box, src, block_box, intersection, self.layout, element)
    }

    /// Land the bytes fetched for one planned block into `dest`, decoding
    /// the transform chain first when there is one.
    pub fn land_block<C: Catalog + ?Sized>(
        &self,
        catalog: &C,
        name: &str,
        info: &SubStreamBoxInfo,
        fetched: &[u8],
        dest: &mut [u8],
    ) -> Result<()> {
        let variable = catalog
            .inquire_variable(name)
            .ok_or_else(|| Error::VariableNotFound(name.to_string()))?;
        let element = self.element_spec(variable)?;
        let dest_box = self.destination_box(variable, &info.block_box);

        if info.operations.is_empty() {
            return clip_interval(dest, &dest_box, fetched, &info.block_box, &info.intersection_box, self.layout, element);
        }
        if identity_operation(&info.operations) {
            return clip_contiguous_memory(dest, &dest_box, fetched, &info.block_box, &info.intersection_box, self.layout, element);
        }

        let mut post = fetched.to_vec();
        let active = self.operators.init_post_operator_block_data(&info.operations, &mut post, true)?;
        let mut pre = Vec::new();
        self.operators.get_pre_operator_block_data(&post, active, &mut pre)?;
        let element = ElementSpec::for_operation(active, self.needs_swap());
        clip_contiguous_memory(dest, &dest_box, &pre, &info.block_box, &info.intersection_box, self.layout, element)
    }

    fn element_spec(&self, variable: &VariableEntry) -> Result<ElementSpec> {
        match variable.kind {
            DataKind::String | DataKind::Compound => {
                Err(Error::UnsupportedKind { name: variable.name.clone(), kind: variable.kind })
            }
            kind => ElementSpec::for_kind(kind, self.needs_swap())
                .ok_or_else(|| Error::UnsupportedKind { name: variable.name.clone(), kind }),
        }
    }

    /// Destination box in host order: the selection, or by default the
    /// full shape (the block itself for local arrays).
    fn destination_box(&self, variable: &VariableEntry, block_box: &BoxDims) -> BoxDims {
        if let Some(boxed) = &variable.selection.boxed {
            return boxed.clone();
        }
        match variable.shape_kind {
            ShapeKind::LocalArray => {
                let count = self.layout.to_file_order(&block_box.count);
                BoxDims::from_count(&count)
            }
            ShapeKind::GlobalValue => BoxDims::scalar(),
            ShapeKind::LocalValue | ShapeKind::GlobalArray => BoxDims::from_count(&variable.shape_in(self.layout)),
        }
    }
}
