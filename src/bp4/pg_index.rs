//! Process-group index parsing.
//!
//! Each writer rank contributes one process-group record per step. The
//! index yields the array orientation and the number of distinct steps.

use std::collections::HashSet;

use super::buffer::BufferReader;
use super::footer::Footer;
use super::format::*;
use crate::util::{Error, LayoutState, Result};

/// Fields of one process-group record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessGroupIndex {
    /// Declared record length, excluding the length word itself.
    pub length: u16,
    pub name: String,
    pub is_column_major: bool,
    pub process_id: i32,
    pub step_name: String,
    /// 1-based step id.
    pub step: u32,
    pub offset: u64,
}

/// Result of scanning the process-group index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PgIndexSummary {
    pub pg_count: u64,
    pub steps_count: usize,
    /// 0-based step of the last record.
    pub current_step: usize,
    pub layout: LayoutState,
}

/// Read one process-group record at `pos`, leaving `pos` at the next record.
pub fn read_process_group_index(reader: &BufferReader<'_>, pos: &mut usize) -> Result<ProcessGroupIndex> {
    let start = *pos;
    let length = reader.read_u16(pos)?;
    let end = start + PG_LENGTH_WORD + length as usize;
    let record = reader.limited(end).map_err(|_| Error::TruncatedBuffer {
        position: start,
        needed: PG_LENGTH_WORD + length as usize,
        len: reader.len(),
    })?;

    let name = record.read_string(pos)?;
    let is_column_major = record.read_u8(pos)? == COLUMN_MAJOR_MARKER;
    let process_id = record.read_i32(pos)?;
    let step_name = record.read_string(pos)?;
    let step = record.read_u32(pos)?;
    let offset = record.read_u64(pos)?;

    *pos = end;
    Ok(ProcessGroupIndex { length, name, is_column_major, process_id, step_name, step, offset })
}

/// Scan the process-group index located by `footer`.
pub fn parse_pg_index(buffer: &[u8], footer: &Footer, host_row_major: bool) -> Result<PgIndexSummary> {
    let reader = BufferReader::new(buffer, footer.endian);
    let mut pos = usize::try_from(footer.pg_index_start)
        .map_err(|_| Error::format("PG index offset exceeds usize"))?;

    let pg_count = reader.read_u64(&mut pos)?;
    let length = reader.read_usize(&mut pos)?;

    let mut row_major = true;
    let mut steps_found = HashSet::new();
    let mut current_step = 0;
    let mut local = 0usize;

    while local < length {
        let index = read_process_group_index(&reader, &mut pos)?;
        if index.is_column_major {
            row_major = false;
        }
        current_step = (index.step as usize).saturating_sub(1);
        steps_found.insert(index.step);

        local += index.length as usize + PG_LENGTH_WORD;
        if local > length {
            return Err(Error::format(format!(
                "process group '{}' overruns PG index length {length} (reached {local})",
                index.name
            )));
        }
        tracing::trace!(pg = %index.name, step = index.step, rank = index.process_id, "pg record");
    }

    let summary = PgIndexSummary {
        pg_count,
        steps_count: steps_found.len(),
        current_step,
        layout: LayoutState::new(row_major, host_row_major),
    };
    tracing::debug!(
        pg_count,
        steps = summary.steps_count,
        row_major,
        reverse = summary.layout.reverse_dimensions,
        "parsed process group index"
    );
    Ok(summary)
}
