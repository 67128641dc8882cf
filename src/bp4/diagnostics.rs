//! Recoverable problems observed while parsing and resolving.
//!
//! Records that cannot be interpreted are skipped rather than failing the
//! whole parse. Each skip is counted and kept here so callers can tell a
//! clean parse from a lossy one.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::util::Error;

/// One element record the index scan passed over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedRecord {
    /// Offset of the record's length word in the metadata buffer.
    pub offset: usize,
    pub name: String,
    pub type_code: Option<i8>,
    pub reason: String,
}

/// Snapshot of the counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiagnosticsReport {
    pub unknown_element_types: usize,
    pub kind_mismatches: usize,
    pub unknown_characteristics: usize,
    pub unresolved_compound: usize,
    pub skipped: Vec<SkippedRecord>,
}

impl DiagnosticsReport {
    /// True if nothing was skipped or left unresolved.
    pub fn is_clean(&self) -> bool {
        self.unknown_element_types == 0
            && self.kind_mismatches == 0
            && self.unknown_characteristics == 0
            && self.unresolved_compound == 0
    }
}

/// Thread-safe diagnostics sink shared by the parse workers.
#[derive(Debug, Default)]
pub struct ParseDiagnostics {
    unknown_element_types: AtomicUsize,
    kind_mismatches: AtomicUsize,
    unknown_characteristics: AtomicUsize,
    unresolved_compound: AtomicUsize,
    skipped: Mutex<Vec<SkippedRecord>>,
}

impl ParseDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a skipped element record. Only record-local errors belong here.
    pub fn record_skip(&self, offset: usize, error: &Error) {
        let (name, type_code) = match error {
            Error::UnknownElementType { name, type_code, .. } => {
                self.unknown_element_types.fetch_add(1, Ordering::Relaxed);
                (name.as_str(), Some(*type_code))
            }
            Error::KindMismatch { name, .. } => {
                self.kind_mismatches.fetch_add(1, Ordering::Relaxed);
                (name.as_str(), None)
            }
            _ => ("", None),
        };
        tracing::warn!(record = %name, offset, %error, "skipping element record");

        let mut skipped = self.skipped.lock();
        let at = skipped.partition_point(|s| s.offset <= offset);
        skipped.insert(at, SkippedRecord { offset, name: name.to_string(), type_code, reason: error.to_string() });
    }

    pub fn record_unknown_characteristic(&self) {
        self.unknown_characteristics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unresolved_compound(&self, count: usize) {
        self.unresolved_compound.fetch_add(count, Ordering::Relaxed);
    }

    pub fn unknown_element_types(&self) -> usize {
        self.unknown_element_types.load(Ordering::Relaxed)
    }

    pub fn unresolved_compound(&self) -> usize {
        self.unresolved_compound.load(Ordering::Relaxed)
    }

    /// Copy of the current counters and skipped records, ordered by offset.
    pub fn report(&self) -> DiagnosticsReport {
        DiagnosticsReport {
            unknown_element_types: self.unknown_element_types.load(Ordering::Relaxed),
            kind_mismatches: self.kind_mismatches.load(Ordering::Relaxed),
            unknown_characteristics: self.unknown_characteristics.load(Ordering::Relaxed),
            unresolved_compound: self.unresolved_compound.load(Ordering::Relaxed),
            skipped: self.skipped.lock().clone(),
        }
    }

    /// Reset everything.
    pub fn clear(&self) {
        self.unknown_element_types.store(0, Ordering::Relaxed);
        self.kind_mismatches.store(0, Ordering::Relaxed);
        self.unknown_characteristics.store(0, Ordering::Relaxed);
        self.unresolved_compound.store(0, Ordering::Relaxed);
        self.skipped.lock().clear();
    }
}
