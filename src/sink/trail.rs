//! In-memory audit trail recorder.
//!
//! Useful in tests and for inspecting what an audited flow produced.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{AuditSink, SinkError};
use crate::record::AuditRecord;

/// In-memory sink keeping every rendered entry and its record, in order.
///
/// # Example
///
/// ```
/// use audit_core::{AuditRecord, AuditSink, AuditTrail};
///
/// let trail = AuditTrail::new();
/// let record = AuditRecord::builder("alice", "LOGIN", "PORTAL").build();
///
/// trail.record("alice logged in", &record).unwrap();
///
/// assert_eq!(trail.len(), 1);
/// assert_eq!(trail.entries(), vec!["alice logged in"]);
/// assert_eq!(trail.records()[0].principal(), "alice");
/// ```
#[derive(Debug, Default)]
pub struct AuditTrail {
    entries: Mutex<Vec<(String, AuditRecord)>>,
}

impl AuditTrail {
    /// Creates a new empty audit trail.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    // A panic while holding the lock cannot leave the Vec half-written.
    fn lock(&self) -> MutexGuard<'_, Vec<(String, AuditRecord)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a snapshot of the rendered entries.
    pub fn entries(&self) -> Vec<String> {
        self.lock().iter().map(|(entry, _)| entry.clone()).collect()
    }

    /// Returns a snapshot of the recorded records.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.lock().iter().map(|(_, record)| record.clone()).collect()
    }

    /// Provides borrowed access to the records without cloning.
    pub fn with_records<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut dyn Iterator<Item = &AuditRecord>) -> R,
    {
        let guard = self.lock();
        let mut records = guard.iter().map(|(_, record)| record);
        f(&mut records)
    }

    /// Returns the number of recorded entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes all recorded entries.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl AuditSink for AuditTrail {
    fn record(&self, entry: &str, record: &AuditRecord) -> Result<(), SinkError> {
        self.lock().push((entry.to_string(), record.clone()));
        Ok(())
    }
}
