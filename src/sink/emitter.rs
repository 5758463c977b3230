//! Sink emitting audit records through `tracing`.

use super::{AuditSink, SinkError};
use crate::record::AuditRecord;

/// Target of the events emitted by [`TracingSink`].
pub const AUDIT_TARGET: &str = "audit_trail";

/// Emits every audit record as an INFO event on the `audit_trail` target.
///
/// The event carries the record's fields as structured fields and the
/// rendered entry as its message, so subscribers can route audit output
/// separately from application logs.
///
/// # Example
///
/// ```
/// use audit_core::{AuditRecord, AuditSink, TracingSink};
///
/// let record = AuditRecord::builder("alice", "LOGIN", "PORTAL").build();
/// TracingSink.record("alice logged in", &record).unwrap();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, entry: &str, record: &AuditRecord) -> Result<(), SinkError> {
        tracing::info!(
            target: AUDIT_TARGET,
            who = %record.principal(),
            what = %record.resources_string(),
            action = %record.action_performed(),
            application = %record.application_code(),
            when = %record.when_string(),
            client_ip_address = %record.client_ip_address(),
            server_ip_address = %record.server_ip_address(),
            "{}",
            entry
        );
        Ok(())
    }
}
