//! Destinations for rendered audit records.
//!
//! This module provides:
//! - `AuditSink`: the destination trait the pipeline writes to
//! - `AuditTrail`: in-memory recorder, for tests and inspection
//! - `TracingSink`: emits each record as a structured `tracing` event
//!
//! Sinks receive both the rendered entry and the record it was rendered
//! from, and use whichever suits the destination.

mod emitter;
mod trail;

use std::fmt;

use crate::record::AuditRecord;

pub use emitter::{TracingSink, AUDIT_TARGET};
pub use trail::AuditTrail;

/// Error returned when a sink cannot accept a record.
///
/// Carries a description for the diagnostic channel and, optionally, the
/// underlying cause.
///
/// # Examples
///
/// ```
/// use std::error::Error as _;
/// use std::io;
/// use audit_core::SinkError;
///
/// let cause = io::Error::new(io::ErrorKind::Other, "disk full");
/// let error = SinkError::with_source("cannot append to audit.log", cause);
/// assert_eq!(error.to_string(), "cannot append to audit.log: disk full");
/// assert!(error.source().is_some());
/// ```
#[derive(Debug)]
pub struct SinkError {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SinkError {
    /// Creates a sink error with a description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a sink error caused by `source`.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message, source),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Append-only destination for audit records.
///
/// Called exactly once per intercepted call outcome. Errors are reported on
/// the diagnostic channel by the pipeline and never reach the audited
/// operation's caller.
///
/// # Examples
///
/// ```
/// use std::sync::Mutex;
/// use audit_core::{AuditRecord, AuditSink, SinkError};
///
/// #[derive(Default)]
/// struct LineCollector {
///     lines: Mutex<Vec<String>>,
/// }
///
/// impl AuditSink for LineCollector {
///     fn record(&self, entry: &str, _record: &AuditRecord) -> Result<(), SinkError> {
///         self.lines.lock().unwrap().push(entry.to_string());
///         Ok(())
///     }
/// }
/// ```
pub trait AuditSink: Send + Sync {
    /// Appends one rendered record.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if the destination cannot accept the record.
    fn record(&self, entry: &str, record: &AuditRecord) -> Result<(), SinkError>;
}

impl<S: AuditSink + ?Sized> AuditSink for std::sync::Arc<S> {
    fn record(&self, entry: &str, record: &AuditRecord) -> Result<(), SinkError> {
        (**self).record(entry, record)
    }
}
