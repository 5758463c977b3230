//! Best-effort diagnostic channel.
//!
//! Problems with the auditing machinery itself (missing metadata, a record
//! that cannot be rendered, a sink that refuses it) must never change the
//! outcome of the audited operation. They are reported here, on their own
//! `tracing` target, and then dropped.

use std::fmt;

use crate::error::AuditFailure;
use crate::resolver::Argument;

/// Target of diagnostic events, distinct from the audit trail itself.
pub const DIAGNOSTIC_TARGET: &str = "audit_diagnostics";

/// Diagnostic logger bound to one audited call site.
///
/// All events carry the call site name so that a broken audit configuration
/// can be traced back to the operation it decorates.
#[derive(Debug, Clone, Copy)]
pub struct CallSiteLog<'a> {
    call_site: &'a str,
}

impl<'a> CallSiteLog<'a> {
    /// Creates a logger for `call_site`.
    pub fn new(call_site: &'a str) -> Self {
        Self { call_site }
    }

    /// Returns the call site name.
    pub fn call_site(&self) -> &str {
        self.call_site
    }

    /// Logs that an audited call is starting with `args`.
    ///
    /// The arguments are only rendered when TRACE is enabled for
    /// [`DIAGNOSTIC_TARGET`].
    pub fn entering(&self, args: &[Argument]) {
        tracing::trace!(
            target: DIAGNOSTIC_TARGET,
            call_site = %self.call_site,
            "entering with arguments {}",
            Listed(args)
        );
    }

    /// Logs that an audited call finished with `outcome`.
    pub fn leaving<T, E>(&self, outcome: &Result<T, E>)
    where
        T: fmt::Debug,
        E: fmt::Display,
    {
        match outcome {
            Ok(value) => tracing::trace!(
                target: DIAGNOSTIC_TARGET,
                call_site = %self.call_site,
                "leaving with return value [{:?}]",
                value
            ),
            Err(error) => tracing::trace!(
                target: DIAGNOSTIC_TARGET,
                call_site = %self.call_site,
                "leaving with error [{}]",
                error
            ),
        }
    }

    /// Reports an auditing failure.
    pub fn report(&self, failure: &AuditFailure) {
        tracing::warn!(
            target: DIAGNOSTIC_TARGET,
            call_site = %self.call_site,
            kind = %failure.kind(),
            "audit not recorded: {}",
            failure.message()
        );
    }
}

/// Renders call arguments as `[a, b]` without an intermediate `String`.
struct Listed<'a>(&'a [Argument]);

impl fmt::Display for Listed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, arg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str("]")
    }
}

/// Result of a best-effort auditing step.
///
/// The error variant is reported on the diagnostic channel and discarded.
pub trait BestEffort<T> {
    /// Returns the value, or reports the failure and returns `None`.
    fn or_report(self, log: &CallSiteLog<'_>) -> Option<T>;
}

impl<T> BestEffort<T> for Result<T, AuditFailure> {
    fn or_report(self, log: &CallSiteLog<'_>) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(failure) => {
                log.report(&failure);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditFailureKind;
    use crate::testing::capture_logs;
    use tracing::Level;

    #[test]
    fn call_site_is_kept() {
        let log = CallSiteLog::new("transfer");
        assert_eq!(log.call_site(), "transfer");
    }

    #[test]
    fn ok_passes_through() {
        let log = CallSiteLog::new("transfer");
        let result: Result<u32, AuditFailure> = Ok(7);
        assert_eq!(result.or_report(&log), Some(7));
    }

    #[test]
    fn failure_is_reported_and_discarded() {
        let log = CallSiteLog::new("transfer");
        let result: Result<u32, AuditFailure> =
            Err(AuditFailure::new(AuditFailureKind::Sink, "closed"));

        let (value, output) = capture_logs(Level::TRACE, || result.or_report(&log));

        assert_eq!(value, None);
        assert!(output.contains("WARN audit_diagnostics"));
        assert!(output.contains("audit not recorded: closed"));
        assert!(output.contains("call_site=transfer"));
        assert!(output.contains("kind=sink failed"));
    }

    #[test]
    fn entry_and_exit_traces_carry_arguments_and_outcome() {
        let log = CallSiteLog::new("transfer");
        let args = [Argument::from("acct-1"), Argument::list(["a", "b"])];

        let ((), output) = capture_logs(Level::TRACE, || {
            log.entering(&args);
            log.leaving(&Ok::<_, String>(42));
            log.leaving(&Err::<(), _>("insufficient funds"));
        });

        assert!(output.contains("TRACE audit_diagnostics"));
        assert!(output.contains("entering with arguments [acct-1, [a, b]]"));
        assert!(output.contains("leaving with return value [42]"));
        assert!(output.contains("leaving with error [insufficient funds]"));
    }

    #[test]
    fn traces_are_silent_below_trace_level() {
        let log = CallSiteLog::new("transfer");

        let ((), output) = capture_logs(Level::DEBUG, || {
            log.entering(&[Argument::from("acct-1")]);
            log.leaving(&Ok::<_, String>(()));
        });

        assert!(output.is_empty());
    }

    #[test]
    fn listed_arguments() {
        assert_eq!(Listed(&[]).to_string(), "[]");
        assert_eq!(
            Listed(&[Argument::from("x"), Argument::from(3)]).to_string(),
            "[x, 3]"
        );
    }
}
