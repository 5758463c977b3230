//! The audit interceptor.
//!
//! [`AuditPipeline`] wraps a business operation: it runs the operation,
//! resolves the resources it touched, assembles an [`AuditRecord`] from the
//! call-site metadata and the request identity, renders it and hands it to
//! the sink. [`Audited`] binds a pipeline to one call site so the result can
//! be passed around and composed like any other function.
//!
//! # Outcome handling
//!
//! ```text
//!                     ┌── Ok(value) ──> resolve_on_success ─┐
//! metadata ─> call ───┤                                     ├─> record ─> render ─> sink
//!                     └── Err(err) ───> resolve_on_failure ─┘
//! ```
//!
//! The operation's own `Result` is returned unchanged inside `Ok(..)`. The
//! outer `Err` is reserved for precondition violations of the resolvers.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::diagnostics::{BestEffort, CallSiteLog};
use crate::error::{AuditFailure, AuditFailureKind, Error, ResolutionError};
use crate::format::RecordFormatter;
use crate::record::AuditRecord;
use crate::resolver::{Argument, ResourceResolver};
use crate::scope::RequestScope;
use crate::sink::{AuditSink, TracingSink};

/// Who performed which action in which application.
///
/// Supplied per call site by whatever selects the audited operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMetadata {
    /// Who performed the action
    pub principal: String,
    /// What was done
    pub action_performed: String,
    /// Application the action belongs to
    pub application_code: String,
}

impl CallMetadata {
    /// Creates call-site metadata.
    pub fn new(
        principal: impl Into<String>,
        action_performed: impl Into<String>,
        application_code: impl Into<String>,
    ) -> Self {
        Self {
            principal: principal.into(),
            action_performed: action_performed.into(),
            application_code: application_code.into(),
        }
    }
}

/// Supplies [`CallMetadata`] for a call, possibly from its arguments.
///
/// A failure here is an auditing failure: the call still runs, no record is
/// produced, and the failure goes to the diagnostic channel.
pub trait MetadataSource: Send + Sync {
    /// Resolves the metadata of a call with `args`.
    ///
    /// # Errors
    ///
    /// Returns `AuditFailure` when the metadata is unavailable.
    fn resolve(&self, args: &[Argument]) -> Result<CallMetadata, AuditFailure>;
}

impl MetadataSource for CallMetadata {
    fn resolve(&self, _args: &[Argument]) -> Result<CallMetadata, AuditFailure> {
        Ok(self.clone())
    }
}

impl<F> MetadataSource for F
where
    F: Fn(&[Argument]) -> Result<CallMetadata, AuditFailure> + Send + Sync,
{
    fn resolve(&self, args: &[Argument]) -> Result<CallMetadata, AuditFailure> {
        self(args)
    }
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Intercepts business operations and records one audit entry per call.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use audit_core::{
///     Argument, AuditPipeline, AuditTrail, CallMetadata, FirstArgumentResolver,
///     RequestIdentity, RequestScope,
/// };
///
/// let trail = Arc::new(AuditTrail::new());
/// let pipeline = AuditPipeline::builder()
///     .resolver(FirstArgumentResolver::new())
///     .sink(trail.clone())
///     .build();
///
/// let mut scope = RequestScope::new();
/// let scope = scope.enter(RequestIdentity::new("10.0.0.1", "10.0.0.5"));
///
/// let metadata = CallMetadata::new("alice", "DELETE_DOCUMENT", "DOCS");
/// let outcome = pipeline
///     .intercept(&scope, "delete_document", &metadata, &[Argument::from("doc-1")], |args| {
///         Ok::<_, String>(format!("deleted {}", args[0]))
///     })
///     .unwrap();
///
/// assert_eq!(outcome, Ok("deleted doc-1".to_string()));
/// assert_eq!(trail.records()[0].resources_operated_upon(), ["doc-1"]);
/// ```
#[derive(Clone)]
pub struct AuditPipeline {
    resolvers: Vec<Arc<dyn ResourceResolver>>,
    formatter: RecordFormatter,
    sink: Arc<dyn AuditSink>,
    clock: Clock,
}

impl AuditPipeline {
    /// Starts building a pipeline.
    pub fn builder() -> AuditPipelineBuilder {
        AuditPipelineBuilder::default()
    }

    /// Returns the formatter.
    pub fn formatter(&self) -> &RecordFormatter {
        &self.formatter
    }

    /// Returns the number of configured resolvers.
    pub fn resolver_count(&self) -> usize {
        self.resolvers.len()
    }

    /// Runs `call` with `args` and records its outcome.
    ///
    /// `scope` supplies the request identity, `call_site` names the operation
    /// in diagnostics, and `metadata` supplies principal, action and
    /// application. Exactly one record reaches the sink per call, for success
    /// and failure alike, unless the metadata or the auditing infrastructure
    /// fails; those failures are logged and never affect the returned value.
    ///
    /// # Errors
    ///
    /// Returns `Error::Resolution` if a resolver's preconditions are not met
    /// by `args`. The operation has already run at that point.
    pub fn intercept<M, F, T, E>(
        &self,
        scope: &RequestScope,
        call_site: &str,
        metadata: &M,
        args: &[Argument],
        call: F,
    ) -> Result<Result<T, E>, Error>
    where
        M: MetadataSource + ?Sized,
        F: FnOnce(&[Argument]) -> Result<T, E>,
        T: fmt::Debug,
        E: fmt::Display,
    {
        let log = CallSiteLog::new(call_site);
        let metadata = metadata.resolve(args).or_report(&log);

        log.entering(args);
        let outcome = call(args);
        log.leaving(&outcome);

        let Some(metadata) = metadata else {
            return Ok(outcome);
        };

        let resources = match &outcome {
            Ok(value) => self.resolve_resources(|r| r.resolve_on_success(args, value)),
            Err(error) => self.resolve_resources(|r| r.resolve_on_failure(args, error)),
        };
        let resources = resources.map_err(|e| {
            tracing::error!(call_site = %call_site, error = %e, "resource resolver misconfigured");
            e
        })?;

        let record = AuditRecord::builder(
            metadata.principal,
            metadata.action_performed,
            metadata.application_code,
        )
        .resources(resources)
        .when((self.clock)())
        .identity(scope.get())
        .build();

        self.emit(&record, &log);
        Ok(outcome)
    }

    /// Binds this pipeline to one call site. See [`Audited`].
    pub fn decorate<F>(
        self: Arc<Self>,
        call_site: impl Into<String>,
        metadata: impl MetadataSource + 'static,
        operation: F,
    ) -> Audited<F> {
        Audited::new(self, call_site, metadata, operation)
    }

    fn resolve_resources<R>(&self, mut resolve: R) -> Result<Vec<String>, ResolutionError>
    where
        R: FnMut(&dyn ResourceResolver) -> Result<Vec<String>, ResolutionError>,
    {
        let mut resources = Vec::new();
        for resolver in &self.resolvers {
            resources.extend(resolve(resolver.as_ref())?);
        }
        Ok(resources)
    }

    fn emit(&self, record: &AuditRecord, log: &CallSiteLog<'_>) {
        let Some(entry) = self
            .formatter
            .render(record)
            .map_err(|e| AuditFailure::new(AuditFailureKind::Format, e.to_string()))
            .or_report(log)
        else {
            return;
        };

        self.sink
            .record(&entry, record)
            .map_err(|e| AuditFailure::new(AuditFailureKind::Sink, e.to_string()))
            .or_report(log);
    }
}

impl fmt::Debug for AuditPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditPipeline")
            .field("resolvers", &self.resolvers.len())
            .field("formatter", &self.formatter)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AuditPipeline`].
///
/// Defaults: no resolvers, multi-line formatting, [`TracingSink`], and the
/// system clock.
#[derive(Default)]
pub struct AuditPipelineBuilder {
    resolvers: Vec<Arc<dyn ResourceResolver>>,
    formatter: RecordFormatter,
    sink: Option<Arc<dyn AuditSink>>,
    clock: Option<Clock>,
}

impl AuditPipelineBuilder {
    /// Appends a resolver. Resolvers run in the order they are added.
    pub fn resolver(mut self, resolver: impl ResourceResolver + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    /// Appends already shared resolvers, e.g. from a [`ResolverRegistry`](crate::ResolverRegistry).
    pub fn resolvers(mut self, resolvers: impl IntoIterator<Item = Arc<dyn ResourceResolver>>) -> Self {
        self.resolvers.extend(resolvers);
        self
    }

    /// Sets the formatter.
    pub fn formatter(mut self, formatter: RecordFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Sets the sink.
    pub fn sink(mut self, sink: impl AuditSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Sets the clock used to timestamp records.
    pub fn clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Builds the pipeline.
    pub fn build(self) -> AuditPipeline {
        AuditPipeline {
            resolvers: self.resolvers,
            formatter: self.formatter,
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
            clock: self.clock.unwrap_or_else(|| Arc::new(Utc::now)),
        }
    }
}

/// An operation decorated with auditing.
///
/// Binds a shared pipeline, a call-site name and its metadata to the
/// operation, replacing declarative call-site matching with an explicit
/// wrapper.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use audit_core::{
///     Argument, AuditPipeline, AuditTrail, Audited, CallMetadata, FirstArgumentResolver,
///     RequestScope,
/// };
///
/// let trail = Arc::new(AuditTrail::new());
/// let pipeline = Arc::new(
///     AuditPipeline::builder()
///         .resolver(FirstArgumentResolver::new())
///         .sink(trail.clone())
///         .build(),
/// );
///
/// let close_account = Audited::new(
///     pipeline,
///     "close_account",
///     CallMetadata::new("alice", "CLOSE_ACCOUNT", "BANK"),
///     |args: &[Argument]| -> Result<(), String> {
///         Err(format!("account {} has a balance", args[0]))
///     },
/// );
///
/// let scope = RequestScope::new();
/// let outcome = close_account.call(&scope, &[Argument::from("acct-9")]).unwrap();
///
/// assert_eq!(outcome, Err("account acct-9 has a balance".to_string()));
/// assert_eq!(trail.len(), 1);
/// ```
pub struct Audited<F> {
    pipeline: Arc<AuditPipeline>,
    call_site: String,
    metadata: Arc<dyn MetadataSource>,
    operation: F,
}

impl<F> Audited<F> {
    /// Decorates `operation` with `pipeline`.
    pub fn new(
        pipeline: Arc<AuditPipeline>,
        call_site: impl Into<String>,
        metadata: impl MetadataSource + 'static,
        operation: F,
    ) -> Self {
        Self {
            pipeline,
            call_site: call_site.into(),
            metadata: Arc::new(metadata),
            operation,
        }
    }

    /// Returns the call-site name.
    pub fn call_site(&self) -> &str {
        &self.call_site
    }

    /// Runs the operation through the pipeline.
    ///
    /// # Errors
    ///
    /// See [`AuditPipeline::intercept`].
    pub fn call<T, E>(&self, scope: &RequestScope, args: &[Argument]) -> Result<Result<T, E>, Error>
    where
        F: Fn(&[Argument]) -> Result<T, E>,
        T: fmt::Debug,
        E: fmt::Display,
    {
        self.pipeline.intercept(
            scope,
            &self.call_site,
            self.metadata.as_ref(),
            args,
            &self.operation,
        )
    }
}

impl<F> fmt::Debug for Audited<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Audited")
            .field("call_site", &self.call_site)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{AuditFormat, FormatterConfig};
    use crate::identity::RequestIdentity;
    use crate::resolver::{FirstArgumentResolver, ReturnValueResolver};
    use crate::sink::{AuditTrail, SinkError};
    use crate::testing::capture_logs;
    use tracing::Level;
    use chrono::TimeZone;
    use std::cell::Cell;

    struct ClosedSink;

    impl AuditSink for ClosedSink {
        fn record(&self, _entry: &str, _record: &AuditRecord) -> Result<(), SinkError> {
            Err(SinkError::new("sink closed"))
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap()
    }

    fn pipeline(trail: &Arc<AuditTrail>) -> AuditPipeline {
        AuditPipeline::builder()
            .resolver(FirstArgumentResolver::new())
            .sink(trail.clone())
            .clock(fixed_time)
            .build()
    }

    fn metadata() -> CallMetadata {
        CallMetadata::new("alice", "DELETE_DOCUMENT", "DOCS")
    }

    #[test]
    fn success_produces_one_record() {
        let trail = Arc::new(AuditTrail::new());
        let mut scope = RequestScope::new();
        scope.set(RequestIdentity::new("10.0.0.1", "10.0.0.5"));

        let outcome = pipeline(&trail)
            .intercept(&scope, "delete", &metadata(), &[Argument::from("doc-1")], |_| {
                Ok::<_, String>(42)
            })
            .unwrap();

        assert_eq!(outcome, Ok(42));
        assert_eq!(trail.len(), 1);

        let record = &trail.records()[0];
        assert_eq!(record.principal(), "alice");
        assert_eq!(record.action_performed(), "DELETE_DOCUMENT");
        assert_eq!(record.application_code(), "DOCS");
        assert_eq!(record.resources_operated_upon(), ["doc-1"]);
        assert_eq!(record.when_action_was_performed(), fixed_time());
        assert_eq!(record.client_ip_address(), "10.0.0.5");
        assert_eq!(record.server_ip_address(), "10.0.0.1");
    }

    #[test]
    fn failure_produces_one_record_and_returns_error_unchanged() {
        let trail = Arc::new(AuditTrail::new());
        let scope = RequestScope::new();

        let outcome = pipeline(&trail)
            .intercept(&scope, "delete", &metadata(), &[Argument::from("doc-1")], |_| {
                Err::<(), _>("permission denied".to_string())
            })
            .unwrap();

        assert_eq!(outcome, Err("permission denied".to_string()));
        assert_eq!(trail.len(), 1);
        assert_eq!(trail.records()[0].resources_operated_upon(), ["doc-1"]);
        assert_eq!(trail.records()[0].client_ip_address(), "unknown");
    }

    #[test]
    fn resolvers_concatenate_in_order() {
        let trail = Arc::new(AuditTrail::new());
        let pipeline = AuditPipeline::builder()
            .resolver(FirstArgumentResolver::new())
            .resolver(ReturnValueResolver::new())
            .resolver(FirstArgumentResolver::with_prefix("batch:"))
            .sink(trail.clone())
            .build();

        pipeline
            .intercept(
                &RequestScope::new(),
                "archive",
                &metadata(),
                &[Argument::list(["d1", "d2"])],
                |_| Ok::<_, String>(2),
            )
            .unwrap()
            .unwrap();

        assert_eq!(
            trail.records()[0].resources_operated_upon(),
            ["[d1, d2]", "2", "batch:[d1, d2]"]
        );
    }

    #[test]
    fn failure_path_sees_the_error() {
        let trail = Arc::new(AuditTrail::new());
        let pipeline = AuditPipeline::builder()
            .resolver(ReturnValueResolver::new())
            .sink(trail.clone())
            .build();

        let _ = pipeline
            .intercept(&RequestScope::new(), "pay", &metadata(), &[], |_| {
                Err::<(), _>("insufficient funds")
            })
            .unwrap();

        assert_eq!(trail.records()[0].resources_operated_upon(), ["insufficient funds"]);
    }

    #[test]
    fn resolver_precondition_violation_propagates() {
        let trail = Arc::new(AuditTrail::new());

        let result = pipeline(&trail).intercept(&RequestScope::new(), "delete", &metadata(), &[], |_| {
            Ok::<_, String>(())
        });

        assert!(matches!(
            result,
            Err(Error::Resolution(ResolutionError::MissingArgument { index: 0 }))
        ));
        assert!(trail.is_empty());
    }

    #[test]
    fn metadata_failure_still_runs_call() {
        let trail = Arc::new(AuditTrail::new());
        let ran = Cell::new(false);
        let unavailable = |_: &[Argument]| -> Result<CallMetadata, AuditFailure> {
            Err(AuditFailure::new(AuditFailureKind::Metadata, "no principal"))
        };

        let outcome = pipeline(&trail)
            .intercept(&RequestScope::new(), "delete", &unavailable, &[Argument::from("d")], |_| {
                ran.set(true);
                Ok::<_, String>("done")
            })
            .unwrap();

        assert!(ran.get());
        assert_eq!(outcome, Ok("done"));
        assert!(trail.is_empty());
    }

    #[test]
    fn metadata_from_arguments() {
        let trail = Arc::new(AuditTrail::new());
        let from_args = |args: &[Argument]| -> Result<CallMetadata, AuditFailure> {
            args.get(1)
                .map(|user| CallMetadata::new(user.to_string(), "RENAME", "DOCS"))
                .ok_or_else(|| AuditFailure::new(AuditFailureKind::Metadata, "no user argument"))
        };

        pipeline(&trail)
            .intercept(
                &RequestScope::new(),
                "rename",
                &from_args,
                &[Argument::from("doc-1"), Argument::from("bob")],
                |_| Ok::<_, String>(()),
            )
            .unwrap()
            .unwrap();

        assert_eq!(trail.records()[0].principal(), "bob");
    }

    #[test]
    fn sink_failure_does_not_change_outcome() {
        let pipeline = AuditPipeline::builder()
            .resolver(FirstArgumentResolver::new())
            .sink(ClosedSink)
            .build();

        let outcome = pipeline
            .intercept(&RequestScope::new(), "delete", &metadata(), &[Argument::from("d")], |_| {
                Ok::<_, String>(1)
            })
            .unwrap();

        assert_eq!(outcome, Ok(1));
    }

    #[test]
    fn metadata_failure_warns_on_diagnostic_target_only() {
        let pipeline = AuditPipeline::builder()
            .resolver(FirstArgumentResolver::new())
            .build();
        let unavailable = |_: &[Argument]| -> Result<CallMetadata, AuditFailure> {
            Err(AuditFailure::new(AuditFailureKind::Metadata, "no principal"))
        };

        let (outcome, output) = capture_logs(Level::INFO, || {
            pipeline.intercept(
                &RequestScope::new(),
                "purge_documents",
                &unavailable,
                &[Argument::from("d")],
                |_| Ok::<_, String>(3),
            )
        });

        assert_eq!(outcome.unwrap(), Ok(3));
        assert!(output.contains("WARN audit_diagnostics"));
        assert!(output.contains("call_site=purge_documents"));
        assert!(output.contains("kind=metadata unavailable"));
        assert!(output.contains("no principal"));
        assert!(!output.contains("audit_trail"));
    }

    #[test]
    fn sink_failure_warns_on_diagnostic_target_only() {
        let pipeline = AuditPipeline::builder()
            .resolver(FirstArgumentResolver::new())
            .sink(ClosedSink)
            .build();

        let (outcome, output) = capture_logs(Level::INFO, || {
            pipeline.intercept(
                &RequestScope::new(),
                "archive_document",
                &metadata(),
                &[Argument::from("d")],
                |_| Err::<(), _>("locked".to_string()),
            )
        });

        assert_eq!(outcome.unwrap(), Err("locked".to_string()));
        assert!(output.contains("WARN audit_diagnostics"));
        assert!(output.contains("call_site=archive_document"));
        assert!(output.contains("kind=sink failed"));
        assert!(output.contains("sink closed"));
        assert!(!output.contains("audit_trail"));
    }

    #[test]
    fn call_entry_and_exit_are_traced() {
        let trail = Arc::new(AuditTrail::new());
        let pipeline = pipeline(&trail);

        let (_, output) = capture_logs(Level::TRACE, || {
            pipeline
                .intercept(
                    &RequestScope::new(),
                    "transfer",
                    &metadata(),
                    &[Argument::from("acct-1"), Argument::from(5)],
                    |_| Ok::<_, String>(42),
                )
                .unwrap()
        });

        assert!(output.contains("entering with arguments [acct-1, 5]"));
        assert!(output.contains("leaving with return value [42]"));
        assert!(output.contains("call_site=transfer"));
        assert_eq!(trail.len(), 1);
    }

    #[test]
    fn formatter_output_reaches_sink() {
        let trail = Arc::new(AuditTrail::new());
        let pipeline = AuditPipeline::builder()
            .resolver(FirstArgumentResolver::new())
            .formatter(RecordFormatter::new(FormatterConfig {
                format: AuditFormat::SingleLine,
                entry_separator: "|".to_string(),
                ..FormatterConfig::default()
            }))
            .sink(trail.clone())
            .clock(fixed_time)
            .build();

        pipeline
            .intercept(&RequestScope::new(), "delete", &metadata(), &[Argument::from("d")], |_| {
                Ok::<_, String>(())
            })
            .unwrap()
            .unwrap();

        assert_eq!(
            trail.entries(),
            vec!["2024-03-01T12:30:45.000Z|DOCS|[d]|DELETE_DOCUMENT|alice|unknown|unknown"]
        );
    }

    #[test]
    fn default_sink_is_tracing() {
        let pipeline = AuditPipeline::builder().build();
        assert_eq!(pipeline.resolver_count(), 0);

        let outcome = pipeline
            .intercept(&RequestScope::new(), "noop", &metadata(), &[], |_| Ok::<_, String>(()))
            .unwrap();
        assert!(outcome.is_ok());
    }

    #[test]
    fn audited_records_every_call() {
        let trail = Arc::new(AuditTrail::new());
        let audited = Arc::new(pipeline(&trail)).decorate(
            "delete",
            metadata(),
            |args: &[Argument]| -> Result<String, String> { Ok(args[0].to_string()) },
        );
        let scope = RequestScope::new();

        for id in ["d1", "d2", "d3"] {
            audited.call(&scope, &[Argument::from(id)]).unwrap().unwrap();
        }

        assert_eq!(audited.call_site(), "delete");
        assert_eq!(trail.len(), 3);
        let resources: Vec<String> = trail
            .records()
            .iter()
            .flat_map(|r| r.resources_operated_upon().to_vec())
            .collect();
        assert_eq!(resources, vec!["d1", "d2", "d3"]);
    }
}
