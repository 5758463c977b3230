//! Interception-based audit trail for business operations.
//!
//! This crate records who did what, to which resources, from where and when,
//! by wrapping business operations rather than sprinkling logging through
//! them:
//! - **Request boundary**: resolves the client and server addresses of each
//!   inbound request and makes them available for the request's duration
//! - **Resource resolution**: pluggable strategies derive the resources an
//!   operation acted upon from its arguments and outcome
//! - **Recording**: one immutable record per call, rendered as text or JSON
//!   and handed to a sink
//!
//! # Core Types
//!
//! - [`RequestScope`]: The identity of the request being served
//! - [`IdentityResolver`]: Derives a [`RequestIdentity`] from a request
//! - [`ResourceResolver`]: Strategy naming the resources of a call
//! - [`AuditPipeline`]: The interceptor; [`Audited`] binds it to one operation
//! - [`RecordFormatter`]: Multi-line, single-line or structured rendering
//! - [`AuditSink`]: Where rendered records go ([`TracingSink`], [`AuditTrail`])
//!
//! Auditing problems never change the outcome of the audited operation. They
//! are reported on the [`DIAGNOSTIC_TARGET`] tracing target instead.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use audit_core::web::{with_request_identity, RequestAdapter};
//! use audit_core::{
//!     Argument, AuditPipeline, AuditTrail, CallMetadata, FirstArgumentResolver,
//!     IdentityConfig, IdentityResolver, RequestScope,
//! };
//!
//! let trail = Arc::new(AuditTrail::new());
//! let pipeline = AuditPipeline::builder()
//!     .resolver(FirstArgumentResolver::new())
//!     .sink(trail.clone())
//!     .build();
//!
//! let identity = IdentityResolver::new(IdentityConfig::default());
//! let request = RequestAdapter::new("10.0.0.1", "203.0.113.7");
//! let mut scope = RequestScope::new();
//!
//! let outcome = with_request_identity(&identity, &mut scope, Some(&request), |scope| {
//!     let metadata = CallMetadata::new("alice", "TRANSFER_FUNDS", "BANK");
//!     pipeline.intercept(scope, "transfer", &metadata, &[Argument::from("acct-1")], |_| {
//!         Ok::<_, String>(100)
//!     })
//! })
//! .unwrap();
//!
//! assert_eq!(outcome.unwrap(), Ok(100));
//! assert!(!scope.is_set());
//!
//! let record = &trail.records()[0];
//! assert_eq!(record.client_ip_address(), "203.0.113.7");
//! assert_eq!(record.resources_operated_upon(), ["acct-1"]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod diagnostics;
mod error;
mod format;
mod identity;
mod pipeline;
mod record;
mod resolver;
mod scope;
mod sink;
pub mod web;

#[cfg(test)]
mod testing;

pub use config::{AuditConfig, ResolverConfig};
pub use diagnostics::{BestEffort, CallSiteLog, DIAGNOSTIC_TARGET};
pub use error::{
    AuditFailure, AuditFailureKind, ConfigError, Error, IdentityError, ResolutionError,
};
pub use format::{render, AuditFormat, FormatError, FormatterConfig, RecordFormatter, DEFAULT_ENTRY_SEPARATOR};
pub use identity::{
    HostAddressLookup, IdentityConfig, IdentityResolver, RequestIdentity, SystemHostLookup,
    UNKNOWN_ADDRESS,
};
pub use pipeline::{AuditPipeline, AuditPipelineBuilder, Audited, CallMetadata, MetadataSource};
pub use record::{AuditRecord, AuditRecordBuilder};
pub use resolver::{
    Argument, FirstArgumentResolver, ParametersAsStringResolver, ResolverRegistry,
    ResourceResolver, ReturnValueResolver,
};
pub use scope::{RequestScope, ScopeGuard};
pub use sink::{AuditSink, AuditTrail, SinkError, TracingSink, AUDIT_TARGET};
