//! Web framework integration surface.
//!
//! This module is the boundary between HTTP frameworks and the audit core.
//! It handles:
//! - Mapping requests to their transport addresses and headers
//! - Resolving the [`RequestIdentity`](crate::RequestIdentity) once per request
//! - Framing the request with a [`RequestScope`](crate::RequestScope) that is
//!   cleared on every exit path
//!
//! # Design Principles
//!
//! 1. **No Framework Dependencies**: Nothing here depends on a web framework.
//!    Integrations implement [`ExtractAddresses`] or build a [`RequestAdapter`].
//!
//! 2. **Explicit Context**: No thread-locals. The scope is a value owned by
//!    the request and lent to handlers.
//!
//! # Example Flow
//!
//! ```ignore
//! // In a framework-specific integration (e.g., axum, actix):
//! let adapter = RequestAdapter::from(&http_req);
//! let mut scope = RequestScope::new();
//!
//! with_request_identity(&resolver, &mut scope, Some(&adapter), |scope| {
//!     audited_transfer.call(scope, &[account.into(), amount.into()])
//! })?;
//! ```

mod adapter;
mod extract;
mod middleware;

pub use adapter::RequestAdapter;
pub use extract::ExtractAddresses;
pub use middleware::with_request_identity;
