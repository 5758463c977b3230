//! Request boundary hook that frames a request with its identity.
//!
//! This is the Rust counterpart of a servlet filter: it runs once per inbound
//! request, before any audited code, and owns the [`RequestScope`] lifecycle.
//!
//! # Integration Flow
//!
//! ```text
//! HTTP Request
//!   ↓
//! Framework-specific code builds RequestAdapter (or implements ExtractAddresses)
//!   ↓
//! with_request_identity() resolves RequestIdentity and enters the scope
//!   ↓
//! Handler runs with &RequestScope, audited calls read the identity
//!   ↓
//! Scope cleared (return, error or panic)
//! ```

use crate::error::Error;
use crate::identity::IdentityResolver;
use crate::scope::RequestScope;

use super::ExtractAddresses;

/// Runs `body` with `scope` populated from `request`.
///
/// The identity is resolved with `resolver`, stored in `scope`, and the
/// scope is cleared when `body` returns or unwinds. Whatever `body` returns,
/// including its own `Result`, is passed through untouched.
///
/// # Errors
///
/// Returns `Error::Identity` if the identity cannot be resolved (only
/// possible with host address lookup enabled). `body` is not run and the
/// scope is left cleared.
///
/// # Examples
///
/// ```
/// use audit_core::web::{with_request_identity, RequestAdapter};
/// use audit_core::{IdentityConfig, IdentityResolver, RequestScope};
///
/// let resolver = IdentityResolver::new(IdentityConfig::default());
/// let request = RequestAdapter::new("10.0.0.1", "10.0.0.5");
/// let mut scope = RequestScope::new();
///
/// let client = with_request_identity(&resolver, &mut scope, Some(&request), |scope| {
///     scope.get().client_ip_address().to_string()
/// })
/// .unwrap();
///
/// assert_eq!(client, "10.0.0.5");
/// assert!(!scope.is_set());
/// ```
pub fn with_request_identity<R, F, T>(
    resolver: &IdentityResolver,
    scope: &mut RequestScope,
    request: Option<&R>,
    body: F,
) -> Result<T, Error>
where
    R: ExtractAddresses + ?Sized,
    F: FnOnce(&RequestScope) -> T,
{
    let identity = match resolver.resolve(request) {
        Ok(identity) => identity,
        Err(e) => {
            scope.clear();
            tracing::error!(error = %e, "cannot resolve request identity");
            return Err(e.into());
        }
    };

    let guard = scope.enter(identity);
    Ok(body(&guard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IdentityError;
    use crate::identity::{IdentityConfig, RequestIdentity};
    use crate::web::RequestAdapter;
    use std::panic::{self, AssertUnwindSafe};

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(IdentityConfig::default())
    }

    #[test]
    fn body_sees_identity() {
        let request = RequestAdapter::new("10.0.0.1", "10.0.0.5");
        let mut scope = RequestScope::new();

        let seen = with_request_identity(&resolver(), &mut scope, Some(&request), |scope| {
            scope.get().clone()
        })
        .unwrap();

        assert_eq!(seen, RequestIdentity::new("10.0.0.1", "10.0.0.5"));
        assert!(!scope.is_set());
    }

    #[test]
    fn scope_cleared_after_body_error() {
        let request = RequestAdapter::new("10.0.0.1", "10.0.0.5");
        let mut scope = RequestScope::new();

        let result = with_request_identity(&resolver(), &mut scope, Some(&request), |_| {
            Err::<(), _>("handler failed")
        })
        .unwrap();

        assert_eq!(result, Err("handler failed"));
        assert!(!scope.is_set());
    }

    #[test]
    fn scope_cleared_after_panic() {
        let request = RequestAdapter::new("10.0.0.1", "10.0.0.5");
        let mut scope = RequestScope::new();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            with_request_identity(&resolver(), &mut scope, Some(&request), |_| {
                panic!("handler panicked")
            })
        }));

        assert!(result.is_err());
        assert!(!scope.is_set());
    }

    #[test]
    fn no_request_uses_empty_identity() {
        let mut scope = RequestScope::new();

        let seen = with_request_identity::<RequestAdapter, _, _>(
            &resolver(),
            &mut scope,
            None,
            |scope| scope.get().clone(),
        )
        .unwrap();

        assert!(seen.is_empty());
    }

    #[test]
    fn identity_failure_skips_body_and_clears_stale_scope() {
        let resolver = IdentityResolver::new(IdentityConfig {
            use_server_host_address: true,
            ..IdentityConfig::default()
        })
        .with_host_lookup(|| -> Result<String, IdentityError> {
            Err(IdentityError::new("no network"))
        });
        let request = RequestAdapter::new("10.0.0.1", "10.0.0.5");
        let mut scope = RequestScope::new();
        scope.set(RequestIdentity::new("stale", "stale"));

        let mut ran = false;
        let result = with_request_identity(&resolver, &mut scope, Some(&request), |_| ran = true);

        assert!(matches!(result, Err(Error::Identity(_))));
        assert!(!ran);
        assert!(!scope.is_set());
    }
}
