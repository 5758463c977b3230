//! Explicit per-request identity storage.
//!
//! [`RequestScope`] holds the identity of the request being served and
//! [`ScopeGuard`] clears it again when the request ends.

use std::ops::Deref;

use crate::identity::{RequestIdentity, EMPTY_IDENTITY};

/// Per-request holder of the [`RequestIdentity`].
///
/// `RequestScope` replaces ambient thread-local storage with an explicit
/// value: the request boundary owns it, populates it once at request entry,
/// and passes `&RequestScope` to everything that audits during the request.
/// Each concurrent request owns its own scope, so identities never leak
/// between requests that happen to share a worker thread.
///
/// Only the owner can [`set`](Self::set) and [`clear`](Self::clear) (both
/// take `&mut self`); the audit pipeline reads through a shared reference.
///
/// # Lifecycle
///
/// ```text
/// RequestScope::new()  --enter(identity)-->  ScopeGuard  --drop-->  cleared
/// ```
///
/// Prefer [`enter`](Self::enter), whose guard clears the scope on every exit
/// path, including unwinding.
///
/// # Examples
///
/// ```
/// use audit_core::{RequestIdentity, RequestScope};
///
/// let mut scope = RequestScope::new();
/// assert!(scope.get().is_empty());
///
/// {
///     let guard = scope.enter(RequestIdentity::new("10.0.0.1", "10.0.0.5"));
///     assert_eq!(guard.get().client_ip_address(), "10.0.0.5");
/// }
///
/// // Cleared when the guard is dropped
/// assert_eq!(scope.get(), &RequestIdentity::EMPTY);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    identity: Option<RequestIdentity>,
}

impl RequestScope {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self { identity: None }
    }

    /// Stores the identity for the current request, replacing any previous one.
    pub fn set(&mut self, identity: RequestIdentity) {
        if self.identity.is_some() {
            tracing::debug!("request scope already populated, replacing identity");
        }
        self.identity = Some(identity);
    }

    /// Returns the current identity, or [`RequestIdentity::EMPTY`] when unset.
    pub fn get(&self) -> &RequestIdentity {
        self.identity.as_ref().unwrap_or(&EMPTY_IDENTITY)
    }

    /// Returns true if an identity has been set and not yet cleared.
    pub fn is_set(&self) -> bool {
        self.identity.is_some()
    }

    /// Removes the current identity. Safe to call any number of times.
    pub fn clear(&mut self) {
        self.identity = None;
    }

    /// Sets `identity` and returns a guard that clears the scope when dropped.
    pub fn enter(&mut self, identity: RequestIdentity) -> ScopeGuard<'_> {
        self.set(identity);
        ScopeGuard { scope: self }
    }
}

/// Guard returned by [`RequestScope::enter`].
///
/// Dereferences to the scope for reading and clears it on drop.
#[derive(Debug)]
#[must_use = "the scope is cleared as soon as the guard is dropped"]
pub struct ScopeGuard<'a> {
    scope: &'a mut RequestScope,
}

impl Deref for ScopeGuard<'_> {
    type Target = RequestScope;

    fn deref(&self) -> &RequestScope {
        self.scope
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.scope.clear();
    }
}
