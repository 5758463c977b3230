//! Request adapter for mapping HTTP requests to audit-core types.

use std::collections::HashMap;

use super::ExtractAddresses;

/// Framework-agnostic view of an inbound HTTP request.
///
/// Holds only what the request identity needs: the transport-layer local and
/// remote addresses and the request headers. Header names are matched
/// case-insensitively.
///
/// # Examples
///
/// ```
/// use audit_core::web::{ExtractAddresses, RequestAdapter};
///
/// let mut adapter = RequestAdapter::new("10.0.0.1", "10.0.0.5");
/// adapter.add_header("X-Forwarded-For", "203.0.113.7");
///
/// assert_eq!(adapter.local_addr(), Some("10.0.0.1"));
/// assert_eq!(adapter.header("x-forwarded-for"), Some("203.0.113.7"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestAdapter {
    local_addr: Option<String>,
    remote_addr: Option<String>,
    /// Keyed by lowercased header name
    headers: HashMap<String, String>,
}

impl RequestAdapter {
    /// Creates an adapter with the given local and remote addresses.
    pub fn new(local_addr: impl Into<String>, remote_addr: impl Into<String>) -> Self {
        Self {
            local_addr: Some(local_addr.into()),
            remote_addr: Some(remote_addr.into()),
            headers: HashMap::new(),
        }
    }

    /// Sets or clears the local (server-side) address.
    pub fn set_local_addr(&mut self, addr: Option<String>) {
        self.local_addr = addr;
    }

    /// Sets or clears the remote (client-side) address.
    pub fn set_remote_addr(&mut self, addr: Option<String>) {
        self.remote_addr = addr;
    }

    /// Adds a header, replacing any previous value for the same name.
    pub fn add_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Returns the number of headers.
    pub fn headers_count(&self) -> usize {
        self.headers.len()
    }
}

impl ExtractAddresses for RequestAdapter {
    fn local_addr(&self) -> Option<&str> {
        self.local_addr.as_deref()
    }

    fn remote_addr(&self) -> Option<&str> {
        self.remote_addr.as_deref()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}
