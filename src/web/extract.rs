//! Extraction boundary trait for web integration.

/// Exposes the network-level facts of an inbound request.
///
/// This is the only thing the audit core needs from a web framework's
/// request type. Framework integrations implement it directly or convert
/// into a [`RequestAdapter`](super::RequestAdapter).
///
/// # Examples
///
/// ```
/// use audit_core::web::ExtractAddresses;
///
/// struct MyFrameworkRequest {
///     peer: String,
///     forwarded_for: Option<String>,
/// }
///
/// impl ExtractAddresses for MyFrameworkRequest {
///     fn local_addr(&self) -> Option<&str> {
///         None
///     }
///
///     fn remote_addr(&self) -> Option<&str> {
///         Some(&self.peer)
///     }
///
///     fn header(&self, name: &str) -> Option<&str> {
///         if name.eq_ignore_ascii_case("X-Forwarded-For") {
///             self.forwarded_for.as_deref()
///         } else {
///             None
///         }
///     }
/// }
/// ```
pub trait ExtractAddresses {
    /// Address of the interface that accepted the connection, if known.
    fn local_addr(&self) -> Option<&str>;

    /// Address of the peer that opened the connection, if known.
    fn remote_addr(&self) -> Option<&str>;

    /// Value of the named request header, if present.
    fn header(&self, name: &str) -> Option<&str>;
}

impl<T: ExtractAddresses + ?Sized> ExtractAddresses for &T {
    fn local_addr(&self) -> Option<&str> {
        (**self).local_addr()
    }

    fn remote_addr(&self) -> Option<&str> {
        (**self).remote_addr()
    }

    fn header(&self, name: &str) -> Option<&str> {
        (**self).header(name)
    }
}
