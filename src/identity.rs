//! Per-request network identity.
//!
//! A [`RequestIdentity`] is the "from where" part of an audit record: the
//! server address that handled the request and the client address it came
//! from. It is resolved once at the request boundary by an
//! [`IdentityResolver`] and then carried by the request's
//! [`RequestScope`](crate::RequestScope).

use std::borrow::Cow;
use std::fmt;
use std::net::{IpAddr, ToSocketAddrs};
use std::sync::Arc;

use serde::Deserialize;

use crate::error::IdentityError;
use crate::web::ExtractAddresses;

/// Placeholder used for any address that cannot be determined.
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Immutable snapshot of a request's client and server addresses.
///
/// Both addresses are always non-empty. Anything that could not be
/// determined is recorded as [`UNKNOWN_ADDRESS`].
///
/// # Examples
///
/// ```
/// use audit_core::RequestIdentity;
///
/// let identity = RequestIdentity::new("10.0.0.1", "");
/// assert_eq!(identity.server_ip_address(), "10.0.0.1");
/// assert_eq!(identity.client_ip_address(), "unknown");
///
/// assert_eq!(RequestIdentity::EMPTY.server_ip_address(), "unknown");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    server_ip_address: Cow<'static, str>,
    client_ip_address: Cow<'static, str>,
}

impl RequestIdentity {
    /// The identity used when no request is in scope.
    pub const EMPTY: RequestIdentity = RequestIdentity {
        server_ip_address: Cow::Borrowed(UNKNOWN_ADDRESS),
        client_ip_address: Cow::Borrowed(UNKNOWN_ADDRESS),
    };

    /// Creates an identity, substituting [`UNKNOWN_ADDRESS`] for empty values.
    pub fn new(server_ip_address: impl Into<String>, client_ip_address: impl Into<String>) -> Self {
        Self {
            server_ip_address: or_unknown(server_ip_address.into()),
            client_ip_address: or_unknown(client_ip_address.into()),
        }
    }

    /// Returns the address of the server that handled the request.
    pub fn server_ip_address(&self) -> &str {
        &self.server_ip_address
    }

    /// Returns the address of the client that sent the request.
    pub fn client_ip_address(&self) -> &str {
        &self.client_ip_address
    }

    /// Returns true if neither address is known.
    pub fn is_empty(&self) -> bool {
        self == &Self::EMPTY
    }
}

impl Default for RequestIdentity {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "client={} server={}",
            self.client_ip_address, self.server_ip_address
        )
    }
}

/// Backing storage for references to [`RequestIdentity::EMPTY`].
pub(crate) static EMPTY_IDENTITY: RequestIdentity = RequestIdentity::EMPTY;

fn or_unknown(address: String) -> Cow<'static, str> {
    if address.is_empty() {
        Cow::Borrowed(UNKNOWN_ADDRESS)
    } else {
        Cow::Owned(address)
    }
}

/// How the request boundary derives a [`RequestIdentity`].
///
/// All fields default to "use the transport-layer addresses".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Header carrying the server address, replacing the local address when present
    pub alternate_server_addr_header: Option<String>,
    /// Header carrying the client address, replacing the remote address when present
    pub alternate_client_addr_header: Option<String>,
    /// Use the host's own address as the server address, ignoring any header
    pub use_server_host_address: bool,
}

impl IdentityConfig {
    /// Init-parameter naming the client address header.
    pub const CLIENT_ADDR_HEADER_PARAM: &'static str = "alternativeIpAddressHeader";
    /// Init-parameter naming the server address header.
    pub const SERVER_ADDR_HEADER_PARAM: &'static str = "alternateServerAddrHeaderName";
    /// Init-parameter enabling host address lookup for the server address.
    pub const USE_SERVER_HOST_ADDRESS_PARAM: &'static str = "useServerHostAddress";

    /// Reads the configuration from filter-style init parameters.
    ///
    /// `param` is called with each of the parameter names above. Empty or
    /// missing values keep the default. The host-address flag is enabled only
    /// by a case-insensitive `true`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use audit_core::IdentityConfig;
    ///
    /// let params = HashMap::from([
    ///     ("alternativeIpAddressHeader", "X-Forwarded-For"),
    ///     ("useServerHostAddress", "TRUE"),
    /// ]);
    ///
    /// let config = IdentityConfig::from_init_params(|name| params.get(name).map(|v| v.to_string()));
    /// assert_eq!(config.alternate_client_addr_header.as_deref(), Some("X-Forwarded-For"));
    /// assert!(config.use_server_host_address);
    /// ```
    pub fn from_init_params<F>(param: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| param(name).filter(|v| !v.is_empty());

        Self {
            alternate_server_addr_header: non_empty(Self::SERVER_ADDR_HEADER_PARAM),
            alternate_client_addr_header: non_empty(Self::CLIENT_ADDR_HEADER_PARAM),
            use_server_host_address: non_empty(Self::USE_SERVER_HOST_ADDRESS_PARAM)
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

/// Looks up the address of the machine this process runs on.
pub trait HostAddressLookup: Send + Sync {
    /// Returns the host's address.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if the platform cannot provide an address.
    fn host_address(&self) -> Result<String, IdentityError>;
}

impl<F> HostAddressLookup for F
where
    F: Fn() -> Result<String, IdentityError> + Send + Sync,
{
    fn host_address(&self) -> Result<String, IdentityError> {
        self()
    }
}

/// Resolves the host name of this machine and returns its first IPv4
/// address, falling back to the first address of any family.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHostLookup;

impl HostAddressLookup for SystemHostLookup {
    fn host_address(&self) -> Result<String, IdentityError> {
        let name = hostname::get()
            .map_err(|e| IdentityError::from_io("cannot read host name", e))?
            .into_string()
            .map_err(|_| IdentityError::new("host name is not valid UTF-8"))?;

        let addresses: Vec<IpAddr> = (name.as_str(), 0)
            .to_socket_addrs()
            .map_err(|e| IdentityError::from_io(format!("cannot resolve host '{}'", name), e))?
            .map(|addr| addr.ip())
            .collect();

        addresses
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addresses.first())
            .map(ToString::to_string)
            .ok_or_else(|| IdentityError::new(format!("host '{}' has no addresses", name)))
    }
}

/// Derives a [`RequestIdentity`] from an inbound request.
///
/// Per field the value is taken from, in order: the configured override
/// header (when named, present and non-empty), the transport-layer address,
/// and finally [`UNKNOWN_ADDRESS`]. With
/// [`use_server_host_address`](IdentityConfig::use_server_host_address) the
/// server address always comes from the host lookup instead.
///
/// # Examples
///
/// ```
/// use audit_core::{IdentityConfig, IdentityResolver};
/// use audit_core::web::RequestAdapter;
///
/// let request = RequestAdapter::new("10.0.0.1", "10.0.0.5");
/// let resolver = IdentityResolver::new(IdentityConfig::default());
///
/// let identity = resolver.resolve(Some(&request)).unwrap();
/// assert_eq!(identity.server_ip_address(), "10.0.0.1");
/// assert_eq!(identity.client_ip_address(), "10.0.0.5");
/// ```
#[derive(Clone)]
pub struct IdentityResolver {
    config: IdentityConfig,
    host_lookup: Arc<dyn HostAddressLookup>,
}

impl IdentityResolver {
    /// Creates a resolver that uses [`SystemHostLookup`] for host addresses.
    pub fn new(config: IdentityConfig) -> Self {
        Self {
            config,
            host_lookup: Arc::new(SystemHostLookup),
        }
    }

    /// Replaces the host address lookup.
    pub fn with_host_lookup(mut self, lookup: impl HostAddressLookup + 'static) -> Self {
        self.host_lookup = Arc::new(lookup);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// Resolves the identity of `request`.
    ///
    /// Without a request both addresses are unknown.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` only when host address lookup is configured
    /// and fails.
    pub fn resolve<R>(&self, request: Option<&R>) -> Result<RequestIdentity, IdentityError>
    where
        R: ExtractAddresses + ?Sized,
    {
        let Some(request) = request else {
            return Ok(RequestIdentity::EMPTY);
        };

        let server = if self.config.use_server_host_address {
            Some(self.host_lookup.host_address()?)
        } else {
            address_from(
                request,
                self.config.alternate_server_addr_header.as_deref(),
                request.local_addr(),
            )
        };

        let client = address_from(
            request,
            self.config.alternate_client_addr_header.as_deref(),
            request.remote_addr(),
        );

        let identity = RequestIdentity::new(server.unwrap_or_default(), client.unwrap_or_default());
        tracing::debug!(
            client = %identity.client_ip_address(),
            server = %identity.server_ip_address(),
            "resolved request identity"
        );
        Ok(identity)
    }
}

impl fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn address_from<R>(request: &R, header: Option<&str>, transport: Option<&str>) -> Option<String>
where
    R: ExtractAddresses + ?Sized,
{
    header
        .filter(|name| !name.is_empty())
        .and_then(|name| request.header(name))
        .filter(|value| !value.is_empty())
        .or(transport)
        .map(str::to_owned)
}
