use std::fmt;

/// Errors returned by the request boundary and the audit pipeline.
///
/// These are configuration or precondition violations and always propagate
/// to the caller. Failures of the auditing infrastructure itself (formatting,
/// sinks, metadata lookup) are reported as [`AuditFailure`] instead and never
/// surface here.
#[derive(Debug)]
pub enum Error {
    /// A resource resolver was invoked with arguments it cannot handle
    Resolution(ResolutionError),
    /// The request identity could not be determined
    Identity(IdentityError),
    /// The audit configuration is invalid
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Resolution(e) => write!(f, "resource resolution failed: {}", e),
            Error::Identity(e) => write!(f, "request identity resolution failed: {}", e),
            Error::Config(e) => write!(f, "invalid audit configuration: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Resolution(e) => Some(e),
            Error::Identity(e) => Some(e),
            Error::Config(e) => Some(e),
        }
    }
}

impl From<ResolutionError> for Error {
    fn from(e: ResolutionError) -> Self {
        Error::Resolution(e)
    }
}

impl From<IdentityError> for Error {
    fn from(e: IdentityError) -> Self {
        Error::Identity(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

/// A resource resolver's precondition was not met.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// The resolver needs an argument at this position but the call had fewer
    MissingArgument {
        /// Zero-based position of the missing argument
        index: usize,
    },
    /// A prefixed resolver expected a list argument and got a scalar
    NotAList {
        /// Zero-based position of the offending argument
        index: usize,
    },
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::MissingArgument { index } => {
                write!(f, "call has no argument at position {}", index)
            }
            ResolutionError::NotAList { index } => {
                write!(f, "argument at position {} is not a list", index)
            }
        }
    }
}

impl std::error::Error for ResolutionError {}

/// The host address of the server could not be looked up.
#[derive(Debug)]
pub struct IdentityError {
    message: String,
    source: Option<std::io::Error>,
}

impl IdentityError {
    /// Creates an identity error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an identity error caused by an I/O failure.
    pub fn from_io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message, source),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for IdentityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Invalid configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration document could not be parsed
    Parse(serde_json::Error),
    /// A resolver name was not registered
    UnknownResolver(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(e) => write!(f, "{}", e),
            ConfigError::UnknownResolver(name) => write!(f, "unknown resource resolver '{}'", name),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(e) => Some(e),
            ConfigError::UnknownResolver(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// A failure of the auditing infrastructure.
///
/// Never propagated to the caller of an audited operation. The pipeline hands
/// these to [`crate::diagnostics::BestEffort`] and carries on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFailure {
    kind: AuditFailureKind,
    message: String,
}

impl AuditFailure {
    /// Creates a new audit failure.
    pub fn new(kind: AuditFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns the failure kind.
    pub fn kind(&self) -> AuditFailureKind {
        self.kind
    }

    /// Returns the failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AuditFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for AuditFailure {}

/// Which part of the auditing infrastructure failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditFailureKind {
    /// Call-site metadata (principal, action, application) was unavailable
    Metadata,
    /// The record could not be rendered
    Format,
    /// The sink rejected the record
    Sink,
}

impl fmt::Display for AuditFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditFailureKind::Metadata => write!(f, "metadata unavailable"),
            AuditFailureKind::Format => write!(f, "formatting failed"),
            AuditFailureKind::Sink => write!(f, "sink failed"),
        }
    }
}
