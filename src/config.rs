//! Declarative audit configuration.
//!
//! Everything a deployment tunes lives in one JSON document:
//!
//! ```json
//! {
//!   "identity":  { "alternate_client_addr_header": "X-Forwarded-For" },
//!   "formatter": { "format": "single_line", "entry_separator": "|" },
//!   "resolvers": [
//!     { "kind": "first_argument", "resource_prefix": "accounts:" },
//!     { "kind": "named", "name": "tenant" }
//!   ]
//! }
//! ```
//!
//! Missing sections take their defaults.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::{ConfigError, Error};
use crate::format::{FormatterConfig, RecordFormatter};
use crate::identity::{IdentityConfig, IdentityResolver};
use crate::pipeline::AuditPipelineBuilder;
use crate::resolver::{
    FirstArgumentResolver, ParametersAsStringResolver, ResolverRegistry, ResourceResolver,
    ReturnValueResolver,
};

/// Selects one resource resolver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolverConfig {
    /// [`FirstArgumentResolver`], optionally with a prefix
    FirstArgument {
        /// Prefix for a list first argument
        #[serde(default)]
        resource_prefix: Option<String>,
    },
    /// [`ParametersAsStringResolver`]
    ParametersAsString,
    /// [`ReturnValueResolver`], optionally prefixing failure messages
    ReturnValue {
        /// Prefix for the error message on the failure path
        #[serde(default)]
        failure_prefix: Option<String>,
    },
    /// A resolver looked up in a [`ResolverRegistry`]
    Named {
        /// Registered name
        name: String,
    },
}

impl ResolverConfig {
    /// Builds the selected resolver.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownResolver` if a named resolver is not in
    /// `registry`.
    pub fn build(&self, registry: &ResolverRegistry) -> Result<Arc<dyn ResourceResolver>, ConfigError> {
        let resolver: Arc<dyn ResourceResolver> = match self {
            ResolverConfig::FirstArgument {
                resource_prefix: Some(prefix),
            } => Arc::new(FirstArgumentResolver::with_prefix(prefix.clone())),
            ResolverConfig::FirstArgument {
                resource_prefix: None,
            } => Arc::new(FirstArgumentResolver::new()),
            ResolverConfig::ParametersAsString => Arc::new(ParametersAsStringResolver),
            ResolverConfig::ReturnValue {
                failure_prefix: Some(prefix),
            } => Arc::new(ReturnValueResolver::with_failure_prefix(prefix.clone())),
            ResolverConfig::ReturnValue {
                failure_prefix: None,
            } => Arc::new(ReturnValueResolver::new()),
            ResolverConfig::Named { name } => registry.get(name)?,
        };
        Ok(resolver)
    }
}

/// Complete audit configuration.
///
/// # Examples
///
/// ```
/// use audit_core::{AuditConfig, AuditFormat, ResolverRegistry};
///
/// let config = AuditConfig::from_json(r#"{
///     "formatter": { "format": "structured", "single_line": true },
///     "resolvers": [{ "kind": "first_argument" }]
/// }"#).unwrap();
///
/// assert_eq!(config.formatter.format, AuditFormat::Structured);
///
/// let pipeline = config
///     .pipeline_builder(&ResolverRegistry::with_defaults())
///     .unwrap()
///     .build();
/// assert_eq!(pipeline.resolver_count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Request boundary settings
    pub identity: IdentityConfig,
    /// Record formatting settings
    pub formatter: FormatterConfig,
    /// Resolvers, in the order their resources are concatenated
    pub resolvers: Vec<ResolverConfig>,
}

impl AuditConfig {
    /// Parses a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` wrapping `ConfigError::Parse` for malformed
    /// JSON or unknown values.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        tracing::debug!(
            format = %config.formatter.format,
            resolvers = config.resolvers.len(),
            "audit configuration loaded"
        );
        Ok(config)
    }

    /// Builds the configured resolvers, in order.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` wrapping `ConfigError::UnknownResolver` for a
    /// name missing from `registry`.
    pub fn build_resolvers(
        &self,
        registry: &ResolverRegistry,
    ) -> Result<Vec<Arc<dyn ResourceResolver>>, Error> {
        let resolvers = self
            .resolvers
            .iter()
            .map(|r| r.build(registry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(resolvers)
    }

    /// Returns an identity resolver for the request boundary.
    pub fn identity_resolver(&self) -> IdentityResolver {
        IdentityResolver::new(self.identity.clone())
    }

    /// Returns a pipeline builder with the configured formatter and resolvers.
    ///
    /// Sink and clock are left for the caller to choose.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for a resolver name missing from `registry`.
    pub fn pipeline_builder(
        &self,
        registry: &ResolverRegistry,
    ) -> Result<AuditPipelineBuilder, Error> {
        Ok(crate::pipeline::AuditPipeline::builder()
            .formatter(RecordFormatter::new(self.formatter.clone()))
            .resolvers(self.build_resolvers(registry)?))
    }
}
