//! Resource resolution strategies.
//!
//! A [`ResourceResolver`] answers the "to what" of an audit record: given the
//! arguments of an intercepted call and its outcome, it returns the resource
//! identifiers the call acted upon. The pipeline consults every configured
//! resolver and concatenates their outputs in order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigError, ResolutionError};
use crate::record::list_string;

/// One argument of an intercepted call, as seen by resolvers.
///
/// `Value` renders as its string, `List` renders as `[a, b, c]`.
///
/// # Examples
///
/// ```
/// use audit_core::Argument;
///
/// assert_eq!(Argument::from("doc-1").to_string(), "doc-1");
/// assert_eq!(Argument::list(["a", "b", "c"]).to_string(), "[a, b, c]");
/// assert_eq!(Argument::from(42).to_string(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// A scalar argument in its string form
    Value(String),
    /// A collection argument, one string per element
    List(Vec<String>),
}

impl Argument {
    /// Captures any displayable value as a scalar argument.
    pub fn value(value: impl fmt::Display) -> Self {
        Argument::Value(value.to_string())
    }

    /// Captures a collection as a list argument.
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        Argument::List(items.into_iter().map(|item| item.to_string()).collect())
    }

    /// Returns the elements if this is a list argument.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Argument::List(items) => Some(items),
            Argument::Value(_) => None,
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Value(value) => f.write_str(value),
            Argument::List(items) => f.write_str(&list_string(items)),
        }
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::Value(value.to_string())
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::Value(value)
    }
}

impl From<Vec<String>> for Argument {
    fn from(items: Vec<String>) -> Self {
        Argument::List(items)
    }
}

impl From<Vec<&str>> for Argument {
    fn from(items: Vec<&str>) -> Self {
        Argument::list(items)
    }
}

macro_rules! argument_from_display {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Argument {
                fn from(value: $ty) -> Self {
                    Argument::Value(value.to_string())
                }
            }
        )*
    };
}

argument_from_display!(bool, char, i32, i64, u32, u64, usize);

/// Strategy deriving resource identifiers from an intercepted call.
///
/// Implementations hold at most construction-time configuration and must
/// not change per call. Both methods may return any number of strings.
///
/// # Errors
///
/// A resolver returns `ResolutionError` when the call does not meet its
/// documented preconditions (for example, too few arguments). This means the
/// resolver was attached to the wrong call site, and the pipeline fails fast.
///
/// # Examples
///
/// ```
/// use std::fmt;
/// use audit_core::{Argument, ResourceResolver, ResolutionError};
///
/// /// Audits the second argument, e.g. a target account.
/// struct SecondArgument;
///
/// impl ResourceResolver for SecondArgument {
///     fn resolve_on_success(
///         &self,
///         args: &[Argument],
///         _value: &dyn fmt::Debug,
///     ) -> Result<Vec<String>, ResolutionError> {
///         args.get(1)
///             .map(|arg| vec![arg.to_string()])
///             .ok_or(ResolutionError::MissingArgument { index: 1 })
///     }
///
///     fn resolve_on_failure(
///         &self,
///         args: &[Argument],
///         _error: &dyn fmt::Display,
///     ) -> Result<Vec<String>, ResolutionError> {
///         self.resolve_on_success(args, &())
///     }
/// }
/// ```
pub trait ResourceResolver: Send + Sync {
    /// Resolves resources after the call returned `value`.
    fn resolve_on_success(
        &self,
        args: &[Argument],
        value: &dyn fmt::Debug,
    ) -> Result<Vec<String>, ResolutionError>;

    /// Resolves resources after the call failed with `error`.
    fn resolve_on_failure(
        &self,
        args: &[Argument],
        error: &dyn fmt::Display,
    ) -> Result<Vec<String>, ResolutionError>;
}

/// Uses the first argument of the call as the resource.
///
/// Without a prefix the resource is the first argument's string form. With a
/// prefix the first argument must be a list, and the resource is the prefix
/// followed by the list form, e.g. `users:[alice, bob]`.
///
/// The outcome of the call is ignored; both paths give the same result.
///
/// # Errors
///
/// - `MissingArgument` when the call has no arguments
/// - `NotAList` when a prefix is configured and the first argument is a scalar
///
/// # Examples
///
/// ```
/// use audit_core::{Argument, FirstArgumentResolver, ResourceResolver};
///
/// let args = [Argument::list(["a", "b", "c"])];
///
/// let resolver = FirstArgumentResolver::with_prefix("accounts:");
/// let resources = resolver.resolve_on_success(&args, &()).unwrap();
/// assert_eq!(resources, vec!["accounts:[a, b, c]"]);
///
/// let resolver = FirstArgumentResolver::new();
/// let resources = resolver.resolve_on_failure(&[Argument::from("doc-1")], &"boom").unwrap();
/// assert_eq!(resources, vec!["doc-1"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirstArgumentResolver {
    resource_prefix: Option<String>,
}

impl FirstArgumentResolver {
    /// Creates a resolver without a prefix.
    pub fn new() -> Self {
        Self {
            resource_prefix: None,
        }
    }

    /// Creates a resolver that renders a list first argument behind `prefix`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            resource_prefix: Some(prefix.into()),
        }
    }

    /// Returns the configured prefix.
    pub fn resource_prefix(&self) -> Option<&str> {
        self.resource_prefix.as_deref()
    }

    fn to_resources(&self, args: &[Argument]) -> Result<Vec<String>, ResolutionError> {
        let first = args
            .first()
            .ok_or(ResolutionError::MissingArgument { index: 0 })?;

        match &self.resource_prefix {
            Some(prefix) => {
                let items = first
                    .as_list()
                    .ok_or(ResolutionError::NotAList { index: 0 })?;
                Ok(vec![format!("{}{}", prefix, list_string(items))])
            }
            None => Ok(vec![first.to_string()]),
        }
    }
}

impl ResourceResolver for FirstArgumentResolver {
    fn resolve_on_success(
        &self,
        args: &[Argument],
        _value: &dyn fmt::Debug,
    ) -> Result<Vec<String>, ResolutionError> {
        self.to_resources(args)
    }

    fn resolve_on_failure(
        &self,
        args: &[Argument],
        _error: &dyn fmt::Display,
    ) -> Result<Vec<String>, ResolutionError> {
        self.to_resources(args)
    }
}

/// Uses all arguments of the call, rendered as one list, as the resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParametersAsStringResolver;

impl ParametersAsStringResolver {
    fn to_resources(args: &[Argument]) -> Vec<String> {
        let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
        vec![list_string(&rendered)]
    }
}

impl ResourceResolver for ParametersAsStringResolver {
    fn resolve_on_success(
        &self,
        args: &[Argument],
        _value: &dyn fmt::Debug,
    ) -> Result<Vec<String>, ResolutionError> {
        Ok(Self::to_resources(args))
    }

    fn resolve_on_failure(
        &self,
        args: &[Argument],
        _error: &dyn fmt::Display,
    ) -> Result<Vec<String>, ResolutionError> {
        Ok(Self::to_resources(args))
    }
}

/// Uses the outcome of the call as the resource: the `Debug` form of the
/// returned value, or the `Display` form of the error behind an optional
/// prefix.
///
/// # Examples
///
/// ```
/// use audit_core::{ResourceResolver, ReturnValueResolver};
///
/// let resolver = ReturnValueResolver::with_failure_prefix("failed: ");
/// assert_eq!(resolver.resolve_on_success(&[], &7).unwrap(), vec!["7"]);
/// assert_eq!(
///     resolver.resolve_on_failure(&[], &"no such account").unwrap(),
///     vec!["failed: no such account"]
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReturnValueResolver {
    failure_prefix: Option<String>,
}

impl ReturnValueResolver {
    /// Creates a resolver without a failure prefix.
    pub fn new() -> Self {
        Self {
            failure_prefix: None,
        }
    }

    /// Creates a resolver that puts `prefix` in front of failure messages.
    pub fn with_failure_prefix(prefix: impl Into<String>) -> Self {
        Self {
            failure_prefix: Some(prefix.into()),
        }
    }

    /// Returns the configured failure prefix.
    pub fn failure_prefix(&self) -> Option<&str> {
        self.failure_prefix.as_deref()
    }
}

impl ResourceResolver for ReturnValueResolver {
    fn resolve_on_success(
        &self,
        _args: &[Argument],
        value: &dyn fmt::Debug,
    ) -> Result<Vec<String>, ResolutionError> {
        Ok(vec![format!("{:?}", value)])
    }

    fn resolve_on_failure(
        &self,
        _args: &[Argument],
        error: &dyn fmt::Display,
    ) -> Result<Vec<String>, ResolutionError> {
        let prefix = self.failure_prefix.as_deref().unwrap_or_default();
        Ok(vec![format!("{}{}", prefix, error)])
    }
}

/// Resolvers registered under names, for selection from configuration.
///
/// # Examples
///
/// ```
/// use audit_core::ResolverRegistry;
///
/// let registry = ResolverRegistry::with_defaults();
/// assert!(registry.get("first_argument").is_ok());
/// assert!(registry.get("no_such_resolver").is_err());
/// ```
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<String, Arc<dyn ResourceResolver>>,
}

impl ResolverRegistry {
    /// Name of the default [`FirstArgumentResolver`].
    pub const FIRST_ARGUMENT: &'static str = "first_argument";
    /// Name of the [`ParametersAsStringResolver`].
    pub const PARAMETERS_AS_STRING: &'static str = "parameters_as_string";
    /// Name of the [`ReturnValueResolver`].
    pub const RETURN_VALUE: &'static str = "return_value";

    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            resolvers: HashMap::new(),
        }
    }

    /// Creates a registry holding the built-in resolvers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Self::FIRST_ARGUMENT, FirstArgumentResolver::new());
        registry.register(Self::PARAMETERS_AS_STRING, ParametersAsStringResolver);
        registry.register(Self::RETURN_VALUE, ReturnValueResolver::new());
        registry
    }

    /// Registers `resolver` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, resolver: impl ResourceResolver + 'static) {
        self.resolvers.insert(name.into(), Arc::new(resolver));
    }

    /// Looks up a resolver by name.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownResolver` if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<dyn ResourceResolver>, ConfigError> {
        self.resolvers
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownResolver(name.to_string()))
    }

    /// Returns the number of registered resolvers.
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Returns true if no resolvers are registered.
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.resolvers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ResolverRegistry")
            .field("resolvers", &names)
            .finish()
    }
}
