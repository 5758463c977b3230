//! Audit record schema.
//!
//! An [`AuditRecord`] is the structured result of one intercepted call: who
//! did what, to which resources, from which application, when, and between
//! which addresses.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::identity::RequestIdentity;

/// Renders strings as a bracketed, comma-separated list: `[a, b, c]`.
pub(crate) fn list_string<S: AsRef<str>>(items: &[S]) -> String {
    let mut out = String::from("[");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(item.as_ref());
    }
    out.push(']');
    out
}

/// The record of one audited action.
///
/// Built once per intercepted call with [`AuditRecord::builder`] and
/// immutable afterwards.
///
/// # Example
///
/// ```
/// use audit_core::{AuditRecord, RequestIdentity};
///
/// let record = AuditRecord::builder("alice", "DELETE_DOCUMENT", "DOCS")
///     .resources(vec!["doc-1".to_string(), "doc-2".to_string()])
///     .identity(&RequestIdentity::new("10.0.0.1", "10.0.0.5"))
///     .build();
///
/// assert_eq!(record.principal(), "alice");
/// assert_eq!(record.resources_string(), "[doc-1, doc-2]");
/// assert_eq!(record.client_ip_address(), "10.0.0.5");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// Who performed the action
    principal: String,
    /// Resources acted upon, in resolver order
    resources_operated_upon: Vec<String>,
    /// What was done
    action_performed: String,
    /// Application the action belongs to
    application_code: String,
    when_action_was_performed: DateTime<Utc>,
    client_ip_address: String,
    server_ip_address: String,
}

impl AuditRecord {
    /// Starts a record for `principal` performing `action` in `application`.
    ///
    /// The timestamp defaults to now and both addresses to unknown.
    pub fn builder(
        principal: impl Into<String>,
        action_performed: impl Into<String>,
        application_code: impl Into<String>,
    ) -> AuditRecordBuilder {
        AuditRecordBuilder {
            principal: principal.into(),
            resources_operated_upon: Vec::new(),
            action_performed: action_performed.into(),
            application_code: application_code.into(),
            when_action_was_performed: None,
            identity: RequestIdentity::EMPTY,
        }
    }

    /// Returns the principal.
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Returns the resources acted upon.
    pub fn resources_operated_upon(&self) -> &[String] {
        &self.resources_operated_upon
    }

    /// Returns the resources in list form, e.g. `[doc-1, doc-2]`.
    pub fn resources_string(&self) -> String {
        list_string(&self.resources_operated_upon)
    }

    /// Returns the action.
    pub fn action_performed(&self) -> &str {
        &self.action_performed
    }

    /// Returns the application code.
    pub fn application_code(&self) -> &str {
        &self.application_code
    }

    /// Returns when the action was performed.
    pub fn when_action_was_performed(&self) -> DateTime<Utc> {
        self.when_action_was_performed
    }

    /// Returns the timestamp in canonical form: RFC 3339, milliseconds, `Z`.
    pub fn when_string(&self) -> String {
        self.when_action_was_performed
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Returns the client address.
    pub fn client_ip_address(&self) -> &str {
        &self.client_ip_address
    }

    /// Returns the server address.
    pub fn server_ip_address(&self) -> &str {
        &self.server_ip_address
    }
}

impl fmt::Display for AuditRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AuditRecord[who={}, what={}, action={}, application={}, when={}, client={}, server={}]",
            self.principal,
            self.resources_string(),
            self.action_performed,
            self.application_code,
            self.when_string(),
            self.client_ip_address,
            self.server_ip_address
        )
    }
}

/// Builder for [`AuditRecord`].
#[derive(Debug, Clone)]
pub struct AuditRecordBuilder {
    principal: String,
    resources_operated_upon: Vec<String>,
    action_performed: String,
    application_code: String,
    when_action_was_performed: Option<DateTime<Utc>>,
    identity: RequestIdentity,
}

impl AuditRecordBuilder {
    /// Sets the resources acted upon.
    pub fn resources(mut self, resources: Vec<String>) -> Self {
        self.resources_operated_upon = resources;
        self
    }

    /// Appends one resource.
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resources_operated_upon.push(resource.into());
        self
    }

    /// Sets the timestamp.
    pub fn when(mut self, when: DateTime<Utc>) -> Self {
        self.when_action_was_performed = Some(when);
        self
    }

    /// Copies the client and server addresses from `identity`.
    pub fn identity(mut self, identity: &RequestIdentity) -> Self {
        self.identity = identity.clone();
        self
    }

    /// Finishes the record.
    pub fn build(self) -> AuditRecord {
        AuditRecord {
            principal: self.principal,
            resources_operated_upon: self.resources_operated_upon,
            action_performed: self.action_performed,
            application_code: self.application_code,
            when_action_was_performed: self.when_action_was_performed.unwrap_or_else(Utc::now),
            client_ip_address: self.identity.client_ip_address().to_string(),
            server_ip_address: self.identity.server_ip_address().to_string(),
        }
    }
}
