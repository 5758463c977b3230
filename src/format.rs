//! Rendering of audit records into text.
//!
//! Three encodings are supported:
//!
//! - **Multi-line** (default): a banner-framed block with one labelled line
//!   per field, for human readers.
//! - **Single-line**: all fields joined by a separator, for line-oriented
//!   log collectors.
//! - **Structured**: a JSON object with fixed key order, banner-framed.
//!
//! When the structured encoding is combined with `single_line`, the entry
//! holds the compact JSON line followed by the pretty-printed object. This
//! double emission is a known quirk kept on purpose; it is not a promise of
//! byte-for-byte compatibility with older output, which for example lacked
//! the newline after the first banner.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::AuditRecord;

const HEADER: &str = "Audit trail record BEGIN";
const BANNER: &str = "=============================================================";

/// Default separator for single-line entries.
pub const DEFAULT_ENTRY_SEPARATOR: &str = ",";

/// Which encoding to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditFormat {
    /// Labelled block, one field per line
    #[default]
    MultiLine,
    /// One separator-delimited line
    SingleLine,
    /// JSON object
    Structured,
}

impl fmt::Display for AuditFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditFormat::MultiLine => write!(f, "multi_line"),
            AuditFormat::SingleLine => write!(f, "single_line"),
            AuditFormat::Structured => write!(f, "structured"),
        }
    }
}

/// Formatter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    /// Encoding to use
    pub format: AuditFormat,
    /// Single-line text output; for the structured format, also emit the compact JSON line
    pub single_line: bool,
    /// Separator between fields of single-line entries
    pub entry_separator: String,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            format: AuditFormat::MultiLine,
            single_line: false,
            entry_separator: DEFAULT_ENTRY_SEPARATOR.to_string(),
        }
    }
}

/// A record could not be rendered.
#[derive(Debug)]
pub struct FormatError {
    source: serde_json::Error,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot serialize audit record: {}", self.source)
    }
}

impl std::error::Error for FormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl From<serde_json::Error> for FormatError {
    fn from(source: serde_json::Error) -> Self {
        Self { source }
    }
}

/// JSON view of a record; field order is the key order of the output.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StructuredRecord<'a> {
    who: &'a str,
    what: String,
    action: &'a str,
    application: &'a str,
    when: String,
    client_ip_address: &'a str,
    server_ip_address: &'a str,
}

impl<'a> From<&'a AuditRecord> for StructuredRecord<'a> {
    fn from(record: &'a AuditRecord) -> Self {
        Self {
            who: record.principal(),
            what: record.resources_string(),
            action: record.action_performed(),
            application: record.application_code(),
            when: record.when_string(),
            client_ip_address: record.client_ip_address(),
            server_ip_address: record.server_ip_address(),
        }
    }
}

/// Renders [`AuditRecord`]s according to a [`FormatterConfig`].
///
/// # Examples
///
/// ```
/// use audit_core::{AuditFormat, AuditRecord, FormatterConfig, RecordFormatter};
///
/// let record = AuditRecord::builder("alice", "DELETE", "DOCS")
///     .resource("doc-1")
///     .resource("doc-2")
///     .build();
///
/// let text = RecordFormatter::default().render(&record).unwrap();
/// assert!(text.contains("WHAT: [doc-1, doc-2]\n"));
///
/// let formatter = RecordFormatter::new(FormatterConfig {
///     format: AuditFormat::SingleLine,
///     entry_separator: "|".to_string(),
///     ..FormatterConfig::default()
/// });
/// let line = formatter.render(&record).unwrap();
/// assert_eq!(line.split('|').count(), 7);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordFormatter {
    config: FormatterConfig,
}

impl RecordFormatter {
    /// Creates a formatter.
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    /// Renders `record`.
    ///
    /// # Errors
    ///
    /// Returns `FormatError` if JSON serialization fails. Text encodings
    /// never fail.
    pub fn render(&self, record: &AuditRecord) -> Result<String, FormatError> {
        render(
            record,
            self.config.format,
            self.config.single_line,
            &self.config.entry_separator,
        )
    }
}

/// Renders `record` in `format`.
///
/// For the text formats, `single_line` forces single-line output.
///
/// # Errors
///
/// Returns `FormatError` if JSON serialization fails.
pub fn render(
    record: &AuditRecord,
    format: AuditFormat,
    single_line: bool,
    separator: &str,
) -> Result<String, FormatError> {
    match format {
        AuditFormat::Structured => structured(record, single_line),
        AuditFormat::SingleLine => Ok(single_line_entry(record, separator)),
        AuditFormat::MultiLine if single_line => Ok(single_line_entry(record, separator)),
        AuditFormat::MultiLine => Ok(multi_line_entry(record)),
    }
}

fn multi_line_entry(record: &AuditRecord) -> String {
    let mut out = String::with_capacity(320);
    out.push_str(HEADER);
    out.push('\n');
    out.push_str(BANNER);
    out.push('\n');

    let fields = [
        ("WHO", record.principal().to_string()),
        ("WHAT", record.resources_string()),
        ("ACTION", record.action_performed().to_string()),
        ("APPLICATION", record.application_code().to_string()),
        ("WHEN", record.when_string()),
        ("CLIENT IP ADDRESS", record.client_ip_address().to_string()),
        ("SERVER IP ADDRESS", record.server_ip_address().to_string()),
    ];
    for (label, value) in fields {
        out.push_str(label);
        out.push_str(": ");
        out.push_str(&value);
        out.push('\n');
    }

    out.push_str(BANNER);
    out.push_str("\n\n");
    out
}

fn single_line_entry(record: &AuditRecord, separator: &str) -> String {
    [
        record.when_string(),
        record.application_code().to_string(),
        record.resources_string(),
        record.action_performed().to_string(),
        record.principal().to_string(),
        record.client_ip_address().to_string(),
        record.server_ip_address().to_string(),
    ]
    .join(separator)
}

fn structured(record: &AuditRecord, single_line: bool) -> Result<String, FormatError> {
    let view = StructuredRecord::from(record);

    let mut out = String::with_capacity(512);
    out.push_str(HEADER);
    out.push('\n');
    out.push_str(BANNER);
    out.push('\n');
    if single_line {
        out.push_str(&serde_json::to_string(&view)?);
        out.push('\n');
    }
    out.push_str(&serde_json::to_string_pretty(&view)?);
    out.push('\n');
    out.push_str(BANNER);
    out.push_str("\n\n");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::RequestIdentity;
    use chrono::{TimeZone, Utc};

    fn record() -> AuditRecord {
        AuditRecord::builder("alice", "DELETE_DOCUMENT", "DOCS")
            .resources(vec!["doc-1".to_string(), "doc-2".to_string()])
            .when(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap())
            .identity(&RequestIdentity::new("10.0.0.1", "10.0.0.5"))
            .build()
    }

    #[test]
    fn multi_line_layout() {
        let text = render(&record(), AuditFormat::MultiLine, false, ",").unwrap();

        let expected = "Audit trail record BEGIN\n\
            =============================================================\n\
            WHO: alice\n\
            WHAT: [doc-1, doc-2]\n\
            ACTION: DELETE_DOCUMENT\n\
            APPLICATION: DOCS\n\
            WHEN: 2024-03-01T12:30:45.000Z\n\
            CLIENT IP ADDRESS: 10.0.0.5\n\
            SERVER IP ADDRESS: 10.0.0.1\n\
            =============================================================\n\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn single_line_order() {
        let line = render(&record(), AuditFormat::SingleLine, false, "|").unwrap();
        assert_eq!(
            line,
            "2024-03-01T12:30:45.000Z|DOCS|[doc-1, doc-2]|DELETE_DOCUMENT|alice|10.0.0.5|10.0.0.1"
        );
    }

    #[test]
    fn single_line_default_separator() {
        let formatter = RecordFormatter::new(FormatterConfig {
            format: AuditFormat::SingleLine,
            ..FormatterConfig::default()
        });
        let line = formatter.render(&record()).unwrap();
        assert!(line.starts_with("2024-03-01T12:30:45.000Z,DOCS,"));
    }

    #[test]
    fn multi_line_with_single_line_flag_is_single_line() {
        let line = render(&record(), AuditFormat::MultiLine, true, ";").unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(line.split(';').count(), 7);
    }

    #[test]
    fn structured_pretty_only() {
        let text = render(&record(), AuditFormat::Structured, false, ",").unwrap();

        assert!(text.starts_with("Audit trail record BEGIN\n"));
        assert!(text.ends_with("=============================================================\n\n"));
        assert!(text.contains("  \"who\": \"alice\""));
        assert!(!text.contains("{\"who\""));
    }

    #[test]
    fn structured_key_order() {
        let text = render(&record(), AuditFormat::Structured, false, ",").unwrap();
        let keys = [
            "\"who\"",
            "\"what\"",
            "\"action\"",
            "\"application\"",
            "\"when\"",
            "\"clientIpAddress\"",
            "\"serverIpAddress\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| text.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn structured_single_line_emits_both_encodings() {
        let text = render(&record(), AuditFormat::Structured, true, ",").unwrap();

        let compact = "{\"who\":\"alice\",\"what\":\"[doc-1, doc-2]\",\"action\":\"DELETE_DOCUMENT\",\
            \"application\":\"DOCS\",\"when\":\"2024-03-01T12:30:45.000Z\",\
            \"clientIpAddress\":\"10.0.0.5\",\"serverIpAddress\":\"10.0.0.1\"}";
        assert!(text.contains(compact));
        assert!(text.contains("  \"who\": \"alice\""));
        assert_eq!(text.matches("\"serverIpAddress\"").count(), 2);
        assert!(text.contains("=============================================================\n{\"who\""));
    }

    #[test]
    fn structured_values_are_escaped() {
        let record = AuditRecord::builder("eve \"the\" admin", "LOGIN", "PORTAL").build();
        let text = render(&record, AuditFormat::Structured, true, ",").unwrap();
        assert!(text.contains(r#""who":"eve \"the\" admin""#));
    }

    #[test]
    fn render_does_not_mutate_record() {
        let record = record();
        let before = record.clone();
        let _ = RecordFormatter::default().render(&record).unwrap();
        assert_eq!(record, before);
    }

    #[test]
    fn config_defaults() {
        let config = FormatterConfig::default();
        assert_eq!(config.format, AuditFormat::MultiLine);
        assert!(!config.single_line);
        assert_eq!(config.entry_separator, ",");
    }

    #[test]
    fn format_display() {
        assert_eq!(AuditFormat::Structured.to_string(), "structured");
        assert_eq!(AuditFormat::MultiLine.to_string(), "multi_line");
    }
}
