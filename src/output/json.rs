//! JSON output formatter

use super::OutputFormatter;
use crate::diagnostic::{Finding, Severity};
use crate::engine::{FileError, HandlerFailure, LintResult};
use serde::Serialize;

/// JSON formatter for machine-readable output
#[derive(Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|err| {
            log::error!("failed to serialize JSON output: {}", err);
            String::new()
        })
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    findings: Vec<JsonFinding<'a>>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    failures: &'a [HandlerFailure],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    file_errors: &'a [FileError],
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonFinding<'a> {
    rule: &'a str,
    code: &'a str,
    severity: Severity,
    message: &'a str,
    args: &'a [String],
    file: String,
    line: usize,
    column: usize,
    length: usize,
    offset: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    correction: Option<&'a str>,
}

impl<'a> From<&'a Finding> for JsonFinding<'a> {
    fn from(f: &'a Finding) -> Self {
        JsonFinding {
            rule: &f.rule,
            code: &f.kind_id,
            severity: f.severity,
            message: &f.message,
            args: &f.args,
            file: f.location.file.display().to_string(),
            line: f.location.line,
            column: f.location.column,
            length: f.location.length,
            offset: f.span.start,
            correction: f.correction.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct JsonSummary {
    files_processed: usize,
    files_with_errors: usize,
    files_with_warnings: usize,
    error_count: usize,
    warning_count: usize,
    info_count: usize,
    duration_ms: u128,
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, result: &LintResult) -> String {
        let output = JsonOutput {
            findings: result.findings.iter().map(JsonFinding::from).collect(),
            failures: &result.failures,
            file_errors: &result.file_errors,
            summary: JsonSummary {
                files_processed: result.files_processed,
                files_with_errors: result.files_with_errors,
                files_with_warnings: result.files_with_warnings,
                error_count: result.error_count,
                warning_count: result.warning_count,
                info_count: result.info_count,
                duration_ms: result.duration.as_millis(),
            },
        };
        self.render(&output)
    }

    fn format_finding(&self, finding: &Finding) -> String {
        self.render(&JsonFinding::from(finding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Location;
    use crate::syntax::Span;
    use std::path::PathBuf;

    fn finding() -> Finding {
        Finding {
            rule: "unsafe_html".to_string(),
            kind_id: "unsafe_html_attribute".to_string(),
            severity: Severity::Warning,
            message: "Assigning to the attribute 'href' is unsafe.".to_string(),
            args: vec!["href".to_string()],
            span: Span::new(10, 30),
            location: Location::new(PathBuf::from("web/main.dart"), 3, 7).with_length(20),
            correction: None,
        }
    }

    #[test]
    fn test_json_format_finding() {
        let output = JsonFormatter::new().format_finding(&finding());
        assert!(output.contains("\"rule\":\"unsafe_html\""));
        assert!(output.contains("\"code\":\"unsafe_html_attribute\""));
        assert!(output.contains("\"severity\":\"warning\""));
        assert!(output.contains("\"args\":[\"href\"]"));
        assert!(output.contains("\"line\":3"));
        assert!(!output.contains("correction"));
    }

    #[test]
    fn test_json_format_result() {
        let result = LintResult {
            findings: vec![finding()],
            files_processed: 5,
            warning_count: 1,
            ..Default::default()
        };

        let output = JsonFormatter::new().format(&result);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["summary"]["files_processed"], 5);
        assert_eq!(value["findings"].as_array().unwrap().len(), 1);
        assert!(value.get("failures").is_none());
    }

    #[test]
    fn test_json_pretty() {
        let output = JsonFormatter::new().pretty().format_finding(&finding());
        assert!(output.contains('\n'));
    }
}
