//! Diagnostic kinds and findings
//!
//! A [`DiagnosticKind`] is the stable, templated vocabulary entry a rule may
//! emit. A [`Finding`] is one reported instance of a kind at a source span.
//! Kind ids and message templates are matched verbatim by suppression
//! tooling, so changing either is a breaking change.

use crate::syntax::Span;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Rendered in place of a placeholder that has no matching argument
pub const MISSING_ARG: &str = "<missing>";

/// Severity level for findings
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,
    /// Warning - potential issue
    #[default]
    Warning,
    /// Error - definite problem
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" | "hint" | "note" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" | "err" => Ok(Severity::Error),
            _ => Err(()),
        }
    }
}

/// Source code location
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// File path
    pub file: PathBuf,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
    /// Length of the highlighted region
    pub length: usize,
}

impl Location {
    pub fn new(file: PathBuf, line: usize, column: usize) -> Self {
        Self {
            file,
            line,
            column,
            length: 0,
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{(\d+)\}").expect("placeholder pattern is valid"))
}

/// A named, templated category of finding
///
/// Templates use positional placeholders `{0}`, `{1}`, ... that are filled
/// from the arguments supplied at report time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DiagnosticKind {
    /// Stable identifier (e.g., "unsafe_html_attribute")
    pub id: &'static str,
    /// Message template
    pub message: &'static str,
    /// Optional correction hint shown after the message
    pub correction: Option<&'static str>,
    /// Default severity
    pub severity: Severity,
}

impl DiagnosticKind {
    pub const fn new(id: &'static str, message: &'static str, severity: Severity) -> Self {
        Self {
            id,
            message,
            correction: None,
            severity,
        }
    }

    pub const fn with_correction(mut self, correction: &'static str) -> Self {
        self.correction = Some(correction);
        self
    }

    /// Number of arguments the message template expects
    pub fn arity(&self) -> usize {
        placeholder_regex()
            .captures_iter(self.message)
            .filter_map(|caps| caps[1].parse::<usize>().ok())
            .map(|index| index + 1)
            .max()
            .unwrap_or(0)
    }

    /// Validate that placeholders form a contiguous `{0}..{n-1}` range.
    ///
    /// Returns the template arity on success.
    pub fn check_template(&self) -> Result<usize, String> {
        let mut seen: Vec<usize> = placeholder_regex()
            .captures_iter(self.message)
            .map(|caps| {
                caps[1]
                    .parse::<usize>()
                    .map_err(|_| format!("placeholder '{}' is not a valid index", &caps[0]))
            })
            .collect::<Result<_, _>>()?;
        seen.sort_unstable();
        seen.dedup();

        for (expected, actual) in seen.iter().enumerate() {
            if expected != *actual {
                return Err(format!(
                    "placeholder {{{}}} is used but {{{}}} is not",
                    actual, expected
                ));
            }
        }

        Ok(seen.len())
    }

    /// Substitute positional arguments into the message template
    pub fn render(&self, args: &[String]) -> String {
        debug_assert_eq!(
            args.len(),
            self.arity(),
            "wrong argument count for diagnostic '{}'",
            self.id
        );
        self.fill(args)
    }

    /// Substitution without the argument-count check; absent arguments
    /// render as [`MISSING_ARG`].
    fn fill(&self, args: &[String]) -> String {
        placeholder_regex()
            .replace_all(self.message, |caps: &regex::Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| args.get(index))
                    .map(String::as_str)
                    .unwrap_or(MISSING_ARG)
                    .to_string()
            })
            .into_owned()
    }
}

/// One reported diagnostic instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Name of the emitting rule
    pub rule: String,
    /// Stable diagnostic kind id
    pub kind_id: String,
    /// Effective severity (after config overrides)
    pub severity: Severity,
    /// Rendered message
    pub message: String,
    /// Arguments substituted into the template, in order
    pub args: Vec<String>,
    /// Byte span of the anchor node
    pub span: Span,
    /// Human-facing location
    pub location: Location,
    /// Correction hint from the diagnostic kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
}

impl Finding {
    /// Render as `rule-name: severity: message @ file:line:col`
    pub fn render(&self) -> String {
        format!(
            "{}: {}: {} @ {}",
            self.rule, self.severity, self.message, self.location
        )
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Check if this is a warning
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TWO_ARGS: DiagnosticKind = DiagnosticKind::new(
        "two_args",
        "Invoking the method '{1}.{0}' is unsafe.",
        Severity::Warning,
    );

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!("error".parse::<Severity>(), Ok(Severity::Error));
        assert_eq!("warn".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("hint".parse::<Severity>(), Ok(Severity::Info));
        assert!("loud".parse::<Severity>().is_err());
    }

    #[test]
    fn test_arity() {
        assert_eq!(TWO_ARGS.arity(), 2);
        let none = DiagnosticKind::new("none", "No arguments here.", Severity::Info);
        assert_eq!(none.arity(), 0);
    }

    #[test]
    fn test_render_reorders_arguments() {
        let args = vec!["open".to_string(), "Window".to_string()];
        assert_eq!(
            TWO_ARGS.render(&args),
            "Invoking the method 'Window.open' is unsafe."
        );
    }

    #[test]
    fn test_absent_argument_renders_marker() {
        assert_eq!(
            TWO_ARGS.fill(&["open".to_string()]),
            "Invoking the method '<missing>.open' is unsafe."
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "wrong argument count for diagnostic 'two_args'")]
    fn test_wrong_argument_count_fails_fast() {
        TWO_ARGS.render(&["open".to_string()]);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_wrong_argument_count_renders_marker() {
        assert_eq!(
            TWO_ARGS.render(&[]),
            "Invoking the method '<missing>.<missing>' is unsafe."
        );
    }

    #[test]
    fn test_check_template_rejects_gaps() {
        let gap = DiagnosticKind::new("gap", "'{0}' and '{2}'", Severity::Warning);
        assert!(gap.check_template().is_err());
        assert_eq!(TWO_ARGS.check_template(), Ok(2));
    }

    #[test]
    fn test_repeated_placeholder_counts_once() {
        let repeated = DiagnosticKind::new("rep", "'{0}' is '{0}'", Severity::Warning);
        assert_eq!(repeated.check_template(), Ok(1));
        assert_eq!(repeated.render(&["x".to_string()]), "'x' is 'x'");
    }

    #[test]
    fn test_finding_render() {
        let finding = Finding {
            rule: "unsafe_html".to_string(),
            kind_id: "unsafe_html_attribute".to_string(),
            severity: Severity::Warning,
            message: "Assigning to the attribute 'href' is unsafe.".to_string(),
            args: vec!["href".to_string()],
            span: Span::new(10, 14),
            location: Location::new(PathBuf::from("lib/main.dart"), 3, 7),
            correction: None,
        };

        assert_eq!(
            finding.render(),
            "unsafe_html: warning: Assigning to the attribute 'href' is unsafe. @ lib/main.dart:3:7"
        );
        assert!(finding.is_warning());
        assert!(!finding.is_error());
    }
}
