//! Human-readable text output formatter

use super::OutputFormatter;
use crate::diagnostic::{Finding, Severity};
use crate::engine::LintResult;
use colored::*;

/// Text formatter with optional color support.
///
/// Every finding starts with the stable
/// `rule-name: severity: message @ file:line:col` line.
pub struct TextFormatter {
    /// Enable colored output
    pub colored: bool,

    /// Show correction hints
    pub show_help: bool,

    /// Show statistics
    pub show_stats: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            colored: true,
            show_help: true,
            show_stats: true,
        }
    }
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    pub fn without_stats(mut self) -> Self {
        self.show_stats = false;
        self
    }

    fn severity_str(&self, severity: Severity) -> ColoredString {
        let s = severity.to_string();
        if !self.colored {
            return s.normal();
        }
        match severity {
            Severity::Error => s.red().bold(),
            Severity::Warning => s.yellow().bold(),
            Severity::Info => s.blue(),
        }
    }

    fn count(&self, n: usize, singular: &str, plural: &str, color: Color) -> String {
        let s = format!("{} {}", n, if n == 1 { singular } else { plural });
        if self.colored {
            s.color(color).to_string()
        } else {
            s
        }
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, result: &LintResult) -> String {
        let mut output = String::new();

        for finding in &result.findings {
            output.push_str(&self.format_finding(finding));
        }

        for error in &result.file_errors {
            output.push_str(&format!(
                "{}: {}\n",
                error.path.display(),
                if self.colored {
                    error.message.red().to_string()
                } else {
                    error.message.clone()
                }
            ));
        }

        if !result.failures.is_empty() {
            output.push('\n');
            for failure in &result.failures {
                output.push_str(&format!(
                    "internal: rule '{}' failed on {} @ {}: {}\n",
                    failure.rule, failure.node_kind, failure.location, failure.message
                ));
            }
        }

        if self.show_stats {
            output.push_str(&format!(
                "\n{} {} processed",
                result.files_processed,
                if result.files_processed == 1 {
                    "file"
                } else {
                    "files"
                }
            ));

            let mut counts = Vec::new();
            if result.error_count > 0 {
                counts.push(self.count(result.error_count, "error", "errors", Color::Red));
            }
            if result.warning_count > 0 {
                counts.push(self.count(
                    result.warning_count,
                    "warning",
                    "warnings",
                    Color::Yellow,
                ));
            }
            if result.info_count > 0 {
                counts.push(self.count(result.info_count, "info", "infos", Color::Blue));
            }

            if !counts.is_empty() {
                output.push_str(&format!(": {}", counts.join(", ")));
            }
            output.push('\n');

            output.push_str(&format!(
                "Finished in {:.2}s\n",
                result.duration.as_secs_f64()
            ));
        }

        output
    }

    fn format_finding(&self, finding: &Finding) -> String {
        let mut output = if self.colored {
            format!(
                "{}: {}: {} @ {}\n",
                finding.rule.cyan(),
                self.severity_str(finding.severity),
                finding.message,
                finding.location
            )
        } else {
            format!("{}\n", finding.render())
        };

        if self.show_help {
            if let Some(correction) = &finding.correction {
                output.push_str(&format!(
                    "   {} {}\n",
                    if self.colored {
                        "= help:".green().to_string()
                    } else {
                        "= help:".to_string()
                    },
                    correction
                ));
            }
        }

        output
    }
}
