//! Diagnostic reporter
//!
//! Collects findings for one file. Reporting is idempotent: a second report
//! with the same (rule, diagnostic kind, span) is dropped at emission time.

use crate::diagnostic::{DiagnosticKind, Finding, Location, Severity};
use crate::rule::RuleDescriptor;
use crate::syntax::{NodeRef, Span};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Append-only, deduplicating finding collection for one file
#[derive(Debug, Default)]
pub struct Reporter {
    file: PathBuf,
    findings: Vec<Finding>,
    seen: HashSet<(&'static str, &'static str, Span)>,
    severity_overrides: HashMap<String, Severity>,
}

impl Reporter {
    pub fn new(file: PathBuf) -> Self {
        Self {
            file,
            ..Self::default()
        }
    }

    /// Apply per-rule severity overrides to every finding
    pub fn with_severity_overrides(mut self, overrides: HashMap<String, Severity>) -> Self {
        self.severity_overrides = overrides;
        self
    }

    /// Report `kind` for `rule` anchored at `anchor`.
    ///
    /// Returns `true` if a new finding was recorded, `false` if it was a
    /// duplicate or the kind is not part of the rule's vocabulary.
    pub fn report(
        &mut self,
        rule: &RuleDescriptor,
        anchor: NodeRef<'_>,
        kind: &'static DiagnosticKind,
        args: Vec<String>,
    ) -> bool {
        if !rule.declares(kind) {
            debug_assert!(
                false,
                "rule '{}' reported undeclared diagnostic '{}'",
                rule.name, kind.id
            );
            log::error!(
                "rule '{}' reported undeclared diagnostic '{}'; finding dropped",
                rule.name,
                kind.id
            );
            return false;
        }

        let span = anchor.span();
        if !self.seen.insert((rule.name, kind.id, span)) {
            log::trace!("duplicate {} finding at {:?} suppressed", kind.id, span);
            return false;
        }

        let (line, column) = anchor.tree().line_col(span.start);
        let location =
            Location::new(self.file.clone(), line, column).with_length(span.len() as usize);
        let severity = self
            .severity_overrides
            .get(rule.name)
            .copied()
            .unwrap_or(kind.severity);

        self.findings.push(Finding {
            rule: rule.name.to_string(),
            kind_id: kind.id.to_string(),
            severity,
            message: kind.render(&args),
            args,
            span,
            location,
            correction: kind.correction.map(String::from),
        });
        true
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Consume the reporter and return findings in emission order
    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}
