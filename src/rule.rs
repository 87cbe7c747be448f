//! Rule descriptors and rule definitions
//!
//! A rule is data: an immutable [`RuleDescriptor`] plus an ordered list of
//! (node kind, handler) pairs. Rules never see nodes of kinds they did not
//! register for, and they hold no state between nodes.

use crate::context::LintContext;
use crate::diagnostic::DiagnosticKind;
use crate::syntax::{NodeKind, NodeRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Rule category for grouping related rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    /// Code that is definitely wrong or useless
    Correctness,
    /// Code that is likely wrong or unsafe
    Suspicious,
    /// Idiomatic and consistent style rules
    #[default]
    Style,
    /// Rules that improve runtime performance
    Perf,
    /// Extra strict rules that may have false positives
    Pedantic,
    /// Rules that ban specific APIs or patterns
    Restriction,
    /// Rules under development (may change or be removed)
    Nursery,
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleCategory::Correctness => write!(f, "correctness"),
            RuleCategory::Suspicious => write!(f, "suspicious"),
            RuleCategory::Style => write!(f, "style"),
            RuleCategory::Perf => write!(f, "perf"),
            RuleCategory::Pedantic => write!(f, "pedantic"),
            RuleCategory::Restriction => write!(f, "restriction"),
            RuleCategory::Nursery => write!(f, "nursery"),
        }
    }
}

impl std::str::FromStr for RuleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "correctness" => Ok(RuleCategory::Correctness),
            "suspicious" | "errors" => Ok(RuleCategory::Suspicious),
            "style" => Ok(RuleCategory::Style),
            "perf" | "performance" => Ok(RuleCategory::Perf),
            "pedantic" => Ok(RuleCategory::Pedantic),
            "restriction" => Ok(RuleCategory::Restriction),
            "nursery" | "experimental" => Ok(RuleCategory::Nursery),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// Rule stability level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleStability {
    /// Rule is stable and recommended for use
    #[default]
    Stable,
    /// Rule is in preview/experimental stage
    Preview,
    /// Rule is deprecated and will be removed
    Deprecated,
}

impl fmt::Display for RuleStability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleStability::Stable => write!(f, "stable"),
            RuleStability::Preview => write!(f, "preview"),
            RuleStability::Deprecated => write!(f, "deprecated"),
        }
    }
}

/// Immutable rule metadata
#[derive(Debug, Clone, Serialize)]
pub struct RuleDescriptor {
    /// Unique, stable rule name (e.g., "unsafe_html")
    pub name: &'static str,
    /// One-line description
    pub description: &'static str,
    /// Longer explanation
    pub details: &'static str,
    /// Severity group
    pub category: RuleCategory,
    pub stability: RuleStability,
    /// Every diagnostic kind the rule can emit
    pub kinds: &'static [&'static DiagnosticKind],
}

impl RuleDescriptor {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        kinds: &'static [&'static DiagnosticKind],
    ) -> Self {
        Self {
            name,
            description,
            details: "",
            category: RuleCategory::Style,
            stability: RuleStability::Stable,
            kinds,
        }
    }

    pub const fn with_category(mut self, category: RuleCategory) -> Self {
        self.category = category;
        self
    }

    pub const fn with_stability(mut self, stability: RuleStability) -> Self {
        self.stability = stability;
        self
    }

    pub const fn with_details(mut self, details: &'static str) -> Self {
        self.details = details;
        self
    }

    /// Check whether `kind` belongs to this rule's vocabulary
    pub fn declares(&self, kind: &DiagnosticKind) -> bool {
        self.kinds.iter().any(|k| k.id == kind.id)
    }

    pub fn is_preview(&self) -> bool {
        self.stability == RuleStability::Preview
    }

    pub fn is_deprecated(&self) -> bool {
        self.stability == RuleStability::Deprecated
    }
}

/// Failure inside a rule handler. Isolated by the engine; never fatal.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("expected {expected} node, found {found}")]
    UnexpectedNode {
        expected: &'static str,
        found: NodeKind,
    },

    #[error("{0}")]
    Failed(String),
}

pub type RuleResult = Result<(), RuleError>;

/// Per-node callback registered for one node kind
pub type Handler = fn(&mut LintContext<'_>, NodeRef<'_>) -> RuleResult;

/// A lint rule: descriptor plus node-kind handlers
#[derive(Clone)]
pub struct Rule {
    descriptor: RuleDescriptor,
    handlers: Vec<(NodeKind, Handler)>,
}

impl Rule {
    pub fn new(descriptor: RuleDescriptor) -> Self {
        Self {
            descriptor,
            handlers: Vec::new(),
        }
    }

    /// Register interest in `kind`. Handlers for the same kind run in the
    /// order they were added.
    pub fn on(mut self, kind: NodeKind, handler: Handler) -> Self {
        self.handlers.push((kind, handler));
        self
    }

    pub fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    pub fn handlers(&self) -> &[(NodeKind, Handler)] {
        &self.handlers
    }

    /// Node kinds this rule listens to
    pub fn node_kinds(&self) -> Vec<NodeKind> {
        let mut kinds: Vec<NodeKind> = self.handlers.iter().map(|(kind, _)| *kind).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.descriptor.name)
            .field("node_kinds", &self.node_kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;

    const KIND: DiagnosticKind =
        DiagnosticKind::new("sample_kind", "Sample '{0}'.", Severity::Warning);
    const OTHER: DiagnosticKind = DiagnosticKind::new("other_kind", "Other.", Severity::Info);

    fn noop(_ctx: &mut LintContext<'_>, _node: NodeRef<'_>) -> RuleResult {
        Ok(())
    }

    #[test]
    fn test_descriptor_builder() {
        let descriptor = RuleDescriptor::new("sample", "A sample rule", &[&KIND])
            .with_category(RuleCategory::Suspicious)
            .with_stability(RuleStability::Preview)
            .with_details("Longer text");

        assert_eq!(descriptor.category, RuleCategory::Suspicious);
        assert!(descriptor.is_preview());
        assert!(!descriptor.is_deprecated());
        assert!(descriptor.declares(&KIND));
        assert!(!descriptor.declares(&OTHER));
    }

    #[test]
    fn test_rule_node_kinds() {
        let rule = Rule::new(RuleDescriptor::new("sample", "A sample rule", &[&KIND]))
            .on(NodeKind::MethodInvocation, noop)
            .on(NodeKind::AssignmentExpression, noop)
            .on(NodeKind::MethodInvocation, noop);

        assert_eq!(rule.handlers().len(), 3);
        assert_eq!(
            rule.node_kinds(),
            vec![NodeKind::AssignmentExpression, NodeKind::MethodInvocation]
        );
        assert_eq!(rule.name(), "sample");
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!(
            "performance".parse::<RuleCategory>(),
            Ok(RuleCategory::Perf)
        );
        assert_eq!("errors".parse::<RuleCategory>(), Ok(RuleCategory::Suspicious));
        assert!("bogus".parse::<RuleCategory>().is_err());
    }

    #[test]
    fn test_rule_error_display() {
        let err = RuleError::UnexpectedNode {
            expected: "assignment",
            found: NodeKind::IntegerLiteral,
        };
        assert_eq!(err.to_string(), "expected assignment node, found IntegerLiteral");
    }
}
