//! Lint context for rule execution
//!
//! A fresh context is handed to every handler call. It binds the calling
//! rule's descriptor to the shared type facade and the file's reporter, so
//! a handler can only report under its own rule name.

use crate::diagnostic::DiagnosticKind;
use crate::reporter::Reporter;
use crate::rule::RuleDescriptor;
use crate::syntax::NodeRef;
use crate::types::TypeQuery;

/// Context passed to rule handlers
pub struct LintContext<'a> {
    /// Descriptor of the rule whose handler is running
    rule: &'a RuleDescriptor,
    /// Type queries over the file's resolved model
    types: &'a TypeQuery<'a>,
    /// Findings for the current file
    reporter: &'a mut Reporter,
}

impl<'a> LintContext<'a> {
    pub fn new(
        rule: &'a RuleDescriptor,
        types: &'a TypeQuery<'a>,
        reporter: &'a mut Reporter,
    ) -> Self {
        Self {
            rule,
            types,
            reporter,
        }
    }

    /// Descriptor of the running rule
    pub fn rule(&self) -> &'a RuleDescriptor {
        self.rule
    }

    /// Type query facade
    pub fn types(&self) -> &'a TypeQuery<'a> {
        self.types
    }

    /// Report a finding anchored at `node`
    pub fn report(
        &mut self,
        node: NodeRef<'_>,
        kind: &'static DiagnosticKind,
        args: &[&str],
    ) -> bool {
        let args = args.iter().map(|arg| arg.to_string()).collect();
        self.reporter.report(self.rule, node, kind, args)
    }
}
