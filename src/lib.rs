//! Typelint - a type-aware lint engine
//!
//! Runs lint rules over syntax trees whose identifiers and expressions were
//! already resolved by a front-end. Rules subscribe to node kinds, ask a
//! type query facade about static types, and report templated findings.
//!
//! # Architecture
//!
//! ```text
//! CLI/API -> Engine -> Registry -> Rule handlers -> Reporter
//!                 \-> TypeQuery (per file)
//! ```
//!
//! The engine loads configuration, builds an immutable dispatch table from
//! the registered rules, walks each tree in pre-order and collects
//! deduplicated findings.
//!
//! # Writing a rule
//!
//! ```
//! use typelint::context::LintContext;
//! use typelint::diagnostic::{DiagnosticKind, Severity};
//! use typelint::rule::{Rule, RuleDescriptor, RuleResult};
//! use typelint::syntax::{NodeKind, NodeRef};
//!
//! const NO_CASCADES: DiagnosticKind =
//!     DiagnosticKind::new("no_cascades", "Avoid cascades.", Severity::Info);
//! const DESCRIPTOR: RuleDescriptor =
//!     RuleDescriptor::new("no_cascades", "Reports cascade expressions", &[&NO_CASCADES]);
//!
//! fn check(ctx: &mut LintContext<'_>, node: NodeRef<'_>) -> RuleResult {
//!     ctx.report(node, &NO_CASCADES, &[]);
//!     Ok(())
//! }
//!
//! let rule = Rule::new(DESCRIPTOR).on(NodeKind::CascadeExpression, check);
//! assert_eq!(rule.name(), "no_cascades");
//! ```

pub mod baseline;
pub mod config;
pub mod context;
pub mod diagnostic;
pub mod engine;
pub mod output;
pub mod registry;
pub mod reporter;
pub mod rule;
pub mod rules;
pub mod syntax;
pub mod types;

// Re-export main types
pub use baseline::Baseline;
pub use config::Config;
pub use context::LintContext;
pub use diagnostic::{DiagnosticKind, Finding, Location, Severity};
pub use engine::{Engine, FileReport, HandlerFailure, LintResult, ResolvedUnit, RuleTiming};
pub use output::{JsonFormatter, OutputFormatter, TextFormatter};
pub use registry::{Registry, RegistryError};
pub use reporter::Reporter;
pub use rule::{Rule, RuleCategory, RuleDescriptor, RuleError, RuleResult, RuleStability};
pub use syntax::{NodeKind, NodeRef, Span, Tree, TreeBuilder};
pub use types::{Classification, ResolvedType, TypeModel, TypeQuery};
