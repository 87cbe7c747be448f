//! Core lint engine
//!
//! One pre-order pass per file. At every node the engine looks up the
//! handlers registered for the node's kind and runs them in registration
//! order. A failing or panicking handler is logged and recorded; it never
//! stops the pass.

use crate::config::Config;
use crate::context::LintContext;
use crate::diagnostic::{Finding, Location, Severity};
use crate::registry::{Registry, RegistryError};
use crate::reporter::Reporter;
use crate::rule::Rule;
use crate::rules::builtin_rules;
use crate::syntax::{NodeKind, Span, Tree};
use crate::types::{TypeModel, TypeQuery};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Error loading a resolved unit
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid resolved unit: {0}")]
    Json(#[from] serde_json::Error),
}

/// A parsed, type-resolved source file as emitted by the front-end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedUnit {
    /// Path of the original source file
    #[serde(default)]
    pub path: PathBuf,
    /// Classes visible to the file
    #[serde(default)]
    pub types: TypeModel,
    pub tree: Tree,
}

impl ResolvedUnit {
    pub fn new(path: impl Into<PathBuf>, types: TypeModel, tree: Tree) -> Self {
        Self {
            path: path.into(),
            types,
            tree,
        }
    }

    /// Load a unit from a JSON file. A unit without a `path` is reported
    /// under the JSON file's own path.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path)?;
        let mut unit = Self::from_json(&content)?;
        if unit.path.as_os_str().is_empty() {
            unit.path = path.to_path_buf();
        }
        Ok(unit)
    }

    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A handler that returned an error or panicked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerFailure {
    pub rule: String,
    pub node_kind: NodeKind,
    pub span: Span,
    pub location: Location,
    pub message: String,
}

/// A file that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    pub path: PathBuf,
    pub message: String,
}

/// Per-rule timing statistics
#[derive(Debug, Clone, Default)]
pub struct RuleTiming {
    pub rule: String,
    /// Total time spent in this rule's handlers
    pub total_time: Duration,
    /// Number of handler calls
    pub evaluation_count: usize,
    /// Number of findings reported
    pub match_count: usize,
}

impl RuleTiming {
    pub fn new(rule: &str) -> Self {
        Self {
            rule: rule.to_string(),
            ..Default::default()
        }
    }

    /// Average time per handler call
    pub fn avg_time(&self) -> Duration {
        if self.evaluation_count > 0 {
            self.total_time / self.evaluation_count as u32
        } else {
            Duration::ZERO
        }
    }

    fn absorb(&mut self, other: &RuleTiming) {
        self.total_time += other.total_time;
        self.evaluation_count += other.evaluation_count;
        self.match_count += other.match_count;
    }
}

/// Outcome of analyzing one file
#[derive(Debug, Default)]
pub struct FileReport {
    pub path: PathBuf,
    /// Findings in traversal order, then registration order
    pub findings: Vec<Finding>,
    pub failures: Vec<HandlerFailure>,
    pub timings: HashMap<String, RuleTiming>,
}

/// Result of a lint run over many files
#[derive(Debug, Default)]
pub struct LintResult {
    pub findings: Vec<Finding>,

    /// Handler failures, kept apart from findings
    pub failures: Vec<HandlerFailure>,

    /// Files that could not be loaded
    pub file_errors: Vec<FileError>,

    pub files_processed: usize,

    pub files_with_errors: usize,

    pub files_with_warnings: usize,

    pub error_count: usize,

    pub warning_count: usize,

    pub info_count: usize,

    /// Processing duration
    pub duration: Duration,

    /// Per-rule timing statistics (rule name -> timing)
    pub rule_timings: HashMap<String, RuleTiming>,
}

impl LintResult {
    fn from_report(report: FileReport) -> Self {
        let mut result = LintResult {
            files_processed: 1,
            ..LintResult::default()
        };
        for finding in &report.findings {
            match finding.severity {
                Severity::Error => result.error_count += 1,
                Severity::Warning => result.warning_count += 1,
                Severity::Info => result.info_count += 1,
            }
        }
        if result.error_count > 0 {
            result.files_with_errors = 1;
        }
        if result.warning_count > 0 {
            result.files_with_warnings = 1;
        }
        result.findings = report.findings;
        result.failures = report.failures;
        result.rule_timings = report.timings;
        result
    }

    fn from_file_error(path: &Path, error: LoadError) -> Self {
        LintResult {
            files_processed: 1,
            files_with_errors: 1,
            error_count: 1,
            file_errors: vec![FileError {
                path: path.to_path_buf(),
                message: error.to_string(),
            }],
            ..LintResult::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.warning_count > 0
    }

    /// Check if result is clean (no errors or warnings)
    pub fn is_clean(&self) -> bool {
        self.error_count == 0 && self.warning_count == 0
    }

    /// Get exit code (0 = success, 1 = warnings, 2 = errors)
    pub fn exit_code(&self) -> i32 {
        if self.error_count > 0 {
            2
        } else if self.warning_count > 0 {
            1
        } else {
            0
        }
    }

    /// Recompute severity counts after findings were filtered
    pub fn recount(&mut self) {
        self.error_count = self.file_errors.len();
        self.warning_count = 0;
        self.info_count = 0;
        for finding in &self.findings {
            match finding.severity {
                Severity::Error => self.error_count += 1,
                Severity::Warning => self.warning_count += 1,
                Severity::Info => self.info_count += 1,
            }
        }

        let mut with_errors: Vec<&Path> =
            self.file_errors.iter().map(|e| e.path.as_path()).collect();
        let mut with_warnings = Vec::new();
        for finding in &self.findings {
            let file = finding.location.file.as_path();
            if finding.is_error() && !with_errors.contains(&file) {
                with_errors.push(file);
            } else if finding.is_warning() && !with_warnings.contains(&file) {
                with_warnings.push(file);
            }
        }
        self.files_with_errors = with_errors.len();
        self.files_with_warnings = with_warnings.len();
    }

    /// Merge another result into this one
    pub fn merge(&mut self, other: LintResult) {
        self.findings.extend(other.findings);
        self.failures.extend(other.failures);
        self.file_errors.extend(other.file_errors);
        self.files_processed += other.files_processed;
        self.files_with_errors += other.files_with_errors;
        self.files_with_warnings += other.files_with_warnings;
        self.error_count += other.error_count;
        self.warning_count += other.warning_count;
        self.info_count += other.info_count;

        for (rule, timing) in other.rule_timings {
            self.rule_timings
                .entry(rule)
                .or_insert_with(|| RuleTiming::new(&timing.rule))
                .absorb(&timing);
        }
    }

    /// Get rule timings sorted by total time (descending)
    pub fn sorted_timings(&self) -> Vec<&RuleTiming> {
        let mut timings: Vec<_> = self.rule_timings.values().collect();
        timings.sort_by(|a, b| b.total_time.cmp(&a.total_time));
        timings
    }

    /// Format timing statistics as a table
    pub fn format_timings(&self) -> String {
        let timings = self.sorted_timings();
        if timings.is_empty() {
            return "No timing data available".to_string();
        }

        let mut output = String::new();
        output.push_str("Rule Timing Statistics:\n");
        output.push_str(&format!(
            "{:<32} {:>12} {:>12} {:>10} {:>10}\n",
            "Rule", "Total", "Avg", "Calls", "Findings"
        ));
        output.push_str(&"-".repeat(80));
        output.push('\n');

        for timing in timings {
            let total_ms = timing.total_time.as_secs_f64() * 1000.0;
            let avg_us = timing.avg_time().as_secs_f64() * 1_000_000.0;
            output.push_str(&format!(
                "{:<32} {:>10.2}ms {:>10.2}µs {:>10} {:>10}\n",
                timing.rule, total_ms, avg_us, timing.evaluation_count, timing.match_count
            ));
        }

        output
    }
}

/// The main lint engine
#[derive(Debug)]
pub struct Engine {
    config: Config,
    registry: Registry,
}

impl Engine {
    /// Engine running the built-in rules
    pub fn new(config: Config) -> Result<Self, RegistryError> {
        Self::with_rules(builtin_rules(), config)
    }

    /// Engine running an explicit rule list, in the given order
    pub fn with_rules(rules: Vec<Rule>, config: Config) -> Result<Self, RegistryError> {
        let registry = Registry::build(rules, &config)?;
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run every enabled rule over one resolved unit
    pub fn analyze(&self, unit: &ResolvedUnit) -> FileReport {
        let types = TypeQuery::new(&unit.types);
        let overrides: HashMap<String, Severity> = self
            .registry
            .enabled_rules()
            .filter_map(|rule| {
                self.config
                    .get_severity_override(rule.name)
                    .map(|severity| (rule.name.to_string(), severity))
            })
            .collect();
        let mut reporter = Reporter::new(unit.path.clone()).with_severity_overrides(overrides);

        let ignored: Vec<bool> = self
            .registry
            .rules()
            .iter()
            .map(|rule| {
                self.config
                    .should_ignore_rule_for_file(rule.name(), &unit.path)
            })
            .collect();

        let mut failures = Vec::new();
        let mut timings: HashMap<String, RuleTiming> = HashMap::new();

        for node in unit.tree.preorder() {
            for registration in self.registry.handlers_for(node.kind()) {
                if ignored[registration.rule] {
                    continue;
                }
                let descriptor = self.registry.descriptor(registration.rule);
                let reported_before = reporter.len();
                let start = Instant::now();

                let outcome = {
                    let mut ctx = LintContext::new(descriptor, &types, &mut reporter);
                    panic::catch_unwind(AssertUnwindSafe(|| (registration.handler)(&mut ctx, node)))
                };

                let timing = timings
                    .entry(descriptor.name.to_string())
                    .or_insert_with(|| RuleTiming::new(descriptor.name));
                timing.total_time += start.elapsed();
                timing.evaluation_count += 1;
                timing.match_count += reporter.len() - reported_before;

                let message = match outcome {
                    Ok(Ok(())) => continue,
                    Ok(Err(err)) => err.to_string(),
                    Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
                };

                let (line, column) = unit.tree.line_col(node.span().start);
                log::warn!(
                    "rule '{}' failed on {} at {}:{}:{}: {}",
                    descriptor.name,
                    node.kind(),
                    unit.path.display(),
                    line,
                    column,
                    message
                );
                failures.push(HandlerFailure {
                    rule: descriptor.name.to_string(),
                    node_kind: node.kind(),
                    span: node.span(),
                    location: Location::new(unit.path.clone(), line, column),
                    message,
                });
            }
        }

        log::debug!(
            "{}: {} findings, {} handler failures",
            unit.path.display(),
            reporter.len(),
            failures.len()
        );

        FileReport {
            path: unit.path.clone(),
            findings: reporter.into_findings(),
            failures,
            timings,
        }
    }

    /// Load and analyze one resolved unit file
    pub fn lint_file(&self, path: &Path) -> LintResult {
        match ResolvedUnit::load(path) {
            Ok(unit) => LintResult::from_report(self.analyze(&unit)),
            Err(err) => {
                log::warn!("failed to load {}: {}", path.display(), err);
                LintResult::from_file_error(path, err)
            }
        }
    }

    /// Lint multiple files. Results keep the input order.
    pub fn lint(&self, files: &[PathBuf]) -> LintResult {
        let start = Instant::now();

        let results: Vec<LintResult> = match self.thread_pool() {
            Some(pool) => pool.install(|| files.par_iter().map(|f| self.lint_file(f)).collect()),
            None => files.iter().map(|f| self.lint_file(f)).collect(),
        };

        let mut combined = LintResult::default();
        for result in results {
            combined.merge(result);
        }

        combined.duration = start.elapsed();
        combined
    }

    fn thread_pool(&self) -> Option<rayon::ThreadPool> {
        if !self.config.engine.parallel {
            return None;
        }
        let threads = if self.config.engine.jobs > 0 {
            self.config.engine.jobs
        } else {
            num_cpus::get()
        };
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => Some(pool),
            Err(err) => {
                log::warn!("falling back to sequential linting: {}", err);
                None
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticKind;
    use crate::rule::{RuleDescriptor, RuleError, RuleResult};
    use crate::syntax::{NodeData, NodeRef, TreeBuilder};
    use pretty_assertions::assert_eq;

    const LITERAL: DiagnosticKind =
        DiagnosticKind::new("saw_literal", "Literal '{0}'.", Severity::Warning);
    const SECOND: DiagnosticKind =
        DiagnosticKind::new("saw_literal_again", "Literal again.", Severity::Info);
    const NEVER: DiagnosticKind = DiagnosticKind::new("never", "Never.", Severity::Error);

    fn report_literal(ctx: &mut LintContext<'_>, node: NodeRef<'_>) -> RuleResult {
        let NodeData::IntegerLiteral { lexeme, .. } = node.data() else {
            return Err(RuleError::UnexpectedNode {
                expected: "integer literal",
                found: node.kind(),
            });
        };
        ctx.report(node, &LITERAL, &[lexeme.as_str()]);
        ctx.report(node, &LITERAL, &[lexeme.as_str()]);
        Ok(())
    }

    fn report_again(ctx: &mut LintContext<'_>, node: NodeRef<'_>) -> RuleResult {
        ctx.report(node, &SECOND, &[]);
        Ok(())
    }

    fn always_fails(_ctx: &mut LintContext<'_>, _node: NodeRef<'_>) -> RuleResult {
        Err(RuleError::Failed("boom".to_string()))
    }

    fn always_panics(_ctx: &mut LintContext<'_>, _node: NodeRef<'_>) -> RuleResult {
        panic!("handler bug")
    }

    fn literal_rule() -> Rule {
        Rule::new(RuleDescriptor::new("literal", "Reports literals", &[&LITERAL]))
            .on(NodeKind::IntegerLiteral, report_literal)
    }

    fn again_rule() -> Rule {
        Rule::new(RuleDescriptor::new("again", "Reports literals again", &[&SECOND]))
            .on(NodeKind::IntegerLiteral, report_again)
    }

    fn unit() -> ResolvedUnit {
        // [1, 2]
        let mut b = TreeBuilder::new().with_source("[1, 2]");
        let one = b.int_literal("1", Span::new(1, 2));
        let two = b.int_literal("2", Span::new(4, 5));
        let list = b.push(
            NodeData::ListLiteral {
                type_arguments: Vec::new(),
                elements: vec![one, two],
            },
            Span::new(0, 6),
        );
        ResolvedUnit::new("lib/a.dart", TypeModel::with_core(), b.finish(list).unwrap())
    }

    #[test]
    fn test_findings_follow_traversal_then_registration_order() {
        let engine = Engine::with_rules(vec![literal_rule(), again_rule()], Config::new()).unwrap();
        let report = engine.analyze(&unit());

        let order: Vec<(&str, &str)> = report
            .findings
            .iter()
            .map(|f| (f.kind_id.as_str(), f.message.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("saw_literal", "Literal '1'."),
                ("saw_literal_again", "Literal again."),
                ("saw_literal", "Literal '2'."),
                ("saw_literal_again", "Literal again."),
            ]
        );
        assert!(report.failures.is_empty());
        assert_eq!(report.timings["literal"].evaluation_count, 2);
        assert_eq!(report.timings["literal"].match_count, 2);
    }

    #[test]
    fn test_failing_handler_is_isolated() {
        let failing = Rule::new(RuleDescriptor::new("failing", "Fails", &[&NEVER]))
            .on(NodeKind::IntegerLiteral, always_fails);
        let engine =
            Engine::with_rules(vec![failing, literal_rule()], Config::new()).unwrap();
        let report = engine.analyze(&unit());

        assert_eq!(report.findings.len(), 2);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].rule, "failing");
        assert_eq!(report.failures[0].message, "boom");
        assert_eq!(report.failures[0].location.column, 2);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let panicking = Rule::new(RuleDescriptor::new("panicking", "Panics", &[&NEVER]))
            .on(NodeKind::IntegerLiteral, always_panics);
        let engine =
            Engine::with_rules(vec![literal_rule(), panicking], Config::new()).unwrap();
        let report = engine.analyze(&unit());

        assert_eq!(report.findings.len(), 2);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures[0].message.contains("handler bug"));
    }

    #[test]
    fn test_per_file_ignore_and_severity_override() {
        let mut config = Config::new();
        config
            .rules
            .per_file
            .insert("lib/**".to_string(), vec!["again".to_string()]);
        config
            .rules
            .severity
            .insert("literal".to_string(), Severity::Error);

        let engine = Engine::with_rules(vec![literal_rule(), again_rule()], config).unwrap();
        let report = engine.analyze(&unit());

        assert_eq!(report.findings.len(), 2);
        assert!(report.findings.iter().all(|f| f.is_error()));
    }

    #[test]
    fn test_lint_result_exit_codes() {
        let engine = Engine::with_rules(vec![literal_rule()], Config::new()).unwrap();
        let result = LintResult::from_report(engine.analyze(&unit()));
        assert_eq!(result.warning_count, 2);
        assert_eq!(result.exit_code(), 1);

        let mut clean = LintResult::default();
        assert_eq!(clean.exit_code(), 0);
        clean.merge(LintResult::from_file_error(
            Path::new("missing.unit.json"),
            LoadError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
        ));
        assert_eq!(clean.exit_code(), 2);
    }

    #[test]
    fn test_recount_after_filtering() {
        let engine = Engine::with_rules(vec![literal_rule()], Config::new()).unwrap();
        let mut result = LintResult::from_report(engine.analyze(&unit()));
        result.findings.truncate(1);
        result.recount();
        assert_eq!(result.warning_count, 1);
        assert_eq!(result.files_with_warnings, 1);

        result.findings.clear();
        result.recount();
        assert!(result.is_clean());
    }

    #[test]
    fn test_unit_json_roundtrip() {
        let json = serde_json::to_string(&unit()).unwrap();
        let loaded = ResolvedUnit::from_json(&json).unwrap();
        assert_eq!(loaded.path, PathBuf::from("lib/a.dart"));
        assert_eq!(loaded.tree.len(), 3);
        assert_eq!(loaded.types.len(), TypeModel::with_core().len());
    }

    #[test]
    fn test_lint_files_keeps_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let json = serde_json::to_string(&unit()).unwrap();
        let first = dir.path().join("first.unit.json");
        let broken = dir.path().join("broken.unit.json");
        std::fs::write(&first, &json).unwrap();
        std::fs::write(&broken, "{not json").unwrap();

        let engine = Engine::with_rules(vec![literal_rule()], Config::new()).unwrap();
        let result = engine.lint(&[first, broken.clone()]);

        assert_eq!(result.files_processed, 2);
        assert_eq!(result.findings.len(), 2);
        assert_eq!(result.file_errors.len(), 1);
        assert_eq!(result.file_errors[0].path, broken);
        assert_eq!(result.exit_code(), 2);
    }
}
