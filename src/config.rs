//! Configuration for the lint engine
//!
//! Reads configuration from:
//! - `.typelintrc.yaml` / `.typelintrc.json` (project-level)
//! - `~/.typelintrc.yaml` (user-level)

use crate::diagnostic::Severity;
use crate::rule::{RuleCategory, RuleDescriptor, RuleStability};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Analyze files in parallel (one traversal per file)
    pub parallel: bool,

    /// Number of parallel jobs (0 = auto-detect)
    pub jobs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            jobs: 0,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,

    pub color: ColorMode,

    /// Verbose output
    pub verbose: bool,

    /// Show statistics
    pub statistics: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: ColorMode::Auto,
            verbose: false,
            statistics: true,
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Color mode options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// File handling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Include patterns for resolved unit files
    pub include: Vec<String>,

    /// Exclude patterns
    pub exclude: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            include: vec!["**/*.unit.json".to_string()],
            exclude: vec![
                "**/.dart_tool/**".to_string(),
                "**/build/**".to_string(),
                "**/node_modules/**".to_string(),
            ],
        }
    }
}

/// Rule configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Disabled rules
    pub disabled: Vec<String>,

    /// Enabled rules (empty = all)
    pub enabled: Vec<String>,

    /// Select rules by name prefix (e.g., "unsafe" selects all unsafe* rules)
    pub extend: Vec<String>,

    /// Ignore rules by name prefix
    pub ignore: Vec<String>,

    /// Severity overrides (rule name -> severity)
    pub severity: HashMap<String, Severity>,

    /// Per-file rule ignores (glob pattern -> rule names, or "all")
    pub per_file: HashMap<String, Vec<String>>,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extend from other configuration files or presets
    pub extends: Vec<String>,

    pub engine: EngineConfig,

    pub output: OutputConfig,

    pub files: FilesConfig,

    pub rules: RulesConfig,

    /// Enable preview/experimental rules
    pub preview: bool,

    /// Rule categories to enable (empty = all stable)
    pub categories: Vec<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a preset configuration by name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "recommended" => Some(Self::preset_recommended()),
            "all" => Some(Self::preset_all()),
            _ => None,
        }
    }

    /// Recommended preset - stable safety and style rules
    fn preset_recommended() -> Self {
        Self {
            categories: vec![
                "correctness".to_string(),
                "suspicious".to_string(),
                "style".to_string(),
            ],
            ..Self::default()
        }
    }

    /// Every category, preview rules included
    fn preset_all() -> Self {
        Self {
            preview: true,
            categories: Vec::new(),
            ..Self::default()
        }
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_depth(path, 0)
    }

    /// Load with recursion depth limit (to prevent `extends` cycles)
    fn load_with_depth(path: &Path, depth: usize) -> Result<Self, ConfigError> {
        const MAX_DEPTH: usize = 10;
        if depth >= MAX_DEPTH {
            return Err(ConfigError::Invalid(
                "Maximum config inheritance depth exceeded".to_string(),
            ));
        }

        let content = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let mut config: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config file format: {}",
                    ext
                )))
            }
        };

        if !config.extends.is_empty() {
            let base_dir = path.parent().unwrap_or(Path::new("."));
            let mut base_config = Self::default();

            for extend in &config.extends {
                let extended = match Self::preset(extend) {
                    Some(preset) => preset,
                    None => {
                        let extend_path = if Path::new(extend).is_absolute() {
                            PathBuf::from(extend)
                        } else {
                            base_dir.join(extend)
                        };
                        Self::load_with_depth(&extend_path, depth + 1)?
                    }
                };
                base_config.merge(extended);
            }

            base_config.merge(config);
            config = base_config;
        }

        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Self) {
        // extends are not inherited

        if other.engine.jobs != 0 {
            self.engine.jobs = other.engine.jobs;
        }
        self.engine.parallel = other.engine.parallel;

        if other.output.format != OutputFormat::Text {
            self.output.format = other.output.format;
        }
        if other.output.verbose {
            self.output.verbose = true;
        }
        if other.output.color != ColorMode::Auto {
            self.output.color = other.output.color;
        }
        self.output.statistics = other.output.statistics;

        extend_unique(&mut self.files.include, other.files.include);
        extend_unique(&mut self.files.exclude, other.files.exclude);

        self.rules.disabled.extend(other.rules.disabled);
        if !other.rules.enabled.is_empty() {
            self.rules.enabled = other.rules.enabled;
        }
        self.rules.extend.extend(other.rules.extend);
        self.rules.ignore.extend(other.rules.ignore);
        self.rules.severity.extend(other.rules.severity);
        for (pattern, rules) in other.rules.per_file {
            self.rules.per_file.entry(pattern).or_default().extend(rules);
        }

        if other.preview {
            self.preview = true;
        }
        if !other.categories.is_empty() {
            self.categories = other.categories;
        }
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<Self, ConfigError> {
        let config_names = [
            ".typelintrc.yaml",
            ".typelintrc.yml",
            ".typelintrc.json",
            "typelint.yaml",
            "typelint.yml",
            "typelint.json",
        ];

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            for name in &config_names {
                let path = home.join(name);
                if path.exists() {
                    return Self::load(&path);
                }
            }
        }

        Ok(Self::default())
    }

    /// Merge CLI arguments into configuration
    pub fn merge_cli(
        &mut self,
        format: Option<OutputFormat>,
        verbose: Option<bool>,
        jobs: Option<usize>,
        disabled_rules: Option<Vec<String>>,
        enabled_rules: Option<Vec<String>>,
    ) {
        if let Some(f) = format {
            self.output.format = f;
        }
        if let Some(v) = verbose {
            self.output.verbose = v;
        }
        if let Some(j) = jobs {
            self.engine.jobs = j;
        }
        if let Some(disabled) = disabled_rules {
            self.rules.disabled.extend(disabled);
        }
        if let Some(enabled) = enabled_rules {
            self.rules.enabled = enabled;
        }
    }

    /// Check if a rule is enabled.
    ///
    /// An explicit `enabled` list wins over stability and category filters.
    pub fn is_rule_enabled(&self, rule: &RuleDescriptor) -> bool {
        let name = rule.name;
        if self.rules.disabled.iter().any(|r| r == name) {
            return false;
        }
        if self.matches_ignore_prefix(name) {
            return false;
        }
        if !self.rules.enabled.is_empty() {
            return self.rules.enabled.iter().any(|r| r == name);
        }
        if !self.matches_extend_prefix(name) {
            return false;
        }

        match rule.stability {
            RuleStability::Deprecated => return false,
            RuleStability::Preview if !self.preview => return false,
            _ => {}
        }

        self.category_enabled(rule.category)
    }

    fn category_enabled(&self, category: RuleCategory) -> bool {
        self.categories.is_empty()
            || self
                .categories
                .iter()
                .filter_map(|c| c.parse::<RuleCategory>().ok())
                .any(|c| c == category)
    }

    /// Check if a rule name matches any prefix in the extend list
    pub fn matches_extend_prefix(&self, rule_name: &str) -> bool {
        if self.rules.extend.is_empty() {
            return true;
        }
        let rule_lower = rule_name.to_lowercase();
        self.rules
            .extend
            .iter()
            .any(|prefix| rule_lower.starts_with(&prefix.to_lowercase()))
    }

    /// Check if a rule name matches any prefix in the ignore list
    pub fn matches_ignore_prefix(&self, rule_name: &str) -> bool {
        let rule_lower = rule_name.to_lowercase();
        self.rules
            .ignore
            .iter()
            .any(|prefix| rule_lower.starts_with(&prefix.to_lowercase()))
    }

    /// Get severity override for a rule
    pub fn get_severity_override(&self, rule_name: &str) -> Option<Severity> {
        self.rules.severity.get(rule_name).copied()
    }

    /// Check if a rule should be ignored for a file
    pub fn should_ignore_rule_for_file(&self, rule_name: &str, file_path: &Path) -> bool {
        let file_str = file_path.to_string_lossy();

        self.rules.per_file.iter().any(|(pattern, rules)| {
            let matches = match globset::Glob::new(pattern) {
                Ok(glob) => glob.compile_matcher().is_match(file_str.as_ref()),
                Err(e) => {
                    log::warn!("ignoring invalid per-file pattern '{}': {}", pattern, e);
                    false
                }
            };
            matches && rules.iter().any(|r| r == "all" || r == rule_name)
        })
    }
}

fn extend_unique(target: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticKind;
    use std::io::Write;

    const KIND: DiagnosticKind = DiagnosticKind::new("k", "K.", Severity::Warning);

    fn descriptor(name: &'static str) -> RuleDescriptor {
        RuleDescriptor::new(name, "test rule", &[&KIND])
    }

    #[test]
    fn test_default_config() {
        let config = Config::new();
        assert!(config.engine.parallel);
        assert_eq!(config.engine.jobs, 0);
        assert_eq!(config.output.format, OutputFormat::Text);
        assert!(!config.files.include.is_empty());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_config_merge_cli() {
        let mut config = Config::new();
        config.merge_cli(
            Some(OutputFormat::Json),
            Some(true),
            Some(4),
            Some(vec!["unsafe_html".to_string()]),
            None,
        );

        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.verbose);
        assert_eq!(config.engine.jobs, 4);
        assert!(!config.is_rule_enabled(&descriptor("unsafe_html")));
    }

    #[test]
    fn test_rule_enabled() {
        let mut config = Config::new();
        assert!(config.is_rule_enabled(&descriptor("any_rule")));

        config.rules.disabled.push("disabled_rule".to_string());
        assert!(!config.is_rule_enabled(&descriptor("disabled_rule")));
        assert!(config.is_rule_enabled(&descriptor("other_rule")));

        config.rules.enabled = vec!["only_this".to_string()];
        assert!(!config.is_rule_enabled(&descriptor("other_rule")));
        assert!(config.is_rule_enabled(&descriptor("only_this")));
    }

    #[test]
    fn test_preview_and_deprecated_rules() {
        let mut config = Config::new();
        let preview = descriptor("new_rule").with_stability(RuleStability::Preview);
        let deprecated = descriptor("old_rule").with_stability(RuleStability::Deprecated);

        assert!(!config.is_rule_enabled(&preview));
        assert!(!config.is_rule_enabled(&deprecated));

        config.preview = true;
        assert!(config.is_rule_enabled(&preview));

        config.rules.enabled = vec!["old_rule".to_string()];
        assert!(config.is_rule_enabled(&deprecated));
    }

    #[test]
    fn test_categories_filter() {
        let mut config = Config::new();
        config.categories = vec!["suspicious".to_string()];

        let safety = descriptor("unsafe_html").with_category(RuleCategory::Suspicious);
        let style = descriptor("prefer_double_literals").with_category(RuleCategory::Style);
        assert!(config.is_rule_enabled(&safety));
        assert!(!config.is_rule_enabled(&style));
    }

    #[test]
    fn test_prefix_selection() {
        let mut config = Config::new();
        config.rules.extend = vec!["unsafe".to_string()];
        config.rules.ignore = vec!["unsafe_legacy".to_string()];

        assert!(config.is_rule_enabled(&descriptor("unsafe_html")));
        assert!(config.is_rule_enabled(&descriptor("UNSAFE_url")));
        assert!(!config.is_rule_enabled(&descriptor("unsafe_legacy_api")));
        assert!(!config.is_rule_enabled(&descriptor("prefer_double_literals")));
    }

    #[test]
    fn test_severity_override() {
        let mut config = Config::new();
        config
            .rules
            .severity
            .insert("unsafe_html".to_string(), Severity::Error);

        assert_eq!(
            config.get_severity_override("unsafe_html"),
            Some(Severity::Error)
        );
        assert_eq!(config.get_severity_override("other"), None);
    }

    #[test]
    fn test_per_file_ignore() {
        let mut config = Config::new();
        config.rules.per_file.insert(
            "**/generated/**".to_string(),
            vec!["prefer_double_literals".to_string()],
        );
        config
            .rules
            .per_file
            .insert("**/*_test.unit.json".to_string(), vec!["all".to_string()]);

        let generated = Path::new("lib/generated/a.unit.json");
        assert!(config.should_ignore_rule_for_file("prefer_double_literals", generated));
        assert!(!config.should_ignore_rule_for_file("unsafe_html", generated));

        let test_file = Path::new("test/widget_test.unit.json");
        assert!(config.should_ignore_rule_for_file("unsafe_html", test_file));
    }

    #[test]
    fn test_yaml_deserialize() {
        let yaml = r#"
engine:
  parallel: false
  jobs: 4
output:
  format: json
  verbose: true
rules:
  disabled:
    - unsafe_html
  severity:
    prefer_double_literals: error
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.engine.parallel);
        assert_eq!(config.engine.jobs, 4);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.verbose);
        assert_eq!(config.rules.disabled, vec!["unsafe_html".to_string()]);
        assert_eq!(
            config.get_severity_override("prefer_double_literals"),
            Some(Severity::Error)
        );
    }

    #[test]
    fn test_load_extends_preset_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base.yaml");
        std::fs::write(&base, "rules:\n  disabled:\n    - unsafe_html\n").unwrap();

        let main = dir.path().join(".typelintrc.yaml");
        let mut file = std::fs::File::create(&main).unwrap();
        writeln!(file, "extends:\n  - recommended\n  - base.yaml\npreview: true").unwrap();

        let config = Config::load(&main).unwrap();
        assert!(config.preview);
        assert_eq!(config.categories.len(), 3);
        assert!(config.rules.disabled.contains(&"unsafe_html".to_string()));
    }

    #[test]
    fn test_extends_cycle_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.yaml");
        let b = dir.path().join("b.yaml");
        std::fs::write(&a, "extends:\n  - b.yaml\n").unwrap();
        std::fs::write(&b, "extends:\n  - a.yaml\n").unwrap();

        let err = Config::load(&a).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }
}
