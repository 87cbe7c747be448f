//! Baseline for hold-the-line linting
//!
//! Lets a project adopt new rules without fixing existing findings first.
//! Baselined findings are dropped; new ones are reported. Entries match on
//! rule, diagnostic code and file, then on line or rendered message, so an
//! entry survives code moving within its file. Each entry hides at most one
//! finding.

use crate::diagnostic::Finding;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// A baselined finding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BaselineIssue {
    pub rule: String,
    /// Stable diagnostic kind id
    pub code: String,
    /// File path (relative to the baseline file)
    pub file: String,
    /// Line number (may shift over time)
    pub line: usize,
    /// Rendered message
    pub message: String,
}

impl BaselineIssue {
    pub fn from_finding(finding: &Finding, base_path: &Path) -> Self {
        Self {
            rule: finding.rule.clone(),
            code: finding.kind_id.clone(),
            file: relative_file(&finding.location.file, base_path),
            line: finding.location.line,
            message: finding.message.clone(),
        }
    }

    fn fingerprint(&self) -> (&str, &str, &str) {
        (&self.rule, &self.code, &self.file)
    }
}

/// Baseline containing all ignored findings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Baseline {
    /// Version of the baseline format
    #[serde(default = "default_version")]
    pub version: String,
    /// Base path for relative file paths
    #[serde(skip)]
    pub base_path: PathBuf,
    pub issues: Vec<BaselineIssue>,
    /// When the baseline was created (seconds since the epoch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn default_version() -> String {
    "1".to_string()
}

impl Baseline {
    pub fn new() -> Self {
        Self {
            version: default_version(),
            base_path: PathBuf::new(),
            issues: Vec::new(),
            created_at: Some(current_timestamp()),
            updated_at: None,
        }
    }

    /// Create an empty baseline whose paths are relative to `base_path`
    pub fn with_base_path(mut self, base_path: &Path) -> Self {
        self.base_path = base_path.to_path_buf();
        self
    }

    /// Load baseline from a JSON file
    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        let mut baseline: Self = serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        baseline.base_path = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        Ok(baseline)
    }

    /// Save baseline to a JSON file
    pub fn save(&mut self, path: &Path) -> Result<(), std::io::Error> {
        self.updated_at = Some(current_timestamp());
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Add findings that are not yet baselined
    pub fn add_findings(&mut self, findings: &[Finding]) {
        for finding in findings {
            let issue = BaselineIssue::from_finding(finding, &self.base_path);
            if !self.issues.contains(&issue) {
                self.issues.push(issue);
            }
        }
    }

    /// Drop baselined findings, keeping order.
    ///
    /// Each entry absorbs at most one finding. Entries on the same line are
    /// claimed first; leftover entries then claim a finding with the same
    /// message, so a finding that moved stays baselined but a new one with
    /// the same text does not.
    pub fn filter_findings(&self, findings: Vec<Finding>) -> Vec<Finding> {
        let index = self.build_index();
        let files: Vec<String> = findings
            .iter()
            .map(|f| relative_file(&f.location.file, &self.base_path))
            .collect();
        let candidates = |i: usize| {
            let finding = &findings[i];
            let key = (
                finding.rule.as_str(),
                finding.kind_id.as_str(),
                files[i].as_str(),
            );
            index.get(&key).map(Vec::as_slice).unwrap_or(&[])
        };

        let mut used = vec![false; self.issues.len()];
        let mut baselined = vec![false; findings.len()];

        for (i, finding) in findings.iter().enumerate() {
            if let Some(&entry) = candidates(i)
                .iter()
                .find(|&&e| !used[e] && self.issues[e].line == finding.location.line)
            {
                used[entry] = true;
                baselined[i] = true;
            }
        }
        for (i, finding) in findings.iter().enumerate() {
            if baselined[i] {
                continue;
            }
            if let Some(&entry) = candidates(i)
                .iter()
                .find(|&&e| !used[e] && self.issues[e].message == finding.message)
            {
                used[entry] = true;
                baselined[i] = true;
            }
        }

        findings
            .into_iter()
            .zip(baselined)
            .filter_map(|(finding, baselined)| (!baselined).then_some(finding))
            .collect()
    }

    fn build_index(&self) -> HashMap<(&str, &str, &str), Vec<usize>> {
        let mut index: HashMap<_, Vec<usize>> = HashMap::new();
        for (i, issue) in self.issues.iter().enumerate() {
            index.entry(issue.fingerprint()).or_default().push(i);
        }
        index
    }

    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    /// Count of baselined issues per rule
    pub fn count_by_rule(&self) -> HashMap<String, usize> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for issue in &self.issues {
            *counts.entry(issue.rule.clone()).or_default() += 1;
        }
        counts
    }

    /// Unique files in the baseline
    pub fn files(&self) -> HashSet<&str> {
        self.issues.iter().map(|i| i.file.as_str()).collect()
    }

    /// Replace the baseline with the current findings, dropping fixed ones
    pub fn update(&mut self, findings: &[Finding]) {
        self.issues.clear();
        self.add_findings(findings);
    }
}

fn relative_file(file: &Path, base_path: &Path) -> String {
    file.strip_prefix(base_path)
        .unwrap_or(file)
        .to_string_lossy()
        .to_string()
}

fn current_timestamp() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_default()
}
