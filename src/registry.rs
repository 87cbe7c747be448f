//! Rule registry
//!
//! Built once per run from an explicit list of rules, then read-only. Maps
//! each node kind to the handlers interested in it, in registration order,
//! so a traversal only calls rules that asked for the node's kind.

use crate::config::Config;
use crate::rule::{Handler, Rule, RuleDescriptor};
use crate::syntax::NodeKind;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Rule programming error found while building the registry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("rule '{0}' is registered more than once")]
    DuplicateRule(String),

    #[error("rule '{0}' declares no diagnostic kinds")]
    EmptyVocabulary(String),

    #[error("diagnostic kind '{kind}' is declared by both '{first}' and '{second}'")]
    DuplicateKind {
        kind: String,
        first: String,
        second: String,
    },

    #[error("diagnostic kind '{kind}' of rule '{rule}' has a malformed template: {reason}")]
    MalformedTemplate {
        rule: String,
        kind: String,
        reason: String,
    },

    #[error("rule '{0}' registers no node handlers")]
    NoHandlers(String),
}

/// One dispatch entry: a handler and the rule it belongs to
#[derive(Clone, Copy)]
pub struct Registration {
    /// Index into [`Registry::rules`]
    pub rule: usize,
    pub handler: Handler,
}

/// A diagnostic kind a registered rule may emit
#[derive(Debug, Clone, Serialize)]
pub struct VocabularyEntry {
    pub rule: &'static str,
    pub kind: &'static str,
    pub template: &'static str,
    pub enabled: bool,
}

/// Immutable node-kind dispatch table
pub struct Registry {
    rules: Vec<Rule>,
    enabled: Vec<bool>,
    dispatch: HashMap<NodeKind, Vec<Registration>>,
}

impl Registry {
    /// Validate `rules` and build the dispatch table.
    ///
    /// Rules disabled by `config` are validated but receive no nodes.
    pub fn build(rules: Vec<Rule>, config: &Config) -> Result<Self, RegistryError> {
        let mut names = HashSet::new();
        let mut kind_owners: HashMap<&'static str, &'static str> = HashMap::new();

        for rule in &rules {
            let descriptor = rule.descriptor();
            if !names.insert(descriptor.name) {
                return Err(RegistryError::DuplicateRule(descriptor.name.to_string()));
            }
            Self::validate(rule, &mut kind_owners)?;
        }

        let enabled: Vec<bool> = rules
            .iter()
            .map(|rule| config.is_rule_enabled(rule.descriptor()))
            .collect();

        let mut dispatch: HashMap<NodeKind, Vec<Registration>> = HashMap::new();
        for (index, rule) in rules.iter().enumerate() {
            if !enabled[index] {
                log::debug!("rule '{}' disabled by configuration", rule.name());
                continue;
            }
            for (kind, handler) in rule.handlers() {
                dispatch.entry(*kind).or_default().push(Registration {
                    rule: index,
                    handler: *handler,
                });
            }
        }

        log::debug!(
            "registry built: {} rules ({} enabled), {} node kinds",
            rules.len(),
            enabled.iter().filter(|e| **e).count(),
            dispatch.len()
        );

        Ok(Self {
            rules,
            enabled,
            dispatch,
        })
    }

    fn validate(
        rule: &Rule,
        kind_owners: &mut HashMap<&'static str, &'static str>,
    ) -> Result<(), RegistryError> {
        let descriptor = rule.descriptor();
        if descriptor.kinds.is_empty() {
            return Err(RegistryError::EmptyVocabulary(descriptor.name.to_string()));
        }
        if rule.handlers().is_empty() {
            return Err(RegistryError::NoHandlers(descriptor.name.to_string()));
        }

        for kind in descriptor.kinds {
            if let Some(first) = kind_owners.insert(kind.id, descriptor.name) {
                return Err(RegistryError::DuplicateKind {
                    kind: kind.id.to_string(),
                    first: first.to_string(),
                    second: descriptor.name.to_string(),
                });
            }
            kind.check_template()
                .map_err(|reason| RegistryError::MalformedTemplate {
                    rule: descriptor.name.to_string(),
                    kind: kind.id.to_string(),
                    reason,
                })?;
        }
        Ok(())
    }

    /// Handlers registered for `kind`, in registration order
    pub fn handlers_for(&self, kind: NodeKind) -> &[Registration] {
        self.dispatch.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn descriptor(&self, index: usize) -> &RuleDescriptor {
        self.rules[index].descriptor()
    }

    pub fn is_enabled(&self, index: usize) -> bool {
        self.enabled.get(index).copied().unwrap_or(false)
    }

    /// Descriptors of rules that receive nodes
    pub fn enabled_rules(&self) -> impl Iterator<Item = &RuleDescriptor> + '_ {
        self.rules
            .iter()
            .zip(&self.enabled)
            .filter(|(_, enabled)| **enabled)
            .map(|(rule, _)| rule.descriptor())
    }

    /// Every diagnostic kind any registered rule can emit
    pub fn vocabulary(&self) -> Vec<VocabularyEntry> {
        self.rules
            .iter()
            .zip(&self.enabled)
            .flat_map(|(rule, enabled)| {
                rule.descriptor().kinds.iter().map(move |kind| VocabularyEntry {
                    rule: rule.name(),
                    kind: kind.id,
                    template: kind.message,
                    enabled: *enabled,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("rules", &self.rules)
            .field("node_kinds", &self.dispatch.keys().collect::<Vec<_>>())
            .finish()
    }
}
