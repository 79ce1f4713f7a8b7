//! Rule-based permission resolver

use chrono::{DateTime, Utc};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{Action, PermissionRule, ResourceKind, Scope};
use crate::error::Result;

/// A scope paired with its rule, as it appears in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEntry {
    pub scope: Scope,
    pub rule: PermissionRule,
}

/// How closely a rule matched; lower is more specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Specificity {
    Exact,
    Pattern,
    Kind,
}

#[derive(Debug, Clone)]
struct PatternRule {
    source: String,
    regex: Regex,
    rule: PermissionRule,
}

/// Set of permission rules, at most one per scope key.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    exact: HashMap<String, PermissionRule>,
    // Registration order decides between several matching patterns.
    patterns: Vec<PatternRule>,
    kinds: HashMap<ResourceKind, PermissionRule>,
}

fn compile(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{})$", pattern))?)
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a rule set from configuration entries.
    pub fn from_entries(entries: impl IntoIterator<Item = RuleEntry>) -> Result<Self> {
        let mut rules = Self::new();
        for entry in entries {
            rules.set(entry.scope, entry.rule)?;
        }
        Ok(rules)
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.len() + self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register `rule` under `scope`, replacing any rule with the same scope
    /// key. Flags are never merged.
    pub fn set(&mut self, scope: Scope, rule: PermissionRule) -> Result<()> {
        match scope {
            Scope::Exact(id) => {
                self.exact.insert(id, rule);
            }
            Scope::Pattern(source) => {
                if let Some(existing) = self.patterns.iter_mut().find(|p| p.source == source) {
                    existing.rule = rule;
                } else {
                    let regex = compile(&source)?;
                    self.patterns.push(PatternRule { source, regex, rule });
                }
            }
            Scope::Kind(kind) => {
                self.kinds.insert(kind, rule);
            }
        }
        Ok(())
    }

    /// The rule stored under exactly this scope key, expired or not.
    pub fn get(&self, scope: &Scope) -> Option<&PermissionRule> {
        match scope {
            Scope::Exact(id) => self.exact.get(id),
            Scope::Pattern(source) => self
                .patterns
                .iter()
                .find(|p| &p.source == source)
                .map(|p| &p.rule),
            Scope::Kind(kind) => self.kinds.get(kind),
        }
    }

    pub fn remove(&mut self, scope: &Scope) -> Option<PermissionRule> {
        match scope {
            Scope::Exact(id) => self.exact.remove(id),
            Scope::Pattern(source) => {
                let index = self.patterns.iter().position(|p| &p.source == source)?;
                Some(self.patterns.remove(index).rule)
            }
            Scope::Kind(kind) => self.kinds.remove(kind),
        }
    }

    /// Set the expiry of every registered rule that applies to `scope`,
    /// leaving flags untouched. Returns how many rules changed, or
    /// `InvalidPattern` for a pattern scope that does not compile.
    ///
    /// `kind` is the kind of the resource named by an exact scope; when known,
    /// the type-level rule for that kind is updated too.
    pub fn set_expiry(
        &mut self,
        scope: &Scope,
        kind: Option<ResourceKind>,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<usize> {
        let mut touched = 0;
        match scope {
            Scope::Exact(id) => {
                if let Some(rule) = self.exact.get_mut(id) {
                    rule.expiry = expiry;
                    touched += 1;
                }
                for pattern in self.patterns.iter_mut().filter(|p| p.regex.is_match(id)) {
                    pattern.rule.expiry = expiry;
                    touched += 1;
                }
                if let Some(rule) = kind.and_then(|k| self.kinds.get_mut(&k)) {
                    rule.expiry = expiry;
                    touched += 1;
                }
            }
            Scope::Pattern(source) => {
                let regex = match self.patterns.iter_mut().find(|p| &p.source == source) {
                    Some(pattern) => {
                        pattern.rule.expiry = expiry;
                        touched += 1;
                        pattern.regex.clone()
                    }
                    None => compile(source)?,
                };
                for (_, rule) in self.exact.iter_mut().filter(|(id, _)| regex.is_match(id)) {
                    rule.expiry = expiry;
                    touched += 1;
                }
            }
            Scope::Kind(kind) => {
                if let Some(rule) = self.kinds.get_mut(kind) {
                    rule.expiry = expiry;
                    touched += 1;
                }
            }
        }
        debug!("Updated expiry of {} rule(s) for {:?}", touched, scope);
        Ok(touched)
    }

    /// Every live rule matching the resource, most specific first.
    pub fn matching(
        &self,
        id: &str,
        kind: ResourceKind,
        now: DateTime<Utc>,
    ) -> Vec<(Specificity, &PermissionRule)> {
        let mut found = Vec::new();
        if let Some(rule) = self.exact.get(id) {
            found.push((Specificity::Exact, rule));
        }
        for pattern in self.patterns.iter().filter(|p| p.regex.is_match(id)) {
            found.push((Specificity::Pattern, &pattern.rule));
        }
        if let Some(rule) = self.kinds.get(&kind) {
            found.push((Specificity::Kind, rule));
        }
        found.retain(|(_, rule)| !rule.is_expired(now));
        found
    }

    /// The most specific live rule for the resource.
    pub fn effective(&self, id: &str, kind: ResourceKind, now: DateTime<Utc>) -> Option<&PermissionRule> {
        self.matching(id, kind, now).into_iter().next().map(|(_, rule)| rule)
    }

    /// Decide `action` on the resource. No matching rule means deny.
    pub fn resolve(&self, id: &str, kind: ResourceKind, action: Action, now: DateTime<Utc>) -> bool {
        self.effective(id, kind, now)
            .map_or(false, |rule| rule.allows(action))
    }

    /// True if two or more live rules match the resource and disagree on
    /// at least one CRUD flag.
    pub fn conflicts(&self, id: &str, kind: ResourceKind, now: DateTime<Utc>) -> bool {
        let matched = self.matching(id, kind, now);
        match matched.split_first() {
            Some(((_, first), rest)) => rest.iter().any(|(_, rule)| !first.same_flags(rule)),
            None => false,
        }
    }
}
