//! Permission primitives
//!
//! Two models gate mutations at the façade:
//! - the three-tier [`PermissionMode`] (`readonly`, `limited`, `unlimited`),
//!   combined with the per-instance ownership ledger;
//! - a [`RuleSet`] of CRUD rules scoped to exact ids, id patterns or whole
//!   resource kinds, each optionally expiring.

pub mod rules;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use rules::{RuleEntry, RuleSet};

/// Three-tier write permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionMode {
    /// No create, update or delete of any kind
    Readonly,
    /// Create freely; update/delete only what this instance created
    Limited,
    /// Create, update and delete anything inside the root
    Unlimited,
}

impl Default for PermissionMode {
    fn default() -> Self {
        PermissionMode::Limited
    }
}

impl std::str::FromStr for PermissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "readonly" | "read-only" | "read_only" => Ok(PermissionMode::Readonly),
            "limited" => Ok(PermissionMode::Limited),
            "unlimited" => Ok(PermissionMode::Unlimited),
            _ => Err(format!("Unknown permission mode: {}", s)),
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermissionMode::Readonly => "readonly",
            PermissionMode::Limited => "limited",
            PermissionMode::Unlimited => "unlimited",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Bucket (container) or object (leaf value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Bucket,
    Object,
}

/// CRUD flags with an optional expiry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionRule {
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub delete: bool,
    /// The rule stops applying at this instant
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl PermissionRule {
    pub fn new(create: bool, read: bool, update: bool, delete: bool) -> Self {
        Self {
            create,
            read,
            update,
            delete,
            expiry: None,
        }
    }

    pub fn allow_all() -> Self {
        Self::new(true, true, true, true)
    }

    pub fn read_only() -> Self {
        Self::new(false, true, false, false)
    }

    pub fn deny_all() -> Self {
        Self::default()
    }

    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Flag for `action`.
    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Create => self.create,
            Action::Read => self.read,
            Action::Update => self.update,
            Action::Delete => self.delete,
        }
    }

    /// Expired rules are treated as absent, never as denying.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.map_or(false, |expiry| expiry <= now)
    }

    /// True if both rules agree on every CRUD flag. Expiry is ignored.
    pub fn same_flags(&self, other: &PermissionRule) -> bool {
        self.create == other.create
            && self.read == other.read
            && self.update == other.update
            && self.delete == other.delete
    }
}

/// What a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// A single resource id
    Exact(String),
    /// A regular expression matched against the whole id
    Pattern(String),
    /// Every bucket, or every object
    Kind(ResourceKind),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_permission_mode_from_str() {
        assert_eq!("readonly".parse::<PermissionMode>().unwrap(), PermissionMode::Readonly);
        assert_eq!("READ-ONLY".parse::<PermissionMode>().unwrap(), PermissionMode::Readonly);
        assert_eq!("Limited".parse::<PermissionMode>().unwrap(), PermissionMode::Limited);
        assert_eq!("unlimited".parse::<PermissionMode>().unwrap(), PermissionMode::Unlimited);
        assert!("root".parse::<PermissionMode>().is_err());
    }

    #[test]
    fn test_rule_flags_and_expiry() {
        let now = Utc::now();
        let rule = PermissionRule::read_only().with_expiry(now + Duration::seconds(10));

        assert!(rule.allows(Action::Read));
        assert!(!rule.allows(Action::Update));
        assert!(!rule.is_expired(now));
        assert!(rule.is_expired(now + Duration::seconds(10)));
        assert!(!PermissionRule::allow_all().is_expired(now));
    }

    #[test]
    fn test_same_flags_ignores_expiry() {
        let now = Utc::now();
        let a = PermissionRule::allow_all();
        let b = PermissionRule::allow_all().with_expiry(now);
        assert!(a.same_flags(&b));
        assert!(!a.same_flags(&PermissionRule::read_only()));
    }

    #[test]
    fn test_scope_yaml_shape() {
        let scope: Scope = serde_yaml::from_str("pattern: 'store/tmp/.*'").unwrap();
        assert_eq!(scope, Scope::Pattern("store/tmp/.*".to_string()));
        let scope: Scope = serde_yaml::from_str("kind: bucket").unwrap();
        assert_eq!(scope, Scope::Kind(ResourceKind::Bucket));
    }
}
