//! Allow-lists and the access gate.
//!
//! # Responsibilities
//! - Hold a handler class's declared allow-list
//! - Fold ancestor lists in without overriding more-derived entries
//! - Decide whether an action may be invoked for the current principal
//!
//! # Design Decisions
//! - Keys are lower-cased; invocation keeps the original casing
//! - Missing entry and missing `*` wildcard means deny
//! - Authentication mechanics live behind the `Principal` trait

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::routing::handler::RequestHandler;
use crate::routing::request::RouteRequest;

/// Wildcard key consulted when an action has no entry of its own.
pub const WILDCARD: &str = "*";

/// Prefix that delegates the decision to a named guard on the handler.
pub const DELEGATE_PREFIX: &str = "->";

/// Entry value meaning "any authenticated principal".
pub const AUTHENTICATED: &str = "@authenticated";

/// The caller on whose behalf an action runs.
pub trait Principal: Send + Sync + fmt::Debug {
    fn is_authenticated(&self) -> bool;

    /// Permission check. Only consulted for authenticated principals.
    fn can(&self, permission: &str) -> bool;

    fn name(&self) -> Option<&str> {
        None
    }
}

/// Unauthenticated caller with no permissions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl Principal for Anonymous {
    fn is_authenticated(&self) -> bool {
        false
    }

    fn can(&self, _permission: &str) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowRule {
    Allow,
    Deny,
    /// Ask the handler's guard with this name.
    Delegate(String),
    Authenticated,
    Permission(String),
}

impl FromStr for AllowRule {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Ok(if let Some(guard) = value.strip_prefix(DELEGATE_PREFIX) {
            AllowRule::Delegate(guard.trim().to_string())
        } else if value == AUTHENTICATED {
            AllowRule::Authenticated
        } else {
            AllowRule::Permission(value.to_string())
        })
    }
}

impl From<bool> for AllowRule {
    fn from(flag: bool) -> Self {
        if flag {
            AllowRule::Allow
        } else {
            AllowRule::Deny
        }
    }
}

impl fmt::Display for AllowRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowRule::Allow => f.write_str("true"),
            AllowRule::Deny => f.write_str("false"),
            AllowRule::Delegate(guard) => write!(f, "{DELEGATE_PREFIX}{guard}"),
            AllowRule::Authenticated => f.write_str(AUTHENTICATED),
            AllowRule::Permission(permission) => f.write_str(permission),
        }
    }
}

/// A handler class's allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    entries: HashMap<String, AllowRule>,
    /// Flat declaration: names allowed unconditionally, matched case-sensitively.
    listed: Vec<String>,
}

impl AllowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, action: &str, rule: AllowRule) {
        self.entries.insert(action.to_lowercase(), rule);
    }

    pub fn list(&mut self, action: impl Into<String>) {
        let action = action.into();
        if !self.listed.contains(&action) {
            self.listed.push(action);
        }
    }

    /// Fold a less-derived list in. Entries already present win.
    pub fn merge_ancestor(&mut self, ancestor: &AllowList) {
        for (key, rule) in &ancestor.entries {
            self.entries
                .entry(key.clone())
                .or_insert_with(|| rule.clone());
        }
        for action in &ancestor.listed {
            self.list(action.clone());
        }
    }

    /// The entry governing `action`: flat listing, exact key, then wildcard.
    pub fn rule_for(&self, action: &str) -> Option<AllowRule> {
        if self.listed.iter().any(|listed| listed == action) {
            return Some(AllowRule::Allow);
        }
        self.entries
            .get(&action.to_lowercase())
            .or_else(|| self.entries.get(WILDCARD))
            .cloned()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &AllowRule)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn listed(&self) -> &[String] {
        &self.listed
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.listed.is_empty()
    }
}

/// Evaluates allow-list entries for a request.
pub struct AccessGate;

impl AccessGate {
    pub fn is_allowed(
        action: &str,
        allow_list: &AllowList,
        handler: &dyn RequestHandler,
        request: &RouteRequest,
    ) -> bool {
        let Some(rule) = allow_list.rule_for(action) else {
            tracing::debug!(action, handler = handler.name(), "No allow-list entry");
            return false;
        };

        let principal = request.principal();
        match rule {
            AllowRule::Allow => true,
            AllowRule::Deny => false,
            AllowRule::Delegate(guard) => match handler.registry().guard_fn(&guard) {
                Some(check) => check(request),
                None => {
                    tracing::warn!(
                        action,
                        guard = %guard,
                        handler = handler.name(),
                        "Allow-list delegates to an unknown guard"
                    );
                    false
                }
            },
            AllowRule::Authenticated => principal.is_authenticated(),
            AllowRule::Permission(permission) => {
                principal.is_authenticated() && principal.can(&permission)
            }
        }
    }
}
