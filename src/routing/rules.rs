//! Rule tables and handler classes.
//!
//! # Responsibilities
//! - Declare a handler class's own rules and allow-list
//! - Chain classes to their parent
//! - Resolve the merged rule table and allow-list once per class
//!
//! # Design Decisions
//! - Rules keep declaration order; most-derived class rules come first
//! - Every chain ends at `HandlerClass::base()`, which carries the
//!   `$Action//$ID/$OtherID` rule
//! - Resolution is memoized in a `OnceLock`, so classes can be shared
//!   across worker threads without further locking

use std::fmt;
use std::sync::{Arc, OnceLock};

use thiserror::Error;

use crate::routing::access::{AllowList, AllowRule};
use crate::routing::pattern::{Pattern, PatternError};

/// Action invoked when a rule resolves to nothing.
pub const DEFAULT_ACTION: &str = "index";

/// Literal template name meaning "resolve `$Action` the default way".
pub const HANDLE_ACTION: &str = "handleAction";

/// Name of the class every chain ends at.
pub const BASE_CLASS: &str = "RequestHandler";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("rule `{pattern}`: action template `$` names no parameter")]
    EmptyParam { pattern: String },

    #[error("rule `{pattern}`: `{action}` is not a valid action name")]
    InvalidAction { pattern: String, action: String },
}

/// Where a matched rule gets its action name from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionTemplate {
    Literal(String),
    /// `$key`: substitute the value just captured for `key`.
    Param(String),
    /// Unlabeled rule or `handleAction`: use the captured `Action`.
    Default,
}

impl ActionTemplate {
    pub fn parse(pattern: &str, template: Option<&str>) -> Result<Self, RuleError> {
        let template = template.map(str::trim).unwrap_or_default();
        if template.is_empty() || template == HANDLE_ACTION {
            return Ok(ActionTemplate::Default);
        }

        if let Some(param) = template.strip_prefix('$') {
            // Legacy `$Action!` / `$Action*` markers carry no meaning here.
            let param = param.trim_end_matches(['!', '*']);
            if param.is_empty() {
                return Err(RuleError::EmptyParam {
                    pattern: pattern.to_string(),
                });
            }
            return Ok(ActionTemplate::Param(param.to_string()));
        }

        if !is_action_name(template) {
            return Err(RuleError::InvalidAction {
                pattern: pattern.to_string(),
                action: template.to_string(),
            });
        }
        Ok(ActionTemplate::Literal(template.to_string()))
    }
}

impl fmt::Display for ActionTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionTemplate::Literal(name) => f.write_str(name),
            ActionTemplate::Param(key) => write!(f, "${key}"),
            ActionTemplate::Default => f.write_str(HANDLE_ACTION),
        }
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_action_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pattern: Pattern,
    action: ActionTemplate,
}

impl Rule {
    pub fn new(pattern: &str, action: Option<&str>) -> Result<Self, RuleError> {
        Ok(Self {
            pattern: Pattern::parse(pattern)?,
            action: ActionTemplate::parse(pattern, action)?,
        })
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn action(&self) -> &ActionTemplate {
        &self.action
    }
}

/// Merged view of a class and its ancestors.
#[derive(Debug, Clone)]
pub struct ResolvedClass {
    rules: Vec<Rule>,
    allowed: AllowList,
    chain: Vec<String>,
}

impl ResolvedClass {
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn allowed(&self) -> &AllowList {
        &self.allowed
    }

    /// Class names, most-derived first.
    pub fn chain(&self) -> &[String] {
        &self.chain
    }
}

/// A handler "type": its own rules and allow-list plus its parent.
#[derive(Debug)]
pub struct HandlerClass {
    name: String,
    parent: Option<Arc<HandlerClass>>,
    rules: Vec<Rule>,
    allowed: AllowList,
    resolved: OnceLock<ResolvedClass>,
}

impl HandlerClass {
    pub fn builder(name: impl Into<String>) -> HandlerClassBuilder {
        HandlerClassBuilder {
            name: name.into(),
            parent: None,
            rules: Vec::new(),
            allowed: AllowList::new(),
            detached: false,
        }
    }

    /// The class every chain ends at.
    pub fn base() -> Arc<HandlerClass> {
        static BASE: OnceLock<Arc<HandlerClass>> = OnceLock::new();
        BASE.get_or_init(|| {
            Arc::new(HandlerClass {
                name: BASE_CLASS.to_string(),
                parent: None,
                rules: vec![Rule {
                    pattern: Pattern::default_action(),
                    action: ActionTemplate::Default,
                }],
                allowed: AllowList::new(),
                resolved: OnceLock::new(),
            })
        })
        .clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<HandlerClass>> {
        self.parent.as_ref()
    }

    /// This class, then each ancestor up to the base.
    pub fn ancestry(&self) -> impl Iterator<Item = &HandlerClass> {
        std::iter::successors(Some(self), |class| class.parent.as_deref())
    }

    pub fn resolved(&self) -> &ResolvedClass {
        self.resolved.get_or_init(|| {
            let mut rules = Vec::new();
            let mut allowed = AllowList::new();
            let mut chain = Vec::new();

            for class in self.ancestry() {
                rules.extend(class.rules.iter().cloned());
                allowed.merge_ancestor(&class.allowed);
                chain.push(class.name.clone());
            }

            tracing::debug!(
                class = %self.name,
                rules = rules.len(),
                chain = ?chain,
                "Resolved handler class"
            );

            ResolvedClass {
                rules,
                allowed,
                chain,
            }
        })
    }
}

pub struct HandlerClassBuilder {
    name: String,
    parent: Option<Arc<HandlerClass>>,
    rules: Vec<(String, Option<String>)>,
    allowed: AllowList,
    detached: bool,
}

impl HandlerClassBuilder {
    pub fn parent(mut self, parent: Arc<HandlerClass>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Add a rule. `"$Action"` style templates substitute a captured value.
    pub fn rule(mut self, pattern: impl Into<String>, action: impl Into<String>) -> Self {
        self.rules.push((pattern.into(), Some(action.into())));
        self
    }

    /// Add a rule that uses the default action resolution.
    pub fn default_rule(mut self, pattern: impl Into<String>) -> Self {
        self.rules.push((pattern.into(), None));
        self
    }

    /// End the chain at this class instead of the base, dropping the
    /// inherited `$Action//$ID/$OtherID` rule. Ignored when a parent is set.
    pub fn no_default_rule(mut self) -> Self {
        self.detached = true;
        self
    }

    pub fn allow(mut self, action: &str, rule: impl Into<AllowRule>) -> Self {
        self.allowed.insert(action, rule.into());
        self
    }

    /// Flat-list an action as always allowed.
    pub fn allow_listed(mut self, action: impl Into<String>) -> Self {
        self.allowed.list(action);
        self
    }

    pub fn build(self) -> Result<Arc<HandlerClass>, RuleError> {
        let rules = self
            .rules
            .iter()
            .map(|(pattern, action)| Rule::new(pattern, action.as_deref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Arc::new(HandlerClass {
            name: self.name,
            parent: match self.parent {
                Some(parent) => Some(parent),
                None if self.detached => None,
                None => Some(HandlerClass::base()),
            },
            rules,
            allowed: self.allowed,
            resolved: OnceLock::new(),
        }))
    }
}
