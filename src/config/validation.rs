//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (root, parents, delegates, guards exist)
//! - Reject patterns and action templates that would fail at build time
//! - Detect inheritance cycles
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::{HashMap, HashSet};

use axum::http::StatusCode;
use thiserror::Error;

use crate::config::schema::{AllowValue, HandlerConfig, RouterConfig};
use crate::routing::access::DELEGATE_PREFIX;
use crate::routing::rules::{is_action_name, Rule, RuleError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("dispatch.root `{0}` is not a defined handler")]
    UnknownRoot(String),

    #[error("handler with empty name")]
    EmptyHandlerName,

    #[error("handler `{0}` is defined more than once")]
    DuplicateHandler(String),

    #[error("handler `{handler}`: parent `{parent}` is not defined")]
    UnknownParent { handler: String, parent: String },

    #[error("handler `{0}` inherits from itself")]
    InheritanceCycle(String),

    #[error("handler `{handler}`: {source}")]
    InvalidRule { handler: String, source: RuleError },

    #[error("handler `{handler}`: `{action}` is not a valid action name")]
    InvalidActionName { handler: String, action: String },

    #[error("handler `{handler}`: action `{action}` delegates to unknown handler `{target}`")]
    UnknownDelegate {
        handler: String,
        action: String,
        target: String,
    },

    #[error("handler `{handler}`: action `{action}` has invalid status {status}")]
    InvalidStatus {
        handler: String,
        action: String,
        status: u16,
    },

    #[error("handler `{handler}`: allow-list entry `{action}` delegates to unknown guard `{guard}`")]
    UnknownGuard {
        handler: String,
        action: String,
        guard: String,
    },

    #[error("dispatch.max_depth must be greater than zero")]
    ZeroDepth,

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroTimeout,

    #[error("auth token for `{0}` is empty")]
    EmptyToken(String),

    #[error("admin API is enabled with an empty api_key")]
    EmptyAdminKey,
}

pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut by_name: HashMap<&str, &HandlerConfig> = HashMap::new();
    for handler in &config.handlers {
        if handler.name.is_empty() {
            errors.push(ValidationError::EmptyHandlerName);
        } else if by_name.insert(handler.name.as_str(), handler).is_some() {
            errors.push(ValidationError::DuplicateHandler(handler.name.clone()));
        }
    }

    if !by_name.contains_key(config.dispatch.root.as_str()) {
        errors.push(ValidationError::UnknownRoot(config.dispatch.root.clone()));
    }
    if config.dispatch.max_depth == 0 {
        errors.push(ValidationError::ZeroDepth);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    for handler in &config.handlers {
        validate_handler(handler, &by_name, &mut errors);
    }

    for token in &config.auth.tokens {
        if token.token.trim().is_empty() {
            errors.push(ValidationError::EmptyToken(token.principal.clone()));
        }
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::EmptyAdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_handler(
    handler: &HandlerConfig,
    by_name: &HashMap<&str, &HandlerConfig>,
    errors: &mut Vec<ValidationError>,
) {
    if let Some(parent) = &handler.parent {
        if !by_name.contains_key(parent.as_str()) {
            errors.push(ValidationError::UnknownParent {
                handler: handler.name.clone(),
                parent: parent.clone(),
            });
        } else if inherits_from_itself(handler, by_name) {
            errors.push(ValidationError::InheritanceCycle(handler.name.clone()));
        }
    }

    for rule in &handler.rules {
        if let Err(source) = Rule::new(&rule.pattern, rule.action.as_deref()) {
            errors.push(ValidationError::InvalidRule {
                handler: handler.name.clone(),
                source,
            });
        }
    }

    for (action, config) in &handler.actions {
        if !is_action_name(action) {
            errors.push(ValidationError::InvalidActionName {
                handler: handler.name.clone(),
                action: action.clone(),
            });
        }
        match &config.delegate {
            Some(target) if !by_name.contains_key(target.as_str()) => {
                errors.push(ValidationError::UnknownDelegate {
                    handler: handler.name.clone(),
                    action: action.clone(),
                    target: target.clone(),
                });
            }
            Some(_) => {}
            None => {
                if StatusCode::from_u16(config.status).is_err() {
                    errors.push(ValidationError::InvalidStatus {
                        handler: handler.name.clone(),
                        action: action.clone(),
                        status: config.status,
                    });
                }
            }
        }
    }

    let guards = chain_guards(handler, by_name);
    for (action, value) in &handler.allowed_actions {
        if let AllowValue::Rule(rule) = value {
            if let Some(guard) = rule.trim().strip_prefix(DELEGATE_PREFIX) {
                let guard = guard.trim();
                if !guards.contains(&guard.to_lowercase()) {
                    errors.push(ValidationError::UnknownGuard {
                        handler: handler.name.clone(),
                        action: action.clone(),
                        guard: guard.to_string(),
                    });
                }
            }
        }
    }
}

fn inherits_from_itself(handler: &HandlerConfig, by_name: &HashMap<&str, &HandlerConfig>) -> bool {
    let mut seen = HashSet::new();
    let mut current = handler.parent.as_deref();
    while let Some(name) = current {
        if name == handler.name {
            return true;
        }
        if !seen.insert(name) {
            // A cycle further up; reported on the handlers that form it.
            return false;
        }
        current = by_name.get(name).and_then(|h| h.parent.as_deref());
    }
    false
}

/// Lower-cased guard names visible to `handler`, including inherited ones.
fn chain_guards(handler: &HandlerConfig, by_name: &HashMap<&str, &HandlerConfig>) -> HashSet<String> {
    let mut guards = HashSet::new();
    let mut seen = HashSet::new();
    let mut current = Some(handler);
    while let Some(h) = current {
        if !seen.insert(h.name.as_str()) {
            break;
        }
        guards.extend(h.guards.keys().map(|g| g.to_lowercase()));
        current = h.parent.as_deref().and_then(|p| by_name.get(p).copied());
    }
    guards
}
