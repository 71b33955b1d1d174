//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::routing::AllowRule;

/// Root configuration for the segment router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Root handler and nesting bound.
    pub dispatch: DispatchConfig,

    /// Bearer-token principals.
    pub auth: AuthConfig,

    /// Handler definitions. Order is irrelevant; `parent` links them.
    pub handlers: Vec<HandlerConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 1024 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Dispatch settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Name of the handler every request starts at.
    pub root: String,

    /// Maximum number of handlers one request may be threaded through.
    pub max_depth: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            root: "app".to_string(),
            max_depth: crate::routing::dispatcher::DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<TokenConfig>,
}

/// A bearer token and the principal it authenticates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    pub token: String,

    /// Principal name for logging.
    pub principal: String,

    /// Permission names granted. `ADMIN` grants every permission.
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// One handler class plus the actions its instances expose.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct HandlerConfig {
    /// Unique handler name.
    pub name: String,

    /// Handler this one inherits rules, allow-list, actions and guards from.
    #[serde(default)]
    pub parent: Option<String>,

    /// Keep the inherited `$Action//$ID/$OtherID` rule at the end of the
    /// chain. Only meaningful for handlers without a parent.
    #[serde(default = "default_true")]
    pub default_rule: bool,

    /// Ordered rules; first match wins.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    /// Action name (or `*`) → `true`, `false`, `"->guard"`,
    /// `"@authenticated"` or a permission name.
    #[serde(default)]
    pub allowed_actions: BTreeMap<String, AllowValue>,

    /// Action names allowed unconditionally (case-sensitive).
    #[serde(default)]
    pub allowed_list: Vec<String>,

    #[serde(default)]
    pub actions: BTreeMap<String, ActionConfig>,

    #[serde(default)]
    pub guards: BTreeMap<String, GuardConfig>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    /// e.g. `"$Action/$ID"`, `"GET feed"`, `"files/$path*"`.
    pub pattern: String,

    /// Literal action, `"$param"`, or omitted for the default resolution.
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AllowValue {
    Flag(bool),
    Rule(String),
}

impl From<&AllowValue> for AllowRule {
    fn from(value: &AllowValue) -> Self {
        match value {
            AllowValue::Flag(flag) => AllowRule::from(*flag),
            AllowValue::Rule(rule) => match rule.parse() {
                Ok(rule) => rule,
                Err(never) => match never {},
            },
        }
    }
}

/// What an action does when invoked.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActionConfig {
    /// Continue dispatch on the named handler.
    pub delegate: Option<String>,

    /// Response status for non-delegating actions.
    pub status: u16,

    /// Response body. `{Name}` is replaced by the accumulated parameter.
    pub body: String,

    pub content_type: Option<String>,

    pub headers: BTreeMap<String, String>,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            delegate: None,
            status: 200,
            body: String::new(),
            content_type: None,
            headers: BTreeMap::new(),
        }
    }
}

/// Named check that `->name` allow-list entries delegate to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GuardConfig {
    /// Passes when the request carries the header (and value, if given).
    Header { name: String, value: Option<String> },
    /// Passes when the accumulated parameter equals `equals`.
    Param { name: String, equals: String },
    /// Passes for any authenticated principal.
    Authenticated,
    /// Passes when the query string carries the variable.
    Query { name: String },
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the admin API under `/admin`.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: RouterConfig = toml::from_str(
            r#"
            [[handlers]]
            name = "app"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.dispatch.root, "app");
        assert_eq!(config.handlers.len(), 1);
        assert!(config.handlers[0].default_rule);
        assert!(!config.admin.enabled);
    }

    #[test]
    fn test_handler_tables() {
        let config: RouterConfig = toml::from_str(
            r#"
            [[handlers]]
            name = "blog"
            parent = "page"
            rules = [
                { pattern = "$Action/$ID", action = "$Action" },
                { pattern = "feed" },
            ]
            allowed_list = ["index"]

            [handlers.allowed_actions]
            posts = true
            drafts = false
            edit = "->isEditor"
            "*" = "@authenticated"

            [handlers.actions.posts]
            body = "Post {ID}"

            [handlers.actions.comments]
            delegate = "comments"

            [handlers.guards.isEditor]
            kind = "header"
            name = "x-editor"
            "#,
        )
        .unwrap();

        let blog = &config.handlers[0];
        assert_eq!(blog.parent.as_deref(), Some("page"));
        assert_eq!(blog.rules[0].action.as_deref(), Some("$Action"));
        assert_eq!(blog.rules[1].action, None);
        assert_eq!(blog.allowed_actions["posts"], AllowValue::Flag(true));
        assert_eq!(
            AllowRule::from(&blog.allowed_actions["edit"]),
            AllowRule::Delegate("isEditor".into())
        );
        assert_eq!(
            AllowRule::from(&blog.allowed_actions["*"]),
            AllowRule::Authenticated
        );
        assert_eq!(blog.actions["posts"].status, 200);
        assert_eq!(blog.actions["comments"].delegate.as_deref(), Some("comments"));
        assert_eq!(
            blog.guards["isEditor"],
            GuardConfig::Header {
                name: "x-editor".into(),
                value: None
            }
        );
    }
}
