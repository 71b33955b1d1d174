//! Handler tree compiled from configuration.
//!
//! Every `[[handlers]]` entry becomes one `HandlerClass` (rules and
//! allow-list, chained through `parent`) and one `Controller` whose registry
//! holds the configured actions and guards. Actions and guards are inherited
//! from ancestors; a handler may redefine either by name.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::config::schema::{ActionConfig, GuardConfig, HandlerConfig, RouterConfig};
use crate::routing::access::AllowRule;
use crate::routing::dispatcher::{Dispatch, Dispatcher};
use crate::routing::error::DispatchError;
use crate::routing::handler::{
    ActionFn, ActionOutcome, ActionRegistry, Controller, GuardFn, RequestHandler,
};
use crate::routing::request::RouteRequest;
use crate::routing::response::Response;
use crate::routing::rules::{HandlerClass, RuleError};

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("handler `{0}` is not defined")]
    UnknownHandler(String),

    #[error("handler `{0}` is defined more than once")]
    DuplicateHandler(String),

    #[error("handler `{handler}`: parent `{parent}` is not defined")]
    UnknownParent { handler: String, parent: String },

    #[error("handler inheritance cycle: {}", .0.join(" -> "))]
    ParentCycle(Vec<String>),

    #[error("handler `{handler}`: {source}")]
    Rule { handler: String, source: RuleError },

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
}

type Nodes = HashMap<String, Arc<Controller>>;

/// All configured handlers plus the one every request starts at.
#[derive(Debug)]
pub struct HandlerTree {
    root: Arc<Controller>,
    nodes: Arc<Nodes>,
    dispatcher: Dispatcher,
}

impl HandlerTree {
    pub fn build(config: &RouterConfig) -> Result<Self, TreeError> {
        let mut configs: HashMap<&str, &HandlerConfig> = HashMap::new();
        for handler in &config.handlers {
            if configs.insert(handler.name.as_str(), handler).is_some() {
                return Err(TreeError::DuplicateHandler(handler.name.clone()));
            }
        }

        let mut classes = HashMap::new();
        for handler in &config.handlers {
            build_class(&handler.name, &configs, &mut classes, &mut Vec::new())?;
        }

        let mut plans = HashMap::new();
        for handler in &config.handlers {
            plans.insert(handler.name.clone(), plan_registry(handler, &configs)?);
        }

        let nodes = Arc::new_cyclic(|weak: &Weak<Nodes>| {
            plans
                .into_iter()
                .filter_map(|(name, plan)| {
                    let class = classes.get(&name)?.clone();
                    let registry = plan.into_registry(weak);
                    Some((name, Arc::new(Controller::new(class, registry))))
                })
                .collect::<Nodes>()
        });

        let root = nodes
            .get(&config.dispatch.root)
            .cloned()
            .ok_or_else(|| TreeError::UnknownHandler(config.dispatch.root.clone()))?;

        tracing::info!(
            root = %config.dispatch.root,
            handlers = nodes.len(),
            max_depth = config.dispatch.max_depth,
            "Handler tree built"
        );

        Ok(Self {
            root,
            nodes,
            dispatcher: Dispatcher::new(config.dispatch.max_depth),
        })
    }

    pub fn root(&self) -> Arc<dyn RequestHandler> {
        self.root.clone()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher
    }

    /// Dispatch `request` starting at the root handler.
    pub fn dispatch(&self, request: &mut RouteRequest) -> Result<Dispatch, DispatchError> {
        self.dispatcher.dispatch(self.root(), request)
    }

    /// Resolved view of every handler, sorted by name.
    pub fn describe(&self) -> Vec<HandlerInfo> {
        let mut infos: Vec<HandlerInfo> = self
            .nodes
            .values()
            .map(|node| HandlerInfo::from_handler(node.as_ref()))
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}

/// Introspection record served by the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerInfo {
    pub name: String,
    pub chain: Vec<String>,
    pub rules: Vec<RuleInfo>,
    pub allowed_actions: BTreeMap<String, String>,
    pub allowed_list: Vec<String>,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleInfo {
    pub pattern: String,
    pub action: String,
}

impl HandlerInfo {
    fn from_handler(handler: &dyn RequestHandler) -> Self {
        let resolved = handler.class().resolved();
        Self {
            name: handler.name().to_string(),
            chain: resolved.chain().to_vec(),
            rules: resolved
                .rules()
                .iter()
                .map(|rule| RuleInfo {
                    pattern: rule.pattern().source().to_string(),
                    action: rule.action().to_string(),
                })
                .collect(),
            allowed_actions: resolved
                .allowed()
                .entries()
                .map(|(action, rule)| (action.to_string(), rule.to_string()))
                .collect(),
            allowed_list: resolved.allowed().listed().to_vec(),
            actions: handler
                .registry()
                .action_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

fn build_class(
    name: &str,
    configs: &HashMap<&str, &HandlerConfig>,
    classes: &mut HashMap<String, Arc<HandlerClass>>,
    visiting: &mut Vec<String>,
) -> Result<Arc<HandlerClass>, TreeError> {
    if let Some(class) = classes.get(name) {
        return Ok(class.clone());
    }
    if visiting.iter().any(|v| v == name) {
        visiting.push(name.to_string());
        return Err(TreeError::ParentCycle(visiting.clone()));
    }
    let config = configs
        .get(name)
        .ok_or_else(|| TreeError::UnknownHandler(name.to_string()))?;

    visiting.push(name.to_string());
    let mut builder = HandlerClass::builder(name);
    match &config.parent {
        Some(parent) => {
            if !configs.contains_key(parent.as_str()) {
                return Err(TreeError::UnknownParent {
                    handler: name.to_string(),
                    parent: parent.clone(),
                });
            }
            builder = builder.parent(build_class(parent, configs, classes, visiting)?);
        }
        None if !config.default_rule => builder = builder.no_default_rule(),
        None => {}
    }
    visiting.pop();

    for rule in &config.rules {
        builder = match &rule.action {
            Some(action) => builder.rule(&rule.pattern, action),
            None => builder.default_rule(&rule.pattern),
        };
    }
    for (action, value) in &config.allowed_actions {
        builder = builder.allow(action, AllowRule::from(value));
    }
    for action in &config.allowed_list {
        builder = builder.allow_listed(action);
    }

    let class = builder.build().map_err(|source| TreeError::Rule {
        handler: name.to_string(),
        source,
    })?;
    classes.insert(name.to_string(), class.clone());
    Ok(class)
}

enum ActionPlan {
    Delegate(String),
    Static(StaticResponse),
}

#[derive(Debug, Clone)]
struct StaticResponse {
    status: StatusCode,
    body: String,
    headers: Vec<(String, String)>,
}

impl StaticResponse {
    fn render(&self, request: &RouteRequest) -> Response {
        self.headers.iter().fold(
            Response::new(self.status, interpolate(&self.body, request)),
            |response, (name, value)| response.with_header(name, value),
        )
    }
}

/// Actions and guards of a handler, ancestors first so descendants win.
struct RegistryPlan {
    actions: Vec<(String, ActionPlan)>,
    guards: Vec<(String, GuardConfig)>,
}

impl RegistryPlan {
    fn into_registry(self, nodes: &Weak<Nodes>) -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        for (name, plan) in self.actions {
            let action: ActionFn = match plan {
                ActionPlan::Delegate(target) => delegate_action(target, nodes.clone()),
                ActionPlan::Static(response) => Arc::new(
                    move |request: &RouteRequest| -> Result<ActionOutcome, DispatchError> {
                        Ok(ActionOutcome::Response(response.render(request)))
                    },
                ),
            };
            registry.insert_action(&name, action);
        }
        for (name, guard) in self.guards {
            registry.insert_guard(&name, guard_fn(guard));
        }
        registry
    }
}

fn plan_registry(
    handler: &HandlerConfig,
    configs: &HashMap<&str, &HandlerConfig>,
) -> Result<RegistryPlan, TreeError> {
    let mut lineage = vec![handler];
    let mut current = handler;
    while let Some(parent) = current
        .parent
        .as_deref()
        .and_then(|p| configs.get(p).copied())
    {
        lineage.push(parent);
        current = parent;
    }

    let mut plan = RegistryPlan {
        actions: Vec::new(),
        guards: Vec::new(),
    };
    for config in lineage.iter().rev() {
        for (name, action) in &config.actions {
            plan.actions
                .push((name.clone(), plan_action(config, name, action, configs)?));
        }
        for (name, guard) in &config.guards {
            plan.guards.push((name.clone(), guard.clone()));
        }
    }
    Ok(plan)
}

fn plan_action(
    handler: &HandlerConfig,
    name: &str,
    action: &ActionConfig,
    configs: &HashMap<&str, &HandlerConfig>,
) -> Result<ActionPlan, TreeError> {
    if let Some(target) = &action.delegate {
        if !configs.contains_key(target.as_str()) {
            return Err(TreeError::UnknownDelegate {
                handler: handler.name.clone(),
                action: name.to_string(),
                target: target.clone(),
            });
        }
        return Ok(ActionPlan::Delegate(target.clone()));
    }

    let status = StatusCode::from_u16(action.status).map_err(|_| TreeError::InvalidStatus {
        handler: handler.name.clone(),
        action: name.to_string(),
        status: action.status,
    })?;

    let mut headers: Vec<(String, String)> = action
        .content_type
        .iter()
        .map(|ct| ("content-type".to_string(), ct.clone()))
        .collect();
    headers.extend(action.headers.iter().map(|(k, v)| (k.clone(), v.clone())));

    Ok(ActionPlan::Static(StaticResponse {
        status,
        body: action.body.clone(),
        headers,
    }))
}

fn delegate_action(target: String, nodes: Weak<Nodes>) -> ActionFn {
    Arc::new(move |_request: &RouteRequest| -> Result<ActionOutcome, DispatchError> {
        let node = nodes
            .upgrade()
            .and_then(|nodes| nodes.get(&target).cloned())
            .ok_or_else(|| {
                DispatchError::http(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Handler '{target}' is no longer available"),
                )
            })?;
        Ok(ActionOutcome::Handler(node))
    })
}

fn guard_fn(guard: GuardConfig) -> GuardFn {
    match guard {
        GuardConfig::Header { name, value } => Arc::new(move |request: &RouteRequest| {
            match (request.header(&name), value.as_deref()) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            }
        }),
        GuardConfig::Param { name, equals } => {
            Arc::new(move |request: &RouteRequest| request.param(&name) == equals)
        }
        GuardConfig::Authenticated => {
            Arc::new(|request: &RouteRequest| request.principal().is_authenticated())
        }
        GuardConfig::Query { name } => {
            Arc::new(move |request: &RouteRequest| request.query_var(&name).is_some())
        }
    }
}

/// Placeholder for the URL extension, unless a rule captured a parameter of
/// the same name.
const EXTENSION_PLACEHOLDER: &str = "ext";

/// Replace `{Name}` with the accumulated parameter `Name`. Braces that do
/// not enclose a plain identifier are kept as written.
fn interpolate(template: &str, request: &RouteRequest) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close)
                if close > 0
                    && after[..close]
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_') =>
            {
                let name = &after[..close];
                let value = match name {
                    EXTENSION_PLACEHOLDER if !request.params().contains_key(name) => {
                        request.extension().unwrap_or_default()
                    }
                    _ => request.param(name),
                };
                out.push_str(value);
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
