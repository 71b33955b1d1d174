//! Handlers and their action registries.
//!
//! # Responsibilities
//! - Define the recursive dispatch contract (`RequestHandler`)
//! - Register actions and guards by name at construction time
//!
//! # Design Decisions
//! - Actions are looked up in a closed map, never by reflection
//! - Lookups are case-insensitive; the declared casing is kept for display
//! - An action either ends dispatch with a response or hands back the next
//!   handler in the chain

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::routing::error::DispatchError;
use crate::routing::request::RouteRequest;
use crate::routing::response::Response;
use crate::routing::rules::HandlerClass;

pub type ActionFn =
    Arc<dyn Fn(&RouteRequest) -> Result<ActionOutcome, DispatchError> + Send + Sync>;

/// Zero-argument check consulted by `->name` allow-list entries.
pub type GuardFn = Arc<dyn Fn(&RouteRequest) -> bool + Send + Sync>;

pub enum ActionOutcome {
    Response(Response),
    /// Continue dispatch on this handler with the same segment queue.
    Handler(Arc<dyn RequestHandler>),
}

impl From<Response> for ActionOutcome {
    fn from(response: Response) -> Self {
        ActionOutcome::Response(response)
    }
}

impl From<String> for ActionOutcome {
    fn from(body: String) -> Self {
        ActionOutcome::Response(Response::ok(body))
    }
}

impl From<&str> for ActionOutcome {
    fn from(body: &str) -> Self {
        ActionOutcome::Response(Response::ok(body))
    }
}

impl From<Arc<dyn RequestHandler>> for ActionOutcome {
    fn from(handler: Arc<dyn RequestHandler>) -> Self {
        ActionOutcome::Handler(handler)
    }
}

impl fmt::Debug for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOutcome::Response(response) => f.debug_tuple("Response").field(response).finish(),
            ActionOutcome::Handler(handler) => f.debug_tuple("Handler").field(&handler.name()).finish(),
        }
    }
}

/// Named actions and guards of one handler.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, (String, ActionFn)>,
    guards: HashMap<String, GuardFn>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action<F, O>(mut self, name: &str, action: F) -> Self
    where
        F: Fn(&RouteRequest) -> Result<O, DispatchError> + Send + Sync + 'static,
        O: Into<ActionOutcome>,
    {
        self.insert_action(
            name,
            Arc::new(move |req: &RouteRequest| -> Result<ActionOutcome, DispatchError> {
                action(req).map(Into::into)
            }),
        );
        self
    }

    pub fn guard<F>(mut self, name: &str, guard: F) -> Self
    where
        F: Fn(&RouteRequest) -> bool + Send + Sync + 'static,
    {
        self.insert_guard(name, Arc::new(guard));
        self
    }

    pub fn insert_action(&mut self, name: &str, action: ActionFn) {
        self.actions
            .insert(name.to_lowercase(), (name.to_string(), action));
    }

    pub fn insert_guard(&mut self, name: &str, guard: GuardFn) {
        self.guards.insert(name.to_lowercase(), guard);
    }

    pub fn get(&self, name: &str) -> Option<&ActionFn> {
        self.actions.get(&name.to_lowercase()).map(|(_, action)| action)
    }

    pub fn guard_fn(&self, name: &str) -> Option<&GuardFn> {
        self.guards.get(&name.to_lowercase())
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(&name.to_lowercase())
    }

    /// Declared action names, sorted.
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.values().map(|(name, _)| name.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut guards: Vec<&str> = self.guards.keys().map(String::as_str).collect();
        guards.sort_unstable();
        f.debug_struct("ActionRegistry")
            .field("actions", &self.action_names())
            .field("guards", &guards)
            .finish()
    }
}

/// Anything a request can be dispatched through.
pub trait RequestHandler: Send + Sync {
    fn class(&self) -> &HandlerClass;

    fn registry(&self) -> &ActionRegistry;

    fn name(&self) -> &str {
        self.class().name()
    }
}

/// A handler built from a class and a registry.
#[derive(Debug, Clone)]
pub struct Controller {
    class: Arc<HandlerClass>,
    registry: ActionRegistry,
}

impl Controller {
    pub fn new(class: Arc<HandlerClass>, registry: ActionRegistry) -> Self {
        Self { class, registry }
    }

    pub fn into_handler(self) -> Arc<dyn RequestHandler> {
        Arc::new(self)
    }
}

impl RequestHandler for Controller {
    fn class(&self) -> &HandlerClass {
        &self.class
    }

    fn registry(&self) -> &ActionRegistry {
        &self.registry
    }
}
