//! Hierarchical dispatch.
//!
//! # State machine
//! ```text
//! Searching ──no rule──▶ Done(Unhandled)
//!     │ first matching rule (queue already shifted)
//!     ▼
//! Matched ─▶ ResolvingAction ──invalid name──▶ Err(404)
//!                 │
//!                 ▼
//!            AccessCheck ──denied──▶ Err(403)
//!                 │
//!                 ▼
//!             Invoking ──no such action──▶ Err(404)
//!              │     │
//!   response   │     │ nested handler
//!              ▼     └──────────────▶ Searching (same queue)
//!   Done(Handled) or Err(404 unparsed remainder)
//! ```
//!
//! # Design Decisions
//! - Iterative rather than recursive; nesting depth is bounded
//! - `index` skips the access check
//! - `init` and `run` are never invocable from a URL

use std::sync::Arc;

use crate::routing::access::AccessGate;
use crate::routing::error::DispatchError;
use crate::routing::handler::{ActionOutcome, RequestHandler};
use crate::routing::request::RouteRequest;
use crate::routing::response::Response;
use crate::routing::rules::{is_action_name, ActionTemplate, DEFAULT_ACTION};

/// Default bound on handler nesting.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Action names that are never reachable from a URL.
pub const RESERVED_ACTIONS: &[&str] = &["init", "run"];

/// Result of a dispatch that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Handled(Response),
    /// No rule of `handler` matched; the caller may try elsewhere.
    Unhandled { handler: String, remaining: String },
}

enum State {
    Searching(Arc<dyn RequestHandler>),
    Matched {
        handler: Arc<dyn RequestHandler>,
        pattern: String,
        template: ActionTemplate,
    },
    ResolvingAction {
        handler: Arc<dyn RequestHandler>,
        template: ActionTemplate,
    },
    AccessCheck {
        handler: Arc<dyn RequestHandler>,
        action: String,
    },
    Invoking {
        handler: Arc<dyn RequestHandler>,
        action: String,
    },
    Done(Dispatch),
}

#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    max_depth: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl Dispatcher {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Thread `request` through `root` and whatever handlers its actions
    /// hand back.
    pub fn dispatch(
        &self,
        root: Arc<dyn RequestHandler>,
        request: &mut RouteRequest,
    ) -> Result<Dispatch, DispatchError> {
        let mut depth = 0;
        let mut state = State::Searching(root);

        loop {
            state = match state {
                State::Searching(handler) => {
                    depth += 1;
                    if depth > self.max_depth {
                        return Err(DispatchError::NestingTooDeep {
                            limit: self.max_depth,
                        });
                    }
                    request.enter(handler.name());
                    self.search(handler, request)
                }
                State::Matched {
                    handler,
                    pattern,
                    template,
                } => {
                    tracing::debug!(
                        handler = handler.name(),
                        rule = %pattern,
                        action = %template,
                        params = ?request.latest_params(),
                        remaining = %request.remaining(),
                        "Rule matched"
                    );
                    State::ResolvingAction { handler, template }
                }
                State::ResolvingAction { handler, template } => {
                    let action = resolve_action(handler.as_ref(), &template, request)?;
                    State::AccessCheck { handler, action }
                }
                State::AccessCheck { handler, action } => {
                    check_access(handler.as_ref(), &action, request)?;
                    State::Invoking { handler, action }
                }
                State::Invoking { handler, action } => invoke(handler, &action, request)?,
                State::Done(dispatch) => return Ok(dispatch),
            };
        }
    }

    fn search(&self, handler: Arc<dyn RequestHandler>, request: &mut RouteRequest) -> State {
        let matched = handler
            .class()
            .resolved()
            .rules()
            .iter()
            .find(|rule| {
                tracing::trace!(
                    handler = handler.name(),
                    rule = %rule.pattern(),
                    remaining = %request.remaining(),
                    "Trying rule"
                );
                request.match_pattern(rule.pattern()).is_some()
            })
            .map(|rule| (rule.pattern().source().to_string(), rule.action().clone()));

        match matched {
            Some((pattern, template)) => State::Matched {
                handler,
                pattern,
                template,
            },
            None => {
                tracing::debug!(
                    handler = handler.name(),
                    remaining = %request.remaining(),
                    "No rule matched"
                );
                State::Done(Dispatch::Unhandled {
                    handler: handler.name().to_string(),
                    remaining: request.remaining(),
                })
            }
        }
    }
}

fn resolve_action(
    handler: &dyn RequestHandler,
    template: &ActionTemplate,
    request: &RouteRequest,
) -> Result<String, DispatchError> {
    let action = match template {
        ActionTemplate::Literal(name) => name.as_str(),
        ActionTemplate::Param(key) => request.latest_param(key),
        ActionTemplate::Default => request.latest_param("Action"),
    };

    if action.is_empty() {
        tracing::warn!(
            handler = handler.name(),
            template = %template,
            "Action not set; using default action method name 'index'"
        );
        return Ok(DEFAULT_ACTION.to_string());
    }

    if !is_action_name(action) {
        return Err(DispatchError::MalformedActionTemplate {
            handler: handler.name().to_string(),
            template: template.to_string(),
            value: action.to_string(),
        });
    }

    Ok(action.to_string())
}

fn check_access(
    handler: &dyn RequestHandler,
    action: &str,
    request: &RouteRequest,
) -> Result<(), DispatchError> {
    let forbidden = || DispatchError::ActionForbidden {
        handler: handler.name().to_string(),
        action: action.to_string(),
    };

    if RESERVED_ACTIONS.iter().any(|r| r.eq_ignore_ascii_case(action)) {
        tracing::warn!(handler = handler.name(), action, "Reserved action requested");
        return Err(forbidden());
    }

    if action.eq_ignore_ascii_case(DEFAULT_ACTION) {
        return Ok(());
    }

    let allowed = handler.class().resolved().allowed();
    if AccessGate::is_allowed(action, allowed, handler, request) {
        Ok(())
    } else {
        tracing::warn!(handler = handler.name(), action, "Access denied");
        Err(forbidden())
    }
}

fn invoke(
    handler: Arc<dyn RequestHandler>,
    action: &str,
    request: &RouteRequest,
) -> Result<State, DispatchError> {
    let Some(call) = handler.registry().get(action) else {
        return Err(DispatchError::ActionNotFound {
            handler: handler.name().to_string(),
            action: action.to_string(),
        });
    };

    tracing::debug!(handler = handler.name(), action, "Invoking action");
    match call(request)? {
        ActionOutcome::Handler(next) => {
            tracing::debug!(
                from = handler.name(),
                to = next.name(),
                remaining = %request.remaining(),
                "Descending into nested handler"
            );
            Ok(State::Searching(next))
        }
        ActionOutcome::Response(response) => {
            if request.all_parsed() {
                Ok(State::Done(Dispatch::Handled(response)))
            } else {
                Err(DispatchError::UnparsedRemainder {
                    handler: handler.name().to_string(),
                    remaining: request.remaining(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::handler::{ActionRegistry, Controller};
    use crate::routing::rules::HandlerClass;
    use axum::http::StatusCode;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn handler(class: Arc<HandlerClass>, registry: ActionRegistry) -> Arc<dyn RequestHandler> {
        Controller::new(class, registry).into_handler()
    }

    fn body(dispatch: Dispatch) -> String {
        match dispatch {
            Dispatch::Handled(response) => response.body().to_string(),
            other => panic!("expected handled, got {other:?}"),
        }
    }

    #[test]
    fn test_default_rule_dispatches_action() {
        let class = HandlerClass::builder("Pages")
            .allow("about", true)
            .build()
            .unwrap();
        let root = handler(class, ActionRegistry::new().action("about", |_| Ok("about us")));

        let mut request = RouteRequest::new("GET", "/about");
        let dispatch = Dispatcher::default().dispatch(root, &mut request).unwrap();
        assert_eq!(body(dispatch), "about us");
    }

    #[test]
    fn test_empty_action_falls_back_to_index() {
        let class = HandlerClass::builder("Home").build().unwrap();
        let root = handler(class, ActionRegistry::new().action("index", |_| Ok("home")));

        let mut request = RouteRequest::new("GET", "/");
        let dispatch = Dispatcher::default().dispatch(root, &mut request).unwrap();
        assert_eq!(body(dispatch), "home");
    }

    #[test]
    fn test_missing_action_is_not_found() {
        let class = HandlerClass::builder("Home").allow("*", true).build().unwrap();
        let root = handler(class, ActionRegistry::new());

        let mut request = RouteRequest::new("GET", "/nothing");
        let err = Dispatcher::default().dispatch(root, &mut request).unwrap_err();
        assert!(matches!(err, DispatchError::ActionNotFound { .. }));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_denied_action_never_runs() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let class = HandlerClass::builder("Admin").build().unwrap();
        let root = handler(
            class,
            ActionRegistry::new().action("purge", move |_| {
                flag.store(true, Ordering::SeqCst);
                Ok("purged")
            }),
        );

        let mut request = RouteRequest::new("GET", "/purge");
        let err = Dispatcher::default().dispatch(root, &mut request).unwrap_err();
        assert!(matches!(err, DispatchError::ActionForbidden { .. }));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_reserved_actions_forbidden() {
        let class = HandlerClass::builder("Home").allow("*", true).build().unwrap();
        let root = handler(class, ActionRegistry::new().action("init", |_| Ok("boot")));

        let mut request = RouteRequest::new("GET", "/init");
        let err = Dispatcher::default().dispatch(root, &mut request).unwrap_err();
        assert!(matches!(err, DispatchError::ActionForbidden { .. }));
    }

    #[test]
    fn test_invalid_substituted_name() {
        let class = HandlerClass::builder("Home")
            .rule("go/$Target", "$Target")
            .allow("*", true)
            .build()
            .unwrap();
        let root = handler(class, ActionRegistry::new());

        let mut request = RouteRequest::new("GET", "/go/not-an-action");
        let err = Dispatcher::default().dispatch(root, &mut request).unwrap_err();
        assert!(matches!(err, DispatchError::MalformedActionTemplate { .. }));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_no_rule_is_unhandled() {
        let class = HandlerClass::builder("Strict")
            .rule("only/$ID!", "show")
            .no_default_rule()
            .build()
            .unwrap();
        let root = handler(class, ActionRegistry::new());

        let mut request = RouteRequest::new("GET", "/only");
        let dispatch = Dispatcher::default().dispatch(root, &mut request).unwrap();
        assert_eq!(
            dispatch,
            Dispatch::Unhandled {
                handler: "Strict".into(),
                remaining: "only".into(),
            }
        );
    }

    #[test]
    fn test_unparsed_remainder() {
        let class = HandlerClass::builder("Blog")
            .rule("$Action/$ID", "$Action")
            .allow("posts", true)
            .build()
            .unwrap();
        let root = handler(class, ActionRegistry::new().action("posts", |_| Ok("post")));

        let mut request = RouteRequest::new("GET", "/posts/42/edit");
        let err = Dispatcher::default().dispatch(root, &mut request).unwrap_err();
        match err {
            DispatchError::UnparsedRemainder { remaining, .. } => assert_eq!(remaining, "edit"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_self_returning_handler_is_bounded() {
        struct Looping {
            class: Arc<HandlerClass>,
            registry: ActionRegistry,
        }

        impl RequestHandler for Looping {
            fn class(&self) -> &HandlerClass {
                &self.class
            }
            fn registry(&self) -> &ActionRegistry {
                &self.registry
            }
        }

        let class = HandlerClass::builder("Loop").build().unwrap();
        let root: Arc<dyn RequestHandler> = Arc::new_cyclic(|weak: &std::sync::Weak<Looping>| {
            let weak = weak.clone();
            Looping {
                class,
                registry: ActionRegistry::new().action("index", move |_| {
                    let me = weak
                        .upgrade()
                        .ok_or_else(|| DispatchError::http(StatusCode::GONE, "gone"))?;
                    Ok(ActionOutcome::Handler(me))
                }),
            }
        });

        let mut request = RouteRequest::new("GET", "/");
        let err = Dispatcher::new(4).dispatch(root, &mut request).unwrap_err();
        assert!(matches!(err, DispatchError::NestingTooDeep { limit: 4 }));
        assert_eq!(request.trail().len(), 4);
    }
}
