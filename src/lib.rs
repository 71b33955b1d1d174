//! Hierarchical URL-segment router.
//!
//! A request path is split into segments and threaded through a chain of
//! handlers. Each handler matches the head of the remaining segments against
//! its ordered rule table, consumes what matched, checks its allow-list and
//! invokes the named action, which either answers or hands the rest of the
//! path to the next handler.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::RouterConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{Dispatch, Dispatcher, HandlerTree, RouteRequest};
