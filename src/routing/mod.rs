//! Segment routing and hierarchical dispatch.
//!
//! # Data Flow
//! ```text
//! Incoming request (method, raw URL, headers, principal)
//!     → path.rs (split into segments + extension)
//!     → request.rs (RouteRequest: segment queue + parameter maps)
//!     → dispatcher.rs, for each handler in the chain:
//!         rules.rs   (merged rule table, first match wins)
//!         pattern.rs (positional match, shift on success)
//!         access.rs  (merged allow-list, principal checks)
//!         handler.rs (invoke the named action)
//!     → Response, nested handler, or DispatchError
//!
//! Handler classes (at startup):
//!     own rules + allow-list + parent
//!     → resolved once per class (OnceLock)
//!     → shared read-only across requests
//! ```
//!
//! # Design Decisions
//! - Matching and shifting are coupled: a successful match consumes segments
//! - Deterministic: first matching rule wins, most-derived class first
//! - Actions are registered closures, never looked up by reflection
//! - No rule matching is a normal result, not an error

pub mod access;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod path;
pub mod pattern;
pub mod request;
pub mod response;
pub mod rules;
pub mod segments;
pub mod tree;

pub use access::{AccessGate, AllowList, AllowRule, Anonymous, Principal};
pub use dispatcher::{Dispatch, Dispatcher};
pub use error::DispatchError;
pub use handler::{ActionOutcome, ActionRegistry, Controller, RequestHandler};
pub use pattern::{Params, Pattern, PatternError};
pub use request::RouteRequest;
pub use response::Response;
pub use rules::{HandlerClass, RuleError};
pub use segments::SegmentQueue;
pub use tree::{HandlerTree, TreeError};
