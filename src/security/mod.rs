//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → principal.rs (Authorization: Bearer → principal)
//!     → RouteRequest carries the principal
//!     → allow-lists decide per action
//! ```
//!
//! # Design Decisions
//! - Fail closed: unknown callers are anonymous, and anonymous callers only
//!   reach what allow-lists open to everyone

pub mod principal;

pub use principal::{TokenPrincipal, TokenStore, ADMIN_PERMISSION};
