//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, RouteRequest from the request head)
//!     → routing (handler tree dispatch)
//!     → response.rs (Response / DispatchError → HTTP response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{route_request, UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer, RouterState};
