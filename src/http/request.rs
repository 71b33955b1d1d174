//! Inbound request handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every request
//! - Turn an HTTP request head into a `RouteRequest`
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - An incoming `x-request-id` is kept, not replaced
//! - The body is not part of dispatch; only method, URI and headers are

use axum::http::{request::Parts, HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::routing::RouteRequest;
use crate::security::TokenStore;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request IDs for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Request ID attached by the request-id layer, if any.
pub fn request_id(parts: &Parts) -> &str {
    parts
        .headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Build the dispatch context for an HTTP request head.
pub fn route_request(parts: &Parts, tokens: &TokenStore) -> RouteRequest {
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    RouteRequest::new(parts.method.as_str(), target)
        .with_headers(parts.headers.clone())
        .with_principal(tokens.principal_for(&parts.headers))
}
