//! Conversion of dispatch results into HTTP responses.
//!
//! # Design Decisions
//! - Bodies are plain text unless an action sets `content-type`
//! - Headers an action sets replace same-named defaults
//! - Invalid header names or values are dropped with a warning

use axum::http::{HeaderName, HeaderValue};
use axum::response::IntoResponse;

use crate::routing::{DispatchError, Response};

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let (status, headers, body) = self.into_parts();
        let mut response = (status, body).into_response();

        for (name, value) in headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header"),
            }
        }
        response
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), self.to_string()).into_response()
    }
}
