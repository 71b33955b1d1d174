//! Dispatch errors.
//!
//! A rule table with no matching rule is not an error; see
//! `Dispatch::Unhandled`. Everything here terminates the dispatch chain and
//! is turned into a response by the top-level caller.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Action '{action}' isn't available on {handler}")]
    ActionNotFound { handler: String, action: String },

    #[error("Action '{action}' isn't allowed on {handler}")]
    ActionForbidden { handler: String, action: String },

    #[error("Action template `{template}` on {handler} resolved to invalid action name '{value}'")]
    MalformedActionTemplate {
        handler: String,
        template: String,
        value: String,
    },

    #[error("{handler} can't handle sub-URLs: '{remaining}' was not parsed")]
    UnparsedRemainder { handler: String, remaining: String },

    #[error("Dispatch nested deeper than {limit} handlers")]
    NestingTooDeep { limit: usize },

    /// Raised by an action to end the request with a specific status.
    #[error("{message}")]
    Http { status: StatusCode, message: String },
}

impl DispatchError {
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        DispatchError::Http {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::ActionNotFound { .. }
            | DispatchError::MalformedActionTemplate { .. }
            | DispatchError::UnparsedRemainder { .. } => StatusCode::NOT_FOUND,
            DispatchError::ActionForbidden { .. } => StatusCode::FORBIDDEN,
            DispatchError::NestingTooDeep { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchError::Http { status, .. } => *status,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::ActionNotFound { .. } => "action_not_found",
            DispatchError::ActionForbidden { .. } => "action_forbidden",
            DispatchError::MalformedActionTemplate { .. } => "malformed_action",
            DispatchError::UnparsedRemainder { .. } => "unparsed_remainder",
            DispatchError::NestingTooDeep { .. } => "nesting_too_deep",
            DispatchError::Http { .. } => "http",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let not_found = DispatchError::ActionNotFound {
            handler: "Blog".into(),
            action: "missing".into(),
        };
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.to_string(), "Action 'missing' isn't available on Blog");

        let forbidden = DispatchError::ActionForbidden {
            handler: "Blog".into(),
            action: "edit".into(),
        };
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let teapot = DispatchError::http(StatusCode::IM_A_TEAPOT, "short and stout");
        assert_eq!(teapot.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(teapot.to_string(), "short and stout");
    }
}
