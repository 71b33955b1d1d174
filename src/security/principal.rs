//! Bearer-token principals.
//!
//! # Responsibilities
//! - Map configured tokens to principals
//! - Resolve the principal of an incoming request from `Authorization`
//!
//! # Design Decisions
//! - Unknown or missing tokens yield the anonymous principal, never an error;
//!   the allow-lists decide what anonymous callers may do
//! - `ADMIN` grants every permission

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::http::{header, HeaderMap};

use crate::config::schema::AuthConfig;
use crate::routing::{Anonymous, Principal};

/// Permission that implies all others.
pub const ADMIN_PERMISSION: &str = "ADMIN";

#[derive(Debug, Clone)]
pub struct TokenPrincipal {
    name: String,
    permissions: HashSet<String>,
}

impl TokenPrincipal {
    pub fn new<I, S>(name: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }
}

impl Principal for TokenPrincipal {
    fn is_authenticated(&self) -> bool {
        true
    }

    fn can(&self, permission: &str) -> bool {
        self.permissions.contains(ADMIN_PERMISSION) || self.permissions.contains(permission)
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// Token → principal lookup built from `[[auth.tokens]]`.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    tokens: HashMap<String, Arc<TokenPrincipal>>,
}

impl TokenStore {
    pub fn from_config(config: &AuthConfig) -> Self {
        let tokens = config
            .tokens
            .iter()
            .map(|t| {
                (
                    t.token.clone(),
                    Arc::new(TokenPrincipal::new(&t.principal, t.permissions.iter().cloned())),
                )
            })
            .collect();
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn lookup(&self, token: &str) -> Option<Arc<TokenPrincipal>> {
        self.tokens.get(token).cloned()
    }

    /// Principal for a request carrying `headers`.
    pub fn principal_for(&self, headers: &HeaderMap) -> Arc<dyn Principal> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);

        match token.and_then(|t| self.lookup(t)) {
            Some(principal) => principal as Arc<dyn Principal>,
            None => {
                if token.is_some() {
                    tracing::debug!("Unknown bearer token, treating caller as anonymous");
                }
                Arc::new(Anonymous)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TokenConfig;
    use axum::http::HeaderValue;

    fn store() -> TokenStore {
        TokenStore::from_config(&AuthConfig {
            tokens: vec![
                TokenConfig {
                    token: "editor-token".into(),
                    principal: "eve".into(),
                    permissions: vec!["EDIT_POSTS".into()],
                },
                TokenConfig {
                    token: "root-token".into(),
                    principal: "root".into(),
                    permissions: vec![ADMIN_PERMISSION.into()],
                },
            ],
        })
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_known_token() {
        let principal = store().principal_for(&bearer("editor-token"));
        assert!(principal.is_authenticated());
        assert_eq!(principal.name(), Some("eve"));
        assert!(principal.can("EDIT_POSTS"));
        assert!(!principal.can("DELETE_POSTS"));
    }

    #[test]
    fn test_admin_grants_everything() {
        let principal = store().principal_for(&bearer("root-token"));
        assert!(principal.can("DELETE_POSTS"));
    }

    #[test]
    fn test_missing_or_unknown_token_is_anonymous() {
        let store = store();
        assert!(!store.principal_for(&HeaderMap::new()).is_authenticated());
        assert!(!store.principal_for(&bearer("guess")).is_authenticated());
    }
}
