//! Request-scoped dispatch context.
//!
//! One `RouteRequest` is created per inbound request and threaded through the
//! whole handler chain. It owns the segment queue and both parameter maps:
//! `latest_params` holds what the most recent rule captured, `all_params`
//! accumulates across the chain and is only overwritten by non-empty values.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::HeaderMap;

use crate::routing::access::{Anonymous, Principal};
use crate::routing::path::Path;
use crate::routing::pattern::{Params, Pattern};
use crate::routing::segments::SegmentQueue;

#[derive(Debug, Clone)]
pub struct RouteRequest {
    method: String,
    queue: SegmentQueue,
    query: HashMap<String, String>,
    headers: HeaderMap,
    latest_params: Params,
    all_params: Params,
    principal: Arc<dyn Principal>,
    /// Handlers the request has been dispatched through, outermost first.
    trail: Vec<String>,
}

impl RouteRequest {
    /// `raw_url` may carry a query string; it is parsed into query vars.
    pub fn new(method: &str, raw_url: &str) -> Self {
        let query = raw_url
            .split_once('?')
            .map(|(_, query)| parse_query(query.split('#').next().unwrap_or_default()))
            .unwrap_or_default();

        Self {
            method: method.to_ascii_uppercase(),
            queue: SegmentQueue::new(Path::parse(raw_url)),
            query,
            headers: HeaderMap::new(),
            latest_params: Params::new(),
            all_params: Params::new(),
            principal: Arc::new(Anonymous),
            trail: Vec::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_principal(mut self, principal: Arc<dyn Principal>) -> Self {
        self.principal = principal;
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn queue(&self) -> &SegmentQueue {
        &self.queue
    }

    pub fn extension(&self) -> Option<&str> {
        self.queue.extension()
    }

    pub fn all_parsed(&self) -> bool {
        self.queue.all_parsed()
    }

    pub fn remaining(&self) -> String {
        self.queue.remaining()
    }

    /// Match `pattern` against the queue. On success the matched head is
    /// shifted off and the captures are recorded; on failure nothing changes.
    pub fn match_pattern(&mut self, pattern: &Pattern) -> Option<Params> {
        let params = pattern.apply(&mut self.queue, &self.method)?;
        self.record_params(&params);
        Some(params)
    }

    fn record_params(&mut self, params: &Params) {
        for (key, value) in params {
            if !value.is_empty() || !self.all_params.contains_key(key) {
                self.all_params.insert(key.clone(), value.clone());
            }
        }
        self.latest_params = params.clone();
    }

    /// Accumulated value for `name`, or `""`.
    pub fn param(&self, name: &str) -> &str {
        self.all_params.get(name).map(String::as_str).unwrap_or("")
    }

    /// Value captured for `name` by the most recent match, or `""`.
    pub fn latest_param(&self, name: &str) -> &str {
        self.latest_params.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn params(&self) -> &Params {
        &self.all_params
    }

    pub fn latest_params(&self) -> &Params {
        &self.latest_params
    }

    pub fn query_var(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn principal(&self) -> &dyn Principal {
        self.principal.as_ref()
    }

    pub fn trail(&self) -> &[String] {
        &self.trail
    }

    pub(crate) fn enter(&mut self, handler: &str) {
        self.trail.push(handler.to_string());
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parsed() {
        let request = RouteRequest::new("get", "/search?q=rust+lang&page=2#results");
        assert_eq!(request.method(), "GET");
        assert_eq!(request.query_var("q"), Some("rust lang"));
        assert_eq!(request.query_var("page"), Some("2"));
        assert_eq!(request.remaining(), "search");
    }

    #[test]
    fn test_all_params_keep_non_empty() {
        let mut request = RouteRequest::new("GET", "/posts/42/edit");
        let first = Pattern::parse("$Action/$ID").unwrap();
        let second = Pattern::parse("$Action/$ID").unwrap();

        request.match_pattern(&first).unwrap();
        assert_eq!(request.param("ID"), "42");

        request.match_pattern(&second).unwrap();
        assert_eq!(request.latest_param("Action"), "edit");
        assert_eq!(request.latest_param("ID"), "");
        // Empty capture does not clobber the earlier value.
        assert_eq!(request.param("ID"), "42");
        assert_eq!(request.param("Action"), "edit");
    }

    #[test]
    fn test_failed_match_records_nothing() {
        let mut request = RouteRequest::new("GET", "/a/b");
        let pattern = Pattern::parse("x/$y").unwrap();
        assert!(request.match_pattern(&pattern).is_none());
        assert!(request.params().is_empty());
        assert_eq!(request.remaining(), "a/b");
    }

    #[test]
    fn test_header_lookup() {
        let mut headers = HeaderMap::new();
        headers.insert("x-beta", "1".parse().unwrap());
        let request = RouteRequest::new("GET", "/").with_headers(headers);
        assert_eq!(request.header("X-Beta"), Some("1"));
        assert_eq!(request.header("x-other"), None);
    }
}
