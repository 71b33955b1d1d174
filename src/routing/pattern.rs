//! Routing pattern parsing and positional matching.
//!
//! # Syntax
//! ```text
//! [METHOD ]token/token//token/token
//!
//! literal   must equal the segment at that position (case-sensitive)
//! $name     optional: binds the segment or ""
//! $name!    required: the pattern fails when the segment is absent
//! $name*    greedy: binds every remaining segment joined by '/', plus the
//!           URL extension when there is one
//! //        tokens after the marker are matched but not shifted
//! ```
//!
//! # Design Decisions
//! - Patterns are parsed once, when the rule table is built
//! - Matching never mutates the queue; `apply` commits a successful match
//! - Greedy captures are parsed but not shifted, so a nested handler can
//!   still consume them
//! - `!` and `*` are mutually exclusive and nothing may follow a greedy token

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::routing::segments::SegmentQueue;

/// Variable name → captured value for one match attempt.
pub type Params = HashMap<String, String>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern `{pattern}`: variable token with no name")]
    EmptyVariable { pattern: String },

    #[error("pattern `{pattern}`: `${name}` cannot be both required (!) and greedy (*)")]
    ConflictingSuffix { pattern: String, name: String },

    #[error("pattern `{pattern}`: tokens after greedy `${name}*` are never evaluated")]
    TokenAfterGreedy { pattern: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Optional(String),
    Required(String),
    Greedy(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    method: Option<String>,
    tokens: Vec<Token>,
    /// Number of leading tokens shifted off on success.
    shift_count: usize,
}

impl Pattern {
    pub fn parse(source: &str) -> Result<Self, PatternError> {
        let trimmed = source.trim();
        let (method, body) = split_method(trimmed);

        let (head, tail) = match body.split_once("//") {
            Some((head, tail)) => (head, Some(tail)),
            None => (body, None),
        };

        let mut tokens = Vec::new();
        for part in head.split('/').filter(|p| !p.is_empty()) {
            tokens.push(parse_token(trimmed, part)?);
        }
        let mut shift_count = tokens.len();
        if let Some(tail) = tail {
            for part in tail.split('/').filter(|p| !p.is_empty()) {
                tokens.push(parse_token(trimmed, part)?);
            }
        }

        if let Some(greedy_at) = tokens.iter().position(|t| matches!(t, Token::Greedy(_))) {
            if greedy_at + 1 < tokens.len() {
                let name = match &tokens[greedy_at] {
                    Token::Greedy(name) => name.clone(),
                    _ => String::new(),
                };
                return Err(PatternError::TokenAfterGreedy {
                    pattern: trimmed.to_string(),
                    name,
                });
            }
            shift_count = shift_count.min(greedy_at);
        }

        Ok(Self {
            source: trimmed.to_string(),
            method,
            tokens,
            shift_count,
        })
    }

    /// `$Action//$ID/$OtherID`, the rule every handler class inherits.
    pub fn default_action() -> Self {
        Self {
            source: "$Action//$ID/$OtherID".to_string(),
            method: None,
            tokens: vec![
                Token::Optional("Action".to_string()),
                Token::Optional("ID".to_string()),
                Token::Optional("OtherID".to_string()),
            ],
            shift_count: 1,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Match against the queue without consuming anything.
    ///
    /// Returns the bindings and the number of segments that were parsed but
    /// will not be shifted.
    pub fn matches(&self, queue: &SegmentQueue, method: &str) -> Option<(Params, usize)> {
        if let Some(expected) = &self.method {
            if !expected.eq_ignore_ascii_case(method) {
                return None;
            }
        }

        // The root pattern only matches an exhausted queue.
        if self.tokens.is_empty() {
            return queue.is_empty().then(|| (Params::new(), 0));
        }

        let mut params = Params::new();
        let mut unshifted = self.tokens.len() - self.shift_count;

        for (i, token) in self.tokens.iter().enumerate() {
            let present = i < queue.len();
            match token {
                Token::Literal(literal) => {
                    if !present || queue.segment_at(i) != literal {
                        return None;
                    }
                }
                Token::Required(name) => {
                    if !present {
                        return None;
                    }
                    params.insert(name.clone(), queue.segment_at(i).to_string());
                }
                Token::Optional(name) => {
                    params.insert(name.clone(), queue.segment_at(i).to_string());
                }
                Token::Greedy(name) => {
                    let rest = queue.segments(i, None);
                    let mut value = rest.join("/");
                    if let (false, Some(ext)) = (rest.is_empty(), queue.extension()) {
                        value.push('.');
                        value.push_str(ext);
                    }
                    params.insert(name.clone(), value);
                    unshifted = (i - self.shift_count) + rest.len();
                    break;
                }
            }
        }

        Some((params, unshifted))
    }

    /// Match and, on success, shift the matched head off the queue.
    /// On failure the queue is untouched.
    pub fn apply(&self, queue: &mut SegmentQueue, method: &str) -> Option<Params> {
        let (params, unshifted) = self.matches(queue, method)?;
        queue.shift(self.shift_count);
        queue.set_unshifted_parsed(unshifted);
        Some(params)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn split_method(pattern: &str) -> (Option<String>, &str) {
    if let Some((word, rest)) = pattern.split_once(' ') {
        if !word.is_empty() && word.chars().all(|c| c.is_ascii_alphabetic()) {
            return (Some(word.to_ascii_uppercase()), rest.trim_start());
        }
    }
    (None, pattern)
}

fn parse_token(pattern: &str, part: &str) -> Result<Token, PatternError> {
    let part = part.trim();
    let Some(var) = part.strip_prefix('$') else {
        return Ok(Token::Literal(part.to_string()));
    };

    let required = var.ends_with('!') || var.trim_end_matches('*').ends_with('!');
    let greedy = var.ends_with('*') || var.trim_end_matches('!').ends_with('*');
    let name = var.trim_end_matches(['!', '*']);

    if name.is_empty() {
        return Err(PatternError::EmptyVariable {
            pattern: pattern.to_string(),
        });
    }

    match (required, greedy) {
        (true, true) => Err(PatternError::ConflictingSuffix {
            pattern: pattern.to_string(),
            name: name.to_string(),
        }),
        (true, false) => Ok(Token::Required(name.to_string())),
        (false, true) => Ok(Token::Greedy(name.to_string())),
        (false, false) => Ok(Token::Optional(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(raw: &str) -> SegmentQueue {
        SegmentQueue::from(raw)
    }

    #[test]
    fn test_failed_match_leaves_queue() {
        let mut q = queue("/a/b");
        let pattern = Pattern::parse("x/$y").unwrap();
        assert!(pattern.apply(&mut q, "GET").is_none());
        assert_eq!(q.len(), 2);
        assert_eq!(q.remaining(), "a/b");
    }

    #[test]
    fn test_success_shifts_token_count() {
        let mut q = queue("/posts/42/edit");
        let pattern = Pattern::parse("$Controller/$ID").unwrap();
        let params = pattern.apply(&mut q, "GET").unwrap();
        assert_eq!(params["Controller"], "posts");
        assert_eq!(params["ID"], "42");
        assert_eq!(q.remaining(), "edit");
        assert!(!q.all_parsed());
    }

    #[test]
    fn test_greedy_marks_parsed_without_shifting() {
        let mut q = queue("/a/b/c");
        let pattern = Pattern::parse("$rest*").unwrap();
        let params = pattern.apply(&mut q, "GET").unwrap();
        assert_eq!(params["rest"], "a/b/c");
        assert_eq!(q.remaining(), "a/b/c");
        assert!(q.all_parsed());
    }

    #[test]
    fn test_greedy_after_literal() {
        let mut q = queue("/files/docs/readme");
        let pattern = Pattern::parse("files/$path*").unwrap();
        let params = pattern.apply(&mut q, "GET").unwrap();
        assert_eq!(params["path"], "docs/readme");
        assert_eq!(q.remaining(), "docs/readme");
        assert!(q.all_parsed());
    }

    #[test]
    fn test_greedy_keeps_extension() {
        let mut q = queue("/files/docs/readme.md");
        let pattern = Pattern::parse("files/$path*").unwrap();
        let params = pattern.apply(&mut q, "GET").unwrap();
        assert_eq!(params["path"], "docs/readme.md");
        assert_eq!(q.remaining(), "docs/readme");

        let mut q = queue("/files/docs/v1.2");
        let params = pattern.apply(&mut q, "GET").unwrap();
        assert_eq!(params["path"], "docs/v1.2");
    }

    #[test]
    fn test_greedy_on_empty_binds_empty() {
        let mut q = queue("/files");
        let pattern = Pattern::parse("files/$path*").unwrap();
        let params = pattern.apply(&mut q, "GET").unwrap();
        assert_eq!(params["path"], "");
        assert!(q.is_empty());
    }

    #[test]
    fn test_required_absent_fails() {
        let mut q = queue("/");
        let pattern = Pattern::parse("$id!").unwrap();
        assert!(pattern.apply(&mut q, "GET").is_none());
    }

    #[test]
    fn test_optional_binds_empty() {
        let mut q = queue("/show");
        let pattern = Pattern::parse("$Action/$ID").unwrap();
        let params = pattern.apply(&mut q, "GET").unwrap();
        assert_eq!(params["Action"], "show");
        assert_eq!(params["ID"], "");
        assert!(q.is_empty());
    }

    #[test]
    fn test_literal_is_case_sensitive() {
        let q = queue("/Blog");
        let pattern = Pattern::parse("blog").unwrap();
        assert!(pattern.matches(&q, "GET").is_none());
    }

    #[test]
    fn test_double_slash_tail_not_shifted() {
        let mut q = queue("/posts/42/7");
        let pattern = Pattern::parse("$Action//$ID/$OtherID").unwrap();
        let params = pattern.apply(&mut q, "GET").unwrap();
        assert_eq!(params["Action"], "posts");
        assert_eq!(params["ID"], "42");
        assert_eq!(params["OtherID"], "7");
        assert_eq!(q.remaining(), "42/7");
        assert!(q.all_parsed());
    }

    #[test]
    fn test_double_slash_leftover_not_parsed() {
        let mut q = queue("/posts/42/7/extra");
        let pattern = Pattern::parse("$Action//$ID/$OtherID").unwrap();
        pattern.apply(&mut q, "GET").unwrap();
        assert!(!q.all_parsed());
    }

    #[test]
    fn test_method_prefix() {
        let pattern = Pattern::parse("POST save/$ID").unwrap();
        assert_eq!(pattern.method(), Some("POST"));
        let q = queue("/save/3");
        assert!(pattern.matches(&q, "GET").is_none());
        assert!(pattern.matches(&q, "post").is_some());
    }

    #[test]
    fn test_root_pattern() {
        let pattern = Pattern::parse("").unwrap();
        assert!(pattern.matches(&queue("/"), "GET").is_some());
        assert!(pattern.matches(&queue("/a"), "GET").is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Pattern::parse("$id!*"),
            Err(PatternError::ConflictingSuffix { .. })
        ));
        assert!(matches!(
            Pattern::parse("$rest*/$after"),
            Err(PatternError::TokenAfterGreedy { .. })
        ));
        assert!(matches!(
            Pattern::parse("a/$"),
            Err(PatternError::EmptyVariable { .. })
        ));
    }
}
