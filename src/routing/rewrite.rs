//! URL rewriting.
//!
//! # Responsibilities
//! - Compile configured rewrite rules once, at dispatcher construction
//! - Apply every matching rule, in configured order, to the request target
//! - Leave headers and body untouched
//!
//! # Design Decisions
//! - A rule matches the whole target (path + query), not a substring
//! - Rules chain: each sees the output of the previous one
//! - A rewrite producing an invalid target is skipped, never fatal

use axum::http::uri::{PathAndQuery, Uri};
use regex::Regex;
use std::fmt;

use crate::config::RewriteConfig;

/// A compiled rewrite rule.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    pattern: Regex,
    replacement: String,
}

impl RewriteRule {
    pub fn new(url_pattern: &str, replacement: impl Into<String>) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!("^(?:{})$", url_pattern))?;
        Ok(Self {
            pattern,
            replacement: replacement.into(),
        })
    }

    /// Rewritten target, or `None` when the rule does not match.
    pub fn apply(&self, target: &str) -> Option<String> {
        if self.pattern.is_match(target) {
            Some(self.pattern.replace(target, self.replacement.as_str()).into_owned())
        } else {
            None
        }
    }
}

/// Ordered set of rewrite rules.
#[derive(Debug, Clone, Default)]
pub struct RewriteRuleset {
    rules: Vec<RewriteRule>,
}

impl RewriteRuleset {
    pub fn new(rules: Vec<RewriteRule>) -> Self {
        Self { rules }
    }

    pub fn from_config(configs: &[RewriteConfig]) -> Result<Self, regex::Error> {
        let rules = configs
            .iter()
            .map(|c| RewriteRule::new(&c.url_pattern, c.replacement.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply all matching rules to a request target string.
    pub fn rewrite_target(&self, target: &str) -> String {
        self.rules
            .iter()
            .fold(target.to_string(), |current, rule| rule.apply(&current).unwrap_or(current))
    }

    /// Apply all matching rules to the path and query of a URI.
    pub fn rewrite(&self, uri: &Uri) -> Uri {
        if self.rules.is_empty() {
            return uri.clone();
        }

        let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let rewritten = self.rewrite_target(target);
        if rewritten == target {
            return uri.clone();
        }

        let path_and_query = match rewritten.parse::<PathAndQuery>() {
            Ok(pq) => pq,
            Err(e) => {
                tracing::warn!(original = %target, rewritten = %rewritten, error = %e, "Rewrite produced an invalid target; keeping original");
                return uri.clone();
            }
        };

        let mut parts = uri.clone().into_parts();
        parts.path_and_query = Some(path_and_query);
        Uri::from_parts(parts).unwrap_or_else(|_| uri.clone())
    }
}

impl fmt::Display for RewriteRuleset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, rule) in self.rules.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} -> {}", rule.pattern.as_str(), rule.replacement)?;
        }
        f.write_str("]")
    }
}
