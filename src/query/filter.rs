//! Filter normalization
//!
//! Turns raw comma-separated query parameters into normalized term lists,
//! tri-state flags and glob patterns.

use crate::error::{GlodapError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use itertools::Itertools;
use regex::Regex;

/// Split a comma-separated value into lower-cased, trimmed, de-duplicated
/// tokens. Empty tokens are dropped; first-seen order is kept.
pub fn normalize_terms(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .unique()
            .collect()
    })
    .unwrap_or_default()
}

/// Tri-state interpretation of a list-valued flag parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flag {
    /// Parameter absent; the field decides its own default
    Default,
    /// `false`
    Disabled,
    /// `*` or `all`
    All,
    /// Explicit list; empty when the parameter was sent blank
    Terms(Vec<String>),
}

impl Flag {
    pub fn parse(raw: Option<&str>) -> Self {
        if raw.is_none() {
            return Flag::Default;
        }
        let terms = normalize_terms(raw);
        if terms.iter().any(|t| t == "false") {
            Flag::Disabled
        } else if terms.iter().any(|t| t == "*" || t == "all") {
            Flag::All
        } else {
            Flag::Terms(terms)
        }
    }

    /// Resolve `Default` to a concrete state.
    pub fn or(self, default: Flag) -> Flag {
        match self {
            Flag::Default => default,
            other => other,
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Flag::Disabled)
    }

    pub fn terms(&self) -> &[String] {
        match self {
            Flag::Terms(terms) => terms,
            _ => &[],
        }
    }

    /// Whether a named option is enabled under this flag.
    pub fn includes(&self, name: &str) -> bool {
        match self {
            Flag::All => true,
            Flag::Terms(terms) => terms.iter().any(|t| t == name),
            Flag::Default | Flag::Disabled => false,
        }
    }
}

/// A user token where `*` stands for any run of characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glob(String);

impl Glob {
    pub fn new(token: &str) -> Self {
        Glob(token.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.0.contains('*')
    }

    /// The token with LIKE metacharacters escaped and `*` mapped to `%`.
    pub fn to_like(&self) -> String {
        escape_like(&self.0).replace('*', "%")
    }

    /// Substring LIKE pattern: `%token%`, with `*` still acting as wildcard.
    pub fn to_like_contains(&self) -> String {
        let core = Glob(self.0.trim_matches('*').to_string());
        format!("%{}%", core.to_like())
    }

    /// Anchored, case-insensitive regex equivalent of the glob.
    pub fn to_regex(&self) -> Result<Regex> {
        let body = self.0.split('*').map(regex::escape).join(".*");
        Regex::new(&format!("(?i)^{}$", body))
            .map_err(|e| GlodapError::Validation(format!("invalid pattern '{}': {}", self.0, e)))
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.to_regex().map(|re| re.is_match(candidate)).unwrap_or(false)
    }
}

/// Escape the LIKE metacharacters `\`, `%` and `_` (Postgres default escape `\`).
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Parse an ISO-8601 date or datetime. Naive values are taken as UTC.
pub fn parse_datetime(name: &str, raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    Err(GlodapError::Validation(format!(
        "Parameter '{}' must be an ISO-8601 date or datetime, got '{}'",
        name, raw
    )))
}

/// Parse a boolean query parameter.
pub fn parse_bool(name: &str, raw: Option<&str>, default: bool) -> Result<bool> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(default);
    };
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(GlodapError::Validation(format!(
            "Parameter '{}' must be a boolean, got '{}'",
            name, raw
        ))),
    }
}
