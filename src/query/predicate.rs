//! Predicate accumulator
//!
//! SQL text is only ever assembled from static column names and `$n`
//! placeholders; every user-derived value travels as a bound [`SqlParam`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// A value bound to a positional placeholder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlParam {
    Text(String),
    Float(f64),
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlParam::Text(s) => write!(f, "'{}'", s),
            SqlParam::Float(v) => write!(f, "{}", v),
            SqlParam::Timestamp(ts) => write!(f, "'{}'", ts.to_rfc3339()),
        }
    }
}

/// Boolean fragments joined with AND, plus their bindings in placeholder order.
#[derive(Debug, Default, Clone)]
pub struct Predicates {
    fragments: Vec<String>,
    params: Vec<SqlParam>,
}

impl Predicates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter and return its placeholder.
    pub fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    pub fn bind_text(&mut self, value: impl Into<String>) -> String {
        self.bind(SqlParam::Text(value.into()))
    }

    pub fn push(&mut self, fragment: String) {
        self.fragments.push(fragment);
    }

    /// Add an OR-group as a single fragment. Empty groups are skipped.
    pub fn push_any(&mut self, alternatives: Vec<String>) {
        match alternatives.len() {
            0 => {}
            1 => self.fragments.extend(alternatives),
            _ => self.fragments.push(format!("({})", alternatives.join(" OR "))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// `WHERE ...` clause, or an empty string when no predicate applies.
    pub fn where_clause(&self) -> String {
        if self.fragments.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.fragments.join(" AND "))
        }
    }

    pub fn into_params(self) -> Vec<SqlParam> {
        self.params
    }
}

/// A fully composed, parameterized SELECT
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub table: String,
    pub columns: Vec<String>,
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl BuiltQuery {
    pub fn select(table: &str, columns: Vec<String>, predicates: Predicates) -> Self {
        let sql = format!(
            "SELECT {} FROM {}{}",
            columns.join(", "),
            table,
            predicates.where_clause()
        );
        Self {
            table: table.to_string(),
            columns,
            sql,
            params: predicates.into_params(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_are_sequential() {
        let mut preds = Predicates::new();
        let a = preds.bind(SqlParam::Float(0.0));
        let b = preds.bind(SqlParam::Float(10.0));
        preds.push(format!("depth BETWEEN {} AND {}", a, b));
        let c = preds.bind_text("polarstern");
        preds.push(format!("LOWER(ship) = {}", c));

        assert_eq!(
            preds.where_clause(),
            " WHERE depth BETWEEN $1 AND $2 AND LOWER(ship) = $3"
        );
        assert_eq!(preds.into_params().len(), 3);
    }

    #[test]
    fn test_or_groups_are_single_fragments() {
        let mut preds = Predicates::new();
        preds.push_any(vec!["a = $1".to_string(), "b = $2".to_string()]);
        preds.push_any(vec!["c = $3".to_string()]);
        preds.push_any(Vec::new());
        assert_eq!(preds.fragments(), &["(a = $1 OR b = $2)", "c = $3"]);
    }

    #[test]
    fn test_select_without_predicates() {
        let query = BuiltQuery::select(
            "cruisev2_2023",
            vec!["expocode".to_string(), "ship".to_string()],
            Predicates::new(),
        );
        assert_eq!(query.sql, "SELECT expocode, ship FROM cruisev2_2023");
        assert!(query.params.is_empty());
    }
}
