//! Cruise metadata query construction

use crate::error::Result;
use crate::query::columns::{select_cruise_columns, CruiseColumnFlags, PiCategory};
use crate::query::filter::{normalize_terms, parse_datetime, Flag, Glob};
use crate::query::predicate::{BuiltQuery, Predicates};
use crate::query::CRUISE_TABLE;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::debug;

const PACIFIC: &str = "pacific";
const OKHOTSK: &str = "sea of okhotsk";

/// Raw query-string parameters of the cruise endpoint
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CruiseParams {
    pub cruise: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub pi: Option<String>,
    pub field: Option<String>,
    pub region: Option<String>,
    pub ship: Option<String>,
    pub measurement: Option<String>,
    pub append: Option<String>,
    pub format: Option<String>,
}

/// Normalized cruise filter set
#[derive(Debug, Clone)]
pub struct CruiseQuery {
    pub cruises: Vec<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub pi_terms: Vec<String>,
    pub regions: Vec<String>,
    pub ships: Vec<String>,
    pub flags: CruiseColumnFlags,
}

impl CruiseQuery {
    pub fn from_params(params: &CruiseParams) -> Result<Self> {
        let mut start = params
            .start
            .as_deref()
            .map(|raw| parse_datetime("start", raw).map(|ts| ts.date_naive()))
            .transpose()?;
        let mut end = params
            .end
            .as_deref()
            .map(|raw| parse_datetime("end", raw).map(|ts| ts.date_naive()))
            .transpose()?;
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                start = Some(e);
                end = Some(s);
            }
        }

        let pi_terms = normalize_terms(params.pi.as_deref());
        // only a bare `pi=false` disables; inside a list it is just a name
        let pi_disabled = pi_terms.len() == 1 && pi_terms[0] == "false";

        let measurement = match Flag::parse(params.measurement.as_deref()) {
            Flag::Terms(terms) if terms.iter().any(|t| t == "true") => Flag::All,
            other => other,
        };

        Ok(Self {
            cruises: normalize_terms(params.cruise.as_deref()),
            start,
            end,
            pi_terms: if pi_disabled { Vec::new() } else { pi_terms },
            regions: normalize_terms(params.region.as_deref()),
            ships: normalize_terms(params.ship.as_deref()),
            flags: CruiseColumnFlags {
                field: Flag::parse(params.field.as_deref()),
                append: Flag::parse(params.append.as_deref()),
                measurement,
                pi_disabled,
            },
        })
    }

    /// Build the predicate set. `pi_columns` are the PI columns chosen for
    /// output; name matching runs over them, or over every PI column in the
    /// schema when none were chosen.
    pub fn predicates(&self, pi_columns: &[String], schema: &BTreeSet<String>) -> Predicates {
        let mut preds = Predicates::new();

        if !self.pi_terms.is_empty() {
            let searched: Vec<String> = if pi_columns.is_empty() {
                PiCategory::ALL
                    .iter()
                    .map(|c| c.column().to_string())
                    .filter(|c| schema.contains(c))
                    .collect()
            } else {
                pi_columns.to_vec()
            };
            let mut alternatives = Vec::new();
            for term in &self.pi_terms {
                let glob = Glob::new(term);
                let pattern = if glob.is_wildcard() { glob.to_like() } else { glob.to_like_contains() };
                let p = preds.bind_text(pattern);
                for col in &searched {
                    alternatives.push(format!("LOWER({}) LIKE {}", col, p));
                }
            }
            preds.push_any(alternatives);
        }

        let measurement_terms = self.flags.measurement.terms();
        if !measurement_terms.is_empty() {
            let alternatives = measurement_terms
                .iter()
                .map(|t| {
                    let p = preds.bind_text(Glob::new(t).to_like_contains());
                    format!("LOWER(measurements) LIKE {}", p)
                })
                .collect();
            preds.push_any(alternatives);
        }

        if !self.regions.is_empty() {
            let mut alternatives = Vec::new();
            for term in &self.regions {
                let prefixes: Vec<String> = if term.starts_with(PACIFIC) {
                    vec![format!("{}%", PACIFIC), format!("{}%", OKHOTSK)]
                } else if term.starts_with("okhotsk") || term.starts_with(OKHOTSK) {
                    vec![format!("{}%", OKHOTSK)]
                } else {
                    vec![format!("{}%", Glob::new(term).to_like())]
                };
                for prefix in prefixes {
                    let p = preds.bind_text(prefix);
                    alternatives.push(format!("LOWER(region) LIKE {}", p));
                }
            }
            preds.push_any(alternatives);
        }

        if !self.ships.is_empty() {
            let alternatives = self
                .ships
                .iter()
                .map(|term| {
                    let glob = Glob::new(term);
                    if glob.is_wildcard() {
                        format!("LOWER(ship) LIKE {}", preds.bind_text(glob.to_like()))
                    } else {
                        format!("LOWER(ship) = {}", preds.bind_text(term.as_str()))
                    }
                })
                .collect();
            preds.push_any(alternatives);
        }

        if !self.cruises.is_empty() {
            let mut alternatives = Vec::new();
            for term in &self.cruises {
                let glob = Glob::new(term);
                if glob.is_wildcard() {
                    let p = preds.bind_text(glob.to_like());
                    alternatives.push(format!("LOWER(expocode) LIKE {}", p));
                    alternatives.push(format!("LOWER(alias) LIKE {}", p));
                } else {
                    let p = preds.bind_text(term.as_str());
                    alternatives.push(format!("LOWER(expocode) = {}", p));
                    alternatives.push(format!("LOWER(alias) = {}", p));
                }
            }
            preds.push_any(alternatives);
        }

        // The requested window must contain the cruise's whole leg envelope.
        if let Some(start) = self.start {
            let p = preds.bind_text(start.format("%Y-%m-%d").to_string());
            preds.push(format!(
                "(SELECT MIN(btrim(d)) FROM unnest(string_to_array(start_date, ',')) AS d) >= {}",
                p
            ));
        }
        if let Some(end) = self.end {
            let p = preds.bind_text(end.format("%Y-%m-%d").to_string());
            preds.push(format!(
                "(SELECT MAX(btrim(d)) FROM unnest(string_to_array(end_date, ',')) AS d) <= {}",
                p
            ));
        }

        preds
    }

    pub fn build(&self, schema: &BTreeSet<String>) -> BuiltQuery {
        let selected = select_cruise_columns(&self.flags, schema);
        let preds = self.predicates(&selected.pi_columns, schema);
        let query = BuiltQuery::select(CRUISE_TABLE, selected.columns.into_vec(), preds);
        debug!(sql = %query.sql, params = query.params.len(), "cruise query built");
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::predicate::SqlParam;

    fn schema() -> BTreeSet<String> {
        [
            "expocode", "start_date", "end_date", "region", "alias", "ship", "chief_scientist",
            "carbon_pi", "oxygen_pi", "measurements",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect()
    }

    fn query(params: CruiseParams) -> CruiseQuery {
        CruiseQuery::from_params(&params).unwrap()
    }

    fn text(params: &[SqlParam]) -> Vec<String> {
        params
            .iter()
            .map(|p| match p {
                SqlParam::Text(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_no_filters_no_where() {
        let built = query(CruiseParams::default()).build(&schema());
        assert!(!built.sql.contains("WHERE"));
        assert!(built.params.is_empty());
    }

    #[test]
    fn test_pi_terms_flatten_into_one_or_group() {
        let q = query(CruiseParams {
            pi: Some("Kelly*, Schlosser".into()),
            field: Some("chief,carbon".into()),
            ..Default::default()
        });
        let built = q.build(&schema());
        assert!(built.sql.ends_with(
            " WHERE (LOWER(chief_scientist) LIKE $1 OR LOWER(carbon_pi) LIKE $1 \
             OR LOWER(chief_scientist) LIKE $2 OR LOWER(carbon_pi) LIKE $2)"
        ));
        assert_eq!(text(&built.params), vec!["kelly%", "%schlosser%"]);
    }

    #[test]
    fn test_pi_search_without_selected_columns() {
        let q = query(CruiseParams {
            pi: Some("key".into()),
            field: Some("false".into()),
            ..Default::default()
        });
        let built = q.build(&schema());
        assert!(!built.columns.contains(&"chief_scientist".to_string()));
        assert!(built.sql.contains("LOWER(oxygen_pi) LIKE $1"));
    }

    #[test]
    fn test_pi_false_disables_search() {
        let q = query(CruiseParams { pi: Some("false".into()), ..Default::default() });
        assert!(q.pi_terms.is_empty());
        assert!(q.flags.pi_disabled);

        let listed = query(CruiseParams { pi: Some("kelly,false".into()), ..Default::default() });
        assert!(!listed.flags.pi_disabled);
        assert_eq!(listed.pi_terms, vec!["kelly", "false"]);
    }

    #[test]
    fn test_region_aliasing() {
        let q = query(CruiseParams {
            region: Some("Pacific North, okhotsk, Atlantic".into()),
            ..Default::default()
        });
        let preds = q.predicates(&[], &schema());
        assert_eq!(
            preds.fragments(),
            &["(LOWER(region) LIKE $1 OR LOWER(region) LIKE $2 OR LOWER(region) LIKE $3 \
               OR LOWER(region) LIKE $4)"]
        );
        assert_eq!(
            text(&preds.into_params()),
            vec!["pacific%", "sea of okhotsk%", "sea of okhotsk%", "atlantic%"]
        );
    }

    #[test]
    fn test_ship_glob_and_exact() {
        let q = query(CruiseParams { ship: Some("Polarstern, Arctic*".into()), ..Default::default() });
        let preds = q.predicates(&[], &schema());
        assert_eq!(preds.fragments(), &["(LOWER(ship) = $1 OR LOWER(ship) LIKE $2)"]);
        assert_eq!(text(&preds.into_params()), vec!["polarstern", "arctic%"]);
    }

    #[test]
    fn test_cruise_matches_expocode_or_alias() {
        let q = query(CruiseParams { cruise: Some("*ARK*,06AQ19950707".into()), ..Default::default() });
        let preds = q.predicates(&[], &schema());
        assert_eq!(
            preds.fragments(),
            &["(LOWER(expocode) LIKE $1 OR LOWER(alias) LIKE $1 OR LOWER(expocode) = $2 \
               OR LOWER(alias) = $2)"]
        );
    }

    #[test]
    fn test_measurement_filter_and_column() {
        let q = query(CruiseParams { measurement: Some("CTD*".into()), ..Default::default() });
        let built = q.build(&schema());
        assert!(built.columns.contains(&"measurements".to_string()));
        assert!(built.sql.ends_with("WHERE LOWER(measurements) LIKE $1"));
        assert_eq!(text(&built.params), vec!["%ctd%"]);

        let q = query(CruiseParams { measurement: Some("true".into()), ..Default::default() });
        assert!(q.predicates(&[], &schema()).is_empty());
    }

    #[test]
    fn test_date_envelope_predicates() {
        let q = query(CruiseParams {
            start: Some("1996-01-01".into()),
            end: Some("1989-01-01".into()),
            ..Default::default()
        });
        assert_eq!(q.start, NaiveDate::from_ymd_opt(1989, 1, 1));
        let preds = q.predicates(&[], &schema());
        assert_eq!(
            preds.fragments(),
            &[
                "(SELECT MIN(btrim(d)) FROM unnest(string_to_array(start_date, ',')) AS d) >= $1",
                "(SELECT MAX(btrim(d)) FROM unnest(string_to_array(end_date, ',')) AS d) <= $2",
            ]
        );
        assert_eq!(text(&preds.into_params()), vec!["1989-01-01", "1996-01-01"]);

        let only_end = query(CruiseParams { end: Some("2000-12-31".into()), ..Default::default() });
        let preds = only_end.predicates(&[], &schema());
        assert_eq!(
            preds.fragments(),
            &["(SELECT MAX(btrim(d)) FROM unnest(string_to_array(end_date, ',')) AS d) <= $1"]
        );
        assert_eq!(text(&preds.into_params()), vec!["2000-12-31"]);
    }
}
