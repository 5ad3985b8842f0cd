//! Measurement (bottle data) query construction

use crate::error::{GlodapError, Result};
use crate::query::columns::{select_measurement_columns, MeasurementColumnFlags};
use crate::query::filter::{normalize_terms, parse_bool, parse_datetime, Flag};
use crate::query::predicate::{BuiltQuery, Predicates, SqlParam};
use crate::query::MEASUREMENT_TABLE;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::debug;

pub const DEFAULT_MIN_DEPTH: f64 = 0.0;
pub const DEFAULT_MAX_DEPTH: f64 = 10000.0;

pub fn default_start() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1972, 1, 1)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Raw query-string parameters of the measurement endpoint
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MeasurementParams {
    pub lon0: Option<f64>,
    pub lat0: Option<f64>,
    pub lon1: Option<f64>,
    pub lat1: Option<f64>,
    pub dep0: Option<f64>,
    pub dep1: Option<f64>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub cruise: Option<String>,
    pub append: Option<String>,
    pub flag: Option<String>,
    pub qc: Option<String>,
    pub doi: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpatialFilter {
    /// Full, non-degenerate bounding box (min/max ordered)
    Envelope { lon0: f64, lat0: f64, lon1: f64, lat1: f64 },
    Point { lon: f64, lat: f64 },
    Unbounded,
}

/// Validated, range-normalized measurement filter set
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementQuery {
    pub spatial: SpatialFilter,
    pub depth: (f64, f64),
    pub time: (DateTime<Utc>, DateTime<Utc>),
    pub cruises: Vec<String>,
    pub append: Flag,
    pub columns: MeasurementColumnFlags,
}

fn ordered<T: PartialOrd>(a: T, b: T) -> (T, T) {
    if a > b {
        (b, a)
    } else {
        (a, b)
    }
}

impl MeasurementQuery {
    /// Validate and normalize raw parameters. Rejects requests that have
    /// neither a cruise list nor a lon0/lat0 anchor.
    pub fn from_params(params: &MeasurementParams, now: DateTime<Utc>) -> Result<Self> {
        let cruises = normalize_terms(params.cruise.as_deref());
        if cruises.is_empty() && (params.lon0.is_none() || params.lat0.is_none()) {
            return Err(GlodapError::Validation(
                "You must specify either cruise or both lon0 and lat0".to_string(),
            ));
        }

        let spatial = match (params.lon0, params.lat0) {
            (Some(lon0), Some(lat0)) => match (params.lon1, params.lat1) {
                (Some(lon1), Some(lat1)) if lon0 != lon1 && lat0 != lat1 => {
                    let (lon0, lon1) = ordered(lon0, lon1);
                    let (lat0, lat1) = ordered(lat0, lat1);
                    SpatialFilter::Envelope { lon0, lat0, lon1, lat1 }
                }
                (lon1, lat1) => {
                    // a swapped partial box still anchors on its lower corner
                    let lon = lon1.map_or(lon0, |l| lon0.min(l));
                    let lat = lat1.map_or(lat0, |l| lat0.min(l));
                    SpatialFilter::Point { lon, lat }
                }
            },
            _ => SpatialFilter::Unbounded,
        };

        let depth = ordered(
            params.dep0.unwrap_or(DEFAULT_MIN_DEPTH),
            params.dep1.unwrap_or(DEFAULT_MAX_DEPTH),
        );

        let start = match params.start.as_deref() {
            Some(raw) => parse_datetime("start", raw)?,
            None => default_start(),
        };
        let end = match params.end.as_deref() {
            Some(raw) => parse_datetime("end", raw)?,
            None => now,
        };

        Ok(Self {
            spatial,
            depth,
            time: ordered(start, end),
            cruises,
            append: Flag::parse(params.append.as_deref()),
            columns: MeasurementColumnFlags {
                flag: parse_bool("flag", params.flag.as_deref(), false)?,
                qc: parse_bool("qc", params.qc.as_deref(), false)?,
                doi: parse_bool("doi", params.doi.as_deref(), true)?,
            },
        })
    }

    pub fn predicates(&self) -> Predicates {
        let mut preds = Predicates::new();

        match self.spatial {
            SpatialFilter::Envelope { lon0, lat0, lon1, lat1 } => {
                let a = preds.bind(SqlParam::Float(lon0));
                let b = preds.bind(SqlParam::Float(lat0));
                let c = preds.bind(SqlParam::Float(lon1));
                let d = preds.bind(SqlParam::Float(lat1));
                preds.push(format!(
                    "ST_Within(geom, ST_MakeEnvelope({}, {}, {}, {}, 4326))",
                    a, b, c, d
                ));
            }
            SpatialFilter::Point { lon, lat } => {
                let a = preds.bind(SqlParam::Float(lon));
                let b = preds.bind(SqlParam::Float(lat));
                preds.push(format!("longitude = {} AND latitude = {}", a, b));
            }
            SpatialFilter::Unbounded => {}
        }

        let d0 = preds.bind(SqlParam::Float(self.depth.0));
        let d1 = preds.bind(SqlParam::Float(self.depth.1));
        preds.push(format!("depth BETWEEN {} AND {}", d0, d1));

        let t0 = preds.bind(SqlParam::Timestamp(self.time.0));
        let t1 = preds.bind(SqlParam::Timestamp(self.time.1));
        preds.push(format!("datetime BETWEEN {} AND {}", t0, t1));

        if !self.cruises.is_empty() {
            let placeholders: Vec<String> = self
                .cruises
                .iter()
                .map(|c| preds.bind_text(c.as_str()))
                .collect();
            preds.push(format!("LOWER(expocode) IN ({})", placeholders.join(", ")));
        }

        preds
    }

    pub fn build(&self, schema: &BTreeSet<String>) -> BuiltQuery {
        let columns = select_measurement_columns(&self.append, self.columns, schema);
        let query = BuiltQuery::select(MEASUREMENT_TABLE, columns.into_vec(), self.predicates());
        debug!(sql = %query.sql, params = query.params.len(), "measurement query built");
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn box_params(lon0: f64, lat0: f64, lon1: f64, lat1: f64) -> MeasurementParams {
        MeasurementParams {
            lon0: Some(lon0),
            lat0: Some(lat0),
            lon1: Some(lon1),
            lat1: Some(lat1),
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_cruise_or_anchor() {
        let err = MeasurementQuery::from_params(&MeasurementParams::default(), now()).unwrap_err();
        assert!(matches!(err, GlodapError::Validation(_)));

        let only_lon = MeasurementParams { lon0: Some(120.0), ..Default::default() };
        assert!(MeasurementQuery::from_params(&only_lon, now()).is_err());

        let blank_cruise = MeasurementParams { cruise: Some(" , ".into()), ..Default::default() };
        assert!(MeasurementQuery::from_params(&blank_cruise, now()).is_err());

        let cruise = MeasurementParams { cruise: Some("06AQ19950707".into()), ..Default::default() };
        let query = MeasurementQuery::from_params(&cruise, now()).unwrap();
        assert_eq!(query.spatial, SpatialFilter::Unbounded);
    }

    #[test]
    fn test_swapped_box_is_equivalent() {
        let straight = MeasurementQuery::from_params(&box_params(120.0, 20.0, 125.0, 25.0), now()).unwrap();
        let swapped = MeasurementQuery::from_params(&box_params(125.0, 25.0, 120.0, 20.0), now()).unwrap();
        assert_eq!(straight, swapped);
        assert_eq!(straight.predicates().into_params(), swapped.predicates().into_params());
    }

    #[test]
    fn test_degenerate_box_is_point() {
        let query = MeasurementQuery::from_params(&box_params(120.0, 20.0, 120.0, 25.0), now()).unwrap();
        assert_eq!(query.spatial, SpatialFilter::Point { lon: 120.0, lat: 20.0 });
        let preds = query.predicates();
        assert_eq!(preds.fragments()[0], "longitude = $1 AND latitude = $2");
    }

    #[test]
    fn test_defaults_and_swaps() {
        let params = MeasurementParams {
            lon0: Some(1.0),
            lat0: Some(2.0),
            dep0: Some(500.0),
            dep1: Some(100.0),
            start: Some("2000-01-01".into()),
            end: Some("1990-01-01".into()),
            ..Default::default()
        };
        let query = MeasurementQuery::from_params(&params, now()).unwrap();
        assert_eq!(query.depth, (100.0, 500.0));
        assert!(query.time.0 < query.time.1);
        assert!(query.columns.doi);

        let defaults = MeasurementQuery::from_params(
            &MeasurementParams { lon0: Some(1.0), lat0: Some(2.0), ..Default::default() },
            now(),
        )
        .unwrap();
        assert_eq!(defaults.depth, (0.0, 10000.0));
        assert_eq!(defaults.time, (default_start(), now()));
    }

    #[test]
    fn test_predicates_for_box_and_cruises() {
        let mut params = box_params(120.0, 20.0, 125.0, 25.0);
        params.cruise = Some("49UP20131128, 49up20131128,33RR19971020".into());
        let query = MeasurementQuery::from_params(&params, now()).unwrap();
        let preds = query.predicates();
        assert_eq!(
            preds.where_clause(),
            " WHERE ST_Within(geom, ST_MakeEnvelope($1, $2, $3, $4, 4326)) \
             AND depth BETWEEN $5 AND $6 AND datetime BETWEEN $7 AND $8 \
             AND LOWER(expocode) IN ($9, $10)"
        );
        let params = preds.into_params();
        assert_eq!(params[8], SqlParam::Text("49up20131128".into()));
        assert_eq!(params[9], SqlParam::Text("33rr19971020".into()));
    }

    #[test]
    fn test_cruise_values_never_in_sql_text() {
        let params = MeasurementParams {
            cruise: Some("x'); DROP TABLE glodapv2_2023; --".into()),
            ..Default::default()
        };
        let query = MeasurementQuery::from_params(&params, now()).unwrap();
        let built = query.build(&BTreeSet::new());
        assert!(!built.sql.contains("DROP"));
        assert!(built.sql.ends_with("LOWER(expocode) IN ($5)"));
    }

    #[test]
    fn test_invalid_boolean_rejected() {
        let params = MeasurementParams {
            cruise: Some("a".into()),
            flag: Some("perhaps".into()),
            ..Default::default()
        };
        assert!(MeasurementQuery::from_params(&params, now()).is_err());
    }
}
