//! Query construction for the measurement and cruise tables
//!
//! Raw request parameters are normalized ([`filter`]), matched against the
//! live schema ([`columns`]) and turned into a parameterized statement
//! ([`predicate`]).

pub mod columns;
pub mod cruise;
pub mod filter;
pub mod measurement;
pub mod predicate;

pub use cruise::{CruiseParams, CruiseQuery};
pub use measurement::{MeasurementParams, MeasurementQuery};
pub use predicate::{BuiltQuery, SqlParam};

pub const MEASUREMENT_TABLE: &str = "glodapv2_2023";
pub const CRUISE_TABLE: &str = "cruisev2_2023";
