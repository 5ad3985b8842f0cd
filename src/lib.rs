//! Read-only HTTP query API over the GLODAP v2.2023 bottle data and cruise
//! metadata tables.

pub mod config;
pub mod dates;
pub mod db;
pub mod error;
pub mod http;
pub mod output;
pub mod query;
pub mod service;

pub use error::{GlodapError, Result};
pub use service::GlodapService;
