//! Query service
//!
//! Runs one request end to end: validation, schema lookup, query
//! construction, execution and encoding.

use crate::db::{GlodapStore, SchemaCache};
use crate::error::Result;
use crate::output::{render, OutputFormat, Rendered};
use crate::query::{
    BuiltQuery, CruiseParams, CruiseQuery, MeasurementParams, MeasurementQuery, CRUISE_TABLE,
    MEASUREMENT_TABLE,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub const MEASUREMENT_CSV_FILENAME: &str = "glodapv2_2023_data.csv";
pub const CRUISE_CSV_FILENAME: &str = "cruise_metadata.csv";

pub struct GlodapService {
    store: Arc<dyn GlodapStore>,
    schema: SchemaCache,
}

impl GlodapService {
    pub fn new(store: Arc<dyn GlodapStore>) -> Self {
        let schema = SchemaCache::new(Arc::clone(&store));
        Self { store, schema }
    }

    pub fn schema_cache(&self) -> &SchemaCache {
        &self.schema
    }

    /// Build the measurement query for `params` without running it.
    pub async fn plan_measurements(&self, params: &MeasurementParams) -> Result<BuiltQuery> {
        // validation happens before any store access
        let query = MeasurementQuery::from_params(params, Utc::now())?;
        let columns = self.schema.columns(MEASUREMENT_TABLE).await?;
        Ok(query.build(&columns))
    }

    pub async fn query_measurements(&self, params: &MeasurementParams) -> Result<Rendered> {
        let format = OutputFormat::parse(params.format.as_deref())?;
        let built = self.plan_measurements(params).await?;
        self.execute(built, format, MEASUREMENT_CSV_FILENAME).await
    }

    /// Build the cruise metadata query for `params` without running it.
    pub async fn plan_cruises(&self, params: &CruiseParams) -> Result<BuiltQuery> {
        let query = CruiseQuery::from_params(params)?;
        let columns = self.schema.columns(CRUISE_TABLE).await?;
        Ok(query.build(&columns))
    }

    pub async fn query_cruises(&self, params: &CruiseParams) -> Result<Rendered> {
        let format = OutputFormat::parse(params.format.as_deref())?;
        let built = self.plan_cruises(params).await?;
        self.execute(built, format, CRUISE_CSV_FILENAME).await
    }

    async fn execute(&self, built: BuiltQuery, format: OutputFormat, filename: &str) -> Result<Rendered> {
        let started = Instant::now();
        let rows = self.store.fetch_rows(&built).await?;
        info!(
            table = %built.table,
            rows = rows.len(),
            columns = built.columns.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query served"
        );
        render(&rows, format, filename)
    }
}
