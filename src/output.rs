//! Result materialization and encoding (JSON / CSV)

use crate::error::{GlodapError, Result};
use serde_json::{Map, Value};

/// Rows of one query in a fixed column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl QueryRows {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl OutputFormat {
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("json") => Ok(OutputFormat::Json),
            Some("csv") => Ok(OutputFormat::Csv),
            Some(other) => Err(GlodapError::Validation(format!(
                "Unsupported format '{}': use 'json' or 'csv'",
                other
            ))),
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Json => "application/json",
            OutputFormat::Csv => "text/csv",
        }
    }
}

/// An encoded response body
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub format: OutputFormat,
    pub body: Vec<u8>,
    /// Set for CSV downloads
    pub attachment: Option<String>,
}

pub fn render(rows: &QueryRows, format: OutputFormat, csv_filename: &str) -> Result<Rendered> {
    match format {
        OutputFormat::Json => Ok(Rendered {
            format,
            body: serde_json::to_vec(&rows.rows)?,
            attachment: None,
        }),
        OutputFormat::Csv => Ok(Rendered {
            format,
            body: to_csv(rows)?,
            attachment: Some(csv_filename.to_string()),
        }),
    }
}

pub fn to_csv(rows: &QueryRows) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&rows.columns)?;
    for row in &rows.rows {
        writer.write_record(rows.columns.iter().map(|col| csv_field(row.get(col))))?;
    }
    writer
        .into_inner()
        .map_err(|e| GlodapError::Io(e.into_error()))
}

fn csv_field(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
