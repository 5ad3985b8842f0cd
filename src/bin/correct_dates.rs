//! Resolve free-text cruise dates into start_date / end_date columns
//!
//! Reads the scraped cruise table as CSV, appends the leg-parallel
//! `start_date` and `end_date` lists derived from its free-text date column
//! and writes the result to stdout or `--output`.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use glodap_api::dates::{correct_dates, DateWindow};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "correct_dates")]
#[command(about = "Correct GLODAP cruise date ranges before loading")]
struct Args {
    /// Input CSV with an expocode column and a free-text dates column
    input: PathBuf,

    /// Output CSV (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Name of the free-text dates column
    #[arg(long, default_value = "dates")]
    dates_column: String,

    /// Keep only cruises whose legs all start on or after this date
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Keep only cruises whose legs all end on or before this date
    #[arg(long)]
    end: Option<NaiveDate>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let args = Args::parse();
    let window = DateWindow { start: args.start, end: args.end };

    let mut reader = csv::Reader::from_path(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let headers = reader.headers()?.clone();

    let find = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
    let Some(expocode_idx) = find("expocode") else {
        bail!("input has no expocode column");
    };
    let Some(dates_idx) = find(&args.dates_column) else {
        bail!("input has no {} column", args.dates_column);
    };

    let sink: Box<dyn Write> = match args.output {
        Some(ref path) => Box::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    };
    let mut writer = csv::Writer::from_writer(sink);

    let mut out_headers: Vec<&str> = headers.iter().collect();
    out_headers.extend(["start_date", "end_date"]);
    writer.write_record(&out_headers)?;

    let (mut total, mut kept, mut unparsed) = (0usize, 0usize, 0usize);
    for record in reader.records() {
        let record = record?;
        total += 1;
        let expocode = record.get(expocode_idx).unwrap_or_default().trim();
        let dates = correct_dates(expocode, record.get(dates_idx).unwrap_or_default());

        if !dates.is_well_formed() {
            unparsed += 1;
            warn!(expocode, raw = record.get(dates_idx).unwrap_or_default(), "no usable date range");
        }
        if !window.contains(&dates) {
            continue;
        }

        let mut row: Vec<&str> = record.iter().collect();
        row.push(&dates.start_date);
        row.push(&dates.end_date);
        writer.write_record(&row)?;
        kept += 1;
    }
    writer.flush()?;

    info!(total, kept, unparsed, "cruise dates corrected");
    Ok(())
}
