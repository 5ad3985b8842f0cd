//! Column selection
//!
//! Output column lists are built tier by tier from fixed rule tables and the
//! live schema. The resulting order is part of the API contract.

use crate::query::filter::{Flag, Glob};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Ordered column list without duplicates
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ColumnList {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl ColumnList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column unless it is already present. Returns whether it was added.
    pub fn push(&mut self, column: &str) -> bool {
        if self.seen.insert(column.to_string()) {
            self.order.push(column.to_string());
            true
        } else {
            false
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.seen.contains(column)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.order
    }

    pub fn into_vec(self) -> Vec<String> {
        self.order
    }
}

// ---------------------------------------------------------------------------
// Cruise metadata table
// ---------------------------------------------------------------------------

pub const CRUISE_BASE_COLUMNS: [&str; 6] =
    ["expocode", "start_date", "end_date", "region", "alias", "ship"];

/// Columns that exist in the table but are never returned
pub const CRUISE_INTERNAL_COLUMNS: [&str; 3] = ["legs", "geom", "cruise_id"];

pub const MEASUREMENTS_COLUMN: &str = "measurements";

/// Principal-investigator categories, in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PiCategory {
    Chief,
    Carbon,
    Hydrography,
    Oxygen,
    Nutrients,
    Cfc,
    Organics,
    Isotopes,
    Other,
}

impl PiCategory {
    pub const ALL: [PiCategory; 9] = [
        PiCategory::Chief,
        PiCategory::Carbon,
        PiCategory::Hydrography,
        PiCategory::Oxygen,
        PiCategory::Nutrients,
        PiCategory::Cfc,
        PiCategory::Organics,
        PiCategory::Isotopes,
        PiCategory::Other,
    ];

    pub fn token(self) -> &'static str {
        match self {
            PiCategory::Chief => "chief",
            PiCategory::Carbon => "carbon",
            PiCategory::Hydrography => "hydrography",
            PiCategory::Oxygen => "oxygen",
            PiCategory::Nutrients => "nutrients",
            PiCategory::Cfc => "cfc",
            PiCategory::Organics => "organics",
            PiCategory::Isotopes => "isotopes",
            PiCategory::Other => "other",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            PiCategory::Chief => "chief_scientist",
            PiCategory::Carbon => "carbon_pi",
            PiCategory::Hydrography => "hydrography_pi",
            PiCategory::Oxygen => "oxygen_pi",
            PiCategory::Nutrients => "nutrients_pi",
            PiCategory::Cfc => "cfc_pi",
            PiCategory::Organics => "organics_pi",
            PiCategory::Isotopes => "isotopes_pi",
            PiCategory::Other => "other_pi",
        }
    }
}

/// External-resource link columns, keyed by their `append` abbreviation
pub const LINK_COLUMNS: [(&str, &str); 5] = [
    ("file", "data_files"),
    ("qc", "qc_details"),
    ("map", "map"),
    ("metadata", "metadata_report"),
    ("ref", "cruise_references"),
];

/// Normalized flags that drive cruise column selection
#[derive(Debug, Clone)]
pub struct CruiseColumnFlags {
    pub field: Flag,
    pub append: Flag,
    pub measurement: Flag,
    /// Set when `pi=false`
    pub pi_disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CruiseColumns {
    pub columns: ColumnList,
    /// PI columns selected for output (and for PI name matching)
    pub pi_columns: Vec<String>,
    pub excluded: BTreeSet<String>,
}

pub fn select_cruise_columns(flags: &CruiseColumnFlags, schema: &BTreeSet<String>) -> CruiseColumns {
    let mut columns = ColumnList::new();
    let mut excluded: BTreeSet<String> =
        CRUISE_INTERNAL_COLUMNS.iter().map(|c| c.to_string()).collect();

    for col in CRUISE_BASE_COLUMNS {
        columns.push(col);
    }

    // PI tier
    let field = flags.field.clone().or(Flag::All);
    let categories: Vec<PiCategory> = match &field {
        Flag::All | Flag::Default => PiCategory::ALL.to_vec(),
        Flag::Disabled => Vec::new(),
        Flag::Terms(_) => PiCategory::ALL
            .into_iter()
            .filter(|c| field.includes(c.token()))
            .collect(),
    };
    let mut pi_columns = Vec::new();
    for category in categories {
        let col = category.column();
        if schema.contains(col) && columns.push(col) {
            pi_columns.push(col.to_string());
        }
    }
    if field.is_disabled() || flags.pi_disabled {
        for category in PiCategory::ALL {
            if !columns.contains(category.column()) {
                excluded.insert(category.column().to_string());
            }
        }
    }

    // Link tier
    let append = flags.append.clone().or(Flag::All);
    for (abbrev, col) in LINK_COLUMNS {
        if append.includes(abbrev) && schema.contains(col) {
            columns.push(col);
        } else {
            excluded.insert(col.to_string());
        }
    }

    // Measurement tier
    if !flags.measurement.is_disabled() && schema.contains(MEASUREMENTS_COLUMN) {
        columns.push(MEASUREMENTS_COLUMN);
    } else {
        excluded.insert(MEASUREMENTS_COLUMN.to_string());
    }

    // Catch-all: BTreeSet iteration is already lexicographic
    for col in schema {
        if !columns.contains(col) && !excluded.contains(col) {
            columns.push(col);
        }
    }

    debug!(columns = ?columns.as_slice(), excluded = ?excluded, "cruise columns selected");

    CruiseColumns {
        columns,
        pi_columns,
        excluded,
    }
}

// ---------------------------------------------------------------------------
// Measurement table
// ---------------------------------------------------------------------------

pub const MEASUREMENT_BASE_COLUMNS: [&str; 14] = [
    "expocode",
    "station",
    "region",
    "cast_number",
    "year",
    "month",
    "latitude",
    "longitude",
    "bottomdepth",
    "maxsampdepth",
    "bottle",
    "pressure",
    "depth",
    "datetime",
];

pub const DOI_COLUMN: &str = "doi";

const COMPANION_PREFIXES: [&str; 3] = ["flag_", "qc_", "err_"];
const NON_VARIABLE_COLUMNS: [&str; 2] = ["geom", "doi"];

pub fn flag_column(var: &str) -> String {
    format!("flag_{}", var)
}

pub fn qc_column(var: &str) -> String {
    format!("qc_{}", var)
}

/// Measured-variable columns: schema minus base, companion and internal columns.
pub fn known_variables(schema: &BTreeSet<String>) -> BTreeSet<String> {
    schema
        .iter()
        .filter(|c| !MEASUREMENT_BASE_COLUMNS.contains(&c.as_str()))
        .filter(|c| !NON_VARIABLE_COLUMNS.contains(&c.as_str()))
        .filter(|c| !COMPANION_PREFIXES.iter().any(|p| c.starts_with(p)))
        .cloned()
        .collect()
}

/// Resolve `append` tokens (names or globs) against the known variables.
/// Tokens that match nothing are dropped.
pub fn resolve_variables(append: &Flag, known: &BTreeSet<String>) -> BTreeSet<String> {
    match append {
        Flag::All => known.clone(),
        Flag::Terms(terms) => {
            let mut resolved = BTreeSet::new();
            for term in terms {
                let glob = Glob::new(term);
                let matches: Vec<&String> = known.iter().filter(|v| glob.matches(v)).collect();
                if matches.is_empty() {
                    debug!(token = %term, "append token matched no variable");
                }
                resolved.extend(matches.into_iter().cloned());
            }
            resolved
        }
        Flag::Default | Flag::Disabled => BTreeSet::new(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeasurementColumnFlags {
    pub flag: bool,
    pub qc: bool,
    pub doi: bool,
}

pub fn select_measurement_columns(
    append: &Flag,
    flags: MeasurementColumnFlags,
    schema: &BTreeSet<String>,
) -> ColumnList {
    let mut columns = ColumnList::new();
    for col in MEASUREMENT_BASE_COLUMNS {
        columns.push(col);
    }
    if flags.doi {
        columns.push(DOI_COLUMN);
    }

    let mut extra = BTreeSet::new();
    for var in resolve_variables(append, &known_variables(schema)) {
        if flags.flag && schema.contains(&flag_column(&var)) {
            extra.insert(flag_column(&var));
        }
        if flags.qc && schema.contains(&qc_column(&var)) {
            extra.insert(qc_column(&var));
        }
        extra.insert(var);
    }
    for col in &extra {
        columns.push(col);
    }
    columns
}
