use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::process::date_parser::parse_timestamp;
use crate::process::utils::{clean_str, parse_leading_int};
use crate::process::{DropReason, RawTable, RowDrop};

pub const FILE_NAME: &str = "File Name";
pub const EVENT_OBSERVATION: &str = "Event Observation";
pub const QUANTITY: &str = "Quantity (Nmax)";
pub const CONFIDENCE_LEVEL: &str = "Confidence Level";
pub const QUALITY_OF_VIDEO: &str = "Quality of Video";
pub const SCIENTIFIC_NAME: &str = "Lowest Order Scientific Name";
pub const COMMON_NAME: &str = "Common Name";

/// Timestamp columns, highest priority first.
pub const TIMESTAMP_CANDIDATES: [&str; 3] = [
    "Adjusted Date and Time",
    "Adjusted Date / Time",
    "Date/Time of Recording",
];

/// Taxon columns, highest priority first.
pub const TAXON_CANDIDATES: [&str; 2] = [SCIENTIFIC_NAME, COMMON_NAME];

/// Column indices for every role the pipeline reads, resolved once per table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRoles {
    /// Present timestamp candidates in priority order.
    pub timestamps: Vec<usize>,
    /// Present taxon candidates in priority order.
    pub taxa: Vec<usize>,
    pub file_name: Option<usize>,
    pub quantity: Option<usize>,
    pub confidence: Option<usize>,
    pub quality: Option<usize>,
}

impl ColumnRoles {
    pub fn resolve(headers: &[String]) -> Self {
        let find = |name: &str| headers.iter().position(|h| h == name);
        Self {
            timestamps: TIMESTAMP_CANDIDATES.iter().filter_map(|&c| find(c)).collect(),
            taxa: TAXON_CANDIDATES.iter().filter_map(|&c| find(c)).collect(),
            file_name: find(FILE_NAME),
            quantity: find(QUANTITY),
            confidence: find(CONFIDENCE_LEVEL),
            quality: find(QUALITY_OF_VIDEO),
        }
    }

    /// First timestamp candidate whose value parses.
    pub fn timestamp(&self, row: &[String]) -> Option<DateTime<Utc>> {
        self.timestamps
            .iter()
            .find_map(|&i| row.get(i).and_then(|v| parse_timestamp(v)))
    }

    /// First taxon candidate with a non-empty value.
    pub fn taxon(&self, row: &[String]) -> Option<String> {
        self.taxa
            .iter()
            .filter_map(|&i| row.get(i))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Integer quantity; unparseable or negative values become 0.
    pub fn quantity(&self, row: &[String]) -> u64 {
        self.quantity
            .and_then(|i| row.get(i))
            .and_then(|v| parse_leading_int(v))
            .map(|q| q.max(0) as u64)
            .unwrap_or(0)
    }

    fn cell(idx: Option<usize>, row: &[String]) -> Option<String> {
        idx.and_then(|i| row.get(i)).cloned()
    }
}

/// One observation row with its resolved timestamp, day, taxon and quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedRecord {
    /// Position in the parsed table, header counted as line 1.
    pub line: usize,
    pub file_name: String,
    pub event_timestamp: DateTime<Utc>,
    pub event_date: NaiveDate,
    pub taxon: String,
    pub quantity: u64,
    pub confidence: Option<String>,
    pub quality: Option<String>,
}

/// Per-row normalization result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Kept(NormalizedRecord),
    Dropped(RowDrop),
}

#[derive(Debug, Clone, Default)]
pub struct Normalized {
    /// Header and cells after whitespace cleaning; what input validation sees.
    pub table: RawTable,
    pub records: Vec<NormalizedRecord>,
    pub dropped: Vec<RowDrop>,
}

/// Clean every header and cell with [`clean_str`].
pub fn clean_table(raw: &RawTable) -> RawTable {
    RawTable {
        headers: raw.headers.iter().map(|h| clean_str(h)).collect(),
        rows: raw
            .rows
            .iter()
            .map(|row| row.iter().map(|v| clean_str(v)).collect())
            .collect(),
    }
}

/// Resolve one cleaned row. `line` is carried through for drop reporting.
pub fn normalize_row(roles: &ColumnRoles, row: &[String], line: usize) -> RowOutcome {
    let Some(event_timestamp) = roles.timestamp(row) else {
        return RowOutcome::Dropped(RowDrop {
            line,
            reason: DropReason::MissingTimestamp,
        });
    };
    let Some(taxon) = roles.taxon(row) else {
        return RowOutcome::Dropped(RowDrop {
            line,
            reason: DropReason::MissingTaxon,
        });
    };
    RowOutcome::Kept(NormalizedRecord {
        line,
        file_name: ColumnRoles::cell(roles.file_name, row).unwrap_or_default(),
        event_timestamp,
        event_date: event_timestamp.date_naive(),
        taxon,
        quantity: roles.quantity(row),
        confidence: ColumnRoles::cell(roles.confidence, row),
        quality: ColumnRoles::cell(roles.quality, row),
    })
}

/// Clean the table, resolve column roles, and normalize every row.
#[tracing::instrument(level = "info", skip(raw), fields(rows = raw.rows.len()))]
pub fn normalize(raw: &RawTable) -> Normalized {
    let table = clean_table(raw);
    let roles = ColumnRoles::resolve(&table.headers);
    debug!(?roles, "resolved column roles");

    let mut records = Vec::with_capacity(table.rows.len());
    let mut dropped = Vec::new();
    // data rows start on line 2, after the header
    for (idx, row) in table.rows.iter().enumerate() {
        match normalize_row(&roles, row, idx + 2) {
            RowOutcome::Kept(rec) => records.push(rec),
            RowOutcome::Dropped(drop) => dropped.push(drop),
        }
    }

    info!(
        kept = records.len(),
        dropped = dropped.len(),
        "normalized records"
    );
    Normalized {
        table,
        records,
        dropped,
    }
}
