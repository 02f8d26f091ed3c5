use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::process::aggregate::{DailyCounts, DailySpeciesRow};
use crate::process::RawTable;

pub const DATE: &str = "Date";
pub const TOTAL_OBSERVATIONS: &str = "Total Observations";
pub const CUMULATIVE_OBSERVATIONS: &str = "Cumulative Observations";
pub const ALL_UNIQUE_TODAY: &str = "All Unique Organisms Observed Today";
pub const UNIQUE_TODAY: &str = "Unique Organisms Observed Today";
pub const NEW_UNIQUE_TODAY: &str = "New Unique Organisms Today";
pub const CUMULATIVE_NEW_UNIQUE: &str = "Cumulative New Unique Organisms";
pub const CUMULATIVE_UNIQUE_SPECIES: &str = "Cumulative Unique Species";

const NMAX_COLUMNS: [&str; 7] = [
    DATE,
    TOTAL_OBSERVATIONS,
    CUMULATIVE_OBSERVATIONS,
    ALL_UNIQUE_TODAY,
    NEW_UNIQUE_TODAY,
    CUMULATIVE_NEW_UNIQUE,
    CUMULATIVE_UNIQUE_SPECIES,
];

const OBVS_COLUMNS: [&str; 5] = [
    DATE,
    TOTAL_OBSERVATIONS,
    UNIQUE_TODAY,
    NEW_UNIQUE_TODAY,
    CUMULATIVE_UNIQUE_SPECIES,
];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Per-day sum of per-clip maximum counts
    Nmax,
    /// Per-day count of observation events
    Obvs,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Nmax => "nmax",
            OutputFormat::Obvs => "obvs",
        }
    }

    /// Fixed leading columns, in output order.
    pub fn summary_columns(&self) -> &'static [&'static str] {
        match self {
            OutputFormat::Nmax => &NMAX_COLUMNS,
            OutputFormat::Obvs => &OBVS_COLUMNS,
        }
    }

    /// Name of the "distinct taxa seen today" column.
    pub fn unique_today_column(&self) -> &'static str {
        match self {
            OutputFormat::Nmax => ALL_UNIQUE_TODAY,
            OutputFormat::Obvs => UNIQUE_TODAY,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub date: NaiveDate,
    pub total_observations: u64,
    /// Nmax only.
    pub cumulative_observations: Option<u64>,
    pub unique_today: u64,
    pub new_unique_today: u64,
    /// Nmax only.
    pub cumulative_new_unique: Option<u64>,
    pub cumulative_unique_species: u64,
    pub species: BTreeMap<String, u64>,
}

impl SummaryRow {
    /// Cells in [`OutputFormat::summary_columns`] order followed by species.
    pub fn cells(&self, format: OutputFormat) -> Vec<String> {
        let mut cells = vec![
            self.date.format("%Y-%m-%d").to_string(),
            self.total_observations.to_string(),
        ];
        match format {
            OutputFormat::Nmax => {
                cells.push(self.cumulative_observations.unwrap_or(0).to_string());
                cells.push(self.unique_today.to_string());
                cells.push(self.new_unique_today.to_string());
                cells.push(self.cumulative_new_unique.unwrap_or(0).to_string());
            }
            OutputFormat::Obvs => {
                cells.push(self.unique_today.to_string());
                cells.push(self.new_unique_today.to_string());
            }
        }
        cells.push(self.cumulative_unique_species.to_string());
        cells.extend(self.species.values().map(u64::to_string));
        cells
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryTable {
    pub format: OutputFormat,
    /// Alphabetical; matches the key order of every row's `species`.
    pub taxa: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn columns(&self) -> Vec<String> {
        self.format
            .summary_columns()
            .iter()
            .map(|c| c.to_string())
            .chain(self.taxa.iter().cloned())
            .collect()
    }

    pub fn to_table(&self) -> RawTable {
        RawTable::new(
            self.columns(),
            self.rows.iter().map(|r| r.cells(self.format)).collect(),
        )
    }
}

/// State carried from one day to the next.
#[derive(Debug, Clone, Default)]
struct Carry {
    seen: BTreeSet<String>,
    cumulative_observations: u64,
    cumulative_new_unique: u64,
}

fn summarize_day(
    mut carry: Carry,
    row: &DailySpeciesRow,
    format: OutputFormat,
) -> (Carry, SummaryRow) {
    let present: Vec<&String> = row
        .counts
        .iter()
        .filter(|&(_, &v)| v > 0)
        .map(|(taxon, _)| taxon)
        .collect();
    let total_observations = row
        .counts
        .values()
        .fold(0u64, |acc, &v| acc.saturating_add(v));
    // "new" is judged against the set as it stood before today
    let fresh: Vec<&String> = present
        .iter()
        .copied()
        .filter(|t| !carry.seen.contains(*t))
        .collect();
    let new_unique_today = fresh.len() as u64;
    carry.seen.extend(fresh.into_iter().cloned());
    carry.cumulative_observations = carry
        .cumulative_observations
        .saturating_add(total_observations);
    carry.cumulative_new_unique = carry
        .cumulative_new_unique
        .saturating_add(new_unique_today);

    let nmax = format == OutputFormat::Nmax;
    let summary = SummaryRow {
        date: row.date,
        total_observations,
        cumulative_observations: nmax.then_some(carry.cumulative_observations),
        unique_today: present.len() as u64,
        new_unique_today,
        cumulative_new_unique: nmax.then_some(carry.cumulative_new_unique),
        cumulative_unique_species: carry.seen.len() as u64,
        species: row.counts.clone(),
    };
    (carry, summary)
}

/// Compute running metrics over gap-filled daily rows, oldest first.
pub fn summarize(daily: &DailyCounts, format: OutputFormat) -> SummaryTable {
    let (_, rows) = daily.rows.iter().fold(
        (Carry::default(), Vec::with_capacity(daily.rows.len())),
        |(carry, mut rows), day| {
            let (carry, summary) = summarize_day(carry, day, format);
            rows.push(summary);
            (carry, rows)
        },
    );
    SummaryTable {
        format,
        taxa: daily.taxa.clone(),
        rows,
    }
}
