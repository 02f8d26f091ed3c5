// src/process/mod.rs
pub mod aggregate;
pub mod date_parser;
pub mod export;
pub mod filter;
pub mod normalize;
pub mod reduce;
pub mod summary;
pub mod utils;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ParseError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    /// Column names from the header line, trimmed.
    pub headers: Vec<String>,
    /// Each data line whose field count matched the header, one String per field.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }
}

/// Why a row never made it into the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    ColumnCount { expected: usize, found: usize },
    MissingTimestamp,
    MissingTaxon,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowDrop {
    /// 1-based line number in the source text (header is line 1 of the non-empty lines).
    pub line: usize,
    pub reason: DropReason,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedCsv {
    pub table: RawTable,
    pub dropped: Vec<RowDrop>,
}

/// Split one CSV line into fields.
///
/// A `"` toggles the quoted state and is never copied to the output, so a
/// doubled quote inside a quoted field simply disappears. Commas only split
/// outside quotes.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Parse CSV text into a header list and rows.
///
/// Lines are split on `\n` (a trailing `\r` is dropped) and blank lines are
/// skipped. Rows whose field count differs from the header are dropped and
/// reported, never fatal.
#[tracing::instrument(level = "debug", skip(text), fields(bytes = text.len()))]
pub fn parse_csv(text: &str) -> Result<ParsedCsv, ParseError> {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .filter(|l| !l.trim().is_empty())
        .collect();

    if lines.len() < 2 {
        return Err(ParseError::TooFewLines { found: lines.len() });
    }

    let headers: Vec<String> = split_csv_line(lines[0])
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::with_capacity(lines.len() - 1);
    let mut dropped = Vec::new();
    for (idx, line) in lines.iter().enumerate().skip(1) {
        let fields = split_csv_line(line);
        if fields.len() != headers.len() {
            dropped.push(RowDrop {
                line: idx + 1,
                reason: DropReason::ColumnCount {
                    expected: headers.len(),
                    found: fields.len(),
                },
            });
            continue;
        }
        rows.push(fields);
    }

    if !dropped.is_empty() {
        warn!(
            dropped = dropped.len(),
            "rows skipped for column-count mismatch"
        );
    }
    debug!(columns = headers.len(), rows = rows.len(), "parsed CSV");

    Ok(ParsedCsv {
        table: RawTable { headers, rows },
        dropped,
    })
}
