use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::{Capped, ValidationResult};
use crate::process::date_parser::parse_day;
use crate::process::summary::{OutputFormat, DATE, TOTAL_OBSERVATIONS};
use crate::process::utils::parse_number;
use crate::process::RawTable;

const CUMULATIVE_PREFIX: &str = "Cumulative ";

/// Non-negative integer cell, or None.
fn count_cell(raw: &str) -> Option<u64> {
    parse_number(raw)
        .filter(|v| *v >= 0.0 && v.fract() == 0.0)
        .map(|v| v as u64)
}

/// Check structural invariants of a converted daily summary table.
#[tracing::instrument(level = "debug", skip(table, format), fields(rows = table.rows.len(), %format))]
pub fn validate_converted_data(table: &RawTable, format: OutputFormat) -> ValidationResult {
    let mut result = ValidationResult::default();

    for col in format.summary_columns() {
        if !table.has_column(col) {
            result.errors.push(format!("Missing required column: {}", col));
        }
    }
    if table.rows.is_empty() {
        result.errors.push("Output contains no rows".to_string());
    }

    // anything that is not a summary column of either format is a species column
    let summary_names: HashSet<&str> = [OutputFormat::Nmax, OutputFormat::Obvs]
        .iter()
        .flat_map(|f| f.summary_columns().iter().copied())
        .collect();
    let species: Vec<usize> = (0..table.headers.len())
        .filter(|&i| !summary_names.contains(table.headers[i].as_str()))
        .collect();
    let cumulative: Vec<usize> = (0..table.headers.len())
        .filter(|&i| table.headers[i].starts_with(CUMULATIVE_PREFIX))
        .collect();
    let date_idx = table.column_index(DATE);
    let total_idx = table.column_index(TOTAL_OBSERVATIONS);
    let unique_idx = table.column_index(format.unique_today_column());

    let mut invalid_values = Capped::new("invalid values");
    let mut invalid_dates = Capped::new("invalid dates");
    let mut decreasing = Capped::new("cumulative decreases");
    let mut total_mismatch = Capped::new("total mismatches");
    let mut unique_mismatch = Capped::new("unique-count mismatches");
    let mut duplicates = Capped::new("duplicate dates");
    let mut gaps = Capped::new("date gaps");

    let mut first_seen: HashMap<NaiveDate, usize> = HashMap::new();
    let mut previous_cumulative: Vec<Option<u64>> = vec![None; cumulative.len()];
    let mut previous_date: Option<NaiveDate> = None;
    let mut grand_total = 0u64;

    for (r, row) in table.rows.iter().enumerate() {
        let line = r + 1;
        let value = |i: usize, invalid: &mut Capped| -> u64 {
            let raw = row.get(i).map(String::as_str).unwrap_or("");
            count_cell(raw).unwrap_or_else(|| {
                invalid.push(format!(
                    "Row {}: '{}' is not a non-negative integer ('{}')",
                    line, table.headers[i], raw
                ));
                0
            })
        };

        if let Some(i) = date_idx {
            let raw = row.get(i).map(String::as_str).unwrap_or("");
            match parse_day(raw) {
                Some(date) => {
                    if let Some(first) = first_seen.get(&date) {
                        duplicates.push(format!(
                            "Duplicate date {} at rows {} and {}",
                            date, first, line
                        ));
                    } else {
                        first_seen.insert(date, line);
                    }
                    if let Some(prev) = previous_date {
                        let step = (date - prev).num_days();
                        if step > 1 {
                            gaps.push(format!(
                                "Gap of {} days between {} and {}",
                                step - 1,
                                prev,
                                date
                            ));
                        } else if step < 0 {
                            gaps.push(format!("Date {} at row {} is out of order", date, line));
                        }
                    }
                    previous_date = Some(date);
                }
                None => invalid_dates.push(format!("Row {}: invalid Date '{}'", line, raw)),
            }
        }

        let species_values: Vec<u64> = species
            .iter()
            .map(|&i| value(i, &mut invalid_values))
            .collect();
        let species_sum = species_values
            .iter()
            .try_fold(0u64, |acc, &v| acc.checked_add(v));
        let species_present = species_values.iter().filter(|&&v| v > 0).count() as u64;
        if species_sum.is_none() {
            invalid_values.push(format!("Row {}: species counts overflow when summed", line));
        }
        grand_total = grand_total.saturating_add(species_sum.unwrap_or(u64::MAX));

        if let (Some(i), Some(species_sum)) = (total_idx, species_sum) {
            let total = value(i, &mut invalid_values);
            if total != species_sum {
                total_mismatch.push(format!(
                    "Row {}: {} is {} but species columns sum to {}",
                    line, TOTAL_OBSERVATIONS, total, species_sum
                ));
            }
        }
        if let Some(i) = unique_idx {
            let unique = value(i, &mut invalid_values);
            if unique != species_present {
                unique_mismatch.push(format!(
                    "Row {}: {} is {} but {} species columns are positive",
                    line,
                    table.headers[i],
                    unique,
                    species_present
                ));
            }
        }
        for (slot, &i) in cumulative.iter().enumerate() {
            let current = value(i, &mut invalid_values);
            if let Some(prev) = previous_cumulative[slot] {
                if current < prev {
                    decreasing.push(format!(
                        "Row {}: '{}' decreased from {} to {}",
                        line, table.headers[i], prev, current
                    ));
                }
            }
            previous_cumulative[slot] = Some(current);
        }
    }

    for bucket in [
        invalid_values,
        invalid_dates,
        decreasing,
        total_mismatch,
        unique_mismatch,
        duplicates,
    ] {
        bucket.drain_into(&mut result.errors);
    }
    gaps.drain_into(&mut result.warnings);

    let span = match (first_seen.keys().min(), first_seen.keys().max()) {
        (Some(lo), Some(hi)) => (*hi - *lo).num_days() + 1,
        _ => 0,
    };
    result.metric("total_rows", table.rows.len() as f64);
    result.metric("species_columns", species.len() as f64);
    result.metric("total_observations", grand_total as f64);
    result.metric("date_span_days", span as f64);

    debug!(errors = result.errors.len(), "output validated");
    result.finish()
}
