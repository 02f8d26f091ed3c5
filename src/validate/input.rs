use once_cell::sync::Lazy;
use std::collections::HashSet;
use tracing::debug;

use super::{percent, Capped, ValidationResult};
use crate::process::normalize::{
    ColumnRoles, COMMON_NAME, CONFIDENCE_LEVEL, EVENT_OBSERVATION, FILE_NAME, QUALITY_OF_VIDEO,
    QUANTITY, SCIENTIFIC_NAME, TAXON_CANDIDATES, TIMESTAMP_CANDIDATES,
};
use crate::process::utils::parse_leading_int;
use crate::process::RawTable;

const REQUIRED_COLUMNS: [&str; 3] = [FILE_NAME, EVENT_OBSERVATION, QUANTITY];

/// Columns of a complete observation-log export.
pub const REFERENCE_SCHEMA: [&str; 18] = [
    FILE_NAME,
    EVENT_OBSERVATION,
    QUANTITY,
    "Adjusted Date and Time",
    "Adjusted Date / Time",
    "Date/Time of Recording",
    COMMON_NAME,
    SCIENTIFIC_NAME,
    CONFIDENCE_LEVEL,
    QUALITY_OF_VIDEO,
    "Kingdom",
    "Phylum",
    "Class",
    "Order",
    "Family",
    "Genus",
    "Species",
    "Notes",
];

/// Reference schema plus extra columns the annotation tool is known to emit.
static KNOWN_COLUMNS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    REFERENCE_SCHEMA
        .iter()
        .copied()
        .chain([
            "Observer",
            "Site",
            "Deployment ID",
            "Time in Video",
            "Frame",
            "Behavior",
            "Sex",
            "Life Stage",
            "Comments",
        ])
        .collect()
});

const COMPLIANCE_RECOMMENDED: f64 = 80.0;
const COMPLIANCE_POOR: f64 = 50.0;
const TIMESTAMP_RATE_RECOMMENDED: f64 = 90.0;

/// Check a raw (cleaned) observation table before conversion.
#[tracing::instrument(level = "debug", skip(table), fields(rows = table.rows.len()))]
pub fn validate_raw_data(table: &RawTable) -> ValidationResult {
    let mut result = ValidationResult::default();

    for col in REQUIRED_COLUMNS {
        if !table.has_column(col) {
            result.errors.push(format!("Missing required column: {}", col));
        }
    }
    if !TIMESTAMP_CANDIDATES.iter().any(|c| table.has_column(c)) {
        result.errors.push(format!(
            "Missing timestamp column: expected one of {}",
            TIMESTAMP_CANDIDATES.join(", ")
        ));
    }
    if !TAXON_CANDIDATES.iter().any(|c| table.has_column(c)) {
        result.errors.push(format!(
            "Missing species column: expected one of {}",
            TAXON_CANDIDATES.join(", ")
        ));
    }

    let total = table.rows.len();
    if total == 0 {
        result.errors.push("No data rows found".to_string());
    }

    let mut unknown = Capped::new("unrecognized columns");
    for header in &table.headers {
        if !KNOWN_COLUMNS.contains(header.as_str()) {
            unknown.push(format!("Unrecognized column: '{}'", header));
        }
    }
    let unknown_count = unknown.count();
    unknown.drain_into(&mut result.warnings);

    let roles = ColumnRoles::resolve(&table.headers);
    let (mut timestamps, mut taxa, mut quantities) = (0usize, 0usize, 0usize);
    for row in &table.rows {
        if roles.timestamp(row).is_some() {
            timestamps += 1;
        }
        if roles.taxon(row).is_some() {
            taxa += 1;
        }
        if roles
            .quantity
            .and_then(|i| row.get(i))
            .and_then(|v| parse_leading_int(v))
            .is_some()
        {
            quantities += 1;
        }
    }

    if total > 0 {
        for (count, what) in [
            (timestamps, "a parseable timestamp"),
            (taxa, "a species name"),
            (quantities, "a numeric quantity"),
        ] {
            if count < total {
                result
                    .warnings
                    .push(format!("{} of {} rows lack {}", total - count, total, what));
            }
        }
    }

    let matched = REFERENCE_SCHEMA
        .iter()
        .filter(|c| table.has_column(c))
        .count();
    let compliance = percent(matched, REFERENCE_SCHEMA.len());
    let timestamp_rate = percent(timestamps, total);

    result.metric("total_rows", total as f64);
    result.metric("total_columns", table.headers.len() as f64);
    result.metric("valid_timestamp_rate", timestamp_rate);
    result.metric("valid_taxon_rate", percent(taxa, total));
    result.metric("valid_quantity_rate", percent(quantities, total));
    result.metric("reference_columns_matched", matched as f64);
    result.metric("unrecognized_columns", unknown_count as f64);
    result.metric("format_compliance", compliance);

    if compliance < COMPLIANCE_RECOMMENDED {
        result.recommendations.push(format!(
            "Format compliance is {:.1}%: rename columns to the standard observation-log names where possible",
            compliance
        ));
    }
    if compliance < COMPLIANCE_POOR {
        result.recommendations.push(
            "Fewer than half of the standard columns are present: confirm this is a raw observation log export"
                .to_string(),
        );
    }
    if total > 0 && timestamp_rate < TIMESTAMP_RATE_RECOMMENDED {
        result.recommendations.push(format!(
            "Only {:.1}% of rows have a parseable timestamp: check the date/time format",
            timestamp_rate
        ));
    }

    debug!(
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        compliance,
        "input validated"
    );
    result.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    const GOOD_HEADERS: [&str; 5] = [
        "File Name",
        "Event Observation",
        "Quantity (Nmax)",
        "Adjusted Date and Time",
        "Common Name",
    ];

    #[test]
    fn complete_input_is_valid() {
        let t = table(
            &GOOD_HEADERS,
            &[&["a.mp4", "1", "2", "2024-06-01 10:00:00", "Harbor seal"]],
        );
        let r = validate_raw_data(&t);
        assert!(r.is_valid, "{:?}", r.errors);
        assert!(r.warnings.is_empty(), "{:?}", r.warnings);
        assert_eq!(r.metrics["valid_timestamp_rate"], 100.0);
        assert_eq!(r.metrics["reference_columns_matched"], 5.0);
    }

    #[test]
    fn missing_column_families_are_named() {
        let t = table(
            &["File Name", "Event Observation", "Quantity (Nmax)"],
            &[&["a.mp4", "1", "2"]],
        );
        let r = validate_raw_data(&t);
        assert!(!r.is_valid);
        assert_eq!(r.errors.len(), 2);
        assert!(r.errors[0].contains("timestamp"));
        assert!(r.errors[1].contains("species"));
    }

    #[test]
    fn required_columns_each_reported() {
        let t = table(
            &["Adjusted Date and Time", "Common Name"],
            &[&["2024-06-01", "Harbor seal"]],
        );
        let r = validate_raw_data(&t);
        assert_eq!(r.errors.len(), 3);
        assert!(r.errors.iter().any(|e| e.contains("Quantity (Nmax)")));
    }

    #[test]
    fn unknown_headers_warn_and_lower_compliance() {
        let t = table(&["Foo", "Bar", "Common Name"], &[&["1", "2", "x"]]);
        let r = validate_raw_data(&t);
        assert!(r.warnings.iter().any(|w| w == "Unrecognized column: 'Foo'"));
        assert!(r.warnings.iter().any(|w| w == "Unrecognized column: 'Bar'"));
        assert_eq!(r.metrics["unrecognized_columns"], 2.0);
        assert!(r.recommendations.len() >= 2);
    }

    #[test]
    fn rates_reflect_row_quality() {
        let t = table(
            &GOOD_HEADERS,
            &[
                &["a.mp4", "1", "2", "2024-06-01 10:00:00", "Harbor seal"],
                &["a.mp4", "2", "x", "bad", ""],
            ],
        );
        let r = validate_raw_data(&t);
        assert!(r.is_valid);
        assert_eq!(r.metrics["valid_timestamp_rate"], 50.0);
        assert_eq!(r.metrics["valid_taxon_rate"], 50.0);
        assert_eq!(r.metrics["valid_quantity_rate"], 50.0);
        assert_eq!(r.warnings.len(), 3);
    }

    #[test]
    fn header_only_table_is_invalid() {
        let r = validate_raw_data(&table(&GOOD_HEADERS, &[]));
        assert!(!r.is_valid);
        assert!(r.errors.iter().any(|e| e == "No data rows found"));
    }

    #[test]
    fn partial_compliance_gets_a_single_recommendation() {
        let headers = [
            "File Name",
            "Event Observation",
            "Quantity (Nmax)",
            "Adjusted Date and Time",
            "Common Name",
            "Lowest Order Scientific Name",
            "Confidence Level",
            "Quality of Video",
            "Kingdom",
            "Family",
        ];
        let row = [
            "a.mp4",
            "1",
            "2",
            "2024-06-01 10:00:00",
            "Harbor seal",
            "Phoca vitulina",
            "4",
            "3",
            "Animalia",
            "Phocidae",
        ];
        let r = validate_raw_data(&table(&headers, &[&row]));
        assert!(r.is_valid, "{:?}", r.errors);
        assert_eq!(r.metrics["reference_columns_matched"], 10.0);
        assert_eq!(r.metrics["format_compliance"], 55.56);
        assert_eq!(r.recommendations.len(), 1, "{:?}", r.recommendations);
        assert!(r.recommendations[0].starts_with("Format compliance is 55.6%"));
    }
}
