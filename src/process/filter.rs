use serde::{Deserialize, Serialize};
use tracing::info;

use crate::process::normalize::NormalizedRecord;
use crate::process::utils::parse_number;

/// Optional quality thresholds for a conversion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    pub min_confidence: Option<i64>,
    pub min_quality: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub below_confidence: usize,
    pub below_quality: usize,
}

impl FilterStats {
    pub fn total(&self) -> usize {
        self.below_confidence + self.below_quality
    }
}

/// True only when the value is numeric and strictly below the threshold.
/// Missing or non-numeric values always pass.
fn below(value: Option<&str>, threshold: Option<i64>) -> bool {
    match (threshold, value.and_then(parse_number)) {
        (Some(min), Some(v)) => v < min as f64,
        _ => false,
    }
}

/// Drop records under the confidence or video-quality thresholds.
pub fn apply_quality_filter(
    records: Vec<NormalizedRecord>,
    options: &ConversionOptions,
) -> (Vec<NormalizedRecord>, FilterStats) {
    let mut stats = FilterStats::default();
    if options.min_confidence.is_none() && options.min_quality.is_none() {
        return (records, stats);
    }

    let kept: Vec<NormalizedRecord> = records
        .into_iter()
        .filter(|rec| {
            if below(rec.confidence.as_deref(), options.min_confidence) {
                stats.below_confidence += 1;
                false
            } else if below(rec.quality.as_deref(), options.min_quality) {
                stats.below_quality += 1;
                false
            } else {
                true
            }
        })
        .collect();

    info!(
        kept = kept.len(),
        below_confidence = stats.below_confidence,
        below_quality = stats.below_quality,
        "quality filter applied"
    );
    (kept, stats)
}
