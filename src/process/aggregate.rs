use chrono::{Days, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::process::reduce::{EventCount, PerClipRecord};

/// One calendar day with a count for every known taxon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySpeciesRow {
    pub date: NaiveDate,
    pub counts: BTreeMap<String, u64>,
}

/// Date × taxon matrix, ascending by date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyCounts {
    /// Every taxon seen on any date, sorted.
    pub taxa: Vec<String>,
    pub rows: Vec<DailySpeciesRow>,
}

impl DailyCounts {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.rows.first()?.date, self.rows.last()?.date))
    }
}

/// Sum per-clip maxima across clips sharing a day and taxon.
pub fn aggregate_per_clip(clips: &[PerClipRecord]) -> DailyCounts {
    build(
        clips
            .iter()
            .map(|c| (c.event_date, c.taxon.as_str(), c.clip_taxon_nmax)),
    )
}

/// Event counts are already per day and taxon; just lay them out.
pub fn aggregate_events(counts: &[EventCount]) -> DailyCounts {
    build(
        counts
            .iter()
            .map(|c| (c.event_date, c.taxon.as_str(), c.events)),
    )
}

fn build<'a>(cells: impl Iterator<Item = (NaiveDate, &'a str, u64)>) -> DailyCounts {
    let mut matrix: BTreeMap<NaiveDate, BTreeMap<String, u64>> = BTreeMap::new();
    let mut taxa: BTreeSet<String> = BTreeSet::new();
    for (date, taxon, value) in cells {
        taxa.insert(taxon.to_string());
        let cell = matrix
            .entry(date)
            .or_default()
            .entry(taxon.to_string())
            .or_insert(0);
        *cell = cell.saturating_add(value);
    }

    let rows = matrix
        .into_iter()
        .map(|(date, mut counts)| {
            for taxon in &taxa {
                counts.entry(taxon.clone()).or_insert(0);
            }
            DailySpeciesRow { date, counts }
        })
        .collect();

    let taxa: Vec<String> = taxa.into_iter().collect();
    fill_date_gaps(DailyCounts { taxa, rows })
}

/// Insert all-zero rows for every calendar day missing between observed days.
pub fn fill_date_gaps(daily: DailyCounts) -> DailyCounts {
    let DailyCounts { taxa, mut rows } = daily;
    rows.sort_by_key(|r| r.date);

    let zero: BTreeMap<String, u64> = taxa.iter().map(|t| (t.clone(), 0)).collect();
    let mut filled: Vec<DailySpeciesRow> = Vec::with_capacity(rows.len());
    let mut inserted = 0usize;
    for row in rows {
        if let Some(prev) = filled.last().map(|r| r.date) {
            let mut day = prev.succ_opt();
            while let Some(d) = day.filter(|d| *d < row.date) {
                filled.push(DailySpeciesRow {
                    date: d,
                    counts: zero.clone(),
                });
                inserted += 1;
                day = d.checked_add_days(Days::new(1));
            }
        }
        filled.push(row);
    }
    filled.sort_by_key(|r| r.date);

    if inserted > 0 {
        debug!(inserted, "filled date gaps");
    }
    DailyCounts { taxa, rows: filled }
}
