use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::process::normalize::NormalizedRecord;

/// Most individuals of one taxon seen at once in one clip on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerClipRecord {
    pub event_date: NaiveDate,
    pub file_name: String,
    pub taxon: String,
    pub clip_taxon_nmax: u64,
}

/// Number of observation events for one taxon on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventCount {
    pub event_date: NaiveDate,
    pub taxon: String,
    pub events: u64,
}

/// Group by `(date, clip, taxon)` and keep the maximum quantity.
pub fn reduce_per_clip(records: &[NormalizedRecord]) -> Vec<PerClipRecord> {
    let mut groups: BTreeMap<(NaiveDate, &str, &str), u64> = BTreeMap::new();
    for rec in records {
        let slot = groups
            .entry((rec.event_date, rec.file_name.as_str(), rec.taxon.as_str()))
            .or_insert(0);
        *slot = (*slot).max(rec.quantity);
    }
    debug!(clips = groups.len(), "reduced to per-clip maxima");
    groups
        .into_iter()
        .map(|((event_date, file_name, taxon), clip_taxon_nmax)| PerClipRecord {
            event_date,
            file_name: file_name.to_string(),
            taxon: taxon.to_string(),
            clip_taxon_nmax,
        })
        .collect()
}

/// Group by `(date, taxon)` and count records, one event each.
pub fn count_events(records: &[NormalizedRecord]) -> Vec<EventCount> {
    let mut groups: BTreeMap<(NaiveDate, &str), u64> = BTreeMap::new();
    for rec in records {
        *groups
            .entry((rec.event_date, rec.taxon.as_str()))
            .or_insert(0) += 1;
    }
    debug!(groups = groups.len(), "counted observation events");
    groups
        .into_iter()
        .map(|((event_date, taxon), events)| EventCount {
            event_date,
            taxon: taxon.to_string(),
            events,
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::process::date_parser::parse_timestamp;

    pub(crate) fn obs(ts: &str, file: &str, taxon: &str, quantity: u64) -> NormalizedRecord {
        let event_timestamp = parse_timestamp(ts).unwrap();
        NormalizedRecord {
            line: 0,
            file_name: file.into(),
            event_timestamp,
            event_date: event_timestamp.date_naive(),
            taxon: taxon.into(),
            quantity,
            confidence: None,
            quality: None,
        }
    }

    #[test]
    fn per_clip_keeps_the_maximum() {
        let recs = vec![
            obs("2024-06-01 10:00:00", "clip1.mp4", "Tursiops truncatus", 3),
            obs("2024-06-01 10:00:05", "clip1.mp4", "Tursiops truncatus", 5),
            obs("2024-06-01 10:00:09", "clip1.mp4", "Tursiops truncatus", 2),
        ];
        let clips = reduce_per_clip(&recs);
        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].clip_taxon_nmax, 5);
    }

    #[test]
    fn per_clip_separates_clips_taxa_and_days() {
        let recs = vec![
            obs("2024-06-01 10:00:00", "clip1.mp4", "A", 1),
            obs("2024-06-01 10:00:00", "clip2.mp4", "A", 2),
            obs("2024-06-01 10:00:00", "clip1.mp4", "B", 3),
            obs("2024-06-02 10:00:00", "clip1.mp4", "A", 4),
        ];
        assert_eq!(reduce_per_clip(&recs).len(), 4);
    }

    #[test]
    fn events_count_rows_not_individuals() {
        let recs = vec![
            obs("2024-06-01 10:00:00", "clip1.mp4", "A", 7),
            obs("2024-06-01 11:00:00", "clip2.mp4", "A", 0),
            obs("2024-06-01 12:00:00", "clip2.mp4", "B", 2),
        ];
        let counts = count_events(&recs);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].taxon, "A");
        assert_eq!(counts[0].events, 2);
        assert_eq!(counts[1].events, 1);
    }
}
