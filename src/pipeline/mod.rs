// src/pipeline/mod.rs
pub mod progress;
pub mod stage;

pub use progress::{
    LogEntry, LogLevel, NullSink, ProgressSink, ProgressUpdate, RecordingSink, TracingSink,
};
pub use stage::Stage;

use chrono::NaiveDate;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{info, warn};

use crate::error::{ConversionError, Result};
use crate::process::aggregate::{aggregate_events, aggregate_per_clip};
use crate::process::filter::{apply_quality_filter, ConversionOptions};
use crate::process::normalize::normalize;
use crate::process::parse_csv;
use crate::process::reduce::{count_events, reduce_per_clip};
use crate::process::summary::{summarize, OutputFormat, SummaryTable};
use crate::validate::{validate_converted_data, validate_raw_data, ValidationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionMetadata {
    pub format: OutputFormat,
    /// Data lines in the source text, including ones later dropped.
    pub input_rows: usize,
    pub output_rows: usize,
    pub date_range: Option<DateRange>,
    pub species_count: usize,
    pub processing_time_ms: u64,
    /// Column-count mismatches at parse time.
    pub dropped_malformed: usize,
    /// Rows with no usable timestamp or taxon.
    pub dropped_unresolved: usize,
    /// Rows under a confidence or quality threshold.
    pub filtered_out: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionValidation {
    pub input: ValidationResult,
    pub output: ValidationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ConversionResult {
    Success {
        data: SummaryTable,
        metadata: ConversionMetadata,
        logs: Vec<LogEntry>,
        validation: ConversionValidation,
    },
    Failure {
        error: String,
        logs: Vec<LogEntry>,
    },
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionResult::Success { .. })
    }

    pub fn logs(&self) -> &[LogEntry] {
        match self {
            ConversionResult::Success { logs, .. } | ConversionResult::Failure { logs, .. } => logs,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ConversionResult::Failure { error, .. } => Some(error),
            ConversionResult::Success { .. } => None,
        }
    }

    pub fn data(&self) -> Option<&SummaryTable> {
        match self {
            ConversionResult::Success { data, .. } => Some(data),
            ConversionResult::Failure { .. } => None,
        }
    }
}

struct Converted {
    data: SummaryTable,
    metadata: ConversionMetadata,
    validation: ConversionValidation,
}

/// One conversion invocation: current stage, collected logs, and the observer.
struct Run<'a> {
    format: OutputFormat,
    started: Instant,
    stage: Stage,
    logs: Vec<LogEntry>,
    sink: &'a mut dyn ProgressSink,
}

impl<'a> Run<'a> {
    fn new(format: OutputFormat, sink: &'a mut dyn ProgressSink) -> Self {
        Self {
            format,
            started: Instant::now(),
            stage: Stage::Idle,
            logs: Vec::new(),
            sink,
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn enter(&mut self, next: Stage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal transition {:?} -> {:?}",
            self.stage,
            next
        );
        self.stage = next;
        if let Some(step) = next.step() {
            let total_steps = stage::WORKING_STAGES.len();
            let update = ProgressUpdate {
                step,
                total_steps,
                step_name: next.as_str(),
                progress_percent: ((step - 1) as f64 / total_steps as f64 * 100.0).round(),
                elapsed_ms: self.elapsed_ms(),
            };
            self.sink.on_progress(&update);
        }
    }

    fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry {
            level,
            stage: self.stage,
            message: message.into(),
            elapsed_ms: self.elapsed_ms(),
        };
        self.logs.push(entry);
        if let Some(entry) = self.logs.last() {
            self.sink.on_log(entry);
        }
    }

    /// Terminal bookkeeping runs after the stage guard; a sink panic here is
    /// logged and dropped.
    fn settle(&mut self, f: impl FnOnce(&mut Self)) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| f(self))) {
            warn!(
                stage = self.stage.as_str(),
                "progress sink panicked: {}",
                panic_message(payload.as_ref())
            );
        }
    }

    fn execute(&mut self, text: &str, options: &ConversionOptions) -> Result<Converted> {
        self.enter(Stage::Parsing);
        let parsed = parse_csv(text)?;
        let input_rows = parsed.table.rows.len() + parsed.dropped.len();
        self.log(
            LogLevel::Info,
            format!(
                "parsed {} columns and {} data rows",
                parsed.table.headers.len(),
                parsed.table.rows.len()
            ),
        );
        if !parsed.dropped.is_empty() {
            self.log(
                LogLevel::Warn,
                format!(
                    "skipped {} rows whose field count did not match the header",
                    parsed.dropped.len()
                ),
            );
        }

        self.enter(Stage::Normalizing);
        let normalized = normalize(&parsed.table);
        if !normalized.dropped.is_empty() {
            self.log(
                LogLevel::Warn,
                format!(
                    "skipped {} rows without a parseable timestamp or species name",
                    normalized.dropped.len()
                ),
            );
        }
        if normalized.records.is_empty() {
            return Err(ConversionError::Empty {
                stage: "normalization",
                detail: "no row has both a parseable timestamp and a species name".into(),
            });
        }
        self.log(
            LogLevel::Info,
            format!("normalized {} records", normalized.records.len()),
        );

        self.enter(Stage::Filtering);
        let (records, filter_stats) = apply_quality_filter(normalized.records, options);
        if filter_stats.total() > 0 {
            self.log(
                LogLevel::Info,
                format!(
                    "quality filter removed {} rows ({} below confidence, {} below video quality)",
                    filter_stats.total(),
                    filter_stats.below_confidence,
                    filter_stats.below_quality
                ),
            );
        }
        if records.is_empty() {
            return Err(ConversionError::Empty {
                stage: "filtering",
                detail: "every record was below the confidence or quality threshold".into(),
            });
        }

        self.enter(Stage::Aggregating);
        let daily = match self.format {
            OutputFormat::Nmax => {
                let clips = reduce_per_clip(&records);
                self.log(
                    LogLevel::Debug,
                    format!("reduced to {} clip/species maxima", clips.len()),
                );
                aggregate_per_clip(&clips)
            }
            OutputFormat::Obvs => aggregate_events(&count_events(&records)),
        };
        let Some((start, end)) = daily.date_range() else {
            return Err(ConversionError::Empty {
                stage: "aggregation",
                detail: "no daily rows were produced".into(),
            });
        };
        self.log(
            LogLevel::Info,
            format!(
                "aggregated {} days ({} to {}) across {} taxa",
                daily.rows.len(),
                start,
                end,
                daily.taxa.len()
            ),
        );

        self.enter(Stage::Summarizing);
        let data = summarize(&daily, self.format);

        self.enter(Stage::Validating);
        let validation = ConversionValidation {
            input: validate_raw_data(&normalized.table),
            output: validate_converted_data(&data.to_table(), self.format),
        };
        for (which, result) in [("input", &validation.input), ("output", &validation.output)] {
            if result.is_valid {
                self.log(LogLevel::Info, format!("{} validation passed", which));
            } else {
                self.log(
                    LogLevel::Warn,
                    format!(
                        "{} validation found {} errors: {}",
                        which,
                        result.errors.len(),
                        result.errors.join("; ")
                    ),
                );
            }
        }

        let metadata = ConversionMetadata {
            format: self.format,
            input_rows,
            output_rows: data.rows.len(),
            date_range: Some(DateRange { start, end }),
            species_count: data.taxa.len(),
            processing_time_ms: self.elapsed_ms(),
            dropped_malformed: parsed.dropped.len(),
            dropped_unresolved: normalized.dropped.len(),
            filtered_out: filter_stats.total(),
        };
        Ok(Converted {
            data,
            metadata,
            validation,
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Run the whole pipeline for one CSV text. Never panics or returns an error
/// directly; failures come back as [`ConversionResult::Failure`].
#[tracing::instrument(level = "info", skip(text, format, options, sink), fields(%format, bytes = text.len()))]
pub fn convert(
    text: &str,
    format: OutputFormat,
    options: &ConversionOptions,
    sink: &mut dyn ProgressSink,
) -> ConversionResult {
    let mut run = Run::new(format, sink);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| run.execute(text, options)));

    let error = match outcome {
        Ok(Ok(converted)) => {
            let finished = format!(
                "conversion finished: {} rows, {} species",
                converted.metadata.output_rows, converted.metadata.species_count
            );
            run.settle(|run| {
                run.enter(Stage::Done);
                run.log(LogLevel::Info, finished);
            });
            info!(
                rows = converted.metadata.output_rows,
                species = converted.metadata.species_count,
                "conversion done"
            );
            return ConversionResult::Success {
                data: converted.data,
                metadata: converted.metadata,
                logs: run.logs,
                validation: converted.validation,
            };
        }
        Ok(Err(err)) => err,
        Err(payload) => ConversionError::Panicked {
            stage: run.stage.as_str(),
            message: panic_message(payload.as_ref()),
        },
    };

    let message = error.to_string();
    run.settle(|run| {
        run.log(LogLevel::Error, message.clone());
        run.enter(Stage::Failed);
    });
    ConversionResult::Failure {
        error: message,
        logs: run.logs,
    }
}

/// Daily Nmax summary: per-clip maxima summed per day.
pub fn convert_raw_to_nmax(
    text: &str,
    options: &ConversionOptions,
    sink: &mut dyn ProgressSink,
) -> ConversionResult {
    convert(text, OutputFormat::Nmax, options, sink)
}

/// Daily observation-event summary.
pub fn convert_raw_to_obvs(
    text: &str,
    options: &ConversionOptions,
    sink: &mut dyn ProgressSink,
) -> ConversionResult {
    convert(text, OutputFormat::Obvs, options, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,obsdaily=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    const SAMPLE: &str = "File Name,Event Observation,Quantity (Nmax),Adjusted Date and Time,Common Name,Lowest Order Scientific Name,Confidence Level
clip1.mp4,1,3,2024-06-01 10:00:00,Bottlenose dolphin,Tursiops truncatus,4
clip1.mp4,2,5,2024-06-01 10:00:30,Bottlenose dolphin,Tursiops truncatus,4
clip2.mp4,1,1,2024-06-01 14:00:00,Harbor seal,,2
clip3.mp4,1,2,2024-06-03 09:00:00,Bottlenose dolphin,Tursiops truncatus,
";

    #[test]
    fn nmax_run_reports_every_step_in_order() {
        init_test_logging();
        let mut sink = RecordingSink::default();
        let result = convert_raw_to_nmax(SAMPLE, &ConversionOptions::default(), &mut sink);
        assert!(result.is_success(), "{:?}", result.error());

        let steps: Vec<(usize, &str)> = sink.progress.iter().map(|p| (p.step, p.step_name)).collect();
        assert_eq!(
            steps,
            vec![
                (1, "Parsing"),
                (2, "Normalizing"),
                (3, "Filtering"),
                (4, "Aggregating"),
                (5, "Summarizing"),
                (6, "Validating"),
            ]
        );
        assert!(sink.progress.iter().all(|p| p.total_steps == 6));
        assert_eq!(sink.logs.len(), result.logs().len());
    }

    #[test]
    fn nmax_metadata_and_rows() {
        let result = convert_raw_to_nmax(SAMPLE, &ConversionOptions::default(), &mut NullSink);
        let ConversionResult::Success {
            data,
            metadata,
            validation,
            ..
        } = result
        else {
            panic!("conversion failed");
        };
        assert_eq!(metadata.input_rows, 4);
        assert_eq!(metadata.output_rows, 3);
        assert_eq!(metadata.species_count, 2);
        assert_eq!(
            metadata.date_range.map(|r| (r.start.to_string(), r.end.to_string())),
            Some(("2024-06-01".into(), "2024-06-03".into()))
        );
        assert!(validation.output.is_valid, "{:?}", validation.output.errors);
        assert!(validation.input.is_valid, "{:?}", validation.input.errors);

        assert_eq!(data.taxa, vec!["Harbor seal", "Tursiops truncatus"]);
        let day1 = &data.rows[0];
        assert_eq!(day1.species["Tursiops truncatus"], 5);
        assert_eq!(day1.species["Harbor seal"], 1);
        assert_eq!(day1.total_observations, 6);
        assert_eq!(data.rows[1].total_observations, 0);
        assert_eq!(data.rows[2].cumulative_observations, Some(8));
    }

    #[test]
    fn confidence_filter_applies_in_pipeline() {
        let options = ConversionOptions {
            min_confidence: Some(3),
            min_quality: None,
        };
        let result = convert_raw_to_obvs(SAMPLE, &options, &mut NullSink);
        let ConversionResult::Success { data, metadata, .. } = result else {
            panic!("conversion failed");
        };
        assert_eq!(metadata.filtered_out, 1);
        assert_eq!(data.taxa, vec!["Tursiops truncatus"]);
        assert_eq!(data.rows[0].total_observations, 2);
    }

    #[test]
    fn parse_failure_is_captured() {
        let mut sink = RecordingSink::default();
        let result = convert_raw_to_nmax("only a header\n", &ConversionOptions::default(), &mut sink);
        assert!(!result.is_success());
        assert!(result.error().unwrap().contains("at least one data row"));
        assert_eq!(sink.progress.len(), 1);
        assert_eq!(result.logs().last().map(|l| l.level), Some(LogLevel::Error));
    }

    #[test]
    fn everything_dropped_is_a_failure() {
        let text = "File Name,Quantity (Nmax)\na.mp4,1\n";
        let result = convert_raw_to_obvs(text, &ConversionOptions::default(), &mut NullSink);
        assert!(result
            .error()
            .unwrap()
            .starts_with("no records left after normalization"));
    }

    #[test]
    fn everything_filtered_is_a_failure() {
        let options = ConversionOptions {
            min_confidence: Some(10),
            min_quality: None,
        };
        let text = "File Name,Adjusted Date and Time,Common Name,Confidence Level\na.mp4,2024-06-01,Seal,1\n";
        let result = convert_raw_to_nmax(text, &options, &mut NullSink);
        assert!(result.error().unwrap().contains("filtering"));
    }

    #[test]
    fn huge_quantities_saturate_instead_of_panicking() {
        let text = "File Name,Quantity (Nmax),Adjusted Date and Time,Common Name
a.mp4,9223372036854775807,2024-06-01 10:00:00,Harbor seal
b.mp4,9223372036854775807,2024-06-01 11:00:00,Harbor seal
c.mp4,9223372036854775807,2024-06-01 12:00:00,Harbor seal
";
        let result = convert_raw_to_nmax(text, &ConversionOptions::default(), &mut NullSink);
        let data = result.data().expect("conversion should succeed");
        assert_eq!(data.rows[0].total_observations, u64::MAX);
        assert_eq!(data.rows[0].cumulative_observations, Some(u64::MAX));
    }

    #[test]
    fn panicking_sink_becomes_a_failure() {
        struct Exploding;
        impl ProgressSink for Exploding {
            fn on_progress(&mut self, update: &ProgressUpdate) {
                if update.step == 4 {
                    panic!("display went away");
                }
            }
            fn on_log(&mut self, _entry: &LogEntry) {}
        }
        let result = convert_raw_to_nmax(SAMPLE, &ConversionOptions::default(), &mut Exploding);
        assert_eq!(
            result.error(),
            Some("Aggregating stage panicked: display went away")
        );
    }

    #[test]
    fn sink_panics_after_the_last_stage_stay_inside() {
        struct LoudOnFinish;
        impl ProgressSink for LoudOnFinish {
            fn on_progress(&mut self, _update: &ProgressUpdate) {}
            fn on_log(&mut self, entry: &LogEntry) {
                if entry.message.starts_with("conversion finished") {
                    panic!("log pipe closed");
                }
            }
        }
        let result = convert_raw_to_nmax(SAMPLE, &ConversionOptions::default(), &mut LoudOnFinish);
        assert!(result.is_success());
        let last = result.logs().last().unwrap();
        assert_eq!(last.stage, Stage::Done);
        assert!(last.message.starts_with("conversion finished"));

        struct LoudOnError;
        impl ProgressSink for LoudOnError {
            fn on_progress(&mut self, _update: &ProgressUpdate) {}
            fn on_log(&mut self, entry: &LogEntry) {
                if entry.level == LogLevel::Error {
                    panic!("log pipe closed");
                }
            }
        }
        let result = convert_raw_to_nmax(
            "only a header\n",
            &ConversionOptions::default(),
            &mut LoudOnError,
        );
        assert!(result.error().unwrap().contains("at least one data row"));
        assert_eq!(result.logs().last().map(|l| l.level), Some(LogLevel::Error));
    }
}
