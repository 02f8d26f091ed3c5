use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::stage::Stage;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub step: usize,
    pub total_steps: usize,
    pub step_name: &'static str,
    /// Share of steps already completed when this step starts.
    pub progress_percent: f64,
    pub elapsed_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub stage: Stage,
    pub message: String,
    pub elapsed_ms: u64,
}

/// Observer for a conversion run. Called synchronously; must not block.
pub trait ProgressSink {
    fn on_progress(&mut self, update: &ProgressUpdate);
    fn on_log(&mut self, entry: &LogEntry);
}

/// Forwards everything to `tracing`.
#[derive(Debug, Default, Clone)]
pub struct TracingSink {
    /// Label added to every event, usually the input file name.
    pub label: String,
}

impl TracingSink {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl ProgressSink for TracingSink {
    fn on_progress(&mut self, update: &ProgressUpdate) {
        info!(
            input = %self.label,
            step = update.step,
            total = update.total_steps,
            percent = update.progress_percent,
            "{}",
            update.step_name
        );
    }

    fn on_log(&mut self, entry: &LogEntry) {
        let stage = entry.stage.as_str();
        match entry.level {
            LogLevel::Debug => debug!(input = %self.label, stage, "{}", entry.message),
            LogLevel::Info => info!(input = %self.label, stage, "{}", entry.message),
            LogLevel::Warn => warn!(input = %self.label, stage, "{}", entry.message),
            LogLevel::Error => error!(input = %self.label, stage, "{}", entry.message),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_progress(&mut self, _update: &ProgressUpdate) {}
    fn on_log(&mut self, _entry: &LogEntry) {}
}

/// Keeps every callback, in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub progress: Vec<ProgressUpdate>,
    pub logs: Vec<LogEntry>,
}

impl ProgressSink for RecordingSink {
    fn on_progress(&mut self, update: &ProgressUpdate) {
        self.progress.push(update.clone());
    }

    fn on_log(&mut self, entry: &LogEntry) {
        self.logs.push(entry.clone());
    }
}
