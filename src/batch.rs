// src/batch.rs
use anyhow::{anyhow, Context, Result};
use glob::glob;
use rayon::prelude::*;
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{error, info, instrument};

use crate::pipeline::{
    convert, ConversionMetadata, ConversionResult, ConversionValidation, TracingSink,
};
use crate::process::export::data_to_csv;
use crate::process::filter::ConversionOptions;
use crate::process::summary::OutputFormat;

/// Outcome of converting one file on disk.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub error: Option<String>,
    pub metadata: Option<ConversionMetadata>,
    pub validation: Option<ConversionValidation>,
}

impl FileReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Expand literal paths and glob patterns into a sorted, de-duplicated file list.
pub fn expand_inputs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let matches: Vec<PathBuf> = glob(pattern)
            .with_context(|| format!("Failed to read glob pattern '{}'", pattern))?
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_file())
            .collect();
        if matches.is_empty() {
            return Err(anyhow!("No input files match '{}'", pattern));
        }
        paths.extend(matches);
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}

/// `<stem>_<format>.csv`, next to the input unless `out_dir` is given.
pub fn output_path_for(input: &Path, out_dir: Option<&Path>, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "observations".to_string());
    let name = format!("{}_{}.csv", stem, format);
    match out_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

/// Read, convert and write one file. I/O failures are errors; conversion
/// failures are recorded in the report.
#[instrument(level = "info", skip(input, out_dir, options), fields(input = %input.display()))]
pub fn convert_file(
    input: &Path,
    out_dir: Option<&Path>,
    format: OutputFormat,
    options: &ConversionOptions,
) -> Result<FileReport> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let label = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut sink = TracingSink::new(label);

    match convert(&text, format, options, &mut sink) {
        ConversionResult::Success {
            data,
            metadata,
            validation,
            ..
        } => {
            let output = output_path_for(input, out_dir, format);
            if let Some(parent) = output.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating output directory {}", parent.display()))?;
            }
            fs::write(&output, data_to_csv(&data.to_table()))
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!(output = %output.display(), rows = metadata.output_rows, "wrote summary");
            Ok(FileReport {
                input: input.to_path_buf(),
                output: Some(output),
                error: None,
                metadata: Some(metadata),
                validation: Some(validation),
            })
        }
        ConversionResult::Failure { error, .. } => {
            error!("{} failed: {}", input.display(), error);
            Ok(FileReport {
                input: input.to_path_buf(),
                output: None,
                error: Some(error),
                metadata: None,
                validation: None,
            })
        }
    }
}

/// Convert every file in parallel; each run is fully independent.
pub fn convert_files(
    inputs: &[PathBuf],
    out_dir: Option<&Path>,
    format: OutputFormat,
    options: &ConversionOptions,
) -> Vec<Result<FileReport>> {
    inputs
        .par_iter()
        .map(|input| convert_file(input, out_dir, format, options))
        .collect()
}

/// Write reports as pretty JSON.
pub fn write_report(path: &Path, reports: &[FileReport]) -> Result<()> {
    let json = serde_json::to_string_pretty(reports).context("serializing report")?;
    fs::write(path, json).with_context(|| format!("Failed to write report {}", path.display()))
}
