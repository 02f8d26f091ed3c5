use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use obsdaily::{
    batch,
    process::{normalize::clean_table, parse_csv},
    validate_converted_data, validate_raw_data, ConversionOptions, OutputFormat,
    ValidationResult,
};
use std::{fs, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "obsdaily")]
#[command(about = "Turn species observation logs into daily Nmax / observation summaries")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert one or more raw observation logs (paths or glob patterns)
    Convert {
        #[arg(required = true)]
        inputs: Vec<String>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Nmax)]
        format: OutputFormat,

        /// Write outputs here instead of next to each input
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Drop rows whose numeric Confidence Level is below this
        #[arg(long, env = "OBSDAILY_MIN_CONFIDENCE")]
        min_confidence: Option<i64>,

        /// Drop rows whose numeric Quality of Video is below this
        #[arg(long, env = "OBSDAILY_MIN_QUALITY")]
        min_quality: Option<i64>,

        /// Write a JSON report of metadata and validation per file
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Check a raw observation log without converting it
    Validate { input: PathBuf },
    /// Check a converted daily summary
    CheckOutput {
        input: PathBuf,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Nmax)]
        format: OutputFormat,
    },
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,obsdaily=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    let ok = match Cli::parse().command {
        Command::Convert {
            inputs,
            format,
            out_dir,
            min_confidence,
            min_quality,
            report,
        } => {
            let options = ConversionOptions {
                min_confidence,
                min_quality,
            };
            let paths = batch::expand_inputs(&inputs)?;
            info!("{} files to convert as {}", paths.len(), format);

            let mut reports = Vec::with_capacity(paths.len());
            for result in batch::convert_files(&paths, out_dir.as_deref(), format, &options) {
                reports.push(result?);
            }
            let failed = reports.iter().filter(|r| !r.is_success()).count();
            if let Some(path) = report {
                batch::write_report(&path, &reports)?;
                info!("report written to {}", path.display());
            }
            info!("{} converted, {} failed", reports.len() - failed, failed);
            failed == 0
        }
        Command::Validate { input } => {
            let text = fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let parsed = parse_csv(&text)?;
            print_validation(&validate_raw_data(&clean_table(&parsed.table)))?
        }
        Command::CheckOutput { input, format } => {
            let text = fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let parsed = parse_csv(&text)?;
            print_validation(&validate_converted_data(&parsed.table, format))?
        }
    };

    if !ok {
        warn!("finished with failures");
        std::process::exit(1);
    }
    Ok(())
}

fn print_validation(result: &ValidationResult) -> Result<bool> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(result.is_valid)
}
