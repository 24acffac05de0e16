//! Command-line interface.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use crate::config::PrepareConfig;
use crate::data::loader::load_file;
use crate::data::writer::{format_table, write_summaries};
use crate::prepare::{prepare_table, PrepareWarning};

#[derive(Parser)]
#[command(name = "corrdiff-prep")]
#[command(about = "Summarise per-subject correlation differences for plotting", version)]
pub struct Cli {
    /// Path to JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (RUST_LOG overrides)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter, summarise and persist one region/parameter slice
    Prepare {
        /// Observation table (.csv, .json, .parquet)
        input: PathBuf,
        /// Summary artifact to write (.csv, .json, .parquet)
        output: PathBuf,
        /// Region to keep (overrides config)
        #[arg(long)]
        region: Option<String>,
        /// Parameter to keep (overrides config)
        #[arg(long)]
        parameter: Option<String>,
        /// Stimulus type forming the target condition (overrides config)
        #[arg(long)]
        target: Option<String>,
        /// Also print the summary records as a table
        #[arg(long)]
        print: bool,
    },

    /// Show the columns and category labels of an observation table
    Inspect {
        /// Observation table (.csv, .json, .parquet)
        input: PathBuf,
    },
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("{title}");
    println!("{}", "─".repeat(title.chars().count().max(40)));
    for (key, value) in items {
        println!("  {key:<16}: {value}");
    }
    println!();
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    let config = PrepareConfig::load_or_default(cli.config.as_deref())?;
    if let Some(path) = &cli.config {
        info!("Loaded config from: {}", path.display());
    }

    match cli.command {
        Commands::Prepare {
            input,
            output,
            region,
            parameter,
            target,
            print,
        } => {
            let config = PrepareConfig {
                region: region.unwrap_or(config.region),
                parameter: parameter.unwrap_or(config.parameter),
                target_stimulus: target.unwrap_or(config.target_stimulus),
                columns: config.columns,
            };
            cmd_prepare(&input, &output, &config, print)
        }
        Commands::Inspect { input } => cmd_inspect(&input, &config),
    }
}

fn cmd_prepare(input: &Path, output: &Path, config: &PrepareConfig, print: bool) -> Result<()> {
    let start = Instant::now();

    let table = load_file(input).with_context(|| format!("loading {}", input.display()))?;
    if table.is_empty() {
        warn!("{} contains no rows", input.display());
    } else {
        info!("Loaded {} rows from {}", table.len(), input.display());
    }

    let prepared = prepare_table(&table, config)
        .with_context(|| format!("preparing {}", input.display()))?;

    write_summaries(output, &prepared.records)
        .with_context(|| format!("writing {}", output.display()))?;

    if print {
        println!("{}", format_table(&prepared.records)?);
    }

    let note = match &prepared.warning {
        Some(PrepareWarning::EmptyResult { .. }) => "filter matched no rows".to_string(),
        None => "ok".to_string(),
    };
    print_summary(
        "Prepare Complete",
        &[
            ("Input", input.display().to_string()),
            ("Region", config.region.clone()),
            ("Parameter", config.parameter.clone()),
            ("Target stimulus", config.target_stimulus.clone()),
            ("Rows loaded", table.len().to_string()),
            ("Rows matched", prepared.rows_matched.to_string()),
            ("Records written", prepared.records.len().to_string()),
            ("Output", output.display().to_string()),
            ("Status", note),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_inspect(input: &Path, config: &PrepareConfig) -> Result<()> {
    let table = load_file(input).with_context(|| format!("loading {}", input.display()))?;
    let columns = &config.columns;

    print_summary(
        "Observation Table",
        &[
            ("Input", input.display().to_string()),
            ("Rows", table.len().to_string()),
            ("Columns", table.column_names.join(", ")),
            ("Regions", table.describe_values(&columns.region)),
            ("Parameters", table.describe_values(&columns.parameter)),
            ("Stimuli", table.describe_values(&columns.stimulus_type)),
        ],
    );
    Ok(())
}
