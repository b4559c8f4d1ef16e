//! CLI entry point for ammeter-daq
//!
//! ```bash
//! ammeter-daq emulate --config config/test_config.yaml
//! ammeter-daq run --config config/test_config.yaml
//! ammeter-daq measure --log-level debug
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use ammeter_daq::config::ProjectConfig;
use ammeter_daq::logging::{self, parse_log_level, LogFormat};
use ammeter_daq::runner;
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ammeter-daq")]
#[command(about = "Sample several ammeters, inject faults and rank their reliability", long_about = None)]
struct Cli {
    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Override the configured log format (pretty, compact, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArg {
    /// Project configuration file (YAML or TOML)
    #[arg(long, default_value = "config/test_config.yaml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample, analyse and save one run
    Run(ConfigArg),

    /// Serve the configured instruments' emulators until Ctrl-C
    Emulate(ConfigArg),

    /// Take one measurement from each configured instrument
    Measure(ConfigArg),
}

impl Commands {
    fn config_path(&self) -> &PathBuf {
        match self {
            Commands::Run(a) | Commands::Emulate(a) | Commands::Measure(a) => &a.config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.command.config_path();
    let config = ProjectConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    let mut tracing_config = config.tracing_config()?;
    if let Some(level) = &cli.log_level {
        tracing_config.level = parse_log_level(level).map_err(|e| anyhow!(e))?;
    }
    if let Some(format) = &cli.log_format {
        tracing_config.format = format.parse::<LogFormat>().map_err(|e| anyhow!(e))?;
    }
    logging::init(tracing_config).map_err(|e| anyhow!(e))?;

    match cli.command {
        Commands::Run(_) => run(&config).await,
        Commands::Emulate(_) => runner::emulate(&config).await,
        Commands::Measure(_) => measure(&config).await,
    }
}

async fn run(config: &ProjectConfig) -> Result<()> {
    let outcome = runner::run_project(config).await?;
    let run = outcome.result.run();

    println!("Run saved to {}", outcome.run_dir.display());
    println!(
        "Ticks: {}  Measurements: {}  Overruns: {}{}",
        run.ticks_completed(),
        run.total_measurements(),
        run.overruns(),
        if run.was_cancelled() { "  (cancelled)" } else { "" }
    );
    println!();
    println!("Reliability ranking:");
    for entry in outcome.result.analysis().ranking.entries() {
        println!(
            "  {}. {:<10} score {:.3}  success {:.1}%  agreement {:.3}  stability {:.3}",
            entry.rank,
            entry.instrument_id,
            entry.score,
            entry.success_rate * 100.0,
            entry.agreement_score,
            entry.stability_score
        );
    }
    Ok(())
}

async fn measure(config: &ProjectConfig) -> Result<()> {
    for m in runner::measure_all(config).await? {
        match (m.value(), m.error_kind()) {
            (Some(value), _) => println!("{:<10} {:.6} A  ({:?})", m.instrument_id(), value, m.latency()),
            (None, kind) => println!(
                "{:<10} failed: {}",
                m.instrument_id(),
                kind.map(|k| k.as_str()).unwrap_or("unknown")
            ),
        }
    }
    Ok(())
}
