use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use hcalmon::config::Config;
use hcalmon::pipeline;

/// HCAL rec-hit monitor.
#[derive(Parser)]
#[command(name = "hcalmon", about)]
struct Cli {
    /// Path to the YAML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Geometry dump (JSON) used to build the eta/phi table.
    #[arg(short, long)]
    geometry: Option<PathBuf>,

    /// Event file, one JSON event per line.
    #[arg(short, long)]
    events: Option<PathBuf>,

    /// Overrides `output.path` from the configuration.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    /// Overrides `log_level` from the configuration.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print version information and exit.
    Version,
}

/// Build-time version info.
mod version {
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    /// Git commit hash (set at build time via env, or "unknown").
    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    /// Full version string with platform info.
    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Version) = &cli.command {
        println!("hcalmon {}", version::full());
        return Ok(());
    }

    let mut cfg = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(output) = cli.output {
        cfg.output.path = output;
    }

    let log_level = cli.log_level.as_deref().unwrap_or(&cfg.log_level);
    let filter = EnvFilter::try_new(log_level)
        .with_context(|| format!("invalid log level: {log_level}"))?;

    fmt().with_env_filter(filter).with_target(true).init();

    let geometry_path = cli
        .geometry
        .context("--geometry is required (use --help for usage)")?;
    let events_path = cli
        .events
        .context("--events is required (use --help for usage)")?;

    tracing::info!(
        version = version::RELEASE,
        commit = version::git_commit(),
        "starting hcalmon",
    );

    pipeline::run(&cfg, &geometry_path, &events_path)?;

    Ok(())
}
