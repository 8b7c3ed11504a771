//! `nudge` - offline replay and inspection.
//!
//! Reads metrics, persisted records, CTA inputs, ledger events and lifecycle
//! signals from JSON files and prints the decision (or diagnostic view) the
//! libraries produce. Every timestamp comes from `--now`; the wall clock is
//! never consulted.

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

pub use config::NudgeConfig;

/// nudge CLI
#[derive(Parser, Debug)]
#[command(name = "nudge")]
#[command(about = "Replay insight, CTA and diagnostic decisions from JSON inputs", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "NUDGE_CONFIG", global = true)]
    config: Option<String>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, env = "NUDGE_LOG_LEVEL", default_value = "warn", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the insight pipeline
    Run {
        /// Metrics snapshot (JSON object)
        #[arg(long)]
        metrics: PathBuf,

        /// Persisted insight records (JSON array)
        #[arg(long)]
        states: Option<PathBuf>,

        /// Evaluation time (RFC 3339)
        #[arg(long)]
        now: DateTime<Utc>,

        /// Override the configured session cap
        #[arg(long, allow_hyphen_values = true)]
        max_per_session: Option<i64>,
    },

    /// Explain why one insight is shown
    Explain {
        /// Insight id, e.g. failed_payments
        #[arg(long)]
        insight: String,

        #[arg(long)]
        metrics: PathBuf,

        #[arg(long)]
        states: Option<PathBuf>,

        #[arg(long)]
        now: DateTime<Utc>,
    },

    /// Resolve the CTA intent and build its contract
    Cta {
        /// `{ "subscription": .., "capability": .., "error": .. }`
        #[arg(long)]
        input: PathBuf,
    },

    /// Classify a user's lifecycle state
    Lifecycle {
        /// Lifecycle signals (JSON object)
        #[arg(long)]
        signals: PathBuf,

        #[arg(long)]
        now: DateTime<Utc>,
    },

    /// Compose the admin snapshot and export it
    AdminExport {
        /// Ledger events (JSON array)
        #[arg(long)]
        events: Option<PathBuf>,

        /// Lifecycle signals (JSON object)
        #[arg(long)]
        signals: Option<PathBuf>,

        /// json, csv or pdf_metadata
        #[arg(long, default_value = "json")]
        target: String,

        /// Write the artifact here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        now: DateTime<Utc>,
    },
}

/// Run using the current process arguments.
pub fn run() -> Result<()> {
    run_with_args(std::env::args_os())
}

/// Run using the provided argument iterator.
pub fn run_with_args<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing(&cli.log_level, cli.json);

    let config = NudgeConfig::load(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    let output = match cli.command {
        Commands::Run {
            metrics,
            states,
            now,
            max_per_session,
        } => commands::run(&config, &metrics, states.as_deref(), now, max_per_session)?,
        Commands::Explain {
            insight,
            metrics,
            states,
            now,
        } => commands::explain(&config, &insight, &metrics, states.as_deref(), now)?,
        Commands::Cta { input } => commands::cta(&config, &input)?,
        Commands::Lifecycle { signals, now } => commands::lifecycle(&config, &signals, now)?,
        Commands::AdminExport {
            events,
            signals,
            target,
            output,
            now,
        } => {
            let artifact = commands::admin_export(
                &config,
                events.as_deref(),
                signals.as_deref(),
                &target,
                now,
            )?;
            match output {
                Some(path) => {
                    commands::write_artifact(&path, &artifact)?;
                    return Ok(());
                }
                None => artifact.body,
            }
        }
    };

    println!("{output}");
    Ok(())
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // Logs go to stderr so stdout stays machine-readable.
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_requires_now() {
        let err = Cli::try_parse_from(["nudge", "run", "--metrics", "m.json"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_run() {
        let cli = Cli::try_parse_from([
            "nudge",
            "run",
            "--metrics",
            "m.json",
            "--now",
            "2025-06-02T08:00:00Z",
            "--max-per-session",
            "-1",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                now,
                max_per_session,
                states,
                ..
            } => {
                assert_eq!(now.to_rfc3339(), "2025-06-02T08:00:00+00:00");
                assert_eq!(max_per_session, Some(-1));
                assert!(states.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_admin_export_defaults() {
        let cli = Cli::try_parse_from([
            "nudge",
            "admin-export",
            "--now",
            "2025-06-02T08:00:00Z",
        ])
        .unwrap();
        match cli.command {
            Commands::AdminExport { target, output, .. } => {
                assert_eq!(target, "json");
                assert!(output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_timestamps() {
        assert!(Cli::try_parse_from([
            "nudge",
            "lifecycle",
            "--signals",
            "s.json",
            "--now",
            "yesterday",
        ])
        .is_err());
    }
}
