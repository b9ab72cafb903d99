mod commands;
mod config;
mod render;
mod state;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::CalsyncConfig;
use crate::state::State;

#[derive(Parser)]
#[command(name = "calsync")]
#[command(about = "Keep a local calendar store in sync with CalDAV servers")]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull remote changes for every calendar
    Sync {
        /// Only operate on this calendar (by id)
        #[arg(short, long)]
        calendar: Option<String>,
    },
    /// Expand recurring events into occurrences
    Expand {
        /// How many days ahead to expand (defaults to `expansion_horizon_days`)
        #[arg(long)]
        days: Option<i64>,
    },
    /// Show what may be done with a calendar's events
    Capabilities { calendar: String },
    /// List accounts and calendars
    Calendars,
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "calsync=debug,calsync_core=debug"
    } else {
        "calsync=info,calsync_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = CalsyncConfig::load()?;
    let state = State::open(&config)?;

    match cli.command {
        Commands::Sync { calendar } => {
            let engine = state.engine(&config);
            commands::sync::run(&state, &engine, calendar.as_deref()).await?;
            state.save()
        }
        Commands::Expand { days } => {
            let engine = state.engine(&config);
            let days = days.unwrap_or(config.expansion_horizon_days);
            commands::expand::run(&engine, days).await?;
            state.save()
        }
        Commands::Capabilities { calendar } => {
            let engine = state.engine(&config);
            commands::capabilities::run(&state, &engine, &calendar).await
        }
        Commands::Calendars => commands::calendars::run(&state).await,
    }
}
