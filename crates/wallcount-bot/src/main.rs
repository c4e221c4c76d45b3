//! wallcount-bot entry point.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tokio::sync::{mpsc, watch};

use wallcount::{ObservationStore, OccupancyRecord};
use wallcount_bot::config::Overrides;
use wallcount_bot::{
    console, describe, scheduler, sync_latest, CommandHandler, PageSource, PortalClient, Settings,
    SyncOutcome,
};

#[derive(Parser)]
#[command(
    name = "wallcount-bot",
    about = "Tracks how many climbers are on the wall at a Rock Gym Pro gym",
    version
)]
struct Cli {
    /// Portal public key of the gym (WALLCOUNT_PGK).
    #[arg(long, global = true)]
    pgk: Option<String>,

    /// Facility id (WALLCOUNT_FID).
    #[arg(long, global = true)]
    fid: Option<String>,

    /// Location key inside the page's data literal (WALLCOUNT_GYM).
    #[arg(long, global = true)]
    gym: Option<String>,

    /// SQLite file holding the observation history (WALLCOUNT_STORAGE).
    #[arg(long, global = true)]
    storage: Option<String>,

    /// Pull schedule as `name=seconds|name=seconds` (WALLCOUNT_SCHEDULE).
    #[arg(long, global = true)]
    schedule: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull once, then keep pulling on schedule and answer console commands (default).
    Serve {
        /// Run the scheduled pulls only, until Ctrl+C.
        #[arg(long)]
        headless: bool,
    },

    /// Answer commands against the stored history without pulling.
    Console,

    /// Pull once and print what happened.
    Pull,

    /// Print the latest stored observation.
    Last {
        /// Print the raw record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   wallcount-bot completions bash > ~/.local/share/bash-completion/completions/wallcount-bot
    ///   wallcount-bot completions zsh > ~/.zfunc/_wallcount-bot
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let overrides = Overrides {
        pgk: cli.pgk,
        fid: cli.fid,
        gym: cli.gym,
        storage: cli.storage,
        schedule: cli.schedule,
    };

    match cli.command.unwrap_or(Commands::Serve { headless: false }) {
        Commands::Serve { headless } => {
            let settings = Settings::resolve(&overrides)?;
            let gym = settings.gym()?.to_string();
            let client = PortalClient::from_settings(&settings)?;
            let store = Arc::new(ObservationStore::open(&settings.storage)?);

            tracing::info!("wallcount-bot tracking {gym:?} via {}", client.url());
            let outcome = sync_latest(&client, &store, &gym)
                .await
                .context("initial pull failed")?;
            tracing::info!("initial pull: {}", summarize(&outcome));

            let (shutdown, stopped) = watch::channel(false);
            let source: Arc<dyn PageSource> = Arc::new(client);
            let jobs = scheduler::spawn_jobs(
                &settings.schedule,
                source,
                Arc::clone(&store),
                &gym,
                stopped,
            );

            if headless {
                tokio::signal::ctrl_c().await?;
                tracing::info!("shutting down");
                shutdown.send_replace(true);
            } else {
                run_console(Arc::clone(&store), shutdown).await?;
            }

            for job in jobs {
                let _ = job.await;
            }
        }

        Commands::Console => {
            let settings = Settings::resolve(&overrides)?;
            let store = Arc::new(ObservationStore::open(&settings.storage)?);
            let (shutdown, _stopped) = watch::channel(false);
            run_console(store, shutdown).await?;
        }

        Commands::Pull => {
            let settings = Settings::resolve(&overrides)?;
            let gym = settings.gym()?.to_string();
            let client = PortalClient::from_settings(&settings)?;
            let store = Arc::new(ObservationStore::open(&settings.storage)?);
            let outcome = sync_latest(&client, &store, &gym).await?;
            println!("{}", summarize(&outcome));
        }

        Commands::Last { json } => {
            let settings = Settings::resolve(&overrides)?;
            let store = ObservationStore::open(&settings.storage)?;
            println!("{}", render_last(store.last()?, json, Utc::now())?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "wallcount-bot", &mut std::io::stdout());
        }
    }

    Ok(())
}

async fn run_console(
    store: Arc<ObservationStore>,
    shutdown: watch::Sender<bool>,
) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = CommandHandler::new(store, tx);
    tokio::task::spawn_blocking(move || console::run(handler, rx, shutdown)).await?
}

/// The `last` command's output. An empty history is an error.
fn render_last(
    record: Option<OccupancyRecord>,
    json: bool,
    now: DateTime<Utc>,
) -> anyhow::Result<String> {
    let Some(record) = record else {
        anyhow::bail!("No observations stored yet.");
    };
    if json {
        Ok(serde_json::to_string_pretty(&record)?)
    } else {
        Ok(describe(&record, now))
    }
}

fn summarize(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Stored(record) => format!("stored: {}", describe(record, Utc::now())),
        SyncOutcome::Duplicate(record) => {
            format!("unchanged: {}", describe(record, Utc::now()))
        }
        SyncOutcome::NoData => "no occupancy data on the page".to_string(),
    }
}
