//! fleet-sim - waste-collection fleet simulator
//!
//! Drives the simulation loop against a fleet backend and offers one-shot
//! helpers for generating routes and inspecting plans.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fleet_sim::api::ApiClient;
use fleet_sim::config::FleetConfig;
use fleet_sim::error::Result;
use fleet_sim::model::parse_route_date;
use fleet_sim::planner::build_plan;
use fleet_sim::session::{Control, FleetSession, RunOptions};

#[derive(Parser)]
#[command(name = "fleet-sim")]
#[command(version)]
#[command(about = "Simulates waste-collection drivers along their in-progress routes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Route date (YYYY-MM-DD). Defaults to the newest date with routes.
    #[arg(long, short = 'd', global = true, value_parser = parse_route_date)]
    date: Option<NaiveDate>,

    /// Verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the polling and simulation loop until Ctrl-C
    Run {
        /// Start collecting as soon as the loop is up
        #[arg(long)]
        start: bool,

        /// Exit once no run is active
        #[arg(long)]
        exit_when_idle: bool,

        /// Print every published tick as a JSON line
        #[arg(long)]
        print_ticks: bool,
    },
    /// Ask the backend to auto-generate routes
    Generate {
        /// Minimum fill level for a bin to be routed
        #[arg(long)]
        threshold: Option<u8>,

        /// Maximum stops per route
        #[arg(long)]
        max_stops: Option<u32>,
    },
    /// Print the movement plan the current routes would produce
    Plan,
    /// Print bin, driver and route counts
    Status,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = execute(cli).await {
        error!(error = %err, "fleet-sim failed");
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let mut config = FleetConfig::load_or_default(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }

    let backend = Arc::new(ApiClient::new(config.api.clone())?);

    match cli.command {
        Commands::Run {
            start,
            exit_when_idle,
            print_ticks,
        } => {
            let mut session = FleetSession::new(backend, config).with_date(cli.date);
            session.refresh().await;

            if print_ticks {
                let mut ticks = session.subscribe();
                tokio::spawn(async move {
                    while ticks.changed().await.is_ok() {
                        let snapshot = ticks.borrow_and_update().clone();
                        match serde_json::to_string(&snapshot) {
                            Ok(line) => println!("{}", line),
                            Err(err) => error!(error = %err, "could not encode tick"),
                        }
                    }
                });
            }

            let (control, receiver) = mpsc::channel(8);
            let shutdown = control.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, shutting down");
                    let _ = shutdown.send(Control::Shutdown).await;
                }
            });

            session
                .run(
                    receiver,
                    RunOptions {
                        start_immediately: start,
                        exit_when_idle,
                    },
                )
                .await;
            drop(control);

            let failures = session.take_notification_failures();
            if !failures.is_empty() {
                println!("{}", serde_json::to_string_pretty(&failures)?);
            }
        }
        Commands::Generate {
            threshold,
            max_stops,
        } => {
            if let Some(threshold) = threshold {
                config.threshold = threshold;
            }
            if let Some(max_stops) = max_stops {
                config.max_stops = max_stops;
            }
            config.validate()?;

            let mut session = FleetSession::new(backend, config).with_date(cli.date);
            let summary = session.regenerate().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Plan => {
            let mut session = FleetSession::new(backend, config).with_date(cli.date);
            session.refresh().await;
            let sync = session.sync();
            let plan = build_plan(sync.routes(), sync.bins(), session.date());
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Commands::Status => {
            let mut session = FleetSession::new(backend, config).with_date(cli.date);
            session.refresh().await;
            println!("{}", serde_json::to_string_pretty(&session.status())?);
        }
    }

    Ok(())
}
