// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all
)]
#![allow(clippy::multiple_crate_versions)]

mod live;
mod routes;

use axum::Router;
use clap::Parser;
use incident_desk::{
    IncidentStateMachine, ReminderScheduler, SchedulerSettings, ServiceConfig, SystemClock,
};
use incident_desk_domain::DeadlinePolicy;
use incident_desk_persistence::{IncidentStore, Persistence};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::live::LiveEventBroadcaster;
use crate::routes::{AppState, build_router};

/// Incident Desk Server - incident intake, deadlines and reminders
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the `SQLite` database file. If not provided, uses in-memory database.
    #[arg(short, long)]
    database: Option<String>,

    /// Port to bind the server to
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// JSON configuration file; built-in defaults apply to omitted fields
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load_config(path: Option<&Path>) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
    let config: ServiceConfig = match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            serde_json::from_str(&std::fs::read_to_string(path)?)?
        }
        None => {
            info!("No configuration file given, using defaults");
            ServiceConfig::default()
        }
    };
    config.validate()?;
    Ok(config)
}

/// Waits for Ctrl-C, then stops the scheduler and waits for its current tick.
///
/// Returning lets the HTTP server finish its graceful shutdown.
async fn shutdown_signal(cancel: CancellationToken, scheduler_task: JoinHandle<()>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
    }
    info!("Shutdown requested, stopping reminder scheduler");
    cancel.cancel();
    if let Err(e) = scheduler_task.await {
        error!(error = %e, "Reminder scheduler task ended abnormally");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Initializing Incident Desk Server");

    let config: ServiceConfig = load_config(args.config.as_deref())?;
    let policy: DeadlinePolicy = config.deadline_policy()?;
    for (department, head) in config.directory().iter() {
        debug!(department = %department, responsible_id = %head, "Department staffed");
    }

    let store: Arc<dyn IncidentStore> = if let Some(db_path) = &args.database {
        info!("Using file-based database at: {}", db_path);
        Arc::new(Persistence::new_with_file(db_path)?)
    } else {
        info!("Using in-memory database");
        Arc::new(Persistence::new_in_memory()?)
    };

    let broadcaster: Arc<LiveEventBroadcaster> = Arc::new(LiveEventBroadcaster::new(
        policy.business_hours().timezone(),
    ));
    let machine: Arc<IncidentStateMachine> = Arc::new(IncidentStateMachine::from_config(
        &config,
        store,
        Arc::new(SystemClock),
        Arc::clone(&broadcaster) as Arc<dyn incident_desk::Notifier>,
    )?);
    let scheduler: Arc<ReminderScheduler> = Arc::new(ReminderScheduler::new(
        Arc::clone(&machine),
        SchedulerSettings::from_config(&config),
    ));

    let cancel: CancellationToken = CancellationToken::new();
    let scheduler_task: JoinHandle<()> = tokio::spawn({
        let scheduler: Arc<ReminderScheduler> = Arc::clone(&scheduler);
        let cancel: CancellationToken = cancel.clone();
        async move { scheduler.run(cancel).await }
    });

    let app: Router = build_router(AppState {
        machine,
        scheduler,
        broadcaster,
    });

    let addr: std::net::SocketAddr = format!("127.0.0.1:{}", args.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel, scheduler_task))
        .await?;

    info!("Server stopped");
    Ok(())
}
