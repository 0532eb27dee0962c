mod routes;
mod state;

use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::Router;
use caldir_schedule_core::ScheduleConfig;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "caldir-schedule")]
#[command(about = "Answer CalDAV free/busy scheduling requests from a caldir directory")]
struct Args {
    /// Config file (defaults to ~/.config/caldir/schedule.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config file
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}=debug,caldir_schedule_core=debug,tower_http=debug",
                    env!("CARGO_CRATE_NAME")
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ScheduleConfig::load_from(path),
        None => ScheduleConfig::load(),
    }
    .context("Failed to load configuration")?;

    let state = AppState::new(&config)?;

    let app = Router::new()
        .merge(routes::outbox::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let bind = args.bind.clone().unwrap_or_else(|| config.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;

    tracing::info!(
        address = %listener.local_addr()?,
        data_dir = %config.data_path().display(),
        "caldir-schedule listening"
    );

    axum::serve(listener, app).await?;

    Ok(())
}
