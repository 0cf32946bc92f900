//! Latchkey license API server.
//!
//! Issues, validates, and manages time-limited licenses over a JSON HTTP
//! API, and records per-license usage activity for analytics and support.
//!
//! Usage:
//!   latchkey-server --port 3000 --data-dir ./data
//!
//! The admin routes require the API key given via `--admin-key` or the
//! `LATCHKEY_ADMIN_KEY` environment variable.

use anyhow::{Context, Result};
use clap::Parser;
use latchkey_license::ExtendPolicy;
use latchkey_server::{build_router, AppState, LicenseService};
use latchkey_store::{ActivityStore, LicenseStore};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "latchkey-server")]
#[command(about = "Latchkey license API server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Directory holding the SQLite databases
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// API key required on /api/admin routes
    #[arg(long, env = "LATCHKEY_ADMIN_KEY")]
    admin_key: String,

    /// Only allow extending licenses within this many days of expiry;
    /// extensions are unrestricted when omitted
    #[arg(long)]
    extend_within_days: Option<i64>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("Latchkey server starting...");

    std::fs::create_dir_all(&args.data_dir).context("Failed to create data directory")?;
    let licenses = LicenseStore::open(&args.data_dir.join("licenses.db"))
        .context("Failed to open license store")?;
    let activity = ActivityStore::open(&args.data_dir.join("activity.db"))
        .context("Failed to open activity store")?;

    let extend_policy = match args.extend_within_days {
        Some(within_days) => ExtendPolicy::NearExpiryOnly { within_days },
        None => ExtendPolicy::Always,
    };
    info!("Extend policy: {:?}", extend_policy);

    let service = LicenseService::new(licenses, activity, extend_policy);
    let app = build_router(AppState::new(service, args.admin_key));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .context("Failed to bind HTTP port")?;
    info!("Listening on port {}", args.port);
    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}
