//! Gatehouse - school portal API

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatehouse::{
    config::{Args, LogFormat, StorageBackend},
    db::{MongoClient, Stores},
    logging::AuditLogger,
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let mut args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("gatehouse={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    match args.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Gatehouse - school portal API");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Storage: {:?}", args.storage);
    info!(
        "Policy: restrict_office_appointments={} enforce_status_transitions={}",
        args.restrict_office_appointments, args.enforce_status_transitions
    );
    info!("======================================");

    let audit = AuditLogger::new();
    if let Some(ref path) = args.audit_log_path {
        if let Err(e) = audit.init_file(PathBuf::from(path)).await {
            error!("Failed to open audit log {}: {}", path, e);
            std::process::exit(1);
        }
    }

    let stores = match args.storage {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on restart");
            Stores::memory()
        }
        StorageBackend::Mongo => match connect_mongo(&args).await {
            Ok(stores) => stores,
            Err(e) if args.dev_mode => {
                warn!("MongoDB connection failed (dev mode, continuing in memory): {}", e);
                args.storage = StorageBackend::Memory;
                Stores::memory()
            }
            Err(e) => {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        },
    };

    let state = AppState::build(args, stores, audit)?;

    if let Some(ref password) = state.args.bootstrap_admin_password {
        match state
            .services
            .accounts
            .bootstrap_admin(&state.args.bootstrap_admin_username, password)
            .await
        {
            Ok(Some(admin)) => info!("Seeded admin account {}", admin.username),
            Ok(None) => {}
            Err(e) => warn!("Admin bootstrap failed: {}", e),
        }
    }

    server::run(Arc::new(state)).await?;
    info!("Gatehouse stopped");
    Ok(())
}

async fn connect_mongo(args: &Args) -> gatehouse::Result<Stores> {
    let client = MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await?;
    info!("MongoDB connected successfully");
    Stores::mongo(&client).await
}
