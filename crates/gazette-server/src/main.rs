//! # gazette-server
//!
//! HTTP API server for the Gazette social blogging platform.
//!
//! This binary provides:
//! - **Session auth** (register / login / logout) over salted BLAKE3
//!   password derivations
//! - **Profiles and the follow graph** with public/private account
//!   semantics and follow-request approval
//! - **Posts** with image uploads, likes/dislikes, and comments
//! - **Direct messages** and **notifications**
//! - **AI drafting assistance** proxied to an external text-generation
//!   service
//! - **Server-sent events** streaming the store change feed
//! - **Per-client rate limiting** to protect against abuse

mod ai;
mod api;
mod auth;
mod blob_store;
mod config;
mod error;
mod rate_limit;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use gazette_store::Database;

use crate::ai::TextGenerator;
use crate::api::AppState;
use crate::blob_store::BlobStore;
use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,gazette_server=debug")),
        )
        .init();

    info!("Starting Gazette server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        instance = %config.instance_name,
        registration_open = config.registration_open,
        ai_enabled = config.ai_api_url.is_some(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Store (runs migrations on open)
    let db = match &config.db_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    let db = Arc::new(tokio::sync::Mutex::new(db));

    // Image store (creates directories if missing)
    let blobs = Arc::new(BlobStore::new(config.upload_dir.clone(), config.max_image_size).await?);

    // Text-generation client
    let textgen = Arc::new(TextGenerator::new(&config));

    // Rate limiter: 10 req/s sustained, burst of 30
    let rate_limiter = RateLimiter::default();

    // Application state for the HTTP API
    let app_state = AppState {
        db,
        blobs,
        textgen,
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    let rl = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rl.purge_stale(600.0).await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    // tokio::select! ensures that if either the HTTP server or a shutdown
    // signal arrives, we exit cleanly.
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
