//! Ilperata Bridge - identity-token issuance and validation server

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ilperata_bridge::{
    auth::{AuthService, JwtValidator},
    config::Args,
    db::{MemoryUserStore, MongoClient, MongoUserStore, UserStore},
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ilperata_bridge={log_level},info").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Ilperata Bridge Server");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!(
        "Session validity: {} seconds",
        args.jwt_expiry_seconds
    );
    info!("======================================");

    if args.using_fallback_secret() {
        warn!("JWT_SECRET is not set; sessions are signed with the insecure development fallback");
    }

    // Connect the user store (in-memory fallback allowed in dev mode only)
    let store: Arc<dyn UserStore> = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db)
        .await
    {
        Ok(client) => match MongoUserStore::new(&client).await {
            Ok(store) => {
                info!("MongoDB user store ready");
                Arc::new(store)
            }
            Err(e) => {
                error!("Failed to initialize MongoDB collections: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
                Arc::new(MemoryUserStore::new())
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let jwt = JwtValidator::new(&args.jwt_secret(), args.jwt_expiry_seconds);
    let auth = AuthService::new(Arc::clone(&store), jwt);
    let state = Arc::new(AppState::new(args, auth));

    server::run(state).await?;

    Ok(())
}
