//! Video Gateway - caching front for Skynet-hosted videos

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use video_gateway::{
    config::Args,
    db::MongoClient,
    server::{self, AppState},
    services::{MongoMetadataResolver, SkynetConfig, SkynetFetcher},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("video_gateway={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Video Gateway");
    info!("======================================");
    info!("Listen: {}", args.port);
    info!("MongoDB: {} (db: {})", args.mongo_uri, args.mongo_db);
    info!("Skynet portal: {}", args.skynet_portal_url);
    info!("Cache dir: {}", args.cache_dir.display());
    info!("Max cached videos: {}", args.max_cached_videos());
    info!("Fetch timeout: {}s", args.fetch_timeout_secs);
    info!("======================================");

    let mongo = match MongoClient::new(&args.mongo_uri, &args.mongo_db).await {
        Ok(client) => client,
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    info!("Resolving video metadata from {}.video_metadata", mongo.db_name());
    let resolver = Arc::new(MongoMetadataResolver::new(&mongo));
    let fetcher = Arc::new(SkynetFetcher::new(SkynetConfig::new(
        args.skynet_portal_url.clone(),
    ))?);

    let state = AppState::new(args, resolver, fetcher);
    state.cache.prepare().await?;

    if let Err(e) = server::run(Arc::new(state)).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
