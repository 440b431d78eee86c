use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use kindred_core::clock::SystemClock;
use kindred_core::identity::{Argon2Hasher, MemoryPhotoStore, PhotoStore};
use kindred_core::store::{MemoryStore, PgStore, Store};
use kindred_server::config::AppConfig;
use kindred_server::{build_router, AppState, Collaborators};
use kindred_shared::clients::db::create_pool;
use kindred_shared::clients::minio::MinioClient;
use kindred_shared::clients::redis::RedisClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kindred_shared::middleware::init_tracing("kindred");

    let config = AppConfig::load()?;
    let port = config.port;
    let metrics_handle = kindred_shared::middleware::init_metrics()?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => Arc::new(PgStore::new(create_pool(url, config.database_pool_size)?)),
        None => {
            tracing::warn!("no database_url configured, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let redis = match &config.redis_url {
        Some(url) => Some(RedisClient::connect(url).await?),
        None => None,
    };

    let photos: Arc<dyn PhotoStore> = match config.object_store() {
        Some(s3) => Arc::new(
            MinioClient::new(s3.endpoint, s3.access_key, s3.secret_key, s3.bucket, s3.public_url).await,
        ),
        None => {
            tracing::warn!("no object store configured, photos are kept in memory");
            Arc::new(MemoryPhotoStore::new())
        }
    };

    let hasher = Arc::new(Argon2Hasher::with_cost(
        config.password_hash_memory_kib,
        config.password_hash_iterations,
    )?);
    let sweep_every = Duration::from_secs(config.reactivation_sweep_secs.max(1));

    let state = AppState::new(
        config,
        Collaborators {
            store,
            photos,
            hasher,
            clock: Arc::new(SystemClock),
            redis,
            metrics_handle,
        },
    );

    tokio::spawn(reactivation_sweep(state.clone(), sweep_every));

    let app = build_router(state);
    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "kindred starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Lifts elapsed temporary bans for users who have not tried to log in.
async fn reactivation_sweep(state: Arc<AppState>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        match state.moderation.reactivate_expired().await {
            Ok(ids) if !ids.is_empty() => tracing::info!(count = ids.len(), "reactivation sweep"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "reactivation sweep failed"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
