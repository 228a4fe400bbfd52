//! Execution engine entry point.
//!
//! Wires the store, cache, hub, router, queue, and worker pool together and
//! serves the HTTP/WebSocket API.

use anyhow::Result;
use common::SubscriptionHub;
use engine::{
    JobQueue, OrderProcessor, QueueConfig, UuidPolicy, WorkerPool, WorkerPoolConfig,
};
use executor::{MeteoraDriver, RaydiumDriver, Router};
use gateway::{create_router, AppState, Config};
use metrics_exporter_prometheus::PrometheusBuilder;
use order_store::{HotCache, HotCacheConfig, OrderStore, RedisMirror};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting execution engine");

    let config = Config::from_env()?;
    info!("Configuration:");
    info!("  SERVER: {}", config.bind_addr());
    info!("  METRICS_PORT: {}", config.metrics_port);
    info!("  QUEUE_CONCURRENCY: {}", config.queue_concurrency);
    info!("  QUEUE_RATE_LIMIT: {}/min", config.queue_rate_limit);
    info!("  MAX_RETRY_ATTEMPTS: {}", config.max_retry_attempts);
    info!(
        "  REDIS_URL: {}",
        config.redis_url.as_deref().unwrap_or("(cache mirror off)")
    );

    // Start Prometheus metrics server
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .install()?;
    info!("Prometheus metrics server started on port {}", config.metrics_port);

    // Core components
    let store = Arc::new(OrderStore::new());
    let hub = Arc::new(SubscriptionHub::new());

    let cache_config = HotCacheConfig {
        ttl: config.cache_ttl,
        log_cap: 50,
    };
    let cache = match &config.redis_url {
        Some(url) => match RedisMirror::new(url, config.cache_ttl.as_secs(), cache_config.log_cap) {
            Ok(mirror) => {
                info!("Hot cache mirroring to Redis at {}", url);
                Arc::new(HotCache::with_mirror(cache_config, Arc::new(mirror)))
            }
            Err(e) => {
                warn!("Redis mirror unavailable ({}); cache is in-memory only", e);
                Arc::new(HotCache::new(cache_config))
            }
        },
        None => Arc::new(HotCache::new(cache_config)),
    };

    // Venue drivers, registration order fixed for deterministic tie-breaks
    let (raydium_params, meteora_params) = config.venue_params();
    let mut router = Router::new();
    router.register(Arc::new(RaydiumDriver::new(raydium_params)));
    router.register(Arc::new(MeteoraDriver::new(meteora_params)));
    let venues = router.venues();
    let router = Arc::new(router);

    // Queue and workers
    let queue = Arc::new(JobQueue::new(QueueConfig {
        visibility_timeout: config.queue_visibility_timeout,
        ..Default::default()
    }));
    let processor = Arc::new(OrderProcessor::new(
        store.clone(),
        cache.clone(),
        router,
        hub.clone(),
        Arc::new(UuidPolicy),
        config.max_retry_attempts,
    ));
    let mut pool = WorkerPool::new(
        queue.clone(),
        processor,
        WorkerPoolConfig {
            concurrency: config.queue_concurrency,
            rate_limit: config.queue_rate_limit,
            rate_window: Duration::from_secs(60),
            max_attempts: config.max_retry_attempts,
            ..Default::default()
        },
    );
    pool.start();

    // HTTP server
    let state = Arc::new(AppState {
        store,
        cache,
        hub: hub.clone(),
        queue,
        venues,
        config: config.clone(),
    });
    let app = create_router(state);

    let listener = TcpListener::bind(config.bind_addr()).await?;
    info!("Engine listening on {}", config.bind_addr());
    info!("Endpoints:");
    info!("  POST /orders              - Submit swap order");
    info!("  GET  /orders              - List orders");
    info!("  GET  /orders/{{id}}         - Fetch order");
    info!("  GET  /orders/{{id}}/updates - Transition history");
    info!("  GET  /ws/orders/{{id}}      - Subscribe to transitions");
    info!("  GET  /stats               - Statistics");
    info!("  GET  /health              - Health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain: workers finish their current attempt, then subscribers close.
    info!("Shutting down worker pool...");
    pool.shutdown().await;
    hub.close_all("shutting down");

    info!("Engine stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received terminate signal"),
    }
}
