//! Video fetch-and-index server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vidx_api::{create_router, metrics, ApiConfig, AppState, FetchConfig, FetchScheduler, SearchBackend};
use vidx_search::{ElasticClient, ElasticVideoIndex, MemoryVideoIndex, VideoIndex};
use vidx_youtube::{KeyRotator, YouTubeClient};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    init_tracing();

    // Required for rustls 0.23+; fails only if a provider is already installed
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider was already installed");
    }

    info!("Starting vidx-api");

    let config = ApiConfig::from_env();
    let fetch_config = FetchConfig::from_env();
    info!(
        "API config: host={}, port={}, backend={}",
        config.host, config.port, config.search_backend
    );
    info!("Fetch config: {:?}", fetch_config);

    let index = match build_index(config.search_backend).await {
        Ok(index) => index,
        Err(e) => {
            error!("Failed to initialise video index: {:#}", e);
            std::process::exit(1);
        }
    };

    let metrics_handle = if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder, metrics disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let scheduler = if fetch_config.enabled {
        match YouTubeClient::from_env() {
            Ok(client) => {
                let keys = Arc::new(KeyRotator::new(&fetch_config.api_keys));
                let scheduler = FetchScheduler::new(
                    fetch_config.clone(),
                    Arc::new(client),
                    Arc::clone(&index),
                    keys,
                );
                Some(scheduler.start())
            }
            Err(e) => {
                error!("Failed to create YouTube client: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        info!("Fetch scheduler is disabled");
        None
    };

    let state = AppState::new(config.clone(), index);
    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid bind address {}:{}: {}", config.host, config.port, e);
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Listening on {}", addr);

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        error!("Server error: {}", e);
    }

    if let Some(handle) = scheduler {
        handle.shutdown(fetch_config.shutdown_grace()).await;
    }

    info!("Server shutdown complete");
}

/// Text output by default, JSON with `LOG_FORMAT=json`.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vidx=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Build the configured index; the store must be reachable with its schema in place.
async fn build_index(backend: SearchBackend) -> anyhow::Result<Arc<dyn VideoIndex>> {
    let index: Arc<dyn VideoIndex> = match backend {
        SearchBackend::Memory => {
            warn!("Using in-memory video index; data is lost on restart");
            Arc::new(MemoryVideoIndex::new())
        }
        SearchBackend::Elasticsearch => {
            let client = ElasticClient::from_env()?;
            info!(host = %client.host(), index = %client.index(), "Connecting to Elasticsearch");
            Arc::new(ElasticVideoIndex::new(client))
        }
    };

    if !index.ping().await {
        anyhow::bail!("search backend is not reachable");
    }

    index.ensure_schema().await?;
    info!("Video index ready");

    Ok(index)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Received shutdown signal");
}
