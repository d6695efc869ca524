use axum::routing::get;
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::Result;
use crate::gateway::Gateway;
use crate::handlers::{
    delete_rate_limit, get_movie, get_rate_limit, get_rating, health_check, list_movies, not_found,
    readiness_check, AppState, SharedState,
};
use crate::middleware::logging_middleware;
use crate::tmdb::TmdbClient;
use crate::upstream::Upstream;

/// Build the router over already constructed state
pub fn create_app(state: SharedState) -> Router {
    Router::new()
        // Gateway endpoints
        .route("/movie", get(list_movies))
        .route("/movie/:id", get(get_movie))
        .route("/rating/:id", get(get_rating))
        // Rate limit administration
        .route("/rate-limit/:key", get(get_rate_limit).delete(delete_rate_limit))
        // Health and readiness endpoints
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .fallback(not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

/// Pick the metadata provider described by the configuration
pub fn build_upstream(config: &Config) -> Result<(Arc<dyn Upstream>, &'static str)> {
    match config.tmdb_api_key.as_deref() {
        Some(key) if config.uses_tmdb() => {
            let client = TmdbClient::new(&config.tmdb_base_url, key, config.upstream_timeout)?;
            let upstream: Arc<dyn Upstream> = Arc::new(client);
            Ok((upstream, "tmdb"))
        }
        _ => {
            tracing::warn!("TMDB_API_KEY not set, serving the built-in catalog");
            let upstream: Arc<dyn Upstream> =
                Arc::new(Catalog::builtin(config.catalog_rating_delay));
            Ok((upstream, "catalog"))
        }
    }
}

pub struct Server {
    state: SharedState,
    bind_addr: SocketAddr,
    cleanup_interval: std::time::Duration,
}

impl Server {
    pub fn new(config: Config) -> Result<Self> {
        config.check()?;
        let (upstream, upstream_name) = build_upstream(&config)?;
        let gateway = Gateway::new(config.rate_limit_rule(), upstream);

        Ok(Self {
            state: AppState::new(gateway, upstream_name),
            bind_addr: config.bind_addr,
            cleanup_interval: config.cleanup_interval(),
        })
    }

    pub async fn run(self) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        tracing::info!("moviegate listening on {}", self.bind_addr);
        tracing::info!("Health check available at /health");
        tracing::info!("Readiness check available at /ready");

        let cleanup = spawn_cleanup_task(self.state.clone(), self.cleanup_interval);
        let app = create_app(self.state);

        // Run server with graceful shutdown
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        cleanup.abort();
        Ok(())
    }
}

/// Periodically drops rate limit windows that have run out
pub fn spawn_cleanup_task(state: SharedState, every: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = state.gateway.cleanup_expired_windows();
            if removed > 0 {
                tracing::debug!(removed, "Cleaned up expired rate limit windows");
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
