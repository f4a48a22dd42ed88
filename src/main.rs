mod aggregator;
mod config;
mod db;
mod errors;
mod feeds;
mod pnl;
mod server;
mod state;

use crate::aggregator::Aggregator;
use crate::config::SourceKind;
use crate::feeds::cache::CachedSource;
use crate::feeds::file::FileSource;
use crate::feeds::proxy::ProxySource;
use crate::feeds::SeriesSource;
use crate::state::AppState;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("fifto_pnl aggregator starting");

    // Load config
    let cfg = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    // Init database
    let db_pool = match db::init_db(&cfg.data_dir) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!("database init error: {e}");
            std::process::exit(1);
        }
    };

    // Series source, always behind the SQLite cache
    let source: Arc<dyn SeriesSource> = match cfg.series_source {
        SourceKind::Proxy => Arc::new(CachedSource::new(
            ProxySource::new(&cfg.proxy_base_url, cfg.fetch_timeout_secs),
            db_pool.clone(),
            cfg.cache_ttl_secs,
        )),
        SourceKind::File => Arc::new(CachedSource::new(
            FileSource::new(&cfg.series_dir),
            db_pool.clone(),
            cfg.cache_ttl_secs,
        )),
    };
    tracing::info!(
        source = source.name(),
        ttl_secs = cfg.cache_ttl_secs,
        "series source ready"
    );

    let app_state = AppState::new(cfg.clone(), db_pool, Aggregator::new(source));

    // ── Spawn tasks ──

    // Background refresher: rebuild the all-entities view on an interval
    if cfg.refresh_interval_secs > 0 {
        let refresh_state = app_state.clone();
        let every = cfg.refresh_interval_secs;
        tokio::spawn(async move {
            run_refresher(refresh_state, every).await;
        });
    } else {
        tracing::info!("background refresh disabled");
    }

    // Axum HTTP + WS server
    let port = cfg.server_port;
    let app = server::router(app_state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("bind error: {e}");
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
    }
}

/// Rebuilds the view over every registered entity. The first tick fires
/// immediately so WS clients get a view soon after startup.
async fn run_refresher(state: Arc<AppState>, every_secs: u64) {
    tracing::info!(every_secs, "refresher task started");
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(every_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if let Err(e) = server::refresh_once(&state).await {
            tracing::error!(error = %e, "scheduled refresh failed");
        }
    }
}
