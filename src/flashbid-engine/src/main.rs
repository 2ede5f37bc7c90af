//! flashbid-engine — real-time flash-sale bidding engine entry point.
//!
//! Wires the durable store, the three-tier cache, the bid/settlement
//! services, the WS broadcast loop, and the HTTP/WS edge, then serves
//! traffic until shutdown.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use flashbid_api::state::ApiState;
use flashbid_api::ApiServer;
use flashbid_bidding::BidService;
use flashbid_cache::RedisCache;
use flashbid_core::config::AppConfig;
use flashbid_db::Db;
use flashbid_management::auth::JwtHandler;
use flashbid_management::handlers::ManagementState;
use flashbid_realtime::{broadcast, Hub};
use flashbid_settlement::{run_poller, SettlementService};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "flashbid-engine")]
#[command(about = "Real-time flash-sale bidding engine")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "FLASHBID__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "FLASHBID__API__HTTP_PORT")]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flashbid_engine=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("flashbid-engine starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }

    info!(node_id = %config.node_id, http_port = config.api.http_port, "configuration loaded");

    let db = Arc::new(connect_with_retry("postgres", || Db::connect(&config.db)).await?);
    db.migrate().await?;

    let cache = Arc::new(connect_with_retry("redis", || RedisCache::new(&config.redis, &config.cache)).await?);

    let hub = Arc::new(Hub::new());
    let bidding = Arc::new(BidService::new(cache.clone(), db.clone(), hub.clone()));
    let settlement = Arc::new(SettlementService::new(
        db.clone(),
        cache.clone(),
        cache.clone(),
        db.clone(),
        hub.clone(),
        config.settlement.lock_ttl_secs,
    ));

    let jwt = Arc::new(JwtHandler::new(config.auth.jwt_secret.clone(), config.auth.token_ttl_secs));

    let api_state = ApiState {
        db: db.clone(),
        cache: cache.clone(),
        bidding,
        settlement: settlement.clone(),
        hub: hub.clone(),
        jwt: jwt.clone(),
        auth: config.auth.clone(),
        rate_limit: config.rate_limit.clone(),
    };

    let management_state = ManagementState {
        db: db.clone(),
        cache: cache.clone(),
        jwt: jwt.clone(),
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(run_poller(
        settlement,
        db.clone(),
        Duration::from_millis(config.settlement.poll_interval_ms),
        shutdown_rx.clone(),
    ));

    tokio::spawn(broadcast::run(
        hub.clone(),
        cache.clone(),
        Duration::from_millis(config.broadcast.interval_ms),
        shutdown_rx.clone(),
    ));

    info!("flashbid-engine is ready to serve traffic");

    let server = ApiServer::new(config.clone(), api_state, management_state);

    let signal_watch = async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => info!("received SIGINT, shutting down"),
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("received SIGINT, shutting down");
        }

        let _ = shutdown_tx.send(true);
    };
    tokio::spawn(signal_watch);

    if let Err(e) = server.start_http(shutdown_rx).await {
        error!(error = %e, "http server exited with error");
    }

    info!("flashbid-engine shut down cleanly");
    Ok(())
}

/// Connect to an external service with exponential backoff (3 attempts).
async fn connect_with_retry<T, F, Fut>(service_name: &str, connect_fn: F) -> anyhow::Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let delays = [
        Duration::from_secs(0),
        Duration::from_secs(2),
        Duration::from_secs(4),
    ];
    let mut last_err = None;
    for (attempt, delay) in delays.iter().enumerate() {
        if attempt > 0 {
            warn!(service = service_name, attempt, "retrying connection after {}s", delay.as_secs());
            tokio::time::sleep(*delay).await;
        }
        match connect_fn().await {
            Ok(conn) => {
                info!(service = service_name, "connected successfully");
                return Ok(conn);
            }
            Err(e) => {
                error!(service = service_name, attempt, error = %e, "connection failed");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} connection failed", service_name)))
}
