//! Wires the HTTP/WS edge (C10): merges this crate's bid/ranking/order/ws
//! routes with `flashbid-management`'s auth/admin routes behind one CORS
//! + trace + compression stack, route-layering [`middleware::require_auth`]
//! only onto the routes §6 marks `bearer`/`admin`.

use std::net::SocketAddr;

use axum::middleware as axum_mw;
use axum::routing::{get, post};
use axum::Router;
use flashbid_core::config::AppConfig;
use flashbid_management::handlers::ManagementState;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers::{bids, health, orders, rankings};
use crate::middleware::{rate_limit_by_ip, require_auth};
use crate::state::ApiState;
use crate::ws::ws_upgrade;

pub struct ApiServer {
    config: AppConfig,
    state: ApiState,
    management_state: ManagementState,
}

impl ApiServer {
    pub fn new(config: AppConfig, state: ApiState, management_state: ManagementState) -> Self {
        Self {
            config,
            state,
            management_state,
        }
    }

    fn build_router(&self) -> Router {
        let public_bid_routes = Router::new()
            .route("/rankings/:campaign_id", get(rankings::rankings))
            .route("/health", get(health::health_check))
            .with_state(self.state.clone());

        let protected_bid_routes = Router::new()
            .route("/bids", post(bids::submit_bid))
            .route("/bids/:campaign_id/history", get(bids::bid_history))
            .route("/rankings/:campaign_id/me", get(rankings::my_rank))
            .route("/orders", get(orders::my_orders))
            .route("/orders/campaign/:campaign_id", get(orders::campaign_orders))
            .with_state(self.state.clone())
            .route_layer(axum_mw::from_fn_with_state(self.state.clone(), require_auth));

        let ws_routes = Router::new()
            .route("/ws/:campaign_id", get(ws_upgrade))
            .with_state(self.state.clone());

        let public_mgmt_routes = flashbid_management::public_router().with_state(self.management_state.clone());

        let protected_mgmt_routes = flashbid_management::protected_router()
            .with_state(self.management_state.clone())
            .route_layer(axum_mw::from_fn_with_state(self.state.clone(), require_auth));

        let cors = build_cors(&self.config.api.cors_origins);

        Router::new()
            .merge(public_bid_routes)
            .merge(protected_bid_routes)
            .merge(ws_routes)
            .merge(public_mgmt_routes)
            .merge(protected_mgmt_routes)
            .route_layer(axum_mw::from_fn_with_state(self.state.clone(), rate_limit_by_ip))
            .layer(CompressionLayer::new())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Installs the Prometheus recorder and mounts `/metrics` on the main
    /// HTTP surface alongside every other route (see DESIGN.md for why
    /// this differs from a dedicated metrics port).
    fn metrics_router(&self) -> anyhow::Result<Router> {
        let handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
        Ok(Router::new().route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        ))
    }

    /// Starts the HTTP/WS listener, draining in-flight requests once
    /// `shutdown` reports `true`.
    pub async fn start_http(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) -> anyhow::Result<()> {
        let app = self.build_router().merge(self.metrics_router()?);
        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "starting HTTP/WS server");
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await?;
        Ok(())
    }
}

fn build_cors(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
