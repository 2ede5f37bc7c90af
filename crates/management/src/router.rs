use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{self, ManagementState};

/// Routes needing no bearer token (§6): registration, login, and the
/// read-only product/campaign listings.
pub fn public_router() -> Router<ManagementState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/products", get(handlers::list_products))
        .route("/campaigns/:campaign_id", get(handlers::get_campaign))
}

/// Routes requiring a verified bearer token in request extensions
/// (§6) — the API edge route-layers its auth middleware on top of this
/// router after `.with_state`, since this crate does not run its own
/// middleware stack.
pub fn protected_router() -> Router<ManagementState> {
    Router::new()
        .route("/auth/me", get(handlers::me))
        .route("/campaigns", post(handlers::create_campaign))
}
