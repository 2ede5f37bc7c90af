use axum::extract::{Extension, Path, State};
use axum::Json;
use flashbid_core::EngineError;
use flashbid_management::error::ApiError;
use flashbid_management::handlers::AuthenticatedUser;
use uuid::Uuid;

use crate::dto::{CampaignOrdersResponse, OrderListResponse};
use crate::state::ApiState;

/// `GET /orders` (bearer) — the caller's own orders across campaigns.
pub async fn my_orders(
    State(state): State<ApiState>,
    Extension(current): Extension<AuthenticatedUser>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let orders = flashbid_db::orders::list_for_user(&state.db.pool, current.0.user_id)
        .await
        .map_err(ApiError::from)?;
    let total = orders.len();
    Ok(Json(OrderListResponse { orders, total }))
}

/// `GET /orders/campaign/{id}` (admin) — §6. `is_consistent` cross-checks
/// the confirmed-order count against the product's live stock, surfacing
/// any oversell that slipped past the four-layer decrement.
pub async fn campaign_orders(
    State(state): State<ApiState>,
    Extension(current): Extension<AuthenticatedUser>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignOrdersResponse>, ApiError> {
    if !current.0.is_admin {
        return Err(EngineError::AdminRequired.into());
    }

    let campaign = flashbid_db::campaigns::find_by_id(&state.db.pool, campaign_id)
        .await
        .map_err(ApiError::from)?
        .ok_or(EngineError::CampaignNotFound)?;

    let product = flashbid_db::products::find_by_id(&state.db.pool, campaign.product_id)
        .await
        .map_err(ApiError::from)?
        .ok_or(EngineError::ProductNotFound)?;

    let orders = flashbid_db::orders::list_for_campaign(&state.db.pool, campaign_id)
        .await
        .map_err(ApiError::from)?;
    let total = orders.len();
    let is_consistent = total as i64 <= product.stock;

    Ok(Json(CampaignOrdersResponse {
        campaign_id,
        orders,
        total,
        stock: product.stock,
        is_consistent,
    }))
}
