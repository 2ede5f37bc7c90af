use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use flashbid_management::error::ApiError;
use flashbid_management::handlers::AuthenticatedUser;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

use crate::dto::{BidHistoryResponse, BidResponse, BidSubmitRequest};
use crate::state::ApiState;

/// `POST /bids` (bearer) — §6.
pub async fn submit_bid(
    State(state): State<ApiState>,
    Extension(current): Extension<AuthenticatedUser>,
    Json(req): Json<BidSubmitRequest>,
) -> Result<(StatusCode, Json<BidResponse>), ApiError> {
    let user = current.0;
    let weight = user.weight.to_f64().unwrap_or(1.0);

    let (bid, rank) = state
        .bidding
        .submit_bid(req.campaign_id, user.user_id, &user.username, weight, req.price)
        .await
        .map_err(ApiError::from)?;

    Ok((StatusCode::CREATED, Json(BidResponse::new(bid, rank))))
}

/// `GET /bids/{campaign_id}/history` (bearer) — collapses to the single
/// currently-stored bid per §4.3/§9.
pub async fn bid_history(
    State(state): State<ApiState>,
    Extension(current): Extension<AuthenticatedUser>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<BidHistoryResponse>, ApiError> {
    let bid = state
        .bidding
        .get_bid_history(campaign_id, current.0.user_id)
        .await
        .map_err(ApiError::from)?;

    let bids: Vec<_> = bid.into_iter().collect();
    let total = bids.len();
    Ok(Json(BidHistoryResponse { bids, total }))
}
