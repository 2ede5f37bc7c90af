use axum::extract::{Extension, Path, State};
use axum::Json;
use flashbid_management::error::ApiError;
use flashbid_management::handlers::AuthenticatedUser;
use uuid::Uuid;

use crate::campaign_view::resolve_campaign_view;
use crate::dto::{MyRankResponse, RankingsResponse};
use crate::state::ApiState;

/// `GET /rankings/{campaign_id}` (none) — §4.6/§6.
pub async fn rankings(
    State(state): State<ApiState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<RankingsResponse>, ApiError> {
    let view = resolve_campaign_view(&state.db, &state.cache, campaign_id).await.map_err(ApiError::from)?;

    let (rankings, stats) = state
        .cache
        .get_broadcast_data_with_details(campaign_id, view.quota as i64)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(RankingsResponse {
        rankings,
        total_participants: stats.total_participants,
        min_winning_score: stats.min_winning_score,
        max_score: stats.max_score,
    }))
}

/// `GET /rankings/{campaign_id}/me` (bearer) — §6. `is_winning` compares
/// the caller's rank against the campaign's quota, per the resolved
/// open question that `quota` (not live stock) governs winner status.
pub async fn my_rank(
    State(state): State<ApiState>,
    Extension(current): Extension<AuthenticatedUser>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<MyRankResponse>, ApiError> {
    let view = resolve_campaign_view(&state.db, &state.cache, campaign_id).await.map_err(ApiError::from)?;

    let rank = state
        .cache
        .get_user_rank(campaign_id, current.0.user_id)
        .await
        .map_err(ApiError::from)?;
    let score = state
        .cache
        .get_user_score(campaign_id, current.0.user_id)
        .await
        .map_err(ApiError::from)?;
    let total_participants = state.cache.get_total_participants(campaign_id).await.map_err(ApiError::from)?;

    let is_winning = rank.map(|r| r <= view.quota as i64).unwrap_or(false);

    Ok(Json(MyRankResponse {
        rank,
        score,
        is_winning,
        total_participants,
    }))
}
