//! Auth (register/login/me) and admin CRUD (products/campaigns) handlers.
//! Plain axum extractors over a shared `ManagementState`, each returning
//! `Result<Json<_>, ApiError>`.

use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use flashbid_cache::RedisCache;
use flashbid_core::types::{CampaignStats, User};
use flashbid_core::EngineError;
use flashbid_db::Db;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{hash_password, verify_password, JwtHandler};
use crate::dto::{
    CampaignCreateRequest, CampaignDetailResponse, CampaignResponse, LoginRequest,
    ProductListResponse, RegisterRequest, TokenResponse, UserResponse,
};
use crate::error::ApiError;

/// Shared state for every management route. Held behind `Arc` fields so
/// cloning the struct per-request is cheap (axum requires `State: Clone`).
#[derive(Clone)]
pub struct ManagementState {
    pub db: Arc<Db>,
    pub cache: Arc<RedisCache>,
    pub jwt: Arc<JwtHandler>,
}

/// Inserted into request extensions by the API edge's auth middleware
/// once a bearer token has been verified. Handlers that need the caller's
/// identity pull this out instead of re-verifying the token themselves.
#[derive(Clone)]
pub struct AuthenticatedUser(pub User);

pub async fn register(
    State(state): State<ManagementState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let existing = flashbid_db::users::find_by_email(&state.db.pool, &req.email)
        .await
        .map_err(ApiError::from)?;
    if existing.is_some() {
        return Err(ApiError::from(EngineError::EmailTaken));
    }

    let password_hash = hash_password(&req.password).map_err(ApiError::from)?;
    // User weight governs C4's W term; drawn once at registration and
    // immutable thereafter (§3).
    let weight = Decimal::from_f64_retain(random_weight()).unwrap_or(Decimal::ONE);

    let user = flashbid_db::users::create_user(&state.db.pool, &req.email, &password_hash, &req.username, weight)
        .await
        .map_err(ApiError::from)?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

fn random_weight() -> f64 {
    let raw: f64 = rand::thread_rng().gen_range(0.5..=5.0);
    (raw * 100.0).round() / 100.0
}

pub async fn login(
    State(state): State<ManagementState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let found = flashbid_db::users::find_by_email(&state.db.pool, &req.email)
        .await
        .map_err(ApiError::from)?;

    let (user, password_hash) = found.ok_or_else(|| ApiError::from(EngineError::InvalidCredentials))?;

    if !verify_password(&req.password, &password_hash) {
        return Err(ApiError::from(EngineError::InvalidCredentials));
    }
    if !user.status.is_active() {
        return Err(ApiError::from(EngineError::UserDisabled));
    }

    let (access_token, expires_in) = state.jwt.issue(user.user_id, user.is_admin).map_err(ApiError::from)?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in,
    }))
}

pub async fn me(Extension(current): Extension<AuthenticatedUser>) -> Json<UserResponse> {
    Json(UserResponse::from(current.0))
}

pub async fn create_campaign(
    State(state): State<ManagementState>,
    Extension(current): Extension<AuthenticatedUser>,
    Json(req): Json<CampaignCreateRequest>,
) -> Result<(StatusCode, Json<CampaignResponse>), ApiError> {
    if !current.0.is_admin {
        return Err(ApiError::from(EngineError::AdminRequired));
    }
    if req.end_time <= req.start_time {
        return Err(ApiError::from(EngineError::InvalidInput(
            "campaign end_time must be after start_time".to_string(),
        )));
    }

    let product = flashbid_db::products::find_by_id(&state.db.pool, req.product_id)
        .await
        .map_err(ApiError::from)?
        .ok_or(EngineError::ProductNotFound)?;

    let campaign = flashbid_db::campaigns::create_campaign(
        &state.db.pool,
        product.product_id,
        req.start_time,
        req.end_time,
        req.alpha,
        req.beta,
        req.gamma,
    )
    .await
    .map_err(ApiError::from)?;

    let view = flashbid_core::types::CampaignView {
        campaign_id: campaign.campaign_id,
        product_id: campaign.product_id,
        start_time: campaign.start_time,
        end_time: campaign.end_time,
        alpha: decimal_to_f64(campaign.alpha),
        beta: decimal_to_f64(campaign.beta),
        gamma: decimal_to_f64(campaign.gamma),
        min_price: decimal_to_f64(product.min_price),
        quota: campaign.quota,
    };
    state.cache.cache_campaign(&view).await.map_err(ApiError::from)?;

    let now = Utc::now();
    Ok((StatusCode::CREATED, Json(CampaignResponse::from_campaign(&campaign, now))))
}

fn decimal_to_f64(d: Decimal) -> f64 {
    use std::str::FromStr;
    f64::from_str(&d.to_string()).unwrap_or(0.0)
}

pub async fn get_campaign(
    State(state): State<ManagementState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignDetailResponse>, ApiError> {
    let campaign = flashbid_db::campaigns::find_by_id(&state.db.pool, campaign_id)
        .await
        .map_err(ApiError::from)?
        .ok_or(EngineError::CampaignNotFound)?;

    let product = flashbid_db::products::find_by_id(&state.db.pool, campaign.product_id)
        .await
        .map_err(ApiError::from)?
        .ok_or(EngineError::ProductNotFound)?;

    let stats = campaign_stats(&state.cache, campaign_id, campaign.quota).await?;

    let now = Utc::now();
    Ok(Json(CampaignDetailResponse {
        campaign_id: campaign.campaign_id,
        product,
        start_time: campaign.start_time,
        end_time: campaign.end_time,
        alpha: campaign.alpha,
        beta: campaign.beta,
        gamma: campaign.gamma,
        quota: campaign.quota,
        status: campaign.status_at(now),
        stats,
        created_at: campaign.created_at,
    }))
}

/// Reads the 5s stats snapshot cache (§6), falling back to a live
/// leaderboard read on a miss and repopulating the snapshot.
async fn campaign_stats(cache: &RedisCache, campaign_id: Uuid, quota: i32) -> Result<CampaignStats, ApiError> {
    if let Some(stats) = cache.get_cached_stats_snapshot(campaign_id).await.map_err(ApiError::from)? {
        return Ok(stats);
    }

    let (_, stats) = cache
        .get_broadcast_data_with_details(campaign_id, quota.max(1) as i64)
        .await
        .map_err(ApiError::from)?;
    cache.cache_stats_snapshot(campaign_id, &stats).await.map_err(ApiError::from)?;
    Ok(stats)
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

pub async fn list_products(
    State(state): State<ManagementState>,
    Query(page): Query<PageParams>,
) -> Result<Json<ProductListResponse>, ApiError> {
    let mut products = flashbid_db::products::list_products(&state.db.pool)
        .await
        .map_err(ApiError::from)?;
    let total = products.len();

    let end = (page.skip + page.limit).min(products.len());
    let start = page.skip.min(products.len());
    products = products.split_off(start);
    products.truncate(end - start);

    Ok(Json(ProductListResponse { products, total }))
}
