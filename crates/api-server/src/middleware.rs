//! Authentication and rate limiting for the HTTP/WS edge (C10, §4.7).
//! Reads a bearer token from the header or, for the WS handshake, a query
//! parameter, then inserts the resolved claims into request extensions —
//! reading through the `jwt:<hash16>` claims cache and the short-TTL user
//! cache named in §6's KV key layout.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};
use flashbid_cache::RedisCache;
use flashbid_core::config::RateLimitConfig;
use flashbid_core::types::{User, UserStatus};
use flashbid_core::EngineError;
use flashbid_management::auth::{token_cache_key, Claims, JwtHandler};
use flashbid_management::error::ApiError;
use flashbid_management::handlers::AuthenticatedUser;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::state::ApiState;

fn token_from_request(headers: &axum::http::HeaderMap, query: Option<&str>) -> Option<String> {
    let from_header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|t| t.to_string());

    from_header.or_else(|| {
        query.and_then(|q| {
            q.split('&')
                .find(|pair| pair.starts_with("token="))
                .and_then(|pair| pair.split('=').nth(1))
                .map(|t| t.to_string())
        })
    })
}

/// Verifies a bearer token (falling through the `jwt:<hash16>` cache),
/// resolves the corresponding user (falling through the `user:<id>`
/// cache), rejects disabled users, and applies the per-user sliding
/// window before inserting [`AuthenticatedUser`] into request extensions.
/// Route-layered onto every endpoint that requires `bearer` auth in §6.
pub async fn require_auth(State(state): State<ApiState>, mut req: Request, next: Next) -> Result<Response, ApiError> {
    let token = token_from_request(req.headers(), req.uri().query()).ok_or(EngineError::InvalidCredentials)?;

    let claims = resolve_claims(&state.cache, &state.jwt, &token).await?;
    let user = resolve_user(&state.cache, &state.db, claims.sub).await?;

    if !user.status.is_active() {
        return Err(EngineError::UserDisabled.into());
    }

    enforce_rate_limit(&state.cache, &state.rate_limit, &format!("ratelimit:user:{}", user.user_id)).await?;

    req.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(req).await)
}

async fn resolve_claims(cache: &RedisCache, jwt: &JwtHandler, token: &str) -> Result<Claims, ApiError> {
    let cache_key = token_cache_key(token);

    if let Some(json) = cache.get_cached_jwt_claims(&cache_key).await.map_err(ApiError::from)? {
        if let Ok(claims) = serde_json::from_str::<Claims>(&json) {
            return Ok(claims);
        }
    }

    let claims = jwt.verify(token).map_err(|_| EngineError::InvalidCredentials)?;
    if let Ok(json) = serde_json::to_string(&claims) {
        let _ = cache.cache_jwt_claims(&cache_key, &json).await;
    }
    Ok(claims)
}

async fn resolve_user(cache: &RedisCache, db: &flashbid_db::Db, user_id: Uuid) -> Result<User, ApiError> {
    if let Some(fields) = cache.get_cached_user(user_id).await.map_err(ApiError::from)? {
        if let Some(user) = user_from_cache_fields(user_id, &fields) {
            return Ok(user);
        }
    }

    let user = flashbid_db::users::find_by_id(&db.pool, user_id)
        .await
        .map_err(ApiError::from)?
        .ok_or(EngineError::InvalidCredentials)?;

    let _ = cache
        .cache_user(
            user_id,
            &[
                ("email", user.email.clone()),
                ("username", user.username.clone()),
                ("weight", user.weight.to_string()),
                ("status", status_str(user.status).to_string()),
                ("is_admin", user.is_admin.to_string()),
                ("created_at", user.created_at.to_rfc3339()),
            ],
        )
        .await;

    Ok(user)
}

fn status_str(status: UserStatus) -> &'static str {
    match status {
        UserStatus::Active => "active",
        UserStatus::Disabled => "disabled",
    }
}

fn user_from_cache_fields(user_id: Uuid, fields: &HashMap<String, String>) -> Option<User> {
    Some(User {
        user_id,
        email: fields.get("email")?.clone(),
        username: fields.get("username")?.clone(),
        weight: fields.get("weight")?.parse::<Decimal>().ok()?,
        status: match fields.get("status")?.as_str() {
            "active" => UserStatus::Active,
            "disabled" => UserStatus::Disabled,
            _ => return None,
        },
        is_admin: fields.get("is_admin")?.parse().ok()?,
        created_at: fields.get("created_at")?.parse::<DateTime<Utc>>().ok()?,
    })
}

async fn enforce_rate_limit(cache: &RedisCache, config: &RateLimitConfig, bucket_key: &str) -> Result<(), ApiError> {
    let now_ms = Utc::now().timestamp_millis();
    let count = cache
        .rate_limit_hit(bucket_key, now_ms, config.window_secs)
        .await
        .map_err(ApiError::from)?;

    if count > config.max_requests_per_window as i64 {
        return Err(EngineError::RateLimited {
            retry_after_secs: config.window_secs.max(0) as u64,
        }
        .into());
    }
    Ok(())
}

/// Per-IP sliding window applied to every request, authenticated or not
/// (§5 "the edge layer is rate-limited — per-IP and per-user").
pub async fn rate_limit_by_ip(
    State(state): State<ApiState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bucket_key = format!("ratelimit:ip:{}", addr.ip());
    enforce_rate_limit(&state.cache, &state.rate_limit, &bucket_key).await?;
    Ok(next.run(req).await)
}

/// Used only by the WS handshake, which authenticates via a query
/// parameter rather than a header and maps failures to close codes
/// instead of HTTP statuses.
pub async fn verify_ws_token(
    cache: &Arc<RedisCache>,
    jwt: &Arc<JwtHandler>,
    db: &Arc<flashbid_db::Db>,
    token: &str,
) -> Option<User> {
    let claims = resolve_claims(cache, jwt, token).await.ok()?;
    let user = resolve_user(cache, db, claims.sub).await.ok()?;
    if !user.status.is_active() {
        return None;
    }
    Some(user)
}
