//! Request/response DTOs for the management (auth + admin CRUD) routes,
//! shaped exactly per spec.md §6.

use chrono::{DateTime, Utc};
use flashbid_core::types::{Campaign, CampaignStats, CampaignStatus, Product, User};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    pub weight: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            email: u.email,
            username: u.username,
            weight: u.weight,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<Product>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct CampaignCreateRequest {
    pub product_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub alpha: Decimal,
    pub beta: Decimal,
    pub gamma: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CampaignResponse {
    pub campaign_id: Uuid,
    pub product_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub alpha: Decimal,
    pub beta: Decimal,
    pub gamma: Decimal,
    pub quota: i32,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
}

impl CampaignResponse {
    pub fn from_campaign(c: &Campaign, now: DateTime<Utc>) -> Self {
        Self {
            campaign_id: c.campaign_id,
            product_id: c.product_id,
            start_time: c.start_time,
            end_time: c.end_time,
            alpha: c.alpha,
            beta: c.beta,
            gamma: c.gamma,
            quota: c.quota,
            status: c.status_at(now),
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CampaignDetailResponse {
    pub campaign_id: Uuid,
    pub product: Product,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub alpha: Decimal,
    pub beta: Decimal,
    pub gamma: Decimal,
    pub quota: i32,
    pub status: CampaignStatus,
    pub stats: CampaignStats,
    pub created_at: DateTime<Utc>,
}
