//! Domain types shared across every crate: users, products, campaigns,
//! bids, orders, and the leaderboard entries read back out of the KV store.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered bidder. `weight` is assigned at creation and immutable
/// thereafter (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    pub weight: Decimal,
    pub status: UserStatus,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Disabled,
}

impl UserStatus {
    pub fn is_active(self) -> bool {
        matches!(self, UserStatus::Active)
    }
}

/// A single product sold across one or more campaigns. `version` backs
/// the optimistic-concurrency check in the four-layer decrement (C6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub product_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub stock: i64,
    pub min_price: Decimal,
    pub version: i64,
}

/// A timed sale of `quota` units of one product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub campaign_id: Uuid,
    pub product_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub alpha: Decimal,
    pub beta: Decimal,
    pub gamma: Decimal,
    /// Quota snapshotted from product.stock at creation time. Used for
    /// winner selection, even post-settlement once stock hits zero.
    pub quota: i32,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Pending,
    Active,
    Ended,
}

impl Campaign {
    /// Status derived from wall-clock time, per §3.
    pub fn status_at(&self, now: DateTime<Utc>) -> CampaignStatus {
        if now < self.start_time {
            CampaignStatus::Pending
        } else if now >= self.end_time {
            CampaignStatus::Ended
        } else {
            CampaignStatus::Active
        }
    }

    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time).num_milliseconds().max(0)
    }
}

/// Parameters resolved for scoring/validation, as returned by the
/// three-tier campaign cache (C3). Pre-parsed: decimals as f64,
/// instants as `DateTime<Utc>`, exactly as §4.2 requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignView {
    pub campaign_id: Uuid,
    pub product_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub min_price: f64,
    pub quota: i32,
}

impl CampaignView {
    /// Status derived from wall-clock time, per §3. Mirrors
    /// `Campaign::status_at`.
    pub fn status_at(&self, now: DateTime<Utc>) -> CampaignStatus {
        if now < self.start_time {
            CampaignStatus::Pending
        } else if now >= self.end_time {
            CampaignStatus::Ended
        } else {
            CampaignStatus::Active
        }
    }
}

/// A user's latest accepted bid in a campaign — the unique
/// (campaign_id, user_id) row described in §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub bid_id: Uuid,
    pub campaign_id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub price: Decimal,
    pub score: Decimal,
    pub time_elapsed_ms: i64,
    pub bid_number: i32,
    pub created_at: DateTime<Utc>,
}

/// A confirmed (or pending) purchase created by settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub campaign_id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub final_price: Decimal,
    pub final_score: Decimal,
    pub final_rank: i32,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
}

/// One row of a leaderboard snapshot — the unit returned by the
/// ranking set read-back (§4.2/§4.6) and broadcast over the websocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingEntry {
    pub rank: i64,
    pub user_id: Uuid,
    pub username: Option<String>,
    pub score: f64,
    pub price: Option<f64>,
}

/// Aggregate leaderboard statistics, composed by C8's broadcast loop
/// and C5/C7's ranking reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignStats {
    pub total_participants: i64,
    pub max_score: Option<f64>,
    pub min_winning_score: Option<f64>,
}
