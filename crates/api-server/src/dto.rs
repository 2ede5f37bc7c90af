//! Request/response DTOs for the bid/ranking/order routes this crate
//! owns, shaped per spec.md §6.

use chrono::{DateTime, Utc};
use flashbid_core::types::{Bid, Order, RankingEntry};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct BidSubmitRequest {
    pub campaign_id: Uuid,
    pub price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BidResponse {
    pub bid_id: Uuid,
    pub campaign_id: Uuid,
    pub price: Decimal,
    pub score: Decimal,
    pub time_elapsed_ms: i64,
    pub bid_number: i32,
    pub rank: i64,
    pub created_at: DateTime<Utc>,
}

impl BidResponse {
    pub fn new(bid: Bid, rank: i64) -> Self {
        Self {
            bid_id: bid.bid_id,
            campaign_id: bid.campaign_id,
            price: bid.price,
            score: bid.score,
            time_elapsed_ms: bid.time_elapsed_ms,
            bid_number: bid.bid_number,
            rank,
            created_at: bid.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BidHistoryResponse {
    pub bids: Vec<Bid>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct RankingsResponse {
    pub rankings: Vec<RankingEntry>,
    pub total_participants: i64,
    pub min_winning_score: Option<f64>,
    pub max_score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct MyRankResponse {
    pub rank: Option<i64>,
    pub score: Option<f64>,
    pub is_winning: bool,
    pub total_participants: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<Order>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct CampaignOrdersResponse {
    pub campaign_id: Uuid,
    pub orders: Vec<Order>,
    pub total: usize,
    pub stock: i64,
    pub is_consistent: bool,
}
