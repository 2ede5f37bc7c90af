//! Wire events pushed over the per-campaign WebSocket room (C9).

use chrono::{DateTime, Utc};
use flashbid_core::types::RankingEntry;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum WsEvent {
    BidAccepted(BidAcceptedData),
    RankingUpdate(RankingUpdateData),
    CampaignEnded(CampaignEndedData),
}

#[derive(Debug, Clone, Serialize)]
pub struct BidAcceptedData {
    pub bid_id: Uuid,
    pub campaign_id: Uuid,
    pub price: f64,
    pub score: f64,
    pub rank: i64,
    pub time_elapsed_ms: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingUpdateData {
    pub campaign_id: Uuid,
    pub top_k: Vec<RankingEntry>,
    pub total_participants: i64,
    pub min_winning_score: Option<f64>,
    pub max_score: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignEndedData {
    pub campaign_id: Uuid,
    pub is_winner: bool,
    pub final_rank: Option<i32>,
    pub final_score: Option<f64>,
    pub final_price: Option<f64>,
}

impl WsEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
