use std::sync::Arc;

use flashbid_bidding::BidService;
use flashbid_cache::RedisCache;
use flashbid_core::config::{AuthConfig, RateLimitConfig};
use flashbid_db::Db;
use flashbid_management::auth::JwtHandler;
use flashbid_realtime::Hub;
use flashbid_settlement::SettlementService;

/// Shared state for every route this crate owns (bids/rankings/orders/ws).
/// Cloned per request — every field is an `Arc` so that's cheap.
#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<Db>,
    pub cache: Arc<RedisCache>,
    pub bidding: Arc<BidService>,
    pub settlement: Arc<SettlementService>,
    pub hub: Arc<Hub>,
    pub jwt: Arc<JwtHandler>,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}
