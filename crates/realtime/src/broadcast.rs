//! Broadcast loop (C8): periodically snapshots each active room's
//! leaderboard and fans it out over the hub.

use crate::events::{RankingUpdateData, WsEvent};
use crate::hub::Hub;
use chrono::Utc;
use flashbid_cache::RedisCache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Runs until `shutdown` fires. One pass per `interval` over every
/// campaign currently holding an open connection.
pub async fn run(
    hub: Arc<Hub>,
    cache: Arc<RedisCache>,
    interval: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick(&hub, &cache).await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

async fn tick(hub: &Arc<Hub>, cache: &Arc<RedisCache>) {
    for campaign_id in hub.active_campaigns() {
        let k = match cache.get_campaign_view(campaign_id).await {
            Ok(Some(view)) => view.quota as i64,
            Ok(None) => {
                warn!(%campaign_id, "broadcast loop found no cached campaign for an open room");
                continue;
            }
            Err(e) => {
                warn!(%campaign_id, error = %e, "broadcast loop failed to resolve campaign quota");
                continue;
            }
        };

        match cache.get_broadcast_data_with_details(campaign_id, k).await {
            Ok((top_k, stats)) => {
                let event = WsEvent::RankingUpdate(RankingUpdateData {
                    campaign_id,
                    top_k,
                    total_participants: stats.total_participants,
                    min_winning_score: stats.min_winning_score,
                    max_score: stats.max_score,
                    timestamp: Utc::now(),
                });
                let sent = hub.broadcast(campaign_id, &event.to_json());
                debug!(%campaign_id, sent, "broadcast ranking update");
            }
            Err(e) => {
                warn!(%campaign_id, error = %e, "broadcast loop failed to read leaderboard");
            }
        }
    }
}
