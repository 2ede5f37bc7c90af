//! Tier-3 fallback for the campaign cache (C3, §4.2): a cache miss at
//! tier-1/tier-2 falls through to the durable join of campaign+product
//! and backfills the cache before returning. `flashbid-cache` only owns
//! tier-1/tier-2 (it has no dependency on the durable store), so this
//! orchestration lives at the edge, which is the only layer that talks
//! to both.

use std::str::FromStr;
use std::sync::Arc;

use flashbid_cache::RedisCache;
use flashbid_core::types::CampaignView;
use flashbid_core::EngineError;
use flashbid_db::Db;
use rust_decimal::Decimal;
use uuid::Uuid;

pub async fn resolve_campaign_view(
    db: &Db,
    cache: &RedisCache,
    campaign_id: Uuid,
) -> Result<Arc<CampaignView>, EngineError> {
    if let Some(view) = cache
        .get_campaign_view(campaign_id)
        .await
        .map_err(|e| EngineError::Cache(e.to_string()))?
    {
        return Ok(view);
    }

    let campaign = flashbid_db::campaigns::find_by_id(&db.pool, campaign_id)
        .await
        .map_err(|e| EngineError::Store(e.to_string()))?
        .ok_or(EngineError::CampaignNotFound)?;

    let product = flashbid_db::products::find_by_id(&db.pool, campaign.product_id)
        .await
        .map_err(|e| EngineError::Store(e.to_string()))?
        .ok_or(EngineError::ProductNotFound)?;

    let view = CampaignView {
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

    cache.cache_campaign(&view).await.map_err(|e| EngineError::Cache(e.to_string()))?;
    Ok(Arc::new(view))
}

fn decimal_to_f64(d: Decimal) -> f64 {
    f64::from_str(&d.to_string()).unwrap_or(0.0)
}
