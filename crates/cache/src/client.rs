//! Redis-backed KV/ranking store (C1) and three-tier campaign cache (C3).
//!
//! Two tiers live here: tier-1 is the process-local [`LocalCache`], tier-2
//! is this Redis client. Tier-3 (the durable store) is the caller's
//! responsibility — on a tier-2 miss the caller reads `flashbid-db` and
//! calls [`RedisCache::cache_campaign`] to backfill.

use crate::local::LocalCache;
use flashbid_core::config::RedisConfig;
use flashbid_core::types::{CampaignStats, CampaignView, RankingEntry};
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const DECREMENT_STOCK_SCRIPT: &str = r#"
local stock = tonumber(redis.call("GET", KEYS[1]))
if stock and stock >= 1 then
    return redis.call("DECR", KEYS[1])
else
    return -1
end
"#;

const RELEASE_LOCK_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

const UPDATE_MAX_PRICE_SCRIPT: &str = r#"
local key = KEYS[1]
local new_price = tonumber(ARGV[1])
local current = tonumber(redis.call('GET', key) or '0')
if new_price > current then
    redis.call('SET', key, ARGV[1])
    return 1
end
return 0
"#;

/// A ranking row as read back off the wire, before `username`/`price`
/// enrichment from the details hash.
#[derive(Debug, Clone)]
struct RawRankingEntry {
    user_id: Uuid,
    score: f64,
}

/// Redis-backed distributed store, fronted by a local tier-1 cache for
/// campaign parameters.
pub struct RedisCache {
    client: redis::Client,
    local: Arc<LocalCache>,
    tier2_ttl_secs: u64,
    user_cache_ttl_secs: u64,
    stats_snapshot_ttl_secs: u64,
}

impl RedisCache {
    pub async fn new(config: &RedisConfig, cache: &flashbid_core::config::CacheConfig) -> anyhow::Result<Self> {
        info!(url = %config.url, "connecting to redis");

        let client = redis::Client::open(config.url.as_str())?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!(response = %pong, "redis connection established");

        let local = Arc::new(LocalCache::new(
            cache.tier1_ttl_secs,
            cache.tier1_capacity as usize,
        ));

        Ok(Self {
            client,
            local,
            tier2_ttl_secs: cache.tier2_ttl_secs,
            user_cache_ttl_secs: 120,
            stats_snapshot_ttl_secs: cache.stats_snapshot_ttl_secs,
        })
    }

    async fn conn(&self) -> anyhow::Result<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    // ==================== Ranking operations (C1) ====================

    fn bid_key(campaign_id: Uuid) -> String {
        format!("bid:{campaign_id}")
    }

    fn bid_details_key(campaign_id: Uuid, user_id: Uuid) -> String {
        format!("bid_details:{campaign_id}:{user_id}")
    }

    /// Combines ZADD + HSET + ZREVRANK into a single pipeline round trip.
    pub async fn update_ranking_and_get_rank(
        &self,
        campaign_id: Uuid,
        user_id: Uuid,
        score: f64,
        price: Option<f64>,
        username: Option<&str>,
    ) -> anyhow::Result<Option<i64>> {
        let key = Self::bid_key(campaign_id);
        let details_key = Self::bid_details_key(campaign_id, user_id);
        let mut conn = self.conn().await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("ZADD").arg(&key).arg(score).arg(user_id.to_string());

        if price.is_some() || username.is_some() {
            let mut hset = pipe.cmd("HSET");
            hset.arg(&details_key);
            if let Some(p) = price {
                hset.arg("price").arg(p.to_string());
            }
            if let Some(u) = username {
                hset.arg("username").arg(u);
            }
        }

        pipe.cmd("ZREVRANK").arg(&key).arg(user_id.to_string());

        let results: Vec<redis::Value> = pipe.query_async(&mut conn).await?;
        let rank_value = results.last().cloned().unwrap_or(redis::Value::Nil);
        let rank: Option<i64> = redis::FromRedisValue::from_redis_value(&rank_value)?;
        Ok(rank.map(|r| r + 1))
    }

    /// Tie-break (§4.5): Redis orders a sorted set by score ascending,
    /// then by member lexicographically ascending for equal scores.
    /// `ZREVRANGE` returns that whole ordering reversed, so tied members
    /// come back in *descending* lexicographic order of user id (e.g. a
    /// higher UUID ranks above a lower one at the same score) — not the
    /// ascending order the ranking set's insertion order might suggest.
    /// This is deterministic and is the engine's canonical tie-break;
    /// every top-K/rank read goes through this same command so the
    /// ordering is consistent end to end.
    pub async fn get_top_k(&self, campaign_id: Uuid, k: i64) -> anyhow::Result<Vec<RankingEntry>> {
        let key = Self::bid_key(campaign_id);
        let mut conn = self.conn().await?;

        let raw: Vec<(String, f64)> = conn.zrevrange_withscores(&key, 0, (k - 1).max(0)).await?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for (user_id, _) in &raw {
            pipe.hgetall(format!("bid_details:{campaign_id}:{user_id}"));
        }
        let details: Vec<std::collections::HashMap<String, String>> =
            pipe.query_async(&mut conn).await?;

        Ok(Self::zip_details(raw, details))
    }

    fn zip_details(
        raw: Vec<(String, f64)>,
        details: Vec<std::collections::HashMap<String, String>>,
    ) -> Vec<RankingEntry> {
        raw.into_iter()
            .zip(details)
            .enumerate()
            .filter_map(|(i, ((user_id, score), detail))| {
                let user_id = Uuid::parse_str(&user_id).ok()?;
                Some(RankingEntry {
                    rank: i as i64 + 1,
                    user_id,
                    username: detail.get("username").cloned(),
                    score,
                    price: detail.get("price").and_then(|p| p.parse::<f64>().ok()),
                })
            })
            .collect()
    }

    /// Same `ZREVRANK` tie-break as [`Self::get_top_k`]: ties resolve by
    /// descending lexicographic user id.
    pub async fn get_user_rank(&self, campaign_id: Uuid, user_id: Uuid) -> anyhow::Result<Option<i64>> {
        let key = Self::bid_key(campaign_id);
        let mut conn = self.conn().await?;
        let rank: Option<i64> = conn.zrevrank(&key, user_id.to_string()).await?;
        Ok(rank.map(|r| r + 1))
    }

    pub async fn get_user_score(&self, campaign_id: Uuid, user_id: Uuid) -> anyhow::Result<Option<f64>> {
        let key = Self::bid_key(campaign_id);
        let mut conn = self.conn().await?;
        let score: Option<f64> = conn.zscore(&key, user_id.to_string()).await?;
        Ok(score)
    }

    pub async fn get_total_participants(&self, campaign_id: Uuid) -> anyhow::Result<i64> {
        let key = Self::bid_key(campaign_id);
        let mut conn = self.conn().await?;
        let count: i64 = conn.zcard(&key).await?;
        Ok(count)
    }

    /// Stats + top-K in a single pipeline round trip (§4.6/§4.7). Same
    /// `ZREVRANGE` tie-break as [`Self::get_top_k`].
    pub async fn get_broadcast_data(
        &self,
        campaign_id: Uuid,
        k: i64,
    ) -> anyhow::Result<(Vec<RawRankingEntry>, CampaignStats)> {
        let key = Self::bid_key(campaign_id);
        let mut conn = self.conn().await?;

        let mut pipe = redis::pipe();
        pipe.cmd("ZREVRANGE")
            .arg(&key)
            .arg(0)
            .arg((k - 1).max(0))
            .arg("WITHSCORES");
        pipe.cmd("ZCARD").arg(&key);
        pipe.cmd("ZREVRANGE")
            .arg(&key)
            .arg(k - 1)
            .arg(k - 1)
            .arg("WITHSCORES");
        pipe.cmd("ZREVRANGE").arg(&key).arg(0).arg(0).arg("WITHSCORES");

        let (top_k_raw, total, min_winning_raw, max_raw): (
            Vec<(String, f64)>,
            i64,
            Vec<(String, f64)>,
            Vec<(String, f64)>,
        ) = pipe.query_async(&mut conn).await?;

        let entries = top_k_raw
            .into_iter()
            .filter_map(|(uid, score)| {
                Uuid::parse_str(&uid).ok().map(|user_id| RawRankingEntry { user_id, score })
            })
            .collect();

        let stats = CampaignStats {
            total_participants: total,
            max_score: max_raw.first().map(|(_, s)| *s),
            min_winning_score: min_winning_raw.first().map(|(_, s)| *s),
        };

        Ok((entries, stats))
    }

    /// Two-round-trip version of [`Self::get_broadcast_data`] that also
    /// enriches each top-K entry with its bid details hash.
    pub async fn get_broadcast_data_with_details(
        &self,
        campaign_id: Uuid,
        k: i64,
    ) -> anyhow::Result<(Vec<RankingEntry>, CampaignStats)> {
        let (raw, stats) = self.get_broadcast_data(campaign_id, k).await?;
        if raw.is_empty() {
            return Ok((Vec::new(), stats));
        }

        let mut conn = self.conn().await?;
        let mut pipe = redis::pipe();
        for entry in &raw {
            pipe.hgetall(format!("bid_details:{campaign_id}:{}", entry.user_id));
        }
        let details: Vec<std::collections::HashMap<String, String>> =
            pipe.query_async(&mut conn).await?;

        let entries = raw
            .into_iter()
            .zip(details)
            .enumerate()
            .map(|(i, (entry, detail))| RankingEntry {
                rank: i as i64 + 1,
                user_id: entry.user_id,
                username: detail.get("username").cloned(),
                score: entry.score,
                price: detail.get("price").and_then(|p| p.parse::<f64>().ok()),
            })
            .collect();

        Ok((entries, stats))
    }

    // ==================== Inventory operations (C6) ====================

    fn stock_key(product_id: Uuid) -> String {
        format!("stock:{product_id}")
    }

    pub async fn init_stock(&self, product_id: Uuid, quantity: i64) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;
        conn.set::<_, _, ()>(Self::stock_key(product_id), quantity).await?;
        Ok(())
    }

    pub async fn get_stock(&self, product_id: Uuid) -> anyhow::Result<i64> {
        let mut conn = self.conn().await?;
        let stock: Option<i64> = conn.get(Self::stock_key(product_id)).await?;
        Ok(stock.unwrap_or(0))
    }

    /// Atomically decrements stock via Lua, returning -1 if insufficient.
    pub async fn decrement_stock(&self, product_id: Uuid) -> anyhow::Result<i64> {
        let mut conn = self.conn().await?;
        let script = redis::Script::new(DECREMENT_STOCK_SCRIPT);
        let result: i64 = script.key(Self::stock_key(product_id)).invoke_async(&mut conn).await?;
        Ok(result)
    }

    pub async fn increment_stock(&self, product_id: Uuid) -> anyhow::Result<i64> {
        let mut conn = self.conn().await?;
        let result: i64 = conn.incr(Self::stock_key(product_id), 1).await?;
        Ok(result)
    }

    // ==================== Distributed lock operations (C6) ====================

    fn lock_key(product_id: Uuid) -> String {
        format!("lock:product:{product_id}")
    }

    /// `SET NX EX` lock acquisition. Returns the generated owner token on
    /// success.
    pub async fn acquire_lock(&self, product_id: Uuid, ttl_secs: u64) -> anyhow::Result<Option<String>> {
        let owner_id = Uuid::new_v4().to_string();
        let mut conn = self.conn().await?;
        let acquired: Option<String> = redis::cmd("SET")
            .arg(Self::lock_key(product_id))
            .arg(&owner_id)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(acquired.map(|_| owner_id))
    }

    /// Releases the lock only if `owner_id` still holds it.
    pub async fn release_lock(&self, product_id: Uuid, owner_id: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn().await?;
        let script = redis::Script::new(RELEASE_LOCK_SCRIPT);
        let result: i64 = script
            .key(Self::lock_key(product_id))
            .arg(owner_id)
            .invoke_async(&mut conn)
            .await?;
        Ok(result == 1)
    }

    // ==================== Campaign cache (C3 tier-2) ====================

    fn campaign_key(campaign_id: Uuid) -> String {
        format!("campaign:{campaign_id}")
    }

    /// Fetch a campaign view, checking tier-1 first, falling through to
    /// tier-2. Returns `None` on a full miss — the caller is responsible
    /// for the tier-3 read and the [`Self::cache_campaign`] backfill.
    pub async fn get_campaign_view(&self, campaign_id: Uuid) -> anyhow::Result<Option<Arc<CampaignView>>> {
        if let Some(view) = self.local.get(&campaign_id.to_string()) {
            metrics::counter!("cache.tier1.hit").increment(1);
            return Ok(Some(view));
        }
        metrics::counter!("cache.tier1.miss").increment(1);

        let mut conn = self.conn().await?;
        let data: std::collections::HashMap<String, String> =
            conn.hgetall(Self::campaign_key(campaign_id)).await?;

        if data.is_empty() {
            metrics::counter!("cache.tier2.miss").increment(1);
            debug!(%campaign_id, "campaign cache miss");
            return Ok(None);
        }
        metrics::counter!("cache.tier2.hit").increment(1);

        let view = Self::parse_campaign_view(campaign_id, &data)?;
        let view = Arc::new(view);
        self.local.put_arc(campaign_id.to_string(), Arc::clone(&view));
        Ok(Some(view))
    }

    fn parse_campaign_view(
        campaign_id: Uuid,
        data: &std::collections::HashMap<String, String>,
    ) -> anyhow::Result<CampaignView> {
        use anyhow::Context;

        let get = |k: &str| data.get(k).cloned().context(format!("missing field {k}"));
        Ok(CampaignView {
            campaign_id,
            product_id: Uuid::parse_str(&get("product_id")?)?,
            start_time: get("start_time")?.parse()?,
            end_time: get("end_time")?.parse()?,
            alpha: get("alpha")?.parse()?,
            beta: get("beta")?.parse()?,
            gamma: get("gamma")?.parse()?,
            min_price: get("min_price")?.parse()?,
            quota: get("quota")?.parse()?,
        })
    }

    /// Writes through both tiers.
    pub async fn cache_campaign(&self, view: &CampaignView) -> anyhow::Result<()> {
        let key = Self::campaign_key(view.campaign_id);
        let fields: Vec<(&str, String)> = vec![
            ("product_id", view.product_id.to_string()),
            ("start_time", view.start_time.to_rfc3339()),
            ("end_time", view.end_time.to_rfc3339()),
            ("alpha", view.alpha.to_string()),
            ("beta", view.beta.to_string()),
            ("gamma", view.gamma.to_string()),
            ("min_price", view.min_price.to_string()),
            ("quota", view.quota.to_string()),
        ];

        let mut conn = self.conn().await?;
        let mut pipe = redis::pipe();
        pipe.cmd("HSET").arg(&key).arg(fields);
        pipe.cmd("EXPIRE").arg(&key).arg(self.tier2_ttl_secs);
        let _: () = pipe.query_async(&mut conn).await?;

        self.local.put(view.campaign_id.to_string(), view.clone());
        Ok(())
    }

    pub async fn invalidate_campaign_cache(&self, campaign_id: Uuid) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;
        let _: i64 = conn.del(Self::campaign_key(campaign_id)).await?;
        self.local.invalidate(&campaign_id.to_string());
        Ok(())
    }

    // ==================== Max-price cache ====================

    fn max_price_key(campaign_id: Uuid) -> String {
        format!("campaign:{campaign_id}:max_price")
    }

    /// Fire-and-forget CAS update; never blocks bid acceptance on failure.
    pub async fn update_max_price(&self, campaign_id: Uuid, price: f64) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;
        let script = redis::Script::new(UPDATE_MAX_PRICE_SCRIPT);
        let _: i64 = script
            .key(Self::max_price_key(campaign_id))
            .arg(price.to_string())
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn get_max_price(&self, campaign_id: Uuid) -> anyhow::Result<Option<f64>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(Self::max_price_key(campaign_id)).await?;
        Ok(value.and_then(|v| v.parse().ok()))
    }

    // ==================== User cache ====================

    fn user_key(user_id: Uuid) -> String {
        format!("user:{user_id}")
    }

    pub async fn cache_user(&self, user_id: Uuid, fields: &[(&str, String)]) -> anyhow::Result<()> {
        let key = Self::user_key(user_id);
        let mut conn = self.conn().await?;
        let mut pipe = redis::pipe();
        pipe.cmd("HSET").arg(&key).arg(fields.to_vec());
        pipe.cmd("EXPIRE").arg(&key).arg(self.user_cache_ttl_secs);
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    pub async fn get_cached_user(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Option<std::collections::HashMap<String, String>>> {
        let mut conn = self.conn().await?;
        let data: std::collections::HashMap<String, String> =
            conn.hgetall(Self::user_key(user_id)).await?;
        Ok(if data.is_empty() { None } else { Some(data) })
    }

    pub async fn invalidate_user_cache(&self, user_id: Uuid) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;
        let _: i64 = conn.del(Self::user_key(user_id)).await?;
        Ok(())
    }

    // ==================== Stats snapshot cache ====================

    fn stats_snapshot_key(campaign_id: Uuid) -> String {
        format!("campaign_stats_snapshot:{campaign_id}")
    }

    pub async fn cache_stats_snapshot(&self, campaign_id: Uuid, stats: &CampaignStats) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;
        let json = serde_json::to_string(stats)?;
        conn.set_ex::<_, _, ()>(Self::stats_snapshot_key(campaign_id), json, self.stats_snapshot_ttl_secs)
            .await?;
        Ok(())
    }

    pub async fn get_cached_stats_snapshot(&self, campaign_id: Uuid) -> anyhow::Result<Option<CampaignStats>> {
        let mut conn = self.conn().await?;
        let data: Option<String> = conn.get(Self::stats_snapshot_key(campaign_id)).await?;
        Ok(match data {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }

    // ==================== JWT claims cache ====================

    const JWT_CACHE_TTL_SECS: u64 = 10;

    fn jwt_key(cache_key: &str) -> String {
        cache_key.to_string()
    }

    /// Caches a verified token's claims under its `jwt:<hash16>` key (§6)
    /// so the edge doesn't re-verify the signature on every request.
    pub async fn cache_jwt_claims(&self, cache_key: &str, claims_json: &str) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(Self::jwt_key(cache_key), claims_json, Self::JWT_CACHE_TTL_SECS)
            .await?;
        Ok(())
    }

    pub async fn get_cached_jwt_claims(&self, cache_key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn().await?;
        let data: Option<String> = conn.get(Self::jwt_key(cache_key)).await?;
        Ok(data)
    }

    // ==================== Rate limiting ====================

    /// Sliding-window counter over a sorted set: each call adds a member
    /// keyed by a monotonic sequence and trims everything outside
    /// `window_secs`, returning the count remaining in-window.
    pub async fn rate_limit_hit(
        &self,
        bucket_key: &str,
        now_ms: i64,
        window_secs: i64,
    ) -> anyhow::Result<i64> {
        let mut conn = self.conn().await?;
        let window_start = now_ms - window_secs * 1000;
        let member = format!("{now_ms}-{}", Uuid::new_v4());

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("ZREMRANGEBYSCORE").arg(bucket_key).arg(0).arg(window_start);
        pipe.cmd("ZADD").arg(bucket_key).arg(now_ms).arg(&member);
        pipe.cmd("ZCARD").arg(bucket_key);
        pipe.cmd("EXPIRE").arg(bucket_key).arg(window_secs);

        let (_, _, count, _): (i64, i64, i64, i64) = pipe.query_async(&mut conn).await?;
        Ok(count)
    }

    pub async fn maintenance(&self) {
        let evicted = self.local.evict_expired();
        if evicted > 0 {
            debug!(evicted, "tier-1 cache eviction complete");
        }
    }

    pub fn local_cache_size(&self) -> usize {
        self.local.len()
    }
}
