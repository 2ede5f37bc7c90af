//! In-process cache backed by DashMap for lock-free concurrent access.
//! Serves as tier-1 cache in front of Redis to reduce network round trips
//! on the campaign cache read path (C3).

use dashmap::DashMap;
use flashbid_core::types::CampaignView;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct CacheEntry {
    view: Arc<CampaignView>,
    inserted_at: Instant,
    last_accessed: Instant,
}

/// Lock-free local cache for frequently read campaign parameters.
/// Returns `Arc<CampaignView>` to avoid cloning on every cache hit.
pub struct LocalCache {
    store: Arc<DashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl LocalCache {
    pub fn new(ttl_secs: u64, max_entries: usize) -> Self {
        Self {
            store: Arc::new(DashMap::with_capacity(max_entries)),
            ttl: Duration::from_secs(ttl_secs),
            max_entries,
        }
    }

    /// Get a campaign view from the local cache, `None` if expired or missing.
    /// Touches the entry's recency so it survives the next LRU eviction.
    pub fn get(&self, campaign_id: &str) -> Option<Arc<CampaignView>> {
        let mut entry = self.store.get_mut(campaign_id)?;
        if entry.inserted_at.elapsed() > self.ttl {
            drop(entry);
            self.store.remove(campaign_id);
            return None;
        }
        entry.last_accessed = Instant::now();
        Some(Arc::clone(&entry.view))
    }

    /// Insert or update a campaign view in the local cache.
    pub fn put(&self, campaign_id: String, view: CampaignView) {
        self.put_arc(campaign_id, Arc::new(view));
    }

    /// Insert or update with a pre-wrapped Arc (avoids double-Arc on L2 backfill).
    pub fn put_arc(&self, campaign_id: String, view: Arc<CampaignView>) {
        if self.store.len() >= self.max_entries && !self.store.contains_key(&campaign_id) {
            self.evict_lru();
        }
        let now = Instant::now();
        self.store.insert(
            campaign_id,
            CacheEntry {
                view,
                inserted_at: now,
                last_accessed: now,
            },
        );
    }

    /// Drop a single campaign from the local tier, e.g. after settlement.
    pub fn invalidate(&self, campaign_id: &str) {
        self.store.remove(campaign_id);
    }

    /// Evicts the least-recently-used entry so a full tier-1 always has
    /// room for the new insert (§4.2: "Eviction by LRU on insert when
    /// full"). Scans for the oldest `last_accessed`, which also happens
    /// to be the most likely already-expired entry, but evicts it either
    /// way — a cache full of still-live entries must not refuse
    /// admission to a newly-read campaign.
    fn evict_lru(&self) {
        let mut oldest: Option<(String, Instant)> = None;
        for entry in self.store.iter() {
            let accessed = entry.value().last_accessed;
            if oldest.as_ref().map(|(_, t)| accessed < *t).unwrap_or(true) {
                oldest = Some((entry.key().clone(), accessed));
            }
        }
        if let Some((key, _)) = oldest {
            self.store.remove(&key);
        }
    }

    /// Remove expired entries. Call this periodically from a background task.
    pub fn evict_expired(&self) -> usize {
        let before = self.store.len();
        self.store
            .retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        before - self.store.len()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_view() -> CampaignView {
        CampaignView {
            campaign_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            alpha: 1.0,
            beta: 1000.0,
            gamma: 100.0,
            min_price: 10.0,
            quota: 5,
        }
    }

    #[test]
    fn put_then_get_hits() {
        let cache = LocalCache::new(60, 10);
        let view = sample_view();
        let id = view.campaign_id.to_string();
        cache.put(id.clone(), view);
        assert!(cache.get(&id).is_some());
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let cache = LocalCache::new(0, 10);
        let view = sample_view();
        let id = view.campaign_id.to_string();
        cache.put(id.clone(), view);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&id).is_none());
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = LocalCache::new(60, 10);
        let view = sample_view();
        let id = view.campaign_id.to_string();
        cache.put(id.clone(), view);
        cache.invalidate(&id);
        assert!(cache.get(&id).is_none());
    }

    #[test]
    fn full_cache_evicts_least_recently_used_and_still_admits_new_entry() {
        let cache = LocalCache::new(60, 2);

        let a = sample_view();
        let a_id = a.campaign_id.to_string();
        cache.put(a_id.clone(), a);

        let b = sample_view();
        let b_id = b.campaign_id.to_string();
        cache.put(b_id.clone(), b);

        // touch `a` so `b` becomes the least recently used entry
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get(&a_id).is_some());

        let c = sample_view();
        let c_id = c.campaign_id.to_string();
        cache.put(c_id.clone(), c);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&a_id).is_some(), "recently used entry should survive eviction");
        assert!(cache.get(&b_id).is_none(), "least recently used entry should be evicted");
        assert!(cache.get(&c_id).is_some(), "new entry must be admitted, not refused");
    }
}
