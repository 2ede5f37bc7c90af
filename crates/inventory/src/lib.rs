#![warn(clippy::unwrap_used)]

//! The four-layer anti-overselling primitive (C6), used by settlement
//! (C7) once per winner. Layering: L1 short-TTL distributed lock, L2
//! atomic KV decrement, L3 durable row lock, L4 version-checked update.
//! L3/L4 run inside a single transaction so the row lock covers both.

use async_trait::async_trait;
use flashbid_core::error::EngineError;
use flashbid_core::types::Product;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// L1/L2: the KV-backed lock and atomic decrement. Implemented for
/// `flashbid_cache::RedisCache` in production; fakeable for tests.
#[async_trait]
pub trait StockCache: Send + Sync {
    async fn acquire_lock(&self, product_id: Uuid, ttl_secs: u64) -> anyhow::Result<Option<String>>;
    async fn release_lock(&self, product_id: Uuid, owner_id: &str) -> anyhow::Result<bool>;
    async fn decrement_stock(&self, product_id: Uuid) -> anyhow::Result<i64>;
    async fn increment_stock(&self, product_id: Uuid) -> anyhow::Result<i64>;
}

#[async_trait]
impl StockCache for flashbid_cache::RedisCache {
    async fn acquire_lock(&self, product_id: Uuid, ttl_secs: u64) -> anyhow::Result<Option<String>> {
        flashbid_cache::RedisCache::acquire_lock(self, product_id, ttl_secs).await
    }

    async fn release_lock(&self, product_id: Uuid, owner_id: &str) -> anyhow::Result<bool> {
        flashbid_cache::RedisCache::release_lock(self, product_id, owner_id).await
    }

    async fn decrement_stock(&self, product_id: Uuid) -> anyhow::Result<i64> {
        flashbid_cache::RedisCache::decrement_stock(self, product_id).await
    }

    async fn increment_stock(&self, product_id: Uuid) -> anyhow::Result<i64> {
        flashbid_cache::RedisCache::increment_stock(self, product_id).await
    }
}

/// L3/L4: the durable row lock plus version-checked update.
#[async_trait]
pub trait ProductLedger: Send + Sync {
    async fn decrement_with_row_lock(&self, product_id: Uuid) -> Result<Product, EngineError>;
}

#[async_trait]
impl ProductLedger for flashbid_db::Db {
    async fn decrement_with_row_lock(&self, product_id: Uuid) -> Result<Product, EngineError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;

        let result = flashbid_db::products::decrement_with_row_lock(&mut tx, product_id).await;

        match result {
            Ok(product) => {
                tx.commit().await.map_err(|e| EngineError::Store(e.to_string()))?;
                Ok(product)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }
}

pub const LOCK_TTL_SECS_SETTLEMENT: u64 = 5;

/// Outcome of [`decrement_with_protection`].
pub struct Decremented {
    pub product: Product,
    pub lock_owner: String,
}

/// **DecrementWithProtection(product)** (§4.4). Runs L1–L4 in order;
/// rolls the KV counter back if L3/L4 fails after L2 succeeded. Does
/// NOT release the lock — callers do that explicitly once they've
/// finished using the decremented stock value (e.g. after inserting
/// the order row), via [`release_lock`].
pub async fn decrement_with_protection(
    cache: &Arc<dyn StockCache>,
    ledger: &Arc<dyn ProductLedger>,
    product_id: Uuid,
    lock_ttl_secs: u64,
) -> Result<Decremented, EngineError> {
    let lock_owner = cache
        .acquire_lock(product_id, lock_ttl_secs)
        .await
        .map_err(|e| EngineError::Cache(e.to_string()))?
        .ok_or(EngineError::LockNotAcquired)?;

    let new_stock = cache
        .decrement_stock(product_id)
        .await
        .map_err(|e| EngineError::Cache(e.to_string()))?;

    if new_stock < 0 {
        let _ = cache.release_lock(product_id, &lock_owner).await;
        return Err(EngineError::ConcurrencyConflict);
    }

    match ledger.decrement_with_row_lock(product_id).await {
        Ok(product) => Ok(Decremented {
            product,
            lock_owner,
        }),
        Err(durable_err) => {
            if let Err(rollback_err) = cache.increment_stock(product_id).await {
                warn!(
                    %product_id,
                    error = %rollback_err,
                    "failed to roll back kv stock counter after durable decrement failure"
                );
            }
            let _ = cache.release_lock(product_id, &lock_owner).await;
            Err(durable_err)
        }
    }
}

/// Companion to [`decrement_with_protection`]: releases the product
/// lock only if `owner_id` still holds it.
pub async fn release_lock(cache: &Arc<dyn StockCache>, product_id: Uuid, owner_id: &str) -> Result<bool, EngineError> {
    cache
        .release_lock(product_id, owner_id)
        .await
        .map_err(|e| EngineError::Cache(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeCache {
        locks: Mutex<HashMap<Uuid, String>>,
        stock: Mutex<HashMap<Uuid, i64>>,
    }

    impl FakeCache {
        fn with_stock(product_id: Uuid, stock: i64) -> Self {
            let mut m = HashMap::new();
            m.insert(product_id, stock);
            Self {
                locks: Mutex::new(HashMap::new()),
                stock: Mutex::new(m),
            }
        }
    }

    #[async_trait]
    impl StockCache for FakeCache {
        async fn acquire_lock(&self, product_id: Uuid, _ttl_secs: u64) -> anyhow::Result<Option<String>> {
            let mut locks = self.locks.lock().expect("lock");
            if locks.contains_key(&product_id) {
                return Ok(None);
            }
            let token = Uuid::new_v4().to_string();
            locks.insert(product_id, token.clone());
            Ok(Some(token))
        }

        async fn release_lock(&self, product_id: Uuid, owner_id: &str) -> anyhow::Result<bool> {
            let mut locks = self.locks.lock().expect("lock");
            if locks.get(&product_id).map(|s| s.as_str()) == Some(owner_id) {
                locks.remove(&product_id);
                Ok(true)
            } else {
                Ok(false)
            }
        }

        async fn decrement_stock(&self, product_id: Uuid) -> anyhow::Result<i64> {
            let mut stock = self.stock.lock().expect("lock");
            let entry = stock.entry(product_id).or_insert(0);
            if *entry >= 1 {
                *entry -= 1;
                Ok(*entry)
            } else {
                Ok(-1)
            }
        }

        async fn increment_stock(&self, product_id: Uuid) -> anyhow::Result<i64> {
            let mut stock = self.stock.lock().expect("lock");
            let entry = stock.entry(product_id).or_insert(0);
            *entry += 1;
            Ok(*entry)
        }
    }

    fn fake_product(product_id: Uuid, stock: i64) -> Product {
        Product {
            product_id,
            name: "widget".to_string(),
            description: None,
            stock,
            min_price: Decimal::new(100, 0),
            version: 0,
        }
    }

    struct FakeLedger {
        product_id: Uuid,
        remaining: Mutex<i64>,
        fail: bool,
    }

    #[async_trait]
    impl ProductLedger for FakeLedger {
        async fn decrement_with_row_lock(&self, product_id: Uuid) -> Result<Product, EngineError> {
            if self.fail {
                return Err(EngineError::ConcurrencyConflict);
            }
            let mut remaining = self.remaining.lock().expect("lock");
            if *remaining < 1 {
                return Err(EngineError::ConcurrencyConflict);
            }
            *remaining -= 1;
            Ok(fake_product(product_id, *remaining))
        }
    }

    #[tokio::test]
    async fn successful_decrement_returns_product_and_lock() {
        let product_id = Uuid::new_v4();
        let cache: Arc<dyn StockCache> = Arc::new(FakeCache::with_stock(product_id, 3));
        let ledger: Arc<dyn ProductLedger> = Arc::new(FakeLedger {
            product_id,
            remaining: Mutex::new(3),
            fail: false,
        });

        let result = decrement_with_protection(&cache, &ledger, product_id, 5).await.expect("ok");
        assert_eq!(result.product.stock, 2);
    }

    #[tokio::test]
    async fn kv_exhaustion_returns_concurrency_conflict_without_touching_ledger() {
        let product_id = Uuid::new_v4();
        let cache: Arc<dyn StockCache> = Arc::new(FakeCache::with_stock(product_id, 0));
        let ledger: Arc<dyn ProductLedger> = Arc::new(FakeLedger {
            product_id,
            remaining: Mutex::new(5),
            fail: false,
        });

        let result = decrement_with_protection(&cache, &ledger, product_id, 5).await;
        assert!(matches!(result, Err(EngineError::ConcurrencyConflict)));
    }

    #[tokio::test]
    async fn durable_failure_rolls_back_kv_counter() {
        let product_id = Uuid::new_v4();
        let cache: Arc<dyn StockCache> = Arc::new(FakeCache::with_stock(product_id, 3));
        let ledger: Arc<dyn ProductLedger> = Arc::new(FakeLedger {
            product_id,
            remaining: Mutex::new(0),
            fail: true,
        });

        let result = decrement_with_protection(&cache, &ledger, product_id, 5).await;
        assert!(result.is_err());

        let stock = cache.decrement_stock(product_id).await.expect("decrement");
        // rolled back to 3, then this call decremented it once more to 2
        assert_eq!(stock, 2);
    }

    #[tokio::test]
    async fn second_acquire_while_locked_fails() {
        let product_id = Uuid::new_v4();
        let cache: Arc<dyn StockCache> = Arc::new(FakeCache::with_stock(product_id, 5));
        let first = cache.acquire_lock(product_id, 5).await.expect("ok");
        assert!(first.is_some());
        let second = cache.acquire_lock(product_id, 5).await.expect("ok");
        assert!(second.is_none());
    }
}
