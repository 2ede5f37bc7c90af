use flashbid_core::config::DbConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use tracing::info;

/// Durable store handle (C2/tier-3). Thin wrapper over a `PgPool` so
/// repositories can be constructed with `&Db` rather than threading a
/// raw pool everywhere.
#[derive(Clone)]
pub struct Db {
    pub pool: Arc<PgPool>,
}

impl Db {
    pub async fn connect(config: &DbConfig) -> anyhow::Result<Self> {
        info!(pool_size = config.pool_size, "connecting to postgres");

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect(&config.url)
            .await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        crate::schema::migrate(&self.pool).await
    }
}
