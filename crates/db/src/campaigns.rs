use chrono::{DateTime, Utc};
use flashbid_core::types::{Campaign, CampaignStatus};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct CampaignRow {
    campaign_id: Uuid,
    product_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    alpha: Decimal,
    beta: Decimal,
    gamma: Decimal,
    quota: i32,
    status: String,
    created_at: DateTime<Utc>,
}

impl CampaignRow {
    fn into_campaign(self) -> anyhow::Result<Campaign> {
        Ok(Campaign {
            campaign_id: self.campaign_id,
            product_id: self.product_id,
            start_time: self.start_time,
            end_time: self.end_time,
            alpha: self.alpha,
            beta: self.beta,
            gamma: self.gamma,
            quota: self.quota,
            status: parse_status(&self.status)?,
            created_at: self.created_at,
        })
    }
}

fn parse_status(s: &str) -> anyhow::Result<CampaignStatus> {
    match s {
        "pending" => Ok(CampaignStatus::Pending),
        "active" => Ok(CampaignStatus::Active),
        "ended" => Ok(CampaignStatus::Ended),
        other => Err(anyhow::anyhow!("unknown campaign status: {other}")),
    }
}

const SELECT_COLUMNS: &str =
    "campaign_id, product_id, start_time, end_time, alpha, beta, gamma, quota, status, created_at";

/// Creates a campaign, snapshotting `quota` from the product's current
/// stock (§3, §9 — quota must survive settlement, stock does not).
pub async fn create_campaign(
    pool: &PgPool,
    product_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    alpha: Decimal,
    beta: Decimal,
    gamma: Decimal,
) -> anyhow::Result<Campaign> {
    let mut tx = pool.begin().await?;

    let stock: i64 = sqlx::query_scalar("SELECT stock FROM products WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

    let row: CampaignRow = sqlx::query_as(&format!(
        r#"
INSERT INTO campaigns (campaign_id, product_id, start_time, end_time, alpha, beta, gamma, quota, status, created_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', now())
RETURNING {SELECT_COLUMNS}
"#
    ))
    .bind(Uuid::new_v4())
    .bind(product_id)
    .bind(start_time)
    .bind(end_time)
    .bind(alpha)
    .bind(beta)
    .bind(gamma)
    .bind(stock as i32)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    row.into_campaign()
}

pub async fn find_by_id(pool: &PgPool, campaign_id: Uuid) -> anyhow::Result<Option<Campaign>> {
    let row: Option<CampaignRow> =
        sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM campaigns WHERE campaign_id = $1"))
            .bind(campaign_id)
            .fetch_optional(pool)
            .await?;
    row.map(CampaignRow::into_campaign).transpose()
}

pub async fn list_campaigns(pool: &PgPool) -> anyhow::Result<Vec<Campaign>> {
    let rows: Vec<CampaignRow> = sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM campaigns"))
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(CampaignRow::into_campaign).collect()
}

/// Campaigns whose wall-clock status is `ended` but whose stored status
/// isn't yet — the settlement poller's work queue.
pub async fn find_unsettled_ended(pool: &PgPool, now: DateTime<Utc>) -> anyhow::Result<Vec<Campaign>> {
    let rows: Vec<CampaignRow> = sqlx::query_as(&format!(
        "SELECT {SELECT_COLUMNS} FROM campaigns WHERE end_time <= $1 AND status != 'ended'"
    ))
    .bind(now)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(CampaignRow::into_campaign).collect()
}

pub async fn mark_ended(pool: &PgPool, campaign_id: Uuid) -> anyhow::Result<()> {
    sqlx::query("UPDATE campaigns SET status = 'ended' WHERE campaign_id = $1")
        .bind(campaign_id)
        .execute(pool)
        .await?;
    Ok(())
}

