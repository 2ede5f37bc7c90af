use chrono::{DateTime, Utc};
use flashbid_core::types::Bid;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct BidRow {
    bid_id: Uuid,
    campaign_id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    price: Decimal,
    score: Decimal,
    time_elapsed_ms: i64,
    bid_number: i32,
    created_at: DateTime<Utc>,
}

impl From<BidRow> for Bid {
    fn from(r: BidRow) -> Self {
        Bid {
            bid_id: r.bid_id,
            campaign_id: r.campaign_id,
            user_id: r.user_id,
            product_id: r.product_id,
            price: r.price,
            score: r.score,
            time_elapsed_ms: r.time_elapsed_ms,
            bid_number: r.bid_number,
            created_at: r.created_at,
        }
    }
}

/// Atomic upsert keyed on the unique `(campaign_id, user_id)` constraint
/// (§4.3 step 4, §9): a single `INSERT ... ON CONFLICT DO UPDATE`, never
/// read-then-write. `bid_number` increments on every re-acceptance.
pub async fn upsert_bid(
    pool: &PgPool,
    campaign_id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    price: Decimal,
    score: Decimal,
    time_elapsed_ms: i64,
) -> anyhow::Result<Bid> {
    let row: BidRow = sqlx::query_as(
        r#"
INSERT INTO bids (bid_id, campaign_id, user_id, product_id, price, score, time_elapsed_ms, bid_number, created_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, 1, now())
ON CONFLICT (campaign_id, user_id) DO UPDATE
SET price = EXCLUDED.price,
    score = EXCLUDED.score,
    time_elapsed_ms = EXCLUDED.time_elapsed_ms,
    bid_number = bids.bid_number + 1
RETURNING bid_id, campaign_id, user_id, product_id, price, score, time_elapsed_ms, bid_number, created_at
"#,
    )
    .bind(Uuid::new_v4())
    .bind(campaign_id)
    .bind(user_id)
    .bind(product_id)
    .bind(price)
    .bind(score)
    .bind(time_elapsed_ms)
    .fetch_one(pool)
    .await?;

    Ok(row.into())
}

pub async fn find_bid(pool: &PgPool, campaign_id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Bid>> {
    let row: Option<BidRow> = sqlx::query_as(
        r#"
SELECT bid_id, campaign_id, user_id, product_id, price, score, time_elapsed_ms, bid_number, created_at
FROM bids WHERE campaign_id = $1 AND user_id = $2
"#,
    )
    .bind(campaign_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Into::into))
}
