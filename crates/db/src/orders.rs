use chrono::{DateTime, Utc};
use flashbid_core::types::{Order, OrderStatus};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct OrderRow {
    order_id: Uuid,
    campaign_id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    final_price: Decimal,
    final_score: Decimal,
    final_rank: i32,
    status: String,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> anyhow::Result<Order> {
        Ok(Order {
            order_id: self.order_id,
            campaign_id: self.campaign_id,
            user_id: self.user_id,
            product_id: self.product_id,
            final_price: self.final_price,
            final_score: self.final_score,
            final_rank: self.final_rank,
            status: parse_status(&self.status)?,
            created_at: self.created_at,
        })
    }
}

fn parse_status(s: &str) -> anyhow::Result<OrderStatus> {
    match s {
        "pending" => Ok(OrderStatus::Pending),
        "confirmed" => Ok(OrderStatus::Confirmed),
        other => Err(anyhow::anyhow!("unknown order status: {other}")),
    }
}

const SELECT_COLUMNS: &str =
    "order_id, campaign_id, user_id, product_id, final_price, final_score, final_rank, status, created_at";

/// Inserts a confirmed order inside the caller's settlement transaction
/// (§4.5). The `(campaign_id, user_id)` unique constraint enforces at
/// most one order per winner.
pub async fn insert_confirmed_order(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    campaign_id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    final_price: Decimal,
    final_score: Decimal,
    final_rank: i32,
) -> anyhow::Result<Order> {
    let row: OrderRow = sqlx::query_as(&format!(
        r#"
INSERT INTO orders (order_id, campaign_id, user_id, product_id, final_price, final_score, final_rank, status, created_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, 'confirmed', now())
RETURNING {SELECT_COLUMNS}
"#
    ))
    .bind(Uuid::new_v4())
    .bind(campaign_id)
    .bind(user_id)
    .bind(product_id)
    .bind(final_price)
    .bind(final_score)
    .bind(final_rank)
    .fetch_one(&mut **tx)
    .await?;

    row.into_order()
}

pub async fn list_for_campaign(pool: &PgPool, campaign_id: Uuid) -> anyhow::Result<Vec<Order>> {
    let rows: Vec<OrderRow> = sqlx::query_as(&format!(
        "SELECT {SELECT_COLUMNS} FROM orders WHERE campaign_id = $1 ORDER BY final_rank ASC"
    ))
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(OrderRow::into_order).collect()
}

pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Order>> {
    let rows: Vec<OrderRow> = sqlx::query_as(&format!(
        "SELECT {SELECT_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(OrderRow::into_order).collect()
}

pub async fn count_for_campaign(pool: &PgPool, campaign_id: Uuid) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE campaign_id = $1")
        .bind(campaign_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}
