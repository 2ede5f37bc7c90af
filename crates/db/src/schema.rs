use sqlx::PgPool;

/// Bootstraps the schema. Idempotent `CREATE TABLE IF NOT EXISTS` — a
/// real deployment would use `sqlx::migrate!` instead, against the
/// tables described in §3.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS users (
  user_id UUID PRIMARY KEY,
  email TEXT NOT NULL UNIQUE,
  password_hash TEXT NOT NULL,
  username TEXT NOT NULL,
  weight NUMERIC(10,2) NOT NULL DEFAULT 1.00,
  status TEXT NOT NULL DEFAULT 'active',
  is_admin BOOLEAN NOT NULL DEFAULT FALSE,
  created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);"#)
        .execute(pool)
        .await?;
    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_users_status ON users(status);"#)
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS products (
  product_id UUID PRIMARY KEY,
  name TEXT NOT NULL,
  description TEXT,
  stock BIGINT NOT NULL CHECK (stock >= 0),
  min_price NUMERIC(10,2) NOT NULL CHECK (min_price > 0),
  version BIGINT NOT NULL DEFAULT 0
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS campaigns (
  campaign_id UUID PRIMARY KEY,
  product_id UUID NOT NULL REFERENCES products(product_id),
  start_time TIMESTAMPTZ NOT NULL,
  end_time TIMESTAMPTZ NOT NULL,
  alpha NUMERIC(10,4) NOT NULL DEFAULT 1.0000,
  beta NUMERIC(10,4) NOT NULL DEFAULT 1000.0000,
  gamma NUMERIC(10,4) NOT NULL DEFAULT 100.0000,
  quota INTEGER NOT NULL,
  status TEXT NOT NULL DEFAULT 'pending',
  created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
  CHECK (end_time > start_time)
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_campaigns_status ON campaigns(status);"#)
        .execute(pool)
        .await?;
    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_campaigns_time ON campaigns(start_time, end_time);"#)
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS bids (
  bid_id UUID PRIMARY KEY,
  campaign_id UUID NOT NULL REFERENCES campaigns(campaign_id),
  user_id UUID NOT NULL REFERENCES users(user_id),
  product_id UUID NOT NULL REFERENCES products(product_id),
  price NUMERIC(10,2) NOT NULL CHECK (price > 0),
  score NUMERIC(15,4) NOT NULL,
  time_elapsed_ms BIGINT NOT NULL,
  bid_number INTEGER NOT NULL DEFAULT 1,
  created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
  UNIQUE (campaign_id, user_id)
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_bids_campaign_score ON bids(campaign_id, score);"#)
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS orders (
  order_id UUID PRIMARY KEY,
  campaign_id UUID NOT NULL REFERENCES campaigns(campaign_id),
  user_id UUID NOT NULL REFERENCES users(user_id),
  product_id UUID NOT NULL REFERENCES products(product_id),
  final_price NUMERIC(10,2) NOT NULL,
  final_score NUMERIC(15,4) NOT NULL,
  final_rank INTEGER NOT NULL CHECK (final_rank > 0),
  status TEXT NOT NULL DEFAULT 'pending',
  created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
  UNIQUE (campaign_id, user_id)
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_orders_campaign_created ON orders(campaign_id, created_at);"#)
        .execute(pool)
        .await?;
    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_orders_user_created ON orders(user_id, created_at);"#)
        .execute(pool)
        .await?;
    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);"#)
        .execute(pool)
        .await?;

    Ok(())
}
