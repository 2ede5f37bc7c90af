use flashbid_core::EngineError;
use flashbid_core::types::Product;
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::Row;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct ProductRow {
    product_id: Uuid,
    name: String,
    description: Option<String>,
    stock: i64,
    min_price: Decimal,
    version: i64,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Product {
            product_id: r.product_id,
            name: r.name,
            description: r.description,
            stock: r.stock,
            min_price: r.min_price,
            version: r.version,
        }
    }
}

pub async fn create_product(
    pool: &PgPool,
    name: &str,
    description: Option<&str>,
    stock: i64,
    min_price: Decimal,
) -> anyhow::Result<Product> {
    let row: ProductRow = sqlx::query_as(
        r#"
INSERT INTO products (product_id, name, description, stock, min_price, version)
VALUES ($1, $2, $3, $4, $5, 0)
RETURNING product_id, name, description, stock, min_price, version
"#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(description)
    .bind(stock)
    .bind(min_price)
    .fetch_one(pool)
    .await?;

    Ok(row.into())
}

pub async fn find_by_id(pool: &PgPool, product_id: Uuid) -> anyhow::Result<Option<Product>> {
    let row: Option<ProductRow> = sqlx::query_as(
        "SELECT product_id, name, description, stock, min_price, version FROM products WHERE product_id = $1",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Into::into))
}

pub async fn list_products(pool: &PgPool) -> anyhow::Result<Vec<Product>> {
    let rows: Vec<ProductRow> =
        sqlx::query_as("SELECT product_id, name, description, stock, min_price, version FROM products")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// L3+L4 of the four-layer decrement (C6): row lock then
/// version-checked update. Must run inside the caller's transaction so
/// the row lock covers both statements.
pub async fn decrement_with_row_lock(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    product_id: Uuid,
) -> Result<Product, EngineError> {
    let locked: Option<ProductRow> = sqlx::query_as(
        "SELECT product_id, name, description, stock, min_price, version FROM products WHERE product_id = $1 FOR UPDATE",
    )
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| EngineError::Store(e.to_string()))?;

    let row = locked.ok_or(EngineError::ProductNotFound)?;
    if row.stock < 1 {
        return Err(EngineError::ConcurrencyConflict);
    }

    let updated = sqlx::query(
        r#"
UPDATE products
SET stock = stock - 1, version = version + 1
WHERE product_id = $1 AND version = $2 AND stock >= 1
"#,
    )
    .bind(product_id)
    .bind(row.version)
    .execute(&mut **tx)
    .await
    .map_err(|e| EngineError::Store(e.to_string()))?;

    if updated.rows_affected() == 0 {
        return Err(EngineError::ConcurrencyConflict);
    }

    let refreshed: ProductRow = sqlx::query_as(
        "SELECT product_id, name, description, stock, min_price, version FROM products WHERE product_id = $1",
    )
    .bind(product_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| EngineError::Store(e.to_string()))?;

    Ok(refreshed.into())
}

pub async fn current_version(pool: &PgPool, product_id: Uuid) -> anyhow::Result<i64> {
    let row = sqlx::query("SELECT version FROM products WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await?;
    Ok(row.get::<i64, _>("version"))
}
