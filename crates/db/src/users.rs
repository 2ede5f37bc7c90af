use flashbid_core::types::{User, UserStatus};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    email: String,
    password_hash: String,
    username: String,
    weight: Decimal,
    status: String,
    is_admin: bool,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl UserRow {
    fn into_user(self) -> anyhow::Result<User> {
        Ok(User {
            user_id: self.user_id,
            email: self.email,
            username: self.username,
            weight: self.weight,
            status: parse_status(&self.status)?,
            is_admin: self.is_admin,
            created_at: self.created_at,
        })
    }
}

fn parse_status(s: &str) -> anyhow::Result<UserStatus> {
    match s {
        "active" => Ok(UserStatus::Active),
        "disabled" => Ok(UserStatus::Disabled),
        other => Err(anyhow::anyhow!("unknown user status: {other}")),
    }
}

fn status_str(s: UserStatus) -> &'static str {
    match s {
        UserStatus::Active => "active",
        UserStatus::Disabled => "disabled",
    }
}

/// Inserts a new user. Weight is immutable once set (§3).
pub async fn create_user(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
    username: &str,
    weight: Decimal,
) -> anyhow::Result<User> {
    let row: UserRow = sqlx::query_as(
        r#"
INSERT INTO users (user_id, email, password_hash, username, weight, status, is_admin, created_at)
VALUES ($1, $2, $3, $4, $5, 'active', FALSE, now())
RETURNING user_id, email, password_hash, username, weight, status, is_admin, created_at
"#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(username)
    .bind(weight)
    .fetch_one(pool)
    .await?;

    row.into_user()
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> anyhow::Result<Option<(User, String)>> {
    let row: Option<UserRow> = sqlx::query_as(
        r#"
SELECT user_id, email, password_hash, username, weight, status, is_admin, created_at
FROM users WHERE email = $1
"#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(r) => {
            let hash = r.password_hash.clone();
            Ok(Some((r.into_user()?, hash)))
        }
        None => Ok(None),
    }
}

pub async fn find_by_id(pool: &PgPool, user_id: Uuid) -> anyhow::Result<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(
        r#"
SELECT user_id, email, password_hash, username, weight, status, is_admin, created_at
FROM users WHERE user_id = $1
"#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.map(UserRow::into_user).transpose()
}

pub async fn set_status(pool: &PgPool, user_id: Uuid, status: UserStatus) -> anyhow::Result<()> {
    sqlx::query("UPDATE users SET status = $1 WHERE user_id = $2")
        .bind(status_str(status))
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
