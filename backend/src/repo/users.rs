//! Staff lookups and push-token registrations

use chrono::{DateTime, Utc};
use shared::{PushToken, User};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    first_name: String,
    last_name: String,
    role: String,
    branch_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

pub async fn find(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, username, first_name, last_name, role, branch_id, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(Some(User {
            role: row.role.parse()?,
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            branch_id: row.branch_id,
            created_at: row.created_at,
        })),
        None => Ok(None),
    }
}

pub async fn push_tokens(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Vec<String>> {
    let tokens: Vec<String> =
        sqlx::query_scalar("SELECT token FROM user_push_tokens WHERE user_id = $1 ORDER BY created_at")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
    Ok(tokens)
}

pub async fn upsert_token(conn: &mut PgConnection, user_id: Uuid, token: &PushToken) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO user_push_tokens (id, user_id, token, device_type, platform, created_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        ON CONFLICT (user_id, token) DO UPDATE
        SET device_type = EXCLUDED.device_type, platform = EXCLUDED.platform
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&token.token)
    .bind(&token.device_type)
    .bind(&token.platform)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Removes the given tokens from one user and returns how many were dropped.
pub async fn remove_tokens(conn: &mut PgConnection, user_id: Uuid, tokens: &[String]) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM user_push_tokens WHERE user_id = $1 AND token = ANY($2)")
        .bind(user_id)
        .bind(tokens)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
