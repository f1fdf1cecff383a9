//! Per-prefix monthly document counters

use chrono::{DateTime, Utc};
use shared::numbering;
use sqlx::PgConnection;

use crate::error::AppResult;

/// Reserves the next value of the counter named `key`, starting at 1.
/// The increment is a single statement, so concurrent callers never share a
/// value.
pub async fn next(conn: &mut PgConnection, key: &str) -> AppResult<i64> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO document_sequences (sequence_key, last_value)
        VALUES ($1, 1)
        ON CONFLICT (sequence_key) DO UPDATE
        SET last_value = document_sequences.last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(key)
    .fetch_one(&mut *conn)
    .await?;
    Ok(value)
}

/// Next `<prefix><YYMM><seq>` number for the month of `at`.
pub async fn next_document_number(conn: &mut PgConnection, prefix: &str, at: DateTime<Utc>) -> AppResult<String> {
    let sequence = next(conn, &numbering::sequence_key(prefix, at)).await?;
    Ok(numbering::document_number(prefix, at, sequence))
}
