//! Returned-inventory batches

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use shared::{ReturnStatus, ReturnedInventory, ReturnedLine};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, FromRow)]
struct ReturnRow {
    id: Uuid,
    technician_id: Uuid,
    branch_id: Uuid,
    status: String,
    returned_at: DateTime<Utc>,
    confirmed_by: Option<Uuid>,
    confirmed_at: Option<DateTime<Utc>>,
    rejected_by: Option<Uuid>,
    rejected_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
}

#[derive(Debug, FromRow)]
struct LineRow {
    return_id: Uuid,
    item_id: String,
    item_type: String,
    serial_number: Option<String>,
    quantity: i32,
}

const RETURN_COLUMNS: &str = "id, technician_id, branch_id, status, returned_at, confirmed_by, \
     confirmed_at, rejected_by, rejected_at, rejection_reason";

async fn attach_lines(conn: &mut PgConnection, rows: Vec<ReturnRow>) -> AppResult<Vec<ReturnedInventory>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let lines = sqlx::query_as::<_, LineRow>(
        r#"
        SELECT return_id, item_id, item_type, serial_number, quantity
        FROM returned_inventory_lines
        WHERE return_id = ANY($1)
        ORDER BY position
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_return: HashMap<Uuid, Vec<ReturnedLine>> = HashMap::new();
    for line in lines {
        by_return.entry(line.return_id).or_default().push(ReturnedLine {
            item_type: line.item_type.parse()?,
            item_id: line.item_id,
            serial_number: line.serial_number,
            quantity: line.quantity,
        });
    }

    rows.into_iter()
        .map(|row| -> AppResult<ReturnedInventory> {
            Ok(ReturnedInventory {
                items: by_return.remove(&row.id).unwrap_or_default(),
                status: row.status.parse::<ReturnStatus>()?,
                id: row.id,
                technician_id: row.technician_id,
                branch_id: row.branch_id,
                returned_at: row.returned_at,
                confirmed_by: row.confirmed_by,
                confirmed_at: row.confirmed_at,
                rejected_by: row.rejected_by,
                rejected_at: row.rejected_at,
                rejection_reason: row.rejection_reason,
            })
        })
        .collect()
}

pub async fn insert(conn: &mut PgConnection, entry: &ReturnedInventory) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO returned_inventory (id, technician_id, branch_id, status, returned_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(entry.id)
    .bind(entry.technician_id)
    .bind(entry.branch_id)
    .bind(entry.status.as_str())
    .bind(entry.returned_at)
    .execute(&mut *conn)
    .await?;

    for (position, line) in entry.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO returned_inventory_lines (id, return_id, position, item_id, item_type,
                                                  serial_number, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.id)
        .bind(position as i32)
        .bind(&line.item_id)
        .bind(line.item_type.as_str())
        .bind(&line.serial_number)
        .bind(line.quantity)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn find_for_update(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<ReturnedInventory>> {
    let sql = format!("SELECT {} FROM returned_inventory WHERE id = $1 FOR UPDATE", RETURN_COLUMNS);
    let row = sqlx::query_as::<_, ReturnRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(attach_lines(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

pub async fn list(
    conn: &mut PgConnection,
    technician_id: Option<Uuid>,
    branch_id: Option<Uuid>,
    status: Option<ReturnStatus>,
) -> AppResult<Vec<ReturnedInventory>> {
    let sql = format!(
        "SELECT {} FROM returned_inventory \
         WHERE ($1::UUID IS NULL OR technician_id = $1) \
           AND ($2::UUID IS NULL OR branch_id = $2) \
           AND ($3::TEXT IS NULL OR status = $3) \
         ORDER BY returned_at DESC",
        RETURN_COLUMNS
    );
    let rows = sqlx::query_as::<_, ReturnRow>(&sql)
        .bind(technician_id)
        .bind(branch_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&mut *conn)
        .await?;

    attach_lines(conn, rows).await
}

pub async fn update_decision(conn: &mut PgConnection, entry: &ReturnedInventory) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE returned_inventory
        SET status = $2, confirmed_by = $3, confirmed_at = $4,
            rejected_by = $5, rejected_at = $6, rejection_reason = $7
        WHERE id = $1
        "#,
    )
    .bind(entry.id)
    .bind(entry.status.as_str())
    .bind(entry.confirmed_by)
    .bind(entry.confirmed_at)
    .bind(entry.rejected_by)
    .bind(entry.rejected_at)
    .bind(&entry.rejection_reason)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
