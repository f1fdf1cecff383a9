//! Technician holdings

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use shared::{SerializedHolding, TechnicianInventory};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, FromRow)]
struct HoldingRow {
    id: Uuid,
    technician_id: Uuid,
    item_id: String,
    branch_id: Uuid,
    generic_quantity: i32,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SerialRow {
    inventory_id: Uuid,
    serial_number: String,
    status: String,
    assigned_at: DateTime<Utc>,
    assigned_by: Option<Uuid>,
    used_in_work_order: Option<String>,
    used_at: Option<DateTime<Utc>>,
}

impl SerialRow {
    fn into_holding(self) -> AppResult<SerializedHolding> {
        Ok(SerializedHolding {
            status: self.status.parse()?,
            serial_number: self.serial_number,
            assigned_at: self.assigned_at,
            assigned_by: self.assigned_by,
            used_in_work_order: self.used_in_work_order,
            used_at: self.used_at,
        })
    }
}

/// Filters for [`list`]; `None` fields are unrestricted.
#[derive(Debug, Default, Clone)]
pub struct HoldingFilter {
    pub technician_id: Option<Uuid>,
    pub item_id: Option<String>,
    pub branch_id: Option<Uuid>,
}

async fn attach_serials(
    conn: &mut PgConnection,
    rows: Vec<HoldingRow>,
) -> AppResult<Vec<TechnicianInventory>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let serials = sqlx::query_as::<_, SerialRow>(
        r#"
        SELECT inventory_id, serial_number, status, assigned_at, assigned_by, used_in_work_order, used_at
        FROM technician_serials
        WHERE inventory_id = ANY($1)
        ORDER BY position
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_holding: HashMap<Uuid, Vec<SerializedHolding>> = HashMap::new();
    for serial in serials {
        let inventory_id = serial.inventory_id;
        by_holding
            .entry(inventory_id)
            .or_default()
            .push(serial.into_holding()?);
    }

    Ok(rows
        .into_iter()
        .map(|row| TechnicianInventory {
            serialized_items: by_holding.remove(&row.id).unwrap_or_default(),
            id: row.id,
            technician_id: row.technician_id,
            item_id: row.item_id,
            branch_id: row.branch_id,
            generic_quantity: row.generic_quantity,
            updated_at: row.updated_at,
        })
        .collect())
}

/// Loads and locks the holding of one technician for one item.
pub async fn find_for_update(
    conn: &mut PgConnection,
    technician_id: Uuid,
    item_id: &str,
) -> AppResult<Option<TechnicianInventory>> {
    let row = sqlx::query_as::<_, HoldingRow>(
        r#"
        SELECT id, technician_id, item_id, branch_id, generic_quantity, updated_at
        FROM technician_inventory
        WHERE technician_id = $1 AND item_id = $2
        FOR UPDATE
        "#,
    )
    .bind(technician_id)
    .bind(item_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(attach_serials(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

pub async fn list(conn: &mut PgConnection, filter: &HoldingFilter) -> AppResult<Vec<TechnicianInventory>> {
    let rows = sqlx::query_as::<_, HoldingRow>(
        r#"
        SELECT id, technician_id, item_id, branch_id, generic_quantity, updated_at
        FROM technician_inventory
        WHERE ($1::UUID IS NULL OR technician_id = $1)
          AND ($2::TEXT IS NULL OR item_id = $2)
          AND ($3::UUID IS NULL OR branch_id = $3)
        ORDER BY technician_id, item_id
        "#,
    )
    .bind(filter.technician_id)
    .bind(&filter.item_id)
    .bind(filter.branch_id)
    .fetch_all(&mut *conn)
    .await?;

    attach_serials(conn, rows).await
}

/// Writes the whole aggregate: the header row is upserted and the serial
/// list replaced.
pub async fn save(conn: &mut PgConnection, holding: &TechnicianInventory) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO technician_inventory (id, technician_id, item_id, branch_id, generic_quantity, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO UPDATE
        SET generic_quantity = EXCLUDED.generic_quantity,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(holding.id)
    .bind(holding.technician_id)
    .bind(&holding.item_id)
    .bind(holding.branch_id)
    .bind(holding.generic_quantity)
    .bind(holding.updated_at)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM technician_serials WHERE inventory_id = $1")
        .bind(holding.id)
        .execute(&mut *conn)
        .await?;

    for (position, serial) in holding.serialized_items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO technician_serials (id, inventory_id, position, serial_number, status,
                                            assigned_at, assigned_by, used_in_work_order, used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(holding.id)
        .bind(position as i32)
        .bind(&serial.serial_number)
        .bind(serial.status.as_str())
        .bind(serial.assigned_at)
        .bind(serial.assigned_by)
        .bind(&serial.used_in_work_order)
        .bind(serial.used_at)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
