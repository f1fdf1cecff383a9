//! Items, branch stock entries and stock history

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{Item, ItemType, Pricing, StockDraw, StockEntry, StockHistory};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, FromRow)]
struct ItemRow {
    id: String,
    name: String,
    item_type: String,
    customer_price: Decimal,
    dealer_price: Decimal,
    distributor_price: Decimal,
    purchase_price: Option<Decimal>,
    mrp: Option<Decimal>,
    unit: Option<String>,
    warranty: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct StockEntryRow {
    id: Uuid,
    item_id: String,
    serial_number: Option<String>,
    quantity: i32,
    branch_id: Uuid,
    added_at: DateTime<Utc>,
    remark: Option<String>,
}

impl From<StockEntryRow> for StockEntry {
    fn from(row: StockEntryRow) -> Self {
        Self {
            id: row.id,
            serial_number: row.serial_number,
            quantity: row.quantity,
            branch_id: row.branch_id,
            date: row.added_at,
            remark: row.remark,
        }
    }
}

impl ItemRow {
    fn into_item(self, stock: Vec<StockEntry>) -> AppResult<Item> {
        Ok(Item {
            item_type: self.item_type.parse::<ItemType>()?,
            id: self.id,
            name: self.name,
            pricing: Pricing {
                customer_price: self.customer_price,
                dealer_price: self.dealer_price,
                distributor_price: self.distributor_price,
            },
            purchase_price: self.purchase_price,
            mrp: self.mrp,
            unit: self.unit,
            warranty: self.warranty,
            stock,
            created_at: self.created_at,
        })
    }
}

const ITEM_COLUMNS: &str = "id, name, item_type, customer_price, dealer_price, distributor_price, \
     purchase_price, mrp, unit, warranty, created_at";

#[derive(Debug, FromRow)]
struct StockHistoryRow {
    id: Uuid,
    item_id: String,
    item_type: String,
    serial_number: Option<String>,
    quantity: i32,
    branch_id: Uuid,
    added_by: Uuid,
    added_at: DateTime<Utc>,
    remark: Option<String>,
}

impl TryFrom<StockHistoryRow> for StockHistory {
    type Error = crate::error::AppError;

    fn try_from(row: StockHistoryRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            item_id: row.item_id,
            item_type: row.item_type.parse()?,
            serial_number: row.serial_number,
            quantity: row.quantity,
            branch_id: row.branch_id,
            added_by: row.added_by,
            added_at: row.added_at,
            remark: row.remark,
        })
    }
}

async fn stock_for(conn: &mut PgConnection, item_id: &str) -> AppResult<Vec<StockEntry>> {
    let rows = sqlx::query_as::<_, StockEntryRow>(
        r#"
        SELECT id, item_id, serial_number, quantity, branch_id, added_at, remark
        FROM stock_entries
        WHERE item_id = $1
        ORDER BY seq
        "#,
    )
    .bind(item_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(StockEntry::from).collect())
}

async fn find_inner(conn: &mut PgConnection, id: &str, lock: bool) -> AppResult<Option<Item>> {
    let sql = format!(
        "SELECT {} FROM items WHERE id = $1{}",
        ITEM_COLUMNS,
        if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, ItemRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let stock = stock_for(conn, &row.id).await?;
            Ok(Some(row.into_item(stock)?))
        }
        None => Ok(None),
    }
}

pub async fn find(conn: &mut PgConnection, id: &str) -> AppResult<Option<Item>> {
    find_inner(conn, id, false).await
}

/// Loads the item and locks its row so concurrent stock changes serialize.
pub async fn find_for_update(conn: &mut PgConnection, id: &str) -> AppResult<Option<Item>> {
    find_inner(conn, id, true).await
}

/// Lists items with stock restricted to `branch_id` when given.
pub async fn list(
    conn: &mut PgConnection,
    item_type: Option<ItemType>,
    branch_id: Option<Uuid>,
) -> AppResult<Vec<Item>> {
    let sql = format!(
        "SELECT {} FROM items WHERE ($1::TEXT IS NULL OR item_type = $1) ORDER BY name",
        ITEM_COLUMNS
    );
    let rows = sqlx::query_as::<_, ItemRow>(&sql)
        .bind(item_type.map(|t| t.as_str()))
        .fetch_all(&mut *conn)
        .await?;

    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let entries = sqlx::query_as::<_, StockEntryRow>(
        r#"
        SELECT id, item_id, serial_number, quantity, branch_id, added_at, remark
        FROM stock_entries
        WHERE item_id = ANY($1) AND ($2::UUID IS NULL OR branch_id = $2)
        ORDER BY seq
        "#,
    )
    .bind(&ids)
    .bind(branch_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_item: std::collections::HashMap<String, Vec<StockEntry>> =
        std::collections::HashMap::new();
    for entry in entries {
        by_item
            .entry(entry.item_id.clone())
            .or_default()
            .push(entry.into());
    }

    rows.into_iter()
        .map(|row| {
            let stock = by_item.remove(&row.id).unwrap_or_default();
            row.into_item(stock)
        })
        .collect()
}

/// Which unique key a new item would collide with, if any
pub async fn duplicate_key(conn: &mut PgConnection, id: &str, name: &str) -> AppResult<Option<&'static str>> {
    let (id_taken, name_taken): (bool, bool) = sqlx::query_as(
        r#"
        SELECT
            EXISTS(SELECT 1 FROM items WHERE id = $1),
            EXISTS(SELECT 1 FROM items WHERE LOWER(name) = LOWER($2))
        "#,
    )
    .bind(id)
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;

    Ok(if id_taken {
        Some("id")
    } else if name_taken {
        Some("name")
    } else {
        None
    })
}

pub async fn insert(conn: &mut PgConnection, item: &Item, created_by: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO items (id, name, item_type, customer_price, dealer_price, distributor_price,
                           purchase_price, mrp, unit, warranty, created_by, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(&item.id)
    .bind(&item.name)
    .bind(item.item_type.as_str())
    .bind(item.pricing.customer_price)
    .bind(item.pricing.dealer_price)
    .bind(item.pricing.distributor_price)
    .bind(item.purchase_price)
    .bind(item.mrp)
    .bind(&item.unit)
    .bind(&item.warranty)
    .bind(created_by)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn delete(conn: &mut PgConnection, id: &str) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM items WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert_stock_entry(conn: &mut PgConnection, item_id: &str, entry: &StockEntry) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_entries (id, item_id, serial_number, quantity, branch_id, added_at, remark)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(entry.id)
    .bind(item_id)
    .bind(&entry.serial_number)
    .bind(entry.quantity)
    .bind(entry.branch_id)
    .bind(entry.date)
    .bind(&entry.remark)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Persists the outcome of a withdrawal: drained entries are deleted, the
/// rest keep their reduced quantity.
pub async fn apply_draws(conn: &mut PgConnection, draws: &[StockDraw]) -> AppResult<()> {
    for draw in draws {
        if draw.exhausts_entry() {
            sqlx::query("DELETE FROM stock_entries WHERE id = $1")
                .bind(draw.entry_id)
                .execute(&mut *conn)
                .await?;
        } else {
            sqlx::query("UPDATE stock_entries SET quantity = $2 WHERE id = $1")
                .bind(draw.entry_id)
                .bind(draw.remaining)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

pub async fn insert_history(conn: &mut PgConnection, history: &StockHistory) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_history (id, item_id, item_type, serial_number, quantity, branch_id,
                                   added_by, added_at, remark)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(history.id)
    .bind(&history.item_id)
    .bind(history.item_type.as_str())
    .bind(&history.serial_number)
    .bind(history.quantity)
    .bind(history.branch_id)
    .bind(history.added_by)
    .bind(history.added_at)
    .bind(&history.remark)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn history(
    conn: &mut PgConnection,
    item_id: Option<&str>,
    branch_id: Option<Uuid>,
) -> AppResult<Vec<StockHistory>> {
    let rows = sqlx::query_as::<_, StockHistoryRow>(
        r#"
        SELECT id, item_id, item_type, serial_number, quantity, branch_id, added_by, added_at, remark
        FROM stock_history
        WHERE ($1::TEXT IS NULL OR item_id = $1)
          AND ($2::UUID IS NULL OR branch_id = $2)
        ORDER BY added_at DESC
        "#,
    )
    .bind(item_id)
    .bind(branch_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(StockHistory::try_from).collect()
}
