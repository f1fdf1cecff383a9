//! Work orders with their history, used items and billing summaries

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    BillingInfo, HistoryChange, HistoryPlacement, ItemUsed, Pagination, StatusHistoryEntry,
    WorkOrder, WorkOrderStatus,
};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, FromRow)]
struct WorkOrderRow {
    id: Uuid,
    order_id: String,
    customer_id: Uuid,
    branch_id: Uuid,
    project_id: String,
    project_type: String,
    project_category: String,
    status: String,
    initial_remark: Option<String>,
    instructions: Option<String>,
    technician_id: Option<Uuid>,
    assigned_by: Option<Uuid>,
    assigned_at: Option<DateTime<Utc>>,
    created_by: Uuid,
    predecessor_order_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    status: String,
    remark: String,
    updated_by: Uuid,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ItemUsedRow {
    item_id: String,
    serial_number: Option<String>,
    quantity: i32,
    used_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct BillingInfoRow {
    bill_id: Uuid,
    bill_number: String,
    amount: Decimal,
    payment_method: String,
    transaction_id: Option<String>,
    paid_at: Option<DateTime<Utc>>,
}

/// Listing row: the order header without its collections
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WorkOrderSummary {
    pub id: Uuid,
    pub order_id: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub branch_id: Uuid,
    pub project_id: String,
    pub project_type: String,
    pub project_category: String,
    pub status: String,
    pub technician_id: Option<Uuid>,
    pub technician_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
pub struct WorkOrderFilter {
    pub branch_id: Option<Uuid>,
    pub technician_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub status: Option<WorkOrderStatus>,
}

const ORDER_COLUMNS: &str = "id, order_id, customer_id, branch_id, project_id, project_type, \
     project_category, status, initial_remark, instructions, technician_id, assigned_by, \
     assigned_at, created_by, predecessor_order_id, created_at, updated_at";

async fn hydrate(conn: &mut PgConnection, row: WorkOrderRow) -> AppResult<WorkOrder> {
    let history = sqlx::query_as::<_, HistoryRow>(
        r#"
        SELECT status, remark, updated_by, updated_at
        FROM work_order_history
        WHERE work_order_id = $1
        ORDER BY position
        "#,
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?;

    let items_used = sqlx::query_as::<_, ItemUsedRow>(
        r#"
        SELECT item_id, serial_number, quantity, used_at
        FROM work_order_items_used
        WHERE work_order_id = $1
        ORDER BY used_at
        "#,
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?;

    let billing_info = sqlx::query_as::<_, BillingInfoRow>(
        r#"
        SELECT bill_id, bill_number, amount, payment_method, transaction_id, paid_at
        FROM work_order_billing_info
        WHERE work_order_id = $1
        ORDER BY created_at
        "#,
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?;

    let mut status_history = Vec::with_capacity(history.len());
    for entry in history {
        status_history.push(StatusHistoryEntry {
            status: entry.status.parse()?,
            remark: entry.remark,
            updated_by: entry.updated_by,
            updated_at: entry.updated_at,
        });
    }

    Ok(WorkOrder {
        project_category: row.project_category.parse()?,
        status: row.status.parse()?,
        id: row.id,
        order_id: row.order_id,
        customer_id: row.customer_id,
        branch_id: row.branch_id,
        project_id: row.project_id,
        project_type: row.project_type,
        initial_remark: row.initial_remark,
        instructions: row.instructions,
        technician_id: row.technician_id,
        assigned_by: row.assigned_by,
        assigned_at: row.assigned_at,
        created_by: row.created_by,
        predecessor_order_id: row.predecessor_order_id,
        status_history,
        items_used: items_used
            .into_iter()
            .map(|r| ItemUsed {
                item_id: r.item_id,
                serial_number: r.serial_number,
                quantity: r.quantity,
                used_at: r.used_at,
            })
            .collect(),
        billing_info: billing_info
            .into_iter()
            .map(|r| BillingInfo {
                bill_id: r.bill_id,
                bill_number: r.bill_number,
                amount: r.amount,
                payment_method: r.payment_method,
                transaction_id: r.transaction_id,
                paid_at: r.paid_at,
            })
            .collect(),
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

async fn find_inner(conn: &mut PgConnection, order_id: &str, lock: bool) -> AppResult<Option<WorkOrder>> {
    let sql = format!(
        "SELECT {} FROM work_orders WHERE order_id = $1{}",
        ORDER_COLUMNS,
        if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, WorkOrderRow>(&sql)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(Some(hydrate(conn, row).await?)),
        None => Ok(None),
    }
}

pub async fn find_by_order_id(conn: &mut PgConnection, order_id: &str) -> AppResult<Option<WorkOrder>> {
    find_inner(conn, order_id, false).await
}

/// Loads the order and locks its row; history positions are computed under
/// this lock.
pub async fn find_by_order_id_for_update(conn: &mut PgConnection, order_id: &str) -> AppResult<Option<WorkOrder>> {
    find_inner(conn, order_id, true).await
}

pub async fn insert(conn: &mut PgConnection, order: &WorkOrder) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO work_orders (id, order_id, customer_id, branch_id, project_id, project_type,
                                 project_category, status, initial_remark, instructions,
                                 technician_id, assigned_by, assigned_at, created_by,
                                 predecessor_order_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        "#,
    )
    .bind(order.id)
    .bind(&order.order_id)
    .bind(order.customer_id)
    .bind(order.branch_id)
    .bind(&order.project_id)
    .bind(&order.project_type)
    .bind(order.project_category.as_str())
    .bind(order.status.as_str())
    .bind(&order.initial_remark)
    .bind(&order.instructions)
    .bind(order.technician_id)
    .bind(order.assigned_by)
    .bind(order.assigned_at)
    .bind(order.created_by)
    .bind(&order.predecessor_order_id)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    for (position, entry) in order.status_history.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO work_order_history (id, work_order_id, position, status, remark, updated_by, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.id)
        .bind(position as i32 + 1)
        .bind(entry.status.as_str())
        .bind(&entry.remark)
        .bind(entry.updated_by)
        .bind(entry.updated_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Persists the mutable header fields after a transition.
pub async fn update(conn: &mut PgConnection, order: &WorkOrder) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE work_orders
        SET status = $2, technician_id = $3, assigned_by = $4, assigned_at = $5,
            instructions = $6, updated_at = $7
        WHERE id = $1
        "#,
    )
    .bind(order.id)
    .bind(order.status.as_str())
    .bind(order.technician_id)
    .bind(order.assigned_by)
    .bind(order.assigned_at)
    .bind(&order.instructions)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Stores one history entry. Appended entries take the next position after
/// the current maximum, prepended ones the position before the minimum, so
/// reading by position reproduces the in-memory order.
pub async fn insert_history(conn: &mut PgConnection, work_order_id: Uuid, change: &HistoryChange) -> AppResult<()> {
    let position_sql = match change.placement {
        HistoryPlacement::Append => "COALESCE(MAX(position), 0) + 1",
        HistoryPlacement::Prepend => "COALESCE(MIN(position), 1) - 1",
    };
    let sql = format!(
        "INSERT INTO work_order_history (id, work_order_id, position, status, remark, updated_by, updated_at) \
         SELECT $1, $2, {}, $3, $4, $5, $6 FROM work_order_history WHERE work_order_id = $2",
        position_sql
    );
    sqlx::query(&sql)
        .bind(Uuid::new_v4())
        .bind(work_order_id)
        .bind(change.entry.status.as_str())
        .bind(&change.entry.remark)
        .bind(change.entry.updated_by)
        .bind(change.entry.updated_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn insert_items_used(
    conn: &mut PgConnection,
    work_order_id: Uuid,
    bill_id: Uuid,
    items: &[ItemUsed],
) -> AppResult<()> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO work_order_items_used (id, work_order_id, bill_id, item_id, serial_number, quantity, used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(work_order_id)
        .bind(bill_id)
        .bind(&item.item_id)
        .bind(&item.serial_number)
        .bind(item.quantity)
        .bind(item.used_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Drops the usage recorded for a bill whose stock went back to the technician.
pub async fn remove_items_used(conn: &mut PgConnection, bill_id: Uuid) -> AppResult<()> {
    sqlx::query("DELETE FROM work_order_items_used WHERE bill_id = $1")
        .bind(bill_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn insert_billing_info(
    conn: &mut PgConnection,
    work_order_id: Uuid,
    info: &BillingInfo,
    now: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO work_order_billing_info (id, work_order_id, bill_id, bill_number, amount,
                                             payment_method, transaction_id, paid_at, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(work_order_id)
    .bind(info.bill_id)
    .bind(&info.bill_number)
    .bind(info.amount)
    .bind(&info.payment_method)
    .bind(&info.transaction_id)
    .bind(info.paid_at)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn list(
    conn: &mut PgConnection,
    filter: &WorkOrderFilter,
    pagination: &Pagination,
) -> AppResult<(Vec<WorkOrderSummary>, u64)> {
    let status = filter.status.map(|s| s.as_str());
    let rows = sqlx::query_as::<_, WorkOrderSummary>(
        r#"
        SELECT w.id, w.order_id, w.customer_id, c.name AS customer_name, w.branch_id,
               w.project_id, w.project_type, w.project_category, w.status, w.technician_id,
               CASE WHEN u.id IS NULL THEN NULL ELSE u.first_name || ' ' || u.last_name END AS technician_name,
               w.created_at, w.updated_at
        FROM work_orders w
        JOIN customers c ON c.id = w.customer_id
        LEFT JOIN users u ON u.id = w.technician_id
        WHERE ($1::UUID IS NULL OR w.branch_id = $1)
          AND ($2::UUID IS NULL OR w.technician_id = $2)
          AND ($3::UUID IS NULL OR w.customer_id = $3)
          AND ($4::TEXT IS NULL OR w.status = $4)
        ORDER BY w.created_at DESC
        LIMIT $5 OFFSET $6
        "#,
    )
    .bind(filter.branch_id)
    .bind(filter.technician_id)
    .bind(filter.customer_id)
    .bind(status)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&mut *conn)
    .await?;

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM work_orders w
        WHERE ($1::UUID IS NULL OR w.branch_id = $1)
          AND ($2::UUID IS NULL OR w.technician_id = $2)
          AND ($3::UUID IS NULL OR w.customer_id = $3)
          AND ($4::TEXT IS NULL OR w.status = $4)
        "#,
    )
    .bind(filter.branch_id)
    .bind(filter.technician_id)
    .bind(filter.customer_id)
    .bind(status)
    .fetch_one(&mut *conn)
    .await?;

    Ok((rows, total as u64))
}

/// Statuses of every order raised for one customer project
pub async fn statuses_for_project(
    conn: &mut PgConnection,
    customer_id: Uuid,
    project_id: &str,
) -> AppResult<Vec<WorkOrderStatus>> {
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT status FROM work_orders WHERE customer_id = $1 AND project_id = $2",
    )
    .bind(customer_id)
    .bind(project_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut statuses = Vec::with_capacity(rows.len());
    for status in rows {
        statuses.push(status.parse()?);
    }
    Ok(statuses)
}
