//! Technician bills

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{Bill, BillItem};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, FromRow)]
struct BillRow {
    id: Uuid,
    bill_number: String,
    customer_id: Uuid,
    work_order_id: Uuid,
    order_id: String,
    technician_id: Uuid,
    branch_id: Uuid,
    total_amount: Decimal,
    amount_paid: Decimal,
    amount_due: Decimal,
    status: String,
    extended_payment_status: String,
    rejection_reason: Option<String>,
    is_reverted: bool,
    payment_method: String,
    transaction_id: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct BillItemRow {
    bill_id: Uuid,
    item_id: String,
    name: String,
    item_type: String,
    serial_number: Option<String>,
    quantity: i32,
    price: Decimal,
    amount: Decimal,
}

const BILL_COLUMNS: &str = "id, bill_number, customer_id, work_order_id, order_id, technician_id, \
     branch_id, total_amount, amount_paid, amount_due, status, extended_payment_status, \
     rejection_reason, is_reverted, payment_method, transaction_id, paid_at, created_at";

async fn attach_items(conn: &mut PgConnection, rows: Vec<BillRow>) -> AppResult<Vec<Bill>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let items = sqlx::query_as::<_, BillItemRow>(
        r#"
        SELECT bill_id, item_id, name, item_type, serial_number, quantity, price, amount
        FROM bill_items
        WHERE bill_id = ANY($1)
        ORDER BY position
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_bill: HashMap<Uuid, Vec<BillItem>> = HashMap::new();
    for item in items {
        by_bill.entry(item.bill_id).or_default().push(BillItem {
            item_type: item.item_type.parse()?,
            item_id: item.item_id,
            name: item.name,
            serial_number: item.serial_number,
            quantity: item.quantity,
            price: item.price,
            amount: item.amount,
        });
    }

    rows.into_iter()
        .map(|row| -> AppResult<Bill> {
            Ok(Bill {
                items: by_bill.remove(&row.id).unwrap_or_default(),
                status: row.status.parse()?,
                extended_payment_status: row.extended_payment_status.parse()?,
                payment_method: row.payment_method.parse()?,
                id: row.id,
                bill_number: row.bill_number,
                customer_id: row.customer_id,
                work_order_id: row.work_order_id,
                order_id: row.order_id,
                technician_id: row.technician_id,
                branch_id: row.branch_id,
                total_amount: row.total_amount,
                amount_paid: row.amount_paid,
                amount_due: row.amount_due,
                rejection_reason: row.rejection_reason,
                is_reverted: row.is_reverted,
                transaction_id: row.transaction_id,
                paid_at: row.paid_at,
                created_at: row.created_at,
            })
        })
        .collect()
}

pub async fn insert(conn: &mut PgConnection, bill: &Bill) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO bills (id, bill_number, customer_id, work_order_id, order_id, technician_id,
                           branch_id, total_amount, amount_paid, amount_due, status,
                           extended_payment_status, rejection_reason, is_reverted, payment_method,
                           transaction_id, paid_at, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
    )
    .bind(bill.id)
    .bind(&bill.bill_number)
    .bind(bill.customer_id)
    .bind(bill.work_order_id)
    .bind(&bill.order_id)
    .bind(bill.technician_id)
    .bind(bill.branch_id)
    .bind(bill.total_amount)
    .bind(bill.amount_paid)
    .bind(bill.amount_due)
    .bind(bill.status.as_str())
    .bind(bill.extended_payment_status.as_str())
    .bind(&bill.rejection_reason)
    .bind(bill.is_reverted)
    .bind(bill.payment_method.as_str())
    .bind(&bill.transaction_id)
    .bind(bill.paid_at)
    .bind(bill.created_at)
    .execute(&mut *conn)
    .await?;

    for (position, item) in bill.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO bill_items (id, bill_id, position, item_id, name, item_type, serial_number,
                                    quantity, price, amount)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(bill.id)
        .bind(position as i32)
        .bind(&item.item_id)
        .bind(&item.name)
        .bind(item.item_type.as_str())
        .bind(&item.serial_number)
        .bind(item.quantity)
        .bind(item.price)
        .bind(item.amount)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn find_for_update(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<Bill>> {
    let sql = format!("SELECT {} FROM bills WHERE id = $1 FOR UPDATE", BILL_COLUMNS);
    let row = sqlx::query_as::<_, BillRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(attach_items(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

/// Writes back status and payment fields.
pub async fn update(conn: &mut PgConnection, bill: &Bill) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE bills
        SET amount_paid = $2, amount_due = $3, status = $4, extended_payment_status = $5,
            rejection_reason = $6, is_reverted = $7, payment_method = $8, transaction_id = $9,
            paid_at = $10
        WHERE id = $1
        "#,
    )
    .bind(bill.id)
    .bind(bill.amount_paid)
    .bind(bill.amount_due)
    .bind(bill.status.as_str())
    .bind(bill.extended_payment_status.as_str())
    .bind(&bill.rejection_reason)
    .bind(bill.is_reverted)
    .bind(bill.payment_method.as_str())
    .bind(&bill.transaction_id)
    .bind(bill.paid_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn list_for_order(conn: &mut PgConnection, order_id: &str) -> AppResult<Vec<Bill>> {
    let sql = format!(
        "SELECT {} FROM bills WHERE order_id = $1 ORDER BY created_at",
        BILL_COLUMNS
    );
    let rows = sqlx::query_as::<_, BillRow>(&sql)
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

    attach_items(conn, rows).await
}

/// Locks every non-rejected bill of the customer that still has a due.
pub async fn outstanding_for_customer(conn: &mut PgConnection, customer_id: Uuid) -> AppResult<Vec<Bill>> {
    let sql = format!(
        "SELECT {} FROM bills \
         WHERE customer_id = $1 AND status <> 'rejected' AND amount_due > 0 \
         ORDER BY created_at FOR UPDATE",
        BILL_COLUMNS
    );
    let rows = sqlx::query_as::<_, BillRow>(&sql)
        .bind(customer_id)
        .fetch_all(&mut *conn)
        .await?;

    attach_items(conn, rows).await
}
