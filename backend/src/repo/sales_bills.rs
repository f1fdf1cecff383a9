//! Counter sales bills

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{CustomerType, PaymentDetails, SalesBill, SalesBillItem};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, FromRow)]
struct SalesBillRow {
    id: Uuid,
    bill_number: String,
    customer_type: String,
    customer_id: Uuid,
    customer_name: String,
    customer_phone: String,
    subtotal: Decimal,
    total: Decimal,
    paid_amount: Decimal,
    due_amount: Decimal,
    received_amount: Decimal,
    payment_status: String,
    payment_method: String,
    transaction_id: Option<String>,
    payment_details: Json<PaymentDetails>,
    notes: Option<String>,
    branch_id: Uuid,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SalesItemRow {
    sales_bill_id: Uuid,
    item_id: String,
    item_name: String,
    serial_number: Option<String>,
    quantity: i32,
    unit_price: Decimal,
    total_price: Decimal,
}

#[derive(Debug, Default, Clone)]
pub struct SalesBillFilter {
    pub customer_type: Option<CustomerType>,
    pub customer_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
}

const SALES_COLUMNS: &str = "id, bill_number, customer_type, customer_id, customer_name, \
     customer_phone, subtotal, total, paid_amount, due_amount, received_amount, payment_status, \
     payment_method, transaction_id, payment_details, notes, branch_id, created_by, created_at, \
     updated_at";

async fn attach_items(conn: &mut PgConnection, rows: Vec<SalesBillRow>) -> AppResult<Vec<SalesBill>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let items = sqlx::query_as::<_, SalesItemRow>(
        r#"
        SELECT sales_bill_id, item_id, item_name, serial_number, quantity, unit_price, total_price
        FROM sales_bill_items
        WHERE sales_bill_id = ANY($1)
        ORDER BY position
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_bill: HashMap<Uuid, Vec<SalesBillItem>> = HashMap::new();
    for item in items {
        by_bill.entry(item.sales_bill_id).or_default().push(SalesBillItem {
            item_id: item.item_id,
            item_name: item.item_name,
            serial_number: item.serial_number,
            quantity: item.quantity,
            unit_price: item.unit_price,
            total_price: item.total_price,
        });
    }

    rows.into_iter()
        .map(|row| -> AppResult<SalesBill> {
            Ok(SalesBill {
                items: by_bill.remove(&row.id).unwrap_or_default(),
                customer_type: row.customer_type.parse()?,
                payment_status: row.payment_status.parse()?,
                payment_method: row.payment_method.parse()?,
                payment_details: row.payment_details.0,
                id: row.id,
                bill_number: row.bill_number,
                customer_id: row.customer_id,
                customer_name: row.customer_name,
                customer_phone: row.customer_phone,
                subtotal: row.subtotal,
                total: row.total,
                paid_amount: row.paid_amount,
                due_amount: row.due_amount,
                received_amount: row.received_amount,
                transaction_id: row.transaction_id,
                notes: row.notes,
                branch_id: row.branch_id,
                created_by: row.created_by,
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
        })
        .collect()
}

pub async fn insert(conn: &mut PgConnection, bill: &SalesBill) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales_bills (id, bill_number, customer_type, customer_id, customer_name,
                                 customer_phone, subtotal, total, paid_amount, due_amount,
                                 received_amount, payment_status, payment_method, transaction_id,
                                 payment_details, notes, branch_id, created_by, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
        "#,
    )
    .bind(bill.id)
    .bind(&bill.bill_number)
    .bind(bill.customer_type.as_str())
    .bind(bill.customer_id)
    .bind(&bill.customer_name)
    .bind(&bill.customer_phone)
    .bind(bill.subtotal)
    .bind(bill.total)
    .bind(bill.paid_amount)
    .bind(bill.due_amount)
    .bind(bill.received_amount)
    .bind(bill.payment_status.as_str())
    .bind(bill.payment_method.as_str())
    .bind(&bill.transaction_id)
    .bind(Json(&bill.payment_details))
    .bind(&bill.notes)
    .bind(bill.branch_id)
    .bind(bill.created_by)
    .bind(bill.created_at)
    .bind(bill.updated_at)
    .execute(&mut *conn)
    .await?;

    for (position, item) in bill.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO sales_bill_items (id, sales_bill_id, position, item_id, item_name,
                                          serial_number, quantity, unit_price, total_price)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(bill.id)
        .bind(position as i32)
        .bind(&item.item_id)
        .bind(&item.item_name)
        .bind(&item.serial_number)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.total_price)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn find_inner(conn: &mut PgConnection, id: Uuid, lock: bool) -> AppResult<Option<SalesBill>> {
    let sql = format!(
        "SELECT {} FROM sales_bills WHERE id = $1{}",
        SALES_COLUMNS,
        if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, SalesBillRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(attach_items(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

pub async fn find(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<SalesBill>> {
    find_inner(conn, id, false).await
}

pub async fn find_for_update(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<SalesBill>> {
    find_inner(conn, id, true).await
}

/// Writes back the payment state of a bill.
pub async fn update_payment(conn: &mut PgConnection, bill: &SalesBill) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE sales_bills
        SET paid_amount = $2, due_amount = $3, received_amount = $4, payment_status = $5,
            payment_method = $6, transaction_id = $7, payment_details = $8, updated_at = $9
        WHERE id = $1
        "#,
    )
    .bind(bill.id)
    .bind(bill.paid_amount)
    .bind(bill.due_amount)
    .bind(bill.received_amount)
    .bind(bill.payment_status.as_str())
    .bind(bill.payment_method.as_str())
    .bind(&bill.transaction_id)
    .bind(Json(&bill.payment_details))
    .bind(bill.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Locks the bills of one buyer that still have a due, oldest first.
pub async fn outstanding(
    conn: &mut PgConnection,
    customer_type: CustomerType,
    customer_id: Uuid,
) -> AppResult<Vec<SalesBill>> {
    let sql = format!(
        "SELECT {} FROM sales_bills \
         WHERE customer_type = $1 AND customer_id = $2 AND due_amount > 0 \
         ORDER BY created_at FOR UPDATE",
        SALES_COLUMNS
    );
    let rows = sqlx::query_as::<_, SalesBillRow>(&sql)
        .bind(customer_type.as_str())
        .bind(customer_id)
        .fetch_all(&mut *conn)
        .await?;

    attach_items(conn, rows).await
}

pub async fn list(conn: &mut PgConnection, filter: &SalesBillFilter) -> AppResult<Vec<SalesBill>> {
    let sql = format!(
        "SELECT {} FROM sales_bills \
         WHERE ($1::TEXT IS NULL OR customer_type = $1) \
           AND ($2::UUID IS NULL OR customer_id = $2) \
           AND ($3::UUID IS NULL OR branch_id = $3) \
         ORDER BY created_at DESC",
        SALES_COLUMNS
    );
    let rows = sqlx::query_as::<_, SalesBillRow>(&sql)
        .bind(filter.customer_type.map(|t| t.as_str()))
        .bind(filter.customer_id)
        .bind(filter.branch_id)
        .fetch_all(&mut *conn)
        .await?;

    attach_items(conn, rows).await
}
