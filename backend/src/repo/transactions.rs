//! Transaction history ledger

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{PaymentDetails, RelatedBill, TransactionRecord};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    customer_id: Uuid,
    customer_type: String,
    customer_name: String,
    transaction_type: String,
    amount: Decimal,
    description: String,
    payment_method: String,
    transaction_id: Option<String>,
    payment_details: Option<Json<PaymentDetails>>,
    status: String,
    notes: Option<String>,
    branch_id: Option<Uuid>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct AllocationRow {
    transaction_id: Uuid,
    bill_id: Uuid,
    bill_kind: String,
    bill_number: String,
    allocated_amount: Decimal,
}

/// Appends a record with its bill allocations.
pub async fn insert(conn: &mut PgConnection, record: &TransactionRecord) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transaction_history (id, customer_id, customer_type, customer_name,
                                         transaction_type, amount, description, payment_method,
                                         transaction_id, payment_details, status, notes, branch_id,
                                         created_by, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        "#,
    )
    .bind(record.id)
    .bind(record.customer_id)
    .bind(record.customer_type.as_str())
    .bind(&record.customer_name)
    .bind(record.transaction_type.as_str())
    .bind(record.amount)
    .bind(&record.description)
    .bind(&record.payment_method)
    .bind(&record.transaction_id)
    .bind(record.payment_details.as_ref().map(Json))
    .bind(&record.status)
    .bind(&record.notes)
    .bind(record.branch_id)
    .bind(record.created_by)
    .bind(record.created_at)
    .execute(&mut *conn)
    .await?;

    for (position, related) in record.related_bills.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO transaction_bill_allocations (id, transaction_id, position, bill_id,
                                                      bill_kind, bill_number, allocated_amount)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.id)
        .bind(position as i32)
        .bind(related.bill_id)
        .bind(related.bill_kind.as_str())
        .bind(&related.bill_number)
        .bind(related.allocated_amount)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Newest first
pub async fn list_for_customer(conn: &mut PgConnection, customer_id: Uuid) -> AppResult<Vec<TransactionRecord>> {
    let rows = sqlx::query_as::<_, TransactionRow>(
        r#"
        SELECT id, customer_id, customer_type, customer_name, transaction_type, amount, description,
               payment_method, transaction_id, payment_details, status, notes, branch_id,
               created_by, created_at
        FROM transaction_history
        WHERE customer_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(customer_id)
    .fetch_all(&mut *conn)
    .await?;

    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let allocations = sqlx::query_as::<_, AllocationRow>(
        r#"
        SELECT transaction_id, bill_id, bill_kind, bill_number, allocated_amount
        FROM transaction_bill_allocations
        WHERE transaction_id = ANY($1)
        ORDER BY position
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_record: HashMap<Uuid, Vec<RelatedBill>> = HashMap::new();
    for allocation in allocations {
        by_record
            .entry(allocation.transaction_id)
            .or_default()
            .push(RelatedBill {
                bill_kind: allocation.bill_kind.parse()?,
                bill_id: allocation.bill_id,
                bill_number: allocation.bill_number,
                allocated_amount: allocation.allocated_amount,
            });
    }

    rows.into_iter()
        .map(|row| -> AppResult<TransactionRecord> {
            Ok(TransactionRecord {
                related_bills: by_record.remove(&row.id).unwrap_or_default(),
                customer_type: row.customer_type.parse()?,
                transaction_type: row.transaction_type.parse()?,
                payment_details: row.payment_details.map(|d| d.0),
                id: row.id,
                customer_id: row.customer_id,
                customer_name: row.customer_name,
                amount: row.amount,
                description: row.description,
                payment_method: row.payment_method,
                transaction_id: row.transaction_id,
                status: row.status,
                notes: row.notes,
                branch_id: row.branch_id,
                created_by: row.created_by,
                created_at: row.created_at,
            })
        })
        .collect()
}
