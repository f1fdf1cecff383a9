//! Cross-table serial lookups

use shared::ledger::SerialLocation;
use shared::{CustomerType, HoldingStatus};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, FromRow)]
struct BranchStockRow {
    item_id: String,
    item_name: String,
    branch_id: Uuid,
    branch_name: String,
}

#[derive(Debug, FromRow)]
struct TechnicianRow {
    technician_id: Uuid,
    first_name: String,
    last_name: String,
    item_id: String,
    status: String,
}

#[derive(Debug, FromRow)]
struct BillRow {
    bill_number: String,
    customer_name: String,
}

#[derive(Debug, FromRow)]
struct SalesBillRow {
    bill_number: String,
    customer_type: String,
    customer_name: String,
}

/// Every place `serial_number` currently occupies, in the order branch stock,
/// technician holding (active or staged for return), non-rejected technician
/// bill, sales bill.
pub async fn locate_serial(conn: &mut PgConnection, serial_number: &str) -> AppResult<Vec<SerialLocation>> {
    let mut locations = Vec::new();

    let stock = sqlx::query_as::<_, BranchStockRow>(
        r#"
        SELECT s.item_id, i.name AS item_name, s.branch_id, b.name AS branch_name
        FROM stock_entries s
        JOIN items i ON i.id = s.item_id
        JOIN branches b ON b.id = s.branch_id
        WHERE s.serial_number = $1
        "#,
    )
    .bind(serial_number)
    .fetch_all(&mut *conn)
    .await?;
    locations.extend(stock.into_iter().map(|r| SerialLocation::BranchStock {
        item_id: r.item_id,
        item_name: r.item_name,
        branch_id: r.branch_id,
        branch_name: r.branch_name,
    }));

    let held = sqlx::query_as::<_, TechnicianRow>(
        r#"
        SELECT ti.technician_id, u.first_name, u.last_name, ti.item_id, ts.status
        FROM technician_serials ts
        JOIN technician_inventory ti ON ti.id = ts.inventory_id
        JOIN users u ON u.id = ti.technician_id
        WHERE ts.serial_number = $1 AND ts.status IN ('active', 'returned')
        "#,
    )
    .bind(serial_number)
    .fetch_all(&mut *conn)
    .await?;
    for row in held {
        let technician_name = format!("{} {}", row.first_name, row.last_name);
        locations.push(match row.status.parse::<HoldingStatus>()? {
            HoldingStatus::Returned => SerialLocation::PendingReturn {
                technician_id: row.technician_id,
                technician_name,
                item_id: row.item_id,
            },
            _ => SerialLocation::Technician {
                technician_id: row.technician_id,
                technician_name,
                item_id: row.item_id,
            },
        });
    }

    let billed = sqlx::query_as::<_, BillRow>(
        r#"
        SELECT b.bill_number, c.name AS customer_name
        FROM bill_items bi
        JOIN bills b ON b.id = bi.bill_id
        JOIN customers c ON c.id = b.customer_id
        WHERE bi.serial_number = $1 AND b.status <> 'rejected'
        "#,
    )
    .bind(serial_number)
    .fetch_all(&mut *conn)
    .await?;
    locations.extend(billed.into_iter().map(|r| SerialLocation::TechnicianBill {
        bill_number: r.bill_number,
        customer_name: r.customer_name,
    }));

    let sold = sqlx::query_as::<_, SalesBillRow>(
        r#"
        SELECT sb.bill_number, sb.customer_type, sb.customer_name
        FROM sales_bill_items si
        JOIN sales_bills sb ON sb.id = si.sales_bill_id
        WHERE si.serial_number = $1
        "#,
    )
    .bind(serial_number)
    .fetch_all(&mut *conn)
    .await?;
    for row in sold {
        locations.push(SerialLocation::SalesBill {
            bill_number: row.bill_number,
            customer_type: row.customer_type.parse::<CustomerType>()?,
            customer_name: row.customer_name,
        });
    }

    Ok(locations)
}
