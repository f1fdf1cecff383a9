//! Technician bills and their approval
//!
//! A bill consumes the technician's holdings and moves the work order to
//! pending approval. Rejection hands the stock back and reopens the order for
//! a new bill.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::notification::PushMessage;
use shared::numbering::TECHNICIAN_BILL_PREFIX;
use shared::payment::BillKind;
use shared::{
    next_status, validate_payment_amount, AuthContext, Bill, BillHeader, BillItem,
    BillPaymentMethod, BillingInfo, CustomerType, DomainError, ItemUsed, PaymentParty,
    RelatedBill, Role, StockUnit, TransactionRecord, TransactionType, Transition, WorkOrder,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::repo;
use crate::services::holdings::HoldingSet;
use crate::services::NotificationService;

#[derive(Clone)]
pub struct BillingService {
    db: PgPool,
    notifier: NotificationService,
}

#[derive(Debug, Deserialize, serde::Serialize)]
pub struct BillLineInput {
    pub item_id: String,
    pub serial_number: Option<String>,
    pub quantity: Option<i32>,
}

/// Input for a technician bill
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBillInput {
    #[validate(length(min = 1, message = "Order ID is required"))]
    pub order_id: String,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<BillLineInput>,
    pub amount_paid: Option<Decimal>,
    pub payment_method: Option<BillPaymentMethod>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectBillInput {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct BillQuery {
    pub order_id: String,
}

impl BillingService {
    pub fn new(db: PgPool, notifier: NotificationService) -> Self {
        Self { db, notifier }
    }

    async fn lock_order(conn: &mut PgConnection, order_id: &str) -> AppResult<WorkOrder> {
        let order = repo::work_orders::find_by_order_id_for_update(conn, order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Work order"))?;
        Ok(order)
    }

    /// Loads a bill for a manager decision in the caller's branch.
    async fn lock_bill(ctx: &AuthContext, conn: &mut PgConnection, bill_id: Uuid) -> AppResult<Bill> {
        ctx.require_role(&[Role::Admin, Role::Manager])?;
        let bill = repo::bills::find_for_update(conn, bill_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Bill"))?;
        ctx.ensure_branch(bill.branch_id)?;
        Ok(bill)
    }

    /// Bills the work done on an order from the technician's own stock.
    pub async fn create_bill(&self, ctx: &AuthContext, input: CreateBillInput) -> AppResult<Bill> {
        ctx.require_role(&[Role::Technician])?;
        input.validate()?;
        let amount_paid = input.amount_paid.unwrap_or(Decimal::ZERO);
        if amount_paid > Decimal::ZERO {
            validate_payment_amount(amount_paid).map_err(|m| AppError::validation("amount_paid", m))?;
        }
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        let mut order = Self::lock_order(&mut tx, &input.order_id).await?;
        ctx.ensure_assigned_technician(order.technician_id)?;
        next_status(order.status, Transition::SubmitBill)?;

        let customer = repo::customers::find(&mut tx, order.customer_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Customer"))?;

        let mut holdings = HoldingSet::new(ctx.user_id, order.branch_id);
        let mut lines = Vec::with_capacity(input.items.len());
        let mut used = Vec::new();

        for line in &input.items {
            let item = repo::items::find(&mut tx, &line.item_id)
                .await?
                .ok_or_else(|| DomainError::NotFound(format!("Item not found: {}", line.item_id)))?;

            if item.is_service() {
                let quantity = line.quantity.unwrap_or(1);
                if quantity <= 0 {
                    return Err(DomainError::validation("Quantity must be greater than zero").into());
                }
                lines.push(BillItem::priced(&item, None, quantity));
                continue;
            }

            let unit = StockUnit::for_item(item.item_type, line.serial_number.as_deref(), line.quantity)?;
            let holding = holdings.existing(&mut tx, &item.id).await?;
            match &unit {
                StockUnit::Serial(serial) => holding.mark_used(serial, &order.order_id, now)?,
                StockUnit::Quantity(quantity) => holding.consume_generic(*quantity, now)?,
            }

            used.push(ItemUsed {
                item_id: item.id.clone(),
                serial_number: unit.serial_number().map(str::to_string),
                quantity: unit.quantity(),
                used_at: now,
            });
            lines.push(BillItem::priced(
                &item,
                unit.serial_number().map(str::to_string),
                unit.quantity(),
            ));
        }

        let bill_number = repo::sequences::next_document_number(&mut tx, TECHNICIAN_BILL_PREFIX, now).await?;
        let bill = Bill::new(
            BillHeader {
                bill_number,
                customer_id: customer.id,
                work_order_id: order.id,
                order_id: order.order_id.clone(),
                technician_id: ctx.user_id,
                branch_id: order.branch_id,
            },
            lines,
            amount_paid,
            input.payment_method.unwrap_or(BillPaymentMethod::Pending),
            input.transaction_id.filter(|t| !t.trim().is_empty()),
            now,
        )?;
        let change = order.submit_bill(&bill.bill_number, ctx.user_id, now)?;

        holdings.save_all(&mut tx).await?;
        repo::bills::insert(&mut tx, &bill).await?;
        repo::work_orders::insert_items_used(&mut tx, order.id, bill.id, &used).await?;
        repo::work_orders::update(&mut tx, &order).await?;
        repo::work_orders::insert_history(&mut tx, order.id, &change).await?;

        if bill.amount_paid > Decimal::ZERO {
            let record = TransactionRecord::new(
                PaymentParty {
                    customer_id: customer.id,
                    customer_type: CustomerType::Customer,
                    customer_name: customer.name.clone(),
                    branch_id: Some(order.branch_id),
                },
                TransactionType::PaymentReceived,
                bill.amount_paid,
                bill.payment_method.as_str(),
                bill.transaction_id.clone(),
                None,
                vec![RelatedBill {
                    bill_id: bill.id,
                    bill_kind: BillKind::Technician,
                    bill_number: bill.bill_number.clone(),
                    allocated_amount: bill.amount_paid,
                }],
                None,
                ctx.user_id,
                now,
            );
            repo::transactions::insert(&mut tx, &record).await?;
        }

        tx.commit().await?;

        tracing::info!(
            "Bill {} for order {} created: total {}, paid {}",
            bill.bill_number,
            bill.order_id,
            bill.total_amount,
            bill.amount_paid
        );
        Ok(bill)
    }

    /// Approves a pending bill and completes its order and project.
    pub async fn approve_bill(&self, ctx: &AuthContext, bill_id: Uuid) -> AppResult<Bill> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let mut bill = Self::lock_bill(ctx, &mut tx, bill_id).await?;
        bill.approve()?;

        let mut order = Self::lock_order(&mut tx, &bill.order_id).await?;
        let change = order.approve_bill(&bill.bill_number, ctx.user_id, now)?;

        let technician_name = repo::users::find(&mut tx, bill.technician_id)
            .await?
            .map(|u| u.full_name());

        repo::bills::update(&mut tx, &bill).await?;
        repo::work_orders::update(&mut tx, &order).await?;
        repo::work_orders::insert_history(&mut tx, order.id, &change).await?;
        repo::work_orders::insert_billing_info(
            &mut tx,
            order.id,
            &BillingInfo {
                bill_id: bill.id,
                bill_number: bill.bill_number.clone(),
                amount: bill.total_amount,
                payment_method: bill.payment_method.to_string(),
                transaction_id: bill.transaction_id.clone(),
                paid_at: bill.paid_at,
            },
            now,
        )
        .await?;
        repo::customers::complete_project(
            &mut tx,
            order.customer_id,
            &order.project_id,
            technician_name.as_deref(),
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!("Bill {} approved; order {} completed", bill.bill_number, order.order_id);
        Ok(bill)
    }

    /// Rejects a bill and reverts the stock it consumed.
    ///
    /// Used serials go back to active and generic units are added back, in
    /// the same transaction that flips the bill. A second rejection is
    /// refused before anything is touched.
    pub async fn reject_bill(&self, ctx: &AuthContext, bill_id: Uuid, input: RejectBillInput) -> AppResult<Bill> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let mut bill = Self::lock_bill(ctx, &mut tx, bill_id).await?;
        let reverted = bill.reject(&input.reason)?;

        let actions: Vec<_> = reverted.iter().filter_map(BillItem::reversal).collect();
        let mut holdings = HoldingSet::new(bill.technician_id, bill.branch_id);
        holdings.apply(&mut tx, actions, HashMap::new(), now).await?;

        let mut order = Self::lock_order(&mut tx, &bill.order_id).await?;
        let reason = bill.rejection_reason.clone().unwrap_or_default();
        let change = order.reject_bill(&bill.bill_number, &reason, ctx.user_id, now)?;

        holdings.save_all(&mut tx).await?;
        repo::bills::update(&mut tx, &bill).await?;
        repo::work_orders::remove_items_used(&mut tx, bill.id).await?;
        repo::work_orders::update(&mut tx, &order).await?;
        repo::work_orders::insert_history(&mut tx, order.id, &change).await?;

        tx.commit().await?;

        tracing::info!(
            "Bill {} rejected; {} line(s) reverted to technician {}",
            bill.bill_number,
            reverted.len(),
            bill.technician_id
        );
        self.notifier
            .notify_user(
                bill.technician_id,
                PushMessage::bill_rejected(&bill.bill_number, &reason),
            )
            .await;
        Ok(bill)
    }

    /// Bills raised against one order
    pub async fn list_bills(&self, ctx: &AuthContext, query: BillQuery) -> AppResult<Vec<Bill>> {
        let mut conn = self.db.acquire().await?;
        let order = repo::work_orders::find_by_order_id(&mut conn, &query.order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Work order"))?;
        match ctx.role {
            Role::Technician => ctx.ensure_assigned_technician(order.technician_id)?,
            _ => ctx.ensure_branch(order.branch_id)?,
        }
        repo::bills::list_for_order(&mut conn, &order.order_id).await
    }
}
