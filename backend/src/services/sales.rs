//! Counter sales and payment collection
//!
//! Sales bills draw stock straight from the manager's branch shelf. Payments
//! are taken against one bill, or spread over a buyer's open bills oldest
//! first.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::payment::{allocate_fifo, summarize, Allocation, OutstandingBill, Payable, PaymentSummary};
use shared::{
    validate_ifsc, validate_payment_amount, AuthContext, BillParty, BillPaymentMethod,
    CustomerType, DomainError, PaymentDetails, PaymentMethod, PaymentParty, RelatedBill, Role,
    SalesBill, SalesBillItem, StockUnit, TransactionRecord, TransactionType,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::repo::{self, sales_bills::SalesBillFilter};

#[derive(Clone)]
pub struct SalesService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SalesLineInput {
    pub item_id: String,
    pub serial_number: Option<String>,
    pub quantity: Option<i32>,
}

/// Bill for a dealer or distributor, identified by the caller
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSalesBillInput {
    pub customer_type: CustomerType,
    pub customer_id: Uuid,
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub customer_name: String,
    #[serde(default)]
    pub customer_phone: String,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<SalesLineInput>,
    pub paid_amount: Option<Decimal>,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payment_details: PaymentDetails,
    pub notes: Option<String>,
}

/// Bill for a registered customer
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerBillInput {
    pub customer_id: Uuid,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<SalesLineInput>,
    pub paid_amount: Option<Decimal>,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payment_details: PaymentDetails,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentInput {
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payment_details: PaymentDetails,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkPaymentInput {
    pub customer_type: CustomerType,
    pub customer_id: Uuid,
    #[serde(flatten)]
    pub payment: PaymentInput,
}

#[derive(Debug, Deserialize)]
pub struct CustomerBulkPaymentInput {
    pub customer_id: Uuid,
    #[serde(flatten)]
    pub payment: PaymentInput,
}

#[derive(Debug, Default, Deserialize)]
pub struct SalesBillQuery {
    pub customer_type: Option<CustomerType>,
    pub customer_id: Option<Uuid>,
}

/// Outcome of a bulk payment
#[derive(Debug, Clone, Serialize)]
pub struct BulkPaymentResult {
    pub transaction: TransactionRecord,
    pub allocations: Vec<Allocation>,
    pub summary: PaymentSummary,
}

/// The buyer and payment terms of a bill being issued
struct Issue {
    party: BillParty,
    lines: Vec<SalesLineInput>,
    paid_amount: Decimal,
    payment_method: PaymentMethod,
    transaction_id: Option<String>,
    payment_details: PaymentDetails,
    notes: Option<String>,
}

fn check_payment(amount: Decimal, method: PaymentMethod, details: &PaymentDetails) -> AppResult<()> {
    validate_payment_amount(amount).map_err(|m| AppError::validation("amount", m))?;
    if method == PaymentMethod::Cheque {
        if let Some(ifsc) = details.cheque_ifsc.as_deref() {
            validate_ifsc(ifsc).map_err(|m| AppError::validation("cheque_ifsc", m))?;
        }
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Technician bills only know cash and online.
fn technician_method(method: PaymentMethod) -> BillPaymentMethod {
    match method {
        PaymentMethod::Cash => BillPaymentMethod::Cash,
        _ => BillPaymentMethod::Online,
    }
}

impl SalesService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_sales_bill(&self, ctx: &AuthContext, input: CreateSalesBillInput) -> AppResult<SalesBill> {
        input.validate()?;
        if input.customer_type == CustomerType::Customer {
            return Err(AppError::validation(
                "customer_type",
                "Sales bills are for dealers and distributors",
            ));
        }
        let issue = Issue {
            party: BillParty {
                customer_type: input.customer_type,
                customer_id: input.customer_id,
                customer_name: input.customer_name.trim().to_string(),
                customer_phone: input.customer_phone.trim().to_string(),
            },
            lines: input.items,
            paid_amount: input.paid_amount.unwrap_or(Decimal::ZERO),
            payment_method: input.payment_method,
            transaction_id: non_empty(input.transaction_id),
            payment_details: input.payment_details,
            notes: non_empty(input.notes),
        };
        self.issue(ctx, issue).await
    }

    pub async fn create_customer_bill(&self, ctx: &AuthContext, input: CreateCustomerBillInput) -> AppResult<SalesBill> {
        input.validate()?;
        let customer = {
            let mut conn = self.db.acquire().await?;
            repo::customers::find(&mut conn, input.customer_id)
                .await?
                .ok_or_else(|| DomainError::not_found("Customer"))?
        };
        ctx.ensure_branch(customer.branch_id)?;

        let issue = Issue {
            party: BillParty {
                customer_type: CustomerType::Customer,
                customer_id: customer.id,
                customer_name: customer.name,
                customer_phone: customer.phone_number,
            },
            lines: input.items,
            paid_amount: input.paid_amount.unwrap_or(Decimal::ZERO),
            payment_method: input.payment_method,
            transaction_id: non_empty(input.transaction_id),
            payment_details: input.payment_details,
            notes: non_empty(input.notes),
        };
        self.issue(ctx, issue).await
    }

    /// Prices the lines for the buyer's tier, withdraws the stock from the
    /// caller's branch and records any upfront payment.
    async fn issue(&self, ctx: &AuthContext, issue: Issue) -> AppResult<SalesBill> {
        ctx.require_role(&[Role::Manager])?;
        let branch_id = ctx.require_branch()?;
        if issue.paid_amount < Decimal::ZERO {
            return Err(AppError::validation("paid_amount", "Paid amount cannot be negative"));
        }
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        let customer_type = issue.party.customer_type;
        let mut items = Vec::with_capacity(issue.lines.len());
        for line in &issue.lines {
            let mut item = repo::items::find_for_update(&mut tx, &line.item_id)
                .await?
                .ok_or_else(|| DomainError::NotFound(format!("Item not found: {}", line.item_id)))?;
            let price = item.price_for(customer_type);

            if item.is_service() {
                let quantity = line.quantity.unwrap_or(1);
                if quantity <= 0 {
                    return Err(DomainError::validation("Quantity must be greater than zero").into());
                }
                items.push(SalesBillItem::new(&item.id, &item.name, None, quantity, price));
                continue;
            }

            let unit = StockUnit::for_item(item.item_type, line.serial_number.as_deref(), line.quantity)?;
            let draws = item.withdraw(branch_id, &unit)?;
            repo::items::apply_draws(&mut tx, &draws).await?;
            items.push(SalesBillItem::new(
                &item.id,
                &item.name,
                unit.serial_number().map(str::to_string),
                unit.quantity(),
                price,
            ));
        }

        let bill_number =
            repo::sequences::next_document_number(&mut tx, customer_type.bill_prefix(), now).await?;
        let mut bill = SalesBill::new(
            bill_number,
            issue.party,
            items,
            issue.payment_method,
            issue.notes,
            branch_id,
            ctx.user_id,
            now,
        )?;

        let paid = issue.paid_amount;
        if paid > Decimal::ZERO {
            check_payment(paid, issue.payment_method, &issue.payment_details)?;
            bill.apply_payment(
                paid,
                issue.payment_method,
                issue.transaction_id,
                &issue.payment_details,
                now,
            )?;
        }

        repo::sales_bills::insert(&mut tx, &bill).await?;
        if paid > Decimal::ZERO {
            let record = Self::single_payment_record(ctx, &bill, paid, None, now);
            repo::transactions::insert(&mut tx, &record).await?;
        }

        tx.commit().await?;

        tracing::info!(
            "Sales bill {} issued to {} {}: total {}, paid {}",
            bill.bill_number,
            bill.customer_type,
            bill.customer_id,
            bill.total,
            bill.paid_amount
        );
        Ok(bill)
    }

    fn single_payment_record(
        ctx: &AuthContext,
        bill: &SalesBill,
        amount: Decimal,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> TransactionRecord {
        TransactionRecord::new(
            PaymentParty {
                customer_id: bill.customer_id,
                customer_type: bill.customer_type,
                customer_name: bill.customer_name.clone(),
                branch_id: Some(bill.branch_id),
            },
            TransactionType::PaymentReceived,
            amount,
            bill.payment_method.as_str(),
            bill.transaction_id.clone(),
            Some(bill.payment_details.clone()),
            vec![RelatedBill {
                bill_id: bill.id,
                bill_kind: bill.bill_kind(),
                bill_number: bill.bill_number.clone(),
                allocated_amount: amount,
            }],
            notes,
            ctx.user_id,
            now,
        )
    }

    /// Takes a payment against a single sales bill.
    pub async fn process_payment(&self, ctx: &AuthContext, bill_id: Uuid, input: PaymentInput) -> AppResult<SalesBill> {
        ctx.require_role(&[Role::Admin, Role::Manager])?;
        check_payment(input.amount, input.payment_method, &input.payment_details)?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        let mut bill = repo::sales_bills::find_for_update(&mut tx, bill_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Bill"))?;
        ctx.ensure_branch(bill.branch_id)?;
        bill.apply_payment(
            input.amount,
            input.payment_method,
            non_empty(input.transaction_id),
            &input.payment_details,
            now,
        )?;

        repo::sales_bills::update_payment(&mut tx, &bill).await?;
        let record = Self::single_payment_record(ctx, &bill, input.amount, non_empty(input.notes), now);
        repo::transactions::insert(&mut tx, &record).await?;

        tx.commit().await?;

        tracing::info!(
            "Payment of {} applied to bill {}; due {}",
            input.amount,
            bill.bill_number,
            bill.due_amount
        );
        Ok(bill)
    }

    /// Spreads a dealer's or distributor's payment over their open bills.
    pub async fn process_bulk_payment(&self, ctx: &AuthContext, input: BulkPaymentInput) -> AppResult<BulkPaymentResult> {
        ctx.require_role(&[Role::Admin, Role::Manager])?;
        if input.customer_type == CustomerType::Customer {
            return Err(AppError::validation(
                "customer_type",
                "Use the customer bulk payment for customers",
            ));
        }
        let payment = input.payment;
        check_payment(payment.amount, payment.payment_method, &payment.payment_details)?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        let mut bills = repo::sales_bills::outstanding(&mut tx, input.customer_type, input.customer_id).await?;
        if let Some(branch) = ctx.branch_scope() {
            bills.retain(|b| b.branch_id == branch);
        }
        let allocations = allocate_fifo(&mut bills, payment.amount)?;

        let transaction_id = non_empty(payment.transaction_id);
        for bill in bills.iter_mut() {
            if !allocations.iter().any(|a| a.bill_id == bill.id) {
                continue;
            }
            bill.payment_method = payment.payment_method;
            bill.payment_details.merge(payment.payment_method, &payment.payment_details);
            if transaction_id.is_some() {
                bill.transaction_id = transaction_id.clone();
            }
            bill.updated_at = now;
            repo::sales_bills::update_payment(&mut tx, bill).await?;
        }

        let (customer_name, branch_id) = bills
            .first()
            .map(|b| (b.customer_name.clone(), Some(b.branch_id)))
            .unwrap_or_default();
        let record = TransactionRecord::new(
            PaymentParty {
                customer_id: input.customer_id,
                customer_type: input.customer_type,
                customer_name,
                branch_id,
            },
            TransactionType::DuePayment,
            payment.amount,
            payment.payment_method.as_str(),
            transaction_id,
            Some(payment.payment_details),
            allocations.iter().map(RelatedBill::from).collect(),
            non_empty(payment.notes),
            ctx.user_id,
            now,
        );
        repo::transactions::insert(&mut tx, &record).await?;

        tx.commit().await?;

        tracing::info!(
            "Bulk payment of {} from {} {} settled across {} bill(s)",
            payment.amount,
            input.customer_type,
            input.customer_id,
            allocations.len()
        );
        Ok(BulkPaymentResult {
            summary: summarize(&bills),
            transaction: record,
            allocations,
        })
    }

    /// Spreads a customer's payment over their technician and counter bills
    /// in one queue.
    pub async fn process_customer_bulk_payment(
        &self,
        ctx: &AuthContext,
        input: CustomerBulkPaymentInput,
    ) -> AppResult<BulkPaymentResult> {
        ctx.require_role(&[Role::Admin, Role::Manager])?;
        let payment = input.payment;
        check_payment(payment.amount, payment.payment_method, &payment.payment_details)?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        let customer = repo::customers::find(&mut tx, input.customer_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Customer"))?;
        ctx.ensure_branch(customer.branch_id)?;

        let mut queue: Vec<OutstandingBill> = repo::bills::outstanding_for_customer(&mut tx, customer.id)
            .await?
            .into_iter()
            .map(OutstandingBill::Technician)
            .collect();
        queue.extend(
            repo::sales_bills::outstanding(&mut tx, CustomerType::Customer, customer.id)
                .await?
                .into_iter()
                .map(OutstandingBill::Sales),
        );

        let allocations = allocate_fifo(&mut queue, payment.amount)?;
        let transaction_id = non_empty(payment.transaction_id);
        for bill in queue.iter_mut() {
            if !allocations.iter().any(|a| a.bill_id == bill.bill_id()) {
                continue;
            }
            Self::store_allocation(&mut tx, bill, payment.payment_method, &payment.payment_details, &transaction_id, now)
                .await?;
        }

        let record = TransactionRecord::new(
            PaymentParty {
                customer_id: customer.id,
                customer_type: CustomerType::Customer,
                customer_name: customer.name.clone(),
                branch_id: Some(customer.branch_id),
            },
            TransactionType::DuePayment,
            payment.amount,
            payment.payment_method.as_str(),
            transaction_id,
            Some(payment.payment_details),
            allocations.iter().map(RelatedBill::from).collect(),
            non_empty(payment.notes),
            ctx.user_id,
            now,
        );
        repo::transactions::insert(&mut tx, &record).await?;

        tx.commit().await?;

        tracing::info!(
            "Customer {} paid {} across {} bill(s)",
            customer.id,
            payment.amount,
            allocations.len()
        );
        Ok(BulkPaymentResult {
            summary: summarize(&queue),
            transaction: record,
            allocations,
        })
    }

    async fn store_allocation(
        conn: &mut PgConnection,
        bill: &mut OutstandingBill,
        method: PaymentMethod,
        details: &PaymentDetails,
        transaction_id: &Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        match bill {
            OutstandingBill::Technician(bill) => {
                bill.payment_method = technician_method(method);
                bill.paid_at = Some(now);
                if transaction_id.is_some() {
                    bill.transaction_id = transaction_id.clone();
                }
                repo::bills::update(conn, bill).await
            }
            OutstandingBill::Sales(bill) => {
                bill.payment_method = method;
                bill.payment_details.merge(method, details);
                if transaction_id.is_some() {
                    bill.transaction_id = transaction_id.clone();
                }
                bill.updated_at = now;
                repo::sales_bills::update_payment(conn, bill).await
            }
        }
    }

    pub async fn list(&self, ctx: &AuthContext, query: SalesBillQuery) -> AppResult<Vec<SalesBill>> {
        ctx.require_role(&[Role::Admin, Role::Manager])?;
        let mut conn = self.db.acquire().await?;
        repo::sales_bills::list(
            &mut conn,
            &SalesBillFilter {
                customer_type: query.customer_type,
                customer_id: query.customer_id,
                branch_id: ctx.branch_scope(),
            },
        )
        .await
    }

    pub async fn get(&self, ctx: &AuthContext, bill_id: Uuid) -> AppResult<SalesBill> {
        ctx.require_role(&[Role::Admin, Role::Manager])?;
        let mut conn = self.db.acquire().await?;
        let bill = repo::sales_bills::find(&mut conn, bill_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Bill"))?;
        ctx.ensure_branch(bill.branch_id)?;
        Ok(bill)
    }
}
