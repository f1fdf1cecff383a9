//! Technician bills raised against a work order

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Item, ItemType, LedgerAction};
use crate::error::{DomainError, DomainResult};
use crate::payment::{progress, BillKind, Payable, PaymentProgress};
use crate::validation::validate_rejection_reason;

string_enum! {
    pub enum BillStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

string_enum! {
    pub enum ExtendedPaymentStatus {
        Unpaid => "unpaid",
        Partial => "partial",
        Paid => "paid",
    }
}

impl From<PaymentProgress> for ExtendedPaymentStatus {
    fn from(progress: PaymentProgress) -> Self {
        match progress {
            PaymentProgress::Unpaid => ExtendedPaymentStatus::Unpaid,
            PaymentProgress::Partial => ExtendedPaymentStatus::Partial,
            PaymentProgress::Paid => ExtendedPaymentStatus::Paid,
        }
    }
}

string_enum! {
    pub enum BillPaymentMethod {
        Cash => "cash",
        Online => "online",
        Pending => "pending",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillItem {
    pub item_id: String,
    pub name: String,
    pub item_type: ItemType,
    pub serial_number: Option<String>,
    pub quantity: i32,
    pub price: Decimal,
    pub amount: Decimal,
}

impl BillItem {
    /// Line billed at the item's customer price
    pub fn priced(item: &Item, serial_number: Option<String>, quantity: i32) -> Self {
        let price = item.pricing.customer_price;
        Self {
            item_id: item.id.clone(),
            name: item.name.clone(),
            item_type: item.item_type,
            serial_number,
            quantity,
            price,
            amount: price * Decimal::from(quantity),
        }
    }

    /// Ledger step that hands this line back to the technician; services
    /// carry no stock.
    pub fn reversal(&self) -> Option<LedgerAction> {
        if !self.item_type.is_product() {
            return None;
        }
        Some(match &self.serial_number {
            Some(serial) => LedgerAction::RestoreTechnicianSerial {
                item_id: self.item_id.clone(),
                serial_number: serial.clone(),
            },
            None => LedgerAction::RestoreTechnicianGeneric {
                item_id: self.item_id.clone(),
                quantity: self.quantity,
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: Uuid,
    pub bill_number: String,
    pub customer_id: Uuid,
    pub work_order_id: Uuid,
    pub order_id: String,
    pub technician_id: Uuid,
    pub branch_id: Uuid,
    pub items: Vec<BillItem>,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
    pub status: BillStatus,
    pub extended_payment_status: ExtendedPaymentStatus,
    pub rejection_reason: Option<String>,
    pub is_reverted: bool,
    pub payment_method: BillPaymentMethod,
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Who and what a technician bill is raised for
#[derive(Debug, Clone)]
pub struct BillHeader {
    pub bill_number: String,
    pub customer_id: Uuid,
    pub work_order_id: Uuid,
    pub order_id: String,
    pub technician_id: Uuid,
    pub branch_id: Uuid,
}

impl Bill {
    pub fn new(
        header: BillHeader,
        items: Vec<BillItem>,
        amount_paid: Decimal,
        payment_method: BillPaymentMethod,
        transaction_id: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if items.is_empty() {
            return Err(DomainError::validation("At least one item is required"));
        }
        let total_amount: Decimal = items.iter().map(|i| i.amount).sum();
        if amount_paid < Decimal::ZERO || amount_paid > total_amount {
            return Err(DomainError::validation(
                "Amount paid must be between zero and the bill total",
            ));
        }
        let payment_method = if amount_paid > Decimal::ZERO {
            if payment_method == BillPaymentMethod::Pending {
                return Err(DomainError::validation(
                    "Payment method is required when an amount is paid",
                ));
            }
            payment_method
        } else {
            BillPaymentMethod::Pending
        };

        let mut bill = Self {
            id: Uuid::new_v4(),
            bill_number: header.bill_number,
            customer_id: header.customer_id,
            work_order_id: header.work_order_id,
            order_id: header.order_id,
            technician_id: header.technician_id,
            branch_id: header.branch_id,
            items,
            total_amount,
            amount_paid: Decimal::ZERO,
            amount_due: total_amount,
            status: BillStatus::Pending,
            extended_payment_status: ExtendedPaymentStatus::Unpaid,
            rejection_reason: None,
            is_reverted: false,
            payment_method,
            transaction_id,
            paid_at: None,
            created_at: now,
        };
        bill.set_paid(amount_paid);
        if amount_paid > Decimal::ZERO {
            bill.paid_at = Some(now);
        }
        Ok(bill)
    }

    pub fn approve(&mut self) -> DomainResult<()> {
        match self.status {
            BillStatus::Pending => {
                self.status = BillStatus::Approved;
                Ok(())
            }
            BillStatus::Approved => Err(DomainError::conflict("Bill is already approved")),
            BillStatus::Rejected => Err(DomainError::InvalidTransition(
                "Rejected bills cannot be approved".to_string(),
            )),
        }
    }

    /// Marks the bill rejected and hands back the lines whose stock must be
    /// reverted. A second rejection is refused so stock is never reverted
    /// twice.
    pub fn reject(&mut self, reason: &str) -> DomainResult<Vec<BillItem>> {
        validate_rejection_reason(reason).map_err(DomainError::validation)?;
        if self.status == BillStatus::Rejected {
            return Err(DomainError::conflict("Bill is already rejected"));
        }
        self.status = BillStatus::Rejected;
        self.rejection_reason = Some(reason.trim().to_string());
        self.is_reverted = true;
        Ok(self.items.clone())
    }
}

impl Payable for Bill {
    fn bill_id(&self) -> Uuid {
        self.id
    }

    fn bill_kind(&self) -> BillKind {
        BillKind::Technician
    }

    fn bill_number(&self) -> &str {
        &self.bill_number
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn total(&self) -> Decimal {
        self.total_amount
    }

    fn paid(&self) -> Decimal {
        self.amount_paid
    }

    fn set_paid(&mut self, paid: Decimal) {
        self.amount_paid = paid;
        self.amount_due = self.total_amount - paid;
        self.extended_payment_status = progress(paid, self.total_amount).into();
    }

    fn status_label(&self) -> &'static str {
        self.extended_payment_status.as_str()
    }
}
