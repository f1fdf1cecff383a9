//! Append-only ledger of received payments

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CustomerType, PaymentDetails};
use crate::payment::{format_amount, Allocation, BillKind};

string_enum! {
    pub enum TransactionType {
        PaymentReceived => "payment_received",
        DuePayment => "due_payment",
        PartialPayment => "partial_payment",
        FullPayment => "full_payment",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedBill {
    pub bill_id: Uuid,
    pub bill_kind: BillKind,
    pub bill_number: String,
    pub allocated_amount: Decimal,
}

impl From<&Allocation> for RelatedBill {
    fn from(allocation: &Allocation) -> Self {
        Self {
            bill_id: allocation.bill_id,
            bill_kind: allocation.bill_kind,
            bill_number: allocation.bill_number.clone(),
            allocated_amount: allocation.payment_applied,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub customer_type: CustomerType,
    pub customer_name: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub description: String,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub payment_details: Option<PaymentDetails>,
    pub related_bills: Vec<RelatedBill>,
    pub status: String,
    pub notes: Option<String>,
    pub branch_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Fields common to every payment entry
#[derive(Debug, Clone)]
pub struct PaymentParty {
    pub customer_id: Uuid,
    pub customer_type: CustomerType,
    pub customer_name: String,
    pub branch_id: Option<Uuid>,
}

impl TransactionRecord {
    pub fn describe(
        transaction_type: TransactionType,
        amount: Decimal,
        related_bills: &[RelatedBill],
    ) -> String {
        let amount = format_amount(amount);
        match (transaction_type, related_bills) {
            (TransactionType::DuePayment, _) => format!("Due payment received - ₹{}", amount),
            (TransactionType::PaymentReceived, [bill]) => {
                format!("Payment for Bill #{} - ₹{}", bill.bill_number, amount)
            }
            (TransactionType::PaymentReceived, bills) if bills.len() > 1 => {
                format!("Payment for {} bills - ₹{}", bills.len(), amount)
            }
            _ => format!("Payment received - ₹{}", amount),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        party: PaymentParty,
        transaction_type: TransactionType,
        amount: Decimal,
        payment_method: &str,
        transaction_id: Option<String>,
        payment_details: Option<PaymentDetails>,
        related_bills: Vec<RelatedBill>,
        notes: Option<String>,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        let description = Self::describe(transaction_type, amount, &related_bills);
        Self {
            id: Uuid::new_v4(),
            customer_id: party.customer_id,
            customer_type: party.customer_type,
            customer_name: party.customer_name,
            transaction_type,
            amount,
            description,
            payment_method: payment_method.to_string(),
            transaction_id,
            payment_details,
            related_bills,
            status: "completed".to_string(),
            notes,
            branch_id: party.branch_id,
            created_by,
            created_at: now,
        }
    }
}
