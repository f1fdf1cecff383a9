//! Payment status and FIFO allocation across bills
//!
//! Technician bills and sales bills both implement [`Payable`], so a single
//! allocator settles any mix of them oldest first.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{Bill, SalesBill};

string_enum! {
    pub enum BillKind {
        Technician => "technician",
        Sales => "sales",
    }
}

/// Settlement progress of a bill, derived from paid and total only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProgress {
    Unpaid,
    Partial,
    Paid,
}

pub fn progress(paid: Decimal, total: Decimal) -> PaymentProgress {
    if paid >= total {
        PaymentProgress::Paid
    } else if paid > Decimal::ZERO {
        PaymentProgress::Partial
    } else {
        PaymentProgress::Unpaid
    }
}

/// Rupee amount as shown in messages: at most two decimals, no trailing zeros
pub fn format_amount(amount: Decimal) -> String {
    amount.round_dp(2).normalize().to_string()
}

pub trait Payable {
    fn bill_id(&self) -> Uuid;
    fn bill_kind(&self) -> BillKind;
    fn bill_number(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
    fn total(&self) -> Decimal;
    fn paid(&self) -> Decimal;

    /// Stores a new paid amount and recomputes due and status.
    fn set_paid(&mut self, paid: Decimal);

    /// Status as stored on the bill
    fn status_label(&self) -> &'static str;

    fn due(&self) -> Decimal {
        self.total() - self.paid()
    }

    fn progress(&self) -> PaymentProgress {
        progress(self.paid(), self.total())
    }
}

/// Either kind of bill, for allocations over a mixed queue
#[derive(Debug, Clone)]
pub enum OutstandingBill {
    Technician(Bill),
    Sales(SalesBill),
}

impl Payable for OutstandingBill {
    fn bill_id(&self) -> Uuid {
        match self {
            OutstandingBill::Technician(b) => b.bill_id(),
            OutstandingBill::Sales(b) => b.bill_id(),
        }
    }

    fn bill_kind(&self) -> BillKind {
        match self {
            OutstandingBill::Technician(_) => BillKind::Technician,
            OutstandingBill::Sales(_) => BillKind::Sales,
        }
    }

    fn bill_number(&self) -> &str {
        match self {
            OutstandingBill::Technician(b) => b.bill_number(),
            OutstandingBill::Sales(b) => b.bill_number(),
        }
    }

    fn created_at(&self) -> DateTime<Utc> {
        match self {
            OutstandingBill::Technician(b) => Payable::created_at(b),
            OutstandingBill::Sales(b) => Payable::created_at(b),
        }
    }

    fn total(&self) -> Decimal {
        match self {
            OutstandingBill::Technician(b) => b.total(),
            OutstandingBill::Sales(b) => b.total(),
        }
    }

    fn paid(&self) -> Decimal {
        match self {
            OutstandingBill::Technician(b) => b.paid(),
            OutstandingBill::Sales(b) => b.paid(),
        }
    }

    fn set_paid(&mut self, paid: Decimal) {
        match self {
            OutstandingBill::Technician(b) => b.set_paid(paid),
            OutstandingBill::Sales(b) => b.set_paid(paid),
        }
    }

    fn status_label(&self) -> &'static str {
        match self {
            OutstandingBill::Technician(b) => b.status_label(),
            OutstandingBill::Sales(b) => b.status_label(),
        }
    }
}

/// Amount applied to one bill by an allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub bill_id: Uuid,
    pub bill_kind: BillKind,
    pub bill_number: String,
    pub payment_applied: Decimal,
    pub remaining_due: Decimal,
    pub status: String,
}

/// Applies `amount` to `bills` oldest first.
///
/// Bills are reordered by creation time. The whole amount must fit into the
/// outstanding dues; otherwise nothing is applied.
pub fn allocate_fifo<P: Payable>(bills: &mut [P], amount: Decimal) -> DomainResult<Vec<Allocation>> {
    if amount <= Decimal::ZERO {
        return Err(DomainError::validation(
            "Payment amount must be greater than zero",
        ));
    }

    bills.sort_by_key(|b| b.created_at());

    let total_due: Decimal = bills
        .iter()
        .map(Payable::due)
        .filter(|due| *due > Decimal::ZERO)
        .sum();
    if total_due <= Decimal::ZERO {
        return Err(DomainError::validation(
            "No pending bills found for this customer",
        ));
    }
    if amount > total_due {
        return Err(DomainError::validation(format!(
            "Payment amount (₹{}) exceeds total due amount (₹{})",
            format_amount(amount),
            format_amount(total_due)
        )));
    }

    let mut remaining = amount;
    let mut allocations = Vec::new();
    for bill in bills.iter_mut() {
        if remaining <= Decimal::ZERO {
            break;
        }
        let due = bill.due();
        if due <= Decimal::ZERO {
            continue;
        }
        let applied = due.min(remaining);
        bill.set_paid(bill.paid() + applied);
        remaining -= applied;
        allocations.push(Allocation {
            bill_id: bill.bill_id(),
            bill_kind: bill.bill_kind(),
            bill_number: bill.bill_number().to_string(),
            payment_applied: applied,
            remaining_due: bill.due(),
            status: bill.status_label().to_string(),
        });
    }

    Ok(allocations)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub total_due_after_payment: Decimal,
    pub total_paid_after_payment: Decimal,
    pub pending_bills_count: usize,
}

pub fn summarize<P: Payable>(bills: &[P]) -> PaymentSummary {
    PaymentSummary {
        total_due_after_payment: bills.iter().map(Payable::due).sum(),
        total_paid_after_payment: bills.iter().map(Payable::paid).sum(),
        pending_bills_count: bills.iter().filter(|b| b.due() > Decimal::ZERO).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_pure_in_paid_and_total() {
        let total = Decimal::from(100);
        assert_eq!(progress(Decimal::ZERO, total), PaymentProgress::Unpaid);
        assert_eq!(progress(Decimal::from(40), total), PaymentProgress::Partial);
        assert_eq!(progress(total, total), PaymentProgress::Paid);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::new(25000, 2)), "250");
        assert_eq!(format_amount(Decimal::new(12345, 2)), "123.45");
    }
}
