//! Counter sales to dealers, distributors and walk-in customers

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::payment::{format_amount, progress, BillKind, Payable, PaymentProgress};

string_enum! {
    /// Buyer category, which also selects the price tier
    pub enum CustomerType {
        Dealer => "dealer",
        Distributor => "distributor",
        Customer => "customer",
    }
}

impl CustomerType {
    pub fn bill_prefix(&self) -> &'static str {
        match self {
            CustomerType::Customer => "CB",
            CustomerType::Dealer | CustomerType::Distributor => "SB",
        }
    }
}

string_enum! {
    pub enum SalesPaymentStatus {
        Pending => "pending",
        Partial => "partial",
        Completed => "completed",
    }
}

impl From<PaymentProgress> for SalesPaymentStatus {
    fn from(progress: PaymentProgress) -> Self {
        match progress {
            PaymentProgress::Unpaid => SalesPaymentStatus::Pending,
            PaymentProgress::Partial => SalesPaymentStatus::Partial,
            PaymentProgress::Paid => SalesPaymentStatus::Completed,
        }
    }
}

string_enum! {
    pub enum PaymentMethod {
        Cash => "cash",
        Upi => "upi",
        BankTransfer => "bank_transfer",
        Cheque => "cheque",
    }
}

string_enum! {
    pub enum ChequeStatus {
        Received => "received",
        Cleared => "cleared",
        Bounced => "bounced",
    }
}

/// Method-specific payment references
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub utr_number: Option<String>,
    pub bank_name: Option<String>,
    pub transfer_date: Option<DateTime<Utc>>,
    pub cheque_number: Option<String>,
    pub cheque_bank: Option<String>,
    pub cheque_ifsc: Option<String>,
    pub cheque_date: Option<DateTime<Utc>>,
    pub cheque_amount: Option<Decimal>,
    pub drawer_name: Option<String>,
    pub cheque_status: Option<ChequeStatus>,
    pub upi_transaction_id: Option<String>,
    pub selected_bank_account: Option<String>,
}

impl PaymentDetails {
    /// Copies the fields relevant to `method` from `incoming`, keeping what
    /// is already recorded for the others.
    pub fn merge(&mut self, method: PaymentMethod, incoming: &PaymentDetails) {
        fn take<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *slot = value.clone();
            }
        }

        match method {
            PaymentMethod::Cash => {}
            PaymentMethod::Upi => {
                take(&mut self.upi_transaction_id, &incoming.upi_transaction_id);
                take(&mut self.selected_bank_account, &incoming.selected_bank_account);
            }
            PaymentMethod::BankTransfer => {
                take(&mut self.utr_number, &incoming.utr_number);
                take(&mut self.bank_name, &incoming.bank_name);
                take(&mut self.transfer_date, &incoming.transfer_date);
            }
            PaymentMethod::Cheque => {
                take(&mut self.cheque_number, &incoming.cheque_number);
                take(&mut self.cheque_bank, &incoming.cheque_bank);
                take(&mut self.cheque_ifsc, &incoming.cheque_ifsc);
                take(&mut self.cheque_date, &incoming.cheque_date);
                take(&mut self.cheque_amount, &incoming.cheque_amount);
                take(&mut self.drawer_name, &incoming.drawer_name);
                self.cheque_status = incoming.cheque_status.or(Some(ChequeStatus::Received));
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesBillItem {
    pub item_id: String,
    pub item_name: String,
    pub serial_number: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

impl SalesBillItem {
    pub fn new(item_id: &str, item_name: &str, serial_number: Option<String>, quantity: i32, unit_price: Decimal) -> Self {
        Self {
            item_id: item_id.to_string(),
            item_name: item_name.to_string(),
            serial_number,
            quantity,
            unit_price,
            total_price: unit_price * Decimal::from(quantity),
        }
    }
}

/// The buyer as printed on the bill
#[derive(Debug, Clone)]
pub struct BillParty {
    pub customer_type: CustomerType,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesBill {
    pub id: Uuid,
    pub bill_number: String,
    pub customer_type: CustomerType,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub items: Vec<SalesBillItem>,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub paid_amount: Decimal,
    pub due_amount: Decimal,
    pub received_amount: Decimal,
    pub payment_status: SalesPaymentStatus,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub payment_details: PaymentDetails,
    pub notes: Option<String>,
    pub branch_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SalesBill {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bill_number: String,
        party: BillParty,
        items: Vec<SalesBillItem>,
        payment_method: PaymentMethod,
        notes: Option<String>,
        branch_id: Uuid,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if items.is_empty() {
            return Err(DomainError::validation("At least one item is required"));
        }
        let subtotal: Decimal = items.iter().map(|i| i.total_price).sum();
        Ok(Self {
            id: Uuid::new_v4(),
            bill_number,
            customer_type: party.customer_type,
            customer_id: party.customer_id,
            customer_name: party.customer_name,
            customer_phone: party.customer_phone,
            items,
            subtotal,
            total: subtotal,
            paid_amount: Decimal::ZERO,
            due_amount: subtotal,
            received_amount: Decimal::ZERO,
            payment_status: progress(Decimal::ZERO, subtotal).into(),
            payment_method,
            transaction_id: None,
            payment_details: PaymentDetails::default(),
            notes,
            branch_id,
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies a payment against this bill alone.
    ///
    /// Overpayment is refused so that paid plus due always equals the total.
    pub fn apply_payment(
        &mut self,
        amount: Decimal,
        method: PaymentMethod,
        transaction_id: Option<String>,
        details: &PaymentDetails,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.payment_status == SalesPaymentStatus::Completed {
            return Err(DomainError::conflict("Bill is already fully paid"));
        }
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation(
                "Payment amount must be greater than zero",
            ));
        }
        if amount > self.due_amount {
            return Err(DomainError::validation(format!(
                "Payment amount (₹{}) exceeds due amount (₹{})",
                format_amount(amount),
                format_amount(self.due_amount)
            )));
        }
        self.payment_method = method;
        if transaction_id.is_some() {
            self.transaction_id = transaction_id;
        }
        self.payment_details.merge(method, details);
        self.set_paid(self.paid_amount + amount);
        self.updated_at = now;
        Ok(())
    }
}

impl Payable for SalesBill {
    fn bill_id(&self) -> Uuid {
        self.id
    }

    fn bill_kind(&self) -> BillKind {
        BillKind::Sales
    }

    fn bill_number(&self) -> &str {
        &self.bill_number
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn total(&self) -> Decimal {
        self.total
    }

    fn paid(&self) -> Decimal {
        self.paid_amount
    }

    fn set_paid(&mut self, paid: Decimal) {
        if paid > self.paid_amount {
            self.received_amount += paid - self.paid_amount;
        }
        self.paid_amount = paid;
        self.due_amount = self.total - paid;
        self.payment_status = progress(paid, self.total).into();
    }

    fn status_label(&self) -> &'static str {
        self.payment_status.as_str()
    }
}
