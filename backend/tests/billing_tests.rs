//! Billing and payment tests
//!
//! Tests for technician bills, sales bills and payment collection including:
//! - Bill totals and payment status
//! - Single rejection of technician bills
//! - FIFO allocation of bulk payments
//! - Transaction descriptions

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use shared::payment::{
    allocate_fifo, format_amount, progress, summarize, BillKind, OutstandingBill, Payable,
    PaymentProgress,
};
use shared::{
    validate_payment_amount, Bill, BillHeader, BillItem, BillParty, BillPaymentMethod, BillStatus,
    ChequeStatus, CustomerType, DomainError, ExtendedPaymentStatus, ItemType, PaymentDetails,
    PaymentMethod, RelatedBill, SalesBill, SalesBillItem, SalesPaymentStatus, TransactionRecord,
    TransactionType,
};
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn line(item_id: &str, serial: Option<&str>, quantity: i32, price: &str) -> BillItem {
    let price = dec(price);
    BillItem {
        item_id: item_id.to_string(),
        name: item_id.to_string(),
        item_type: if serial.is_some() {
            ItemType::SerializedProduct
        } else {
            ItemType::GenericProduct
        },
        serial_number: serial.map(str::to_string),
        quantity,
        price,
        amount: price * Decimal::from(quantity),
    }
}

fn header() -> BillHeader {
    BillHeader {
        bill_number: "TB25030001".to_string(),
        customer_id: Uuid::new_v4(),
        work_order_id: Uuid::new_v4(),
        order_id: "WO25030001".to_string(),
        technician_id: Uuid::new_v4(),
        branch_id: Uuid::new_v4(),
    }
}

fn technician_bill(paid: &str) -> Bill {
    let paid = dec(paid);
    let method = if paid > Decimal::ZERO {
        BillPaymentMethod::Cash
    } else {
        BillPaymentMethod::Pending
    };
    Bill::new(
        header(),
        vec![
            line("CAM01", Some("SN1"), 1, "2500"),
            line("CBL01", None, 10, "25"),
        ],
        paid,
        method,
        None,
        Utc::now(),
    )
    .unwrap()
}

fn sales_bill(total: &str, created_at: DateTime<Utc>) -> SalesBill {
    SalesBill::new(
        format!("SB{}", created_at.timestamp_millis()),
        BillParty {
            customer_type: CustomerType::Dealer,
            customer_id: Uuid::new_v4(),
            customer_name: "Sai Traders".to_string(),
            customer_phone: "9876543210".to_string(),
        },
        vec![SalesBillItem::new("CBL01", "Cable", None, 1, dec(total))],
        PaymentMethod::Cash,
        None,
        Uuid::new_v4(),
        Uuid::new_v4(),
        created_at,
    )
    .unwrap()
}

fn related(bill_number: &str, amount: &str) -> RelatedBill {
    RelatedBill {
        bill_id: Uuid::new_v4(),
        bill_kind: BillKind::Sales,
        bill_number: bill_number.to_string(),
        allocated_amount: dec(amount),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_bill_totals_and_status() {
        let bill = technician_bill("1000");

        assert_eq!(bill.total_amount, dec("2750"));
        assert_eq!(bill.amount_paid, dec("1000"));
        assert_eq!(bill.amount_due, dec("1750"));
        assert_eq!(bill.status, BillStatus::Pending);
        assert_eq!(bill.extended_payment_status, ExtendedPaymentStatus::Partial);
        assert!(bill.paid_at.is_some());
    }

    #[test]
    fn test_unpaid_bill_keeps_pending_method() {
        let bill = technician_bill("0");
        assert_eq!(bill.payment_method, BillPaymentMethod::Pending);
        assert_eq!(bill.extended_payment_status, ExtendedPaymentStatus::Unpaid);
        assert!(bill.paid_at.is_none());
    }

    #[test]
    fn test_paid_amount_needs_method() {
        let err = Bill::new(
            header(),
            vec![line("CBL01", None, 2, "25")],
            dec("10"),
            BillPaymentMethod::Pending,
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Payment method is required when an amount is paid"
        );
    }

    #[test]
    fn test_overpaid_bill_rejected() {
        let result = Bill::new(
            header(),
            vec![line("CBL01", None, 2, "25")],
            dec("51"),
            BillPaymentMethod::Online,
            None,
            Utc::now(),
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_approve_twice_is_conflict() {
        let mut bill = technician_bill("0");
        bill.approve().unwrap();
        assert!(matches!(bill.approve(), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn test_reject_returns_lines_once() {
        let mut bill = technician_bill("0");

        let reverted = bill.reject("Wrong serial number").unwrap();

        assert_eq!(reverted.len(), 2);
        assert_eq!(reverted[0].serial_number.as_deref(), Some("SN1"));
        assert_eq!(bill.status, BillStatus::Rejected);
        assert!(bill.is_reverted);
        assert_eq!(bill.rejection_reason.as_deref(), Some("Wrong serial number"));

        let err = bill.reject("Wrong serial number").unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(err.to_string(), "Bill is already rejected");
    }

    #[test]
    fn test_reject_needs_meaningful_reason() {
        let mut bill = technician_bill("0");
        let err = bill.reject("no").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Rejection reason must be at least 5 characters long"
        );
        assert_eq!(bill.status, BillStatus::Pending);
    }

    #[test]
    fn test_rejected_bill_cannot_be_approved() {
        let mut bill = technician_bill("0");
        bill.reject("Duplicate bill").unwrap();
        assert!(matches!(
            bill.approve(),
            Err(DomainError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_bill_prefix_by_customer_type() {
        assert_eq!(CustomerType::Customer.bill_prefix(), "CB");
        assert_eq!(CustomerType::Dealer.bill_prefix(), "SB");
        assert_eq!(CustomerType::Distributor.bill_prefix(), "SB");
    }

    #[test]
    fn test_sales_payment_progression() {
        let mut bill = sales_bill("500", Utc::now());
        assert_eq!(bill.payment_status, SalesPaymentStatus::Pending);

        bill.apply_payment(dec("200"), PaymentMethod::Upi, Some("UPI123".to_string()), &PaymentDetails::default(), Utc::now())
            .unwrap();
        assert_eq!(bill.payment_status, SalesPaymentStatus::Partial);
        assert_eq!(bill.due_amount, dec("300"));
        assert_eq!(bill.transaction_id.as_deref(), Some("UPI123"));

        bill.apply_payment(dec("300"), PaymentMethod::Cash, None, &PaymentDetails::default(), Utc::now())
            .unwrap();
        assert_eq!(bill.payment_status, SalesPaymentStatus::Completed);
        assert_eq!(bill.received_amount, dec("500"));
        assert_eq!(bill.transaction_id.as_deref(), Some("UPI123"));

        let err = bill
            .apply_payment(dec("1"), PaymentMethod::Cash, None, &PaymentDetails::default(), Utc::now())
            .unwrap_err();
        assert_eq!(err.to_string(), "Bill is already fully paid");
    }

    #[test]
    fn test_sales_overpayment_rejected() {
        let mut bill = sales_bill("250.50", Utc::now());
        let err = bill
            .apply_payment(dec("300"), PaymentMethod::Cash, None, &PaymentDetails::default(), Utc::now())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Payment amount (₹300) exceeds due amount (₹250.5)"
        );
        assert_eq!(bill.paid_amount, Decimal::ZERO);
    }

    #[test]
    fn test_zero_total_sales_bill_is_settled() {
        let bill = sales_bill("0", Utc::now());
        assert_eq!(bill.payment_status, SalesPaymentStatus::Completed);
        assert_eq!(bill.due_amount, Decimal::ZERO);
    }

    #[test]
    fn test_cheque_details_default_to_received() {
        let mut details = PaymentDetails::default();
        let incoming = PaymentDetails {
            cheque_number: Some("004512".to_string()),
            cheque_bank: Some("SBI".to_string()),
            utr_number: Some("ignored".to_string()),
            ..PaymentDetails::default()
        };

        details.merge(PaymentMethod::Cheque, &incoming);

        assert_eq!(details.cheque_number.as_deref(), Some("004512"));
        assert_eq!(details.cheque_status, Some(ChequeStatus::Received));
        assert!(details.utr_number.is_none());
    }

    #[test]
    fn test_fifo_allocation_across_bills() {
        let now = Utc::now();
        let mut bills = vec![
            sales_bill("200", now + Duration::minutes(1)),
            sales_bill("100", now),
            sales_bill("50", now + Duration::minutes(2)),
        ];

        let allocations = allocate_fifo(&mut bills, dec("250")).unwrap();

        let applied: Vec<Decimal> = allocations.iter().map(|a| a.payment_applied).collect();
        assert_eq!(applied, vec![dec("100"), dec("150")]);
        assert_eq!(allocations[0].status, "completed");
        assert_eq!(allocations[1].status, "partial");

        let dues: Vec<Decimal> = bills.iter().map(|b| b.due()).collect();
        assert_eq!(dues, vec![dec("0"), dec("50"), dec("50")]);

        let summary = summarize(&bills);
        assert_eq!(summary.total_due_after_payment, dec("100"));
        assert_eq!(summary.total_paid_after_payment, dec("250"));
        assert_eq!(summary.pending_bills_count, 2);
    }

    #[test]
    fn test_fifo_rejects_excess_payment() {
        let mut bills = vec![sales_bill("100", Utc::now())];
        let err = allocate_fifo(&mut bills, dec("150")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Payment amount (₹150) exceeds total due amount (₹100)"
        );
        assert_eq!(bills[0].paid_amount, Decimal::ZERO);
    }

    #[test]
    fn test_fifo_without_dues() {
        let mut bills: Vec<SalesBill> = Vec::new();
        let err = allocate_fifo(&mut bills, dec("10")).unwrap_err();
        assert_eq!(err.to_string(), "No pending bills found for this customer");
    }

    #[test]
    fn test_mixed_queue_settles_technician_bill_first() {
        let now = Utc::now();
        let technician = technician_bill("0");
        let technician_id = technician.id;
        let mut bills = vec![
            OutstandingBill::Sales(sales_bill("300", now + Duration::hours(1))),
            OutstandingBill::Technician(technician),
        ];

        let allocations = allocate_fifo(&mut bills, dec("2750")).unwrap();

        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].bill_id, technician_id);
        assert_eq!(allocations[0].bill_kind, BillKind::Technician);
        assert_eq!(allocations[0].status, "paid");
    }

    #[test]
    fn test_transaction_descriptions() {
        assert_eq!(
            TransactionRecord::describe(TransactionType::DuePayment, dec("250.00"), &[]),
            "Due payment received - ₹250"
        );
        assert_eq!(
            TransactionRecord::describe(
                TransactionType::PaymentReceived,
                dec("99.5"),
                &[related("SB25030001", "99.5")]
            ),
            "Payment for Bill #SB25030001 - ₹99.5"
        );
        assert_eq!(
            TransactionRecord::describe(
                TransactionType::PaymentReceived,
                dec("300"),
                &[related("SB1", "100"), related("SB2", "200")]
            ),
            "Payment for 2 bills - ₹300"
        );
    }

    #[test]
    fn test_payment_amount_validation() {
        assert!(validate_payment_amount(dec("0")).is_err());
        assert!(validate_payment_amount(dec("-5")).is_err());
        assert!(validate_payment_amount(dec("10.555")).is_err());
        assert!(validate_payment_amount(dec("10.50")).is_ok());
        assert_eq!(format_amount(dec("1200.10")), "1200.1");
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn amount_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..1_000_000).prop_map(|paise| Decimal::new(paise, 2))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Paid plus due always equals the total, and the status follows.
        #[test]
        fn prop_paid_plus_due_equals_total(
            total in amount_strategy(),
            fraction in 0u32..=100
        ) {
            let mut bill = sales_bill("1", Utc::now());
            bill.total = total;
            bill.due_amount = total;
            let paid = (total * Decimal::from(fraction) / Decimal::from(100)).round_dp(2);

            bill.set_paid(paid);

            prop_assert_eq!(bill.paid_amount + bill.due_amount, bill.total);
            let expected: SalesPaymentStatus = progress(paid, total).into();
            prop_assert_eq!(bill.payment_status, expected);
        }

        /// FIFO allocation applies the full amount, never overpays a bill and
        /// only leaves later bills untouched once earlier ones are settled.
        #[test]
        fn prop_fifo_allocation_is_exact(
            totals in prop::collection::vec(amount_strategy(), 1..6),
            fraction in 1u32..=100
        ) {
            let now = Utc::now();
            let mut bills: Vec<SalesBill> = totals
                .iter()
                .enumerate()
                .map(|(i, t)| sales_bill(&t.to_string(), now + Duration::minutes(i as i64)))
                .collect();
            let total_due: Decimal = totals.iter().copied().sum();
            let amount = (total_due * Decimal::from(fraction) / Decimal::from(100)).round_dp(2);
            prop_assume!(amount > Decimal::ZERO);

            let allocations = allocate_fifo(&mut bills, amount).unwrap();

            let applied: Decimal = allocations.iter().map(|a| a.payment_applied).sum();
            prop_assert_eq!(applied, amount);
            for bill in &bills {
                prop_assert!(bill.due_amount >= Decimal::ZERO);
                prop_assert_eq!(bill.paid_amount + bill.due_amount, bill.total);
            }
            let first_open = bills.iter().position(|b| b.due_amount > Decimal::ZERO);
            if let Some(open) = first_open {
                for bill in &bills[open + 1..] {
                    prop_assert_eq!(bill.paid_amount, Decimal::ZERO);
                }
            }
        }

        /// Progress depends only on paid and total.
        #[test]
        fn prop_progress_thresholds(total in amount_strategy(), paid in amount_strategy()) {
            let state = progress(paid, total);
            if paid >= total {
                prop_assert_eq!(state, PaymentProgress::Paid);
            } else {
                prop_assert_eq!(state, PaymentProgress::Partial);
            }
            prop_assert_eq!(progress(Decimal::ZERO, total), PaymentProgress::Unpaid);
        }
    }
}
