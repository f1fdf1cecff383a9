//! Stock reversal tests
//!
//! Tests for applying ledger steps to loaded aggregates including:
//! - Bill rejection handing serial and generic lines back to the technician
//! - Return confirmation moving stock onto the branch shelf
//! - Return rejection restoring the technician's holding
//! - Returns that reference a deleted item

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use shared::ledger::{LedgerBook, DANGLING_ITEM_MESSAGE};
use shared::{
    Bill, BillHeader, BillItem, BillPaymentMethod, DomainError, HoldingStatus, Item, ItemType,
    LedgerAction, Pricing, ReturnDecision, ReturnedInventory, ReturnedLine, TechnicianInventory,
    RETURN_STOCK_REMARK,
};
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn catalogue_item(id: &str, item_type: ItemType) -> Item {
    Item {
        id: id.to_string(),
        name: format!("{} item", id),
        item_type,
        pricing: Pricing {
            customer_price: dec("100"),
            dealer_price: dec("90"),
            distributor_price: dec("80"),
        },
        purchase_price: None,
        mrp: None,
        unit: None,
        warranty: None,
        stock: Vec::new(),
        created_at: Utc::now(),
    }
}

fn bill_line(item_id: &str, item_type: ItemType, serial: Option<&str>, quantity: i32) -> BillItem {
    let price = dec("100");
    BillItem {
        item_id: item_id.to_string(),
        name: item_id.to_string(),
        item_type,
        serial_number: serial.map(str::to_string),
        quantity,
        price,
        amount: price * Decimal::from(quantity),
    }
}

fn bill_for(technician_id: Uuid, branch_id: Uuid, items: Vec<BillItem>) -> Bill {
    Bill::new(
        BillHeader {
            bill_number: "TB25030001".to_string(),
            customer_id: Uuid::new_v4(),
            work_order_id: Uuid::new_v4(),
            order_id: "WO25030001".to_string(),
            technician_id,
            branch_id,
        },
        items,
        Decimal::ZERO,
        BillPaymentMethod::Pending,
        None,
        Utc::now(),
    )
    .unwrap()
}

/// Technician holding one camera (SN1) and `cables` generic cable units
fn stocked_book(technician_id: Uuid, branch_id: Uuid, cables: i32, now: DateTime<Utc>) -> LedgerBook {
    let mut camera = TechnicianInventory::new(technician_id, "CAM01", branch_id, now);
    camera.assign_serial("SN1", Uuid::new_v4(), now).unwrap();
    let mut cable = TechnicianInventory::new(technician_id, "CBL01", branch_id, now);
    cable.assign_generic(cables, now).unwrap();

    let mut book = LedgerBook::new(technician_id, branch_id);
    book.holdings.insert("CAM01".to_string(), camera);
    book.holdings.insert("CBL01".to_string(), cable);
    book
}

fn returned_batch(technician_id: Uuid, branch_id: Uuid, now: DateTime<Utc>) -> ReturnedInventory {
    ReturnedInventory::new(
        technician_id,
        branch_id,
        vec![
            ReturnedLine {
                item_id: "CAM01".to_string(),
                item_type: ItemType::SerializedProduct,
                serial_number: Some("SN1".to_string()),
                quantity: 1,
            },
            ReturnedLine {
                item_id: "CBL01".to_string(),
                item_type: ItemType::GenericProduct,
                serial_number: None,
                quantity: 3,
            },
        ],
        now,
    )
    .unwrap()
}

/// Stages SN1 and three cables out of the book's holdings, as a return
/// request does.
fn stage_return(book: &mut LedgerBook, now: DateTime<Utc>) {
    book.holdings
        .get_mut("CAM01")
        .unwrap()
        .stage_serial_return("SN1", now)
        .unwrap();
    book.holdings
        .get_mut("CBL01")
        .unwrap()
        .stage_generic_return(3, now)
        .unwrap();
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_bill_rejection_restores_mixed_lines() {
        let technician = Uuid::new_v4();
        let branch = Uuid::new_v4();
        let now = Utc::now();
        let mut book = stocked_book(technician, branch, 20, now);
        book.holdings
            .get_mut("CAM01")
            .unwrap()
            .mark_used("SN1", "WO25030001", now)
            .unwrap();
        book.holdings
            .get_mut("CBL01")
            .unwrap()
            .consume_generic(10, now)
            .unwrap();

        let mut bill = bill_for(
            technician,
            branch,
            vec![
                bill_line("CAM01", ItemType::SerializedProduct, Some("SN1"), 1),
                bill_line("CBL01", ItemType::GenericProduct, None, 10),
                bill_line("INST01", ItemType::Service, None, 1),
            ],
        );
        let reverted = bill.reject("Wrong serial entered").unwrap();
        let actions: Vec<LedgerAction> = reverted.iter().filter_map(BillItem::reversal).collect();

        assert_eq!(actions.len(), 2);

        let shelved = book.apply(actions, now).unwrap();

        assert!(shelved.is_empty());
        let camera = book.holdings["CAM01"].serial("SN1").unwrap();
        assert_eq!(camera.status, HoldingStatus::Active);
        assert!(camera.used_in_work_order.is_none());
        assert_eq!(book.holdings["CBL01"].generic_quantity, 20);
        assert!(!book.holdings.contains_key("INST01"));
    }

    #[test]
    fn test_bill_rejection_recreates_missing_holding() {
        let technician = Uuid::new_v4();
        let branch = Uuid::new_v4();
        let mut book = LedgerBook::new(technician, branch);
        let line = bill_line("CAM01", ItemType::SerializedProduct, Some("SN7"), 1);

        book.apply(line.reversal().into_iter().collect(), Utc::now())
            .unwrap();

        let holding = &book.holdings["CAM01"];
        assert_eq!(holding.technician_id, technician);
        assert_eq!(holding.branch_id, branch);
        assert_eq!(holding.active_serials().count(), 1);
    }

    #[test]
    fn test_confirmed_return_moves_stock_to_shelf() {
        let technician = Uuid::new_v4();
        let branch = Uuid::new_v4();
        let now = Utc::now();
        let mut book = stocked_book(technician, branch, 5, now);
        stage_return(&mut book, now);
        book.items.insert(
            "CAM01".to_string(),
            catalogue_item("CAM01", ItemType::SerializedProduct),
        );
        book.items.insert(
            "CBL01".to_string(),
            catalogue_item("CBL01", ItemType::GenericProduct),
        );

        let entry = returned_batch(technician, branch, now);
        let shelved = book
            .apply(entry.plan(&ReturnDecision::Confirm).unwrap(), now)
            .unwrap();

        assert_eq!(shelved.len(), 2);
        assert!(shelved
            .iter()
            .all(|s| s.entry.branch_id == branch
                && s.entry.remark.as_deref() == Some(RETURN_STOCK_REMARK)));
        assert!(book.items["CAM01"].has_serial("SN1"));
        assert_eq!(book.items["CBL01"].available_in_branch(branch), 3);
        assert!(book.holdings["CAM01"].serial("SN1").is_none());
        assert_eq!(book.holdings["CBL01"].generic_quantity, 2);
    }

    #[test]
    fn test_rejected_return_restores_holding() {
        let technician = Uuid::new_v4();
        let branch = Uuid::new_v4();
        let now = Utc::now();
        let mut book = stocked_book(technician, branch, 5, now);
        stage_return(&mut book, now);

        let entry = returned_batch(technician, branch, now);
        let decision = ReturnDecision::Reject {
            reason: "Items not received".to_string(),
        };
        let shelved = book.apply(entry.plan(&decision).unwrap(), now).unwrap();

        assert!(shelved.is_empty());
        assert_eq!(
            book.holdings["CAM01"].serial("SN1").map(|h| h.status),
            Some(HoldingStatus::Active)
        );
        assert_eq!(book.holdings["CBL01"].generic_quantity, 5);
    }

    #[test]
    fn test_confirming_return_of_deleted_item_changes_nothing() {
        let technician = Uuid::new_v4();
        let branch = Uuid::new_v4();
        let now = Utc::now();
        let mut book = stocked_book(technician, branch, 5, now);
        stage_return(&mut book, now);
        // CAM01 was deleted from the catalogue after the return was raised
        book.items.insert(
            "CBL01".to_string(),
            catalogue_item("CBL01", ItemType::GenericProduct),
        );

        let entry = returned_batch(technician, branch, now);
        let err = book
            .apply(entry.plan(&ReturnDecision::Confirm).unwrap(), now)
            .unwrap_err();

        assert!(matches!(err, DomainError::DanglingReference(_)));
        assert_eq!(err.to_string(), DANGLING_ITEM_MESSAGE);
        assert_eq!(
            book.holdings["CAM01"].serial("SN1").map(|h| h.status),
            Some(HoldingStatus::Returned)
        );
        assert!(book.items["CBL01"].stock.is_empty());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Rejecting a bill returns the technician to the quantity held
        /// before the bill consumed anything.
        #[test]
        fn prop_bill_rejection_restores_generic_quantity(
            held in 1i32..500,
            used_pct in 1i32..=100
        ) {
            let technician = Uuid::new_v4();
            let branch = Uuid::new_v4();
            let now = Utc::now();
            let used = (held * used_pct / 100).max(1);
            let mut book = stocked_book(technician, branch, held, now);
            book.holdings.get_mut("CBL01").unwrap().consume_generic(used, now).unwrap();

            let mut bill = bill_for(
                technician,
                branch,
                vec![bill_line("CBL01", ItemType::GenericProduct, None, used)],
            );
            let reverted = bill.reject("Quantity was wrong").unwrap();
            let actions: Vec<LedgerAction> = reverted.iter().filter_map(BillItem::reversal).collect();
            book.apply(actions, now).unwrap();

            prop_assert_eq!(book.holdings["CBL01"].generic_quantity, held);
        }
    }
}
