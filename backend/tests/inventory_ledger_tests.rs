//! Inventory ledger tests
//!
//! Tests for branch stock and serial tracking including:
//! - Stock additions for serialized and generic items
//! - FIFO withdrawal across stock entries
//! - Serial uniqueness across branch, technician and bill locations
//! - Price tier selection

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use chrono::Utc;
use shared::ledger::{check_serial, ensure_serial_free, SerialLocation};
use shared::{
    AuthContext, CustomerType, DomainError, Item, ItemType, Pricing, Role, StockHistory, StockUnit,
};
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn item(id: &str, item_type: ItemType) -> Item {
    Item {
        id: id.to_string(),
        name: format!("{} item", id),
        item_type,
        pricing: Pricing {
            customer_price: dec("1500.00"),
            dealer_price: dec("1200.00"),
            distributor_price: dec("1100.50"),
        },
        purchase_price: Some(dec("900")),
        mrp: None,
        unit: None,
        warranty: Some("1 year".to_string()),
        stock: Vec::new(),
        created_at: Utc::now(),
    }
}

fn branch_stock(item_id: &str, branch_id: Uuid) -> SerialLocation {
    SerialLocation::BranchStock {
        item_id: item_id.to_string(),
        item_name: "Camera".to_string(),
        branch_id,
        branch_name: "Pune".to_string(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_two_large_additions_can_still_be_drawn() {
        let mut cable = item("CBL01", ItemType::GenericProduct);
        let branch = Uuid::new_v4();
        let now = Utc::now();
        cable.add_stock(StockUnit::Quantity(2_000_000_000), branch, None, now).unwrap();
        cable.add_stock(StockUnit::Quantity(2_000_000_000), branch, None, now).unwrap();

        let draws = cable.take_generic(branch, 1).unwrap();

        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].remaining, 1_999_999_999);
        assert_eq!(cable.available_in_branch(branch), 3_999_999_999);
    }

    #[test]
    fn test_pending_return_is_reported_by_check() {
        let manager = AuthContext::new(Uuid::new_v4(), Role::Manager, Some(Uuid::new_v4()));
        let location = SerialLocation::PendingReturn {
            technician_id: Uuid::new_v4(),
            technician_name: "Ravi Kumar".to_string(),
            item_id: "CAM01".to_string(),
        };

        let check = check_serial(&manager, vec![location.clone()]);

        assert!(check.exists);
        assert_eq!(
            check.message,
            "Serial number is pending return confirmation from technician: Ravi Kumar"
        );
        assert_eq!(check.location, Some(location.clone()));
        assert!(matches!(
            ensure_serial_free(&[location]),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn test_stock_unit_for_serialized_item_requires_serial() {
        let err = StockUnit::for_item(ItemType::SerializedProduct, Some("  "), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Serial number is required for serialized products"
        );

        let unit = StockUnit::for_item(ItemType::SerializedProduct, Some(" SN1 "), Some(4)).unwrap();
        assert_eq!(unit, StockUnit::Serial("SN1".to_string()));
        assert_eq!(unit.quantity(), 1);
    }

    #[test]
    fn test_stock_unit_for_generic_item_requires_positive_quantity() {
        assert!(StockUnit::for_item(ItemType::GenericProduct, None, None).is_err());
        assert!(StockUnit::for_item(ItemType::GenericProduct, None, Some(0)).is_err());

        let unit = StockUnit::for_item(ItemType::GenericProduct, None, Some(25)).unwrap();
        assert_eq!(unit.quantity(), 25);
        assert_eq!(unit.serial_number(), None);
    }

    #[test]
    fn test_services_never_carry_stock() {
        assert!(StockUnit::for_item(ItemType::Service, None, Some(1)).is_err());
        assert!(!ItemType::Service.is_product());
        assert!(ItemType::GenericProduct.is_product());
    }

    #[test]
    fn test_duplicate_serial_in_item_is_conflict() {
        let mut camera = item("CAM01", ItemType::SerializedProduct);
        let branch = Uuid::new_v4();
        let now = Utc::now();
        camera
            .add_stock(StockUnit::Serial("SN1".to_string()), branch, None, now)
            .unwrap();

        let err = camera
            .add_stock(StockUnit::Serial("SN1".to_string()), Uuid::new_v4(), None, now)
            .unwrap_err();

        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(err.code(), "CONFLICT");
        assert_eq!(camera.stock.len(), 1);
    }

    #[test]
    fn test_take_serial_is_branch_scoped() {
        let mut camera = item("CAM01", ItemType::SerializedProduct);
        let branch = Uuid::new_v4();
        camera
            .add_stock(StockUnit::Serial("SN7".to_string()), branch, None, Utc::now())
            .unwrap();

        let err = camera.take_serial(Uuid::new_v4(), "SN7").unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock(_)));

        let entry = camera.take_serial(branch, "SN7").unwrap();
        assert_eq!(entry.serial_number.as_deref(), Some("SN7"));
        assert!(camera.stock.is_empty());
    }

    #[test]
    fn test_withdraw_generic_drains_fifo() {
        let mut cable = item("CBL01", ItemType::GenericProduct);
        let branch = Uuid::new_v4();
        let now = Utc::now();
        cable.add_stock(StockUnit::Quantity(10), branch, None, now).unwrap();
        cable.add_stock(StockUnit::Quantity(5), branch, None, now).unwrap();

        let draws = cable.withdraw(branch, &StockUnit::Quantity(12)).unwrap();

        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].taken, 10);
        assert!(draws[0].exhausts_entry());
        assert_eq!(draws[1].taken, 2);
        assert_eq!(draws[1].remaining, 3);
        assert_eq!(cable.available_in_branch(branch), 3);
    }

    #[test]
    fn test_price_tiers() {
        let camera = item("CAM01", ItemType::SerializedProduct);
        assert_eq!(camera.price_for(CustomerType::Customer), dec("1500"));
        assert_eq!(camera.price_for(CustomerType::Dealer), dec("1200"));
        assert_eq!(camera.price_for(CustomerType::Distributor), dec("1100.50"));
    }

    #[test]
    fn test_stock_history_mirrors_entry() {
        let mut cable = item("CBL01", ItemType::GenericProduct);
        let branch = Uuid::new_v4();
        let manager = Uuid::new_v4();
        let entry = cable
            .add_stock(
                StockUnit::Quantity(40),
                branch,
                Some("Opening stock".to_string()),
                Utc::now(),
            )
            .unwrap();

        let history = StockHistory::record(&cable, &entry, manager);

        assert_eq!(history.item_id, "CBL01");
        assert_eq!(history.quantity, 40);
        assert_eq!(history.branch_id, branch);
        assert_eq!(history.added_by, manager);
        assert_eq!(history.remark.as_deref(), Some("Opening stock"));
    }

    #[test]
    fn test_serial_held_by_technician_blocks_new_stock() {
        let err = ensure_serial_free(&[SerialLocation::Technician {
            technician_id: Uuid::new_v4(),
            technician_name: "Ravi Kumar".to_string(),
            item_id: "CAM01".to_string(),
        }])
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Serial number is currently assigned to technician: Ravi Kumar"
        );
        assert!(ensure_serial_free(&[]).is_ok());
    }

    #[test]
    fn test_sales_bill_location_names_customer_type() {
        let location = SerialLocation::SalesBill {
            bill_number: "SB25030001".to_string(),
            customer_type: CustomerType::Dealer,
            customer_name: "Sai Traders".to_string(),
        };
        assert_eq!(
            location.describe(),
            "Serial number has already been used in a bill for dealer: Sai Traders"
        );
    }

    #[test]
    fn test_manager_sees_own_branch_details() {
        let branch = Uuid::new_v4();
        let manager = AuthContext::new(Uuid::new_v4(), Role::Manager, Some(branch));

        let check = check_serial(&manager, vec![branch_stock("CAM01", branch)]);

        assert!(check.exists);
        assert_eq!(
            check.message,
            "Serial number already exists in inventory for item CAM01 at branch Pune"
        );
        assert!(check.location.is_some());
    }

    #[test]
    fn test_admin_sees_every_branch() {
        let admin = AuthContext::new(Uuid::new_v4(), Role::Admin, None);
        let check = check_serial(&admin, vec![branch_stock("CAM01", Uuid::new_v4())]);
        assert!(check.location.is_some());
    }

    #[test]
    fn test_bill_sighting_reported_when_no_branch_stock() {
        let manager = AuthContext::new(Uuid::new_v4(), Role::Manager, Some(Uuid::new_v4()));
        let check = check_serial(
            &manager,
            vec![SerialLocation::TechnicianBill {
                bill_number: "TB25030002".to_string(),
                customer_name: "Asha Patil".to_string(),
            }],
        );

        assert!(check.exists);
        assert_eq!(
            check.message,
            "Serial number has already been used in a bill for customer: Asha Patil"
        );
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

        /// A generic withdrawal either takes exactly the requested quantity
        /// or leaves the shelf untouched.
        #[test]
        fn prop_generic_withdrawal_conserves_stock(
            entries in prop::collection::vec(1i32..50, 1..6),
            requested in 1i32..300
        ) {
            let mut cable = item("CBL01", ItemType::GenericProduct);
            let branch = Uuid::new_v4();
            let now = Utc::now();
            for quantity in &entries {
                cable.add_stock(StockUnit::Quantity(*quantity), branch, None, now).unwrap();
            }
            let before = cable.available_in_branch(branch);

            match cable.take_generic(branch, requested) {
                Ok(draws) => {
                    let taken: i32 = draws.iter().map(|d| d.taken).sum();
                    prop_assert_eq!(taken, requested);
                    prop_assert_eq!(cable.available_in_branch(branch), before - i64::from(requested));
                    prop_assert!(cable.stock.iter().all(|e| e.quantity > 0));
                }
                Err(_) => {
                    prop_assert!(i64::from(requested) > before);
                    prop_assert_eq!(cable.available_in_branch(branch), before);
                }
            }
        }

        /// Stock in one branch never satisfies a withdrawal in another.
        #[test]
        fn prop_branches_are_isolated(quantity in 1i32..100) {
            let mut cable = item("CBL01", ItemType::GenericProduct);
            let home = Uuid::new_v4();
            cable.add_stock(StockUnit::Quantity(quantity), home, None, Utc::now()).unwrap();

            prop_assert!(cable.take_generic(Uuid::new_v4(), 1).is_err());
            prop_assert_eq!(cable.available_in_branch(home), i64::from(quantity));
        }

        /// Shelf totals beyond `i32::MAX` are still counted and drawn from.
        #[test]
        fn prop_large_shelves_do_not_overflow(
            entries in prop::collection::vec(1_000_000_000i32..=i32::MAX, 2..5),
            requested in 1i32..=i32::MAX
        ) {
            let mut cable = item("CBL01", ItemType::GenericProduct);
            let branch = Uuid::new_v4();
            let now = Utc::now();
            for quantity in &entries {
                cable.add_stock(StockUnit::Quantity(*quantity), branch, None, now).unwrap();
            }
            let expected: i64 = entries.iter().map(|q| i64::from(*q)).sum();
            prop_assert_eq!(cable.available_in_branch(branch), expected);

            let draws = cable.take_generic(branch, requested).unwrap();
            let taken: i64 = draws.iter().map(|d| i64::from(d.taken)).sum();
            prop_assert_eq!(taken, i64::from(requested));
            prop_assert_eq!(cable.available_in_branch(branch), expected - i64::from(requested));
        }
    }
}
