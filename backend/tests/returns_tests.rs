//! Technician return tests
//!
//! Tests for stock handed back to a branch including:
//! - Ledger steps planned for confirmation and rejection
//! - Single decision per return

use shared::{
    DomainError, ItemType, LedgerAction, ReturnDecision, ReturnStatus, ReturnedInventory,
    ReturnedLine, StockUnit,
};

use chrono::Utc;
use uuid::Uuid;

fn serial_line(item_id: &str, serial: &str) -> ReturnedLine {
    ReturnedLine {
        item_id: item_id.to_string(),
        item_type: ItemType::SerializedProduct,
        serial_number: Some(serial.to_string()),
        quantity: 1,
    }
}

fn generic_line(item_id: &str, quantity: i32) -> ReturnedLine {
    ReturnedLine {
        item_id: item_id.to_string(),
        item_type: ItemType::GenericProduct,
        serial_number: None,
        quantity,
    }
}

fn pending_return() -> ReturnedInventory {
    ReturnedInventory::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        vec![serial_line("CAM01", "SN1"), generic_line("CBL01", 3)],
        Utc::now(),
    )
    .unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_empty_return_rejected() {
        let err = ReturnedInventory::new(Uuid::new_v4(), Uuid::new_v4(), Vec::new(), Utc::now())
            .unwrap_err();
        assert_eq!(err.to_string(), "At least one item must be returned");
    }

    #[test]
    fn test_confirmation_moves_stock_to_branch() {
        let entry = pending_return();

        let actions = entry.plan(&ReturnDecision::Confirm).unwrap();

        assert_eq!(
            actions,
            vec![
                LedgerAction::RemoveTechnicianSerial {
                    item_id: "CAM01".to_string(),
                    serial_number: "SN1".to_string(),
                },
                LedgerAction::AddBranchStock {
                    item_id: "CAM01".to_string(),
                    unit: StockUnit::Serial("SN1".to_string()),
                },
                LedgerAction::AddBranchStock {
                    item_id: "CBL01".to_string(),
                    unit: StockUnit::Quantity(3),
                },
            ]
        );
    }

    #[test]
    fn test_rejection_restores_technician_stock() {
        let entry = pending_return();
        let decision = ReturnDecision::Reject {
            reason: "Wrong items".to_string(),
        };

        let actions = entry.plan(&decision).unwrap();

        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].item_id(), "CAM01");
        assert!(matches!(
            &actions[1],
            LedgerAction::RestoreTechnicianGeneric { quantity: 3, .. }
        ));
    }

    #[test]
    fn test_confirm_records_decider() {
        let mut entry = pending_return();
        let manager = Uuid::new_v4();

        entry.decide(ReturnDecision::Confirm, manager, Utc::now()).unwrap();

        assert_eq!(entry.status, ReturnStatus::Confirmed);
        assert_eq!(entry.confirmed_by, Some(manager));
        assert!(entry.rejected_by.is_none());
    }

    #[test]
    fn test_reject_requires_reason() {
        let mut entry = pending_return();
        let err = entry
            .decide(
                ReturnDecision::Reject {
                    reason: "   ".to_string(),
                },
                Uuid::new_v4(),
                Utc::now(),
            )
            .unwrap_err();

        assert_eq!(err.to_string(), "Rejection reason is required");
        assert_eq!(entry.status, ReturnStatus::Pending);
    }

    #[test]
    fn test_processed_return_cannot_be_decided_again() {
        let mut entry = pending_return();
        entry.decide(ReturnDecision::Confirm, Uuid::new_v4(), Utc::now()).unwrap();

        let err = entry.plan(&ReturnDecision::Confirm).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
        assert_eq!(
            err.to_string(),
            "Returned inventory entry not found or already processed"
        );
        assert!(entry
            .decide(
                ReturnDecision::Reject {
                    reason: "Late".to_string()
                },
                Uuid::new_v4(),
                Utc::now()
            )
            .is_err());
    }
}
