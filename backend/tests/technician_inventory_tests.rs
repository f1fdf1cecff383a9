//! Technician holdings tests
//!
//! Tests for stock held by technicians including:
//! - Serial assignment and single use
//! - Generic quantity consumption
//! - Restoring stock after a rejected bill

use proptest::prelude::*;

use chrono::Utc;
use shared::{DomainError, HoldingStatus, TechnicianInventory};
use uuid::Uuid;

fn holding(item_id: &str) -> TechnicianInventory {
    TechnicianInventory::new(Uuid::new_v4(), item_id, Uuid::new_v4(), Utc::now())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_assign_then_use_serial() {
        let now = Utc::now();
        let manager = Uuid::new_v4();
        let mut cameras = holding("CAM01");

        cameras.assign_serial("SN1", manager, now).unwrap();
        assert_eq!(cameras.active_serials().count(), 1);

        cameras.mark_used("SN1", "WO25030001", now).unwrap();
        let used = cameras.serial("SN1").unwrap();
        assert_eq!(used.status, HoldingStatus::Used);
        assert_eq!(used.used_in_work_order.as_deref(), Some("WO25030001"));
        assert_eq!(used.assigned_by, Some(manager));
        assert_eq!(cameras.active_serials().count(), 0);
    }

    #[test]
    fn test_serial_cannot_be_assigned_twice() {
        let now = Utc::now();
        let mut cameras = holding("CAM01");
        cameras.assign_serial("SN1", Uuid::new_v4(), now).unwrap();

        let err = cameras.assign_serial("SN1", Uuid::new_v4(), now).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn test_unknown_serial_cannot_be_used() {
        let mut cameras = holding("CAM01");
        let err = cameras.mark_used("SN404", "WO25030001", Utc::now()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Serial number SN404 is not available in your inventory"
        );
    }

    #[test]
    fn test_generic_consumption_is_bounded() {
        let now = Utc::now();
        let mut cable = holding("CBL01");
        cable.assign_generic(10, now).unwrap();

        let err = cable.consume_generic(11, now).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient quantity for item: CBL01. Available: 10, Requested: 11"
        );
        assert_eq!(cable.generic_quantity, 10);

        cable.consume_generic(4, now).unwrap();
        assert_eq!(cable.generic_quantity, 6);
    }

    #[test]
    fn test_non_positive_assignment_rejected() {
        let mut cable = holding("CBL01");
        assert!(cable.assign_generic(0, Utc::now()).is_err());
        assert!(cable.assign_generic(-3, Utc::now()).is_err());
    }

    #[test]
    fn test_restore_after_rejected_bill() {
        let now = Utc::now();
        let mut cameras = holding("CAM01");
        cameras.assign_serial("SN1", Uuid::new_v4(), now).unwrap();
        cameras.mark_used("SN1", "WO25030001", now).unwrap();

        cameras.restore_serial("SN1", now);

        let restored = cameras.serial("SN1").unwrap();
        assert_eq!(restored.status, HoldingStatus::Active);
        assert!(restored.used_in_work_order.is_none());
        assert!(restored.used_at.is_none());
        assert_eq!(cameras.serialized_items.len(), 1);
    }

    #[test]
    fn test_staged_serial_is_removed_on_confirmation() {
        let now = Utc::now();
        let mut cameras = holding("CAM01");
        cameras.assign_serial("SN1", Uuid::new_v4(), now).unwrap();
        cameras.assign_serial("SN2", Uuid::new_v4(), now).unwrap();

        cameras.stage_serial_return("SN1", now).unwrap();
        assert_eq!(cameras.serial("SN1").unwrap().status, HoldingStatus::Returned);
        assert!(cameras.mark_used("SN1", "WO25030001", now).is_err());

        cameras.remove_returned("SN1", now);
        assert!(cameras.serial("SN1").is_none());
        assert!(cameras.serial("SN2").is_some());
    }

    #[test]
    fn test_used_serial_cannot_be_returned() {
        let now = Utc::now();
        let mut cameras = holding("CAM01");
        cameras.assign_serial("SN1", Uuid::new_v4(), now).unwrap();
        cameras.mark_used("SN1", "WO25030001", now).unwrap();

        assert!(cameras.stage_serial_return("SN1", now).is_err());
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

        /// Consuming and then restoring a quantity leaves the holding as it was.
        #[test]
        fn prop_consume_restore_round_trip(assigned in 1i32..500, used in 1i32..500) {
            let now = Utc::now();
            let mut cable = holding("CBL01");
            cable.assign_generic(assigned, now).unwrap();

            match cable.consume_generic(used, now) {
                Ok(()) => {
                    prop_assert_eq!(cable.generic_quantity, assigned - used);
                    cable.restore_generic(used, now).unwrap();
                    prop_assert_eq!(cable.generic_quantity, assigned);
                }
                Err(_) => {
                    prop_assert!(used > assigned);
                    prop_assert_eq!(cable.generic_quantity, assigned);
                }
            }
        }

        /// The generic quantity never goes negative through staging returns.
        #[test]
        fn prop_staged_returns_never_overdraw(assigned in 0i32..100, returned in -5i32..150) {
            let now = Utc::now();
            let mut cable = holding("CBL01");
            if assigned > 0 {
                cable.assign_generic(assigned, now).unwrap();
            }

            let _ = cable.stage_generic_return(returned, now);
            prop_assert!(cable.generic_quantity >= 0);
        }
    }
}
