//! Work order lifecycle tests
//!
//! Tests for the work order state machine including:
//! - Allowed transitions and their error messages
//! - Status history entries and their placement
//! - Transfer successors
//! - Complaint eligibility

use proptest::prelude::*;

use chrono::{Duration, Utc};
use shared::numbering::{document_number, WORK_ORDER_PREFIX};
use shared::{
    ensure_complaint_allowed, next_status, Customer, CustomerStatus, DomainError, HistoryPlacement,
    HistoryStatus, Project, ProjectCategory, Transition, WorkOrder, WorkOrderStatus,
};
use uuid::Uuid;

fn customer() -> Customer {
    Customer {
        id: Uuid::new_v4(),
        name: "Asha Patil".to_string(),
        phone_number: "9876543210".to_string(),
        firm_name: None,
        whatsapp_number: None,
        address: Some("Kothrud, Pune".to_string()),
        contact_person_name: None,
        contact_person_phone: None,
        branch_id: Uuid::new_v4(),
        customer_status: CustomerStatus::New,
        created_by: Uuid::new_v4(),
        created_at: Utc::now(),
        projects: Vec::new(),
    }
}

fn pending_order() -> WorkOrder {
    let customer = customer();
    let now = Utc::now();
    let project = Project::new("PRJ-000001".to_string(), "CCTV".to_string(), None, now);
    WorkOrder::new_pending(
        document_number(WORK_ORDER_PREFIX, now, 1),
        &customer,
        &project,
        ProjectCategory::NewInstallation,
        Some("Install 4 cameras".to_string()),
        customer.created_by,
        now,
    )
}

fn in_progress_order(technician: Uuid) -> WorkOrder {
    let mut order = pending_order();
    let manager = Uuid::new_v4();
    let now = Utc::now();
    order
        .assign(technician, "Ravi Kumar", None, manager, now)
        .unwrap();
    order.start(None, technician, now).unwrap();
    order
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_new_order_starts_pending_with_history() {
        let order = pending_order();

        assert_eq!(order.status, WorkOrderStatus::Pending);
        assert!(order.order_id.starts_with("WO"));
        assert_eq!(order.status_history.len(), 1);
        assert_eq!(order.status_history[0].status, HistoryStatus::Pending);
        assert_eq!(order.status_history[0].remark, "Install 4 cameras");
    }

    #[test]
    fn test_assign_records_technician() {
        let mut order = pending_order();
        let technician = Uuid::new_v4();
        let manager = Uuid::new_v4();

        let change = order
            .assign(
                technician,
                "Ravi Kumar",
                Some("Call before visiting".to_string()),
                manager,
                Utc::now(),
            )
            .unwrap();

        assert_eq!(order.status, WorkOrderStatus::Assigned);
        assert_eq!(order.technician_id, Some(technician));
        assert_eq!(order.assigned_by, Some(manager));
        assert_eq!(order.instructions.as_deref(), Some("Call before visiting"));
        assert_eq!(change.entry.remark, "Assigned to Ravi Kumar");
        assert_eq!(change.placement, HistoryPlacement::Append);
    }

    #[test]
    fn test_reassignment_is_allowed_before_start() {
        let mut order = pending_order();
        let now = Utc::now();
        order.assign(Uuid::new_v4(), "Ravi", None, Uuid::new_v4(), now).unwrap();
        let second = Uuid::new_v4();

        order.assign(second, "Sunil", None, Uuid::new_v4(), now).unwrap();

        assert_eq!(order.technician_id, Some(second));
    }

    #[test]
    fn test_start_pause_resume() {
        let technician = Uuid::new_v4();
        let mut order = in_progress_order(technician);
        let now = Utc::now();

        order.pause(Some("Waiting for ladder".to_string()), technician, now).unwrap();
        assert_eq!(order.status, WorkOrderStatus::Paused);

        let change = order.resume(None, technician, now).unwrap();
        assert_eq!(order.status, WorkOrderStatus::InProgress);
        assert_eq!(change.entry.remark, "Work resumed");
    }

    #[test]
    fn test_cannot_start_unassigned_order() {
        let mut order = pending_order();
        let err = order.start(None, Uuid::new_v4(), Utc::now()).unwrap_err();

        assert!(matches!(err, DomainError::InvalidTransition(_)));
        assert_eq!(err.to_string(), "Cannot start a work order in pending status");
        assert_eq!(order.status_history.len(), 1);
    }

    #[test]
    fn test_cancel_messages() {
        assert_eq!(
            next_status(WorkOrderStatus::Cancelled, Transition::Cancel)
                .unwrap_err()
                .to_string(),
            "Work order is already cancelled"
        );
        assert_eq!(
            next_status(WorkOrderStatus::Assigned, Transition::Cancel)
                .unwrap_err()
                .to_string(),
            "Only pending work orders can be cancelled"
        );
        assert!(matches!(
            next_status(WorkOrderStatus::Cancelled, Transition::Cancel),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn test_cancel_requires_reason_and_prepends() {
        let mut order = pending_order();
        let manager = Uuid::new_v4();
        let now = Utc::now();

        let err = order.cancel("  ", manager, now).unwrap_err();
        assert_eq!(err.to_string(), "Cancellation reason is required");

        let change = order.cancel("Customer moved away", manager, now).unwrap();
        assert_eq!(order.status, WorkOrderStatus::Cancelled);
        assert_eq!(change.placement, HistoryPlacement::Prepend);
        assert_eq!(order.status_history[0].status, HistoryStatus::Cancelled);
    }

    #[test]
    fn test_bill_cycle_with_rejection() {
        let technician = Uuid::new_v4();
        let manager = Uuid::new_v4();
        let mut order = in_progress_order(technician);
        let now = Utc::now();

        order.submit_bill("TB25030001", technician, now).unwrap();
        assert_eq!(order.status, WorkOrderStatus::PendingApproval);

        let change = order
            .reject_bill("TB25030001", "Wrong serial billed", manager, now)
            .unwrap();
        assert_eq!(order.status, WorkOrderStatus::Rejected);
        assert_eq!(change.placement, HistoryPlacement::Prepend);
        assert_eq!(
            change.entry.remark,
            "Bill TB25030001 rejected: Wrong serial billed"
        );

        order.submit_bill("TB25030002", technician, now).unwrap();
        order.approve_bill("TB25030002", manager, now).unwrap();
        assert_eq!(order.status, WorkOrderStatus::Completed);
    }

    #[test]
    fn test_approve_requires_pending_approval() {
        let technician = Uuid::new_v4();
        let mut order = in_progress_order(technician);
        assert!(order
            .approve_bill("TB25030001", Uuid::new_v4(), Utc::now())
            .is_err());
    }

    #[test]
    fn test_transfer_requires_reason() {
        let technician = Uuid::new_v4();
        let mut order = in_progress_order(technician);

        let err = order.request_transfer("", technician, Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Transfer reason is required");
        assert_eq!(order.status, WorkOrderStatus::InProgress);
    }

    #[test]
    fn test_transfer_decisions_need_transferring_status() {
        let mut order = pending_order();
        let err = order.accept_transfer(None, Uuid::new_v4(), Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Work order is not in transferring status");
        assert!(order.close_job("Meera", Uuid::new_v4(), Utc::now()).is_err());
    }

    #[test]
    fn test_rejected_transfer_reopens_for_billing() {
        let technician = Uuid::new_v4();
        let mut order = in_progress_order(technician);
        let now = Utc::now();
        order.request_transfer("Too far from base", technician, now).unwrap();

        order.reject_transfer("Please complete it", Uuid::new_v4(), now).unwrap();

        assert_eq!(order.status, WorkOrderStatus::Rejected);
        assert!(next_status(order.status, Transition::SubmitBill).is_ok());
    }

    #[test]
    fn test_accepted_transfer_creates_successor() {
        let technician = Uuid::new_v4();
        let manager = Uuid::new_v4();
        let mut order = in_progress_order(technician);
        let now = Utc::now();
        order
            .request_transfer("Customer asked for evening visit", technician, now)
            .unwrap();

        assert!(WorkOrder::successor_of(&order, None, "WO25030002".to_string(), manager, now).is_err());

        order
            .accept_transfer(Some("Moving to the night crew".to_string()), manager, now)
            .unwrap();
        let successor = WorkOrder::successor_of(
            &order,
            Some("Moving to the night crew"),
            "WO25030002".to_string(),
            manager,
            now,
        )
        .unwrap();

        assert_eq!(order.status, WorkOrderStatus::Transferred);
        assert_eq!(successor.status, WorkOrderStatus::Pending);
        assert_eq!(successor.project_id, order.project_id);
        assert_eq!(successor.customer_id, order.customer_id);
        assert!(successor.technician_id.is_none());
        assert_eq!(successor.predecessor_order_id.as_deref(), Some(order.order_id.as_str()));
        assert_eq!(
            successor.status_history[0].remark,
            format!(
                "Created after transfer of order {}. Transfer reason: Moving to the night crew",
                order.order_id
            )
        );
    }

    #[test]
    fn test_successor_falls_back_to_request_reason() {
        let technician = Uuid::new_v4();
        let manager = Uuid::new_v4();
        let mut order = in_progress_order(technician);
        let now = Utc::now();
        order
            .request_transfer("Customer asked for evening visit", technician, now)
            .unwrap();
        order.accept_transfer(None, manager, now).unwrap();

        let successor =
            WorkOrder::successor_of(&order, Some("  "), "WO25030002".to_string(), manager, now)
                .unwrap();

        assert_eq!(
            successor.status_history[0].remark,
            format!(
                "Created after transfer of order {}. Transfer reason: Customer asked for evening visit",
                order.order_id
            )
        );
    }

    #[test]
    fn test_transferred_order_is_frozen() {
        let technician = Uuid::new_v4();
        let manager = Uuid::new_v4();
        let mut order = in_progress_order(technician);
        let now = Utc::now();
        order.request_transfer("Leaving town", technician, now).unwrap();
        order.accept_transfer(None, manager, now).unwrap();
        let history_len = order.status_history.len();

        let err = order.add_instruction("Check the DVR", manager, now).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot add instructions to a work order in transferred status"
        );
        assert!(order.add_remark("Still here", technician, now).is_err());
        assert_eq!(order.status_history.len(), history_len);
        assert_eq!(order.status, WorkOrderStatus::Transferred);
    }

    #[test]
    fn test_transfer_reason_uses_latest_request() {
        let technician = Uuid::new_v4();
        let mut order = in_progress_order(technician);
        let now = Utc::now();
        order.request_transfer("First reason", technician, now).unwrap();
        order.reject_transfer("No", Uuid::new_v4(), now).unwrap();
        order.submit_bill("TB25030001", technician, now).unwrap();
        order.reject_bill("TB25030001", "Redo it", Uuid::new_v4(), now).unwrap();

        let mut second = in_progress_order(technician);
        second.request_transfer("Old", technician, now).unwrap();
        second.status_history.push(shared::StatusHistoryEntry {
            status: HistoryStatus::Transferring,
            remark: "Newest".to_string(),
            updated_by: technician,
            updated_at: now + Duration::minutes(5),
        });

        assert_eq!(order.transfer_reason(), Some("First reason"));
        assert_eq!(second.transfer_reason(), Some("Newest"));
    }

    #[test]
    fn test_close_job_names_manager() {
        let technician = Uuid::new_v4();
        let mut order = in_progress_order(technician);
        let now = Utc::now();
        order.request_transfer("Site unsafe", technician, now).unwrap();

        let change = order.close_job("Meera Shah", Uuid::new_v4(), now).unwrap();

        assert_eq!(order.status, WorkOrderStatus::JobClosed);
        assert_eq!(
            change.entry.remark,
            "Project closed by manager Meera Shah. No further work will be done on this project."
        );
    }

    #[test]
    fn test_instructions_blocked_on_closed_orders() {
        let mut order = pending_order();
        let manager = Uuid::new_v4();
        let now = Utc::now();

        let change = order.add_instruction("Bring a 10m cable", manager, now).unwrap();
        assert_eq!(change.entry.status, HistoryStatus::Instruction);
        assert_eq!(order.status, WorkOrderStatus::Pending);

        order.cancel("Duplicate order", manager, now).unwrap();
        assert!(order.add_instruction("Too late", manager, now).is_err());
    }

    #[test]
    fn test_remarks_blocked_on_terminal_orders() {
        let technician = Uuid::new_v4();
        let mut order = in_progress_order(technician);
        let now = Utc::now();
        order.add_remark("Customer not home", technician, now).unwrap();
        assert_eq!(order.status, WorkOrderStatus::InProgress);
        assert!(order.add_remark(" ", technician, now).is_err());

        order.request_transfer("Leaving", technician, now).unwrap();
        order.close_job("Meera", Uuid::new_v4(), now).unwrap();
        let err = order.add_remark("After close", technician, now).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot add remarks to a work order in job-closed status"
        );
    }

    #[test]
    fn test_complaint_needs_finished_project() {
        let now = Utc::now();
        let open = Project::new("PRJ-000001".to_string(), "CCTV".to_string(), None, now);
        let done = Project::completed(
            "PRJ-000002".to_string(),
            "CCTV".to_string(),
            Some("Ravi".to_string()),
            None,
            None,
            now,
        );

        assert!(ensure_complaint_allowed(&open, &[WorkOrderStatus::InProgress]).is_err());
        assert!(ensure_complaint_allowed(&open, &[WorkOrderStatus::Completed]).is_ok());
        assert!(ensure_complaint_allowed(&done, &[]).is_ok());
        assert_eq!(done.completion_date, Some(now));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn status_strategy() -> impl Strategy<Value = WorkOrderStatus> {
        prop::sample::select(WorkOrderStatus::ALL.to_vec())
    }

    fn transition_strategy() -> impl Strategy<Value = Transition> {
        prop::sample::select(Transition::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A transition succeeds exactly from its source states and always
        /// lands on its target.
        #[test]
        fn prop_transitions_follow_table(
            from in status_strategy(),
            transition in transition_strategy()
        ) {
            match next_status(from, transition) {
                Ok(next) => {
                    prop_assert!(transition.sources().contains(&from));
                    prop_assert_eq!(next, transition.target());
                }
                Err(_) => prop_assert!(!transition.sources().contains(&from)),
            }
        }

        /// Terminal states reject every transition.
        #[test]
        fn prop_terminal_states_are_final(
            from in status_strategy(),
            transition in transition_strategy()
        ) {
            if from.is_terminal() {
                prop_assert!(next_status(from, transition).is_err());
            }
        }

        /// Orders in a terminal state take no instructions.
        #[test]
        fn prop_terminal_states_take_no_instructions(status in status_strategy()) {
            if status.is_terminal() {
                prop_assert!(!status.accepts_instructions());
            }
        }

        /// Only cancellations and bill rejections go to the top of the history.
        #[test]
        fn prop_prepend_placement(transition in transition_strategy()) {
            let prepends = matches!(transition, Transition::Cancel | Transition::RejectBill);
            prop_assert_eq!(
                transition.placement() == HistoryPlacement::Prepend,
                prepends
            );
        }

        /// Every applied action adds exactly one history entry.
        #[test]
        fn prop_each_action_adds_one_entry(pauses in 0usize..5) {
            let technician = Uuid::new_v4();
            let mut order = in_progress_order(technician);
            let now = Utc::now();
            let before = order.status_history.len();

            for _ in 0..pauses {
                order.pause(None, technician, now).unwrap();
                order.resume(None, technician, now).unwrap();
            }

            prop_assert_eq!(order.status_history.len(), before + pauses * 2);
        }
    }
}
