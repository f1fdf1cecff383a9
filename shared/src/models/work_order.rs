//! Work order aggregate and its state machine
//!
//! ```text
//! pending -> assigned -> in-progress <-> paused
//!                           |
//!                           v
//!                    pending-approval -> completed
//!                           |               |
//!                           +--> rejected <-+   (bill rejection, re-billable)
//!
//! assigned | in-progress -> transferring -> transferred | rejected | job-closed
//! pending -> cancelled
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Customer, Project, ProjectCategory};
use crate::error::{DomainError, DomainResult};

string_enum! {
    pub enum WorkOrderStatus {
        Pending => "pending",
        Assigned => "assigned",
        InProgress => "in-progress",
        Paused => "paused",
        PendingApproval => "pending-approval",
        Completed => "completed",
        Transferring => "transferring",
        Transferred => "transferred",
        Rejected => "rejected",
        JobClosed => "job-closed",
        Cancelled => "cancelled",
    }
}

impl WorkOrderStatus {
    /// No further transitions leave these states.
    pub fn is_terminal(&self) -> bool {
        Transition::ALL.iter().all(|t| !t.sources().contains(self))
    }

    /// Completed orders can still have their bill rejected but take no new
    /// instructions.
    pub fn accepts_instructions(&self) -> bool {
        !self.is_terminal() && *self != WorkOrderStatus::Completed
    }
}

string_enum! {
    /// Kind of a history entry; a superset of the order statuses that also
    /// covers entries which leave the status untouched.
    pub enum HistoryStatus {
        Pending => "pending",
        Assigned => "assigned",
        InProgress => "in-progress",
        Paused => "paused",
        PendingApproval => "pending-approval",
        Completed => "completed",
        Transferring => "transferring",
        Transferred => "transferred",
        Rejected => "rejected",
        JobClosed => "job-closed",
        Cancelled => "cancelled",
        Payment => "payment",
        Approval => "approval",
        Remark => "remark",
        Communication => "communication",
        Instruction => "instruction",
    }
}

impl From<WorkOrderStatus> for HistoryStatus {
    fn from(status: WorkOrderStatus) -> Self {
        match status {
            WorkOrderStatus::Pending => HistoryStatus::Pending,
            WorkOrderStatus::Assigned => HistoryStatus::Assigned,
            WorkOrderStatus::InProgress => HistoryStatus::InProgress,
            WorkOrderStatus::Paused => HistoryStatus::Paused,
            WorkOrderStatus::PendingApproval => HistoryStatus::PendingApproval,
            WorkOrderStatus::Completed => HistoryStatus::Completed,
            WorkOrderStatus::Transferring => HistoryStatus::Transferring,
            WorkOrderStatus::Transferred => HistoryStatus::Transferred,
            WorkOrderStatus::Rejected => HistoryStatus::Rejected,
            WorkOrderStatus::JobClosed => HistoryStatus::JobClosed,
            WorkOrderStatus::Cancelled => HistoryStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Assign,
    Start,
    Pause,
    Resume,
    SubmitBill,
    ApproveBill,
    RejectBill,
    RequestTransfer,
    AcceptTransfer,
    RejectTransfer,
    CloseJob,
    Cancel,
}

impl Transition {
    pub const ALL: &'static [Transition] = &[
        Transition::Assign,
        Transition::Start,
        Transition::Pause,
        Transition::Resume,
        Transition::SubmitBill,
        Transition::ApproveBill,
        Transition::RejectBill,
        Transition::RequestTransfer,
        Transition::AcceptTransfer,
        Transition::RejectTransfer,
        Transition::CloseJob,
        Transition::Cancel,
    ];

    pub fn sources(&self) -> &'static [WorkOrderStatus] {
        use WorkOrderStatus::*;
        match self {
            Transition::Assign => &[Pending, Assigned],
            Transition::Start => &[Assigned],
            Transition::Pause => &[InProgress],
            Transition::Resume => &[Paused],
            Transition::SubmitBill => &[InProgress, Rejected],
            Transition::ApproveBill => &[PendingApproval],
            Transition::RejectBill => &[PendingApproval, Completed],
            Transition::RequestTransfer => &[Assigned, InProgress],
            Transition::AcceptTransfer | Transition::RejectTransfer | Transition::CloseJob => {
                &[Transferring]
            }
            Transition::Cancel => &[Pending],
        }
    }

    pub fn target(&self) -> WorkOrderStatus {
        match self {
            Transition::Assign => WorkOrderStatus::Assigned,
            Transition::Start | Transition::Resume => WorkOrderStatus::InProgress,
            Transition::Pause => WorkOrderStatus::Paused,
            Transition::SubmitBill => WorkOrderStatus::PendingApproval,
            Transition::ApproveBill => WorkOrderStatus::Completed,
            Transition::RejectBill | Transition::RejectTransfer => WorkOrderStatus::Rejected,
            Transition::RequestTransfer => WorkOrderStatus::Transferring,
            Transition::AcceptTransfer => WorkOrderStatus::Transferred,
            Transition::CloseJob => WorkOrderStatus::JobClosed,
            Transition::Cancel => WorkOrderStatus::Cancelled,
        }
    }

    /// Cancellations and bill rejections go to the top of the history.
    pub fn placement(&self) -> HistoryPlacement {
        match self {
            Transition::Cancel | Transition::RejectBill => HistoryPlacement::Prepend,
            _ => HistoryPlacement::Append,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Transition::Assign => "assign",
            Transition::Start => "start",
            Transition::Pause => "pause",
            Transition::Resume => "resume",
            Transition::SubmitBill => "bill",
            Transition::ApproveBill => "approve",
            Transition::RejectBill => "reject the bill of",
            Transition::RequestTransfer => "transfer",
            Transition::AcceptTransfer => "accept the transfer of",
            Transition::RejectTransfer => "reject the transfer of",
            Transition::CloseJob => "close",
            Transition::Cancel => "cancel",
        }
    }
}

/// Resolves the status reached by applying `transition` to `from`.
pub fn next_status(from: WorkOrderStatus, transition: Transition) -> DomainResult<WorkOrderStatus> {
    if transition.sources().contains(&from) {
        return Ok(transition.target());
    }

    let message = match (transition, from) {
        (Transition::Cancel, WorkOrderStatus::Cancelled) => {
            return Err(DomainError::conflict("Work order is already cancelled"));
        }
        (Transition::Cancel, _) => "Only pending work orders can be cancelled".to_string(),
        (Transition::AcceptTransfer | Transition::RejectTransfer | Transition::CloseJob, _) => {
            "Work order is not in transferring status".to_string()
        }
        _ => format!(
            "Cannot {} a work order in {} status",
            transition.verb(),
            from
        ),
    };
    Err(DomainError::InvalidTransition(message))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPlacement {
    Append,
    Prepend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: HistoryStatus,
    pub remark: String,
    pub updated_by: Uuid,
    pub updated_at: DateTime<Utc>,
}

/// A history entry together with where it was placed
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryChange {
    pub entry: StatusHistoryEntry,
    pub placement: HistoryPlacement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemUsed {
    pub item_id: String,
    pub serial_number: Option<String>,
    pub quantity: i32,
    pub used_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingInfo {
    pub bill_id: Uuid,
    pub bill_number: String,
    pub amount: Decimal,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: Uuid,
    pub order_id: String,
    pub customer_id: Uuid,
    pub branch_id: Uuid,
    pub project_id: String,
    pub project_type: String,
    pub project_category: ProjectCategory,
    pub status: WorkOrderStatus,
    pub initial_remark: Option<String>,
    pub instructions: Option<String>,
    pub technician_id: Option<Uuid>,
    pub assigned_by: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub predecessor_order_id: Option<String>,
    pub status_history: Vec<StatusHistoryEntry>,
    pub items_used: Vec<ItemUsed>,
    pub billing_info: Vec<BillingInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn required(text: &str, message: &str) -> DomainResult<String> {
    let text = text.trim();
    if text.is_empty() {
        Err(DomainError::validation(message))
    } else {
        Ok(text.to_string())
    }
}

impl WorkOrder {
    /// A fresh pending order for one of the customer's projects.
    pub fn new_pending(
        order_id: String,
        customer: &Customer,
        project: &Project,
        category: ProjectCategory,
        initial_remark: Option<String>,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        let remark = initial_remark
            .clone()
            .unwrap_or_else(|| "Work order created".to_string());
        Self {
            id: Uuid::new_v4(),
            order_id,
            customer_id: customer.id,
            branch_id: customer.branch_id,
            project_id: project.project_id.clone(),
            project_type: project.project_type.clone(),
            project_category: category,
            status: WorkOrderStatus::Pending,
            initial_remark,
            instructions: None,
            technician_id: None,
            assigned_by: None,
            assigned_at: None,
            created_by,
            predecessor_order_id: None,
            status_history: vec![StatusHistoryEntry {
                status: HistoryStatus::Pending,
                remark,
                updated_by: created_by,
                updated_at: now,
            }],
            items_used: Vec::new(),
            billing_info: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The order that replaces a transferred one. It keeps the project and
    /// its instructions but starts again unassigned.
    ///
    /// The first history entry quotes the manager's acceptance remark, or the
    /// technician's request reason when the manager gave none.
    pub fn successor_of(
        previous: &WorkOrder,
        accept_remark: Option<&str>,
        order_id: String,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if previous.status != WorkOrderStatus::Transferred {
            return Err(DomainError::InvalidTransition(
                "Only transferred work orders can be succeeded".to_string(),
            ));
        }
        let remark = format!(
            "Created after transfer of order {}. Transfer reason: {}",
            previous.order_id,
            accept_remark
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .or_else(|| previous.transfer_reason())
                .unwrap_or("Not specified")
        );
        Ok(Self {
            id: Uuid::new_v4(),
            order_id,
            customer_id: previous.customer_id,
            branch_id: previous.branch_id,
            project_id: previous.project_id.clone(),
            project_type: previous.project_type.clone(),
            project_category: previous.project_category,
            status: WorkOrderStatus::Pending,
            initial_remark: previous.initial_remark.clone(),
            instructions: previous.instructions.clone(),
            technician_id: None,
            assigned_by: None,
            assigned_at: None,
            created_by,
            predecessor_order_id: Some(previous.order_id.clone()),
            status_history: vec![StatusHistoryEntry {
                status: HistoryStatus::Pending,
                remark,
                updated_by: created_by,
                updated_at: now,
            }],
            items_used: Vec::new(),
            billing_info: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Remark of the latest transfer request
    pub fn transfer_reason(&self) -> Option<&str> {
        self.status_history
            .iter()
            .filter(|e| e.status == HistoryStatus::Transferring)
            .max_by_key(|e| e.updated_at)
            .map(|e| e.remark.as_str())
    }

    fn record(
        &mut self,
        status: HistoryStatus,
        remark: String,
        placement: HistoryPlacement,
        actor: Uuid,
        now: DateTime<Utc>,
    ) -> HistoryChange {
        let entry = StatusHistoryEntry {
            status,
            remark,
            updated_by: actor,
            updated_at: now,
        };
        match placement {
            HistoryPlacement::Append => self.status_history.push(entry.clone()),
            HistoryPlacement::Prepend => self.status_history.insert(0, entry.clone()),
        }
        self.updated_at = now;
        HistoryChange { entry, placement }
    }

    fn apply(
        &mut self,
        transition: Transition,
        remark: String,
        actor: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<HistoryChange> {
        let next = next_status(self.status, transition)?;
        self.status = next;
        Ok(self.record(next.into(), remark, transition.placement(), actor, now))
    }

    pub fn assign(
        &mut self,
        technician_id: Uuid,
        technician_name: &str,
        instructions: Option<String>,
        actor: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<HistoryChange> {
        let change = self.apply(
            Transition::Assign,
            format!("Assigned to {}", technician_name),
            actor,
            now,
        )?;
        self.technician_id = Some(technician_id);
        self.assigned_by = Some(actor);
        self.assigned_at = Some(now);
        if let Some(instructions) = instructions.filter(|i| !i.trim().is_empty()) {
            self.instructions = Some(instructions);
        }
        Ok(change)
    }

    pub fn start(&mut self, remark: Option<String>, actor: Uuid, now: DateTime<Utc>) -> DomainResult<HistoryChange> {
        let remark = remark.unwrap_or_else(|| "Work started".to_string());
        self.apply(Transition::Start, remark, actor, now)
    }

    pub fn pause(&mut self, remark: Option<String>, actor: Uuid, now: DateTime<Utc>) -> DomainResult<HistoryChange> {
        let remark = remark.unwrap_or_else(|| "Work paused".to_string());
        self.apply(Transition::Pause, remark, actor, now)
    }

    pub fn resume(&mut self, remark: Option<String>, actor: Uuid, now: DateTime<Utc>) -> DomainResult<HistoryChange> {
        let remark = remark.unwrap_or_else(|| "Work resumed".to_string());
        self.apply(Transition::Resume, remark, actor, now)
    }

    pub fn submit_bill(&mut self, bill_number: &str, actor: Uuid, now: DateTime<Utc>) -> DomainResult<HistoryChange> {
        self.apply(
            Transition::SubmitBill,
            format!("Bill {} submitted for approval", bill_number),
            actor,
            now,
        )
    }

    pub fn approve_bill(&mut self, bill_number: &str, actor: Uuid, now: DateTime<Utc>) -> DomainResult<HistoryChange> {
        self.apply(
            Transition::ApproveBill,
            format!("Bill {} approved", bill_number),
            actor,
            now,
        )
    }

    pub fn reject_bill(
        &mut self,
        bill_number: &str,
        reason: &str,
        actor: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<HistoryChange> {
        self.apply(
            Transition::RejectBill,
            format!("Bill {} rejected: {}", bill_number, reason),
            actor,
            now,
        )
    }

    pub fn request_transfer(&mut self, remark: &str, actor: Uuid, now: DateTime<Utc>) -> DomainResult<HistoryChange> {
        let remark = required(remark, "Transfer reason is required")?;
        self.apply(Transition::RequestTransfer, remark, actor, now)
    }

    pub fn accept_transfer(
        &mut self,
        remark: Option<String>,
        actor: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<HistoryChange> {
        let remark = remark.unwrap_or_else(|| "Transfer request approved".to_string());
        self.apply(Transition::AcceptTransfer, remark, actor, now)
    }

    pub fn reject_transfer(&mut self, reason: &str, actor: Uuid, now: DateTime<Utc>) -> DomainResult<HistoryChange> {
        let reason = required(reason, "Rejection reason is required")?;
        self.apply(Transition::RejectTransfer, reason, actor, now)
    }

    pub fn close_job(&mut self, manager_name: &str, actor: Uuid, now: DateTime<Utc>) -> DomainResult<HistoryChange> {
        self.apply(
            Transition::CloseJob,
            format!(
                "Project closed by manager {}. No further work will be done on this project.",
                manager_name
            ),
            actor,
            now,
        )
    }

    pub fn cancel(&mut self, reason: &str, actor: Uuid, now: DateTime<Utc>) -> DomainResult<HistoryChange> {
        let reason = required(reason, "Cancellation reason is required")?;
        self.apply(Transition::Cancel, reason, actor, now)
    }

    pub fn add_instruction(&mut self, instruction: &str, actor: Uuid, now: DateTime<Utc>) -> DomainResult<HistoryChange> {
        let instruction = required(instruction, "Instruction is required")?;
        if !self.status.accepts_instructions() {
            return Err(DomainError::InvalidTransition(format!(
                "Cannot add instructions to a work order in {} status",
                self.status
            )));
        }
        Ok(self.record(
            HistoryStatus::Instruction,
            instruction,
            HistoryPlacement::Append,
            actor,
            now,
        ))
    }

    pub fn add_remark(&mut self, remark: &str, actor: Uuid, now: DateTime<Utc>) -> DomainResult<HistoryChange> {
        let remark = required(remark, "Remark is required")?;
        if self.status.is_terminal() {
            return Err(DomainError::InvalidTransition(format!(
                "Cannot add remarks to a work order in {} status",
                self.status
            )));
        }
        Ok(self.record(
            HistoryStatus::Remark,
            remark,
            HistoryPlacement::Append,
            actor,
            now,
        ))
    }
}
