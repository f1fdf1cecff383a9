//! Technician-to-branch returns
//!
//! A return is created `pending` with the technician's stock already staged
//! out of use. The manager then confirms it (stock moves to the branch) or
//! rejects it (stock goes back to the technician). The ledger effects of each
//! decision are planned up front as [`LedgerAction`]s and executed by the
//! caller inside one transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ItemType, StockUnit};
use crate::error::{DomainError, DomainResult};

string_enum! {
    pub enum ReturnStatus {
        Pending => "pending",
        Confirmed => "confirmed",
        Rejected => "rejected",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnedLine {
    pub item_id: String,
    pub item_type: ItemType,
    pub serial_number: Option<String>,
    pub quantity: i32,
}

impl ReturnedLine {
    pub fn unit(&self) -> StockUnit {
        match &self.serial_number {
            Some(serial) => StockUnit::Serial(serial.clone()),
            None => StockUnit::Quantity(self.quantity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnDecision {
    Confirm,
    Reject { reason: String },
}

/// A single compensating ledger step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerAction {
    RemoveTechnicianSerial { item_id: String, serial_number: String },
    RestoreTechnicianSerial { item_id: String, serial_number: String },
    RestoreTechnicianGeneric { item_id: String, quantity: i32 },
    AddBranchStock { item_id: String, unit: StockUnit },
}

impl LedgerAction {
    pub fn item_id(&self) -> &str {
        match self {
            LedgerAction::RemoveTechnicianSerial { item_id, .. }
            | LedgerAction::RestoreTechnicianSerial { item_id, .. }
            | LedgerAction::RestoreTechnicianGeneric { item_id, .. }
            | LedgerAction::AddBranchStock { item_id, .. } => item_id,
        }
    }
}

pub const RETURN_STOCK_REMARK: &str = "Returned by technician";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnedInventory {
    pub id: Uuid,
    pub technician_id: Uuid,
    pub branch_id: Uuid,
    pub items: Vec<ReturnedLine>,
    pub status: ReturnStatus,
    pub returned_at: DateTime<Utc>,
    pub confirmed_by: Option<Uuid>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl ReturnedInventory {
    pub fn new(
        technician_id: Uuid,
        branch_id: Uuid,
        items: Vec<ReturnedLine>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if items.is_empty() {
            return Err(DomainError::validation("At least one item must be returned"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            technician_id,
            branch_id,
            items,
            status: ReturnStatus::Pending,
            returned_at: now,
            confirmed_by: None,
            confirmed_at: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
        })
    }

    pub fn ensure_pending(&self) -> DomainResult<()> {
        if self.status == ReturnStatus::Pending {
            Ok(())
        } else {
            Err(DomainError::NotFound(
                "Returned inventory entry not found or already processed".to_string(),
            ))
        }
    }

    /// Ledger steps implied by `decision`, in line order.
    pub fn plan(&self, decision: &ReturnDecision) -> DomainResult<Vec<LedgerAction>> {
        self.ensure_pending()?;

        let mut actions = Vec::with_capacity(self.items.len() * 2);
        for line in &self.items {
            match (decision, &line.serial_number) {
                (ReturnDecision::Confirm, Some(serial)) => {
                    actions.push(LedgerAction::RemoveTechnicianSerial {
                        item_id: line.item_id.clone(),
                        serial_number: serial.clone(),
                    });
                    actions.push(LedgerAction::AddBranchStock {
                        item_id: line.item_id.clone(),
                        unit: line.unit(),
                    });
                }
                (ReturnDecision::Confirm, None) => {
                    actions.push(LedgerAction::AddBranchStock {
                        item_id: line.item_id.clone(),
                        unit: line.unit(),
                    });
                }
                (ReturnDecision::Reject { .. }, Some(serial)) => {
                    actions.push(LedgerAction::RestoreTechnicianSerial {
                        item_id: line.item_id.clone(),
                        serial_number: serial.clone(),
                    });
                }
                (ReturnDecision::Reject { .. }, None) => {
                    actions.push(LedgerAction::RestoreTechnicianGeneric {
                        item_id: line.item_id.clone(),
                        quantity: line.quantity,
                    });
                }
            }
        }
        Ok(actions)
    }

    pub fn decide(
        &mut self,
        decision: ReturnDecision,
        decided_by: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_pending()?;
        match decision {
            ReturnDecision::Confirm => {
                self.status = ReturnStatus::Confirmed;
                self.confirmed_by = Some(decided_by);
                self.confirmed_at = Some(now);
            }
            ReturnDecision::Reject { reason } => {
                let reason = reason.trim();
                if reason.is_empty() {
                    return Err(DomainError::validation("Rejection reason is required"));
                }
                self.status = ReturnStatus::Rejected;
                self.rejected_by = Some(decided_by);
                self.rejected_at = Some(now);
                self.rejection_reason = Some(reason.to_string());
            }
        }
        Ok(())
    }
}
