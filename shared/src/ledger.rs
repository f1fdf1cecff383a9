//! Where a serial number currently lives, and moving stock between places
//!
//! A serial may sit in exactly one place: a branch shelf, a technician's
//! active holding, a pending return, a non-rejected technician bill or a
//! sales bill. Callers collect every sighting of a serial and decide with the
//! functions below.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{
    AuthContext, CustomerType, Item, LedgerAction, StockEntry, TechnicianInventory,
    RETURN_STOCK_REMARK,
};

pub const DANGLING_ITEM_MESSAGE: &str =
    "Referenced item not found for returned item. The item may have been deleted.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "location", rename_all = "snake_case")]
pub enum SerialLocation {
    BranchStock {
        item_id: String,
        item_name: String,
        branch_id: Uuid,
        branch_name: String,
    },
    Technician {
        technician_id: Uuid,
        technician_name: String,
        item_id: String,
    },
    /// Staged out of a technician's holding, awaiting the manager
    PendingReturn {
        technician_id: Uuid,
        technician_name: String,
        item_id: String,
    },
    TechnicianBill {
        bill_number: String,
        customer_name: String,
    },
    SalesBill {
        bill_number: String,
        customer_type: CustomerType,
        customer_name: String,
    },
}

impl SerialLocation {
    pub fn describe(&self) -> String {
        match self {
            SerialLocation::BranchStock {
                item_id,
                branch_name,
                ..
            } => format!(
                "Serial number already exists in inventory for item {} at branch {}",
                item_id, branch_name
            ),
            SerialLocation::Technician {
                technician_name, ..
            } => format!(
                "Serial number is currently assigned to technician: {}",
                technician_name
            ),
            SerialLocation::PendingReturn {
                technician_name, ..
            } => format!(
                "Serial number is pending return confirmation from technician: {}",
                technician_name
            ),
            SerialLocation::TechnicianBill { customer_name, .. } => format!(
                "Serial number has already been used in a bill for customer: {}",
                customer_name
            ),
            SerialLocation::SalesBill {
                customer_type,
                customer_name,
                ..
            } => format!(
                "Serial number has already been used in a bill for {}: {}",
                customer_type, customer_name
            ),
        }
    }
}

/// Fails with a conflict naming the first holder, if any.
pub fn ensure_serial_free(locations: &[SerialLocation]) -> DomainResult<()> {
    match locations.first() {
        Some(location) => Err(DomainError::conflict(location.describe())),
        None => Ok(()),
    }
}

/// Answer to a serial lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialCheck {
    pub exists: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SerialLocation>,
}

/// Resolves the sightings of a serial for the caller.
///
/// Branch-bound callers only learn the details of stock in their own branch;
/// stock elsewhere is reported without naming the branch.
pub fn check_serial(ctx: &AuthContext, locations: Vec<SerialLocation>) -> SerialCheck {
    let scope = ctx.branch_scope();

    let hidden = |location: &SerialLocation| match (location, scope) {
        (SerialLocation::BranchStock { branch_id, .. }, Some(own)) => *branch_id != own,
        _ => false,
    };

    if let Some(location) = locations
        .iter()
        .find(|l| matches!(l, SerialLocation::BranchStock { .. }) && !hidden(*l))
    {
        return SerialCheck {
            exists: true,
            message: location.describe(),
            location: Some(location.clone()),
        };
    }

    if locations.iter().any(|l| hidden(l)) {
        return SerialCheck {
            exists: true,
            message: "Serial number exists but not in your branch".to_string(),
            location: None,
        };
    }

    match locations.into_iter().next() {
        Some(location) => SerialCheck {
            exists: true,
            message: location.describe(),
            location: Some(location),
        },
        None => SerialCheck {
            exists: false,
            message: "Serial number is available".to_string(),
            location: None,
        },
    }
}

/// Stock added to a branch shelf while applying ledger actions
#[derive(Debug, Clone, PartialEq)]
pub struct ShelvedStock {
    pub item_id: String,
    pub entry: StockEntry,
}

/// The aggregates one batch of [`LedgerAction`]s may touch.
///
/// `items` must hold every item that receives branch stock; holdings that
/// are missing start out empty.
#[derive(Debug, Clone)]
pub struct LedgerBook {
    pub technician_id: Uuid,
    pub branch_id: Uuid,
    pub items: HashMap<String, Item>,
    pub holdings: HashMap<String, TechnicianInventory>,
}

impl LedgerBook {
    pub fn new(technician_id: Uuid, branch_id: Uuid) -> Self {
        Self {
            technician_id,
            branch_id,
            items: HashMap::new(),
            holdings: HashMap::new(),
        }
    }

    fn holding(&mut self, item_id: &str, now: DateTime<Utc>) -> &mut TechnicianInventory {
        let (technician_id, branch_id) = (self.technician_id, self.branch_id);
        self.holdings
            .entry(item_id.to_string())
            .or_insert_with(|| TechnicianInventory::new(technician_id, item_id, branch_id, now))
    }

    /// Applies `actions` in order and returns the branch stock they created.
    ///
    /// A shelf addition for an item that is not in the book fails with
    /// [`DomainError::DanglingReference`] before anything changes.
    pub fn apply(&mut self, actions: Vec<LedgerAction>, now: DateTime<Utc>) -> DomainResult<Vec<ShelvedStock>> {
        let dangling = actions.iter().any(|a| {
            matches!(a, LedgerAction::AddBranchStock { .. }) && !self.items.contains_key(a.item_id())
        });
        if dangling {
            return Err(DomainError::DanglingReference(DANGLING_ITEM_MESSAGE.to_string()));
        }

        let mut shelved = Vec::new();
        for action in actions {
            match action {
                LedgerAction::RemoveTechnicianSerial { item_id, serial_number } => {
                    self.holding(&item_id, now).remove_returned(&serial_number, now);
                }
                LedgerAction::RestoreTechnicianSerial { item_id, serial_number } => {
                    self.holding(&item_id, now).restore_serial(&serial_number, now);
                }
                LedgerAction::RestoreTechnicianGeneric { item_id, quantity } => {
                    self.holding(&item_id, now).restore_generic(quantity, now)?;
                }
                LedgerAction::AddBranchStock { item_id, unit } => {
                    let branch_id = self.branch_id;
                    let item = self.items.get_mut(&item_id).ok_or_else(|| {
                        DomainError::DanglingReference(DANGLING_ITEM_MESSAGE.to_string())
                    })?;
                    let entry = item.add_stock(unit, branch_id, Some(RETURN_STOCK_REMARK.to_string()), now)?;
                    shelved.push(ShelvedStock { item_id, entry });
                }
            }
        }
        Ok(shelved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_manager_sees_foreign_branch_as_opaque() {
        let own = Uuid::new_v4();
        let manager = AuthContext::new(Uuid::new_v4(), Role::Manager, Some(own));
        let check = check_serial(
            &manager,
            vec![SerialLocation::BranchStock {
                item_id: "CAM01".to_string(),
                item_name: "Camera".to_string(),
                branch_id: Uuid::new_v4(),
                branch_name: "B2".to_string(),
            }],
        );
        assert!(check.exists);
        assert_eq!(check.message, "Serial number exists but not in your branch");
        assert!(check.location.is_none());
    }

    #[test]
    fn test_pending_return_blocks_new_stock() {
        let location = SerialLocation::PendingReturn {
            technician_id: Uuid::new_v4(),
            technician_name: "Ravi Kumar".to_string(),
            item_id: "CAM01".to_string(),
        };
        let err = ensure_serial_free(&[location]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Serial number is pending return confirmation from technician: Ravi Kumar"
        );
    }

    #[test]
    fn test_unknown_serial_is_available() {
        let admin = AuthContext::new(Uuid::new_v4(), Role::Admin, None);
        let check = check_serial(&admin, Vec::new());
        assert!(!check.exists);
    }
}
