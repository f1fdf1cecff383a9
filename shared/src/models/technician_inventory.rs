//! Stock held by a technician, one record per (technician, item)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

string_enum! {
    pub enum HoldingStatus {
        Active => "active",
        Used => "used",
        /// Handed back and awaiting the manager's decision
        Returned => "returned",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedHolding {
    pub serial_number: String,
    pub status: HoldingStatus,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: Option<Uuid>,
    pub used_in_work_order: Option<String>,
    pub used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicianInventory {
    pub id: Uuid,
    pub technician_id: Uuid,
    pub item_id: String,
    pub branch_id: Uuid,
    pub serialized_items: Vec<SerializedHolding>,
    pub generic_quantity: i32,
    pub updated_at: DateTime<Utc>,
}

impl TechnicianInventory {
    pub fn new(technician_id: Uuid, item_id: &str, branch_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            technician_id,
            item_id: item_id.to_string(),
            branch_id,
            serialized_items: Vec::new(),
            generic_quantity: 0,
            updated_at: now,
        }
    }

    fn find_serial_mut(&mut self, serial_number: &str) -> Option<&mut SerializedHolding> {
        self.serialized_items
            .iter_mut()
            .find(|h| h.serial_number == serial_number)
    }

    pub fn serial(&self, serial_number: &str) -> Option<&SerializedHolding> {
        self.serialized_items
            .iter()
            .find(|h| h.serial_number == serial_number)
    }

    pub fn active_serials(&self) -> impl Iterator<Item = &SerializedHolding> {
        self.serialized_items
            .iter()
            .filter(|h| h.status == HoldingStatus::Active)
    }

    pub fn assign_serial(
        &mut self,
        serial_number: &str,
        assigned_by: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.serial(serial_number).is_some() {
            return Err(DomainError::conflict(format!(
                "Serial number {} is already held by this technician",
                serial_number
            )));
        }
        self.serialized_items.push(SerializedHolding {
            serial_number: serial_number.to_string(),
            status: HoldingStatus::Active,
            assigned_at: now,
            assigned_by: Some(assigned_by),
            used_in_work_order: None,
            used_at: None,
        });
        self.updated_at = now;
        Ok(())
    }

    pub fn assign_generic(&mut self, quantity: i32, now: DateTime<Utc>) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::validation("Quantity must be greater than zero"));
        }
        self.generic_quantity = self.add_generic(quantity)?;
        self.updated_at = now;
        Ok(())
    }

    fn add_generic(&self, quantity: i32) -> DomainResult<i32> {
        self.generic_quantity.checked_add(quantity).ok_or_else(|| {
            DomainError::validation(format!(
                "Quantity for item {} exceeds the maximum a technician can hold",
                self.item_id
            ))
        })
    }

    /// Flags an active serial as consumed by a bill. The entry stays so that a
    /// bill rejection can flip it back.
    pub fn mark_used(
        &mut self,
        serial_number: &str,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let holding = self
            .find_serial_mut(serial_number)
            .filter(|h| h.status == HoldingStatus::Active)
            .ok_or_else(|| {
                DomainError::InsufficientStock(format!(
                    "Serial number {} is not available in your inventory",
                    serial_number
                ))
            })?;
        holding.status = HoldingStatus::Used;
        holding.used_in_work_order = Some(order_id.to_string());
        holding.used_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn consume_generic(&mut self, quantity: i32, now: DateTime<Utc>) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::validation("Quantity must be greater than zero"));
        }
        if quantity > self.generic_quantity {
            return Err(DomainError::InsufficientStock(format!(
                "Insufficient quantity for item: {}. Available: {}, Requested: {}",
                self.item_id, self.generic_quantity, quantity
            )));
        }
        self.generic_quantity -= quantity;
        self.updated_at = now;
        Ok(())
    }

    /// Puts a serial back into active use, re-creating the entry if it is gone.
    pub fn restore_serial(&mut self, serial_number: &str, now: DateTime<Utc>) {
        match self.find_serial_mut(serial_number) {
            Some(holding) => {
                holding.status = HoldingStatus::Active;
                holding.used_in_work_order = None;
                holding.used_at = None;
            }
            None => self.serialized_items.push(SerializedHolding {
                serial_number: serial_number.to_string(),
                status: HoldingStatus::Active,
                assigned_at: now,
                assigned_by: None,
                used_in_work_order: None,
                used_at: None,
            }),
        }
        self.updated_at = now;
    }

    pub fn restore_generic(&mut self, quantity: i32, now: DateTime<Utc>) -> DomainResult<()> {
        self.generic_quantity = self.add_generic(quantity.max(0))?;
        self.updated_at = now;
        Ok(())
    }

    pub fn stage_serial_return(&mut self, serial_number: &str, now: DateTime<Utc>) -> DomainResult<()> {
        let holding = self
            .find_serial_mut(serial_number)
            .filter(|h| h.status == HoldingStatus::Active)
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "Serial number {} is not active in your inventory",
                    serial_number
                ))
            })?;
        holding.status = HoldingStatus::Returned;
        self.updated_at = now;
        Ok(())
    }

    /// Reserves generic units for a pending return; they leave the holding
    /// immediately.
    pub fn stage_generic_return(&mut self, quantity: i32, now: DateTime<Utc>) -> DomainResult<()> {
        if quantity <= 0 || quantity > self.generic_quantity {
            return Err(DomainError::validation(format!(
                "Invalid return quantity for item: {}. Available: {}, Requested: {}",
                self.item_id, self.generic_quantity, quantity
            )));
        }
        self.generic_quantity -= quantity;
        self.updated_at = now;
        Ok(())
    }

    /// Drops a serial whose return was confirmed.
    pub fn remove_returned(&mut self, serial_number: &str, now: DateTime<Utc>) {
        self.serialized_items
            .retain(|h| !(h.serial_number == serial_number && h.status == HoldingStatus::Returned));
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_used_serial_cannot_be_used_twice() {
        let now = Utc::now();
        let mut holding = TechnicianInventory::new(Uuid::new_v4(), "CAM01", Uuid::new_v4(), now);
        holding.assign_serial("SN1", Uuid::new_v4(), now).unwrap();

        holding.mark_used("SN1", "WO25100001", now).unwrap();
        assert!(holding.mark_used("SN1", "WO25100002", now).is_err());
    }

    #[test]
    fn test_restore_recreates_missing_serial() {
        let now = Utc::now();
        let mut holding = TechnicianInventory::new(Uuid::new_v4(), "CAM01", Uuid::new_v4(), now);
        holding.restore_serial("SN9", now);
        assert_eq!(holding.active_serials().count(), 1);
    }

    #[test]
    fn test_generic_return_bounds() {
        let now = Utc::now();
        let mut holding = TechnicianInventory::new(Uuid::new_v4(), "CBL01", Uuid::new_v4(), now);
        holding.assign_generic(5, now).unwrap();

        assert!(holding.stage_generic_return(0, now).is_err());
        assert!(holding.stage_generic_return(6, now).is_err());
        holding.stage_generic_return(5, now).unwrap();
        assert_eq!(holding.generic_quantity, 0);
    }

    #[test]
    fn test_generic_total_cannot_overflow() {
        let now = Utc::now();
        let mut holding = TechnicianInventory::new(Uuid::new_v4(), "CBL01", Uuid::new_v4(), now);
        holding.assign_generic(i32::MAX - 1, now).unwrap();

        assert!(holding.assign_generic(2, now).is_err());
        assert!(holding.restore_generic(2, now).is_err());
        assert_eq!(holding.generic_quantity, i32::MAX - 1);
        holding.restore_generic(1, now).unwrap();
        assert_eq!(holding.generic_quantity, i32::MAX);
    }
}
