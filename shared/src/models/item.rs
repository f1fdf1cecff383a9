//! Catalogue items and branch stock

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CustomerType;
use crate::error::{DomainError, DomainResult};

string_enum! {
    pub enum ItemType {
        SerializedProduct => "serialized-product",
        GenericProduct => "generic-product",
        Service => "service",
    }
}

impl ItemType {
    pub fn is_product(&self) -> bool {
        !matches!(self, ItemType::Service)
    }
}

/// Price tiers by buyer category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub customer_price: Decimal,
    pub dealer_price: Decimal,
    pub distributor_price: Decimal,
}

/// One unit of stock on a branch shelf.
///
/// Serialized items hold exactly one unit per entry; generic items may hold
/// any positive quantity and are consumed in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockEntry {
    pub id: Uuid,
    pub serial_number: Option<String>,
    pub quantity: i32,
    pub branch_id: Uuid,
    pub date: DateTime<Utc>,
    pub remark: Option<String>,
}

/// What is being moved: one serial or a quantity of a generic item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockUnit {
    Serial(String),
    Quantity(i32),
}

impl StockUnit {
    /// Resolves request fields against the item type.
    pub fn for_item(
        item_type: ItemType,
        serial_number: Option<&str>,
        quantity: Option<i32>,
    ) -> DomainResult<Self> {
        match item_type {
            ItemType::SerializedProduct => {
                let serial = serial_number.map(str::trim).unwrap_or_default();
                if serial.is_empty() {
                    return Err(DomainError::validation(
                        "Serial number is required for serialized products",
                    ));
                }
                Ok(StockUnit::Serial(serial.to_string()))
            }
            ItemType::GenericProduct => match quantity {
                Some(q) if q > 0 => Ok(StockUnit::Quantity(q)),
                _ => Err(DomainError::validation(
                    "Valid quantity is required for generic products",
                )),
            },
            ItemType::Service => Err(DomainError::validation(
                "Services do not carry stock",
            )),
        }
    }

    pub fn quantity(&self) -> i32 {
        match self {
            StockUnit::Serial(_) => 1,
            StockUnit::Quantity(q) => *q,
        }
    }

    pub fn serial_number(&self) -> Option<&str> {
        match self {
            StockUnit::Serial(s) => Some(s),
            StockUnit::Quantity(_) => None,
        }
    }
}

/// Effect of a FIFO withdrawal on a single stock entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockDraw {
    pub entry_id: Uuid,
    pub taken: i32,
    pub remaining: i32,
}

impl StockDraw {
    pub fn exhausts_entry(&self) -> bool {
        self.remaining == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub item_type: ItemType,
    pub pricing: Pricing,
    pub purchase_price: Option<Decimal>,
    pub mrp: Option<Decimal>,
    pub unit: Option<String>,
    pub warranty: Option<String>,
    pub stock: Vec<StockEntry>,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn price_for(&self, customer_type: CustomerType) -> Decimal {
        match customer_type {
            CustomerType::Customer => self.pricing.customer_price,
            CustomerType::Dealer => self.pricing.dealer_price,
            CustomerType::Distributor => self.pricing.distributor_price,
        }
    }

    pub fn is_service(&self) -> bool {
        self.item_type == ItemType::Service
    }

    /// Generic units on the shelf of one branch. Entries are `i32` each, so
    /// the total is widened.
    pub fn available_in_branch(&self, branch_id: Uuid) -> i64 {
        total_quantity(self.stock.iter().filter(|e| e.branch_id == branch_id))
    }

    pub fn has_serial(&self, serial_number: &str) -> bool {
        self.stock
            .iter()
            .any(|e| e.serial_number.as_deref() == Some(serial_number))
    }

    /// Puts stock on a branch shelf and returns the new entry.
    ///
    /// Cross-system serial uniqueness is checked by the caller through
    /// [`crate::ledger::ensure_serial_free`]; this only guards the item's own
    /// stock list.
    pub fn add_stock(
        &mut self,
        unit: StockUnit,
        branch_id: Uuid,
        remark: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<StockEntry> {
        if self.is_service() {
            return Err(DomainError::validation("Cannot add stock to service items"));
        }

        let entry = match (self.item_type, unit) {
            (ItemType::SerializedProduct, StockUnit::Serial(serial)) => {
                if self.has_serial(&serial) {
                    return Err(DomainError::conflict(
                        "Serial number already exists in inventory",
                    ));
                }
                StockEntry {
                    id: Uuid::new_v4(),
                    serial_number: Some(serial),
                    quantity: 1,
                    branch_id,
                    date: now,
                    remark,
                }
            }
            (ItemType::GenericProduct, StockUnit::Quantity(quantity)) if quantity > 0 => {
                StockEntry {
                    id: Uuid::new_v4(),
                    serial_number: None,
                    quantity,
                    branch_id,
                    date: now,
                    remark,
                }
            }
            (ItemType::SerializedProduct, _) => {
                return Err(DomainError::validation(
                    "Serial number is required for serialized products",
                ))
            }
            _ => {
                return Err(DomainError::validation(
                    "Valid quantity is required for generic products",
                ))
            }
        };

        self.stock.push(entry.clone());
        Ok(entry)
    }

    /// Removes the branch-scoped entry holding `serial_number`.
    pub fn take_serial(&mut self, branch_id: Uuid, serial_number: &str) -> DomainResult<StockEntry> {
        let position = self
            .stock
            .iter()
            .position(|e| {
                e.branch_id == branch_id && e.serial_number.as_deref() == Some(serial_number)
            })
            .ok_or_else(|| {
                DomainError::InsufficientStock(format!(
                    "Serial number {} not available in your branch for item: {}",
                    serial_number, self.name
                ))
            })?;
        Ok(self.stock.remove(position))
    }

    /// Withdraws `quantity` generic units from a branch, oldest entries first.
    ///
    /// Nothing is touched unless the branch holds enough in total. Entries
    /// drained to zero are removed.
    pub fn take_generic(&mut self, branch_id: Uuid, quantity: i32) -> DomainResult<Vec<StockDraw>> {
        if quantity <= 0 {
            return Err(DomainError::validation("Quantity must be greater than zero"));
        }

        let available = self.available_in_branch(branch_id);
        if available < i64::from(quantity) {
            return Err(DomainError::InsufficientStock(format!(
                "Insufficient stock for item: {}. Available: {}, Requested: {}",
                self.name, available, quantity
            )));
        }

        let mut outstanding = quantity;
        let mut draws = Vec::new();
        for entry in self.stock.iter_mut().filter(|e| e.branch_id == branch_id) {
            if outstanding == 0 {
                break;
            }
            let taken = entry.quantity.min(outstanding);
            entry.quantity -= taken;
            outstanding -= taken;
            draws.push(StockDraw {
                entry_id: entry.id,
                taken,
                remaining: entry.quantity,
            });
        }
        self.stock.retain(|e| e.quantity > 0);

        Ok(draws)
    }

    /// Withdraws one unit of stock for a sale or an assignment.
    pub fn withdraw(&mut self, branch_id: Uuid, unit: &StockUnit) -> DomainResult<Vec<StockDraw>> {
        match unit {
            StockUnit::Serial(serial) => {
                let entry = self.take_serial(branch_id, serial)?;
                Ok(vec![StockDraw {
                    entry_id: entry.id,
                    taken: 1,
                    remaining: 0,
                }])
            }
            StockUnit::Quantity(quantity) => self.take_generic(branch_id, *quantity),
        }
    }
}

/// Sum of entry quantities without `i32` overflow
pub fn total_quantity<'a>(entries: impl IntoIterator<Item = &'a StockEntry>) -> i64 {
    entries.into_iter().map(|e| i64::from(e.quantity)).sum()
}

/// Append-only record of a stock addition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockHistory {
    pub id: Uuid,
    pub item_id: String,
    pub item_type: ItemType,
    pub serial_number: Option<String>,
    pub quantity: i32,
    pub branch_id: Uuid,
    pub added_by: Uuid,
    pub added_at: DateTime<Utc>,
    pub remark: Option<String>,
}

impl StockHistory {
    pub fn record(item: &Item, entry: &StockEntry, added_by: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id: item.id.clone(),
            item_type: item.item_type,
            serial_number: entry.serial_number.clone(),
            quantity: entry.quantity,
            branch_id: entry.branch_id,
            added_by,
            added_at: entry.date,
            remark: entry.remark.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generic_item() -> Item {
        Item {
            id: "CBL01".to_string(),
            name: "Cable".to_string(),
            item_type: ItemType::GenericProduct,
            pricing: Pricing {
                customer_price: Decimal::from(10),
                dealer_price: Decimal::from(8),
                distributor_price: Decimal::from(7),
            },
            purchase_price: None,
            mrp: None,
            unit: Some("m".to_string()),
            warranty: None,
            stock: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_take_generic_drains_oldest_first() {
        let mut item = generic_item();
        let branch = Uuid::new_v4();
        let now = Utc::now();
        item.add_stock(StockUnit::Quantity(3), branch, None, now).unwrap();
        item.add_stock(StockUnit::Quantity(5), branch, None, now).unwrap();

        let draws = item.take_generic(branch, 4).unwrap();

        assert_eq!(draws.len(), 2);
        assert!(draws[0].exhausts_entry());
        assert_eq!(draws[1].taken, 1);
        assert_eq!(draws[1].remaining, 4);
        assert_eq!(item.stock.len(), 1);
        assert_eq!(item.available_in_branch(branch), 4);
    }

    #[test]
    fn test_take_generic_rejects_before_mutation() {
        let mut item = generic_item();
        let branch = Uuid::new_v4();
        item.add_stock(StockUnit::Quantity(2), branch, None, Utc::now())
            .unwrap();

        let err = item.take_generic(branch, 3).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Insufficient stock for item: Cable. Available: 2, Requested: 3"
        );
        assert_eq!(item.available_in_branch(branch), 2);
    }

    #[test]
    fn test_other_branch_stock_is_invisible() {
        let mut item = generic_item();
        item.add_stock(StockUnit::Quantity(10), Uuid::new_v4(), None, Utc::now())
            .unwrap();
        assert!(item.take_generic(Uuid::new_v4(), 1).is_err());
    }

    #[test]
    fn test_service_cannot_hold_stock() {
        let mut item = generic_item();
        item.item_type = ItemType::Service;
        let err = item
            .add_stock(StockUnit::Quantity(1), Uuid::new_v4(), None, Utc::now())
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot add stock to service items");
    }
}
