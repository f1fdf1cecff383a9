//! Per-operation cache of one technician's holdings

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use shared::ledger::{LedgerBook, ShelvedStock};
use shared::{DomainError, Item, LedgerAction, TechnicianInventory};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::repo;

/// Holdings touched by one operation, loaded and locked once each
pub(crate) struct HoldingSet {
    technician_id: Uuid,
    branch_id: Uuid,
    holdings: HashMap<String, TechnicianInventory>,
}

impl HoldingSet {
    pub(crate) fn new(technician_id: Uuid, branch_id: Uuid) -> Self {
        Self {
            technician_id,
            branch_id,
            holdings: HashMap::new(),
        }
    }

    pub(crate) async fn get(
        &mut self,
        conn: &mut PgConnection,
        item_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<&mut TechnicianInventory> {
        if !self.holdings.contains_key(item_id) {
            let holding = repo::technician_inventory::find_for_update(conn, self.technician_id, item_id)
                .await?
                .unwrap_or_else(|| TechnicianInventory::new(self.technician_id, item_id, self.branch_id, now));
            self.holdings.insert(item_id.to_string(), holding);
        }
        self.holdings
            .get_mut(item_id)
            .ok_or_else(|| AppError::Internal(format!("holding for {} missing", item_id)))
    }

    pub(crate) async fn existing(&mut self, conn: &mut PgConnection, item_id: &str) -> AppResult<&mut TechnicianInventory> {
        if !self.holdings.contains_key(item_id) {
            let holding = repo::technician_inventory::find_for_update(conn, self.technician_id, item_id)
                .await?
                .ok_or_else(|| {
                    DomainError::validation(format!("Item {} is not in your inventory", item_id))
                })?;
            self.holdings.insert(item_id.to_string(), holding);
        }
        self.holdings
            .get_mut(item_id)
            .ok_or_else(|| AppError::Internal(format!("holding for {} missing", item_id)))
    }

    /// Loads and locks every holding `actions` touch, then applies them.
    /// `items` must hold the items that receive branch stock.
    pub(crate) async fn apply(
        &mut self,
        conn: &mut PgConnection,
        actions: Vec<LedgerAction>,
        items: HashMap<String, Item>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ShelvedStock>> {
        for action in actions.iter().filter(|a| !matches!(a, LedgerAction::AddBranchStock { .. })) {
            self.get(conn, action.item_id(), now).await?;
        }

        let mut book = LedgerBook {
            technician_id: self.technician_id,
            branch_id: self.branch_id,
            items,
            holdings: std::mem::take(&mut self.holdings),
        };
        let applied = book.apply(actions, now);
        self.holdings = book.holdings;
        Ok(applied?)
    }

    pub(crate) async fn save_all(&self, conn: &mut PgConnection) -> AppResult<()> {
        for holding in self.holdings.values() {
            repo::technician_inventory::save(conn, holding).await?;
        }
        Ok(())
    }
}
