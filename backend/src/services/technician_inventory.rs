//! Moving branch stock into technician holdings

use chrono::Utc;
use serde::Deserialize;
use shared::{AuthContext, DomainError, Role, StockUnit, TechnicianInventory};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::repo::{self, technician_inventory::HoldingFilter};

#[derive(Clone)]
pub struct TechnicianInventoryService {
    db: PgPool,
}

/// Input for assigning stock to a technician
#[derive(Debug, Deserialize, Validate)]
pub struct AssignStockInput {
    pub technician_id: Uuid,
    #[validate(length(min = 1, message = "Item ID is required"))]
    pub item_id: String,
    pub serial_number: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HoldingQuery {
    pub technician_id: Option<Uuid>,
    pub item_id: Option<String>,
}

impl TechnicianInventoryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Withdraws stock from the manager's branch into the technician's
    /// holding, creating the holding on first assignment.
    pub async fn assign(&self, ctx: &AuthContext, input: AssignStockInput) -> AppResult<TechnicianInventory> {
        ctx.require_role(&[Role::Manager])?;
        input.validate()?;
        let branch_id = ctx.require_branch()?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        let technician = repo::users::find(&mut tx, input.technician_id)
            .await?
            .filter(|u| u.role == Role::Technician)
            .ok_or_else(|| DomainError::not_found("Technician"))?;
        if technician.branch_id != Some(branch_id) {
            return Err(DomainError::forbidden("Technician does not belong to your branch").into());
        }

        let mut item = repo::items::find_for_update(&mut tx, &input.item_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Item"))?;
        let unit = StockUnit::for_item(
            item.item_type,
            input.serial_number.as_deref(),
            input.quantity,
        )?;
        let draws = item.withdraw(branch_id, &unit)?;

        let mut holding = match repo::technician_inventory::find_for_update(&mut tx, technician.id, &item.id).await? {
            Some(holding) => holding,
            None => TechnicianInventory::new(technician.id, &item.id, branch_id, now),
        };
        match &unit {
            StockUnit::Serial(serial) => holding.assign_serial(serial, ctx.user_id, now)?,
            StockUnit::Quantity(quantity) => holding.assign_generic(*quantity, now)?,
        }

        repo::items::apply_draws(&mut tx, &draws).await?;
        repo::technician_inventory::save(&mut tx, &holding).await?;

        tx.commit().await?;

        tracing::info!(
            "Assigned {} unit(s) of {} to technician {}",
            unit.quantity(),
            item.id,
            technician.id
        );
        Ok(holding)
    }

    /// Technicians see their own holdings, managers their branch, admins all.
    pub async fn list(&self, ctx: &AuthContext, query: HoldingQuery) -> AppResult<Vec<TechnicianInventory>> {
        let technician_id = match ctx.role {
            Role::Technician => Some(ctx.user_id),
            _ => query.technician_id,
        };
        let mut conn = self.db.acquire().await?;
        repo::technician_inventory::list(
            &mut conn,
            &HoldingFilter {
                technician_id,
                item_id: query.item_id,
                branch_id: ctx.branch_scope(),
            },
        )
        .await
    }
}
