//! Technician returns and the manager's decision on them

use std::collections::HashMap;

use chrono::Utc;
use serde::Deserialize;
use shared::ledger::DANGLING_ITEM_MESSAGE;
use shared::{
    AuthContext, DomainError, Item, ItemType, ReturnDecision, ReturnStatus, ReturnedInventory,
    ReturnedLine, Role, StockUnit,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::repo;
use crate::services::holdings::HoldingSet;

#[derive(Clone)]
pub struct ReturnService {
    db: PgPool,
}

#[derive(Debug, Deserialize, serde::Serialize)]
pub struct ReturnLineInput {
    pub item_id: String,
    pub serial_number: Option<String>,
    pub quantity: Option<i32>,
}

/// Input for handing stock back to the branch
#[derive(Debug, Deserialize, Validate)]
pub struct RequestReturnInput {
    #[validate(length(min = 1, message = "At least one item must be returned"))]
    pub items: Vec<ReturnLineInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectReturnInput {
    #[validate(length(min = 1, message = "Rejection reason is required"))]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReturnQuery {
    pub status: Option<ReturnStatus>,
}

impl ReturnService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Stages the listed stock out of the technician's use and records one
    /// pending return for the batch. Every line is checked before anything
    /// is written.
    pub async fn request_return(&self, ctx: &AuthContext, input: RequestReturnInput) -> AppResult<ReturnedInventory> {
        ctx.require_role(&[Role::Technician])?;
        input.validate()?;
        let branch_id = ctx.require_branch()?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;
        let mut holdings = HoldingSet::new(ctx.user_id, branch_id);
        let mut lines = Vec::with_capacity(input.items.len());

        for line in &input.items {
            let item = repo::items::find(&mut tx, &line.item_id)
                .await?
                .ok_or_else(|| DomainError::not_found("Item"))?;
            if item.item_type == ItemType::Service {
                return Err(DomainError::validation("Services cannot be returned").into());
            }
            let unit = StockUnit::for_item(item.item_type, line.serial_number.as_deref(), line.quantity)?;

            let holding = holdings.existing(&mut tx, &item.id).await?;
            match &unit {
                StockUnit::Serial(serial) => holding.stage_serial_return(serial, now)?,
                StockUnit::Quantity(quantity) => holding.stage_generic_return(*quantity, now)?,
            }

            lines.push(ReturnedLine {
                item_id: item.id.clone(),
                item_type: item.item_type,
                serial_number: unit.serial_number().map(str::to_string),
                quantity: unit.quantity(),
            });
        }

        let entry = ReturnedInventory::new(ctx.user_id, branch_id, lines, now)?;
        holdings.save_all(&mut tx).await?;
        repo::returns::insert(&mut tx, &entry).await?;

        tx.commit().await?;

        tracing::info!(
            "Technician {} returned {} line(s) in batch {}",
            ctx.user_id,
            entry.items.len(),
            entry.id
        );
        Ok(entry)
    }

    pub async fn list(&self, ctx: &AuthContext, query: ReturnQuery) -> AppResult<Vec<ReturnedInventory>> {
        let technician_id = match ctx.role {
            Role::Technician => Some(ctx.user_id),
            _ => None,
        };
        let mut conn = self.db.acquire().await?;
        repo::returns::list(&mut conn, technician_id, ctx.branch_scope(), query.status).await
    }

    pub async fn confirm(&self, ctx: &AuthContext, return_id: Uuid) -> AppResult<ReturnedInventory> {
        self.decide(ctx, return_id, ReturnDecision::Confirm).await
    }

    pub async fn reject(&self, ctx: &AuthContext, return_id: Uuid, input: RejectReturnInput) -> AppResult<ReturnedInventory> {
        input.validate()?;
        self.decide(ctx, return_id, ReturnDecision::Reject { reason: input.reason })
            .await
    }

    /// Applies a decision and its ledger effects in one transaction.
    async fn decide(&self, ctx: &AuthContext, return_id: Uuid, decision: ReturnDecision) -> AppResult<ReturnedInventory> {
        ctx.require_role(&[Role::Manager])?;
        let branch_id = ctx.require_branch()?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        let mut entry = repo::returns::find_for_update(&mut tx, return_id)
            .await?
            .filter(|r| r.branch_id == branch_id)
            .ok_or_else(|| {
                DomainError::NotFound("Returned inventory entry not found or already processed".to_string())
            })?;
        let actions = entry.plan(&decision)?;

        let mut items: HashMap<String, Item> = HashMap::new();
        for action in &actions {
            if items.contains_key(action.item_id()) {
                continue;
            }
            let item = repo::items::find_for_update(&mut tx, action.item_id())
                .await?
                .ok_or_else(|| DomainError::DanglingReference(DANGLING_ITEM_MESSAGE.to_string()))?;
            items.insert(action.item_id().to_string(), item);
        }

        let mut holdings = HoldingSet::new(entry.technician_id, entry.branch_id);
        let shelved = holdings.apply(&mut tx, actions, items, now).await?;
        for stock in &shelved {
            repo::items::insert_stock_entry(&mut tx, &stock.item_id, &stock.entry).await?;
        }

        holdings.save_all(&mut tx).await?;
        entry.decide(decision, ctx.user_id, now)?;
        repo::returns::update_decision(&mut tx, &entry).await?;

        tx.commit().await?;

        tracing::info!("Return {} {} by {}", entry.id, entry.status, ctx.user_id);
        Ok(entry)
    }
}
