//! Item catalogue and branch stock ledger

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::ledger::{self, SerialCheck};
use shared::{
    total_quantity, validate_item_id, validate_serial_number, AuthContext, DomainError, Item,
    ItemType, Pricing, Role, StockEntry, StockHistory, StockUnit, TechnicianInventory,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::repo::{self, technician_inventory::HoldingFilter};

/// Inventory service for the catalogue and branch stock
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
}

/// Input for creating an item
#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemInput {
    #[validate(length(min = 1, max = 50, message = "Item ID is required"))]
    pub id: String,
    #[validate(length(min = 1, max = 200, message = "Item name is required"))]
    pub name: String,
    pub item_type: ItemType,
    pub customer_price: Decimal,
    pub dealer_price: Option<Decimal>,
    pub distributor_price: Option<Decimal>,
    pub purchase_price: Option<Decimal>,
    pub mrp: Option<Decimal>,
    pub unit: Option<String>,
    pub warranty: Option<String>,
}

/// Input for adding stock to the caller's branch
#[derive(Debug, Deserialize, Validate)]
pub struct AddStockInput {
    #[validate(length(min = 1, message = "Item ID is required"))]
    pub item_id: String,
    pub serial_number: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: Option<i32>,
    pub remark: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemQuery {
    pub item_type: Option<ItemType>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StockHistoryQuery {
    pub item_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StockStatusQuery {
    pub branch_id: Option<Uuid>,
}

/// Result of a stock addition
#[derive(Debug, Clone, Serialize)]
pub struct StockAdded {
    pub item_id: String,
    pub entry: StockEntry,
    pub history: StockHistory,
}

/// Current position of one item: shelf stock plus what technicians hold
#[derive(Debug, Clone, Serialize)]
pub struct StockStatus {
    pub item_id: String,
    pub item_name: String,
    pub item_type: ItemType,
    pub branch_stock: Vec<StockEntry>,
    pub branch_quantity: i64,
    pub technician_holdings: Vec<TechnicianInventory>,
    pub technician_quantity: i64,
}

fn tier_price(item_type: ItemType, price: Option<Decimal>, field: &str) -> AppResult<Decimal> {
    match (item_type.is_product(), price) {
        (_, Some(price)) if price < Decimal::ZERO => {
            Err(AppError::validation(field, "Price cannot be negative"))
        }
        (_, Some(price)) => Ok(price),
        (true, None) => Err(AppError::validation(
            field,
            "Dealer and distributor prices are required for products",
        )),
        (false, None) => Ok(Decimal::ZERO),
    }
}

impl InventoryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_item(&self, ctx: &AuthContext, input: CreateItemInput) -> AppResult<Item> {
        input.validate()?;
        let id = input.id.trim().to_uppercase();
        validate_item_id(&id).map_err(|m| AppError::validation("id", m))?;

        if input.item_type.is_product() && !ctx.is_admin() {
            return Err(DomainError::forbidden("Only admin can create products").into());
        }
        if input.customer_price < Decimal::ZERO {
            return Err(AppError::validation("customer_price", "Price cannot be negative"));
        }

        let pricing = Pricing {
            customer_price: input.customer_price,
            dealer_price: tier_price(input.item_type, input.dealer_price, "dealer_price")?,
            distributor_price: tier_price(
                input.item_type,
                input.distributor_price,
                "distributor_price",
            )?,
        };
        let is_product = input.item_type.is_product();
        let item = Item {
            id,
            name: input.name.trim().to_string(),
            item_type: input.item_type,
            pricing,
            purchase_price: input.purchase_price.filter(|_| is_product),
            mrp: input.mrp.filter(|_| is_product),
            unit: input.unit.filter(|_| is_product),
            warranty: input.warranty.filter(|_| is_product),
            stock: Vec::new(),
            created_at: Utc::now(),
        };

        let mut conn = self.db.acquire().await?;
        match repo::items::duplicate_key(&mut conn, &item.id, &item.name).await? {
            Some("id") => {
                return Err(DomainError::conflict("Item with this ID already exists").into())
            }
            Some(_) => {
                return Err(DomainError::conflict("Product with this name already exists").into())
            }
            None => {}
        }
        repo::items::insert(&mut conn, &item, ctx.user_id).await?;

        tracing::info!("Item {} ({}) created by {}", item.id, item.item_type, ctx.user_id);
        Ok(item)
    }

    /// Lists items; branch-bound callers only see their own branch's stock.
    pub async fn list_items(&self, ctx: &AuthContext, query: ItemQuery) -> AppResult<Vec<Item>> {
        let mut conn = self.db.acquire().await?;
        repo::items::list(&mut conn, query.item_type, ctx.branch_scope()).await
    }

    pub async fn get_item(&self, ctx: &AuthContext, item_id: &str) -> AppResult<Item> {
        let mut conn = self.db.acquire().await?;
        let mut item = repo::items::find(&mut conn, item_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Item"))?;
        if let Some(branch) = ctx.branch_scope() {
            item.stock.retain(|e| e.branch_id == branch);
        }
        Ok(item)
    }

    /// Deletes an item. Pending returns that reference it are left alone and
    /// fail when decided.
    pub async fn delete_item(&self, ctx: &AuthContext, item_id: &str) -> AppResult<()> {
        ctx.require_role(&[Role::Admin])?;
        let mut conn = self.db.acquire().await?;
        if !repo::items::delete(&mut conn, item_id).await? {
            return Err(DomainError::not_found("Item").into());
        }
        tracing::info!("Item {} deleted by {}", item_id, ctx.user_id);
        Ok(())
    }

    /// Puts stock on the caller's branch shelf.
    ///
    /// The serial is checked against every place it could already be before
    /// anything is written; the history record is appended in the same
    /// transaction.
    pub async fn add_stock(&self, ctx: &AuthContext, input: AddStockInput) -> AppResult<StockAdded> {
        ctx.require_role(&[Role::Manager])?;
        input.validate()?;
        let branch_id = ctx.require_branch()?;

        let mut tx = self.db.begin().await?;

        let mut item = repo::items::find_for_update(&mut tx, &input.item_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Item"))?;
        let unit = StockUnit::for_item(
            item.item_type,
            input.serial_number.as_deref(),
            input.quantity,
        )?;

        if let Some(serial) = unit.serial_number() {
            validate_serial_number(serial).map_err(|m| AppError::validation("serial_number", m))?;
            let locations = repo::ledger::locate_serial(&mut tx, serial).await?;
            if let Err(err) = ledger::ensure_serial_free(&locations) {
                tracing::warn!("Rejected duplicate serial {} for item {}", serial, item.id);
                return Err(err.into());
            }
        }

        let remark = input.remark.filter(|r| !r.trim().is_empty());
        let entry = item.add_stock(unit, branch_id, remark, Utc::now())?;
        let history = StockHistory::record(&item, &entry, ctx.user_id);

        repo::items::insert_stock_entry(&mut tx, &item.id, &entry).await?;
        repo::items::insert_history(&mut tx, &history).await?;

        tx.commit().await?;

        tracing::info!(
            "Added {} unit(s) of {} to branch {}",
            entry.quantity,
            item.id,
            branch_id
        );

        Ok(StockAdded {
            item_id: item.id,
            entry,
            history,
        })
    }

    /// Where a serial currently is, as visible to the caller.
    pub async fn check_serial(&self, ctx: &AuthContext, serial_number: &str) -> AppResult<SerialCheck> {
        let serial = serial_number.trim();
        if serial.is_empty() {
            return Err(AppError::validation("serial_number", "Serial number is required"));
        }
        let mut conn = self.db.acquire().await?;
        let locations = repo::ledger::locate_serial(&mut conn, serial).await?;
        Ok(ledger::check_serial(ctx, locations))
    }

    pub async fn stock_history(&self, ctx: &AuthContext, query: StockHistoryQuery) -> AppResult<Vec<StockHistory>> {
        let mut conn = self.db.acquire().await?;
        repo::items::history(&mut conn, query.item_id.as_deref(), ctx.branch_scope()).await
    }

    pub async fn stock_status(
        &self,
        ctx: &AuthContext,
        item_id: &str,
        query: StockStatusQuery,
    ) -> AppResult<StockStatus> {
        let branch = match (ctx.branch_scope(), query.branch_id) {
            (Some(own), Some(requested)) if own != requested => {
                return Err(DomainError::forbidden(
                    "Not authorized to access records of another branch",
                )
                .into())
            }
            (Some(own), _) => Some(own),
            (None, requested) => requested,
        };

        let mut conn = self.db.acquire().await?;
        let item = repo::items::find(&mut conn, item_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Item"))?;
        let holdings = repo::technician_inventory::list(
            &mut conn,
            &HoldingFilter {
                item_id: Some(item.id.clone()),
                branch_id: branch,
                ..HoldingFilter::default()
            },
        )
        .await?;

        let branch_stock: Vec<StockEntry> = item
            .stock
            .iter()
            .filter(|e| branch.map_or(true, |b| e.branch_id == b))
            .cloned()
            .collect();
        let technician_quantity: i64 = holdings
            .iter()
            .map(|h| i64::from(h.generic_quantity) + h.active_serials().count() as i64)
            .sum();

        Ok(StockStatus {
            branch_quantity: total_quantity(&branch_stock),
            item_id: item.id,
            item_name: item.name,
            item_type: item.item_type,
            branch_stock,
            technician_holdings: holdings,
            technician_quantity,
        })
    }
}
