//! Work order lifecycle
//!
//! Each action loads the order under a row lock, applies the transition from
//! the shared state machine and stores the header together with the single
//! history entry it produced. Push notifications go out after commit.

use chrono::Utc;
use serde::Deserialize;
use shared::notification::PushMessage;
use shared::numbering::WORK_ORDER_PREFIX;
use shared::{AuthContext, DomainError, HistoryChange, Pagination, PaginatedResponse, Role, WorkOrder, WorkOrderStatus};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use crate::repo::{self, work_orders::{WorkOrderFilter, WorkOrderSummary}};
use crate::services::NotificationService;

#[derive(Clone)]
pub struct WorkOrderService {
    db: PgPool,
    notifier: NotificationService,
}

#[derive(Debug, Deserialize)]
pub struct AssignInput {
    pub technician_id: Uuid,
    pub instructions: Option<String>,
}

/// Body for actions that take an optional remark
#[derive(Debug, Default, Deserialize)]
pub struct RemarkInput {
    pub remark: Option<String>,
}

/// Body for actions that require a remark or reason; emptiness is reported
/// by the transition itself with an action-specific message.
#[derive(Debug, Default, Deserialize)]
pub struct ReasonInput {
    #[serde(default)]
    pub remark: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkOrderQuery {
    pub status: Option<WorkOrderStatus>,
    pub technician_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
}

/// Result of accepting a transfer: the closed order and its replacement
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransferAccepted {
    pub transferred: WorkOrder,
    pub successor: WorkOrder,
}

fn non_empty(remark: Option<String>) -> Option<String> {
    remark.map(|r| r.trim().to_string()).filter(|r| !r.is_empty())
}

async fn persist(conn: &mut PgConnection, order: &WorkOrder, change: &HistoryChange) -> AppResult<()> {
    repo::work_orders::update(conn, order).await?;
    repo::work_orders::insert_history(conn, order.id, change).await
}

impl WorkOrderService {
    pub fn new(db: PgPool, notifier: NotificationService) -> Self {
        Self { db, notifier }
    }

    async fn lock(&self, conn: &mut PgConnection, order_id: &str) -> AppResult<WorkOrder> {
        let order = repo::work_orders::find_by_order_id_for_update(conn, order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Work order"))?;
        Ok(order)
    }

    /// Loads and locks an order for a branch-scoped manager or admin action.
    async fn lock_for_manager(&self, ctx: &AuthContext, conn: &mut PgConnection, order_id: &str) -> AppResult<WorkOrder> {
        ctx.require_role(&[Role::Admin, Role::Manager])?;
        let order = self.lock(conn, order_id).await?;
        ctx.ensure_branch(order.branch_id)?;
        Ok(order)
    }

    async fn lock_for_technician(&self, ctx: &AuthContext, conn: &mut PgConnection, order_id: &str) -> AppResult<WorkOrder> {
        let order = self.lock(conn, order_id).await?;
        ctx.ensure_assigned_technician(order.technician_id)?;
        Ok(order)
    }

    pub async fn list(
        &self,
        ctx: &AuthContext,
        query: WorkOrderQuery,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<WorkOrderSummary>> {
        let filter = WorkOrderFilter {
            branch_id: ctx.branch_scope(),
            technician_id: match ctx.role {
                Role::Technician => Some(ctx.user_id),
                _ => query.technician_id,
            },
            customer_id: query.customer_id,
            status: query.status,
        };
        let mut conn = self.db.acquire().await?;
        let (orders, total) = repo::work_orders::list(&mut conn, &filter, &pagination).await?;
        Ok(PaginatedResponse::new(orders, &pagination, total))
    }

    pub async fn get(&self, ctx: &AuthContext, order_id: &str) -> AppResult<WorkOrder> {
        let mut conn = self.db.acquire().await?;
        let order = repo::work_orders::find_by_order_id(&mut conn, order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Work order"))?;
        match ctx.role {
            Role::Technician => ctx.ensure_assigned_technician(order.technician_id)?,
            _ => ctx.ensure_branch(order.branch_id)?,
        }
        Ok(order)
    }

    /// Assigns (or re-assigns) a technician of the order's branch.
    pub async fn assign(&self, ctx: &AuthContext, order_id: &str, input: AssignInput) -> AppResult<WorkOrder> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let mut order = self.lock_for_manager(ctx, &mut tx, order_id).await?;
        let technician = repo::users::find(&mut tx, input.technician_id)
            .await?
            .filter(|u| u.role == Role::Technician)
            .ok_or_else(|| DomainError::not_found("Technician"))?;
        if technician.branch_id != Some(order.branch_id) {
            return Err(DomainError::forbidden("Technician does not belong to this branch").into());
        }

        let change = order.assign(
            technician.id,
            &technician.full_name(),
            non_empty(input.instructions),
            ctx.user_id,
            now,
        )?;
        persist(&mut tx, &order, &change).await?;
        tx.commit().await?;

        tracing::info!("Work order {} assigned to {}", order.order_id, technician.id);
        self.notifier
            .notify_user(technician.id, PushMessage::work_assigned(&order.order_id))
            .await;
        Ok(order)
    }

    pub async fn start(&self, ctx: &AuthContext, order_id: &str, input: RemarkInput) -> AppResult<WorkOrder> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut order = self.lock_for_technician(ctx, &mut tx, order_id).await?;
        let change = order.start(non_empty(input.remark), ctx.user_id, now)?;
        persist(&mut tx, &order, &change).await?;
        tx.commit().await?;

        tracing::info!("Work order {} started", order.order_id);
        Ok(order)
    }

    pub async fn pause(&self, ctx: &AuthContext, order_id: &str, input: RemarkInput) -> AppResult<WorkOrder> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut order = self.lock_for_technician(ctx, &mut tx, order_id).await?;
        let change = order.pause(non_empty(input.remark), ctx.user_id, now)?;
        persist(&mut tx, &order, &change).await?;
        tx.commit().await?;

        tracing::info!("Work order {} paused", order.order_id);
        Ok(order)
    }

    pub async fn resume(&self, ctx: &AuthContext, order_id: &str, input: RemarkInput) -> AppResult<WorkOrder> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut order = self.lock_for_technician(ctx, &mut tx, order_id).await?;
        let change = order.resume(non_empty(input.remark), ctx.user_id, now)?;
        persist(&mut tx, &order, &change).await?;
        tx.commit().await?;

        tracing::info!("Work order {} resumed", order.order_id);
        Ok(order)
    }

    pub async fn add_remark(&self, ctx: &AuthContext, order_id: &str, input: ReasonInput) -> AppResult<WorkOrder> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut order = self.lock_for_technician(ctx, &mut tx, order_id).await?;
        let change = order.add_remark(&input.remark, ctx.user_id, now)?;
        persist(&mut tx, &order, &change).await?;
        tx.commit().await?;
        Ok(order)
    }

    pub async fn add_instruction(&self, ctx: &AuthContext, order_id: &str, input: ReasonInput) -> AppResult<WorkOrder> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut order = self.lock_for_manager(ctx, &mut tx, order_id).await?;
        let change = order.add_instruction(&input.remark, ctx.user_id, now)?;
        persist(&mut tx, &order, &change).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Either the assigned technician or a manager of the branch may ask
    /// for a transfer.
    pub async fn request_transfer(&self, ctx: &AuthContext, order_id: &str, input: ReasonInput) -> AppResult<WorkOrder> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let mut order = self.lock(&mut tx, order_id).await?;
        match ctx.role {
            Role::Technician => ctx.ensure_assigned_technician(order.technician_id)?,
            _ => ctx.ensure_branch(order.branch_id)?,
        }
        let change = order.request_transfer(&input.remark, ctx.user_id, now)?;
        persist(&mut tx, &order, &change).await?;
        tx.commit().await?;

        tracing::info!("Transfer requested for work order {}", order.order_id);
        Ok(order)
    }

    /// Closes the order as transferred and opens its unassigned successor.
    pub async fn accept_transfer(&self, ctx: &AuthContext, order_id: &str, input: RemarkInput) -> AppResult<TransferAccepted> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let mut order = self.lock_for_manager(ctx, &mut tx, order_id).await?;
        let remark = non_empty(input.remark);
        let change = order.accept_transfer(remark.clone(), ctx.user_id, now)?;
        persist(&mut tx, &order, &change).await?;

        let successor_id = repo::sequences::next_document_number(&mut tx, WORK_ORDER_PREFIX, now).await?;
        let successor = WorkOrder::successor_of(&order, remark.as_deref(), successor_id, ctx.user_id, now)?;
        repo::work_orders::insert(&mut tx, &successor).await?;

        tx.commit().await?;

        tracing::info!(
            "Work order {} transferred; successor {} created",
            order.order_id,
            successor.order_id
        );
        if let Some(technician_id) = order.technician_id {
            self.notifier
                .notify_user(technician_id, PushMessage::transfer_approved(&order.order_id))
                .await;
        }
        Ok(TransferAccepted {
            transferred: order,
            successor,
        })
    }

    pub async fn reject_transfer(&self, ctx: &AuthContext, order_id: &str, input: ReasonInput) -> AppResult<WorkOrder> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut order = self.lock_for_manager(ctx, &mut tx, order_id).await?;
        let change = order.reject_transfer(&input.remark, ctx.user_id, now)?;
        persist(&mut tx, &order, &change).await?;
        tx.commit().await?;

        tracing::info!("Transfer of work order {} rejected", order.order_id);
        Ok(order)
    }

    pub async fn close_job(&self, ctx: &AuthContext, order_id: &str) -> AppResult<WorkOrder> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut order = self.lock_for_manager(ctx, &mut tx, order_id).await?;
        let manager = repo::users::find(&mut tx, ctx.user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("User"))?;
        let change = order.close_job(&manager.full_name(), ctx.user_id, now)?;
        persist(&mut tx, &order, &change).await?;
        tx.commit().await?;

        tracing::info!("Work order {} closed by {}", order.order_id, manager.id);
        Ok(order)
    }

    pub async fn cancel(&self, ctx: &AuthContext, order_id: &str, input: ReasonInput) -> AppResult<WorkOrder> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut order = self.lock_for_manager(ctx, &mut tx, order_id).await?;
        let change = order.cancel(&input.remark, ctx.user_id, now)?;
        persist(&mut tx, &order, &change).await?;
        tx.commit().await?;

        tracing::info!("Work order {} cancelled", order.order_id);
        Ok(order)
    }
}
