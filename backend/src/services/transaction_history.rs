//! Read side of the payment ledger

use shared::{AuthContext, Role, TransactionRecord};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::repo;

#[derive(Clone)]
pub struct TransactionHistoryService {
    db: PgPool,
}

impl TransactionHistoryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Every payment recorded for one buyer, newest first. Managers only see
    /// entries booked in their branch.
    pub async fn list_for_customer(&self, ctx: &AuthContext, customer_id: Uuid) -> AppResult<Vec<TransactionRecord>> {
        ctx.require_role(&[Role::Admin, Role::Manager])?;
        let mut conn = self.db.acquire().await?;
        let mut records = repo::transactions::list_for_customer(&mut conn, customer_id).await?;
        if let Some(branch) = ctx.branch_scope() {
            records.retain(|r| r.branch_id == Some(branch));
        }
        Ok(records)
    }
}
