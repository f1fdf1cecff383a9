//! HTTP handler for the payment ledger

use axum::{
    extract::{Path, State},
    Json,
};
use shared::TransactionRecord;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::response::ApiResponse;
use crate::services::TransactionHistoryService;
use crate::AppState;

pub async fn transaction_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(customer_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<TransactionRecord>>>> {
    let service = TransactionHistoryService::new(state.db);
    let records = service.list_for_customer(&current_user.0, customer_id).await?;
    Ok(Json(ApiResponse::ok(records)))
}
