//! HTTP handlers for technician bills

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::Bill;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::response::ApiResponse;
use crate::services::billing::{BillQuery, BillingService, CreateBillInput, RejectBillInput};
use crate::AppState;

pub async fn create_bill(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateBillInput>,
) -> AppResult<Json<ApiResponse<Bill>>> {
    let service = BillingService::new(state.db, state.notifier);
    let bill = service.create_bill(&current_user.0, input).await?;
    Ok(Json(ApiResponse::with_message(bill, "Bill created successfully")))
}

pub async fn list_bills(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<BillQuery>,
) -> AppResult<Json<ApiResponse<Vec<Bill>>>> {
    let service = BillingService::new(state.db, state.notifier);
    let bills = service.list_bills(&current_user.0, query).await?;
    Ok(Json(ApiResponse::ok(bills)))
}

pub async fn approve_bill(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(bill_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Bill>>> {
    let service = BillingService::new(state.db, state.notifier);
    let bill = service.approve_bill(&current_user.0, bill_id).await?;
    Ok(Json(ApiResponse::with_message(bill, "Bill approved successfully")))
}

/// Reject a bill and hand its stock back to the technician
pub async fn reject_bill(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(bill_id): Path<Uuid>,
    Json(input): Json<RejectBillInput>,
) -> AppResult<Json<ApiResponse<Bill>>> {
    let service = BillingService::new(state.db, state.notifier);
    let bill = service.reject_bill(&current_user.0, bill_id, input).await?;
    Ok(Json(ApiResponse::with_message(
        bill,
        "Bill rejected and inventory reverted successfully",
    )))
}
