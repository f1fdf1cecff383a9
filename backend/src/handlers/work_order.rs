//! HTTP handlers for the work order lifecycle

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::{PaginatedResponse, Pagination, WorkOrder};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::repo::work_orders::WorkOrderSummary;
use crate::response::ApiResponse;
use crate::services::work_order::{
    AssignInput, ReasonInput, RemarkInput, TransferAccepted, WorkOrderQuery, WorkOrderService,
};
use crate::AppState;

fn service(state: AppState) -> WorkOrderService {
    WorkOrderService::new(state.db, state.notifier)
}

/// Optional bodies default to no remark.
fn remark(input: Option<Json<RemarkInput>>) -> RemarkInput {
    input.map(|Json(input)| input).unwrap_or_default()
}

pub async fn list_work_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<WorkOrderQuery>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<PaginatedResponse<WorkOrderSummary>>>> {
    let orders = service(state).list(&current_user.0, query, pagination).await?;
    Ok(Json(ApiResponse::ok(orders)))
}

pub async fn get_work_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<String>,
) -> AppResult<Json<ApiResponse<WorkOrder>>> {
    let order = service(state).get(&current_user.0, &order_id).await?;
    Ok(Json(ApiResponse::ok(order)))
}

pub async fn assign_work_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<String>,
    Json(input): Json<AssignInput>,
) -> AppResult<Json<ApiResponse<WorkOrder>>> {
    let order = service(state).assign(&current_user.0, &order_id, input).await?;
    Ok(Json(ApiResponse::with_message(order, "Work order assigned successfully")))
}

pub async fn start_work(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<String>,
    input: Option<Json<RemarkInput>>,
) -> AppResult<Json<ApiResponse<WorkOrder>>> {
    let order = service(state).start(&current_user.0, &order_id, remark(input)).await?;
    Ok(Json(ApiResponse::with_message(order, "Work started")))
}

pub async fn pause_work(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<String>,
    input: Option<Json<RemarkInput>>,
) -> AppResult<Json<ApiResponse<WorkOrder>>> {
    let order = service(state).pause(&current_user.0, &order_id, remark(input)).await?;
    Ok(Json(ApiResponse::with_message(order, "Work paused")))
}

pub async fn resume_work(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<String>,
    input: Option<Json<RemarkInput>>,
) -> AppResult<Json<ApiResponse<WorkOrder>>> {
    let order = service(state).resume(&current_user.0, &order_id, remark(input)).await?;
    Ok(Json(ApiResponse::with_message(order, "Work resumed")))
}

pub async fn add_work_order_remark(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<String>,
    Json(input): Json<ReasonInput>,
) -> AppResult<Json<ApiResponse<WorkOrder>>> {
    let order = service(state).add_remark(&current_user.0, &order_id, input).await?;
    Ok(Json(ApiResponse::with_message(order, "Remark added")))
}

pub async fn add_work_order_instruction(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<String>,
    Json(input): Json<ReasonInput>,
) -> AppResult<Json<ApiResponse<WorkOrder>>> {
    let order = service(state).add_instruction(&current_user.0, &order_id, input).await?;
    Ok(Json(ApiResponse::with_message(order, "Instruction added")))
}

pub async fn request_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<String>,
    Json(input): Json<ReasonInput>,
) -> AppResult<Json<ApiResponse<WorkOrder>>> {
    let order = service(state).request_transfer(&current_user.0, &order_id, input).await?;
    Ok(Json(ApiResponse::with_message(order, "Transfer requested")))
}

/// Approve a transfer; the response carries the successor order
pub async fn accept_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<String>,
    input: Option<Json<RemarkInput>>,
) -> AppResult<Json<ApiResponse<TransferAccepted>>> {
    let accepted = service(state).accept_transfer(&current_user.0, &order_id, remark(input)).await?;
    Ok(Json(ApiResponse::with_message(
        accepted,
        "Transfer approved and new work order created",
    )))
}

pub async fn reject_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<String>,
    Json(input): Json<ReasonInput>,
) -> AppResult<Json<ApiResponse<WorkOrder>>> {
    let order = service(state).reject_transfer(&current_user.0, &order_id, input).await?;
    Ok(Json(ApiResponse::with_message(order, "Transfer rejected")))
}

pub async fn close_job(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<String>,
) -> AppResult<Json<ApiResponse<WorkOrder>>> {
    let order = service(state).close_job(&current_user.0, &order_id).await?;
    Ok(Json(ApiResponse::with_message(order, "Job closed")))
}

pub async fn cancel_work_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<String>,
    Json(input): Json<ReasonInput>,
) -> AppResult<Json<ApiResponse<WorkOrder>>> {
    let order = service(state).cancel(&current_user.0, &order_id, input).await?;
    Ok(Json(ApiResponse::with_message(order, "Work order cancelled successfully")))
}
