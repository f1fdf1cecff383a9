//! HTTP handlers for technician returns

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::ReturnedInventory;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::response::ApiResponse;
use crate::services::returns::{RejectReturnInput, RequestReturnInput, ReturnQuery, ReturnService};
use crate::AppState;

pub async fn request_return(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RequestReturnInput>,
) -> AppResult<Json<ApiResponse<ReturnedInventory>>> {
    let service = ReturnService::new(state.db);
    let entry = service.request_return(&current_user.0, input).await?;
    Ok(Json(ApiResponse::with_message(
        entry,
        "Return request submitted successfully",
    )))
}

pub async fn list_returns(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ReturnQuery>,
) -> AppResult<Json<ApiResponse<Vec<ReturnedInventory>>>> {
    let service = ReturnService::new(state.db);
    let entries = service.list(&current_user.0, query).await?;
    Ok(Json(ApiResponse::ok(entries)))
}

pub async fn confirm_return(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(return_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ReturnedInventory>>> {
    let service = ReturnService::new(state.db);
    let entry = service.confirm(&current_user.0, return_id).await?;
    Ok(Json(ApiResponse::with_message(
        entry,
        "Returned inventory confirmed and added to branch stock",
    )))
}

pub async fn reject_return(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(return_id): Path<Uuid>,
    Json(input): Json<RejectReturnInput>,
) -> AppResult<Json<ApiResponse<ReturnedInventory>>> {
    let service = ReturnService::new(state.db);
    let entry = service.reject(&current_user.0, return_id, input).await?;
    Ok(Json(ApiResponse::with_message(
        entry,
        "Returned inventory rejected and restored to technician",
    )))
}
