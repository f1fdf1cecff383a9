//! HTTP handlers for technician holdings

use axum::{
    extract::{Query, State},
    Json,
};
use shared::TechnicianInventory;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::response::ApiResponse;
use crate::services::technician_inventory::{AssignStockInput, HoldingQuery, TechnicianInventoryService};
use crate::AppState;

/// Assign branch stock to a technician
pub async fn assign_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<AssignStockInput>,
) -> AppResult<Json<ApiResponse<TechnicianInventory>>> {
    let service = TechnicianInventoryService::new(state.db);
    let holding = service.assign(&current_user.0, input).await?;
    Ok(Json(ApiResponse::with_message(
        holding,
        "Inventory assigned to technician successfully",
    )))
}

pub async fn list_holdings(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<HoldingQuery>,
) -> AppResult<Json<ApiResponse<Vec<TechnicianInventory>>>> {
    let service = TechnicianInventoryService::new(state.db);
    let holdings = service.list(&current_user.0, query).await?;
    Ok(Json(ApiResponse::ok(holdings)))
}
