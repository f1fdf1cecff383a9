//! HTTP handlers for the item catalogue and branch stock

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::ledger::SerialCheck;
use shared::{Item, StockHistory};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::response::ApiResponse;
use crate::services::inventory::{
    AddStockInput, CreateItemInput, InventoryService, ItemQuery, StockAdded, StockHistoryQuery,
    StockStatus, StockStatusQuery,
};
use crate::AppState;

/// Create a product or service
pub async fn create_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateItemInput>,
) -> AppResult<Json<ApiResponse<Item>>> {
    let service = InventoryService::new(state.db);
    let item = service.create_item(&current_user.0, input).await?;
    Ok(Json(ApiResponse::with_message(item, "Item created successfully")))
}

pub async fn list_items(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ItemQuery>,
) -> AppResult<Json<ApiResponse<Vec<Item>>>> {
    let service = InventoryService::new(state.db);
    let items = service.list_items(&current_user.0, query).await?;
    Ok(Json(ApiResponse::ok(items)))
}

pub async fn get_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<String>,
) -> AppResult<Json<ApiResponse<Item>>> {
    let service = InventoryService::new(state.db);
    let item = service.get_item(&current_user.0, &item_id).await?;
    Ok(Json(ApiResponse::ok(item)))
}

pub async fn delete_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let service = InventoryService::new(state.db);
    service.delete_item(&current_user.0, &item_id).await?;
    Ok(Json(ApiResponse::with_message((), "Item deleted successfully")))
}

/// Add stock to the caller's branch
pub async fn add_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<AddStockInput>,
) -> AppResult<Json<ApiResponse<StockAdded>>> {
    let service = InventoryService::new(state.db);
    let added = service.add_stock(&current_user.0, input).await?;
    Ok(Json(ApiResponse::with_message(added, "Stock added successfully")))
}

pub async fn check_serial(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(serial_number): Path<String>,
) -> AppResult<Json<ApiResponse<SerialCheck>>> {
    let service = InventoryService::new(state.db);
    let check = service.check_serial(&current_user.0, &serial_number).await?;
    Ok(Json(ApiResponse::ok(check)))
}

pub async fn stock_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<StockHistoryQuery>,
) -> AppResult<Json<ApiResponse<Vec<StockHistory>>>> {
    let service = InventoryService::new(state.db);
    let history = service.stock_history(&current_user.0, query).await?;
    Ok(Json(ApiResponse::ok(history)))
}

pub async fn stock_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<String>,
    Query(query): Query<StockStatusQuery>,
) -> AppResult<Json<ApiResponse<StockStatus>>> {
    let service = InventoryService::new(state.db);
    let status = service.stock_status(&current_user.0, &item_id, query).await?;
    Ok(Json(ApiResponse::ok(status)))
}
