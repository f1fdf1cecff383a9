//! HTTP handlers for counter sales and payments

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::SalesBill;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::response::ApiResponse;
use crate::services::sales::{
    BulkPaymentInput, BulkPaymentResult, CreateCustomerBillInput, CreateSalesBillInput,
    CustomerBulkPaymentInput, PaymentInput, SalesBillQuery, SalesService,
};
use crate::AppState;

/// Bill a dealer or distributor
pub async fn create_sales_bill(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSalesBillInput>,
) -> AppResult<Json<ApiResponse<SalesBill>>> {
    let service = SalesService::new(state.db);
    let bill = service.create_sales_bill(&current_user.0, input).await?;
    Ok(Json(ApiResponse::with_message(bill, "Sales bill created successfully")))
}

/// Bill a registered customer
pub async fn create_customer_bill(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCustomerBillInput>,
) -> AppResult<Json<ApiResponse<SalesBill>>> {
    let service = SalesService::new(state.db);
    let bill = service.create_customer_bill(&current_user.0, input).await?;
    Ok(Json(ApiResponse::with_message(bill, "Customer bill created successfully")))
}

pub async fn list_sales_bills(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<SalesBillQuery>,
) -> AppResult<Json<ApiResponse<Vec<SalesBill>>>> {
    let service = SalesService::new(state.db);
    let bills = service.list(&current_user.0, query).await?;
    Ok(Json(ApiResponse::ok(bills)))
}

pub async fn get_sales_bill(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(bill_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<SalesBill>>> {
    let service = SalesService::new(state.db);
    let bill = service.get(&current_user.0, bill_id).await?;
    Ok(Json(ApiResponse::ok(bill)))
}

pub async fn process_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(bill_id): Path<Uuid>,
    Json(input): Json<PaymentInput>,
) -> AppResult<Json<ApiResponse<SalesBill>>> {
    let service = SalesService::new(state.db);
    let bill = service.process_payment(&current_user.0, bill_id, input).await?;
    Ok(Json(ApiResponse::with_message(bill, "Payment processed successfully")))
}

pub async fn process_bulk_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<BulkPaymentInput>,
) -> AppResult<Json<ApiResponse<BulkPaymentResult>>> {
    let service = SalesService::new(state.db);
    let result = service.process_bulk_payment(&current_user.0, input).await?;
    Ok(Json(ApiResponse::with_message(
        result,
        "Bulk payment processed successfully",
    )))
}

pub async fn process_customer_bulk_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CustomerBulkPaymentInput>,
) -> AppResult<Json<ApiResponse<BulkPaymentResult>>> {
    let service = SalesService::new(state.db);
    let result = service.process_customer_bulk_payment(&current_user.0, input).await?;
    Ok(Json(ApiResponse::with_message(
        result,
        "Bulk payment processed successfully",
    )))
}
