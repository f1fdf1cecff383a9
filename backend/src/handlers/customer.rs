//! HTTP handlers for customers and their projects

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::{Customer, PaginatedResponse, Pagination, Project, WorkOrder};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::repo::work_orders::WorkOrderSummary;
use crate::response::ApiResponse;
use crate::services::customer::{
    AddComplaintInput, AddOldProjectInput, CreateCustomerInput, CustomerQuery, CustomerService,
    Onboarded,
};
use crate::AppState;

/// Onboard a customer with their first project
pub async fn create_customer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCustomerInput>,
) -> AppResult<Json<ApiResponse<Onboarded>>> {
    let service = CustomerService::new(state.db);
    let onboarded = service.create_customer(&current_user.0, input).await?;
    Ok(Json(ApiResponse::with_message(
        onboarded,
        "Customer created successfully",
    )))
}

pub async fn list_customers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<CustomerQuery>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<PaginatedResponse<Customer>>>> {
    let service = CustomerService::new(state.db);
    let customers = service.list(&current_user.0, query, pagination).await?;
    Ok(Json(ApiResponse::ok(customers)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(customer_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Customer>>> {
    let service = CustomerService::new(state.db);
    let customer = service.get(&current_user.0, customer_id).await?;
    Ok(Json(ApiResponse::ok(customer)))
}

/// Raise a repair complaint on a finished project
pub async fn add_complaint(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(customer_id): Path<Uuid>,
    Json(input): Json<AddComplaintInput>,
) -> AppResult<Json<ApiResponse<WorkOrder>>> {
    let service = CustomerService::new(state.db);
    let order = service.add_complaint(&current_user.0, customer_id, input).await?;
    Ok(Json(ApiResponse::with_message(
        order,
        "Complaint registered successfully",
    )))
}

pub async fn add_old_project(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(customer_id): Path<Uuid>,
    Json(input): Json<AddOldProjectInput>,
) -> AppResult<Json<ApiResponse<Project>>> {
    let service = CustomerService::new(state.db);
    let project = service.add_old_project(&current_user.0, customer_id, input).await?;
    Ok(Json(ApiResponse::with_message(
        project,
        "Old project added successfully",
    )))
}

pub async fn customer_work_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(customer_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<PaginatedResponse<WorkOrderSummary>>>> {
    let service = CustomerService::new(state.db);
    let orders = service.work_orders(&current_user.0, customer_id, pagination).await?;
    Ok(Json(ApiResponse::ok(orders)))
}
