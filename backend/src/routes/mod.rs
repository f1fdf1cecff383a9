//! Route definitions for the field-service ERP

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        .merge(protected_routes(state))
}

/// Everything behind the bearer token
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/inventory", inventory_routes())
        .nest("/technician-inventory", technician_inventory_routes())
        .nest("/returns", return_routes())
        .nest("/customers", customer_routes())
        .nest("/work-orders", work_order_routes())
        .nest("/bills", bill_routes())
        .nest("/sales", sales_routes())
        .route(
            "/transactions/:customer_id",
            get(handlers::transaction_history),
        )
        .nest("/notifications", notification_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Item catalogue and branch stock
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(handlers::list_items).post(handlers::create_item))
        .route(
            "/items/:item_id",
            get(handlers::get_item).delete(handlers::delete_item),
        )
        .route("/items/:item_id/stock-status", get(handlers::stock_status))
        .route("/stock", post(handlers::add_stock))
        .route("/stock-history", get(handlers::stock_history))
        .route("/serials/:serial_number", get(handlers::check_serial))
}

fn technician_inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_holdings))
        .route("/assign", post(handlers::assign_stock))
}

fn return_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_returns).post(handlers::request_return))
        .route("/:return_id/confirm", post(handlers::confirm_return))
        .route("/:return_id/reject", post(handlers::reject_return))
}

fn customer_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_customers).post(handlers::create_customer),
        )
        .route("/:customer_id", get(handlers::get_customer))
        .route("/:customer_id/complaints", post(handlers::add_complaint))
        .route("/:customer_id/old-projects", post(handlers::add_old_project))
        .route("/:customer_id/work-orders", get(handlers::customer_work_orders))
}

/// Work order lifecycle actions
fn work_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_work_orders))
        .route("/:order_id", get(handlers::get_work_order))
        .route("/:order_id/assign", post(handlers::assign_work_order))
        .route("/:order_id/start", post(handlers::start_work))
        .route("/:order_id/pause", post(handlers::pause_work))
        .route("/:order_id/resume", post(handlers::resume_work))
        .route("/:order_id/remarks", post(handlers::add_work_order_remark))
        .route(
            "/:order_id/instructions",
            post(handlers::add_work_order_instruction),
        )
        .route("/:order_id/transfer", post(handlers::request_transfer))
        .route("/:order_id/transfer/accept", post(handlers::accept_transfer))
        .route("/:order_id/transfer/reject", post(handlers::reject_transfer))
        .route("/:order_id/close", post(handlers::close_job))
        .route("/:order_id/cancel", post(handlers::cancel_work_order))
}

/// Technician bills
fn bill_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_bills).post(handlers::create_bill))
        .route("/:bill_id/approve", post(handlers::approve_bill))
        .route("/:bill_id/reject", post(handlers::reject_bill))
}

/// Counter sales and payment collection
fn sales_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/bills",
            get(handlers::list_sales_bills).post(handlers::create_sales_bill),
        )
        .route("/bills/:bill_id", get(handlers::get_sales_bill))
        .route("/bills/:bill_id/payments", post(handlers::process_payment))
        .route("/customer-bills", post(handlers::create_customer_bill))
        .route("/bulk-payments", post(handlers::process_bulk_payment))
        .route(
            "/customer-bulk-payments",
            post(handlers::process_customer_bulk_payment),
        )
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/tokens", post(handlers::register_push_token))
        .route("/tokens/:token", delete(handlers::remove_push_token))
}
