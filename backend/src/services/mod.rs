//! Business logic services for the field-service ERP

pub mod billing;
pub mod customer;
mod holdings;
pub mod inventory;
pub mod notification;
pub mod returns;
pub mod sales;
pub mod technician_inventory;
pub mod transaction_history;
pub mod work_order;

pub use billing::BillingService;
pub use customer::CustomerService;
pub use inventory::InventoryService;
pub use notification::NotificationService;
pub use returns::ReturnService;
pub use sales::SalesService;
pub use technician_inventory::TechnicianInventoryService;
pub use transaction_history::TransactionHistoryService;
pub use work_order::WorkOrderService;
