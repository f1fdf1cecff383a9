//! HTTP handlers for the field-service ERP

pub mod billing;
pub mod customer;
pub mod health;
pub mod inventory;
pub mod notification;
pub mod returns;
pub mod sales;
pub mod technician_inventory;
pub mod transaction;
pub mod work_order;

pub use billing::*;
pub use customer::*;
pub use health::*;
pub use inventory::*;
pub use notification::*;
pub use returns::*;
pub use sales::*;
pub use technician_inventory::*;
pub use transaction::*;
pub use work_order::*;
