//! Domain models for the field-service ERP

mod bill;
mod customer;
mod item;
mod returned_inventory;
mod sales_bill;
mod technician_inventory;
mod transaction;
mod user;
mod work_order;

pub use bill::*;
pub use customer::*;
pub use item::*;
pub use returned_inventory::*;
pub use sales_bill::*;
pub use technician_inventory::*;
pub use transaction::*;
pub use user::*;
pub use work_order::*;
