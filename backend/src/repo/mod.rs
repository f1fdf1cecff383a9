//! Persistence functions over a borrowed connection
//!
//! Every function takes `&mut PgConnection`, so callers decide whether it
//! runs inside a transaction or on a pooled connection.

pub mod bills;
pub mod customers;
pub mod items;
pub mod ledger;
pub mod returns;
pub mod sales_bills;
pub mod sequences;
pub mod technician_inventory;
pub mod transactions;
pub mod users;
pub mod work_orders;
