//! Shared domain for the field-service ERP
//!
//! Pure types and business rules: the inventory ledger, technician holdings,
//! returns, the work-order state machine and payment reconciliation. Nothing
//! here performs I/O; the backend loads aggregates, applies these rules and
//! persists the outcome.

#[macro_use]
mod macros;

pub mod error;
pub mod ledger;
pub mod models;
pub mod notification;
pub mod numbering;
pub mod payment;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
