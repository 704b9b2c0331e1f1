//! Shared types and domain rules for the warehouse dispatch platform
//!
//! Everything here is pure: models, code generation, the operating-day window,
//! stock arithmetic and dispatch reconciliation. Persistence lives in the backend.

pub mod codes;
pub mod error;
pub mod models;
pub mod operating_day;
pub mod reconcile;
pub mod types;
pub mod validation;

pub use error::DomainError;
pub use models::*;
pub use types::*;
