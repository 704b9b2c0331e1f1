//! Domain models for the warehouse dispatch platform

mod bagged_unit;
mod daily_report;
mod dispatch;
mod sales_order;
mod stock;

pub use bagged_unit::*;
pub use daily_report::*;
pub use dispatch::*;
pub use sales_order::*;
pub use stock::*;
