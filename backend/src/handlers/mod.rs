//! HTTP handlers

pub mod bagged_unit;
pub mod daily_report;
pub mod dispatch;
pub mod health;
pub mod reporting;
pub mod sales_order;
pub mod stock;

pub use bagged_unit::*;
pub use daily_report::*;
pub use dispatch::*;
pub use health::*;
pub use reporting::*;
pub use sales_order::*;
pub use stock::*;
