//! Business logic services for the warehouse dispatch platform

pub mod bagged_unit;
pub mod codes;
pub mod daily_report;
pub mod dispatch;
pub mod notification;
pub mod sales_order;
pub mod stock;

pub use bagged_unit::BaggedUnitService;
pub use daily_report::DailyReportService;
pub use dispatch::DispatchService;
pub use notification::{LogNotifier, SmtpNotifier, StockAlertNotifier, StockAlerts};
pub use sales_order::SalesOrderService;
pub use stock::StockService;
