//! Sales order (orden de venta) models

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dispatch-relevant state of a sales order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesOrderStatus {
    /// Some line still has remaining quantity
    Open,
    /// Every line reached zero; the order moves on to logistics
    Complete,
}

impl SalesOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SalesOrderStatus::Open => "open",
            SalesOrderStatus::Complete => "complete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(SalesOrderStatus::Open),
            "complete" => Some(SalesOrderStatus::Complete),
            _ => None,
        }
    }
}

/// Sales order header
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesOrder {
    pub id: Uuid,
    pub date: NaiveDate,
    pub customer: String,
    pub final_customer: Option<String>,
    /// External sale code
    pub sale_code: Option<String>,
    pub observations: Option<String>,
    pub responsible: String,
    pub status: SalesOrderStatus,
    pub created_at: NaiveDateTime,
}

/// Demanded product line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesOrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product: String,
    pub initial_quantity: Decimal,
    /// Undispatched quantity, mutated only by dispatch
    pub remaining_quantity: Decimal,
}

impl SalesOrderLine {
    pub fn dispatched_quantity(&self) -> Decimal {
        self.initial_quantity - self.remaining_quantity
    }

    pub fn is_fulfilled(&self) -> bool {
        self.remaining_quantity == Decimal::ZERO
    }
}

/// True when the order has lines and every one reached exactly zero
pub fn all_lines_fulfilled(lines: &[SalesOrderLine]) -> bool {
    !lines.is_empty() && lines.iter().all(SalesOrderLine::is_fulfilled)
}

/// Order with its lines
#[derive(Debug, Clone, Serialize)]
pub struct SalesOrderWithLines {
    #[serde(flatten)]
    pub order: SalesOrder,
    pub lines: Vec<SalesOrderLine>,
}

/// Values for inserting a sales order header
#[derive(Debug, Clone)]
pub struct NewSalesOrder {
    pub date: NaiveDate,
    pub customer: String,
    pub final_customer: Option<String>,
    pub sale_code: Option<String>,
    pub observations: Option<String>,
    pub responsible: String,
    pub created_at: NaiveDateTime,
}
