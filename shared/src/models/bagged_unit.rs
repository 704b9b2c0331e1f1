//! Bagged unit (bolsón) models

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::operating_day::operating_day_of;

/// A physical bagged unit of produced material, individually coded and weighed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaggedUnit {
    pub id: Uuid,
    /// Unique, immutable numeric code (e.g. "240705140301")
    pub code: String,
    pub product: String,
    pub weight_kg: Decimal,
    /// Seal (precinto) identifier
    pub seal: String,
    /// Local wall-clock production date
    pub produced_on: NaiveDate,
    /// Local wall-clock production time
    pub produced_at: NaiveTime,
    pub responsible: String,
    /// Monotonic: never goes back to false
    pub dispatched: bool,
    /// Daily report (parte diario) the unit is associated to
    pub daily_report_id: Option<Uuid>,
}

impl BaggedUnit {
    pub fn is_associated(&self) -> bool {
        self.daily_report_id.is_some()
    }

    pub fn produced_timestamp(&self) -> NaiveDateTime {
        self.produced_on.and_time(self.produced_at)
    }

    pub fn operating_day(&self) -> NaiveDate {
        operating_day_of(self.produced_timestamp())
    }
}

/// Values for inserting a bagged unit once its code is assigned
#[derive(Debug, Clone)]
pub struct NewBaggedUnit {
    pub code: String,
    pub product: String,
    pub weight_kg: Decimal,
    pub seal: String,
    pub produced_on: NaiveDate,
    pub produced_at: NaiveTime,
    pub responsible: String,
}

/// Listing filters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaggedUnitFilter {
    pub product: Option<String>,
    pub dispatched: Option<bool>,
    pub associated: Option<bool>,
    pub operating_day: Option<NaiveDate>,
}

impl BaggedUnitFilter {
    pub fn matches(&self, unit: &BaggedUnit) -> bool {
        self.product.as_ref().map_or(true, |p| &unit.product == p)
            && self.dispatched.map_or(true, |d| unit.dispatched == d)
            && self.associated.map_or(true, |a| unit.is_associated() == a)
            && self.operating_day.map_or(true, |day| unit.operating_day() == day)
    }
}

/// Production total for one product within an operating day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionTotal {
    pub product: String,
    pub unit_count: i64,
    pub total_weight_kg: Decimal,
}
