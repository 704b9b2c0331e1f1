//! Daily production report (parte diario) models

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BaggedUnit;
use crate::error::DomainError;
use crate::types::empty_as_none;

/// Approval state of a daily report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyReportStatus {
    Pending,
    Approved,
}

impl DailyReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DailyReportStatus::Pending => "pending",
            DailyReportStatus::Approved => "approved",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DailyReportStatus::Pending),
            "approved" => Some(DailyReportStatus::Approved),
            _ => None,
        }
    }
}

/// Production shift (turno)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shift {
    Morning,
    Afternoon,
    Night,
}

impl Shift {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shift::Morning => "morning",
            Shift::Afternoon => "afternoon",
            Shift::Night => "night",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "morning" => Some(Shift::Morning),
            "afternoon" => Some(Shift::Afternoon),
            "night" => Some(Shift::Night),
            _ => None,
        }
    }
}

/// Machine telemetry captured on the report.
///
/// Every reading is optional; blank form inputs are stored as null, never as zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Telemetry {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub hour_meter_start: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub hour_meter_end: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub oil_pressure_bar: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub engine_temperature_c: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub fuel_level_percent: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub throughput_tph: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub feeder_running: Option<bool>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub screens_clean: Option<bool>,
    #[serde(default)]
    pub observations: Option<String>,
}

impl Telemetry {
    /// Operating hours from the hour meter, when both readings are present
    pub fn hours_run(&self) -> Option<Decimal> {
        match (self.hour_meter_start, self.hour_meter_end) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        }
    }
}

/// Generator group (grupo electrógeno) sub-record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratorGroup {
    pub group_number: i32,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub hour_meter_start: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub hour_meter_end: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub fuel_loaded_l: Option<Decimal>,
    #[serde(default)]
    pub observations: Option<String>,
}

/// Singleton checklist sub-record
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Checklist {
    #[serde(default)]
    pub lubrication_ok: bool,
    #[serde(default)]
    pub belts_ok: bool,
    #[serde(default)]
    pub safety_guards_ok: bool,
    #[serde(default)]
    pub area_clean: bool,
    #[serde(default)]
    pub observations: Option<String>,
}

/// Daily report header
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyReport {
    pub id: Uuid,
    pub date: NaiveDate,
    pub shift: Shift,
    pub telemetry: Telemetry,
    pub responsible: String,
    pub status: DailyReportStatus,
    pub approved_by: Option<String>,
    pub approved_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl DailyReport {
    pub fn is_pending(&self) -> bool {
        self.status == DailyReportStatus::Pending
    }

    /// Single allowed transition: pending -> approved
    pub fn approve(&mut self, approver: &str, at: NaiveDateTime) -> Result<(), DomainError> {
        if self.status != DailyReportStatus::Pending {
            return Err(DomainError::InvalidTransition {
                from: self.status.as_str(),
                to: DailyReportStatus::Approved.as_str(),
            });
        }
        if approver.trim().is_empty() {
            return Err(DomainError::invalid("approver", "approver is required"));
        }
        self.status = DailyReportStatus::Approved;
        self.approved_by = Some(approver.to_string());
        self.approved_at = Some(at);
        Ok(())
    }

    /// Guard for edits, deletion and unit (dis)association
    pub fn ensure_pending(&self) -> Result<(), DomainError> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition {
                from: self.status.as_str(),
                to: "modified",
            })
        }
    }
}

/// Values for inserting a daily report header
#[derive(Debug, Clone)]
pub struct NewDailyReport {
    pub date: NaiveDate,
    pub shift: Shift,
    pub telemetry: Telemetry,
    pub responsible: String,
    pub created_at: NaiveDateTime,
}

/// Daily report with all sub-records and its units
#[derive(Debug, Clone, Serialize)]
pub struct DailyReportDetail {
    #[serde(flatten)]
    pub report: DailyReport,
    pub groups: Vec<GeneratorGroup>,
    pub checklist: Option<Checklist>,
    pub units: Vec<BaggedUnit>,
    pub unit_count: usize,
    pub total_weight_kg: Decimal,
}

impl DailyReportDetail {
    pub fn new(
        report: DailyReport,
        groups: Vec<GeneratorGroup>,
        checklist: Option<Checklist>,
        units: Vec<BaggedUnit>,
    ) -> Self {
        let total_weight_kg = units.iter().map(|u| u.weight_kg).sum();
        Self {
            report,
            groups,
            checklist,
            unit_count: units.len(),
            units,
            total_weight_kg,
        }
    }
}
