//! Daily production reports (partes diarios)
//!
//! A report is the batching boundary for bagged units. Creating one through
//! [`DailyReportService::create`] claims every unit that no report holds yet,
//! system-wide, regardless of shift or product.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::validation::require_text;
use shared::{
    BaggedUnit, Checklist, DailyReport, DailyReportDetail, GeneratorGroup, NewDailyReport,
    PaginatedResponse, Pagination, Shift, Telemetry,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::repository::{finish, Store, Tx};

#[derive(Clone)]
pub struct DailyReportService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

/// Input for creating a daily report
#[derive(Debug, Deserialize)]
pub struct CreateDailyReportInput {
    pub date: NaiveDate,
    pub shift: Shift,
    #[serde(default)]
    pub telemetry: Telemetry,
    #[serde(default)]
    pub groups: Vec<GeneratorGroup>,
    #[serde(default)]
    pub checklist: Option<Checklist>,
}

/// Input for editing a pending report; absent fields are left untouched
#[derive(Debug, Default, Deserialize)]
pub struct UpdateDailyReportInput {
    pub date: Option<NaiveDate>,
    pub shift: Option<Shift>,
    pub telemetry: Option<Telemetry>,
    /// Replaces every generator group when present
    pub groups: Option<Vec<GeneratorGroup>>,
    pub checklist: Option<Checklist>,
}

fn validate_telemetry(telemetry: &Telemetry) -> AppResult<()> {
    let readings = [
        ("hour_meter_start", telemetry.hour_meter_start),
        ("hour_meter_end", telemetry.hour_meter_end),
        ("oil_pressure_bar", telemetry.oil_pressure_bar),
        ("fuel_level_percent", telemetry.fuel_level_percent),
        ("throughput_tph", telemetry.throughput_tph),
    ];
    for (field, value) in readings {
        if matches!(value, Some(v) if v < Decimal::ZERO) {
            return Err(AppError::validation(field, format!("{} cannot be negative", field)));
        }
    }
    if matches!(telemetry.fuel_level_percent, Some(v) if v > Decimal::ONE_HUNDRED) {
        return Err(AppError::validation(
            "fuel_level_percent",
            "fuel_level_percent cannot exceed 100",
        ));
    }
    if let (Some(start), Some(end)) = (telemetry.hour_meter_start, telemetry.hour_meter_end) {
        if end < start {
            return Err(AppError::validation(
                "hour_meter_end",
                "hour_meter_end is lower than hour_meter_start",
            ));
        }
    }
    Ok(())
}

fn validate_groups(groups: &[GeneratorGroup]) -> AppResult<()> {
    let mut seen = HashSet::new();
    for group in groups {
        if group.group_number <= 0 {
            return Err(AppError::validation("groups", "group_number must be positive"));
        }
        if !seen.insert(group.group_number) {
            return Err(AppError::validation(
                "groups",
                format!("group {} is listed twice", group.group_number),
            ));
        }
        if let (Some(start), Some(end)) = (group.hour_meter_start, group.hour_meter_end) {
            if end < start {
                return Err(AppError::validation(
                    "groups",
                    format!("group {}: hour_meter_end is lower than hour_meter_start", group.group_number),
                ));
            }
        }
    }
    Ok(())
}

async fn lock_pending(tx: &mut dyn Tx, id: Uuid) -> AppResult<DailyReport> {
    let report = tx
        .lock_report(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Daily report".to_string()))?;
    report.ensure_pending()?;
    Ok(report)
}

async fn load_detail(tx: &mut dyn Tx, report: DailyReport) -> AppResult<DailyReportDetail> {
    let groups = tx.groups(report.id).await?;
    let checklist = tx.checklist(report.id).await?;
    let units = tx.units_for_report(report.id).await?;
    Ok(DailyReportDetail::new(report, groups, checklist, units))
}

impl DailyReportService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    async fn insert(
        &self,
        tx: &mut dyn Tx,
        input: CreateDailyReportInput,
        responsible: String,
    ) -> AppResult<DailyReport> {
        let report = tx
            .insert_report(&NewDailyReport {
                date: input.date,
                shift: input.shift,
                telemetry: input.telemetry,
                responsible,
                created_at: self.clock.now(),
            })
            .await?;
        if !input.groups.is_empty() {
            tx.replace_groups(report.id, &input.groups).await?;
        }
        if let Some(checklist) = &input.checklist {
            tx.upsert_checklist(report.id, checklist).await?;
        }
        Ok(report)
    }

    /// Create a report and absorb every unassociated bagged unit into it
    pub async fn create(
        &self,
        input: CreateDailyReportInput,
        responsible: &str,
    ) -> AppResult<DailyReportDetail> {
        let responsible = require_text("responsible", responsible)?.to_string();
        validate_telemetry(&input.telemetry)?;
        validate_groups(&input.groups)?;

        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let report = self.insert(tx.as_mut(), input, responsible).await?;
            tx.claim_unassociated(report.id).await?;
            load_detail(tx.as_mut(), report).await
        }
        .await;
        let detail = finish(tx, result).await?;

        info!(
            report_id = %detail.report.id,
            shift = detail.report.shift.as_str(),
            units = detail.unit_count,
            "Daily report created"
        );
        Ok(detail)
    }

    /// Create a report without touching any bagged unit
    pub async fn create_without_claim(
        &self,
        input: CreateDailyReportInput,
        responsible: &str,
    ) -> AppResult<DailyReportDetail> {
        let responsible = require_text("responsible", responsible)?.to_string();
        validate_telemetry(&input.telemetry)?;
        validate_groups(&input.groups)?;

        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let report = self.insert(tx.as_mut(), input, responsible).await?;
            load_detail(tx.as_mut(), report).await
        }
        .await;
        let detail = finish(tx, result).await?;

        info!(report_id = %detail.report.id, "Daily report created without claiming units");
        Ok(detail)
    }

    /// Point every unassociated unit at this report
    pub async fn claim_all_unassociated(&self, report_id: Uuid) -> AppResult<Vec<BaggedUnit>> {
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            lock_pending(tx.as_mut(), report_id).await?;
            tx.claim_unassociated(report_id).await
        }
        .await;
        let claimed = finish(tx, result).await?;

        info!(report_id = %report_id, units = claimed.len(), "Unassociated units claimed");
        Ok(claimed)
    }

    /// Move a free unit into a pending report
    pub async fn associate(&self, report_id: Uuid, code: &str) -> AppResult<BaggedUnit> {
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            lock_pending(tx.as_mut(), report_id).await?;
            let unit = tx
                .find_unit(code)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Bagged unit {}", code)))?;
            match unit.daily_report_id {
                Some(current) if current == report_id => Ok(unit),
                Some(_) => Err(AppError::AlreadyAssociated(unit.code)),
                None => {
                    tx.set_unit_report(code, Some(report_id)).await?;
                    Ok(BaggedUnit {
                        daily_report_id: Some(report_id),
                        ..unit
                    })
                }
            }
        }
        .await;
        let unit = finish(tx, result).await?;

        info!(report_id = %report_id, code, "Bagged unit associated");
        Ok(unit)
    }

    /// Release a unit from a pending report
    pub async fn disassociate(&self, report_id: Uuid, code: &str) -> AppResult<BaggedUnit> {
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            lock_pending(tx.as_mut(), report_id).await?;
            let unit = tx
                .find_unit(code)
                .await?
                .filter(|u| u.daily_report_id == Some(report_id))
                .ok_or_else(|| {
                    AppError::NotFound(format!("Bagged unit {} in daily report", code))
                })?;
            tx.set_unit_report(code, None).await?;
            Ok(BaggedUnit {
                daily_report_id: None,
                ..unit
            })
        }
        .await;
        let unit = finish(tx, result).await?;

        info!(report_id = %report_id, code, "Bagged unit disassociated");
        Ok(unit)
    }

    /// pending -> approved; there is no way back
    pub async fn approve(&self, report_id: Uuid, approver: &str) -> AppResult<DailyReport> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let mut report = tx
                .lock_report(report_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Daily report".to_string()))?;
            report.approve(approver, now)?;
            tx.update_report(&report).await?;
            Ok(report)
        }
        .await;

        match finish(tx, result).await {
            Ok(report) => {
                info!(report_id = %report_id, approver, "Daily report approved");
                Ok(report)
            }
            Err(e) => {
                warn!(report_id = %report_id, "Daily report approval rejected: {}", e);
                Err(e)
            }
        }
    }

    /// Edit a pending report
    pub async fn update(
        &self,
        report_id: Uuid,
        input: UpdateDailyReportInput,
    ) -> AppResult<DailyReportDetail> {
        if let Some(telemetry) = &input.telemetry {
            validate_telemetry(telemetry)?;
        }
        if let Some(groups) = &input.groups {
            validate_groups(groups)?;
        }

        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let mut report = lock_pending(tx.as_mut(), report_id).await?;
            if let Some(date) = input.date {
                report.date = date;
            }
            if let Some(shift) = input.shift {
                report.shift = shift;
            }
            if let Some(telemetry) = input.telemetry {
                report.telemetry = telemetry;
            }
            tx.update_report(&report).await?;
            if let Some(groups) = &input.groups {
                tx.replace_groups(report_id, groups).await?;
            }
            if let Some(checklist) = &input.checklist {
                tx.upsert_checklist(report_id, checklist).await?;
            }
            load_detail(tx.as_mut(), report).await
        }
        .await;
        let detail = finish(tx, result).await?;

        info!(report_id = %report_id, "Daily report updated");
        Ok(detail)
    }

    /// Delete a pending report; its units become unassociated again
    pub async fn delete(&self, report_id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            lock_pending(tx.as_mut(), report_id).await?;
            let released = tx.release_report_units(report_id).await?;
            tx.delete_report(report_id).await?;
            Ok(released)
        }
        .await;
        let released = finish(tx, result).await?;

        info!(report_id = %report_id, released, "Daily report deleted");
        Ok(())
    }

    pub async fn list(&self, pagination: Pagination) -> AppResult<PaginatedResponse<DailyReport>> {
        let pagination = pagination.normalized();
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let total = tx.count_reports().await?;
            let reports = tx.list_reports(&pagination).await?;
            Ok(PaginatedResponse::new(reports, pagination, total))
        }
        .await;
        finish(tx, result).await
    }

    /// Header with groups, checklist and units
    pub async fn get(&self, report_id: Uuid) -> AppResult<DailyReportDetail> {
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let report = tx
                .find_report(report_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Daily report".to_string()))?;
            load_detail(tx.as_mut(), report).await
        }
        .await;
        finish(tx, result).await
    }
}
