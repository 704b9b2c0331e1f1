use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use shared::{
    Checklist, DailyReport, DailyReportStatus, GeneratorGroup, NewDailyReport, Pagination, Shift,
    Telemetry,
};
use sqlx::FromRow;
use uuid::Uuid;

use super::{decode, to_u64, PgTx};
use crate::error::{AppError, AppResult};
use crate::repository::DailyReportRepository;

#[derive(Debug, FromRow)]
struct DailyReportRow {
    id: Uuid,
    report_date: NaiveDate,
    shift: String,
    hour_meter_start: Option<Decimal>,
    hour_meter_end: Option<Decimal>,
    oil_pressure_bar: Option<Decimal>,
    engine_temperature_c: Option<Decimal>,
    fuel_level_percent: Option<Decimal>,
    throughput_tph: Option<Decimal>,
    feeder_running: Option<bool>,
    screens_clean: Option<bool>,
    telemetry_observations: Option<String>,
    responsible: String,
    status: String,
    approved_by: Option<String>,
    approved_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
}

impl TryFrom<DailyReportRow> for DailyReport {
    type Error = AppError;

    fn try_from(row: DailyReportRow) -> Result<Self, Self::Error> {
        Ok(DailyReport {
            id: row.id,
            date: row.report_date,
            shift: decode("shift", &row.shift, Shift::from_str)?,
            telemetry: Telemetry {
                hour_meter_start: row.hour_meter_start,
                hour_meter_end: row.hour_meter_end,
                oil_pressure_bar: row.oil_pressure_bar,
                engine_temperature_c: row.engine_temperature_c,
                fuel_level_percent: row.fuel_level_percent,
                throughput_tph: row.throughput_tph,
                feeder_running: row.feeder_running,
                screens_clean: row.screens_clean,
                observations: row.telemetry_observations,
            },
            responsible: row.responsible,
            status: decode("status", &row.status, DailyReportStatus::from_str)?,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct GroupRow {
    group_number: i32,
    hour_meter_start: Option<Decimal>,
    hour_meter_end: Option<Decimal>,
    fuel_loaded_l: Option<Decimal>,
    observations: Option<String>,
}

#[derive(Debug, FromRow)]
struct ChecklistRow {
    lubrication_ok: bool,
    belts_ok: bool,
    safety_guards_ok: bool,
    area_clean: bool,
    observations: Option<String>,
}

const REPORT_COLUMNS: &str = "id, report_date, shift, hour_meter_start, hour_meter_end, \
    oil_pressure_bar, engine_temperature_c, fuel_level_percent, throughput_tph, feeder_running, \
    screens_clean, telemetry_observations, responsible, status, approved_by, approved_at, created_at";

fn rows_to_reports(rows: Vec<DailyReportRow>) -> AppResult<Vec<DailyReport>> {
    rows.into_iter().map(DailyReport::try_from).collect()
}

#[async_trait]
impl DailyReportRepository for PgTx {
    async fn insert_report(&mut self, report: &NewDailyReport) -> AppResult<DailyReport> {
        let t = &report.telemetry;
        let row = sqlx::query_as::<_, DailyReportRow>(&format!(
            r#"
            INSERT INTO daily_reports (
                id, report_date, shift, hour_meter_start, hour_meter_end, oil_pressure_bar,
                engine_temperature_c, fuel_level_percent, throughput_tph, feeder_running,
                screens_clean, telemetry_observations, responsible, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 'pending', $14)
            RETURNING {}
            "#,
            REPORT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(report.date)
        .bind(report.shift.as_str())
        .bind(t.hour_meter_start)
        .bind(t.hour_meter_end)
        .bind(t.oil_pressure_bar)
        .bind(t.engine_temperature_c)
        .bind(t.fuel_level_percent)
        .bind(t.throughput_tph)
        .bind(t.feeder_running)
        .bind(t.screens_clean)
        .bind(&t.observations)
        .bind(&report.responsible)
        .bind(report.created_at)
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn find_report(&mut self, id: Uuid) -> AppResult<Option<DailyReport>> {
        let row = sqlx::query_as::<_, DailyReportRow>(&format!(
            "SELECT {} FROM daily_reports WHERE id = $1",
            REPORT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(DailyReport::try_from).transpose()
    }

    async fn lock_report(&mut self, id: Uuid) -> AppResult<Option<DailyReport>> {
        let row = sqlx::query_as::<_, DailyReportRow>(&format!(
            "SELECT {} FROM daily_reports WHERE id = $1 FOR UPDATE",
            REPORT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(DailyReport::try_from).transpose()
    }

    async fn update_report(&mut self, report: &DailyReport) -> AppResult<()> {
        let t = &report.telemetry;
        let result = sqlx::query(
            r#"
            UPDATE daily_reports SET
                report_date = $2, shift = $3, hour_meter_start = $4, hour_meter_end = $5,
                oil_pressure_bar = $6, engine_temperature_c = $7, fuel_level_percent = $8,
                throughput_tph = $9, feeder_running = $10, screens_clean = $11,
                telemetry_observations = $12, responsible = $13, status = $14,
                approved_by = $15, approved_at = $16
            WHERE id = $1
            "#,
        )
        .bind(report.id)
        .bind(report.date)
        .bind(report.shift.as_str())
        .bind(t.hour_meter_start)
        .bind(t.hour_meter_end)
        .bind(t.oil_pressure_bar)
        .bind(t.engine_temperature_c)
        .bind(t.fuel_level_percent)
        .bind(t.throughput_tph)
        .bind(t.feeder_running)
        .bind(t.screens_clean)
        .bind(&t.observations)
        .bind(&report.responsible)
        .bind(report.status.as_str())
        .bind(&report.approved_by)
        .bind(report.approved_at)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Daily report".to_string()));
        }
        Ok(())
    }

    async fn list_reports(&mut self, pagination: &Pagination) -> AppResult<Vec<DailyReport>> {
        let rows = sqlx::query_as::<_, DailyReportRow>(&format!(
            "SELECT {} FROM daily_reports ORDER BY report_date DESC, created_at DESC LIMIT $1 OFFSET $2",
            REPORT_COLUMNS
        ))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&mut *self.tx)
        .await?;
        rows_to_reports(rows)
    }

    async fn count_reports(&mut self) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM daily_reports")
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(to_u64(count))
    }

    async fn delete_report(&mut self, id: Uuid) -> AppResult<()> {
        // groups and checklist cascade; units are released by ON DELETE SET NULL
        sqlx::query("DELETE FROM daily_reports WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn replace_groups(&mut self, report_id: Uuid, groups: &[GeneratorGroup]) -> AppResult<()> {
        sqlx::query("DELETE FROM daily_report_groups WHERE report_id = $1")
            .bind(report_id)
            .execute(&mut *self.tx)
            .await?;

        for group in groups {
            sqlx::query(
                r#"
                INSERT INTO daily_report_groups
                    (report_id, group_number, hour_meter_start, hour_meter_end, fuel_loaded_l, observations)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(report_id)
            .bind(group.group_number)
            .bind(group.hour_meter_start)
            .bind(group.hour_meter_end)
            .bind(group.fuel_loaded_l)
            .bind(&group.observations)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn groups(&mut self, report_id: Uuid) -> AppResult<Vec<GeneratorGroup>> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT group_number, hour_meter_start, hour_meter_end, fuel_loaded_l, observations
            FROM daily_report_groups
            WHERE report_id = $1
            ORDER BY group_number
            "#,
        )
        .bind(report_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| GeneratorGroup {
                group_number: r.group_number,
                hour_meter_start: r.hour_meter_start,
                hour_meter_end: r.hour_meter_end,
                fuel_loaded_l: r.fuel_loaded_l,
                observations: r.observations,
            })
            .collect())
    }

    async fn upsert_checklist(&mut self, report_id: Uuid, checklist: &Checklist) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_report_checklists
                (report_id, lubrication_ok, belts_ok, safety_guards_ok, area_clean, observations)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (report_id) DO UPDATE SET
                lubrication_ok = EXCLUDED.lubrication_ok,
                belts_ok = EXCLUDED.belts_ok,
                safety_guards_ok = EXCLUDED.safety_guards_ok,
                area_clean = EXCLUDED.area_clean,
                observations = EXCLUDED.observations
            "#,
        )
        .bind(report_id)
        .bind(checklist.lubrication_ok)
        .bind(checklist.belts_ok)
        .bind(checklist.safety_guards_ok)
        .bind(checklist.area_clean)
        .bind(&checklist.observations)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn checklist(&mut self, report_id: Uuid) -> AppResult<Option<Checklist>> {
        let row = sqlx::query_as::<_, ChecklistRow>(
            r#"
            SELECT lubrication_ok, belts_ok, safety_guards_ok, area_clean, observations
            FROM daily_report_checklists
            WHERE report_id = $1
            "#,
        )
        .bind(report_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|r| Checklist {
            lubrication_ok: r.lubrication_ok,
            belts_ok: r.belts_ok,
            safety_guards_ok: r.safety_guards_ok,
            area_clean: r.area_clean,
            observations: r.observations,
        }))
    }
}
