use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use shared::operating_day::OperatingWindow;
use shared::{BaggedUnit, BaggedUnitFilter, NewBaggedUnit, Pagination, ProductionTotal};
use sqlx::FromRow;
use uuid::Uuid;

use super::{is_unique_violation, to_u64, PgTx};
use crate::error::{AppError, AppResult};
use crate::repository::BaggedUnitRepository;

#[derive(Debug, FromRow)]
struct BaggedUnitRow {
    id: Uuid,
    code: String,
    product: String,
    weight_kg: Decimal,
    seal: String,
    produced_on: NaiveDate,
    produced_at: NaiveTime,
    responsible: String,
    dispatched: bool,
    daily_report_id: Option<Uuid>,
}

impl From<BaggedUnitRow> for BaggedUnit {
    fn from(row: BaggedUnitRow) -> Self {
        BaggedUnit {
            id: row.id,
            code: row.code,
            product: row.product,
            weight_kg: row.weight_kg,
            seal: row.seal,
            produced_on: row.produced_on,
            produced_at: row.produced_at,
            responsible: row.responsible,
            dispatched: row.dispatched,
            daily_report_id: row.daily_report_id,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProductionRow {
    product: String,
    unit_count: i64,
    total_weight_kg: Decimal,
}

const UNIT_COLUMNS: &str = "id, code, product, weight_kg, seal, produced_on, produced_at, \
                            responsible, dispatched, daily_report_id";

// $1 product, $2 dispatched, $3 associated, $4/$5 operating-day window
const UNIT_FILTER: &str = r#"
    ($1::text IS NULL OR product = $1)
    AND ($2::boolean IS NULL OR dispatched = $2)
    AND ($3::boolean IS NULL OR (daily_report_id IS NOT NULL) = $3)
    AND ($4::timestamp IS NULL OR (produced_on + produced_at) >= $4)
    AND ($5::timestamp IS NULL OR (produced_on + produced_at) < $5)
"#;

fn window_bounds(filter: &BaggedUnitFilter) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
    match filter.operating_day {
        Some(day) => {
            let window = OperatingWindow::for_date(day);
            (Some(window.start), Some(window.end_exclusive))
        }
        None => (None, None),
    }
}

#[async_trait]
impl BaggedUnitRepository for PgTx {
    async fn insert_unit(&mut self, unit: &NewBaggedUnit) -> AppResult<BaggedUnit> {
        let row = sqlx::query_as::<_, BaggedUnitRow>(&format!(
            r#"
            INSERT INTO bagged_units (id, code, product, weight_kg, seal, produced_on, produced_at, responsible)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            UNIT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&unit.code)
        .bind(&unit.product)
        .bind(unit.weight_kg)
        .bind(&unit.seal)
        .bind(unit.produced_on)
        .bind(unit.produced_at)
        .bind(&unit.responsible)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::DuplicateEntry("code".to_string())
            } else {
                AppError::DatabaseError(e)
            }
        })?;
        Ok(row.into())
    }

    async fn find_unit(&mut self, code: &str) -> AppResult<Option<BaggedUnit>> {
        let row = sqlx::query_as::<_, BaggedUnitRow>(&format!(
            "SELECT {} FROM bagged_units WHERE code = $1",
            UNIT_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_units(
        &mut self,
        filter: &BaggedUnitFilter,
        pagination: &Pagination,
    ) -> AppResult<Vec<BaggedUnit>> {
        let (start, end) = window_bounds(filter);
        let rows = sqlx::query_as::<_, BaggedUnitRow>(&format!(
            r#"
            SELECT {} FROM bagged_units
            WHERE {}
            ORDER BY produced_on DESC, produced_at DESC, code DESC
            LIMIT $6 OFFSET $7
            "#,
            UNIT_COLUMNS, UNIT_FILTER
        ))
        .bind(&filter.product)
        .bind(filter.dispatched)
        .bind(filter.associated)
        .bind(start)
        .bind(end)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_units(&mut self, filter: &BaggedUnitFilter) -> AppResult<u64> {
        let (start, end) = window_bounds(filter);
        let count = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM bagged_units WHERE {}",
            UNIT_FILTER
        ))
        .bind(&filter.product)
        .bind(filter.dispatched)
        .bind(filter.associated)
        .bind(start)
        .bind(end)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(to_u64(count))
    }

    async fn unassociated_units(&mut self) -> AppResult<Vec<BaggedUnit>> {
        let rows = sqlx::query_as::<_, BaggedUnitRow>(&format!(
            "SELECT {} FROM bagged_units WHERE daily_report_id IS NULL ORDER BY produced_on, produced_at, code",
            UNIT_COLUMNS
        ))
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn units_for_report(&mut self, report_id: Uuid) -> AppResult<Vec<BaggedUnit>> {
        let rows = sqlx::query_as::<_, BaggedUnitRow>(&format!(
            "SELECT {} FROM bagged_units WHERE daily_report_id = $1 ORDER BY produced_on, produced_at, code",
            UNIT_COLUMNS
        ))
        .bind(report_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn claim_unassociated(&mut self, report_id: Uuid) -> AppResult<Vec<BaggedUnit>> {
        let rows = sqlx::query_as::<_, BaggedUnitRow>(&format!(
            r#"
            UPDATE bagged_units SET daily_report_id = $1
            WHERE daily_report_id IS NULL
            RETURNING {}
            "#,
            UNIT_COLUMNS
        ))
        .bind(report_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn set_unit_report(&mut self, code: &str, report_id: Option<Uuid>) -> AppResult<()> {
        let result = sqlx::query("UPDATE bagged_units SET daily_report_id = $2 WHERE code = $1")
            .bind(code)
            .bind(report_id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Bagged unit".to_string()));
        }
        Ok(())
    }

    async fn release_report_units(&mut self, report_id: Uuid) -> AppResult<u64> {
        let result =
            sqlx::query("UPDATE bagged_units SET daily_report_id = NULL WHERE daily_report_id = $1")
                .bind(report_id)
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected())
    }

    async fn mark_dispatched(&mut self, code: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE bagged_units SET dispatched = TRUE WHERE code = $1")
            .bind(code)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Bagged unit".to_string()));
        }
        Ok(())
    }

    async fn delete_unit(&mut self, code: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM bagged_units WHERE code = $1 AND NOT dispatched")
            .bind(code)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Bagged unit".to_string()));
        }
        Ok(())
    }

    async fn production_totals(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AppResult<Vec<ProductionTotal>> {
        let rows = sqlx::query_as::<_, ProductionRow>(
            r#"
            SELECT product, COUNT(*) AS unit_count, COALESCE(SUM(weight_kg), 0) AS total_weight_kg
            FROM bagged_units
            WHERE (produced_on + produced_at) >= $1 AND (produced_on + produced_at) < $2
            GROUP BY product
            ORDER BY product
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ProductionTotal {
                product: r.product,
                unit_count: r.unit_count,
                total_weight_kg: r.total_weight_kg,
            })
            .collect())
    }
}
