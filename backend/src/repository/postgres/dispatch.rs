use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use shared::{
    Dispatch, DispatchDetail, DispatchRow, DispatchedProductTotal, NewDispatch, NewDispatchDetail,
};
use sqlx::FromRow;
use uuid::Uuid;

use super::{is_unique_violation, PgTx};
use crate::error::{AppError, AppResult};
use crate::repository::DispatchRepository;

#[derive(Debug, FromRow)]
struct DispatchRowData {
    id: Uuid,
    order_id: Uuid,
    dispatched_at: NaiveDateTime,
    responsible: String,
    observations: Option<String>,
}

impl From<DispatchRowData> for Dispatch {
    fn from(row: DispatchRowData) -> Self {
        Dispatch {
            id: row.id,
            order_id: row.order_id,
            dispatched_at: row.dispatched_at,
            responsible: row.responsible,
            observations: row.observations,
        }
    }
}

#[derive(Debug, FromRow)]
struct DetailRow {
    id: Uuid,
    dispatch_id: Uuid,
    unit_code: String,
    product: String,
    weight_kg: Decimal,
    seal: Option<String>,
    manual: bool,
}

impl From<DetailRow> for DispatchDetail {
    fn from(row: DetailRow) -> Self {
        DispatchDetail {
            id: row.id,
            dispatch_id: row.dispatch_id,
            unit_code: row.unit_code,
            product: row.product,
            weight_kg: row.weight_kg,
            seal: row.seal,
            manual: row.manual,
        }
    }
}

/// Header LEFT JOIN detail; detail columns are null for dispatches without details
#[derive(Debug, FromRow)]
struct JoinedRow {
    id: Uuid,
    order_id: Uuid,
    dispatched_at: NaiveDateTime,
    responsible: String,
    observations: Option<String>,
    detail_id: Option<Uuid>,
    unit_code: Option<String>,
    product: Option<String>,
    weight_kg: Option<Decimal>,
    seal: Option<String>,
    manual: Option<bool>,
}

impl From<JoinedRow> for DispatchRow {
    fn from(row: JoinedRow) -> Self {
        let detail = match (row.detail_id, row.unit_code, row.product, row.weight_kg) {
            (Some(id), Some(unit_code), Some(product), Some(weight_kg)) => Some(DispatchDetail {
                id,
                dispatch_id: row.id,
                unit_code,
                product,
                weight_kg,
                seal: row.seal,
                manual: row.manual.unwrap_or(false),
            }),
            _ => None,
        };
        DispatchRow {
            dispatch: Dispatch {
                id: row.id,
                order_id: row.order_id,
                dispatched_at: row.dispatched_at,
                responsible: row.responsible,
                observations: row.observations,
            },
            detail,
        }
    }
}

#[derive(Debug, FromRow)]
struct TotalRow {
    product: String,
    unit_count: i64,
    manual_line_count: i64,
    total_weight_kg: Decimal,
}

#[async_trait]
impl DispatchRepository for PgTx {
    async fn insert_dispatch(&mut self, dispatch: &NewDispatch) -> AppResult<Dispatch> {
        let row = sqlx::query_as::<_, DispatchRowData>(
            r#"
            INSERT INTO dispatches (id, order_id, dispatched_at, responsible, observations)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, order_id, dispatched_at, responsible, observations
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(dispatch.order_id)
        .bind(dispatch.dispatched_at)
        .bind(&dispatch.responsible)
        .bind(&dispatch.observations)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.into())
    }

    async fn insert_detail(&mut self, detail: &NewDispatchDetail) -> AppResult<DispatchDetail> {
        let row = sqlx::query_as::<_, DetailRow>(
            r#"
            INSERT INTO dispatch_details (id, dispatch_id, unit_code, product, weight_kg, seal, manual)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, dispatch_id, unit_code, product, weight_kg, seal, manual
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(detail.dispatch_id)
        .bind(&detail.unit_code)
        .bind(&detail.product)
        .bind(detail.weight_kg)
        .bind(&detail.seal)
        .bind(detail.manual)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            // dispatch_details_unit_code_key
            if is_unique_violation(&e) {
                AppError::AlreadyDispatched(detail.unit_code.clone())
            } else {
                AppError::DatabaseError(e)
            }
        })?;
        Ok(row.into())
    }

    async fn find_dispatch(&mut self, id: Uuid) -> AppResult<Option<Dispatch>> {
        let row = sqlx::query_as::<_, DispatchRowData>(
            "SELECT id, order_id, dispatched_at, responsible, observations FROM dispatches WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn detail_for_unit(&mut self, code: &str) -> AppResult<Option<DispatchDetail>> {
        let row = sqlx::query_as::<_, DetailRow>(
            r#"
            SELECT id, dispatch_id, unit_code, product, weight_kg, seal, manual
            FROM dispatch_details
            WHERE unit_code = $1 AND NOT manual
            "#,
        )
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn dispatch_rows_for_order(&mut self, order_id: Uuid) -> AppResult<Vec<DispatchRow>> {
        let rows = sqlx::query_as::<_, JoinedRow>(
            r#"
            SELECT d.id, d.order_id, d.dispatched_at, d.responsible, d.observations,
                   dd.id AS detail_id, dd.unit_code, dd.product, dd.weight_kg, dd.seal, dd.manual
            FROM dispatches d
            LEFT JOIN dispatch_details dd ON dd.dispatch_id = d.id
            WHERE d.order_id = $1
            ORDER BY d.dispatched_at, d.id, dd.seq
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn dispatched_totals(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AppResult<Vec<DispatchedProductTotal>> {
        let rows = sqlx::query_as::<_, TotalRow>(
            r#"
            SELECT dd.product,
                   COUNT(*) FILTER (WHERE NOT dd.manual) AS unit_count,
                   COUNT(*) FILTER (WHERE dd.manual) AS manual_line_count,
                   COALESCE(SUM(dd.weight_kg), 0) AS total_weight_kg
            FROM dispatch_details dd
            JOIN dispatches d ON d.id = dd.dispatch_id
            WHERE d.dispatched_at >= $1 AND d.dispatched_at < $2
            GROUP BY dd.product
            ORDER BY dd.product
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| DispatchedProductTotal {
                product: r.product,
                unit_count: r.unit_count,
                manual_line_count: r.manual_line_count,
                total_weight_kg: r.total_weight_kg,
            })
            .collect())
    }
}
