use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use shared::{
    ItemKind, MovementFilter, MovementKind, NewStockMovement, Pagination, StockMovement,
};
use sqlx::FromRow;
use uuid::Uuid;

use super::{decode, to_u64, PgTx};
use crate::error::{AppError, AppResult};
use crate::repository::MovementRepository;

#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    movement_kind: String,
    item_kind: String,
    item_id: Uuid,
    quantity: Decimal,
    stock_before: Decimal,
    stock_after: Decimal,
    warehouse: Option<String>,
    unit_price: Option<Decimal>,
    responsible: String,
    system_username: String,
    observations: Option<String>,
    created_at: NaiveDateTime,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(StockMovement {
            id: row.id,
            movement_kind: decode("movement_kind", &row.movement_kind, MovementKind::from_str)?,
            item_kind: decode("item_kind", &row.item_kind, ItemKind::from_str)?,
            item_id: row.item_id,
            quantity: row.quantity,
            stock_before: row.stock_before,
            stock_after: row.stock_after,
            warehouse: row.warehouse,
            unit_price: row.unit_price,
            responsible: row.responsible,
            system_user: row.system_username,
            observations: row.observations,
            created_at: row.created_at,
        })
    }
}

const MOVEMENT_COLUMNS: &str = "id, movement_kind, item_kind, item_id, quantity, stock_before, \
    stock_after, warehouse, unit_price, responsible, system_username, observations, created_at";

// $1 kind, $2 item, $3/$4 inclusive calendar days
const MOVEMENT_FILTER: &str = r#"
    ($1::text IS NULL OR movement_kind = $1)
    AND ($2::uuid IS NULL OR item_id = $2)
    AND ($3::date IS NULL OR created_at::date >= $3)
    AND ($4::date IS NULL OR created_at::date <= $4)
"#;

#[async_trait]
impl MovementRepository for PgTx {
    async fn insert_movement(&mut self, movement: &NewStockMovement) -> AppResult<StockMovement> {
        let row = sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            INSERT INTO stock_movements (
                id, movement_kind, item_kind, item_id, quantity, stock_before, stock_after,
                warehouse, unit_price, responsible, system_username, observations, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(movement.movement_kind.as_str())
        .bind(movement.item_kind.as_str())
        .bind(movement.item_id)
        .bind(movement.quantity)
        .bind(movement.stock_before)
        .bind(movement.stock_after)
        .bind(&movement.warehouse)
        .bind(movement.unit_price)
        .bind(&movement.responsible)
        .bind(&movement.system_user)
        .bind(&movement.observations)
        .bind(movement.created_at)
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn list_movements(
        &mut self,
        filter: &MovementFilter,
        pagination: &Pagination,
    ) -> AppResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            SELECT {} FROM stock_movements
            WHERE {}
            ORDER BY created_at DESC, seq DESC
            LIMIT $5 OFFSET $6
            "#,
            MOVEMENT_COLUMNS, MOVEMENT_FILTER
        ))
        .bind(filter.movement_kind.map(|k| k.as_str()))
        .bind(filter.item_id)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(StockMovement::try_from).collect()
    }

    async fn count_movements(&mut self, filter: &MovementFilter) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM stock_movements WHERE {}",
            MOVEMENT_FILTER
        ))
        .bind(filter.movement_kind.map(|k| k.as_str()))
        .bind(filter.item_id)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(to_u64(count))
    }

    async fn item_movements(
        &mut self,
        kind: ItemKind,
        item_id: Uuid,
    ) -> AppResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            SELECT {} FROM stock_movements
            WHERE item_kind = $1 AND item_id = $2
            ORDER BY created_at, seq
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(item_id)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(StockMovement::try_from).collect()
    }
}
