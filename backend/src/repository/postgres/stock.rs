use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{Good, Kit, KitComponent, NewGood, NewKit, Pagination};
use sqlx::FromRow;
use uuid::Uuid;

use super::{is_unique_violation, to_u64, PgTx};
use crate::error::{AppError, AppResult};
use crate::repository::StockRepository;

#[derive(Debug, FromRow)]
struct GoodRow {
    id: Uuid,
    code: String,
    name: String,
    stock: Decimal,
    critical_stock: Option<Decimal>,
    unit_price: Option<Decimal>,
    created_at: chrono::NaiveDateTime,
}

impl From<GoodRow> for Good {
    fn from(row: GoodRow) -> Self {
        Good {
            id: row.id,
            code: row.code,
            name: row.name,
            stock: row.stock,
            critical_stock: row.critical_stock,
            unit_price: row.unit_price,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct KitRow {
    id: Uuid,
    code: String,
    name: String,
    created_at: chrono::NaiveDateTime,
}

impl From<KitRow> for Kit {
    fn from(row: KitRow) -> Self {
        Kit {
            id: row.id,
            code: row.code,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ComponentRow {
    good_id: Uuid,
    good_code: String,
    good_name: String,
    quantity_per_kit: Decimal,
    stock: Decimal,
}

const GOOD_COLUMNS: &str = "id, code, name, stock, critical_stock, unit_price, created_at";

#[async_trait]
impl StockRepository for PgTx {
    async fn item_code_exists(&mut self, code: &str) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM goods WHERE code = $1)
                OR EXISTS(SELECT 1 FROM kits WHERE code = $1)
            "#,
        )
        .bind(code)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_good(&mut self, good: &NewGood) -> AppResult<Good> {
        let row = sqlx::query_as::<_, GoodRow>(&format!(
            r#"
            INSERT INTO goods (id, code, name, stock, critical_stock, unit_price, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            GOOD_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&good.code)
        .bind(&good.name)
        .bind(good.stock)
        .bind(good.critical_stock)
        .bind(good.unit_price)
        .bind(good.created_at)
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

    async fn find_good(&mut self, id: Uuid) -> AppResult<Option<Good>> {
        let row = sqlx::query_as::<_, GoodRow>(&format!(
            "SELECT {} FROM goods WHERE id = $1",
            GOOD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn lock_good(&mut self, id: Uuid) -> AppResult<Option<Good>> {
        let row = sqlx::query_as::<_, GoodRow>(&format!(
            "SELECT {} FROM goods WHERE id = $1 FOR UPDATE",
            GOOD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_goods(&mut self, pagination: &Pagination) -> AppResult<Vec<Good>> {
        let rows = sqlx::query_as::<_, GoodRow>(&format!(
            "SELECT {} FROM goods ORDER BY code LIMIT $1 OFFSET $2",
            GOOD_COLUMNS
        ))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_goods(&mut self) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM goods")
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(to_u64(count))
    }

    async fn all_goods(&mut self) -> AppResult<Vec<Good>> {
        let rows = sqlx::query_as::<_, GoodRow>(&format!(
            "SELECT {} FROM goods ORDER BY code",
            GOOD_COLUMNS
        ))
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn set_good_stock(&mut self, id: Uuid, stock: Decimal) -> AppResult<()> {
        let result = sqlx::query("UPDATE goods SET stock = $2 WHERE id = $1")
            .bind(id)
            .bind(stock)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Good".to_string()));
        }
        Ok(())
    }

    async fn insert_kit(&mut self, kit: &NewKit) -> AppResult<Kit> {
        let row = sqlx::query_as::<_, KitRow>(
            r#"
            INSERT INTO kits (id, code, name, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, code, name, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&kit.code)
        .bind(&kit.name)
        .bind(kit.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::DuplicateEntry("code".to_string())
            } else {
                AppError::DatabaseError(e)
            }
        })?;

        for (good_id, per_kit) in &kit.components {
            sqlx::query(
                "INSERT INTO kit_components (kit_id, good_id, quantity_per_kit) VALUES ($1, $2, $3)",
            )
            .bind(row.id)
            .bind(good_id)
            .bind(per_kit)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(row.into())
    }

    async fn find_kit(&mut self, id: Uuid) -> AppResult<Option<Kit>> {
        let row = sqlx::query_as::<_, KitRow>(
            "SELECT id, code, name, created_at FROM kits WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn kit_components(&mut self, kit_id: Uuid) -> AppResult<Vec<KitComponent>> {
        let rows = sqlx::query_as::<_, ComponentRow>(
            r#"
            SELECT g.id AS good_id, g.code AS good_code, g.name AS good_name,
                   kc.quantity_per_kit, g.stock
            FROM kit_components kc
            JOIN goods g ON g.id = kc.good_id
            WHERE kc.kit_id = $1
            ORDER BY g.code
            "#,
        )
        .bind(kit_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| KitComponent {
                good_id: r.good_id,
                good_code: r.good_code,
                good_name: r.good_name,
                quantity_per_kit: r.quantity_per_kit,
                stock: r.stock,
            })
            .collect())
    }
}
