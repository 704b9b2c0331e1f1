use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use shared::{NewSalesOrder, Pagination, SalesOrder, SalesOrderLine, SalesOrderStatus};
use sqlx::FromRow;
use uuid::Uuid;

use super::{decode, is_unique_violation, to_u64, PgTx};
use crate::error::{AppError, AppResult};
use crate::repository::SalesOrderRepository;

#[derive(Debug, FromRow)]
struct SalesOrderRow {
    id: Uuid,
    order_date: NaiveDate,
    customer: String,
    final_customer: Option<String>,
    sale_code: Option<String>,
    observations: Option<String>,
    responsible: String,
    status: String,
    created_at: NaiveDateTime,
}

impl TryFrom<SalesOrderRow> for SalesOrder {
    type Error = AppError;

    fn try_from(row: SalesOrderRow) -> Result<Self, Self::Error> {
        Ok(SalesOrder {
            id: row.id,
            date: row.order_date,
            customer: row.customer,
            final_customer: row.final_customer,
            sale_code: row.sale_code,
            observations: row.observations,
            responsible: row.responsible,
            status: decode("status", &row.status, SalesOrderStatus::from_str)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct LineRow {
    id: Uuid,
    order_id: Uuid,
    product: String,
    initial_quantity: Decimal,
    remaining_quantity: Decimal,
}

impl From<LineRow> for SalesOrderLine {
    fn from(row: LineRow) -> Self {
        SalesOrderLine {
            id: row.id,
            order_id: row.order_id,
            product: row.product,
            initial_quantity: row.initial_quantity,
            remaining_quantity: row.remaining_quantity,
        }
    }
}

const ORDER_COLUMNS: &str = "id, order_date, customer, final_customer, sale_code, observations, \
                             responsible, status, created_at";

#[async_trait]
impl SalesOrderRepository for PgTx {
    async fn insert_order(
        &mut self,
        order: &NewSalesOrder,
        lines: &[(String, Decimal)],
    ) -> AppResult<(SalesOrder, Vec<SalesOrderLine>)> {
        let row = sqlx::query_as::<_, SalesOrderRow>(&format!(
            r#"
            INSERT INTO sales_orders
                (id, order_date, customer, final_customer, sale_code, observations, responsible, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'open', $8)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(order.date)
        .bind(&order.customer)
        .bind(&order.final_customer)
        .bind(&order.sale_code)
        .bind(&order.observations)
        .bind(&order.responsible)
        .bind(order.created_at)
        .fetch_one(&mut *self.tx)
        .await?;
        let order = SalesOrder::try_from(row)?;

        let mut created = Vec::with_capacity(lines.len());
        for (product, quantity) in lines {
            // initial = remaining at creation
            let line = sqlx::query_as::<_, LineRow>(
                r#"
                INSERT INTO sales_order_lines (id, order_id, product, initial_quantity, remaining_quantity)
                VALUES ($1, $2, $3, $4, $4)
                RETURNING id, order_id, product, initial_quantity, remaining_quantity
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(order.id)
            .bind(product)
            .bind(quantity)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::DuplicateEntry("product".to_string())
                } else {
                    AppError::DatabaseError(e)
                }
            })?;
            created.push(line.into());
        }

        Ok((order, created))
    }

    async fn find_order(&mut self, id: Uuid) -> AppResult<Option<SalesOrder>> {
        let row = sqlx::query_as::<_, SalesOrderRow>(&format!(
            "SELECT {} FROM sales_orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(SalesOrder::try_from).transpose()
    }

    async fn lock_order(&mut self, id: Uuid) -> AppResult<Option<SalesOrder>> {
        let row = sqlx::query_as::<_, SalesOrderRow>(&format!(
            "SELECT {} FROM sales_orders WHERE id = $1 FOR UPDATE",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(SalesOrder::try_from).transpose()
    }

    async fn order_lines(&mut self, order_id: Uuid) -> AppResult<Vec<SalesOrderLine>> {
        let rows = sqlx::query_as::<_, LineRow>(
            r#"
            SELECT id, order_id, product, initial_quantity, remaining_quantity
            FROM sales_order_lines
            WHERE order_id = $1
            ORDER BY product
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_line_remaining(&mut self, line_id: Uuid, remaining: Decimal) -> AppResult<()> {
        let result = sqlx::query("UPDATE sales_order_lines SET remaining_quantity = $2 WHERE id = $1")
            .bind(line_id)
            .bind(remaining)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Sales order line".to_string()));
        }
        Ok(())
    }

    async fn set_order_status(&mut self, id: Uuid, status: SalesOrderStatus) -> AppResult<()> {
        let result = sqlx::query("UPDATE sales_orders SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Sales order".to_string()));
        }
        Ok(())
    }

    async fn list_orders(
        &mut self,
        status: Option<SalesOrderStatus>,
        pagination: &Pagination,
    ) -> AppResult<Vec<SalesOrder>> {
        let rows = sqlx::query_as::<_, SalesOrderRow>(&format!(
            r#"
            SELECT {} FROM sales_orders
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY order_date DESC, created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            ORDER_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(SalesOrder::try_from).collect()
    }

    async fn count_orders(&mut self, status: Option<SalesOrderStatus>) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sales_orders WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(to_u64(count))
    }

    async fn delete_order(&mut self, id: Uuid) -> AppResult<()> {
        // lines, dispatches and their details cascade
        sqlx::query("DELETE FROM sales_orders WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}
