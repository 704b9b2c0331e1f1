//! Sales orders (órdenes de venta)

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::validation::{optional_text, require_positive, require_text};
use shared::{
    NewSalesOrder, PaginatedResponse, Pagination, SalesOrder, SalesOrderStatus,
    SalesOrderWithLines,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::repository::{finish, Store};

#[derive(Clone)]
pub struct SalesOrderService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

/// Demanded quantity of one product
#[derive(Debug, Deserialize, Validate)]
pub struct OrderLineInput {
    #[validate(length(max = 100))]
    pub product: String,
    pub quantity: Decimal,
}

/// Input for creating a sales order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSalesOrderInput {
    /// Defaults to today
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[validate(length(max = 200))]
    pub customer: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub final_customer: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub sale_code: Option<String>,
    #[serde(default)]
    pub observations: Option<String>,
    #[validate]
    pub lines: Vec<OrderLineInput>,
}

impl SalesOrderService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create an open order; every line starts with remaining = initial
    pub async fn create(
        &self,
        input: CreateSalesOrderInput,
        responsible: &str,
    ) -> AppResult<SalesOrderWithLines> {
        input.validate()?;
        let customer = require_text("customer", &input.customer)?.to_string();
        let responsible = require_text("responsible", responsible)?.to_string();
        if input.lines.is_empty() {
            return Err(AppError::validation("lines", "at least one line is required"));
        }

        let mut seen = HashSet::new();
        let mut lines = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let product = require_text("product", &line.product)?.to_string();
            let quantity = require_positive("quantity", line.quantity)?;
            if !seen.insert(product.clone()) {
                return Err(AppError::validation(
                    "lines",
                    format!("product {} is listed twice", product),
                ));
            }
            lines.push((product, quantity));
        }

        let now = self.clock.now();
        let order = NewSalesOrder {
            date: input.date.unwrap_or_else(|| now.date()),
            customer,
            final_customer: optional_text(input.final_customer),
            sale_code: optional_text(input.sale_code),
            observations: optional_text(input.observations),
            responsible,
            created_at: now,
        };

        let mut tx = self.store.begin().await?;
        let result = tx.insert_order(&order, &lines).await;
        let (order, lines) = finish(tx, result).await?;

        info!(order_id = %order.id, customer = %order.customer, lines = lines.len(), "Sales order created");
        Ok(SalesOrderWithLines { order, lines })
    }

    pub async fn get(&self, id: Uuid) -> AppResult<SalesOrderWithLines> {
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let order = tx
                .find_order(id)
                .await?
                .ok_or_else(|| AppError::NotFound("Sales order".to_string()))?;
            let lines = tx.order_lines(id).await?;
            Ok(SalesOrderWithLines { order, lines })
        }
        .await;
        finish(tx, result).await
    }

    /// Orders in `status` (all when `None`), newest first
    pub async fn list_by_state(
        &self,
        status: Option<SalesOrderStatus>,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<SalesOrder>> {
        let pagination = pagination.normalized();
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let total = tx.count_orders(status).await?;
            let orders = tx.list_orders(status, &pagination).await?;
            Ok(PaginatedResponse::new(orders, pagination, total))
        }
        .await;
        finish(tx, result).await
    }

    /// Delete the order together with its lines and dispatches
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            tx.lock_order(id)
                .await?
                .ok_or_else(|| AppError::NotFound("Sales order".to_string()))?;
            tx.delete_order(id).await
        }
        .await;
        finish(tx, result).await?;

        info!(order_id = %id, "Sales order deleted");
        Ok(())
    }
}
