//! Dispatch engine
//!
//! A dispatch consumes bagged units (or manual quantities) against one sales
//! order. Header, details, unit flags, line decrements and the order status flip
//! are written in a single transaction: either every unit of the request is
//! dispatched or none is.

use std::sync::Arc;

use chrono::NaiveDate;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::codes::manual_dispatch_code;
use shared::operating_day::OperatingWindow;
use shared::reconcile::{apply_updates, plan_line_updates, ProductTotals};
use shared::validation::{
    optional_text, require_max_scale, require_positive, require_text, QUANTITY_SCALE,
};
use shared::{
    all_lines_fulfilled, group_dispatch_rows, DispatchResult, DispatchWithDetails,
    DispatchedProductTotal, LineUpdate, NewDispatch, NewDispatchDetail, SalesOrder,
    SalesOrderStatus, UnitDispatchStatus,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::DispatchConfig;
use crate::error::{AppError, AppResult};
use crate::repository::{finish, Store, Tx};

#[derive(Clone)]
pub struct DispatchService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
}

/// Scan-based dispatch request
#[derive(Debug, Deserialize)]
pub struct DispatchInput {
    pub order_id: Uuid,
    pub unit_codes: Vec<String>,
    #[serde(default)]
    pub observations: Option<String>,
}

/// One manual quantity line
#[derive(Debug, Deserialize)]
pub struct ManualLineInput {
    pub product: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub seal: Option<String>,
}

/// Dispatch request without physical units
#[derive(Debug, Deserialize)]
pub struct ManualDispatchInput {
    pub order_id: Uuid,
    pub lines: Vec<ManualLineInput>,
    #[serde(default)]
    pub observations: Option<String>,
}

async fn lock_open_order(tx: &mut dyn Tx, order_id: Uuid) -> AppResult<SalesOrder> {
    let order = tx
        .lock_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Sales order".to_string()))?;
    if order.status == SalesOrderStatus::Complete {
        return Err(AppError::InvalidStateTransition(format!(
            "sales order {} is already complete",
            order.id
        )));
    }
    Ok(order)
}

impl DispatchService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: DispatchConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Decrement the order lines by `totals` and close the order when nothing remains
    async fn reconcile(
        &self,
        tx: &mut dyn Tx,
        order_id: Uuid,
        totals: &ProductTotals,
    ) -> AppResult<(Vec<LineUpdate>, bool)> {
        let lines = tx.order_lines(order_id).await?;
        let updates = plan_line_updates(&lines, totals, self.config.over_dispatch)?;
        for update in &updates {
            if update.excess_kg > Decimal::ZERO {
                warn!(
                    order_id = %order_id,
                    product = %update.product,
                    excess_kg = %update.excess_kg,
                    "Dispatch exceeds remaining quantity, clamped at zero"
                );
            }
            tx.update_line_remaining(update.line_id, update.remaining_after)
                .await?;
        }

        let complete = all_lines_fulfilled(&apply_updates(&lines, &updates));
        if complete {
            tx.set_order_status(order_id, SalesOrderStatus::Complete)
                .await?;
        }
        Ok((updates, complete))
    }

    /// Dispatch bagged units, in the order given, against a sales order
    pub async fn dispatch(&self, input: DispatchInput, responsible: &str) -> AppResult<DispatchResult> {
        if input.unit_codes.is_empty() {
            return Err(AppError::validation("unit_codes", "at least one unit code is required"));
        }
        let codes = input
            .unit_codes
            .iter()
            .map(|c| require_text("unit_codes", c).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;
        let responsible = require_text("responsible", responsible)?.to_string();
        let order_id = input.order_id;
        let observations = optional_text(input.observations);
        let now = self.clock.now();

        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            lock_open_order(tx.as_mut(), order_id).await?;
            let dispatch = tx
                .insert_dispatch(&NewDispatch {
                    order_id,
                    dispatched_at: now,
                    responsible,
                    observations,
                })
                .await?;

            let mut totals = ProductTotals::new();
            for code in &codes {
                let unit = tx
                    .find_unit(code)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Bagged unit {}", code)))?;
                if unit.dispatched || tx.detail_for_unit(code).await?.is_some() {
                    return Err(AppError::AlreadyDispatched(code.clone()));
                }

                tx.insert_detail(&NewDispatchDetail {
                    dispatch_id: dispatch.id,
                    unit_code: unit.code.clone(),
                    product: unit.product.clone(),
                    weight_kg: unit.weight_kg,
                    seal: Some(unit.seal.clone()),
                    manual: false,
                })
                .await?;
                tx.mark_dispatched(code).await?;
                totals.add(&unit.product, unit.weight_kg);
            }

            let (updates, order_complete) = self.reconcile(tx.as_mut(), order_id, &totals).await?;

            Ok(DispatchResult {
                dispatch_id: dispatch.id,
                order_id,
                dispatched_count: codes.len(),
                updates,
                order_complete,
            })
        }
        .await;

        match finish(tx, result).await {
            Ok(result) => {
                info!(
                    dispatch_id = %result.dispatch_id,
                    order_id = %result.order_id,
                    units = result.dispatched_count,
                    order_complete = result.order_complete,
                    "Dispatch recorded"
                );
                Ok(result)
            }
            Err(e) => {
                warn!(order_id = %order_id, "Dispatch rolled back: {}", e);
                Err(e)
            }
        }
    }

    /// Dispatch quantities without scanning units; each line gets a synthetic MANUAL code
    pub async fn dispatch_manual(
        &self,
        input: ManualDispatchInput,
        responsible: &str,
    ) -> AppResult<DispatchResult> {
        if !self.config.manual_enabled {
            return Err(AppError::InvalidStateTransition(
                "manual dispatch is disabled".to_string(),
            ));
        }
        if input.lines.is_empty() {
            return Err(AppError::validation("lines", "at least one line is required"));
        }

        let mut lines = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let product = require_text("product", &line.product)?.to_string();
            let quantity = require_positive("quantity", line.quantity)?;
            require_max_scale("quantity", quantity, QUANTITY_SCALE)?;
            lines.push((product, quantity, optional_text(line.seal.clone())));
        }
        let responsible = require_text("responsible", responsible)?.to_string();
        let order_id = input.order_id;
        let observations = optional_text(input.observations);
        let now = self.clock.now();
        let suffix_base: u32 = rand::thread_rng().gen_range(0..10_000);

        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            lock_open_order(tx.as_mut(), order_id).await?;
            let dispatch = tx
                .insert_dispatch(&NewDispatch {
                    order_id,
                    dispatched_at: now,
                    responsible,
                    observations,
                })
                .await?;

            let mut totals = ProductTotals::new();
            for (index, (product, quantity, seal)) in lines.iter().enumerate() {
                let code = manual_dispatch_code(now, suffix_base + index as u32);
                tx.insert_detail(&NewDispatchDetail {
                    dispatch_id: dispatch.id,
                    unit_code: code,
                    product: product.clone(),
                    weight_kg: *quantity,
                    seal: seal.clone(),
                    manual: true,
                })
                .await?;
                totals.add(product, *quantity);
            }

            let (updates, order_complete) = self.reconcile(tx.as_mut(), order_id, &totals).await?;

            Ok(DispatchResult {
                dispatch_id: dispatch.id,
                order_id,
                dispatched_count: lines.len(),
                updates,
                order_complete,
            })
        }
        .await;
        let result = finish(tx, result).await?;

        info!(
            dispatch_id = %result.dispatch_id,
            order_id = %result.order_id,
            lines = result.dispatched_count,
            "Manual dispatch recorded"
        );
        Ok(result)
    }

    /// Read-only "verify before scanning" lookup
    pub async fn unit_dispatch_status(&self, code: &str) -> AppResult<UnitDispatchStatus> {
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let unit = tx
                .find_unit(code)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Bagged unit {}", code)))?;
            let dispatch = match tx.detail_for_unit(code).await? {
                Some(detail) => tx.find_dispatch(detail.dispatch_id).await?,
                None => None,
            };
            Ok(UnitDispatchStatus {
                dispatched: unit.dispatched || dispatch.is_some(),
                unit,
                dispatch,
            })
        }
        .await;
        finish(tx, result).await
    }

    /// Every dispatch of an order with its details, oldest first
    pub async fn dispatches_for_order(&self, order_id: Uuid) -> AppResult<Vec<DispatchWithDetails>> {
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            tx.find_order(order_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Sales order".to_string()))?;
            tx.dispatch_rows_for_order(order_id).await
        }
        .await;
        let rows = finish(tx, result).await?;
        Ok(group_dispatch_rows(rows))
    }

    /// Dispatched units and weight per product during operating day `date`
    pub async fn dispatched_by_product(
        &self,
        date: NaiveDate,
    ) -> AppResult<Vec<DispatchedProductTotal>> {
        let window = OperatingWindow::for_date(date);
        let mut tx = self.store.begin().await?;
        let result = tx.dispatched_totals(window.start, window.end_exclusive).await;
        finish(tx, result).await
    }
}
