//! Bagged-unit (bolsón) registry

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::operating_day::OperatingWindow;
use shared::validation::{require_max_scale, require_positive, require_text, QUANTITY_SCALE};
use shared::{
    BaggedUnit, BaggedUnitFilter, NewBaggedUnit, PaginatedResponse, Pagination, ProductionTotal,
};
use tracing::info;
use validator::Validate;

use super::codes::next_bagged_unit_code;
use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::repository::{finish, Store};

#[derive(Clone)]
pub struct BaggedUnitService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

/// Input for registering a produced unit
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBaggedUnitInput {
    #[validate(length(max = 100))]
    pub product: String,
    pub weight_kg: Decimal,
    #[validate(length(max = 100))]
    pub seal: String,
}

impl BaggedUnitService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Register a unit; its code and production date/time come from the local clock
    pub async fn create(
        &self,
        input: CreateBaggedUnitInput,
        responsible: &str,
    ) -> AppResult<BaggedUnit> {
        input.validate()?;
        let product = require_text("product", &input.product)?.to_string();
        let seal = require_text("seal", &input.seal)?.to_string();
        let weight_kg = require_positive("weight_kg", input.weight_kg)?;
        require_max_scale("weight_kg", weight_kg, QUANTITY_SCALE)?;
        let responsible = require_text("responsible", responsible)?.to_string();
        let now = self.clock.now();

        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let code = next_bagged_unit_code(tx.as_mut(), now).await?;
            tx.insert_unit(&NewBaggedUnit {
                code,
                product,
                weight_kg,
                seal,
                produced_on: now.date(),
                produced_at: now.time(),
                responsible,
            })
            .await
        }
        .await;
        let unit = finish(tx, result).await?;

        info!(code = %unit.code, product = %unit.product, weight_kg = %unit.weight_kg, "Bagged unit created");
        Ok(unit)
    }

    pub async fn get(&self, code: &str) -> AppResult<BaggedUnit> {
        let mut tx = self.store.begin().await?;
        let result = tx
            .find_unit(code)
            .await
            .and_then(|u| u.ok_or_else(|| AppError::NotFound(format!("Bagged unit {}", code))));
        finish(tx, result).await
    }

    pub async fn list(
        &self,
        filter: BaggedUnitFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<BaggedUnit>> {
        let pagination = pagination.normalized();
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let total = tx.count_units(&filter).await?;
            let units = tx.list_units(&filter, &pagination).await?;
            Ok(PaginatedResponse::new(units, pagination, total))
        }
        .await;
        finish(tx, result).await
    }

    /// Units not yet absorbed by any daily report
    pub async fn list_unassociated(&self) -> AppResult<Vec<BaggedUnit>> {
        let mut tx = self.store.begin().await?;
        let result = tx.unassociated_units().await;
        finish(tx, result).await
    }

    /// Correction path; dispatched units are permanent
    pub async fn delete(&self, code: &str) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let unit = tx
                .find_unit(code)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Bagged unit {}", code)))?;
            if unit.dispatched {
                return Err(AppError::AlreadyDispatched(unit.code));
            }
            tx.delete_unit(code).await
        }
        .await;
        finish(tx, result).await?;

        info!(code, "Bagged unit deleted");
        Ok(())
    }

    /// Units produced during operating day `date`, per product
    pub async fn produced_by_product(&self, date: NaiveDate) -> AppResult<Vec<ProductionTotal>> {
        let window = OperatingWindow::for_date(date);
        let mut tx = self.store.begin().await?;
        let result = tx.production_totals(window.start, window.end_exclusive).await;
        finish(tx, result).await
    }
}
