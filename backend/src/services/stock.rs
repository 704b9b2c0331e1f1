//! Stock ledger and movement ledger
//!
//! Goods carry stored stock; kits never do. A kit's stock is derived from its
//! components every time it is read, and moving a kit moves its components.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::codes::{GOOD_CODE_PREFIX, KIT_CODE_PREFIX};
use shared::operating_day::OperatingWindow;
use shared::validation::{
    optional_text, require_max_scale, require_non_negative, require_positive, require_text,
    QUANTITY_SCALE,
};
use shared::{
    checked_decrement, crosses_critical, kit_available_stock, stock_at, CriticalStockAlert, Good,
    ItemKind, KitComponent, KitWithStock, MovementFilter, MovementKind, MovementResult, NewGood,
    NewKit, NewStockMovement, PaginatedResponse, Pagination, StockMovement, StockSnapshotEntry,
};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::codes::next_item_code;
use super::notification::StockAlerts;
use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::repository::{finish, Store, Tx};

/// Stock ledger service
#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    alerts: StockAlerts,
    max_code_retries: u32,
}

/// Input for creating a good
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGoodInput {
    #[validate(length(max = 200))]
    pub name: String,
    #[serde(default)]
    pub initial_stock: Option<Decimal>,
    #[serde(default)]
    pub critical_stock: Option<Decimal>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
}

/// One line of a kit's bill of materials
#[derive(Debug, Deserialize)]
pub struct KitComponentInput {
    pub good_id: Uuid,
    pub quantity_per_kit: Decimal,
}

/// Input for creating a kit
#[derive(Debug, Deserialize, Validate)]
pub struct CreateKitInput {
    #[validate(length(max = 200))]
    pub name: String,
    #[serde(default)]
    pub components: Vec<KitComponentInput>,
}

/// Input for a stock adjustment (ENTRADA, SALIDA, AJUSTE_ENTRADA, AJUSTE_SALIDA)
#[derive(Debug, Deserialize)]
pub struct AdjustStockInput {
    pub item_kind: ItemKind,
    pub item_id: Uuid,
    pub movement_kind: MovementKind,
    pub quantity: Decimal,
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub observations: Option<String>,
}

/// Who performed a stock change
#[derive(Debug, Clone)]
pub struct MovementActor<'a> {
    /// Operator recorded as responsible
    pub responsible: &'a str,
    /// Authenticated account that submitted the change
    pub system_user: &'a str,
}

/// Decrement a good through the ledger, collecting an alert when the critical
/// threshold is crossed
async fn ledger_decrement(
    tx: &mut dyn Tx,
    good: &Good,
    delta: Decimal,
    alerts: &mut Vec<CriticalStockAlert>,
) -> AppResult<Decimal> {
    let next = checked_decrement(&good.code, good.stock, delta)?;
    tx.set_good_stock(good.id, next).await?;

    if crosses_critical(good.stock, next, good.critical_stock) {
        alerts.push(CriticalStockAlert {
            good_id: good.id,
            code: good.code.clone(),
            name: good.name.clone(),
            stock: next,
            critical_stock: good.critical_stock.unwrap_or(Decimal::ZERO),
        });
    }
    Ok(next)
}

async fn ledger_increment(tx: &mut dyn Tx, good: &Good, delta: Decimal) -> AppResult<Decimal> {
    let next = good.stock + delta;
    tx.set_good_stock(good.id, next).await?;
    Ok(next)
}

/// Movement row for a change made through the ledger operations
/// (increment, decrement and the administrative overwrite)
fn ledger_movement(
    movement_kind: MovementKind,
    good: &Good,
    quantity: Decimal,
    stock_after: Decimal,
    actor: &LedgerActor,
    observations: &str,
    at: NaiveDateTime,
) -> NewStockMovement {
    NewStockMovement {
        movement_kind,
        item_kind: ItemKind::Good,
        item_id: good.id,
        quantity,
        stock_before: good.stock,
        stock_after,
        warehouse: None,
        unit_price: None,
        responsible: actor.responsible.clone(),
        system_user: actor.system_user.clone(),
        observations: Some(observations.to_string()),
        created_at: at,
    }
}

struct LedgerActor {
    responsible: String,
    system_user: String,
}

impl LedgerActor {
    fn from_actor(actor: &MovementActor<'_>) -> AppResult<Self> {
        Ok(Self {
            responsible: require_text("responsible", actor.responsible)?.to_string(),
            system_user: require_text("system_user", actor.system_user)?.to_string(),
        })
    }
}

async fn lock_good(tx: &mut dyn Tx, id: Uuid) -> AppResult<Good> {
    tx.lock_good(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Good".to_string()))
}

async fn load_kit(tx: &mut dyn Tx, id: Uuid) -> AppResult<KitWithStock> {
    let kit = tx
        .find_kit(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Kit".to_string()))?;
    let components = tx.kit_components(id).await?;
    Ok(KitWithStock::new(kit, components))
}

impl StockService {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        alerts: StockAlerts,
        max_code_retries: u32,
    ) -> Self {
        Self {
            store,
            clock,
            alerts,
            max_code_retries,
        }
    }

    /// Create a good with a fresh BIEN code
    pub async fn create_good(&self, input: CreateGoodInput) -> AppResult<Good> {
        input.validate()?;
        let name = require_text("name", &input.name)?.to_string();
        let stock = require_non_negative("initial_stock", input.initial_stock)?.unwrap_or(Decimal::ZERO);
        let critical_stock = require_non_negative("critical_stock", input.critical_stock)?;
        let unit_price = require_non_negative("unit_price", input.unit_price)?;

        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let code = next_item_code(tx.as_mut(), GOOD_CODE_PREFIX, self.max_code_retries).await?;
            tx.insert_good(&NewGood {
                code,
                name,
                stock,
                critical_stock,
                unit_price,
                created_at: self.clock.now(),
            })
            .await
        }
        .await;
        let good = finish(tx, result).await?;

        info!(good_id = %good.id, code = %good.code, "Good created");
        Ok(good)
    }

    /// Create a kit with a fresh KIT code; a kit may have no components yet
    pub async fn create_kit(&self, input: CreateKitInput) -> AppResult<KitWithStock> {
        input.validate()?;
        let name = require_text("name", &input.name)?.to_string();

        let mut components = Vec::with_capacity(input.components.len());
        for c in &input.components {
            require_positive("quantity_per_kit", c.quantity_per_kit)?;
            if components.iter().any(|(id, _)| *id == c.good_id) {
                return Err(AppError::validation(
                    "components",
                    format!("good {} is listed twice", c.good_id),
                ));
            }
            components.push((c.good_id, c.quantity_per_kit));
        }

        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            for (good_id, _) in &components {
                if tx.find_good(*good_id).await?.is_none() {
                    return Err(AppError::NotFound(format!("Good {}", good_id)));
                }
            }
            let code = next_item_code(tx.as_mut(), KIT_CODE_PREFIX, self.max_code_retries).await?;
            let kit = tx
                .insert_kit(&NewKit {
                    code,
                    name,
                    components,
                    created_at: self.clock.now(),
                })
                .await?;
            load_kit(tx.as_mut(), kit.id).await
        }
        .await;
        let kit = finish(tx, result).await?;

        info!(kit_id = %kit.kit.id, code = %kit.kit.code, "Kit created");
        Ok(kit)
    }

    pub async fn get_good(&self, id: Uuid) -> AppResult<Good> {
        let mut tx = self.store.begin().await?;
        let result = tx
            .find_good(id)
            .await
            .and_then(|g| g.ok_or_else(|| AppError::NotFound("Good".to_string())));
        finish(tx, result).await
    }

    /// Kit with its components and derived stock
    pub async fn get_kit(&self, id: Uuid) -> AppResult<KitWithStock> {
        let mut tx = self.store.begin().await?;
        let result = load_kit(tx.as_mut(), id).await;
        finish(tx, result).await
    }

    pub async fn list_goods(&self, pagination: Pagination) -> AppResult<PaginatedResponse<Good>> {
        let pagination = pagination.normalized();
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let total = tx.count_goods().await?;
            let goods = tx.list_goods(&pagination).await?;
            Ok(PaginatedResponse::new(goods, pagination, total))
        }
        .await;
        finish(tx, result).await
    }

    /// Stored stock of a good, or derived stock of a kit
    pub async fn get_stock(&self, kind: ItemKind, id: Uuid) -> AppResult<Decimal> {
        match kind {
            ItemKind::Good => Ok(self.get_good(id).await?.stock),
            ItemKind::Kit => self.kit_available_stock(id).await,
        }
    }

    /// min over components of floor(stock / per-kit); zero for a kit without components
    pub async fn kit_available_stock(&self, kit_id: Uuid) -> AppResult<Decimal> {
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            if tx.find_kit(kit_id).await?.is_none() {
                return Err(AppError::NotFound("Kit".to_string()));
            }
            let components: Vec<KitComponent> = tx.kit_components(kit_id).await?;
            Ok(kit_available_stock(&components))
        }
        .await;
        finish(tx, result).await
    }

    /// Administrative overwrite, recorded as an AJUSTE_ENTRADA or AJUSTE_SALIDA
    /// of the difference; an unchanged value records nothing
    pub async fn set_stock(
        &self,
        good_id: Uuid,
        quantity: Decimal,
        actor: MovementActor<'_>,
    ) -> AppResult<Good> {
        if quantity < Decimal::ZERO {
            return Err(AppError::validation("quantity", "quantity cannot be negative"));
        }
        require_max_scale("quantity", quantity, QUANTITY_SCALE)?;
        let actor = LedgerActor::from_actor(&actor)?;
        let now = self.clock.now();

        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let good = lock_good(tx.as_mut(), good_id).await?;
            tx.set_good_stock(good_id, quantity).await?;
            if quantity != good.stock {
                let kind = if quantity > good.stock {
                    MovementKind::AdjustmentEntry
                } else {
                    MovementKind::AdjustmentExit
                };
                let movement = ledger_movement(
                    kind,
                    &good,
                    (quantity - good.stock).abs(),
                    quantity,
                    &actor,
                    "Stock overwritten",
                    now,
                );
                tx.insert_movement(&movement).await?;
            }
            Ok(Good {
                stock: quantity,
                ..good
            })
        }
        .await;
        let good = finish(tx, result).await?;

        warn!(good_id = %good.id, code = %good.code, stock = %quantity, "Stock overwritten");
        Ok(good)
    }

    /// Recorded as an AJUSTE_ENTRADA movement
    pub async fn increment(
        &self,
        good_id: Uuid,
        delta: Decimal,
        actor: MovementActor<'_>,
    ) -> AppResult<Decimal> {
        require_positive("delta", delta)?;
        require_max_scale("delta", delta, QUANTITY_SCALE)?;
        let actor = LedgerActor::from_actor(&actor)?;
        let now = self.clock.now();

        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let good = lock_good(tx.as_mut(), good_id).await?;
            let stock = ledger_increment(tx.as_mut(), &good, delta).await?;
            let movement = ledger_movement(
                MovementKind::AdjustmentEntry,
                &good,
                delta,
                stock,
                &actor,
                "Stock increment",
                now,
            );
            tx.insert_movement(&movement).await?;
            Ok(stock)
        }
        .await;
        finish(tx, result).await
    }

    /// Recorded as an AJUSTE_SALIDA movement. Fails with `InsufficientStock`
    /// instead of going negative; may raise a critical alert
    pub async fn decrement(
        &self,
        good_id: Uuid,
        delta: Decimal,
        actor: MovementActor<'_>,
    ) -> AppResult<Decimal> {
        require_positive("delta", delta)?;
        require_max_scale("delta", delta, QUANTITY_SCALE)?;
        let actor = LedgerActor::from_actor(&actor)?;
        let now = self.clock.now();

        let mut alerts = Vec::new();
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let good = lock_good(tx.as_mut(), good_id).await?;
            let stock = ledger_decrement(tx.as_mut(), &good, delta, &mut alerts).await?;
            let movement = ledger_movement(
                MovementKind::AdjustmentExit,
                &good,
                delta,
                stock,
                &actor,
                "Stock decrement",
                now,
            );
            tx.insert_movement(&movement).await?;
            Ok(stock)
        }
        .await;
        let stock = finish(tx, result).await?;

        self.alerts.send_all(alerts).await;
        Ok(stock)
    }

    /// Apply a stock movement and record it in the movement ledger
    pub async fn adjust(
        &self,
        input: AdjustStockInput,
        actor: MovementActor<'_>,
    ) -> AppResult<MovementResult> {
        let AdjustStockInput {
            item_kind,
            item_id,
            movement_kind,
            quantity,
            warehouse,
            unit_price,
            observations,
        } = input;
        require_positive("quantity", quantity)?;
        require_max_scale("quantity", quantity, QUANTITY_SCALE)?;
        if item_kind == ItemKind::Kit && !quantity.fract().is_zero() {
            return Err(AppError::validation("quantity", "kits move in whole units"));
        }
        require_non_negative("unit_price", unit_price)?;
        let responsible = require_text("responsible", actor.responsible)?.to_string();
        let system_user = require_text("system_user", actor.system_user)?.to_string();
        let warehouse = optional_text(warehouse);
        let observations = optional_text(observations);
        let now = self.clock.now();

        let mut alerts = Vec::new();
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let (before, after) = match item_kind {
                ItemKind::Good => {
                    let good = lock_good(tx.as_mut(), item_id).await?;
                    // rejects insufficient stock before any write
                    let after = movement_kind.apply(&good.code, good.stock, quantity)?;
                    if movement_kind.is_inbound() {
                        tx.set_good_stock(good.id, after).await?;
                    } else {
                        ledger_decrement(tx.as_mut(), &good, quantity, &mut alerts).await?;
                    }
                    (good.stock, after)
                }
                ItemKind::Kit => {
                    let kit = load_kit(tx.as_mut(), item_id).await?;
                    if kit.components.is_empty() {
                        return Err(AppError::validation(
                            "item_id",
                            format!("kit {} has no components", kit.kit.code),
                        ));
                    }
                    let before = kit.available_stock;
                    if !movement_kind.is_inbound() && quantity > before {
                        return Err(AppError::InsufficientStock {
                            item: kit.kit.code.clone(),
                            available: before,
                            requested: quantity,
                        });
                    }

                    for component in &kit.components {
                        let good = lock_good(tx.as_mut(), component.good_id).await?;
                        let delta = quantity * component.quantity_per_kit;
                        let stock_after = if movement_kind.is_inbound() {
                            ledger_increment(tx.as_mut(), &good, delta).await?
                        } else {
                            ledger_decrement(tx.as_mut(), &good, delta, &mut alerts).await?
                        };
                        tx.insert_movement(&NewStockMovement {
                            movement_kind,
                            item_kind: ItemKind::Good,
                            item_id: good.id,
                            quantity: delta,
                            stock_before: good.stock,
                            stock_after,
                            warehouse: warehouse.clone(),
                            unit_price: None,
                            responsible: responsible.clone(),
                            system_user: system_user.clone(),
                            observations: Some(format!("Kit {}", kit.kit.code)),
                            created_at: now,
                        })
                        .await?;
                    }

                    let after = kit_available_stock(&tx.kit_components(kit.kit.id).await?);
                    (before, after)
                }
            };

            let movement = tx
                .insert_movement(&NewStockMovement {
                    movement_kind,
                    item_kind,
                    item_id,
                    quantity,
                    stock_before: before,
                    stock_after: after,
                    warehouse,
                    unit_price,
                    responsible,
                    system_user,
                    observations,
                    created_at: now,
                })
                .await?;

            Ok(MovementResult {
                delta: movement_kind.signed_delta(quantity),
                stock_before: before,
                stock_after: after,
                movement,
            })
        }
        .await;
        let result = finish(tx, result).await?;

        info!(
            item_id = %item_id,
            kind = movement_kind.as_str(),
            delta = %result.delta,
            "Stock adjusted"
        );
        self.alerts.send_all(alerts).await;
        Ok(result)
    }

    /// Movement ledger, newest first
    pub async fn history(
        &self,
        filter: MovementFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<StockMovement>> {
        if let (Some(from), Some(to)) = (filter.date_from, filter.date_to) {
            if from > to {
                return Err(AppError::validation("date_from", "date_from is after date_to"));
            }
        }

        let pagination = pagination.normalized();
        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let total = tx.count_movements(&filter).await?;
            let movements = tx.list_movements(&filter, &pagination).await?;
            Ok(PaginatedResponse::new(movements, pagination, total))
        }
        .await;
        finish(tx, result).await
    }

    /// Stock of every good at the close of operating day `date`
    pub async fn stock_snapshot(&self, date: NaiveDate) -> AppResult<Vec<StockSnapshotEntry>> {
        let cutoff = OperatingWindow::for_date(date).end_exclusive;

        let mut tx = self.store.begin().await?;
        let result: AppResult<_> = async {
            let goods = tx.all_goods().await?;
            let mut entries = Vec::with_capacity(goods.len());
            for good in goods {
                let movements = tx.item_movements(ItemKind::Good, good.id).await?;
                entries.push(StockSnapshotEntry {
                    good_id: good.id,
                    stock: stock_at(good.stock, &movements, cutoff),
                    code: good.code,
                    name: good.name,
                });
            }
            Ok(entries)
        }
        .await;
        finish(tx, result).await
    }
}
