//! In-memory store for tests and `memory:` deployments
//!
//! A transaction takes the store lock, works on a private copy of the state and
//! swaps it in on commit. Dropping or rolling back the transaction discards the copy,
//! which gives the same all-or-nothing behaviour as a database transaction.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use shared::codes::SequenceState;
use shared::{
    BaggedUnit, BaggedUnitFilter, Checklist, DailyReport, Dispatch, DispatchDetail, DispatchRow,
    DispatchedProductTotal, GeneratorGroup, Good, ItemKind, Kit, KitComponent, MovementFilter,
    NewBaggedUnit, NewDailyReport, NewDispatch, NewDispatchDetail, NewGood, NewKit,
    NewSalesOrder, NewStockMovement, Pagination, ProductionTotal, SalesOrder, SalesOrderLine,
    SalesOrderStatus, StockMovement, DailyReportStatus,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    BaggedUnitRepository, DailyReportRepository, DispatchRepository, MovementRepository,
    SalesOrderRepository, SequenceRepository, StockRepository, Store, Tx,
};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    sequence: SequenceState,
    goods: Vec<Good>,
    kits: Vec<Kit>,
    kit_components: Vec<(Uuid, Uuid, Decimal)>,
    units: Vec<BaggedUnit>,
    reports: Vec<DailyReport>,
    groups: Vec<(Uuid, GeneratorGroup)>,
    checklists: HashMap<Uuid, Checklist>,
    orders: Vec<SalesOrder>,
    lines: Vec<SalesOrderLine>,
    dispatches: Vec<Dispatch>,
    details: Vec<DispatchDetail>,
    /// Unit codes held by non-manual dispatch details
    claimed_codes: HashSet<String>,
    movements: Vec<StockMovement>,
}

/// Process-local store behind a single async mutex
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn Tx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }

    async fn ping(&self) -> bool {
        true
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

fn paginate<T: Clone>(items: Vec<&T>, pagination: &Pagination) -> Vec<T> {
    items
        .into_iter()
        .skip(pagination.offset() as usize)
        .take(pagination.limit() as usize)
        .cloned()
        .collect()
}

fn not_found(what: &str) -> AppError {
    AppError::NotFound(what.to_string())
}

#[async_trait]
impl Tx for MemoryTx {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl SequenceRepository for MemoryTx {
    async fn lock_sequence(&mut self) -> AppResult<SequenceState> {
        Ok(self.work.sequence)
    }

    async fn save_sequence(&mut self, state: SequenceState) -> AppResult<()> {
        self.work.sequence = state;
        Ok(())
    }
}

impl MemoryTx {
    fn components_of(&self, kit_id: Uuid) -> Vec<KitComponent> {
        self.work
            .kit_components
            .iter()
            .filter(|(k, _, _)| *k == kit_id)
            .filter_map(|(_, good_id, per_kit)| {
                self.work.goods.iter().find(|g| g.id == *good_id).map(|g| KitComponent {
                    good_id: g.id,
                    good_code: g.code.clone(),
                    good_name: g.name.clone(),
                    quantity_per_kit: *per_kit,
                    stock: g.stock,
                })
            })
            .collect()
    }

    fn unit_mut(&mut self, code: &str) -> AppResult<&mut BaggedUnit> {
        self.work
            .units
            .iter_mut()
            .find(|u| u.code == code)
            .ok_or_else(|| not_found("Bagged unit"))
    }
}

#[async_trait]
impl StockRepository for MemoryTx {
    async fn item_code_exists(&mut self, code: &str) -> AppResult<bool> {
        Ok(self.work.goods.iter().any(|g| g.code == code)
            || self.work.kits.iter().any(|k| k.code == code))
    }

    async fn insert_good(&mut self, good: &NewGood) -> AppResult<Good> {
        if self.item_code_exists(&good.code).await? {
            return Err(AppError::DuplicateEntry("code".to_string()));
        }
        let good = Good {
            id: Uuid::new_v4(),
            code: good.code.clone(),
            name: good.name.clone(),
            stock: good.stock,
            critical_stock: good.critical_stock,
            unit_price: good.unit_price,
            created_at: good.created_at,
        };
        self.work.goods.push(good.clone());
        Ok(good)
    }

    async fn find_good(&mut self, id: Uuid) -> AppResult<Option<Good>> {
        Ok(self.work.goods.iter().find(|g| g.id == id).cloned())
    }

    async fn lock_good(&mut self, id: Uuid) -> AppResult<Option<Good>> {
        self.find_good(id).await
    }

    async fn list_goods(&mut self, pagination: &Pagination) -> AppResult<Vec<Good>> {
        let mut goods: Vec<&Good> = self.work.goods.iter().collect();
        goods.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(paginate(goods, pagination))
    }

    async fn count_goods(&mut self) -> AppResult<u64> {
        Ok(self.work.goods.len() as u64)
    }

    async fn all_goods(&mut self) -> AppResult<Vec<Good>> {
        let mut goods = self.work.goods.clone();
        goods.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(goods)
    }

    async fn set_good_stock(&mut self, id: Uuid, stock: Decimal) -> AppResult<()> {
        if stock < Decimal::ZERO {
            return Err(AppError::Internal("stock cannot be negative".to_string()));
        }
        let good = self
            .work
            .goods
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| not_found("Good"))?;
        good.stock = stock;
        Ok(())
    }

    async fn insert_kit(&mut self, kit: &NewKit) -> AppResult<Kit> {
        if self.item_code_exists(&kit.code).await? {
            return Err(AppError::DuplicateEntry("code".to_string()));
        }
        let created = Kit {
            id: Uuid::new_v4(),
            code: kit.code.clone(),
            name: kit.name.clone(),
            created_at: kit.created_at,
        };
        for (good_id, per_kit) in &kit.components {
            if !self.work.goods.iter().any(|g| g.id == *good_id) {
                return Err(not_found("Good"));
            }
            self.work.kit_components.push((created.id, *good_id, *per_kit));
        }
        self.work.kits.push(created.clone());
        Ok(created)
    }

    async fn find_kit(&mut self, id: Uuid) -> AppResult<Option<Kit>> {
        Ok(self.work.kits.iter().find(|k| k.id == id).cloned())
    }

    async fn kit_components(&mut self, kit_id: Uuid) -> AppResult<Vec<KitComponent>> {
        Ok(self.components_of(kit_id))
    }
}

#[async_trait]
impl BaggedUnitRepository for MemoryTx {
    async fn insert_unit(&mut self, unit: &NewBaggedUnit) -> AppResult<BaggedUnit> {
        if self.work.units.iter().any(|u| u.code == unit.code) {
            return Err(AppError::DuplicateEntry("code".to_string()));
        }
        let unit = BaggedUnit {
            id: Uuid::new_v4(),
            code: unit.code.clone(),
            product: unit.product.clone(),
            weight_kg: unit.weight_kg,
            seal: unit.seal.clone(),
            produced_on: unit.produced_on,
            produced_at: unit.produced_at,
            responsible: unit.responsible.clone(),
            dispatched: false,
            daily_report_id: None,
        };
        self.work.units.push(unit.clone());
        Ok(unit)
    }

    async fn find_unit(&mut self, code: &str) -> AppResult<Option<BaggedUnit>> {
        Ok(self.work.units.iter().find(|u| u.code == code).cloned())
    }

    async fn list_units(
        &mut self,
        filter: &BaggedUnitFilter,
        pagination: &Pagination,
    ) -> AppResult<Vec<BaggedUnit>> {
        let mut units: Vec<&BaggedUnit> =
            self.work.units.iter().filter(|u| filter.matches(u)).collect();
        units.sort_by(|a, b| {
            b.produced_timestamp()
                .cmp(&a.produced_timestamp())
                .then_with(|| b.code.cmp(&a.code))
        });
        Ok(paginate(units, pagination))
    }

    async fn count_units(&mut self, filter: &BaggedUnitFilter) -> AppResult<u64> {
        Ok(self.work.units.iter().filter(|u| filter.matches(u)).count() as u64)
    }

    async fn unassociated_units(&mut self) -> AppResult<Vec<BaggedUnit>> {
        Ok(self
            .work
            .units
            .iter()
            .filter(|u| !u.is_associated())
            .cloned()
            .collect())
    }

    async fn units_for_report(&mut self, report_id: Uuid) -> AppResult<Vec<BaggedUnit>> {
        Ok(self
            .work
            .units
            .iter()
            .filter(|u| u.daily_report_id == Some(report_id))
            .cloned()
            .collect())
    }

    async fn claim_unassociated(&mut self, report_id: Uuid) -> AppResult<Vec<BaggedUnit>> {
        let mut claimed = Vec::new();
        for unit in self.work.units.iter_mut().filter(|u| !u.is_associated()) {
            unit.daily_report_id = Some(report_id);
            claimed.push(unit.clone());
        }
        Ok(claimed)
    }

    async fn set_unit_report(&mut self, code: &str, report_id: Option<Uuid>) -> AppResult<()> {
        self.unit_mut(code)?.daily_report_id = report_id;
        Ok(())
    }

    async fn release_report_units(&mut self, report_id: Uuid) -> AppResult<u64> {
        let mut released = 0;
        for unit in self
            .work
            .units
            .iter_mut()
            .filter(|u| u.daily_report_id == Some(report_id))
        {
            unit.daily_report_id = None;
            released += 1;
        }
        Ok(released)
    }

    async fn mark_dispatched(&mut self, code: &str) -> AppResult<()> {
        self.unit_mut(code)?.dispatched = true;
        Ok(())
    }

    async fn delete_unit(&mut self, code: &str) -> AppResult<()> {
        let before = self.work.units.len();
        self.work.units.retain(|u| u.code != code);
        if self.work.units.len() == before {
            return Err(not_found("Bagged unit"));
        }
        Ok(())
    }

    async fn production_totals(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AppResult<Vec<ProductionTotal>> {
        let mut totals: BTreeMap<&str, (i64, Decimal)> = BTreeMap::new();
        for unit in &self.work.units {
            let at = unit.produced_timestamp();
            if at >= start && at < end {
                let entry = totals.entry(unit.product.as_str()).or_insert((0, Decimal::ZERO));
                entry.0 += 1;
                entry.1 += unit.weight_kg;
            }
        }
        Ok(totals
            .into_iter()
            .map(|(product, (unit_count, total_weight_kg))| ProductionTotal {
                product: product.to_string(),
                unit_count,
                total_weight_kg,
            })
            .collect())
    }
}

#[async_trait]
impl DailyReportRepository for MemoryTx {
    async fn insert_report(&mut self, report: &NewDailyReport) -> AppResult<DailyReport> {
        let report = DailyReport {
            id: Uuid::new_v4(),
            date: report.date,
            shift: report.shift,
            telemetry: report.telemetry.clone(),
            responsible: report.responsible.clone(),
            status: DailyReportStatus::Pending,
            approved_by: None,
            approved_at: None,
            created_at: report.created_at,
        };
        self.work.reports.push(report.clone());
        Ok(report)
    }

    async fn find_report(&mut self, id: Uuid) -> AppResult<Option<DailyReport>> {
        Ok(self.work.reports.iter().find(|r| r.id == id).cloned())
    }

    async fn lock_report(&mut self, id: Uuid) -> AppResult<Option<DailyReport>> {
        self.find_report(id).await
    }

    async fn update_report(&mut self, report: &DailyReport) -> AppResult<()> {
        let stored = self
            .work
            .reports
            .iter_mut()
            .find(|r| r.id == report.id)
            .ok_or_else(|| not_found("Daily report"))?;
        *stored = report.clone();
        Ok(())
    }

    async fn list_reports(&mut self, pagination: &Pagination) -> AppResult<Vec<DailyReport>> {
        let mut reports: Vec<&DailyReport> = self.work.reports.iter().collect();
        reports.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.created_at.cmp(&a.created_at)));
        Ok(paginate(reports, pagination))
    }

    async fn count_reports(&mut self) -> AppResult<u64> {
        Ok(self.work.reports.len() as u64)
    }

    async fn delete_report(&mut self, id: Uuid) -> AppResult<()> {
        self.work.reports.retain(|r| r.id != id);
        self.work.groups.retain(|(r, _)| *r != id);
        self.work.checklists.remove(&id);
        for unit in self
            .work
            .units
            .iter_mut()
            .filter(|u| u.daily_report_id == Some(id))
        {
            unit.daily_report_id = None;
        }
        Ok(())
    }

    async fn replace_groups(&mut self, report_id: Uuid, groups: &[GeneratorGroup]) -> AppResult<()> {
        self.work.groups.retain(|(r, _)| *r != report_id);
        self.work
            .groups
            .extend(groups.iter().cloned().map(|g| (report_id, g)));
        Ok(())
    }

    async fn groups(&mut self, report_id: Uuid) -> AppResult<Vec<GeneratorGroup>> {
        let mut groups: Vec<GeneratorGroup> = self
            .work
            .groups
            .iter()
            .filter(|(r, _)| *r == report_id)
            .map(|(_, g)| g.clone())
            .collect();
        groups.sort_by_key(|g| g.group_number);
        Ok(groups)
    }

    async fn upsert_checklist(&mut self, report_id: Uuid, checklist: &Checklist) -> AppResult<()> {
        self.work.checklists.insert(report_id, checklist.clone());
        Ok(())
    }

    async fn checklist(&mut self, report_id: Uuid) -> AppResult<Option<Checklist>> {
        Ok(self.work.checklists.get(&report_id).cloned())
    }
}

#[async_trait]
impl SalesOrderRepository for MemoryTx {
    async fn insert_order(
        &mut self,
        order: &NewSalesOrder,
        lines: &[(String, Decimal)],
    ) -> AppResult<(SalesOrder, Vec<SalesOrderLine>)> {
        let order = SalesOrder {
            id: Uuid::new_v4(),
            date: order.date,
            customer: order.customer.clone(),
            final_customer: order.final_customer.clone(),
            sale_code: order.sale_code.clone(),
            observations: order.observations.clone(),
            responsible: order.responsible.clone(),
            status: SalesOrderStatus::Open,
            created_at: order.created_at,
        };
        let lines: Vec<SalesOrderLine> = lines
            .iter()
            .map(|(product, quantity)| SalesOrderLine {
                id: Uuid::new_v4(),
                order_id: order.id,
                product: product.clone(),
                initial_quantity: *quantity,
                remaining_quantity: *quantity,
            })
            .collect();
        self.work.orders.push(order.clone());
        self.work.lines.extend(lines.iter().cloned());
        Ok((order, lines))
    }

    async fn find_order(&mut self, id: Uuid) -> AppResult<Option<SalesOrder>> {
        Ok(self.work.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn lock_order(&mut self, id: Uuid) -> AppResult<Option<SalesOrder>> {
        self.find_order(id).await
    }

    async fn order_lines(&mut self, order_id: Uuid) -> AppResult<Vec<SalesOrderLine>> {
        let mut lines: Vec<SalesOrderLine> = self
            .work
            .lines
            .iter()
            .filter(|l| l.order_id == order_id)
            .cloned()
            .collect();
        lines.sort_by(|a, b| a.product.cmp(&b.product));
        Ok(lines)
    }

    async fn update_line_remaining(&mut self, line_id: Uuid, remaining: Decimal) -> AppResult<()> {
        let line = self
            .work
            .lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or_else(|| not_found("Sales order line"))?;
        if remaining < Decimal::ZERO || remaining > line.initial_quantity {
            return Err(AppError::Internal(format!(
                "remaining {} outside [0, {}]",
                remaining, line.initial_quantity
            )));
        }
        line.remaining_quantity = remaining;
        Ok(())
    }

    async fn set_order_status(&mut self, id: Uuid, status: SalesOrderStatus) -> AppResult<()> {
        let order = self
            .work
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| not_found("Sales order"))?;
        order.status = status;
        Ok(())
    }

    async fn list_orders(
        &mut self,
        status: Option<SalesOrderStatus>,
        pagination: &Pagination,
    ) -> AppResult<Vec<SalesOrder>> {
        let mut orders: Vec<&SalesOrder> = self
            .work
            .orders
            .iter()
            .filter(|o| status.map_or(true, |s| o.status == s))
            .collect();
        orders.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.created_at.cmp(&a.created_at)));
        Ok(paginate(orders, pagination))
    }

    async fn count_orders(&mut self, status: Option<SalesOrderStatus>) -> AppResult<u64> {
        Ok(self
            .work
            .orders
            .iter()
            .filter(|o| status.map_or(true, |s| o.status == s))
            .count() as u64)
    }

    async fn delete_order(&mut self, id: Uuid) -> AppResult<()> {
        let dispatch_ids: HashSet<Uuid> = self
            .work
            .dispatches
            .iter()
            .filter(|d| d.order_id == id)
            .map(|d| d.id)
            .collect();
        let state = &mut self.work;
        state.details.retain(|d| {
            let removed = dispatch_ids.contains(&d.dispatch_id);
            if removed && !d.manual {
                state.claimed_codes.remove(&d.unit_code);
            }
            !removed
        });
        state.dispatches.retain(|d| d.order_id != id);
        state.lines.retain(|l| l.order_id != id);
        state.orders.retain(|o| o.id != id);
        Ok(())
    }
}

#[async_trait]
impl DispatchRepository for MemoryTx {
    async fn insert_dispatch(&mut self, dispatch: &NewDispatch) -> AppResult<Dispatch> {
        if !self.work.orders.iter().any(|o| o.id == dispatch.order_id) {
            return Err(not_found("Sales order"));
        }
        let dispatch = Dispatch {
            id: Uuid::new_v4(),
            order_id: dispatch.order_id,
            dispatched_at: dispatch.dispatched_at,
            responsible: dispatch.responsible.clone(),
            observations: dispatch.observations.clone(),
        };
        self.work.dispatches.push(dispatch.clone());
        Ok(dispatch)
    }

    async fn insert_detail(&mut self, detail: &NewDispatchDetail) -> AppResult<DispatchDetail> {
        if !detail.manual && !self.work.claimed_codes.insert(detail.unit_code.clone()) {
            return Err(AppError::AlreadyDispatched(detail.unit_code.clone()));
        }
        let detail = DispatchDetail {
            id: Uuid::new_v4(),
            dispatch_id: detail.dispatch_id,
            unit_code: detail.unit_code.clone(),
            product: detail.product.clone(),
            weight_kg: detail.weight_kg,
            seal: detail.seal.clone(),
            manual: detail.manual,
        };
        self.work.details.push(detail.clone());
        Ok(detail)
    }

    async fn find_dispatch(&mut self, id: Uuid) -> AppResult<Option<Dispatch>> {
        Ok(self.work.dispatches.iter().find(|d| d.id == id).cloned())
    }

    async fn detail_for_unit(&mut self, code: &str) -> AppResult<Option<DispatchDetail>> {
        Ok(self
            .work
            .details
            .iter()
            .find(|d| !d.manual && d.unit_code == code)
            .cloned())
    }

    async fn dispatch_rows_for_order(&mut self, order_id: Uuid) -> AppResult<Vec<DispatchRow>> {
        let mut dispatches: Vec<&Dispatch> = self
            .work
            .dispatches
            .iter()
            .filter(|d| d.order_id == order_id)
            .collect();
        dispatches.sort_by_key(|d| d.dispatched_at);

        let mut rows = Vec::new();
        for dispatch in dispatches {
            let mut details = self
                .work
                .details
                .iter()
                .filter(|d| d.dispatch_id == dispatch.id)
                .peekable();
            if details.peek().is_none() {
                rows.push(DispatchRow {
                    dispatch: dispatch.clone(),
                    detail: None,
                });
            }
            for detail in details {
                rows.push(DispatchRow {
                    dispatch: dispatch.clone(),
                    detail: Some(detail.clone()),
                });
            }
        }
        Ok(rows)
    }

    async fn dispatched_totals(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AppResult<Vec<DispatchedProductTotal>> {
        let in_window: HashSet<Uuid> = self
            .work
            .dispatches
            .iter()
            .filter(|d| d.dispatched_at >= start && d.dispatched_at < end)
            .map(|d| d.id)
            .collect();

        let mut totals: BTreeMap<&str, DispatchedProductTotal> = BTreeMap::new();
        for detail in self
            .work
            .details
            .iter()
            .filter(|d| in_window.contains(&d.dispatch_id))
        {
            let entry = totals
                .entry(detail.product.as_str())
                .or_insert_with(|| DispatchedProductTotal {
                    product: detail.product.clone(),
                    unit_count: 0,
                    manual_line_count: 0,
                    total_weight_kg: Decimal::ZERO,
                });
            if detail.manual {
                entry.manual_line_count += 1;
            } else {
                entry.unit_count += 1;
            }
            entry.total_weight_kg += detail.weight_kg;
        }
        Ok(totals.into_values().collect())
    }
}

#[async_trait]
impl MovementRepository for MemoryTx {
    async fn insert_movement(&mut self, movement: &NewStockMovement) -> AppResult<StockMovement> {
        let movement = StockMovement {
            id: Uuid::new_v4(),
            movement_kind: movement.movement_kind,
            item_kind: movement.item_kind,
            item_id: movement.item_id,
            quantity: movement.quantity,
            stock_before: movement.stock_before,
            stock_after: movement.stock_after,
            warehouse: movement.warehouse.clone(),
            unit_price: movement.unit_price,
            responsible: movement.responsible.clone(),
            system_user: movement.system_user.clone(),
            observations: movement.observations.clone(),
            created_at: movement.created_at,
        };
        self.work.movements.push(movement.clone());
        Ok(movement)
    }

    async fn list_movements(
        &mut self,
        filter: &MovementFilter,
        pagination: &Pagination,
    ) -> AppResult<Vec<StockMovement>> {
        let movements: Vec<&StockMovement> = self
            .work
            .movements
            .iter()
            .rev()
            .filter(|m| filter.matches(m))
            .collect();
        Ok(paginate(movements, pagination))
    }

    async fn count_movements(&mut self, filter: &MovementFilter) -> AppResult<u64> {
        Ok(self
            .work
            .movements
            .iter()
            .filter(|m| filter.matches(m))
            .count() as u64)
    }

    async fn item_movements(
        &mut self,
        kind: ItemKind,
        item_id: Uuid,
    ) -> AppResult<Vec<StockMovement>> {
        Ok(self
            .work
            .movements
            .iter()
            .filter(|m| m.item_kind == kind && m.item_id == item_id)
            .cloned()
            .collect())
    }
}
