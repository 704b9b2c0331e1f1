//! Persistence port
//!
//! Every mutating service operation runs inside one [`Tx`]. A transaction bundles
//! all repositories, so a dispatch (header, details, unit flags, order lines) or a
//! stock adjustment (ledger change plus movement row) either commits as a whole or
//! leaves nothing behind.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use shared::codes::SequenceState;
use shared::{
    BaggedUnit, BaggedUnitFilter, Checklist, DailyReport, Dispatch, DispatchDetail, DispatchRow,
    DispatchedProductTotal, GeneratorGroup, Good, ItemKind, Kit, KitComponent, MovementFilter,
    NewBaggedUnit, NewDailyReport, NewDispatch, NewDispatchDetail, NewGood, NewKit,
    NewSalesOrder, NewStockMovement, Pagination, ProductionTotal, SalesOrder, SalesOrderLine,
    SalesOrderStatus, StockMovement,
};
use uuid::Uuid;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Opens transactions
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn Tx>>;

    /// Cheap connectivity probe for the health endpoint
    async fn ping(&self) -> bool;
}

/// The singleton "last sequence + last date" record behind bagged-unit codes
#[async_trait]
pub trait SequenceRepository {
    /// Read the record, holding a lock on it until the transaction ends
    async fn lock_sequence(&mut self) -> AppResult<SequenceState>;

    async fn save_sequence(&mut self, state: SequenceState) -> AppResult<()>;
}

/// Goods, kits and the stored stock of goods
#[async_trait]
pub trait StockRepository {
    async fn item_code_exists(&mut self, code: &str) -> AppResult<bool>;

    async fn insert_good(&mut self, good: &NewGood) -> AppResult<Good>;

    async fn find_good(&mut self, id: Uuid) -> AppResult<Option<Good>>;

    /// Like `find_good`, but the row stays locked until the transaction ends
    async fn lock_good(&mut self, id: Uuid) -> AppResult<Option<Good>>;

    async fn list_goods(&mut self, pagination: &Pagination) -> AppResult<Vec<Good>>;

    async fn count_goods(&mut self) -> AppResult<u64>;

    async fn all_goods(&mut self) -> AppResult<Vec<Good>>;

    async fn set_good_stock(&mut self, id: Uuid, stock: Decimal) -> AppResult<()>;

    async fn insert_kit(&mut self, kit: &NewKit) -> AppResult<Kit>;

    async fn find_kit(&mut self, id: Uuid) -> AppResult<Option<Kit>>;

    /// Bill of materials joined with each component's current stock
    async fn kit_components(&mut self, kit_id: Uuid) -> AppResult<Vec<KitComponent>>;
}

#[async_trait]
pub trait BaggedUnitRepository {
    async fn insert_unit(&mut self, unit: &NewBaggedUnit) -> AppResult<BaggedUnit>;

    async fn find_unit(&mut self, code: &str) -> AppResult<Option<BaggedUnit>>;

    async fn list_units(
        &mut self,
        filter: &BaggedUnitFilter,
        pagination: &Pagination,
    ) -> AppResult<Vec<BaggedUnit>>;

    async fn count_units(&mut self, filter: &BaggedUnitFilter) -> AppResult<u64>;

    async fn unassociated_units(&mut self) -> AppResult<Vec<BaggedUnit>>;

    async fn units_for_report(&mut self, report_id: Uuid) -> AppResult<Vec<BaggedUnit>>;

    /// Point every currently unassociated unit at `report_id`, returning the claimed units
    async fn claim_unassociated(&mut self, report_id: Uuid) -> AppResult<Vec<BaggedUnit>>;

    async fn set_unit_report(&mut self, code: &str, report_id: Option<Uuid>) -> AppResult<()>;

    /// Clear the association of every unit of `report_id`
    async fn release_report_units(&mut self, report_id: Uuid) -> AppResult<u64>;

    async fn mark_dispatched(&mut self, code: &str) -> AppResult<()>;

    async fn delete_unit(&mut self, code: &str) -> AppResult<()>;

    /// Per-product totals of units produced in `[start, end)`
    async fn production_totals(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AppResult<Vec<ProductionTotal>>;
}

#[async_trait]
pub trait DailyReportRepository {
    async fn insert_report(&mut self, report: &NewDailyReport) -> AppResult<DailyReport>;

    async fn find_report(&mut self, id: Uuid) -> AppResult<Option<DailyReport>>;

    async fn lock_report(&mut self, id: Uuid) -> AppResult<Option<DailyReport>>;

    /// Overwrite header fields, telemetry and approval state
    async fn update_report(&mut self, report: &DailyReport) -> AppResult<()>;

    async fn list_reports(&mut self, pagination: &Pagination) -> AppResult<Vec<DailyReport>>;

    async fn count_reports(&mut self) -> AppResult<u64>;

    async fn delete_report(&mut self, id: Uuid) -> AppResult<()>;

    async fn replace_groups(&mut self, report_id: Uuid, groups: &[GeneratorGroup]) -> AppResult<()>;

    async fn groups(&mut self, report_id: Uuid) -> AppResult<Vec<GeneratorGroup>>;

    async fn upsert_checklist(&mut self, report_id: Uuid, checklist: &Checklist) -> AppResult<()>;

    async fn checklist(&mut self, report_id: Uuid) -> AppResult<Option<Checklist>>;
}

#[async_trait]
pub trait SalesOrderRepository {
    async fn insert_order(
        &mut self,
        order: &NewSalesOrder,
        lines: &[(String, Decimal)],
    ) -> AppResult<(SalesOrder, Vec<SalesOrderLine>)>;

    async fn find_order(&mut self, id: Uuid) -> AppResult<Option<SalesOrder>>;

    async fn lock_order(&mut self, id: Uuid) -> AppResult<Option<SalesOrder>>;

    async fn order_lines(&mut self, order_id: Uuid) -> AppResult<Vec<SalesOrderLine>>;

    async fn update_line_remaining(&mut self, line_id: Uuid, remaining: Decimal) -> AppResult<()>;

    async fn set_order_status(&mut self, id: Uuid, status: SalesOrderStatus) -> AppResult<()>;

    async fn list_orders(
        &mut self,
        status: Option<SalesOrderStatus>,
        pagination: &Pagination,
    ) -> AppResult<Vec<SalesOrder>>;

    async fn count_orders(&mut self, status: Option<SalesOrderStatus>) -> AppResult<u64>;

    /// Removes the order with its lines and dispatches
    async fn delete_order(&mut self, id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait DispatchRepository {
    async fn insert_dispatch(&mut self, dispatch: &NewDispatch) -> AppResult<Dispatch>;

    /// Fails with `AlreadyDispatched` when a non-manual detail already holds the unit code
    async fn insert_detail(&mut self, detail: &NewDispatchDetail) -> AppResult<DispatchDetail>;

    async fn find_dispatch(&mut self, id: Uuid) -> AppResult<Option<Dispatch>>;

    async fn detail_for_unit(&mut self, code: &str) -> AppResult<Option<DispatchDetail>>;

    /// Header LEFT JOIN details, oldest dispatch first
    async fn dispatch_rows_for_order(&mut self, order_id: Uuid) -> AppResult<Vec<DispatchRow>>;

    /// Per-product totals of details whose dispatch falls in `[start, end)`
    async fn dispatched_totals(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AppResult<Vec<DispatchedProductTotal>>;
}

#[async_trait]
pub trait MovementRepository {
    async fn insert_movement(&mut self, movement: &NewStockMovement) -> AppResult<StockMovement>;

    /// Newest first
    async fn list_movements(
        &mut self,
        filter: &MovementFilter,
        pagination: &Pagination,
    ) -> AppResult<Vec<StockMovement>>;

    async fn count_movements(&mut self, filter: &MovementFilter) -> AppResult<u64>;

    /// Oldest first
    async fn item_movements(&mut self, kind: ItemKind, item_id: Uuid)
        -> AppResult<Vec<StockMovement>>;
}

/// One unit of work over every repository
#[async_trait]
pub trait Tx:
    SequenceRepository
    + StockRepository
    + BaggedUnitRepository
    + DailyReportRepository
    + SalesOrderRepository
    + DispatchRepository
    + MovementRepository
    + Send
{
    async fn commit(self: Box<Self>) -> AppResult<()>;

    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Commit on success, roll back on failure, and hand the original result back
pub async fn finish<T>(tx: Box<dyn Tx>, result: AppResult<T>) -> AppResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!("Rollback failed: {:?}", rollback_err);
            }
            Err(err)
        }
    }
}

