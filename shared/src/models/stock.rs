//! Stock ledger and movement models

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Kind of stock item a movement refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Good (bien), stock stored directly
    Good,
    /// Kit, stock derived from its components
    Kit,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Good => "good",
            ItemKind::Kit => "kit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "good" => Some(ItemKind::Good),
            "kit" => Some(ItemKind::Kit),
            _ => None,
        }
    }
}

/// Movement kind; ENTRADA and AJUSTE_ENTRADA add, SALIDA and AJUSTE_SALIDA subtract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementKind {
    #[serde(rename = "ENTRADA")]
    Entry,
    #[serde(rename = "SALIDA")]
    Exit,
    #[serde(rename = "AJUSTE_ENTRADA")]
    AdjustmentEntry,
    #[serde(rename = "AJUSTE_SALIDA")]
    AdjustmentExit,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Entry => "ENTRADA",
            MovementKind::Exit => "SALIDA",
            MovementKind::AdjustmentEntry => "AJUSTE_ENTRADA",
            MovementKind::AdjustmentExit => "AJUSTE_SALIDA",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ENTRADA" => Some(MovementKind::Entry),
            "SALIDA" => Some(MovementKind::Exit),
            "AJUSTE_ENTRADA" => Some(MovementKind::AdjustmentEntry),
            "AJUSTE_SALIDA" => Some(MovementKind::AdjustmentExit),
            _ => None,
        }
    }

    pub fn is_inbound(&self) -> bool {
        matches!(self, MovementKind::Entry | MovementKind::AdjustmentEntry)
    }

    /// Stock after applying `quantity`; subtracting below zero is an error, never clamped
    pub fn apply(&self, item: &str, before: Decimal, quantity: Decimal) -> Result<Decimal, DomainError> {
        if quantity <= Decimal::ZERO {
            return Err(DomainError::invalid("quantity", "quantity must be greater than 0"));
        }
        if self.is_inbound() {
            Ok(before + quantity)
        } else {
            checked_decrement(item, before, quantity)
        }
    }

    /// Signed delta for display, e.g. "+5" or "-2.5"
    pub fn signed_delta(&self, quantity: Decimal) -> String {
        let q = quantity.normalize();
        if self.is_inbound() {
            format!("+{}", q)
        } else {
            format!("-{}", q)
        }
    }
}

/// `current - delta`, failing instead of going negative
pub fn checked_decrement(item: &str, current: Decimal, delta: Decimal) -> Result<Decimal, DomainError> {
    let next = current - delta;
    if next < Decimal::ZERO {
        return Err(DomainError::InsufficientStock {
            item: item.to_string(),
            available: current,
            requested: delta,
        });
    }
    Ok(next)
}

/// True exactly when a decrement moves stock from above the threshold to at-or-below it
pub fn crosses_critical(previous: Decimal, current: Decimal, threshold: Option<Decimal>) -> bool {
    match threshold {
        Some(t) => previous > t && current <= t,
        None => false,
    }
}

/// Good (bien) with stored stock
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Good {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub stock: Decimal,
    pub critical_stock: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub created_at: NaiveDateTime,
}

/// Values for inserting a good
#[derive(Debug, Clone)]
pub struct NewGood {
    pub code: String,
    pub name: String,
    pub stock: Decimal,
    pub critical_stock: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub created_at: NaiveDateTime,
}

/// Kit header; kits never store stock
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Kit {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub created_at: NaiveDateTime,
}

/// Values for inserting a kit and its bill of materials
#[derive(Debug, Clone)]
pub struct NewKit {
    pub code: String,
    pub name: String,
    pub components: Vec<(Uuid, Decimal)>,
    pub created_at: NaiveDateTime,
}

/// Component of a kit joined with the component's current stock
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KitComponent {
    pub good_id: Uuid,
    pub good_code: String,
    pub good_name: String,
    pub quantity_per_kit: Decimal,
    pub stock: Decimal,
}

/// Kits producible from component stock: min over components of floor(stock / per-kit)
pub fn kit_available_stock(components: &[KitComponent]) -> Decimal {
    components
        .iter()
        .map(|c| {
            if c.quantity_per_kit <= Decimal::ZERO {
                Decimal::ZERO
            } else {
                (c.stock / c.quantity_per_kit).floor()
            }
        })
        .min()
        .unwrap_or(Decimal::ZERO)
}

/// Kit with its components and derived stock
#[derive(Debug, Clone, Serialize)]
pub struct KitWithStock {
    #[serde(flatten)]
    pub kit: Kit,
    pub components: Vec<KitComponent>,
    pub available_stock: Decimal,
}

impl KitWithStock {
    pub fn new(kit: Kit, components: Vec<KitComponent>) -> Self {
        let available_stock = kit_available_stock(&components);
        Self {
            kit,
            components,
            available_stock,
        }
    }
}

/// Immutable audit row of a stock change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockMovement {
    pub id: Uuid,
    pub movement_kind: MovementKind,
    pub item_kind: ItemKind,
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub stock_before: Decimal,
    pub stock_after: Decimal,
    pub warehouse: Option<String>,
    pub unit_price: Option<Decimal>,
    pub responsible: String,
    pub system_user: String,
    pub observations: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Values for inserting a movement
#[derive(Debug, Clone)]
pub struct NewStockMovement {
    pub movement_kind: MovementKind,
    pub item_kind: ItemKind,
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub stock_before: Decimal,
    pub stock_after: Decimal,
    pub warehouse: Option<String>,
    pub unit_price: Option<Decimal>,
    pub responsible: String,
    pub system_user: String,
    pub observations: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Movement history filters; dates are inclusive calendar days
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementFilter {
    pub movement_kind: Option<MovementKind>,
    pub item_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl MovementFilter {
    pub fn matches(&self, m: &StockMovement) -> bool {
        self.movement_kind.map_or(true, |k| m.movement_kind == k)
            && self.item_id.map_or(true, |id| m.item_id == id)
            && self.date_from.map_or(true, |d| m.created_at.date() >= d)
            && self.date_to.map_or(true, |d| m.created_at.date() <= d)
    }
}

/// Result of a stock adjustment
#[derive(Debug, Clone, Serialize)]
pub struct MovementResult {
    pub movement: StockMovement,
    pub stock_before: Decimal,
    pub stock_after: Decimal,
    pub delta: String,
}

/// Alert raised when a good crosses its critical threshold
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CriticalStockAlert {
    pub good_id: Uuid,
    pub code: String,
    pub name: String,
    pub stock: Decimal,
    pub critical_stock: Decimal,
}

/// Stock of one good at the end of an operating day
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StockSnapshotEntry {
    pub good_id: Uuid,
    pub code: String,
    pub name: String,
    pub stock: Decimal,
}

/// Stock at `cutoff` from one item's movements (ascending by time).
///
/// Uses the last movement before the cutoff, else the first movement after it,
/// else the current stock.
pub fn stock_at(current: Decimal, movements: &[StockMovement], cutoff: NaiveDateTime) -> Decimal {
    if let Some(last) = movements.iter().rev().find(|m| m.created_at < cutoff) {
        return last.stock_after;
    }
    movements
        .iter()
        .find(|m| m.created_at >= cutoff)
        .map(|m| m.stock_before)
        .unwrap_or(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn component(stock: i64, per_kit: i64) -> KitComponent {
        KitComponent {
            good_id: Uuid::new_v4(),
            good_code: "BIEN-000001".into(),
            good_name: "x".into(),
            quantity_per_kit: Decimal::from(per_kit),
            stock: Decimal::from(stock),
        }
    }

    #[test]
    fn test_kit_stock_is_min_of_floors() {
        let components = vec![component(10, 2), component(9, 3)];
        assert_eq!(kit_available_stock(&components), Decimal::from(3));
    }

    #[test]
    fn test_kit_without_components_has_zero_stock() {
        assert_eq!(kit_available_stock(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_kit_stock_floors_fractions() {
        let components = vec![KitComponent {
            quantity_per_kit: Decimal::new(15, 1),
            stock: Decimal::from(4),
            ..component(0, 1)
        }];
        assert_eq!(kit_available_stock(&components), Decimal::from(2));
    }

    #[test]
    fn test_movement_sign_convention() {
        let before = Decimal::from(10);
        let q = Decimal::from(4);
        assert_eq!(MovementKind::Entry.apply("x", before, q).unwrap(), Decimal::from(14));
        assert_eq!(MovementKind::AdjustmentEntry.apply("x", before, q).unwrap(), Decimal::from(14));
        assert_eq!(MovementKind::Exit.apply("x", before, q).unwrap(), Decimal::from(6));
        assert_eq!(MovementKind::AdjustmentExit.apply("x", before, q).unwrap(), Decimal::from(6));
    }

    #[test]
    fn test_exit_below_zero_fails() {
        let err = MovementKind::Exit
            .apply("BIEN-000001", Decimal::from(3), Decimal::from(5))
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                item: "BIEN-000001".into(),
                available: Decimal::from(3),
                requested: Decimal::from(5),
            }
        );
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        assert!(MovementKind::Entry.apply("x", Decimal::ONE, Decimal::ZERO).is_err());
        assert!(MovementKind::Exit.apply("x", Decimal::ONE, Decimal::from(-1)).is_err());
    }

    #[test]
    fn test_signed_delta() {
        assert_eq!(MovementKind::Entry.signed_delta(Decimal::new(500, 2)), "+5");
        assert_eq!(MovementKind::AdjustmentExit.signed_delta(Decimal::new(25, 1)), "-2.5");
    }

    #[test]
    fn test_critical_crossing_only_once() {
        let t = Some(Decimal::from(5));
        assert!(crosses_critical(Decimal::from(6), Decimal::from(5), t));
        assert!(crosses_critical(Decimal::from(10), Decimal::from(1), t));
        // already below: no new crossing
        assert!(!crosses_critical(Decimal::from(5), Decimal::from(4), t));
        assert!(!crosses_critical(Decimal::from(3), Decimal::from(2), t));
        // stays above
        assert!(!crosses_critical(Decimal::from(9), Decimal::from(6), t));
        assert!(!crosses_critical(Decimal::from(9), Decimal::ZERO, None));
    }

    #[test]
    fn test_movement_kind_wire_names() {
        let k: MovementKind = serde_json::from_str("\"AJUSTE_SALIDA\"").unwrap();
        assert_eq!(k, MovementKind::AdjustmentExit);
        assert_eq!(MovementKind::from_str(k.as_str()), Some(k));
    }

    fn movement(at_hour: u32, before: i64, after: i64) -> StockMovement {
        StockMovement {
            id: Uuid::new_v4(),
            movement_kind: MovementKind::Entry,
            item_kind: ItemKind::Good,
            item_id: Uuid::nil(),
            quantity: Decimal::from((after - before).abs()),
            stock_before: Decimal::from(before),
            stock_after: Decimal::from(after),
            warehouse: None,
            unit_price: None,
            responsible: "r".into(),
            system_user: "u".into(),
            observations: None,
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(at_hour, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_stock_at_cutoff() {
        let cutoff = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let movements = vec![movement(8, 0, 10), movement(11, 10, 7), movement(15, 7, 20)];
        assert_eq!(stock_at(Decimal::from(20), &movements, cutoff), Decimal::from(7));
        assert_eq!(stock_at(Decimal::from(20), &movements[2..], cutoff), Decimal::from(7));
        assert_eq!(stock_at(Decimal::from(20), &[], cutoff), Decimal::from(20));
    }

    proptest! {
        #[test]
        fn prop_decrement_never_negative(current in 0i64..10_000, delta in 0i64..20_000) {
            let current = Decimal::from(current);
            let delta = Decimal::from(delta);
            match checked_decrement("x", current, delta) {
                Ok(next) => {
                    prop_assert!(next >= Decimal::ZERO);
                    prop_assert_eq!(next, current - delta);
                }
                Err(_) => prop_assert!(delta > current),
            }
        }

        #[test]
        fn prop_kit_stock_is_buildable(
            parts in prop::collection::vec((0i64..500, 1i64..20), 1..6)
        ) {
            let components: Vec<KitComponent> =
                parts.iter().map(|(s, q)| component(*s, *q)).collect();
            let kits = kit_available_stock(&components);
            for c in &components {
                // kits can be built from each component...
                prop_assert!(kits * c.quantity_per_kit <= c.stock);
            }
            // ...and one more cannot be built from at least one of them
            prop_assert!(components
                .iter()
                .any(|c| (kits + Decimal::ONE) * c.quantity_per_kit > c.stock));
        }
    }
}
