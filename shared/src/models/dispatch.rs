//! Dispatch (despacho) models

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BaggedUnit;

/// Dispatch header; append-only once written
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dispatch {
    pub id: Uuid,
    pub order_id: Uuid,
    pub dispatched_at: NaiveDateTime,
    pub responsible: String,
    pub observations: Option<String>,
}

/// One dispatched unit, or one manual quantity line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchDetail {
    pub id: Uuid,
    pub dispatch_id: Uuid,
    /// Real bagged-unit code, or a synthetic `MANUAL-...` code
    pub unit_code: String,
    pub product: String,
    pub weight_kg: Decimal,
    pub seal: Option<String>,
    /// Manual lines are excluded from physical unit counts
    pub manual: bool,
}

/// Values for inserting a dispatch header
#[derive(Debug, Clone)]
pub struct NewDispatch {
    pub order_id: Uuid,
    pub dispatched_at: NaiveDateTime,
    pub responsible: String,
    pub observations: Option<String>,
}

/// Values for inserting a dispatch detail
#[derive(Debug, Clone)]
pub struct NewDispatchDetail {
    pub dispatch_id: Uuid,
    pub unit_code: String,
    pub product: String,
    pub weight_kg: Decimal,
    pub seal: Option<String>,
    pub manual: bool,
}

/// Row of the dispatch-header LEFT JOIN detail query
#[derive(Debug, Clone)]
pub struct DispatchRow {
    pub dispatch: Dispatch,
    pub detail: Option<DispatchDetail>,
}

/// Dispatch with its nested details
#[derive(Debug, Clone, Serialize)]
pub struct DispatchWithDetails {
    #[serde(flatten)]
    pub dispatch: Dispatch,
    pub details: Vec<DispatchDetail>,
}

/// Group joined rows under their dispatch header, keeping first-seen order.
///
/// Headers without details (null side of the join) still appear with an empty list.
pub fn group_dispatch_rows(rows: Vec<DispatchRow>) -> Vec<DispatchWithDetails> {
    let mut grouped: Vec<DispatchWithDetails> = Vec::new();
    for row in rows {
        let idx = match grouped.iter().position(|d| d.dispatch.id == row.dispatch.id) {
            Some(idx) => idx,
            None => {
                grouped.push(DispatchWithDetails {
                    dispatch: row.dispatch,
                    details: Vec::new(),
                });
                grouped.len() - 1
            }
        };
        if let Some(detail) = row.detail {
            grouped[idx].details.push(detail);
        }
    }
    grouped
}

/// Per-product line change produced by one dispatch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineUpdate {
    pub line_id: Uuid,
    pub product: String,
    pub dispatched_kg: Decimal,
    pub remaining_before: Decimal,
    pub remaining_after: Decimal,
    /// Quantity beyond what remained; non-zero only under the clamp policy
    pub excess_kg: Decimal,
}

/// Outcome of a dispatch call
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub dispatch_id: Uuid,
    pub order_id: Uuid,
    pub dispatched_count: usize,
    pub updates: Vec<LineUpdate>,
    pub order_complete: bool,
}

/// Pre-flight answer for "is this unit already dispatched?"
#[derive(Debug, Clone, Serialize)]
pub struct UnitDispatchStatus {
    pub unit: BaggedUnit,
    pub dispatched: bool,
    pub dispatch: Option<Dispatch>,
}

/// Dispatched totals for one product within an operating day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchedProductTotal {
    pub product: String,
    /// Physical units only (manual lines excluded)
    pub unit_count: i64,
    pub manual_line_count: i64,
    /// Weight of all lines, manual included
    pub total_weight_kg: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn header(id: Uuid) -> Dispatch {
        Dispatch {
            id,
            order_id: Uuid::nil(),
            dispatched_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            responsible: "op".into(),
            observations: None,
        }
    }

    fn detail(dispatch_id: Uuid, code: &str) -> DispatchDetail {
        DispatchDetail {
            id: Uuid::new_v4(),
            dispatch_id,
            unit_code: code.into(),
            product: "A".into(),
            weight_kg: Decimal::from(10),
            seal: None,
            manual: false,
        }
    }

    #[test]
    fn test_grouping_keeps_empty_dispatches() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let rows = vec![
            DispatchRow { dispatch: header(a), detail: Some(detail(a, "1")) },
            DispatchRow { dispatch: header(b), detail: None },
            DispatchRow { dispatch: header(a), detail: Some(detail(a, "2")) },
        ];
        let grouped = group_dispatch_rows(rows);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].dispatch.id, a);
        assert_eq!(grouped[0].details.len(), 2);
        assert_eq!(grouped[1].dispatch.id, b);
        assert!(grouped[1].details.is_empty());
    }
}
