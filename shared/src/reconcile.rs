//! Matching dispatched quantities against sales order lines

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::models::{LineUpdate, SalesOrderLine};

/// What to do when a product's dispatched quantity exceeds what remains on its line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverDispatchPolicy {
    /// Fail the whole dispatch
    #[default]
    Reject,
    /// Floor remaining at zero and report the excess
    Clamp,
}

/// Running per-product totals for one dispatch call
#[derive(Debug, Clone, Default)]
pub struct ProductTotals {
    totals: BTreeMap<String, Decimal>,
}

impl ProductTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, product: &str, quantity: Decimal) {
        *self.totals.entry(product.to_string()).or_insert(Decimal::ZERO) += quantity;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.totals.iter().map(|(p, q)| (p.as_str(), *q))
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, Decimal)> for ProductTotals {
    fn from_iter<I: IntoIterator<Item = (&'a str, Decimal)>>(iter: I) -> Self {
        let mut totals = ProductTotals::new();
        for (product, quantity) in iter {
            totals.add(product, quantity);
        }
        totals
    }
}

/// Compute the line updates for a dispatch; pure, nothing is written
pub fn plan_line_updates(
    lines: &[SalesOrderLine],
    totals: &ProductTotals,
    policy: OverDispatchPolicy,
) -> Result<Vec<LineUpdate>, DomainError> {
    let mut updates = Vec::new();
    for (product, dispatched) in totals.iter() {
        let line = lines
            .iter()
            .find(|l| l.product == product)
            .ok_or_else(|| DomainError::MissingOrderLine(product.to_string()))?;

        let before = line.remaining_quantity;
        let raw_after = before - dispatched;
        let (after, excess) = if raw_after >= Decimal::ZERO {
            (raw_after, Decimal::ZERO)
        } else {
            match policy {
                OverDispatchPolicy::Reject => {
                    return Err(DomainError::OverDispatch {
                        product: product.to_string(),
                        remaining: before,
                        requested: dispatched,
                    })
                }
                OverDispatchPolicy::Clamp => (Decimal::ZERO, -raw_after),
            }
        };

        updates.push(LineUpdate {
            line_id: line.id,
            product: product.to_string(),
            dispatched_kg: dispatched,
            remaining_before: before,
            remaining_after: after,
            excess_kg: excess,
        });
    }
    Ok(updates)
}

/// Lines as they will look once `updates` are written
pub fn apply_updates(lines: &[SalesOrderLine], updates: &[LineUpdate]) -> Vec<SalesOrderLine> {
    lines
        .iter()
        .map(|line| match updates.iter().find(|u| u.line_id == line.id) {
            Some(u) => SalesOrderLine {
                remaining_quantity: u.remaining_after,
                ..line.clone()
            },
            None => line.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::all_lines_fulfilled;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn line(product: &str, initial: i64, remaining: i64) -> SalesOrderLine {
        SalesOrderLine {
            id: Uuid::new_v4(),
            order_id: Uuid::nil(),
            product: product.into(),
            initial_quantity: Decimal::from(initial),
            remaining_quantity: Decimal::from(remaining),
        }
    }

    fn totals(items: &[(&str, i64)]) -> ProductTotals {
        items.iter().map(|(p, q)| (*p, Decimal::from(*q))).collect()
    }

    #[test]
    fn test_exact_quantity_fulfils_order() {
        let lines = vec![line("A", 100, 100)];
        let updates = plan_line_updates(
            &lines,
            &totals(&[("A", 40), ("A", 35), ("A", 25)]),
            OverDispatchPolicy::Reject,
        )
        .unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].dispatched_kg, Decimal::from(100));
        assert_eq!(updates[0].remaining_after, Decimal::ZERO);
        assert!(all_lines_fulfilled(&apply_updates(&lines, &updates)));
    }

    #[test]
    fn test_partial_quantity_leaves_remaining() {
        let lines = vec![line("A", 100, 100)];
        let updates =
            plan_line_updates(&lines, &totals(&[("A", 40), ("A", 35)]), OverDispatchPolicy::Reject)
                .unwrap();
        assert_eq!(updates[0].remaining_after, Decimal::from(25));
        assert!(!all_lines_fulfilled(&apply_updates(&lines, &updates)));
    }

    #[test]
    fn test_untouched_line_keeps_order_open() {
        let lines = vec![line("A", 10, 10), line("B", 5, 5)];
        let updates =
            plan_line_updates(&lines, &totals(&[("A", 10)]), OverDispatchPolicy::Reject).unwrap();
        let after = apply_updates(&lines, &updates);
        assert!(!all_lines_fulfilled(&after));
        assert_eq!(after[1].remaining_quantity, Decimal::from(5));
    }

    #[test]
    fn test_over_dispatch_rejected_or_clamped() {
        let lines = vec![line("A", 50, 20)];
        let err = plan_line_updates(&lines, &totals(&[("A", 30)]), OverDispatchPolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, DomainError::OverDispatch { .. }));

        let updates =
            plan_line_updates(&lines, &totals(&[("A", 30)]), OverDispatchPolicy::Clamp).unwrap();
        assert_eq!(updates[0].remaining_after, Decimal::ZERO);
        assert_eq!(updates[0].excess_kg, Decimal::from(10));
    }

    #[test]
    fn test_product_without_line_fails() {
        let lines = vec![line("A", 50, 50)];
        let err = plan_line_updates(&lines, &totals(&[("Z", 1)]), OverDispatchPolicy::Clamp)
            .unwrap_err();
        assert_eq!(err, DomainError::MissingOrderLine("Z".into()));
    }

    proptest! {
        #[test]
        fn prop_conservation(q in 1i64..10_000, weights in prop::collection::vec(1i64..500, 1..20)) {
            let lines = vec![line("A", q, q)];
            let dispatched: i64 = weights.iter().sum();
            let t: ProductTotals = weights.iter().map(|w| ("A", Decimal::from(*w))).collect();
            match plan_line_updates(&lines, &t, OverDispatchPolicy::Reject) {
                Ok(updates) => {
                    prop_assert!(dispatched <= q);
                    prop_assert_eq!(updates[0].remaining_after, Decimal::from(q - dispatched));
                    let after = apply_updates(&lines, &updates);
                    prop_assert_eq!(all_lines_fulfilled(&after), dispatched == q);
                }
                Err(_) => prop_assert!(dispatched > q),
            }
        }
    }
}
