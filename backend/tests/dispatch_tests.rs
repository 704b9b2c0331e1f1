//! Dispatch engine tests
//!
//! Runs the dispatch service against the in-memory store:
//! - end-to-end fulfilment of a sales order
//! - all-or-nothing behaviour of a failed dispatch
//! - rejection of double dispatch, also under concurrency
//! - over-dispatch policies and manual dispatch

mod common;

use almacen_backend::config::DispatchConfig;
use almacen_backend::error::AppError;
use almacen_backend::services::dispatch::{DispatchInput, ManualDispatchInput, ManualLineInput};
use almacen_backend::Config;
use chrono::Duration;
use common::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::codes::is_manual_code;
use shared::reconcile::OverDispatchPolicy;
use shared::SalesOrderStatus;
use uuid::Uuid;

fn scan<S: AsRef<str>>(order_id: Uuid, codes: &[S]) -> DispatchInput {
    DispatchInput {
        order_id,
        unit_codes: codes.iter().map(|c| c.as_ref().to_string()).collect(),
        observations: None,
    }
}

// ============================================================================
// End-to-end
// ============================================================================

#[tokio::test]
async fn test_dispatch_fulfils_order_exactly() {
    let app = TestApp::new();
    let order = app.order(&[("A", "100")]).await;
    let u1 = app.produce("A", "40").await;
    let u2 = app.produce("A", "35").await;
    let u3 = app.produce("A", "25").await;

    let result = app
        .state
        .dispatches()
        .dispatch(scan(order.order.id, &[&u1.code, &u2.code, &u3.code]), OPERATOR)
        .await
        .unwrap();

    assert_eq!(result.dispatched_count, 3);
    assert!(result.order_complete);
    assert_eq!(result.updates.len(), 1);
    assert_eq!(result.updates[0].dispatched_kg, dec("100"));
    assert_eq!(result.updates[0].remaining_after, Decimal::ZERO);

    let order = app.state.sales_orders().get(order.order.id).await.unwrap();
    assert_eq!(order.order.status, SalesOrderStatus::Complete);
    assert_eq!(order.lines[0].remaining_quantity, Decimal::ZERO);

    let history = app
        .state
        .dispatches()
        .dispatches_for_order(order.order.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].details.len(), 3);
    let total: Decimal = history[0].details.iter().map(|d| d.weight_kg).sum();
    assert_eq!(total, dec("100"));
}

#[tokio::test]
async fn test_partial_dispatch_leaves_order_open() {
    let app = TestApp::new();
    let order = app.order(&[("A", "100")]).await;
    let u1 = app.produce("A", "40").await;
    let u2 = app.produce("A", "35").await;
    app.produce("A", "25").await;

    let result = app
        .state
        .dispatches()
        .dispatch(scan(order.order.id, &[&u1.code, &u2.code]), OPERATOR)
        .await
        .unwrap();

    assert!(!result.order_complete);
    assert_eq!(result.updates[0].remaining_after, dec("25"));

    let order = app.state.sales_orders().get(order.order.id).await.unwrap();
    assert_eq!(order.order.status, SalesOrderStatus::Open);
    assert_eq!(order.lines[0].remaining_quantity, dec("25"));
    assert_eq!(order.lines[0].dispatched_quantity(), dec("75"));
}

#[tokio::test]
async fn test_multi_product_order_completes_when_every_line_is_zero() {
    let app = TestApp::new();
    let order = app.order(&[("A", "50"), ("B", "30")]).await;
    let a = app.produce("A", "50").await;
    let b = app.produce("B", "30").await;

    let first = app
        .state
        .dispatches()
        .dispatch(scan(order.order.id, &[&a.code]), OPERATOR)
        .await
        .unwrap();
    assert!(!first.order_complete);

    let second = app
        .state
        .dispatches()
        .dispatch(scan(order.order.id, &[&b.code]), OPERATOR)
        .await
        .unwrap();
    assert!(second.order_complete);
}

// ============================================================================
// Atomicity and double dispatch
// ============================================================================

#[tokio::test]
async fn test_unknown_code_rolls_back_whole_dispatch() {
    let app = TestApp::new();
    let order = app.order(&[("A", "100")]).await;
    let u1 = app.produce("A", "40").await;
    let u2 = app.produce("A", "35").await;

    let err = app
        .state
        .dispatches()
        .dispatch(scan(order.order.id, &[u1.code.as_str(), u2.code.as_str(), "999999999999"]), OPERATOR)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let order_after = app.state.sales_orders().get(order.order.id).await.unwrap();
    assert_eq!(order_after.lines[0].remaining_quantity, dec("100"));
    assert!(app
        .state
        .dispatches()
        .dispatches_for_order(order.order.id)
        .await
        .unwrap()
        .is_empty());

    for code in [&u1.code, &u2.code] {
        let unit = app.state.bagged_units().get(code).await.unwrap();
        assert!(!unit.dispatched);
    }
}

#[tokio::test]
async fn test_second_dispatch_of_same_unit_is_rejected() {
    let app = TestApp::new();
    let order = app.order(&[("A", "100")]).await;
    let unit = app.produce("A", "40").await;

    app.state
        .dispatches()
        .dispatch(scan(order.order.id, &[&unit.code]), OPERATOR)
        .await
        .unwrap();

    let err = app
        .state
        .dispatches()
        .dispatch(scan(order.order.id, &[&unit.code]), OPERATOR)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyDispatched(ref code) if *code == unit.code));

    let order = app.state.sales_orders().get(order.order.id).await.unwrap();
    assert_eq!(order.lines[0].remaining_quantity, dec("60"));
}

#[tokio::test]
async fn test_duplicate_code_in_one_request_is_rejected() {
    let app = TestApp::new();
    let order = app.order(&[("A", "100")]).await;
    let unit = app.produce("A", "40").await;

    let err = app
        .state
        .dispatches()
        .dispatch(scan(order.order.id, &[&unit.code, &unit.code]), OPERATOR)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyDispatched(_)));

    let unit = app.state.bagged_units().get(&unit.code).await.unwrap();
    assert!(!unit.dispatched);
}

#[tokio::test]
async fn test_concurrent_dispatches_of_one_unit_only_one_wins() {
    let app = TestApp::new();
    let order_a = app.order(&[("A", "100")]).await;
    let order_b = app.order(&[("A", "100")]).await;
    let unit = app.produce("A", "40").await;

    let first = app.state.dispatches();
    let second = app.state.dispatches();
    let (code_a, code_b) = (unit.code.clone(), unit.code.clone());
    let (id_a, id_b) = (order_a.order.id, order_b.order.id);

    let (ra, rb) = tokio::join!(
        tokio::spawn(async move { first.dispatch(scan(id_a, &[&code_a]), OPERATOR).await }),
        tokio::spawn(async move { second.dispatch(scan(id_b, &[&code_b]), OPERATOR).await }),
    );
    let outcomes = [ra.unwrap(), rb.unwrap()];

    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(AppError::AlreadyDispatched(_)))));
}

#[tokio::test]
async fn test_complete_order_accepts_no_more_dispatches() {
    let app = TestApp::new();
    let order = app.order(&[("A", "40")]).await;
    let u1 = app.produce("A", "40").await;
    let u2 = app.produce("A", "10").await;

    app.state
        .dispatches()
        .dispatch(scan(order.order.id, &[&u1.code]), OPERATOR)
        .await
        .unwrap();

    let err = app
        .state
        .dispatches()
        .dispatch(scan(order.order.id, &[&u2.code]), OPERATOR)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn test_product_without_order_line_is_rejected() {
    let app = TestApp::new();
    let order = app.order(&[("A", "100")]).await;
    let unit = app.produce("B", "20").await;

    let err = app
        .state
        .dispatches()
        .dispatch(scan(order.order.id, &[&unit.code]), OPERATOR)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let unit = app.state.bagged_units().get(&unit.code).await.unwrap();
    assert!(!unit.dispatched);
}

#[tokio::test]
async fn test_unit_status_before_and_after_dispatch() {
    let app = TestApp::new();
    let order = app.order(&[("A", "100")]).await;
    let unit = app.produce("A", "40").await;

    let before = app
        .state
        .dispatches()
        .unit_dispatch_status(&unit.code)
        .await
        .unwrap();
    assert!(!before.dispatched);
    assert!(before.dispatch.is_none());

    let result = app
        .state
        .dispatches()
        .dispatch(scan(order.order.id, &[&unit.code]), OPERATOR)
        .await
        .unwrap();

    let after = app
        .state
        .dispatches()
        .unit_dispatch_status(&unit.code)
        .await
        .unwrap();
    assert!(after.dispatched);
    assert_eq!(after.dispatch.map(|d| d.id), Some(result.dispatch_id));
}

// ============================================================================
// Over-dispatch policy
// ============================================================================

fn config_with(policy: OverDispatchPolicy, manual_enabled: bool) -> Config {
    let mut config = Config::in_memory();
    config.dispatch = DispatchConfig {
        over_dispatch: policy,
        manual_enabled,
    };
    config
}

#[tokio::test]
async fn test_over_dispatch_rejected_by_default() {
    let app = TestApp::new();
    let order = app.order(&[("A", "50")]).await;
    let u1 = app.produce("A", "40").await;
    let u2 = app.produce("A", "35").await;

    let err = app
        .state
        .dispatches()
        .dispatch(scan(order.order.id, &[&u1.code, &u2.code]), OPERATOR)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::OverDispatch { .. }));

    let order = app.state.sales_orders().get(order.order.id).await.unwrap();
    assert_eq!(order.lines[0].remaining_quantity, dec("50"));
}

#[tokio::test]
async fn test_over_dispatch_clamped_when_configured() {
    let app = TestApp::with_config(config_with(OverDispatchPolicy::Clamp, true));
    let order = app.order(&[("A", "50")]).await;
    let u1 = app.produce("A", "40").await;
    let u2 = app.produce("A", "35").await;

    let result = app
        .state
        .dispatches()
        .dispatch(scan(order.order.id, &[&u1.code, &u2.code]), OPERATOR)
        .await
        .unwrap();

    assert!(result.order_complete);
    assert_eq!(result.updates[0].remaining_after, Decimal::ZERO);
    assert_eq!(result.updates[0].excess_kg, dec("25"));
}

// ============================================================================
// Manual dispatch
// ============================================================================

fn manual(order_id: Uuid, quantity: &str) -> ManualDispatchInput {
    ManualDispatchInput {
        order_id,
        lines: vec![ManualLineInput {
            product: "A".to_string(),
            quantity: dec(quantity),
            seal: None,
        }],
        observations: Some("sin etiqueta".to_string()),
    }
}

#[tokio::test]
async fn test_manual_dispatch_decrements_lines_with_synthetic_codes() {
    let app = TestApp::new();
    let order = app.order(&[("A", "100")]).await;

    let result = app
        .state
        .dispatches()
        .dispatch_manual(manual(order.order.id, "30"), OPERATOR)
        .await
        .unwrap();
    assert_eq!(result.updates[0].remaining_after, dec("70"));

    let history = app
        .state
        .dispatches()
        .dispatches_for_order(order.order.id)
        .await
        .unwrap();
    let detail = &history[0].details[0];
    assert!(detail.manual);
    assert!(is_manual_code(&detail.unit_code));
}

#[tokio::test]
async fn test_manual_dispatch_disabled_by_config() {
    let app = TestApp::with_config(config_with(OverDispatchPolicy::Reject, false));
    let order = app.order(&[("A", "100")]).await;

    let err = app
        .state
        .dispatches()
        .dispatch_manual(manual(order.order.id, "30"), OPERATOR)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn test_manual_dispatch_rejects_non_positive_quantity() {
    let app = TestApp::new();
    let order = app.order(&[("A", "100")]).await;

    let err = app
        .state
        .dispatches()
        .dispatch_manual(manual(order.order.id, "0"), OPERATOR)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_manual_dispatch_rejects_sub_gram_quantity() {
    let app = TestApp::new();
    let order = app.order(&[("A", "100")]).await;

    let err = app
        .state
        .dispatches()
        .dispatch_manual(manual(order.order.id, "0.0004"), OPERATOR)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let unchanged = app.state.sales_orders().get(order.order.id).await.unwrap();
    assert_eq!(unchanged.lines[0].remaining_quantity, dec("100"));
}

// ============================================================================
// Operating-day report
// ============================================================================

#[tokio::test]
async fn test_dispatched_report_uses_operating_day() {
    let app = TestApp::new();
    let order = app.order(&[("A", "100")]).await;
    let u1 = app.produce("A", "40").await;
    let u2 = app.produce("A", "35").await;

    // 2024-03-12 05:30 still belongs to operating day 2024-03-11
    app.clock.set(at(2024, 3, 12, 5, 30));
    app.state
        .dispatches()
        .dispatch(scan(order.order.id, &[&u1.code]), OPERATOR)
        .await
        .unwrap();

    app.clock.advance(Duration::hours(1));
    app.state
        .dispatches()
        .dispatch(scan(order.order.id, &[&u2.code]), OPERATOR)
        .await
        .unwrap();

    let day_one = app
        .state
        .dispatches()
        .dispatched_by_product(date(2024, 3, 11))
        .await
        .unwrap();
    assert_eq!(day_one.len(), 1);
    assert_eq!(day_one[0].unit_count, 1);
    assert_eq!(day_one[0].total_weight_kg, dec("40"));

    let day_two = app
        .state
        .dispatches()
        .dispatched_by_product(date(2024, 3, 12))
        .await
        .unwrap();
    assert_eq!(day_two[0].total_weight_kg, dec("35"));
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// remaining = ordered - dispatched while the order stays open
    #[test]
    fn prop_remaining_is_ordered_minus_dispatched(weights in prop::collection::vec(1u32..40, 1..6)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let app = TestApp::new();
            let dispatched: u32 = weights.iter().sum();
            let ordered = dispatched + 10;
            let order = app.order(&[("A", &ordered.to_string())]).await;

            let mut codes = Vec::new();
            for w in &weights {
                codes.push(app.produce("A", &w.to_string()).await.code);
            }
            let result = app
                .state
                .dispatches()
                .dispatch(scan(order.order.id, &codes), OPERATOR)
                .await
                .unwrap();

            prop_assert!(!result.order_complete);
            prop_assert_eq!(result.updates[0].remaining_after, Decimal::from(10));
            Ok(())
        })?;
    }
}
