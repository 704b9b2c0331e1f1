//! Stock ledger tests
//!
//! Tests for goods, kits and the movement ledger including:
//! - non-negativity of every decrement
//! - the critical stock alert, raised once per crossing
//! - kit stock derived from components and kit movements
//! - movement history filters and the end-of-day snapshot

mod common;

use almacen_backend::error::AppError;
use almacen_backend::services::stock::{
    AdjustStockInput, CreateGoodInput, CreateKitInput, KitComponentInput, MovementActor,
};
use chrono::Duration;
use common::*;
use rust_decimal::Decimal;
use shared::codes::{is_item_code, GOOD_CODE_PREFIX, KIT_CODE_PREFIX};
use shared::{Good, ItemKind, MovementFilter, MovementKind, Pagination};
use uuid::Uuid;

const ACTOR: MovementActor<'static> = MovementActor {
    responsible: "bodeguero",
    system_user: OPERATOR,
};

async fn good(app: &TestApp, name: &str, stock: &str, critical: Option<&str>) -> Good {
    app.state
        .stock()
        .create_good(CreateGoodInput {
            name: name.to_string(),
            initial_stock: Some(dec(stock)),
            critical_stock: critical.map(dec),
            unit_price: Some(dec("12.50")),
        })
        .await
        .unwrap()
}

fn movement(kind: ItemKind, id: Uuid, movement: MovementKind, quantity: &str) -> AdjustStockInput {
    AdjustStockInput {
        item_kind: kind,
        item_id: id,
        movement_kind: movement,
        quantity: dec(quantity),
        warehouse: Some("Bodega central".to_string()),
        unit_price: None,
        observations: None,
    }
}

// ============================================================================
// Goods
// ============================================================================

#[tokio::test]
async fn test_goods_get_bien_codes() {
    let app = TestApp::new();
    let a = good(&app, "Saco polipropileno", "100", None).await;
    let b = good(&app, "Hilo de costura", "10", None).await;

    assert!(is_item_code(GOOD_CODE_PREFIX, &a.code));
    assert!(is_item_code(GOOD_CODE_PREFIX, &b.code));
    assert_ne!(a.code, b.code);
}

#[tokio::test]
async fn test_adjust_records_movement_with_snapshots() {
    let app = TestApp::new();
    let g = good(&app, "Saco polipropileno", "100", None).await;

    let result = app
        .state
        .stock()
        .adjust(movement(ItemKind::Good, g.id, MovementKind::Exit, "30"), ACTOR)
        .await
        .unwrap();

    assert_eq!(result.stock_before, dec("100"));
    assert_eq!(result.stock_after, dec("70"));
    assert_eq!(result.delta, "-30");
    assert_eq!(result.movement.responsible, "bodeguero");
    assert_eq!(result.movement.system_user, OPERATOR);
    assert_eq!(
        app.state.stock().get_stock(ItemKind::Good, g.id).await.unwrap(),
        dec("70")
    );

    let entry = app
        .state
        .stock()
        .adjust(
            movement(ItemKind::Good, g.id, MovementKind::AdjustmentEntry, "5"),
            ACTOR,
        )
        .await
        .unwrap();
    assert_eq!(entry.delta, "+5");
    assert_eq!(entry.stock_after, dec("75"));
}

#[tokio::test]
async fn test_insufficient_stock_leaves_ledger_untouched() {
    let app = TestApp::new();
    let g = good(&app, "Saco polipropileno", "10", None).await;

    let err = app
        .state
        .stock()
        .adjust(movement(ItemKind::Good, g.id, MovementKind::Exit, "11"), ACTOR)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    let err = app.state.stock().decrement(g.id, dec("10.5"), ACTOR).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    assert_eq!(app.state.stock().get_good(g.id).await.unwrap().stock, dec("10"));
    let history = app
        .state
        .stock()
        .history(MovementFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert!(history.data.is_empty());
}

#[tokio::test]
async fn test_decrement_to_zero_is_allowed() {
    let app = TestApp::new();
    let g = good(&app, "Etiqueta", "4", None).await;

    let stock = app.state.stock().decrement(g.id, dec("4"), ACTOR).await.unwrap();
    assert_eq!(stock, Decimal::ZERO);
}

#[tokio::test]
async fn test_critical_alert_sent_once_per_crossing() {
    let app = TestApp::new();
    let g = good(&app, "Saco polipropileno", "20", Some("10")).await;

    app.state.stock().decrement(g.id, dec("5"), ACTOR).await.unwrap();
    assert!(app.notifier.sent().is_empty());

    app.state.stock().decrement(g.id, dec("5"), ACTOR).await.unwrap();
    let sent = app.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].code, g.code);
    assert_eq!(sent[0].stock, dec("10"));

    // already at or below the threshold: no new alert
    app.state.stock().decrement(g.id, dec("2"), ACTOR).await.unwrap();
    assert_eq!(app.notifier.sent().len(), 1);

    // back above the threshold, then down again: a new crossing
    app.state.stock().increment(g.id, dec("10"), ACTOR).await.unwrap();
    app.state
        .stock()
        .adjust(movement(ItemKind::Good, g.id, MovementKind::AdjustmentExit, "9"), ACTOR)
        .await
        .unwrap();
    assert_eq!(app.notifier.sent().len(), 2);
}

#[tokio::test]
async fn test_ledger_operations_record_adjustments() {
    let app = TestApp::new();
    let g = good(&app, "Saco polipropileno", "20", None).await;
    let stock = app.state.stock();

    stock.increment(g.id, dec("5"), ACTOR).await.unwrap();
    app.clock.advance(Duration::minutes(1));
    stock.decrement(g.id, dec("3"), ACTOR).await.unwrap();
    app.clock.advance(Duration::minutes(1));
    let updated = stock.set_stock(g.id, dec("55"), ACTOR).await.unwrap();
    assert_eq!(updated.stock, dec("55"));
    // same value again: nothing to record
    stock.set_stock(g.id, dec("55"), ACTOR).await.unwrap();

    let history = stock
        .history(MovementFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(history.pagination.total_items, 3);

    let overwrite = &history.data[0];
    assert_eq!(overwrite.movement_kind, MovementKind::AdjustmentEntry);
    assert_eq!(overwrite.quantity, dec("33"));
    assert_eq!(overwrite.stock_before, dec("22"));
    assert_eq!(overwrite.stock_after, dec("55"));
    assert_eq!(overwrite.responsible, "bodeguero");

    let kinds: Vec<MovementKind> = history.data.iter().map(|m| m.movement_kind).collect();
    assert!(kinds.contains(&MovementKind::AdjustmentExit));
}

// ============================================================================
// Kits
// ============================================================================

async fn kit_of(app: &TestApp, components: &[(Uuid, &str)]) -> Uuid {
    let kit = app
        .state
        .stock()
        .create_kit(CreateKitInput {
            name: "Kit ensacado".to_string(),
            components: components
                .iter()
                .map(|(id, per_kit)| KitComponentInput {
                    good_id: *id,
                    quantity_per_kit: dec(per_kit),
                })
                .collect(),
        })
        .await
        .unwrap();
    assert!(is_item_code(KIT_CODE_PREFIX, &kit.kit.code));
    kit.kit.id
}

#[tokio::test]
async fn test_kit_stock_is_derived_from_components() {
    let app = TestApp::new();
    let a = good(&app, "Saco", "10", None).await;
    let b = good(&app, "Hilo", "9", None).await;
    let kit_id = kit_of(&app, &[(a.id, "2"), (b.id, "3")]).await;

    assert_eq!(
        app.state.stock().kit_available_stock(kit_id).await.unwrap(),
        dec("3")
    );
    let kit = app.state.stock().get_kit(kit_id).await.unwrap();
    assert_eq!(kit.available_stock, dec("3"));
    assert_eq!(kit.components.len(), 2);
}

#[tokio::test]
async fn test_kit_without_components_has_no_stock() {
    let app = TestApp::new();
    let kit_id = kit_of(&app, &[]).await;

    assert_eq!(
        app.state.stock().get_stock(ItemKind::Kit, kit_id).await.unwrap(),
        Decimal::ZERO
    );
}

#[tokio::test]
async fn test_kit_exit_moves_components() {
    let app = TestApp::new();
    let a = good(&app, "Saco", "10", Some("5")).await;
    let b = good(&app, "Hilo", "9", None).await;
    let kit_id = kit_of(&app, &[(a.id, "2"), (b.id, "3")]).await;

    let result = app
        .state
        .stock()
        .adjust(movement(ItemKind::Kit, kit_id, MovementKind::Exit, "2"), ACTOR)
        .await
        .unwrap();
    assert_eq!(result.stock_before, dec("3"));
    assert_eq!(result.stock_after, dec("1"));

    assert_eq!(app.state.stock().get_good(a.id).await.unwrap().stock, dec("6"));
    assert_eq!(app.state.stock().get_good(b.id).await.unwrap().stock, dec("3"));
    assert!(app.notifier.sent().is_empty());

    // one kit movement plus one row per component
    let history = app
        .state
        .stock()
        .history(MovementFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(history.pagination.total_items, 3);

    let err = app
        .state
        .stock()
        .adjust(movement(ItemKind::Kit, kit_id, MovementKind::Exit, "2"), ACTOR)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));
    assert_eq!(app.state.stock().get_good(a.id).await.unwrap().stock, dec("6"));
}

#[tokio::test]
async fn test_kit_exit_can_raise_component_alert() {
    let app = TestApp::new();
    let a = good(&app, "Saco", "10", Some("6")).await;
    let kit_id = kit_of(&app, &[(a.id, "2")]).await;

    app.state
        .stock()
        .adjust(movement(ItemKind::Kit, kit_id, MovementKind::Exit, "2"), ACTOR)
        .await
        .unwrap();

    let sent = app.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].good_id, a.id);
}

#[tokio::test]
async fn test_kit_without_components_cannot_move() {
    let app = TestApp::new();
    let kit_id = kit_of(&app, &[]).await;

    let err = app
        .state
        .stock()
        .adjust(movement(ItemKind::Kit, kit_id, MovementKind::Entry, "5"), ACTOR)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let history = app
        .state
        .stock()
        .history(MovementFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert!(history.data.is_empty());
}

#[tokio::test]
async fn test_kit_moves_in_whole_units() {
    let app = TestApp::new();
    let a = good(&app, "Saco", "10", None).await;
    let b = good(&app, "Hilo", "9", None).await;
    let kit_id = kit_of(&app, &[(a.id, "2"), (b.id, "3")]).await;

    let err = app
        .state
        .stock()
        .adjust(movement(ItemKind::Kit, kit_id, MovementKind::Exit, "0.5"), ACTOR)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
    assert_eq!(app.state.stock().get_good(a.id).await.unwrap().stock, dec("10"));
    assert_eq!(app.state.stock().get_good(b.id).await.unwrap().stock, dec("9"));

    // whole units keep after = before +/- quantity
    let result = app
        .state
        .stock()
        .adjust(movement(ItemKind::Kit, kit_id, MovementKind::Entry, "1"), ACTOR)
        .await
        .unwrap();
    assert_eq!(result.stock_before, dec("3"));
    assert_eq!(result.stock_after, dec("4"));
}

// ============================================================================
// History and snapshot
// ============================================================================

#[tokio::test]
async fn test_history_filters_by_kind_item_and_dates() {
    let app = TestApp::new();
    let a = good(&app, "Saco", "100", None).await;
    let b = good(&app, "Hilo", "100", None).await;
    let stock = app.state.stock();

    stock
        .adjust(movement(ItemKind::Good, a.id, MovementKind::Entry, "10"), ACTOR)
        .await
        .unwrap();
    app.clock.advance(Duration::days(1));
    stock
        .adjust(movement(ItemKind::Good, a.id, MovementKind::Exit, "5"), ACTOR)
        .await
        .unwrap();
    stock
        .adjust(movement(ItemKind::Good, b.id, MovementKind::Exit, "1"), ACTOR)
        .await
        .unwrap();

    let exits = stock
        .history(
            MovementFilter {
                movement_kind: Some(MovementKind::Exit),
                ..MovementFilter::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(exits.pagination.total_items, 2);

    let only_a = stock
        .history(
            MovementFilter {
                item_id: Some(a.id),
                ..MovementFilter::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(only_a.pagination.total_items, 2);
    // newest first
    assert_eq!(only_a.data[0].movement_kind, MovementKind::Exit);

    let first_day = stock
        .history(
            MovementFilter {
                date_from: Some(date(2024, 3, 11)),
                date_to: Some(date(2024, 3, 11)),
                ..MovementFilter::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(first_day.pagination.total_items, 1);

    let err = stock
        .history(
            MovementFilter {
                date_from: Some(date(2024, 3, 12)),
                date_to: Some(date(2024, 3, 11)),
                ..MovementFilter::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_snapshot_reconstructs_stock_at_close_of_day() {
    let app = TestApp::new();
    let a = good(&app, "Saco", "100", None).await;
    let untouched = good(&app, "Hilo", "7", None).await;
    let stock = app.state.stock();

    // 2024-03-11 09:30, operating day 2024-03-11
    stock
        .adjust(movement(ItemKind::Good, a.id, MovementKind::Exit, "30"), ACTOR)
        .await
        .unwrap();
    // 2024-03-12 07:30, next operating day
    app.clock.set(at(2024, 3, 12, 7, 30));
    stock
        .adjust(movement(ItemKind::Good, a.id, MovementKind::Exit, "20"), ACTOR)
        .await
        .unwrap();

    let snapshot = stock.stock_snapshot(date(2024, 3, 11)).await.unwrap();
    let entry = |id: Uuid| snapshot.iter().find(|e| e.good_id == id).unwrap().stock;
    assert_eq!(entry(a.id), dec("70"));
    assert_eq!(entry(untouched.id), dec("7"));

    let earlier = stock.stock_snapshot(date(2024, 3, 10)).await.unwrap();
    assert_eq!(
        earlier.iter().find(|e| e.good_id == a.id).unwrap().stock,
        dec("100")
    );
}

#[tokio::test]
async fn test_snapshot_includes_ledger_operations() {
    let app = TestApp::new();
    let g = good(&app, "Saco", "10", None).await;
    let stock = app.state.stock();

    stock
        .adjust(movement(ItemKind::Good, g.id, MovementKind::Entry, "5"), ACTOR)
        .await
        .unwrap();
    app.clock.advance(Duration::days(2));
    let current = stock.decrement(g.id, dec("3"), ACTOR).await.unwrap();
    assert_eq!(current, dec("12"));

    let snapshot_of = |entries: Vec<shared::StockSnapshotEntry>| {
        entries.iter().find(|e| e.good_id == g.id).unwrap().stock
    };
    assert_eq!(
        snapshot_of(stock.stock_snapshot(date(2024, 3, 13)).await.unwrap()),
        dec("12")
    );

    app.clock.advance(Duration::minutes(1));
    stock.set_stock(g.id, dec("2"), ACTOR).await.unwrap();
    assert_eq!(
        snapshot_of(stock.stock_snapshot(date(2024, 3, 13)).await.unwrap()),
        dec("2")
    );
    assert_eq!(
        snapshot_of(stock.stock_snapshot(date(2024, 3, 11)).await.unwrap()),
        dec("15")
    );
}
