//! Shared fixtures for the integration tests
//!
//! Every test runs the real services on a fresh `MemoryStore` with a `FixedClock`
//! and a notifier that records alerts instead of sending them.

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use almacen_backend::clock::FixedClock;
use almacen_backend::error::AppResult;
use almacen_backend::repository::MemoryStore;
use almacen_backend::services::bagged_unit::CreateBaggedUnitInput;
use almacen_backend::services::sales_order::{CreateSalesOrderInput, OrderLineInput};
use almacen_backend::services::{StockAlertNotifier, StockAlerts};
use almacen_backend::{AppState, Config};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use shared::{BaggedUnit, CriticalStockAlert, SalesOrderWithLines};

pub const OPERATOR: &str = "operador";

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(h, min, 0).unwrap()
}

/// Keeps every alert it is handed
#[derive(Default)]
pub struct RecordingNotifier {
    pub alerts: Mutex<Vec<CriticalStockAlert>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<CriticalStockAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl StockAlertNotifier for RecordingNotifier {
    async fn notify(&self, alert: &CriticalStockAlert, _recipients: &[String]) -> AppResult<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(Config::in_memory())
    }

    pub fn with_config(config: Config) -> Self {
        let clock = Arc::new(FixedClock::new(at(2024, 3, 11, 9, 30)));
        let notifier = Arc::new(RecordingNotifier::default());
        let alerts = StockAlerts::new(notifier.clone(), vec!["bodega@planta.test".to_string()]);
        let state = AppState::new(Arc::new(MemoryStore::new()), config, clock.clone(), alerts);
        Self {
            state,
            clock,
            notifier,
        }
    }

    pub async fn produce(&self, product: &str, weight: &str) -> BaggedUnit {
        self.state
            .bagged_units()
            .create(
                CreateBaggedUnitInput {
                    product: product.to_string(),
                    weight_kg: dec(weight),
                    seal: format!("S-{}", weight),
                },
                OPERATOR,
            )
            .await
            .unwrap()
    }

    pub async fn order(&self, lines: &[(&str, &str)]) -> SalesOrderWithLines {
        self.state
            .sales_orders()
            .create(
                CreateSalesOrderInput {
                    date: None,
                    customer: "Agroindustrial del Sur".to_string(),
                    final_customer: None,
                    sale_code: Some("OV-1001".to_string()),
                    observations: None,
                    lines: lines
                        .iter()
                        .map(|(product, quantity)| OrderLineInput {
                            product: product.to_string(),
                            quantity: dec(quantity),
                        })
                        .collect(),
                },
                OPERATOR,
            )
            .await
            .unwrap()
    }
}
