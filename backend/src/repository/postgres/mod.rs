//! PostgreSQL adapter
//!
//! One `PgTx` wraps one sqlx transaction; every repository method runs on it.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::{Store, Tx};
use crate::error::{AppError, AppResult};

mod bagged_unit;
mod daily_report;
mod dispatch;
mod movement;
mod sales_order;
mod sequence;
mod stock;

/// Store backed by a connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn Tx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Tx for PgTx {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Decode a TEXT enum column
fn decode<T>(column: &str, value: &str, parse: fn(&str) -> Option<T>) -> AppResult<T> {
    parse(value).ok_or_else(|| AppError::Internal(format!("unexpected {} value '{}'", column, value)))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

fn to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or_default()
}
