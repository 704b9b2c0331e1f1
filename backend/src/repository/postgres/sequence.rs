use async_trait::async_trait;
use chrono::NaiveDate;
use shared::codes::SequenceState;

use super::PgTx;
use crate::error::{AppError, AppResult};
use crate::repository::SequenceRepository;

#[async_trait]
impl SequenceRepository for PgTx {
    async fn lock_sequence(&mut self) -> AppResult<SequenceState> {
        // Row lock serialises concurrent code allocations until commit
        let row = sqlx::query_as::<_, (i32, Option<NaiveDate>)>(
            "SELECT last_sequence, last_date FROM bagged_unit_sequence WHERE id = 1 FOR UPDATE",
        )
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::Internal("bagged_unit_sequence row is missing".to_string()))?;

        Ok(SequenceState {
            last_sequence: row.0,
            last_date: row.1,
        })
    }

    async fn save_sequence(&mut self, state: SequenceState) -> AppResult<()> {
        sqlx::query("UPDATE bagged_unit_sequence SET last_sequence = $1, last_date = $2 WHERE id = 1")
            .bind(state.last_sequence)
            .bind(state.last_date)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}
