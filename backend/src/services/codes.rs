//! Code allocation inside an open transaction

use chrono::NaiveDateTime;
use rand::Rng;
use shared::codes::{encode_bagged_unit_code, format_item_code};
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::repository::Tx;

/// Next bagged-unit code. The sequence record stays locked until `tx` ends,
/// so concurrent producers cannot draw the same sequence number.
pub async fn next_bagged_unit_code(tx: &mut dyn Tx, now: NaiveDateTime) -> AppResult<String> {
    let state = tx.lock_sequence().await?.advance(now.date());
    tx.save_sequence(state).await?;
    Ok(encode_bagged_unit_code(now, state.last_sequence))
}

/// Random `PREFIX-NNNNNN` code not yet used by any good or kit
pub async fn next_item_code(tx: &mut dyn Tx, prefix: &str, max_retries: u32) -> AppResult<String> {
    for _ in 0..max_retries {
        let number: u32 = rand::thread_rng().gen_range(0..1_000_000);
        let code = format_item_code(prefix, number);
        if !tx.item_code_exists(&code).await? {
            return Ok(code);
        }
    }
    warn!(prefix, max_retries, "Item code space exhausted");
    Err(AppError::CodeSpaceExhausted(prefix.to_string()))
}
