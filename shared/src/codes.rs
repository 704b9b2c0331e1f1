//! Human-readable identifiers for bagged units, stock items and manual dispatch lines

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Prefix for goods (bienes) codes
pub const GOOD_CODE_PREFIX: &str = "BIEN";
/// Prefix for kit codes
pub const KIT_CODE_PREFIX: &str = "KIT";
/// Default number of random draws before giving up on an item code
pub const DEFAULT_ITEM_CODE_RETRIES: u32 = 50;

/// Persisted "last sequence + last date" record behind bagged-unit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SequenceState {
    pub last_sequence: i32,
    pub last_date: Option<NaiveDate>,
}

impl SequenceState {
    /// Next state for a unit produced on `today`: restarts at 1 on a new date
    pub fn advance(self, today: NaiveDate) -> Self {
        let last_sequence = match self.last_date {
            Some(date) if date == today => self.last_sequence + 1,
            _ => 1,
        };
        Self {
            last_sequence,
            last_date: Some(today),
        }
    }
}

/// Encode `yy mm dd HH MM seq` as a digit string; the sequence has at least two digits
pub fn encode_bagged_unit_code(at: NaiveDateTime, sequence: i32) -> String {
    format!(
        "{:02}{:02}{:02}{:02}{:02}{:02}",
        at.year().rem_euclid(100),
        at.month(),
        at.day(),
        at.hour(),
        at.minute(),
        sequence
    )
}

/// Split a bagged-unit code into its timestamp prefix and sequence
pub fn decode_bagged_unit_code(code: &str) -> Option<(&str, i32)> {
    if code.len() < 12 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (prefix, seq) = code.split_at(10);
    seq.parse().ok().map(|s| (prefix, s))
}

/// `PREFIX-NNNNNN`
pub fn format_item_code(prefix: &str, number: u32) -> String {
    format!("{}-{:06}", prefix, number % 1_000_000)
}

pub fn is_item_code(prefix: &str, code: &str) -> bool {
    code.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .map(|digits| digits.len() == 6 && digits.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// Synthetic code for a manual dispatch line: `MANUAL-<millis>-<suffix>`
pub fn manual_dispatch_code(at: NaiveDateTime, suffix: u32) -> String {
    format!(
        "MANUAL-{}-{:04}",
        at.and_utc().timestamp_millis(),
        suffix % 10_000
    )
}

pub fn is_manual_code(code: &str) -> bool {
    code.starts_with("MANUAL-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 5)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_encoding_layout() {
        assert_eq!(encode_bagged_unit_code(ts(14, 3), 1), "240705140301");
        assert_eq!(encode_bagged_unit_code(ts(14, 3), 123), "2407051403123");
    }

    #[test]
    fn test_sequence_resets_on_new_date() {
        let day1 = NaiveDate::from_ymd_opt(2024, 7, 5).unwrap();
        let day2 = day1.succ_opt().unwrap();

        let s = SequenceState::default().advance(day1);
        assert_eq!(s.last_sequence, 1);
        let s = s.advance(day1).advance(day1);
        assert_eq!(s.last_sequence, 3);
        let s = s.advance(day2);
        assert_eq!(s.last_sequence, 1);
        assert_eq!(s.last_date, Some(day2));
    }

    #[test]
    fn test_same_instant_codes_differ_only_in_sequence() {
        let day = ts(9, 30).date();
        let first = SequenceState::default().advance(day);
        let second = first.advance(day);
        let a = encode_bagged_unit_code(ts(9, 30), first.last_sequence);
        let b = encode_bagged_unit_code(ts(9, 30), second.last_sequence);
        let (pa, sa) = decode_bagged_unit_code(&a).unwrap();
        let (pb, sb) = decode_bagged_unit_code(&b).unwrap();
        assert_eq!(pa, pb);
        assert_eq!(sb, sa + 1);
    }

    #[test]
    fn test_item_codes() {
        assert_eq!(format_item_code(GOOD_CODE_PREFIX, 42), "BIEN-000042");
        assert!(is_item_code("KIT", &format_item_code(KIT_CODE_PREFIX, 999_999)));
        assert!(!is_item_code("KIT", "BIEN-000001"));
        assert!(!is_item_code("KIT", "KIT-12"));
    }

    #[test]
    fn test_manual_codes() {
        let code = manual_dispatch_code(ts(8, 0), 7);
        assert!(is_manual_code(&code));
        assert!(code.ends_with("-0007"));
        assert!(decode_bagged_unit_code(&code).is_none());
    }

    proptest! {
        #[test]
        fn prop_codes_unique_within_a_day(minutes in prop::collection::vec(0u32..1440, 1..300)) {
            let day = ts(0, 0).date();
            let mut state = SequenceState::default();
            let mut seen = HashSet::new();
            let mut sorted = minutes.clone();
            sorted.sort_unstable();
            for minute in sorted {
                state = state.advance(day);
                let at = day.and_hms_opt(minute / 60, minute % 60, 0).unwrap();
                let code = encode_bagged_unit_code(at, state.last_sequence);
                prop_assert!(seen.insert(code));
            }
        }
    }
}
