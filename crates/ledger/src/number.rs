//! Human-readable journal entry numbers: `JE-{year}-{seq:05}`.
//!
//! The sequence is global and monotonic; the year is the UTC year at creation.
//! Sequences past 99999 widen instead of wrapping.

use neoledger_core::{LedgerError, LedgerResult};

pub const ENTRY_NUMBER_PREFIX: &str = "JE";

pub fn format_entry_number(year: i32, seq: u64) -> String {
    format!("{ENTRY_NUMBER_PREFIX}-{year}-{seq:05}")
}

/// Split an entry number back into `(year, seq)`.
pub fn parse_entry_number(s: &str) -> LedgerResult<(i32, u64)> {
    let invalid = || LedgerError::validation(format!("invalid entry number '{s}'"));

    let mut parts = s.splitn(3, '-');
    if parts.next() != Some(ENTRY_NUMBER_PREFIX) {
        return Err(invalid());
    }
    let year = parts
        .next()
        .filter(|y| y.len() == 4)
        .and_then(|y| y.parse::<i32>().ok())
        .ok_or_else(invalid)?;
    let seq = parts
        .next()
        .filter(|n| n.len() >= 5 && n.chars().all(|c| c.is_ascii_digit()))
        .and_then(|n| n.parse::<u64>().ok())
        .ok_or_else(invalid)?;
    Ok((year, seq))
}
