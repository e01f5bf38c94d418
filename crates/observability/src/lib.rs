//! Process-wide logging setup for the ledger service.

pub mod tracing;

pub use crate::tracing::{LogFormat, init, init_with};
