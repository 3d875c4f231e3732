//! Shared models, the ledger model and the venue handler interface used by the settlement
//! engine.

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod errors;
pub mod ledger;
pub mod models;
pub mod traits;

pub use alloy_primitives::{Address, Bytes, B256, U256};
