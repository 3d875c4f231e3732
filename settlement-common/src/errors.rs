use alloy_primitives::{Address, U256};
use thiserror::Error;

/// Failures of plain asset movements on the [`crate::ledger::Ledger`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error(
        "Insufficient balance of {token} held by {holder}: \
         required {required}, available {available}"
    )]
    InsufficientBalance { token: Address, holder: Address, required: U256, available: U256 },
    #[error(
        "Insufficient allowance of {token} from {owner} to {spender}: \
         required {required}, available {available}"
    )]
    InsufficientAllowance {
        token: Address,
        owner: Address,
        spender: Address,
        required: U256,
        available: U256,
    },
    #[error("The native asset cannot be approved")]
    NativeAllowance,
    #[error("Balance of {token} held by {holder} overflows")]
    Overflow { token: Address, holder: Address },
    #[error("Debiting {token} from {holder} is outside the handler's scope")]
    UnauthorizedDebit { token: Address, holder: Address },
}

/// Errors raised by a venue handler for a single order.
///
/// The orchestrator isolates these per order: an order failing with any of these variants is
/// reverted and the next order of the trade is tried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("Failed to decode order payload: {0}")]
    Decode(String),
    #[error("Unsupported order: {0}")]
    Unsupported(String),
    #[error("No handler registered at {0}")]
    UnknownHandler(Address),
    #[error("Static exchange checks failed")]
    StaticChecksFailed,
    #[error("Order would not fill")]
    EmptyFill,
    #[error("Received {received} which is below the minimum of {minimum}")]
    BelowMinimum { received: U256, minimum: U256 },
    #[error("Implausible handler result: {0}")]
    Implausible(String),
    #[error("Order reverted: {0}")]
    Reverted(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
