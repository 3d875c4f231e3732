//! Settlement orchestrator.
//!
//! Verifies signed swap collections, pulls the user's funds, routes every trade through its
//! orders in the order given by the caller and settles the net result. Work is reverted in
//! the smallest unit correctness allows: a failing order is undone and skipped, a failing
//! swap is undone according to [`SwapFailurePolicy`], and a failing collection leaves the
//! ledger untouched.

mod execution;
mod fees;

use std::{
    collections::HashSet,
    sync::{Arc, RwLock, RwLockReadGuard},
};

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use settlement_common::{
    errors::LedgerError,
    ledger::Ledger,
    models::{
        settlement::SettlementEvent, swap::SwapCollection, BlockEnv, CallContext, CollectionId,
        NATIVE_ASSET,
    },
};
use strum_macros::Display;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::{
    config::{EngineConfig, SwapFailurePolicy},
    gate::{TransferError, TransferGate},
    handlers::HandlerRegistry,
    registry::{PartnerRegistry, RegistryError},
    signature::recover_signer,
};

/// Handle to state shared between the engine and its administrators.
pub type Shared<T> = Arc<RwLock<T>>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("Collection is not signed")]
    MissingSignature,
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Collection signed by {recovered}, expected {expected}")]
    WrongSigner { expected: Address, recovered: Address },
    #[error("Collection for chain {collection} submitted on chain {current}")]
    ChainMismatch { collection: u64, current: u64 },
    #[error("Collection expired at block {expiration_block}, current block is {current}")]
    Expired { expiration_block: u64, current: u64 },
    #[error("Gas price {actual} exceeds the maximum of {maximum}")]
    GasPriceTooHigh { maximum: U256, actual: U256 },
    #[error("Collection {id} was already settled for {sender}")]
    Replayed { sender: Address, id: CollectionId },
    #[error("Caller {0} is not authorized")]
    Unauthorized(Address),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SlippageKind {
    #[strum(serialize = "destination amount")]
    DestinationAmount,
    #[strum(serialize = "exchange rate")]
    ExchangeRate,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Slippage: {kind} of {actual} is below the minimum of {minimum}")]
    Slippage { kind: SlippageKind, actual: U256, minimum: U256 },
    #[error("Handler execution failed: trade {trade} filled {filled} of {required}")]
    HandlerExecution { trade: usize, filled: U256, required: U256 },
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<LedgerError> for SettlementError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance { .. } | LedgerError::InsufficientAllowance { .. } => {
                SettlementError::InsufficientFunds(err.to_string())
            }
            LedgerError::NativeAllowance |
            LedgerError::Overflow { .. } |
            LedgerError::UnauthorizedDebit { .. } => {
                SettlementError::Configuration(err.to_string())
            }
        }
    }
}

impl From<TransferError> for SettlementError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::Unauthorized(caller) => AuthorizationError::Unauthorized(caller).into(),
            TransferError::InsufficientAllowance { .. } => {
                SettlementError::InsufficientFunds(err.to_string())
            }
            TransferError::Ledger(err) => err.into(),
            TransferError::AlreadyAuthorized(_) | TransferError::NotAuthorized(_) => {
                SettlementError::Configuration(err.to_string())
            }
        }
    }
}

impl From<RegistryError> for SettlementError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Unauthorized(caller) => AuthorizationError::Unauthorized(caller).into(),
            RegistryError::Configuration(msg) => SettlementError::Configuration(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedSwap {
    pub index: usize,
    pub reason: String,
}

/// Outcome of a settled collection: one event per settled swap, plus the swaps that were
/// reverted under [`SwapFailurePolicy::SkipSwap`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReport {
    pub events: Vec<SettlementEvent>,
    pub failed_swaps: Vec<FailedSwap>,
}

#[derive(Debug)]
pub struct SettlementEngine {
    config: EngineConfig,
    gate: Shared<TransferGate>,
    registry: Shared<PartnerRegistry>,
    handlers: HandlerRegistry,
    settled: HashSet<(Address, CollectionId)>,
}

impl SettlementEngine {
    pub fn new(
        config: EngineConfig,
        gate: Shared<TransferGate>,
        registry: Shared<PartnerRegistry>,
        handlers: HandlerRegistry,
    ) -> Self {
        Self { config, gate, registry, handlers, settled: HashSet::new() }
    }

    pub fn address(&self) -> Address {
        self.config.address
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn is_settled(&self, sender: Address, id: CollectionId) -> bool {
        self.settled.contains(&(sender, id))
    }

    /// Verifies and settles `collection` on behalf of `call.sender`.
    ///
    /// On error the ledger is left exactly as it was before the call.
    #[instrument(skip_all, fields(id = %collection.id, sender = %call.sender))]
    pub fn execute_swap_collection(
        &mut self,
        ledger: &mut Ledger,
        block: &BlockEnv,
        call: &CallContext,
        collection: &SwapCollection,
    ) -> Result<SettlementReport, SettlementError> {
        self.authorize(block, call, collection)?;

        let snapshot = ledger.snapshot();
        match self.settle(ledger, block, call, collection) {
            Ok(report) => {
                if self.config.replay_protection {
                    self.settled
                        .insert((call.sender, collection.id));
                }
                info!(
                    settled = report.events.len(),
                    failed = report.failed_swaps.len(),
                    "Swap collection settled"
                );
                Ok(report)
            }
            Err(err) => {
                ledger.restore(snapshot);
                warn!(%err, "Swap collection reverted");
                Err(err)
            }
        }
    }

    fn authorize(
        &self,
        block: &BlockEnv,
        call: &CallContext,
        collection: &SwapCollection,
    ) -> Result<(), AuthorizationError> {
        if collection.chain_id != block.chain_id {
            return Err(AuthorizationError::ChainMismatch {
                collection: collection.chain_id,
                current: block.chain_id,
            });
        }
        if block.number > collection.expiration_block {
            return Err(AuthorizationError::Expired {
                expiration_block: collection.expiration_block,
                current: block.number,
            });
        }
        if call.gas_price > collection.max_gas_price {
            return Err(AuthorizationError::GasPriceTooHigh {
                maximum: collection.max_gas_price,
                actual: call.gas_price,
            });
        }
        if self.config.replay_protection && self.is_settled(call.sender, collection.id) {
            return Err(AuthorizationError::Replayed { sender: call.sender, id: collection.id });
        }
        let recovered = recover_signer(collection, call.sender)?;
        if recovered != self.config.signer {
            return Err(AuthorizationError::WrongSigner { expected: self.config.signer, recovered });
        }
        Ok(())
    }

    fn settle(
        &self,
        ledger: &mut Ledger,
        block: &BlockEnv,
        call: &CallContext,
        collection: &SwapCollection,
    ) -> Result<SettlementReport, SettlementError> {
        ledger.transfer(NATIVE_ASSET, call.sender, self.address(), call.value)?;
        let mut native_available = call.value;
        let mut report = SettlementReport::default();

        for (index, swap) in collection.swaps.iter().enumerate() {
            let snapshot = ledger.snapshot();
            let native_before = native_available;
            let partner = collection.partner;
            let result =
                self.execute_swap(ledger, block, call, partner, swap, &mut native_available);
            match result {
                Ok(event) => report.events.push(event),
                Err(err) => match self.config.swap_failure_policy {
                    SwapFailurePolicy::AbortCollection => return Err(err),
                    SwapFailurePolicy::SkipSwap => {
                        ledger.restore(snapshot);
                        native_available = native_before;
                        warn!(swap = index, %err, "Swap reverted");
                        report
                            .failed_swaps
                            .push(FailedSwap { index, reason: err.to_string() });
                    }
                },
            }
        }

        // Attached value no swap consumed goes back to the sender.
        ledger.transfer(NATIVE_ASSET, self.address(), call.sender, native_available)?;
        Ok(report)
    }

    fn gate(&self) -> Result<RwLockReadGuard<'_, TransferGate>, SettlementError> {
        self.gate
            .read()
            .map_err(|_| SettlementError::Configuration("transfer gate lock poisoned".into()))
    }

    fn registry(&self) -> Result<RwLockReadGuard<'_, PartnerRegistry>, SettlementError> {
        self.registry
            .read()
            .map_err(|_| SettlementError::Configuration("partner registry lock poisoned".into()))
    }
}
