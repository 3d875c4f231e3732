//! Signed swap intents as submitted by users.

use alloy_primitives::{Address, Bytes, Signature, U256};
use serde::{Deserialize, Serialize};

use super::{CollectionId, PartnerId};

/// A single instruction routed to one venue handler.
///
/// `encoded_payload` is owned by the handler at `exchange_handler`; the orchestrator only
/// forwards it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub exchange_handler: Address,
    pub encoded_payload: Bytes,
}

impl Order {
    pub fn new(exchange_handler: Address, encoded_payload: impl Into<Bytes>) -> Self {
        Self { exchange_handler, encoded_payload: encoded_payload.into() }
    }
}

/// One asset pair leg of a swap, filled by one or more orders tried in sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub source_token: Address,
    pub destination_token: Address,
    /// Amount of `source_token` to spend. Only binding for the first trade of a swap; chained
    /// trades spend what the previous trade produced.
    pub amount: U256,
    pub orders: Vec<Order>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Swap {
    pub trades: Vec<Trade>,
    /// Minimum of `destination * WAD / source_amount`.
    #[serde(default)]
    pub minimum_exchange_rate: U256,
    #[serde(default)]
    pub minimum_destination_amount: U256,
    pub source_amount: U256,
    #[serde(default)]
    pub trade_to_take_fee_from: usize,
    #[serde(default)]
    pub take_fee_from_source: bool,
    /// Receiver of the destination asset. The zero address means the sender.
    #[serde(default)]
    pub redirect_address: Address,
}

impl Swap {
    pub fn source_token(&self) -> Option<Address> {
        self.trades
            .first()
            .map(|trade| trade.source_token)
    }

    pub fn destination_token(&self) -> Option<Address> {
        self.trades
            .last()
            .map(|trade| trade.destination_token)
    }

    pub fn recipient(&self, sender: Address) -> Address {
        if self.redirect_address.is_zero() {
            sender
        } else {
            self.redirect_address
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapCollection {
    pub chain_id: u64,
    pub swaps: Vec<Swap>,
    #[serde(default)]
    pub partner: PartnerId,
    pub expiration_block: u64,
    pub max_gas_price: U256,
    pub id: CollectionId,
    /// Signature of the trusted signer; absent on collections that were not signed yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

impl SwapCollection {
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }
}
