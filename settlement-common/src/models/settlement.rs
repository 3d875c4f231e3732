use std::fmt;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use super::PartnerId;

/// Amounts moved by one handler call, in the smallest unit of the respective asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResult {
    pub amount_spent_on_order: U256,
    pub amount_received_from_order: U256,
}

impl HandlerResult {
    pub fn new(amount_spent_on_order: U256, amount_received_from_order: U256) -> Self {
        Self { amount_spent_on_order, amount_received_from_order }
    }

    /// A result that moves nothing on either side is treated as a failed order.
    pub fn is_empty(&self) -> bool {
        self.amount_spent_on_order.is_zero() || self.amount_received_from_order.is_zero()
    }
}

impl fmt::Display for HandlerResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "spent = {}, received = {}",
            self.amount_spent_on_order, self.amount_received_from_order
        )
    }
}

/// A beneficiary and the [`super::WAD`] based share of an amount paid to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeShare {
    pub beneficiary: Address,
    pub fee_rate: U256,
}

impl FeeShare {
    pub fn new(beneficiary: Address, fee_rate: U256) -> Self {
        Self { beneficiary, fee_rate }
    }
}

/// Fee share granted to a partner or affiliate. `fee_rate` is [`super::WAD`] based.
///
/// `protocol`, when set, replaces the registry wide protocol fee for swaps attributed to
/// this partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerRecord {
    pub beneficiary: Address,
    pub fee_rate: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<FeeShare>,
}

impl PartnerRecord {
    pub fn new(beneficiary: Address, fee_rate: U256) -> Self {
        Self { beneficiary, fee_rate, protocol: None }
    }

    pub fn with_protocol(mut self, protocol: FeeShare) -> Self {
        self.protocol = Some(protocol);
        self
    }
}

/// Record of one settled swap, emitted for off-chain indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementEvent {
    pub user: Address,
    pub source_token: Address,
    pub destination_token: Address,
    pub source_amount: U256,
    pub destination_amount: U256,
    pub partner: PartnerId,
    pub fee_amount: U256,
}
