use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// What happens to a collection when one of its swaps fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum SwapFailurePolicy {
    /// Revert the whole collection.
    #[default]
    AbortCollection,
    /// Revert only the failing swap and settle its siblings.
    SkipSwap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Address under which the engine holds funds while settling.
    pub address: Address,
    /// The only signer whose swap collections are accepted.
    pub signer: Address,
    /// Reject a `(sender, id)` pair that has already settled.
    #[serde(default = "default_replay_protection")]
    pub replay_protection: bool,
    #[serde(default)]
    pub swap_failure_policy: SwapFailurePolicy,
}

impl EngineConfig {
    pub fn new(address: Address, signer: Address) -> Self {
        Self {
            address,
            signer,
            replay_protection: default_replay_protection(),
            swap_failure_policy: SwapFailurePolicy::default(),
        }
    }
}

fn default_replay_protection() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateConfig {
    pub address: Address,
    pub owner: Address,
    /// Addresses authorized to pull funds, usually just the engine.
    #[serde(default)]
    pub authorized: Vec<Address>,
}
