pub mod settlement;
pub mod swap;

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Address under which the chain's native asset is tracked.
pub const NATIVE_ASSET: Address = Address::ZERO;

/// Fixed point unit of fee and exchange rates: `WAD` represents a rate of 1 (100%).
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Identifier of a partner or affiliate record in the registry.
pub type PartnerId = Address;

/// Caller supplied, opaque identifier of a swap collection.
pub type CollectionId = B256;

pub fn is_native(token: Address) -> bool {
    token == NATIVE_ASSET
}

/// Multiplies `amount` by a [`WAD`] based `rate`, truncating toward zero.
///
/// Returns `None` if the intermediate product overflows.
pub fn mul_wad(amount: U256, rate: U256) -> Option<U256> {
    amount
        .checked_mul(rate)
        .map(|product| product / WAD)
}

/// Chain level environment a call executes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEnv {
    pub chain_id: u64,
    pub number: u64,
}

impl BlockEnv {
    pub fn new(chain_id: u64, number: u64) -> Self {
        Self { chain_id, number }
    }
}

/// Parameters of the external call submitting a swap collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallContext {
    pub sender: Address,
    /// Native asset attached to the call.
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub gas_price: U256,
}

impl CallContext {
    pub fn new(sender: Address, value: U256, gas_price: U256) -> Self {
        Self { sender, value, gas_price }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(10_000, 20_000_000_000_000_000, 200)]
    #[case(50_000, 10_000_000_000_000_000, 500)]
    #[case(99, 10_000_000_000_000_000, 0)]
    #[case(12_345, 0, 0)]
    fn test_mul_wad_truncates(#[case] amount: u64, #[case] rate: u64, #[case] expected: u64) {
        assert_eq!(mul_wad(U256::from(amount), U256::from(rate)), Some(U256::from(expected)));
    }

    #[test]
    fn test_mul_wad_overflow() {
        assert_eq!(mul_wad(U256::MAX, U256::from(2)), None);
    }
}
