//! Canonical hashing and signing of swap collections.
//!
//! The hash commits to every field of the collection except the signature, plus the chain id
//! and the submitting sender, so a signed intent cannot be replayed on another chain or by
//! another user. The trusted signer signs the hash as an EIP-191 personal message.

use alloy::signers::{local::PrivateKeySigner, SignerSync};
use alloy_primitives::{keccak256, Address, Signature, B256, U256};
use alloy_sol_types::{sol, SolValue};
use settlement_common::models::swap::{Order, Swap, SwapCollection, Trade};

use crate::settlement::AuthorizationError;

// Layout of the signed payload, matching the on-chain `abi.encode` of the collection.
sol! {
    struct OrderData {
        address exchangeHandler;
        bytes encodedPayload;
    }

    struct TradeData {
        address sourceToken;
        address destinationToken;
        uint256 amount;
        OrderData[] orders;
    }

    struct SwapData {
        TradeData[] trades;
        uint256 minimumExchangeRate;
        uint256 minimumDestinationAmount;
        uint256 sourceAmount;
        uint256 tradeToTakeFeeFrom;
        bool takeFeeFromSource;
        address redirectAddress;
    }
}

impl From<&Order> for OrderData {
    fn from(order: &Order) -> Self {
        Self {
            exchangeHandler: order.exchange_handler,
            encodedPayload: order.encoded_payload.clone(),
        }
    }
}

impl From<&Trade> for TradeData {
    fn from(trade: &Trade) -> Self {
        Self {
            sourceToken: trade.source_token,
            destinationToken: trade.destination_token,
            amount: trade.amount,
            orders: trade.orders.iter().map(OrderData::from).collect(),
        }
    }
}

impl From<&Swap> for SwapData {
    fn from(swap: &Swap) -> Self {
        Self {
            trades: swap.trades.iter().map(TradeData::from).collect(),
            minimumExchangeRate: swap.minimum_exchange_rate,
            minimumDestinationAmount: swap.minimum_destination_amount,
            sourceAmount: swap.source_amount,
            tradeToTakeFeeFrom: U256::from(swap.trade_to_take_fee_from),
            takeFeeFromSource: swap.take_fee_from_source,
            redirectAddress: swap.redirect_address,
        }
    }
}

/// Hash the trusted signer signs for `collection` submitted by `sender`.
pub fn signing_hash(collection: &SwapCollection, sender: Address) -> B256 {
    let swaps: Vec<SwapData> = collection
        .swaps
        .iter()
        .map(SwapData::from)
        .collect();
    let encoded = (
        U256::from(collection.chain_id),
        swaps,
        collection.partner,
        U256::from(collection.expiration_block),
        collection.id,
        collection.max_gas_price,
        sender,
    )
        .abi_encode_params();
    keccak256(encoded)
}

/// Recovers the address that signed `collection` for `sender`.
pub fn recover_signer(
    collection: &SwapCollection,
    sender: Address,
) -> Result<Address, AuthorizationError> {
    let signature = collection
        .signature
        .as_ref()
        .ok_or(AuthorizationError::MissingSignature)?;
    signature
        .recover_address_from_msg(signing_hash(collection, sender))
        .map_err(|err| AuthorizationError::InvalidSignature(err.to_string()))
}

pub fn sign_collection(
    signer: &PrivateKeySigner,
    collection: &SwapCollection,
    sender: Address,
) -> Result<Signature, alloy::signers::Error> {
    signer.sign_message_sync(signing_hash(collection, sender).as_slice())
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Bytes;
    use settlement_common::models::NATIVE_ASSET;

    use super::*;

    fn collection() -> SwapCollection {
        SwapCollection {
            chain_id: 1,
            swaps: vec![Swap {
                trades: vec![Trade {
                    source_token: NATIVE_ASSET,
                    destination_token: Address::repeat_byte(0x11),
                    amount: U256::from(50_000),
                    orders: vec![Order::new(
                        Address::repeat_byte(0x22),
                        Bytes::from(vec![1, 2, 3]),
                    )],
                }],
                minimum_exchange_rate: U256::ZERO,
                minimum_destination_amount: U256::ZERO,
                source_amount: U256::from(50_000),
                trade_to_take_fee_from: 0,
                take_fee_from_source: true,
                redirect_address: Address::ZERO,
            }],
            partner: Address::repeat_byte(0x33),
            expiration_block: 100,
            max_gas_price: U256::from(100_000_000_000u64),
            id: B256::repeat_byte(0x44),
            signature: None,
        }
    }

    #[test]
    fn test_sign_and_recover() {
        let signer = PrivateKeySigner::random();
        let sender = Address::repeat_byte(0xaa);
        let unsigned = collection();
        let signature = sign_collection(&signer, &unsigned, sender).unwrap();

        let recovered = recover_signer(&unsigned.with_signature(signature), sender).unwrap();

        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn test_hash_binds_chain_id_and_sender() {
        let sender = Address::repeat_byte(0xaa);
        let base = signing_hash(&collection(), sender);

        let mut other_chain = collection();
        other_chain.chain_id = 5;

        assert_ne!(signing_hash(&other_chain, sender), base);
        assert_ne!(signing_hash(&collection(), Address::repeat_byte(0xbb)), base);
    }

    #[test]
    fn test_hash_ignores_signature() {
        let signer = PrivateKeySigner::random();
        let sender = Address::repeat_byte(0xaa);
        let signature = sign_collection(&signer, &collection(), sender).unwrap();

        assert_eq!(
            signing_hash(&collection().with_signature(signature), sender),
            signing_hash(&collection(), sender)
        );
    }

    #[test]
    fn test_missing_signature() {
        assert_eq!(
            recover_signer(&collection(), Address::ZERO),
            Err(AuthorizationError::MissingSignature)
        );
    }
}
