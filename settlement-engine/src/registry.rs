//! Partner and affiliate fee registry.
//!
//! Maps a referring party's id to its fee share. Anyone may register themselves at a rate up
//! to the public cap; the owner may create or override records at any rate up to 100%.
//! Records are never deleted.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use settlement_common::models::{
    mul_wad,
    settlement::{FeeShare, PartnerRecord},
    PartnerId, WAD,
};
use thiserror::Error;
use tracing::{info, instrument};

use crate::access_control::{NotOwner, Ownership};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Caller {0} is not authorized")]
    Unauthorized(Address),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<NotOwner> for RegistryError {
    fn from(err: NotOwner) -> Self {
        RegistryError::Unauthorized(err.caller)
    }
}

/// Construction parameters of a [`PartnerRegistry`]. Rates are WAD based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    pub address: Address,
    pub owner: Address,
    pub protocol_beneficiary: Address,
    #[serde(default)]
    pub protocol_fee_rate: U256,
    pub public_rate_cap: U256,
}

/// A fee amount split between a partner and the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    pub partner_beneficiary: Address,
    pub partner_fee: U256,
    pub protocol_beneficiary: Address,
    pub protocol_fee: U256,
}

impl FeeSplit {
    pub fn total(&self) -> U256 {
        self.partner_fee + self.protocol_fee
    }
}

#[derive(Debug, Clone)]
pub struct PartnerRegistry {
    address: Address,
    ownership: Ownership,
    protocol: FeeShare,
    public_rate_cap: U256,
    nonce: u64,
    records: HashMap<PartnerId, PartnerRecord>,
}

impl PartnerRegistry {
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        ensure_rate_in_range(config.protocol_fee_rate)?;
        ensure_rate_in_range(config.public_rate_cap)?;
        Ok(Self {
            address: config.address,
            ownership: Ownership::new(config.owner),
            protocol: FeeShare::new(config.protocol_beneficiary, config.protocol_fee_rate),
            public_rate_cap: config.public_rate_cap,
            nonce: 0,
            records: HashMap::new(),
        })
    }

    pub fn owner(&self) -> Address {
        self.ownership.owner()
    }

    pub fn public_rate_cap(&self) -> U256 {
        self.public_rate_cap
    }

    pub fn protocol_fee(&self) -> FeeShare {
        self.protocol
    }

    /// Registers `beneficiary` at `requested_rate` and returns the new id.
    ///
    /// Rates above the public cap are rejected unless the caller is the owner.
    #[instrument(skip(self))]
    pub fn register_self(
        &mut self,
        caller: Address,
        beneficiary: Address,
        requested_rate: U256,
    ) -> Result<PartnerId, RegistryError> {
        if requested_rate > self.public_rate_cap && !self.ownership.is_owner(caller) {
            return Err(RegistryError::Unauthorized(caller));
        }
        ensure_rate_in_range(requested_rate)?;
        Ok(self.insert_new(PartnerRecord::new(beneficiary, requested_rate)))
    }

    /// Owner only. Creates a record when `id` is `None`, otherwise overwrites the record at `id`.
    ///
    /// `protocol` sets a protocol beneficiary and rate used instead of the registry wide
    /// protocol fee for this partner.
    #[instrument(skip(self))]
    pub fn override_register(
        &mut self,
        caller: Address,
        id: Option<PartnerId>,
        beneficiary: Address,
        rate: U256,
        protocol: Option<FeeShare>,
    ) -> Result<PartnerId, RegistryError> {
        self.ownership.ensure_owner(caller)?;
        ensure_rate_in_range(rate)?;
        let mut record = PartnerRecord::new(beneficiary, rate);
        if let Some(protocol) = protocol {
            ensure_rate_in_range(protocol.fee_rate)?;
            record = record.with_protocol(protocol);
        }
        match id {
            None => Ok(self.insert_new(record)),
            Some(id) => {
                let existing = self
                    .records
                    .get_mut(&id)
                    .ok_or_else(|| {
                        RegistryError::Configuration(format!("unknown partner id {id}"))
                    })?;
                *existing = record;
                info!(%id, %beneficiary, %rate, "Partner overridden");
                Ok(id)
            }
        }
    }

    /// Looks up a partner. Unregistered ids resolve to a zero rate paid to the protocol.
    pub fn rate_of(&self, id: PartnerId) -> PartnerRecord {
        self.records
            .get(&id)
            .copied()
            .unwrap_or(PartnerRecord::new(self.protocol.beneficiary, U256::ZERO))
    }

    pub fn is_registered(&self, id: PartnerId) -> bool {
        self.records.contains_key(&id)
    }

    /// Computes the fees owed on `amount` for `partner`. Each share is truncated separately.
    ///
    /// The protocol share follows the partner's override when one is set.
    pub fn fee_split(&self, partner: PartnerId, amount: U256) -> Result<FeeSplit, RegistryError> {
        let record = self.rate_of(partner);
        let protocol = record.protocol.unwrap_or(self.protocol);
        let overflow =
            || RegistryError::Configuration(format!("fee computation overflows for {amount}"));
        Ok(FeeSplit {
            partner_beneficiary: record.beneficiary,
            partner_fee: mul_wad(amount, record.fee_rate).ok_or_else(overflow)?,
            protocol_beneficiary: protocol.beneficiary,
            protocol_fee: mul_wad(amount, protocol.fee_rate).ok_or_else(overflow)?,
        })
    }

    pub fn set_protocol_fee(
        &mut self,
        caller: Address,
        beneficiary: Address,
        rate: U256,
    ) -> Result<(), RegistryError> {
        self.ownership.ensure_owner(caller)?;
        ensure_rate_in_range(rate)?;
        self.protocol = FeeShare::new(beneficiary, rate);
        info!(%beneficiary, %rate, "Protocol fee updated");
        Ok(())
    }

    pub fn transfer_ownership(
        &mut self,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), RegistryError> {
        Ok(self.ownership.transfer(caller, new_owner)?)
    }

    fn insert_new(&mut self, record: PartnerRecord) -> PartnerId {
        let id = self.address.create(self.nonce);
        self.nonce += 1;
        self.records.insert(id, record);
        info!(
            %id,
            beneficiary = %record.beneficiary,
            rate = %record.fee_rate,
            "Partner registered"
        );
        id
    }
}

fn ensure_rate_in_range(rate: U256) -> Result<(), RegistryError> {
    if rate > WAD {
        return Err(RegistryError::Configuration(format!("rate {rate} exceeds 100%")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const OWNER: Address = Address::repeat_byte(0x01);
    const PROTOCOL: Address = Address::repeat_byte(0x0f);
    const PARTNER: Address = Address::repeat_byte(0x02);

    /// 1%
    const CAP: u64 = 10_000_000_000_000_000;

    fn registry(protocol_fee_rate: u64) -> PartnerRegistry {
        PartnerRegistry::new(RegistryConfig {
            address: Address::repeat_byte(0x0e),
            owner: OWNER,
            protocol_beneficiary: PROTOCOL,
            protocol_fee_rate: U256::from(protocol_fee_rate),
            public_rate_cap: U256::from(CAP),
        })
        .unwrap()
    }

    #[test]
    fn test_register_self_within_cap() {
        let mut registry = registry(0);

        let id = registry
            .register_self(PARTNER, PARTNER, U256::from(1_000))
            .unwrap();

        assert_eq!(registry.rate_of(id), PartnerRecord::new(PARTNER, U256::from(1_000)));
    }

    #[test]
    fn test_register_self_above_cap_is_rejected() {
        let mut registry = registry(0);

        let err = registry
            .register_self(PARTNER, PARTNER, U256::from(CAP + 1))
            .unwrap_err();

        assert_eq!(err, RegistryError::Unauthorized(PARTNER));
    }

    #[test]
    fn test_owner_may_register_above_cap() {
        let mut registry = registry(0);

        let id = registry
            .register_self(OWNER, PARTNER, U256::from(CAP * 3))
            .unwrap();

        assert_eq!(registry.rate_of(id).fee_rate, U256::from(CAP * 3));
    }

    #[test]
    fn test_override_register_by_non_owner() {
        let mut registry = registry(0);

        let err = registry
            .override_register(PARTNER, None, PARTNER, U256::from(1_000), None)
            .unwrap_err();

        assert_eq!(err, RegistryError::Unauthorized(PARTNER));
    }

    #[test]
    fn test_override_register_overwrites_record() {
        let mut registry = registry(0);
        let id = registry
            .register_self(PARTNER, PARTNER, U256::from(1_000))
            .unwrap();
        let beneficiary = Address::repeat_byte(0x03);

        let overridden = registry
            .override_register(OWNER, Some(id), beneficiary, U256::ZERO, None)
            .unwrap();

        assert_eq!(overridden, id);
        assert_eq!(registry.rate_of(id), PartnerRecord::new(beneficiary, U256::ZERO));
    }

    #[test]
    fn test_override_register_unknown_id() {
        let mut registry = registry(0);

        let err = registry
            .override_register(OWNER, Some(Address::repeat_byte(0x99)), PARTNER, U256::ZERO, None)
            .unwrap_err();

        assert!(matches!(err, RegistryError::Configuration(_)));
    }

    #[test]
    fn test_ids_are_unique() {
        let mut registry = registry(0);

        let first = registry
            .register_self(PARTNER, PARTNER, U256::ZERO)
            .unwrap();
        let second = registry
            .register_self(PARTNER, PARTNER, U256::ZERO)
            .unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_unregistered_partner_resolves_to_protocol() {
        let registry = registry(CAP);

        assert_eq!(
            registry.rate_of(Address::repeat_byte(0x55)),
            PartnerRecord::new(PROTOCOL, U256::ZERO)
        );
    }

    #[rstest]
    // 2% partner, no protocol fee
    #[case(20_000_000_000_000_000, 0, 10_000, 200, 0)]
    // 2% partner, 1% protocol fee
    #[case(20_000_000_000_000_000, 10_000_000_000_000_000, 10_000, 200, 100)]
    // protocol only
    #[case(0, 10_000_000_000_000_000, 50_000, 0, 500)]
    fn test_fee_split(
        #[case] partner_rate: u64,
        #[case] protocol_rate: u64,
        #[case] amount: u64,
        #[case] partner_fee: u64,
        #[case] protocol_fee: u64,
    ) {
        let mut registry = registry(protocol_rate);
        let id = registry
            .override_register(OWNER, None, PARTNER, U256::from(partner_rate), None)
            .unwrap();

        let split = registry
            .fee_split(id, U256::from(amount))
            .unwrap();

        assert_eq!(split.partner_fee, U256::from(partner_fee));
        assert_eq!(split.protocol_fee, U256::from(protocol_fee));
        assert_eq!(split.total(), U256::from(partner_fee + protocol_fee));
        assert_eq!(split.partner_beneficiary, PARTNER);
        assert_eq!(split.protocol_beneficiary, PROTOCOL);
    }

    #[test]
    fn test_rate_above_hundred_percent() {
        let mut registry = registry(0);

        let err = registry
            .override_register(OWNER, None, PARTNER, WAD + U256::from(1), None)
            .unwrap_err();

        assert!(matches!(err, RegistryError::Configuration(_)));
    }

    #[test]
    fn test_override_register_with_protocol_share() {
        let mut registry = registry(CAP);
        let company = Address::repeat_byte(0x0c);
        // 2% partner, 0.5% protocol to `company` instead of 1% to PROTOCOL
        let id = registry
            .override_register(
                OWNER,
                None,
                PARTNER,
                U256::from(2 * CAP),
                Some(FeeShare::new(company, U256::from(CAP / 2))),
            )
            .unwrap();
        let plain = registry
            .register_self(PARTNER, PARTNER, U256::from(2 * CAP))
            .unwrap();

        let split = registry
            .fee_split(id, U256::from(10_000))
            .unwrap();
        let default_split = registry
            .fee_split(plain, U256::from(10_000))
            .unwrap();

        assert_eq!(
            split,
            FeeSplit {
                partner_beneficiary: PARTNER,
                partner_fee: U256::from(200),
                protocol_beneficiary: company,
                protocol_fee: U256::from(50),
            }
        );
        assert_eq!(default_split.protocol_beneficiary, PROTOCOL);
        assert_eq!(default_split.protocol_fee, U256::from(100));
    }

    #[test]
    fn test_override_register_rejects_protocol_rate_above_hundred_percent() {
        let mut registry = registry(0);

        let err = registry
            .override_register(
                OWNER,
                None,
                PARTNER,
                U256::ZERO,
                Some(FeeShare::new(PROTOCOL, WAD + U256::from(1))),
            )
            .unwrap_err();

        assert!(matches!(err, RegistryError::Configuration(_)));
        assert_eq!(registry.nonce, 0);
    }
}
