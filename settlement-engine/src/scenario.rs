//! Self-contained settlement runs for the `simulate` command.
//!
//! A scenario file describes the full environment of one `execute_swap_collection` call:
//! component configs, genesis balances and allowances, constant product venues, partner
//! registrations, the block and call context, and the collection itself.

use std::{
    fs::File,
    io::Read,
    str::FromStr,
    sync::{Arc, RwLock},
};

use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use settlement_common::{
    errors::LedgerError,
    ledger::Ledger,
    models::{swap::SwapCollection, BlockEnv, CallContext, PartnerId},
};
use thiserror::Error;
use tracing::{info, instrument};

use crate::{
    config::{EngineConfig, GateConfig},
    gate::{TransferError, TransferGate},
    handlers::{constant_product::ConstantProductHandler, HandlerRegistry},
    registry::{PartnerRegistry, RegistryConfig, RegistryError},
    settlement::{SettlementEngine, SettlementReport},
    signature::sign_collection,
};

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Failed to read scenario: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse scenario: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid signer key: {0}")]
    SignerKey(String),
    #[error("Failed to sign collection: {0}")]
    Signing(#[from] alloy::signers::Error),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceEntry {
    pub token: Address,
    pub holder: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowanceEntry {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeConfig {
    pub exchange: Address,
    pub token: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstantProductConfig {
    pub address: Address,
    #[serde(default)]
    pub exchanges: Vec<ExchangeConfig>,
}

/// A partner registration, replayed through `register_self` in file order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerRegistration {
    pub caller: Address,
    pub beneficiary: Address,
    pub rate: U256,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub engine: EngineConfig,
    pub gate: GateConfig,
    pub registry: RegistryConfig,
    #[serde(default)]
    pub constant_product_handlers: Vec<ConstantProductConfig>,
    #[serde(default)]
    pub partners: Vec<PartnerRegistration>,
    #[serde(default)]
    pub balances: Vec<BalanceEntry>,
    #[serde(default)]
    pub allowances: Vec<AllowanceEntry>,
    pub block: BlockEnv,
    pub call: CallContext,
    pub collection: SwapCollection,
    /// Signs an unsigned collection for `call.sender` before settling it.
    #[serde(default)]
    pub signer_key: Option<String>,
}

/// Result of a scenario run. Exactly one of `report` and `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioOutcome {
    pub partners: Vec<PartnerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SettlementReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub balances: Vec<BalanceEntry>,
}

impl Scenario {
    pub fn from_yaml(path: &str) -> Result<Self, ScenarioError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Builds the environment, settles the collection and reports the final balances.
    ///
    /// Setup failures are returned as errors; a rejected collection is part of the outcome.
    #[instrument(skip_all, fields(id = %self.collection.id))]
    pub fn run(&self) -> Result<ScenarioOutcome, ScenarioError> {
        let mut ledger = Ledger::new();
        for entry in &self.balances {
            ledger.mint(entry.token, entry.holder, entry.amount)?;
        }
        for entry in &self.allowances {
            ledger.approve(entry.token, entry.owner, entry.spender, entry.amount)?;
        }

        let mut gate = TransferGate::new(self.gate.address, self.gate.owner);
        for address in &self.gate.authorized {
            gate.add_authorized_address(self.gate.owner, *address)?;
        }

        let mut registry = PartnerRegistry::new(self.registry.clone())?;
        let partners = self
            .partners
            .iter()
            .map(|partner| {
                registry.register_self(partner.caller, partner.beneficiary, partner.rate)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut handlers = HandlerRegistry::new();
        for config in &self.constant_product_handlers {
            let mut handler = ConstantProductHandler::new(config.address);
            for exchange in &config.exchanges {
                handler.register_exchange(exchange.exchange, exchange.token);
            }
            handlers.register(Arc::new(handler));
        }

        let collection = self.signed_collection()?;
        let mut engine = SettlementEngine::new(
            self.engine.clone(),
            Arc::new(RwLock::new(gate)),
            Arc::new(RwLock::new(registry)),
            handlers,
        );
        let result =
            engine.execute_swap_collection(&mut ledger, &self.block, &self.call, &collection);
        let (report, error) = match result {
            Ok(report) => (Some(report), None),
            Err(err) => (None, Some(err.to_string())),
        };
        info!(settled = report.is_some(), "Scenario finished");

        let mut balances: Vec<BalanceEntry> = ledger
            .balances()
            .map(|(token, holder, amount)| BalanceEntry { token, holder, amount })
            .collect();
        balances.sort_by(|a, b| (a.token, a.holder).cmp(&(b.token, b.holder)));

        Ok(ScenarioOutcome { partners, report, error, balances })
    }

    fn signed_collection(&self) -> Result<SwapCollection, ScenarioError> {
        match (&self.collection.signature, &self.signer_key) {
            (None, Some(key)) => {
                let signer = PrivateKeySigner::from_str(key)
                    .map_err(|err| ScenarioError::SignerKey(err.to_string()))?;
                let signature = sign_collection(&signer, &self.collection, self.call.sender)?;
                Ok(self
                    .collection
                    .clone()
                    .with_signature(signature))
            }
            _ => Ok(self.collection.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::hex;
    use settlement_common::models::NATIVE_ASSET;

    use super::*;
    use crate::handlers::constant_product::ExchangeOrder;

    const SIGNER_KEY: &str = "0x0101010101010101010101010101010101010101010101010101010101010101";
    const USER: Address = Address::repeat_byte(0xaa);
    const TOKEN: Address = Address::repeat_byte(0x70);
    const EXCHANGE: Address = Address::repeat_byte(0xe0);
    const HANDLER: Address = Address::repeat_byte(0x0c);

    fn scenario() -> Scenario {
        let payload = hex::encode_prefixed(ExchangeOrder::encode(EXCHANGE, U256::from(1_000_000)));
        let yaml = format!(
            r#"
engine:
  address: "0x00000000000000000000000000000000000000e9"
  signer: "0x0000000000000000000000000000000000000000"
gate:
  address: "0x00000000000000000000000000000000000000a7"
  owner: "0x00000000000000000000000000000000000000f0"
  authorized: ["0x00000000000000000000000000000000000000e9"]
registry:
  address: "0x00000000000000000000000000000000000000f1"
  owner: "0x00000000000000000000000000000000000000f0"
  protocolBeneficiary: "0x00000000000000000000000000000000000000f2"
  publicRateCap: "10000000000000000"
constantProductHandlers:
  - address: "{HANDLER}"
    exchanges:
      - exchange: "{EXCHANGE}"
        token: "{TOKEN}"
balances:
  - token: "{NATIVE_ASSET}"
    holder: "{EXCHANGE}"
    amount: "20000000000"
  - token: "{TOKEN}"
    holder: "{EXCHANGE}"
    amount: "10000000000"
  - token: "{NATIVE_ASSET}"
    holder: "{USER}"
    amount: "1000000"
block:
  chainId: 1
  number: 10
call:
  sender: "{USER}"
  value: "1000000"
collection:
  chainId: 1
  swaps:
    - trades:
        - sourceToken: "{NATIVE_ASSET}"
          destinationToken: "{TOKEN}"
          amount: "1000000"
          orders:
            - exchangeHandler: "{HANDLER}"
              encodedPayload: "{payload}"
      sourceAmount: "1000000"
  expirationBlock: 100
  maxGasPrice: "0"
  id: "0x0000000000000000000000000000000000000000000000000000000000000001"
signerKey: "{SIGNER_KEY}"
"#
        );
        let mut scenario = Scenario::from_yaml_str(&yaml).unwrap();
        scenario.engine.signer = PrivateKeySigner::from_str(SIGNER_KEY)
            .unwrap()
            .address();
        scenario
    }

    fn balance(outcome: &ScenarioOutcome, token: Address, holder: Address) -> U256 {
        outcome
            .balances
            .iter()
            .find(|entry| entry.token == token && entry.holder == holder)
            .map(|entry| entry.amount)
            .unwrap_or_default()
    }

    #[test]
    fn test_run_settles_collection() {
        let outcome = scenario().run().unwrap();

        assert_eq!(outcome.error, None);
        let report = outcome.report.as_ref().unwrap();
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].destination_amount, U256::from(498_475));
        assert_eq!(balance(&outcome, TOKEN, USER), U256::from(498_475));
        assert_eq!(balance(&outcome, NATIVE_ASSET, USER), U256::ZERO);
        assert_eq!(balance(&outcome, NATIVE_ASSET, EXCHANGE), U256::from(20_001_000_000u64));
    }

    #[test]
    fn test_run_reports_rejected_collection() {
        let mut scenario = scenario();
        scenario.engine.signer = Address::repeat_byte(0x01);

        let outcome = scenario.run().unwrap();

        assert!(outcome.report.is_none());
        assert!(outcome
            .error
            .as_deref()
            .unwrap()
            .starts_with("Authorization error"));
        assert_eq!(balance(&outcome, NATIVE_ASSET, USER), U256::from(1_000_000));
    }

    #[test]
    fn test_invalid_signer_key() {
        let mut scenario = scenario();
        scenario.signer_key = Some("not a key".into());

        assert!(matches!(scenario.run(), Err(ScenarioError::SignerKey(_))));
    }
}
