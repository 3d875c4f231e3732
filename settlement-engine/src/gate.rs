//! Transfer authorization gate.
//!
//! Users approve the gate once. Any address in the gate's authorized set may then pull an
//! approved user's tokens, which decouples user approvals from orchestrator upgrades.

use std::collections::BTreeSet;

use alloy_primitives::{Address, U256};
use settlement_common::{errors::LedgerError, ledger::Ledger};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::access_control::{NotOwner, Ownership};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Caller {0} is not authorized")]
    Unauthorized(Address),
    #[error(
        "Insufficient allowance of {token} from {user}: required {required}, available {available}"
    )]
    InsufficientAllowance { token: Address, user: Address, required: U256, available: U256 },
    #[error("Address {0} is already authorized")]
    AlreadyAuthorized(Address),
    #[error("Address {0} is not authorized")]
    NotAuthorized(Address),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<NotOwner> for TransferError {
    fn from(err: NotOwner) -> Self {
        TransferError::Unauthorized(err.caller)
    }
}

#[derive(Debug, Clone)]
pub struct TransferGate {
    address: Address,
    ownership: Ownership,
    authorized: BTreeSet<Address>,
}

impl TransferGate {
    pub fn new(address: Address, owner: Address) -> Self {
        Self { address, ownership: Ownership::new(owner), authorized: BTreeSet::new() }
    }

    /// Address users approve as spender.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.ownership.owner()
    }

    pub fn is_authorized(&self, address: Address) -> bool {
        self.authorized.contains(&address)
    }

    pub fn authorized_addresses(&self) -> Vec<Address> {
        self.authorized.iter().copied().collect()
    }

    /// Moves `amount` of `token` from `user` to `caller`.
    #[instrument(skip(self, ledger), fields(gate = %self.address))]
    pub fn transfer_from(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        user: Address,
        amount: U256,
        token: Address,
    ) -> Result<(), TransferError> {
        if !self.is_authorized(caller) {
            return Err(TransferError::Unauthorized(caller));
        }
        let available = ledger.allowance(token, user, self.address);
        if available < amount {
            return Err(TransferError::InsufficientAllowance {
                token,
                user,
                required: amount,
                available,
            });
        }
        ledger.transfer_from(token, self.address, user, caller, amount)?;
        debug!("Pulled user funds");
        Ok(())
    }

    pub fn add_authorized_address(
        &mut self,
        caller: Address,
        address: Address,
    ) -> Result<(), TransferError> {
        self.ownership.ensure_owner(caller)?;
        if !self.authorized.insert(address) {
            return Err(TransferError::AlreadyAuthorized(address));
        }
        info!(%address, "Authorized address added");
        Ok(())
    }

    pub fn remove_authorized_address(
        &mut self,
        caller: Address,
        address: Address,
    ) -> Result<(), TransferError> {
        self.ownership.ensure_owner(caller)?;
        if !self.authorized.remove(&address) {
            return Err(TransferError::NotAuthorized(address));
        }
        info!(%address, "Authorized address removed");
        Ok(())
    }

    pub fn transfer_ownership(
        &mut self,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), TransferError> {
        Ok(self.ownership.transfer(caller, new_owner)?)
    }
}
