use alloy_primitives::Address;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{caller} is not the owner")]
pub struct NotOwner {
    pub caller: Address,
}

/// Owner capability guarding administrative operations of shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    owner: Address,
}

impl Ownership {
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn is_owner(&self, caller: Address) -> bool {
        caller == self.owner
    }

    pub fn ensure_owner(&self, caller: Address) -> Result<(), NotOwner> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            Err(NotOwner { caller })
        }
    }

    pub fn transfer(&mut self, caller: Address, new_owner: Address) -> Result<(), NotOwner> {
        self.ensure_owner(caller)?;
        info!(previous = %self.owner, %new_owner, "Ownership transferred");
        self.owner = new_owner;
        Ok(())
    }
}
