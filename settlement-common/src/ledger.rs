//! In-memory model of asset balances and allowances on a single chain.
//!
//! Every asset, including the native one, is tracked per `(token, holder)` pair. The native
//! asset lives under [`NATIVE_ASSET`] and cannot be approved. Reverting a unit of work is done
//! by taking a [`Ledger::snapshot`] before it and handing it back to [`Ledger::restore`].
//!
//! Venue handlers never see the ledger directly while executing an order. They get a
//! [`ScopedLedger`], which can only debit the accounts the handler controls and cannot spend
//! allowances.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};

use crate::{errors::LedgerError, models::NATIVE_ASSET};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.balances
            .get(&(token, holder))
            .copied()
            .unwrap_or_default()
    }

    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default()
    }

    /// Sum of all balances of `token`.
    pub fn total_supply(&self, token: Address) -> U256 {
        self.balances
            .iter()
            .filter(|((t, _), _)| *t == token)
            .fold(U256::ZERO, |acc, (_, amount)| acc.saturating_add(*amount))
    }

    /// Credits `amount` of `token` to `holder` out of thin air. Used to seed genesis state.
    pub fn mint(
        &mut self,
        token: Address,
        holder: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        let balance = self.balances.entry((token, holder)).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { token, holder })?;
        Ok(())
    }

    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        let available = self.balance_of(token, from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                token,
                holder: from,
                required: amount,
                available,
            });
        }
        if amount.is_zero() || from == to {
            return Ok(());
        }
        let receiver = self.balance_of(token, to);
        let credited = receiver
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { token, holder: to })?;
        self.balances
            .insert((token, from), available - amount);
        self.balances.insert((token, to), credited);
        Ok(())
    }

    pub fn approve(
        &mut self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        if token == NATIVE_ASSET {
            return Err(LedgerError::NativeAllowance);
        }
        self.allowances
            .insert((token, owner, spender), amount);
        Ok(())
    }

    /// Moves `amount` from `from` to `to` on behalf of `spender`, consuming allowance.
    ///
    /// An allowance of `U256::MAX` is treated as unlimited and never decremented.
    pub fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        if token == NATIVE_ASSET {
            return Err(LedgerError::NativeAllowance);
        }
        let allowance = self.allowance(token, from, spender);
        if allowance < amount {
            return Err(LedgerError::InsufficientAllowance {
                token,
                owner: from,
                spender,
                required: amount,
                available: allowance,
            });
        }
        self.transfer(token, from, to, amount)?;
        if allowance != U256::MAX {
            self.allowances
                .insert((token, from, spender), allowance - amount);
        }
        Ok(())
    }

    /// Non-zero balances as `(token, holder, amount)`, in no particular order.
    pub fn balances(&self) -> impl Iterator<Item = (Address, Address, U256)> + '_ {
        self.balances
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|((token, holder), amount)| (*token, *holder, *amount))
    }

    pub fn snapshot(&self) -> Ledger {
        self.clone()
    }

    pub fn restore(&mut self, snapshot: Ledger) {
        *self = snapshot;
    }
}

/// Write access to a [`Ledger`] restricted to a fixed set of debitable accounts.
///
/// Any holder may be credited; only `debitable` holders may be debited. Allowances are not
/// exposed, so approvals granted to other spenders cannot be used through it.
#[derive(Debug)]
pub struct ScopedLedger {
    ledger: Ledger,
    debitable: Vec<Address>,
}

impl ScopedLedger {
    pub fn new(ledger: Ledger, debitable: Vec<Address>) -> Self {
        Self { ledger, debitable }
    }

    /// Read-only view of the whole ledger.
    pub fn view(&self) -> &Ledger {
        &self.ledger
    }

    pub fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.ledger.balance_of(token, holder)
    }

    pub fn can_debit(&self, holder: Address) -> bool {
        self.debitable.contains(&holder)
    }

    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        if !self.can_debit(from) {
            return Err(LedgerError::UnauthorizedDebit { token, holder: from });
        }
        self.ledger
            .transfer(token, from, to, amount)
    }

    pub fn into_inner(self) -> Ledger {
        self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: Address = Address::repeat_byte(0x11);
    const ALICE: Address = Address::repeat_byte(0xa1);
    const BOB: Address = Address::repeat_byte(0xb0);

    fn funded() -> Ledger {
        let mut ledger = Ledger::new();
        ledger
            .mint(TOKEN, ALICE, U256::from(1000))
            .unwrap();
        ledger
    }

    #[test]
    fn test_transfer_moves_balance() {
        let mut ledger = funded();

        ledger
            .transfer(TOKEN, ALICE, BOB, U256::from(400))
            .unwrap();

        assert_eq!(ledger.balance_of(TOKEN, ALICE), U256::from(600));
        assert_eq!(ledger.balance_of(TOKEN, BOB), U256::from(400));
        assert_eq!(ledger.total_supply(TOKEN), U256::from(1000));
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let mut ledger = funded();

        let err = ledger
            .transfer(TOKEN, ALICE, BOB, U256::from(1001))
            .unwrap_err();

        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                token: TOKEN,
                holder: ALICE,
                required: U256::from(1001),
                available: U256::from(1000),
            }
        );
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let mut ledger = funded();
        ledger
            .approve(TOKEN, ALICE, BOB, U256::from(300))
            .unwrap();

        ledger
            .transfer_from(TOKEN, BOB, ALICE, BOB, U256::from(200))
            .unwrap();

        assert_eq!(ledger.allowance(TOKEN, ALICE, BOB), U256::from(100));
        assert!(matches!(
            ledger.transfer_from(TOKEN, BOB, ALICE, BOB, U256::from(101)),
            Err(LedgerError::InsufficientAllowance { .. })
        ));
    }

    #[test]
    fn test_native_asset_cannot_be_approved() {
        let mut ledger = funded();

        assert_eq!(
            ledger.approve(NATIVE_ASSET, ALICE, BOB, U256::from(1)),
            Err(LedgerError::NativeAllowance)
        );
    }

    #[test]
    fn test_restore_snapshot() {
        let mut ledger = funded();
        let snapshot = ledger.snapshot();

        ledger
            .transfer(TOKEN, ALICE, BOB, U256::from(10))
            .unwrap();
        ledger.restore(snapshot);

        assert_eq!(ledger, funded());
    }

    #[test]
    fn test_scoped_ledger_debits_only_its_accounts() {
        let mut scoped = ScopedLedger::new(funded(), vec![BOB]);

        let err = scoped
            .transfer(TOKEN, ALICE, BOB, U256::from(1))
            .unwrap_err();

        assert_eq!(err, LedgerError::UnauthorizedDebit { token: TOKEN, holder: ALICE });
        assert_eq!(scoped.into_inner(), funded());
    }

    #[test]
    fn test_scoped_ledger_credits_anyone() {
        let mut ledger = funded();
        ledger
            .transfer(TOKEN, ALICE, BOB, U256::from(100))
            .unwrap();
        let mut scoped = ScopedLedger::new(ledger, vec![BOB]);

        scoped
            .transfer(TOKEN, BOB, ALICE, U256::from(40))
            .unwrap();

        assert_eq!(scoped.balance_of(TOKEN, ALICE), U256::from(940));
        assert_eq!(scoped.view().balance_of(TOKEN, BOB), U256::from(60));
    }
}
