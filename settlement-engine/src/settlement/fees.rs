use alloy_primitives::{Address, U256};
use settlement_common::{ledger::Ledger, models::PartnerId};
use tracing::debug;

use super::{SettlementEngine, SettlementError};

impl SettlementEngine {
    /// Pays the partner and protocol fees owed on `amount` of `token` out of the engine's
    /// balance and returns the total fee.
    pub(super) fn take_fee(
        &self,
        ledger: &mut Ledger,
        partner: PartnerId,
        token: Address,
        amount: U256,
    ) -> Result<U256, SettlementError> {
        let split = self.registry()?.fee_split(partner, amount)?;
        let total = split.total();
        if total > amount {
            return Err(SettlementError::Configuration(format!(
                "fee {total} exceeds the amount {amount} it is taken from"
            )));
        }
        let engine = self.address();
        ledger.transfer(token, engine, split.partner_beneficiary, split.partner_fee)?;
        ledger.transfer(token, engine, split.protocol_beneficiary, split.protocol_fee)?;
        debug!(
            %partner,
            %token,
            partner_fee = %split.partner_fee,
            protocol_fee = %split.protocol_fee,
            "Fee taken"
        );
        Ok(total)
    }
}
