//! Test venues with predictable pricing.

use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolValue};
use settlement_common::{
    errors::HandlerError,
    ledger::{Ledger, ScopedLedger},
    models::settlement::HandlerResult,
    traits::{OrderContext, OrderSide, VenueHandler},
};

sol! {
    struct FixedRateOrder {
        address sourceToken;
        address destinationToken;
        uint256 amountToGive;
    }
}

impl FixedRateOrder {
    pub fn encode(
        source_token: Address,
        destination_token: Address,
        amount_to_give: U256,
    ) -> Vec<u8> {
        Self {
            sourceToken: source_token,
            destinationToken: destination_token,
            amountToGive: amount_to_give,
        }
        .abi_encode()
    }
}

/// Trades the native asset for `token` at `rate` tokens per wei, out of its own inventory.
///
/// Orders it cannot cover from inventory are filled with an empty result.
#[derive(Debug, Clone)]
pub struct FixedRateHandler {
    pub address: Address,
    pub token: Address,
    pub rate: U256,
}

impl FixedRateHandler {
    pub fn new(address: Address, token: Address, rate: u64) -> Self {
        Self { address, token, rate: U256::from(rate) }
    }

    fn decode(
        &self,
        ctx: &OrderContext,
        payload: &[u8],
    ) -> Result<(OrderSide, FixedRateOrder), HandlerError> {
        let order = FixedRateOrder::abi_decode(payload)
            .map_err(|err| HandlerError::Decode(err.to_string()))?;
        if order.sourceToken != ctx.source_token ||
            order.destinationToken != ctx.destination_token
        {
            return Err(HandlerError::Unsupported(
                "payload does not match the order's tokens".into(),
            ));
        }
        match ctx.side() {
            Some(side) if ctx.token() == self.token => Ok((side, order)),
            _ => Err(HandlerError::Unsupported(format!("only trades {}", self.token))),
        }
    }

    fn amount_out(&self, side: OrderSide, amount_in: U256) -> U256 {
        match side {
            OrderSide::Buy => amount_in.saturating_mul(self.rate),
            OrderSide::Sell => amount_in
                .checked_div(self.rate)
                .unwrap_or_default(),
        }
    }
}

impl VenueHandler for FixedRateHandler {
    fn address(&self) -> Address {
        self.address
    }

    fn venue_accounts(&self) -> Vec<Address> {
        Vec::new()
    }

    fn get_amount_to_give(
        &self,
        _ledger: &Ledger,
        ctx: &OrderContext,
        payload: &[u8],
    ) -> Result<U256, HandlerError> {
        Ok(self.decode(ctx, payload)?.1.amountToGive)
    }

    fn static_exchange_checks(&self, ctx: &OrderContext, payload: &[u8]) -> bool {
        !self.rate.is_zero() && self.decode(ctx, payload).is_ok()
    }

    fn dynamic_exchange_checks(
        &self,
        ledger: &Ledger,
        ctx: &OrderContext,
        payload: &[u8],
        amount_to_spend: U256,
    ) -> Result<HandlerResult, HandlerError> {
        let (side, order) = self.decode(ctx, payload)?;
        let amount_in = amount_to_spend.min(order.amountToGive);
        let amount_out = self.amount_out(side, amount_in);
        if ledger.balance_of(ctx.destination_token, self.address) < amount_out {
            return Ok(HandlerResult::default());
        }
        Ok(HandlerResult::new(amount_in, amount_out))
    }

    fn perform_order(
        &self,
        ledger: &mut ScopedLedger,
        ctx: &OrderContext,
        payload: &[u8],
        max_spend: U256,
        min_receive: U256,
    ) -> Result<HandlerResult, HandlerError> {
        let result = self.dynamic_exchange_checks(ledger.view(), ctx, payload, max_spend)?;
        if result.is_empty() {
            return Ok(result);
        }
        if result.amount_received_from_order < min_receive {
            return Err(HandlerError::BelowMinimum {
                received: result.amount_received_from_order,
                minimum: min_receive,
            });
        }
        ledger.transfer(
            ctx.destination_token,
            self.address,
            ctx.caller,
            result.amount_received_from_order,
        )?;
        let unspent = max_spend.saturating_sub(result.amount_spent_on_order);
        ledger.transfer(ctx.source_token, self.address, ctx.caller, unspent)?;
        Ok(result)
    }
}
