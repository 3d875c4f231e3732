//! Constant product venue pairing the native asset with a single token per exchange.
//!
//! Reserves are whatever the exchange address holds in the ledger, so liquidity moves with
//! every settled order. Every trade pays a 0.3% fee to the reserves.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolValue};
use settlement_common::{
    errors::HandlerError,
    ledger::{Ledger, ScopedLedger},
    models::settlement::HandlerResult,
    traits::{OrderContext, OrderSide, VenueHandler},
};
use tracing::debug;

const FEE_NUMERATOR: u64 = 997;
const FEE_DENOMINATOR: u64 = 1000;

sol! {
    /// Payload of an order routed to a [`ConstantProductHandler`].
    struct ExchangeOrder {
        address exchange;
        uint256 amountToGive;
    }
}

impl ExchangeOrder {
    pub fn encode(exchange: Address, amount_to_give: U256) -> Vec<u8> {
        Self { exchange, amountToGive: amount_to_give }.abi_encode()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, HandlerError> {
        Self::abi_decode(payload).map_err(|err| HandlerError::Decode(err.to_string()))
    }
}

/// Output amount for an exact input swap against reserves `reserve_in`/`reserve_out`.
pub fn get_amount_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
) -> Result<U256, HandlerError> {
    if amount_in.is_zero() {
        return Err(HandlerError::Unsupported("input amount cannot be zero".into()));
    }
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(HandlerError::Unsupported("insufficient liquidity".into()));
    }
    let overflow = || HandlerError::Unsupported("amount overflows pool math".into());

    let amount_in_with_fee = amount_in
        .checked_mul(U256::from(FEE_NUMERATOR))
        .ok_or_else(overflow)?;
    let numerator = amount_in_with_fee
        .checked_mul(reserve_out)
        .ok_or_else(overflow)?;
    let denominator = reserve_in
        .checked_mul(U256::from(FEE_DENOMINATOR))
        .and_then(|scaled| scaled.checked_add(amount_in_with_fee))
        .ok_or_else(overflow)?;
    Ok(numerator / denominator)
}

#[derive(Debug, Clone)]
pub struct ConstantProductHandler {
    address: Address,
    /// Exchange address to the token it pairs with the native asset.
    exchanges: HashMap<Address, Address>,
}

impl ConstantProductHandler {
    pub fn new(address: Address) -> Self {
        Self { address, exchanges: HashMap::new() }
    }

    pub fn register_exchange(&mut self, exchange: Address, token: Address) {
        debug!(handler = %self.address, %exchange, %token, "Exchange registered");
        self.exchanges.insert(exchange, token);
    }

    pub fn exchange_token(&self, exchange: &Address) -> Option<Address> {
        self.exchanges.get(exchange).copied()
    }

    /// Decodes `payload` and checks it names a registered exchange trading the order's token.
    fn resolve(
        &self,
        ctx: &OrderContext,
        payload: &[u8],
    ) -> Result<(OrderSide, ExchangeOrder), HandlerError> {
        let order = ExchangeOrder::decode(payload)?;
        let side = ctx.side().ok_or_else(|| {
            HandlerError::Unsupported(format!(
                "{} -> {} is not a native pair",
                ctx.source_token, ctx.destination_token
            ))
        })?;
        match self.exchange_token(&order.exchange) {
            Some(token) if token == ctx.token() => Ok((side, order)),
            Some(token) => Err(HandlerError::Unsupported(format!(
                "exchange {} trades {token}, not {}",
                order.exchange,
                ctx.token()
            ))),
            None => Err(HandlerError::Unsupported(format!("unknown exchange {}", order.exchange))),
        }
    }

    fn quote(
        &self,
        ledger: &Ledger,
        ctx: &OrderContext,
        exchange: Address,
        amount_in: U256,
    ) -> Result<U256, HandlerError> {
        let reserve_in = ledger.balance_of(ctx.source_token, exchange);
        let reserve_out = ledger.balance_of(ctx.destination_token, exchange);
        get_amount_out(amount_in, reserve_in, reserve_out)
    }
}

impl VenueHandler for ConstantProductHandler {
    fn address(&self) -> Address {
        self.address
    }

    fn venue_accounts(&self) -> Vec<Address> {
        self.exchanges.keys().copied().collect()
    }

    fn get_amount_to_give(
        &self,
        _ledger: &Ledger,
        ctx: &OrderContext,
        payload: &[u8],
    ) -> Result<U256, HandlerError> {
        let (_, order) = self.resolve(ctx, payload)?;
        Ok(order.amountToGive)
    }

    fn static_exchange_checks(&self, ctx: &OrderContext, payload: &[u8]) -> bool {
        self.resolve(ctx, payload)
            .is_ok_and(|(_, order)| !order.amountToGive.is_zero())
    }

    fn dynamic_exchange_checks(
        &self,
        ledger: &Ledger,
        ctx: &OrderContext,
        payload: &[u8],
        amount_to_spend: U256,
    ) -> Result<HandlerResult, HandlerError> {
        let (_, order) = self.resolve(ctx, payload)?;
        let amount_in = amount_to_spend.min(order.amountToGive);
        let amount_out = self.quote(ledger, ctx, order.exchange, amount_in)?;
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
        let (side, order) = self.resolve(ctx, payload)?;
        let amount_in = max_spend.min(order.amountToGive);
        let amount_out = self.quote(ledger.view(), ctx, order.exchange, amount_in)?;
        if amount_out < min_receive {
            return Err(HandlerError::BelowMinimum { received: amount_out, minimum: min_receive });
        }

        ledger.transfer(ctx.source_token, self.address, order.exchange, amount_in)?;
        ledger.transfer(ctx.destination_token, order.exchange, self.address, amount_out)?;
        ledger.transfer(ctx.destination_token, self.address, ctx.caller, amount_out)?;
        // Only the part of `max_spend` the exchange did not take goes back.
        let unspent = max_spend - amount_in;
        ledger.transfer(ctx.source_token, self.address, ctx.caller, unspent)?;

        debug!(
            handler = %self.address,
            exchange = %order.exchange,
            %side,
            %amount_in,
            %amount_out,
            "Constant product order filled"
        );
        Ok(HandlerResult::new(amount_in, amount_out))
    }
}
