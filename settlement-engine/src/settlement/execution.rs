use alloy_primitives::{Address, U256};
use settlement_common::{
    errors::HandlerError,
    ledger::{Ledger, ScopedLedger},
    models::{
        is_native,
        settlement::{HandlerResult, SettlementEvent},
        swap::{Order, Swap, Trade},
        BlockEnv, CallContext, PartnerId, WAD,
    },
    traits::OrderContext,
};
use tracing::{debug, info, warn};

use super::{SettlementEngine, SettlementError, SlippageKind};

impl SettlementEngine {
    /// Settles a single swap. The caller is responsible for reverting the ledger on error.
    pub(super) fn execute_swap(
        &self,
        ledger: &mut Ledger,
        block: &BlockEnv,
        call: &CallContext,
        partner: PartnerId,
        swap: &Swap,
        native_available: &mut U256,
    ) -> Result<SettlementEvent, SettlementError> {
        validate_swap(swap)?;
        let engine = self.address();
        let source_token = swap.trades[0].source_token;
        let destination_token = swap.trades[swap.trades.len() - 1].destination_token;

        if is_native(source_token) {
            if *native_available < swap.source_amount {
                return Err(SettlementError::InsufficientFunds(format!(
                    "attached value {} does not cover source amount {}",
                    native_available, swap.source_amount
                )));
            }
            *native_available -= swap.source_amount;
        } else {
            self.gate()?
                .transfer_from(ledger, engine, call.sender, swap.source_amount, source_token)?;
        }

        let mut carried = swap.source_amount;
        let mut fee_amount = U256::ZERO;
        for (index, trade) in swap.trades.iter().enumerate() {
            let takes_fee = index == swap.trade_to_take_fee_from;
            if takes_fee && swap.take_fee_from_source {
                fee_amount = self.take_fee(ledger, partner, trade.source_token, carried)?;
                carried -= fee_amount;
            }
            let fill = self.execute_trade(ledger, block, index, trade, carried)?;
            carried = fill.amount_received_from_order;
            if takes_fee && !swap.take_fee_from_source {
                fee_amount = self.take_fee(ledger, partner, trade.destination_token, carried)?;
                carried -= fee_amount;
            }
        }
        let destination_amount = carried;

        if destination_amount < swap.minimum_destination_amount {
            return Err(SettlementError::Slippage {
                kind: SlippageKind::DestinationAmount,
                actual: destination_amount,
                minimum: swap.minimum_destination_amount,
            });
        }
        let exchange_rate = destination_amount
            .checked_mul(WAD)
            .map(|scaled| scaled / swap.source_amount)
            .unwrap_or(U256::MAX);
        if exchange_rate < swap.minimum_exchange_rate {
            return Err(SettlementError::Slippage {
                kind: SlippageKind::ExchangeRate,
                actual: exchange_rate,
                minimum: swap.minimum_exchange_rate,
            });
        }

        ledger.transfer(
            destination_token,
            engine,
            swap.recipient(call.sender),
            destination_amount,
        )?;

        let event = SettlementEvent {
            user: call.sender,
            source_token,
            destination_token,
            source_amount: swap.source_amount,
            destination_amount,
            partner,
            fee_amount,
        };
        info!(
            user = %event.user,
            source_token = %event.source_token,
            destination_token = %event.destination_token,
            source_amount = %event.source_amount,
            destination_amount = %event.destination_amount,
            partner = %event.partner,
            fee_amount = %event.fee_amount,
            "Swap settled"
        );
        Ok(event)
    }

    /// Walks the trade's orders until `target` of the source token has been spent.
    fn execute_trade(
        &self,
        ledger: &mut Ledger,
        block: &BlockEnv,
        index: usize,
        trade: &Trade,
        target: U256,
    ) -> Result<HandlerResult, SettlementError> {
        let ctx = OrderContext {
            caller: self.address(),
            source_token: trade.source_token,
            destination_token: trade.destination_token,
            block_number: block.number,
        };
        let mut filled = HandlerResult::default();

        for (order_index, order) in trade.orders.iter().enumerate() {
            let remaining = target - filled.amount_spent_on_order;
            if remaining.is_zero() {
                break;
            }
            let snapshot = ledger.snapshot();
            match self.execute_order(ledger, &ctx, order, remaining) {
                Ok(result) => {
                    debug!(trade = index, order = order_index, %result, "Order filled");
                    filled.amount_spent_on_order += result.amount_spent_on_order;
                    filled.amount_received_from_order += result.amount_received_from_order;
                }
                Err(err) => {
                    ledger.restore(snapshot);
                    warn!(
                        trade = index,
                        order = order_index,
                        handler = %order.exchange_handler,
                        %err,
                        "Order skipped"
                    );
                }
            }
        }

        if filled.amount_spent_on_order < target {
            return Err(SettlementError::HandlerExecution {
                trade: index,
                filled: filled.amount_spent_on_order,
                required: target,
            });
        }
        Ok(filled)
    }

    /// Runs one order against its handler and verifies the reported amounts against the
    /// engine's balance changes.
    fn execute_order(
        &self,
        ledger: &mut Ledger,
        ctx: &OrderContext,
        order: &Order,
        remaining: U256,
    ) -> Result<HandlerResult, HandlerError> {
        let handler = self
            .handlers
            .get(&order.exchange_handler)
            .ok_or(HandlerError::UnknownHandler(order.exchange_handler))?;
        let payload = order.encoded_payload.as_ref();

        if !handler.static_exchange_checks(ctx, payload) {
            return Err(HandlerError::StaticChecksFailed);
        }
        let amount_to_give = handler.get_amount_to_give(ledger, ctx, payload)?;
        let ceiling = remaining.min(amount_to_give);
        let quote = handler.dynamic_exchange_checks(ledger, ctx, payload, ceiling)?;
        if quote.is_empty() {
            return Err(HandlerError::EmptyFill);
        }
        if quote.amount_spent_on_order > ceiling {
            return Err(HandlerError::Implausible(format!(
                "quoted spend {} exceeds ceiling {}",
                quote.amount_spent_on_order, ceiling
            )));
        }

        let (source_before, destination_before) = balances(ledger, ctx);
        ledger.transfer(
            ctx.source_token,
            ctx.caller,
            handler.address(),
            quote.amount_spent_on_order,
        )?;

        let mut debitable = vec![handler.address()];
        debitable.extend(handler.venue_accounts());
        let mut scoped = ScopedLedger::new(std::mem::take(ledger), debitable);
        let performed = handler.perform_order(
            &mut scoped,
            ctx,
            payload,
            quote.amount_spent_on_order,
            quote.amount_received_from_order,
        );
        *ledger = scoped.into_inner();
        let result = performed?;
        let (source_after, destination_after) = balances(ledger, ctx);

        let spent = source_before
            .checked_sub(source_after)
            .ok_or_else(|| HandlerError::Implausible("source balance increased".into()))?;
        let received = destination_after
            .checked_sub(destination_before)
            .ok_or_else(|| HandlerError::Implausible("destination balance decreased".into()))?;

        if result.is_empty() {
            return Err(HandlerError::EmptyFill);
        }
        if result.amount_spent_on_order > quote.amount_spent_on_order ||
            spent != result.amount_spent_on_order
        {
            return Err(HandlerError::Implausible(format!(
                "reported spend {} but balance moved by {}",
                result.amount_spent_on_order, spent
            )));
        }
        if received < result.amount_received_from_order {
            return Err(HandlerError::Implausible(format!(
                "reported receipt {} but balance moved by {}",
                result.amount_received_from_order, received
            )));
        }
        if result.amount_received_from_order < quote.amount_received_from_order {
            return Err(HandlerError::BelowMinimum {
                received: result.amount_received_from_order,
                minimum: quote.amount_received_from_order,
            });
        }
        Ok(result)
    }
}

fn balances(ledger: &Ledger, ctx: &OrderContext) -> (U256, U256) {
    (
        ledger.balance_of(ctx.source_token, ctx.caller),
        ledger.balance_of(ctx.destination_token, ctx.caller),
    )
}

fn validate_swap(swap: &Swap) -> Result<(), SettlementError> {
    let first = swap
        .trades
        .first()
        .ok_or_else(|| SettlementError::Configuration("swap has no trades".into()))?;
    if swap.source_amount.is_zero() {
        return Err(SettlementError::Configuration("swap source amount is zero".into()));
    }
    if first.amount != swap.source_amount {
        return Err(SettlementError::Configuration(format!(
            "first trade amount {} does not match source amount {}",
            first.amount, swap.source_amount
        )));
    }
    if swap.trade_to_take_fee_from >= swap.trades.len() {
        return Err(SettlementError::Configuration(format!(
            "fee trade index {} out of range",
            swap.trade_to_take_fee_from
        )));
    }
    let mut previous: Option<Address> = None;
    for (index, trade) in swap.trades.iter().enumerate() {
        if trade.source_token == trade.destination_token {
            return Err(SettlementError::Configuration(format!(
                "trade {index} swaps {} for itself",
                trade.source_token
            )));
        }
        if previous.is_some_and(|token| token != trade.source_token) {
            return Err(SettlementError::Configuration(format!(
                "trade {index} does not continue from the previous trade"
            )));
        }
        previous = Some(trade.destination_token);
    }
    Ok(())
}
