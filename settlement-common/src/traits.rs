use core::fmt::Debug;

use alloy_primitives::{Address, U256};
use strum_macros::Display;

use crate::{
    errors::HandlerError,
    ledger::{Ledger, ScopedLedger},
    models::{is_native, settlement::HandlerResult},
};

/// Which side of a native/token market an order fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum OrderSide {
    /// Native asset in, token out.
    Buy,
    /// Token in, native asset out.
    Sell,
}

/// The leg an order is executed for, as seen by the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderContext {
    /// Address that receives the handler's output and any unspent input.
    pub caller: Address,
    pub source_token: Address,
    pub destination_token: Address,
    pub block_number: u64,
}

impl OrderContext {
    /// Returns the market side, or `None` if neither or both legs are the native asset.
    pub fn side(&self) -> Option<OrderSide> {
        match (is_native(self.source_token), is_native(self.destination_token)) {
            (true, false) => Some(OrderSide::Buy),
            (false, true) => Some(OrderSide::Sell),
            _ => None,
        }
    }

    /// The token on the non-native side of the order.
    pub fn token(&self) -> Address {
        if is_native(self.source_token) {
            self.destination_token
        } else {
            self.source_token
        }
    }
}

/// VenueHandler trait
/// This trait defines the methods an adapter to a liquidity venue must implement in order to
/// be routed to by the settlement engine.
///
/// Payloads are opaque to the engine; every handler defines its own schema. Before
/// `perform_order` the engine transfers the order's input to [`VenueHandler::address`].
/// The handler must pay its output and any unspent input back to [`OrderContext::caller`]
/// before returning, and must never report more than it transferred.
///
/// While executing, a handler can only debit its own address and the accounts it lists in
/// [`VenueHandler::venue_accounts`]. Funds of users and of the engine are out of reach.
#[cfg_attr(feature = "test-utils", mockall::automock)]
pub trait VenueHandler: Debug + Send + Sync {
    /// Address under which the handler holds assets while executing an order.
    fn address(&self) -> Address;

    /// Venue accounts the handler settles against, in addition to its own address.
    fn venue_accounts(&self) -> Vec<Address>;

    /// Returns how much of the input asset the order requires. Must not mutate state.
    fn get_amount_to_give(
        &self,
        ledger: &Ledger,
        ctx: &OrderContext,
        payload: &[u8],
    ) -> Result<U256, HandlerError>;

    /// Cheap validity checks that do not depend on market state, such as payload shape,
    /// expiry or supported assets.
    fn static_exchange_checks(&self, ctx: &OrderContext, payload: &[u8]) -> bool;

    /// Returns what would be spent and received if the order was executed now with at most
    /// `amount_to_spend` of the input asset.
    fn dynamic_exchange_checks(
        &self,
        ledger: &Ledger,
        ctx: &OrderContext,
        payload: &[u8],
        amount_to_spend: U256,
    ) -> Result<HandlerResult, HandlerError>;

    /// Executes the order against the venue.
    ///
    /// Fails with [`HandlerError::BelowMinimum`] if less than `min_receive` would be received.
    fn perform_order(
        &self,
        ledger: &mut ScopedLedger,
        ctx: &OrderContext,
        payload: &[u8],
        max_spend: U256,
        min_receive: U256,
    ) -> Result<HandlerResult, HandlerError>;
}
