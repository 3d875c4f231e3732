//! Venue handlers the settlement engine can route orders to.

pub mod constant_product;

use std::{collections::HashMap, sync::Arc};

use alloy_primitives::Address;
use settlement_common::traits::VenueHandler;

/// Handlers known to the engine, keyed by the address orders name them by.
#[derive(Debug, Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<Address, Arc<dyn VenueHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under its own address, replacing any handler already there.
    pub fn register(&mut self, handler: Arc<dyn VenueHandler>) -> Option<Arc<dyn VenueHandler>> {
        self.handlers
            .insert(handler.address(), handler)
    }

    pub fn get(&self, address: &Address) -> Option<&Arc<dyn VenueHandler>> {
        self.handlers.get(address)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.handlers.keys()
    }
}

#[cfg(test)]
mod tests {
    use settlement_common::traits::MockVenueHandler;

    use super::*;

    fn mock_at(address: Address) -> Arc<dyn VenueHandler> {
        let mut handler = MockVenueHandler::new();
        handler
            .expect_address()
            .return_const(address);
        Arc::new(handler)
    }

    #[test]
    fn test_register_and_get() {
        let address = Address::repeat_byte(0x01);
        let mut registry = HandlerRegistry::new();

        assert!(registry.register(mock_at(address)).is_none());

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry
                .get(&address)
                .map(|handler| handler.address()),
            Some(address)
        );
        assert!(registry
            .get(&Address::repeat_byte(0x02))
            .is_none());
    }

    #[test]
    fn test_register_replaces_same_address() {
        let address = Address::repeat_byte(0x01);
        let mut registry = HandlerRegistry::new();
        registry.register(mock_at(address));

        let replaced = registry.register(mock_at(address));

        assert!(replaced.is_some());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.addresses().collect::<Vec<_>>(), vec![&address]);
    }
}
