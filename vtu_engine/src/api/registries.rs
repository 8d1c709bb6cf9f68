use std::{collections::HashMap, sync::Arc};

use crate::traits::{FulfillmentProvider, PaymentGateway};

/// The set of payment gateways this deployment talks to, keyed by their stable tag. The tag on a ledger row is
/// what routes a re-query back to the gateway that initialized it.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<&'static str, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, gateway: Arc<dyn PaymentGateway>) -> &mut Self {
        self.gateways.insert(gateway.tag(), gateway);
        self
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn PaymentGateway>> {
        self.gateways.get(tag).cloned()
    }

    pub fn tags(&self) -> Vec<&'static str> {
        self.gateways.keys().copied().collect()
    }
}

impl std::fmt::Debug for GatewayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GatewayRegistry({:?})", self.tags())
    }
}

/// The set of fulfillment providers, keyed by tag. Same routing role as [`GatewayRegistry`], for the outbound side.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn FulfillmentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn FulfillmentProvider>) -> &mut Self {
        self.providers.insert(provider.tag(), provider);
        self
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn FulfillmentProvider>> {
        self.providers.get(tag).cloned()
    }

    pub fn tags(&self) -> Vec<&'static str> {
        self.providers.keys().copied().collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ProviderRegistry({:?})", self.tags())
    }
}
