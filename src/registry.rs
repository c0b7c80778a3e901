/// Symbol <-> index subscription registry
///
/// Indices are assigned by the relay and arrive in confirmations; the registry
/// only records them. Symbols are unique. Lookups are linear, which is fine at
/// the relay's cardinality limit.

use tracing::{debug, info, warn};

pub const MAX_SUBSCRIPTIONS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub symbol: String,
    pub index: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Inserted,
    AlreadyPresent,
    /// Registry full; the confirmation was dropped
    CapacityReached,
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        SubscriptionRegistry {
            subscriptions: Vec::with_capacity(MAX_SUBSCRIPTIONS),
        }
    }

    /// Record a relay confirmation
    pub fn confirm(&mut self, index: i32, symbol: &str) -> ConfirmOutcome {
        if self.contains(symbol) {
            debug!(symbol, index, "already subscribed");
            return ConfirmOutcome::AlreadyPresent;
        }
        if self.subscriptions.len() >= MAX_SUBSCRIPTIONS {
            warn!(symbol, index, max = MAX_SUBSCRIPTIONS, "registry full, confirmation dropped");
            return ConfirmOutcome::CapacityReached;
        }

        self.subscriptions.push(Subscription {
            symbol: symbol.to_string(),
            index,
        });
        info!(symbol, index, "subscribed");
        ConfirmOutcome::Inserted
    }

    /// Remove by symbol. Returns the removed entry, if any.
    pub fn remove(&mut self, symbol: &str) -> Option<Subscription> {
        let pos = self.subscriptions.iter().position(|s| s.symbol == symbol)?;
        Some(self.subscriptions.remove(pos))
    }

    pub fn resolve(&self, index: i32) -> Option<&str> {
        self.subscriptions
            .iter()
            .find(|s| s.index == index)
            .map(|s| s.symbol.as_str())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.subscriptions.iter().any(|s| s.symbol == symbol)
    }

    /// Owned copy of the current symbols, safe to iterate while mutating the registry
    pub fn symbols(&self) -> Vec<String> {
        self.subscriptions.iter().map(|s| s.symbol.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.iter()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }

    /// Log current subscriptions
    pub fn log_status(&self) {
        info!(total = self.subscriptions.len(), "subscription status");
        for s in &self.subscriptions {
            info!(symbol = %s.symbol, index = s.index, "active subscription");
        }
    }
}
