pub mod circuit_breaker;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

pub use circuit_breaker::{
    CallOutcome, CallPermit, CircuitBreaker, CircuitBreakerPolicy, CircuitRejected,
    CircuitSnapshot, CircuitState,
};

/// Owns exactly one breaker per target name. Breakers are never shared
/// across targets.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    policy: CircuitBreakerPolicy,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(policy: CircuitBreakerPolicy) -> Self {
        Self { policy, breakers: RwLock::new(HashMap::new()) }
    }

    pub fn policy(&self) -> &CircuitBreakerPolicy {
        &self.policy
    }

    pub fn for_target(&self, target: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(target) {
            return Arc::clone(breaker);
        }

        let mut breakers = self.breakers.write();
        Arc::clone(breakers.entry(target.to_string()).or_insert_with(|| {
            Arc::new(CircuitBreaker::new(target, self.policy.clone()))
        }))
    }

    /// Snapshots sorted by target name.
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let mut snapshots: Vec<CircuitSnapshot> =
            self.breakers.read().values().map(|breaker| breaker.snapshot()).collect();
        snapshots.sort_by(|left, right| left.target.cmp(&right.target));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{BreakerRegistry, CallOutcome, CircuitBreakerPolicy, CircuitState};

    #[test]
    fn same_target_shares_one_breaker() {
        let registry = BreakerRegistry::new(CircuitBreakerPolicy::default());

        let first = registry.for_target("accounts-service");
        let second = registry.for_target("accounts-service");

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn targets_are_isolated() {
        let registry = BreakerRegistry::new(CircuitBreakerPolicy::default());
        let cards = registry.for_target("cards-service");
        for _ in 0..5 {
            cards.try_acquire().expect("permit").record(CallOutcome::Failure);
        }

        assert_eq!(cards.state(), CircuitState::Open);
        assert_eq!(registry.for_target("accounts-service").state(), CircuitState::Closed);
    }

    #[test]
    fn snapshots_are_sorted_by_target() {
        let registry = BreakerRegistry::new(CircuitBreakerPolicy::default());
        registry.for_target("credits-service");
        registry.for_target("accounts-service");

        let targets: Vec<String> =
            registry.snapshots().into_iter().map(|snapshot| snapshot.target).collect();
        assert_eq!(targets, vec!["accounts-service".to_string(), "credits-service".to_string()]);
    }
}
