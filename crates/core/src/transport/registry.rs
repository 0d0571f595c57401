//! Name-keyed table of congestion control strategies.
//!
//! Hosts select a strategy per connection by name. Lookups happen when a
//! connection is set up, never on the per-packet path.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::congestion_control::CongestionStrategy;
use super::errors::LiaError;
use super::lia::LiaController;
use super::reno::RenoController;

/// Registered strategies, shared across connections.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: RwLock<HashMap<&'static str, Arc<dyn CongestionStrategy>>>,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in `reno` and `lia` strategies.
    pub fn with_defaults() -> Self {
        let defaults: [Arc<dyn CongestionStrategy>; 2] =
            [Arc::new(RenoController), Arc::new(LiaController)];
        let strategies = defaults
            .into_iter()
            .map(|strategy| (strategy.name(), strategy))
            .collect();
        Self {
            strategies: RwLock::new(strategies),
        }
    }

    /// Adds a strategy under its own name.
    pub fn register(&self, strategy: Arc<dyn CongestionStrategy>) -> Result<(), LiaError> {
        let name = strategy.name();
        let mut strategies = self.strategies.write();
        if strategies.contains_key(name) {
            return Err(LiaError::DuplicateStrategy(name));
        }
        strategies.insert(name, strategy);
        tracing::debug!(strategy = name, "Congestion control strategy registered");
        Ok(())
    }

    /// Removes a strategy, returning it if it was registered.
    ///
    /// Connections already holding the strategy keep using it.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn CongestionStrategy>> {
        let removed = self.strategies.write().remove(name);
        if removed.is_some() {
            tracing::debug!(strategy = name, "Congestion control strategy unregistered");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn CongestionStrategy>, LiaError> {
        self.strategies
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| LiaError::UnknownAlgorithm(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.strategies.read().keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::connection::{CaState, Connection, CwndEvent, PathIndex};

    struct NoopStrategy;

    impl CongestionStrategy for NoopStrategy {
        fn name(&self) -> &'static str {
            "noop"
        }

        fn initialize(&self, _conn: &mut Connection, _path: PathIndex) {}

        fn compute_ssthresh(&self, conn: &Connection, path: PathIndex) -> Option<u32> {
            conn.subflow(path).map(|s| s.cwnd())
        }

        fn on_ack(&self, _conn: &mut Connection, _path: PathIndex, _acked: u32) {}

        fn on_cwnd_event(&self, _conn: &mut Connection, _path: PathIndex, _event: CwndEvent) {}

        fn on_reliability_state_change(
            &self,
            _conn: &mut Connection,
            _path: PathIndex,
            _new_state: CaState,
        ) {
        }
    }

    #[test]
    fn test_defaults_registered() {
        let registry = StrategyRegistry::with_defaults();
        assert_eq!(registry.names(), ["lia", "reno"]);
        assert_eq!(registry.get("lia").unwrap().name(), "lia");
        assert_eq!(registry.get("reno").unwrap().name(), "reno");
    }

    #[test]
    fn test_unknown_name() {
        let registry = StrategyRegistry::new();
        assert!(registry.names().is_empty());
        let err = registry.get("lia").err().unwrap();
        assert!(matches!(err, LiaError::UnknownAlgorithm(name) if name == "lia"));
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = StrategyRegistry::with_defaults();
        let err = registry.register(Arc::new(LiaController)).unwrap_err();
        assert!(matches!(err, LiaError::DuplicateStrategy("lia")));
        assert_eq!(registry.names().len(), 2);
    }

    #[test_log::test]
    fn test_register_and_unregister() {
        let registry = StrategyRegistry::with_defaults();
        registry.register(Arc::new(NoopStrategy)).unwrap();
        assert!(registry.contains("noop"));
        assert_eq!(registry.names(), ["lia", "noop", "reno"]);

        let removed = registry.unregister("noop").unwrap();
        assert_eq!(removed.name(), "noop");
        assert!(!registry.contains("noop"));
        assert!(registry.unregister("noop").is_none());

        // The name is free again.
        registry.register(removed).unwrap();
        assert!(registry.contains("noop"));
    }

    #[test]
    fn test_shared_across_threads() {
        let registry = Arc::new(StrategyRegistry::with_defaults());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.get("lia").map(|s| s.name()))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), "lia");
        }
    }
}
