// registry.rs - Registry of available search adapters

use super::traits::SearchAdapter;
use super::{ExactSearch, ParasailSearch};
use crate::core::alignment::AlignmentConfig;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registry for available search adapters
pub struct SearchRegistry {
    adapters: BTreeMap<String, Arc<dyn SearchAdapter>>,
}

impl SearchRegistry {
    /// Register the built-in adapters with the given scoring parameters
    pub fn new(config: &AlignmentConfig) -> Self {
        let mut registry = Self {
            adapters: BTreeMap::new(),
        };

        registry.register_adapter("parasail", Arc::new(ParasailSearch::new(config.clone())));
        registry.register_adapter("exact", Arc::new(ExactSearch));

        registry
    }

    /// Register a new adapter
    pub fn register_adapter(&mut self, name: &str, adapter: Arc<dyn SearchAdapter>) {
        self.adapters.insert(name.to_string(), adapter);
    }

    /// Get an adapter by name
    pub fn get_adapter(&self, name: &str) -> Option<Arc<dyn SearchAdapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn has_adapter(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    /// List all available adapters
    pub fn list_adapters(&self) -> Vec<(&str, &str)> {
        self.adapters
            .iter()
            .map(|(name, adapter)| (name.as_str(), adapter.description()))
            .collect()
    }

    pub fn get_adapter_names(&self) -> Vec<&str> {
        self.adapters.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for SearchRegistry {
    fn default() -> Self {
        Self::new(&AlignmentConfig::default())
    }
}
