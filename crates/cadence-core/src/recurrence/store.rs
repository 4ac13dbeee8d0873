//! Storage seam for per-scope recurrence configuration.
//!
//! Callers hand a store to whatever needs a config; there is no process-wide
//! cache. A scope that has never been configured gets
//! [`RecurrenceConfig::disabled_default`] on first read, which is persisted
//! so later reads agree.

use std::collections::BTreeMap;

use super::RecurrenceConfig;
use crate::error::Result;

pub trait RecurrenceStore {
    /// Load the config for `scope_id`, creating a disabled default if absent.
    fn get_or_create(&mut self, scope_id: &str) -> Result<RecurrenceConfig>;

    /// Replace the stored config after validating it.
    fn update(&mut self, config: RecurrenceConfig) -> Result<RecurrenceConfig>;

    /// All stored configs, ordered by scope id.
    fn list(&self) -> Result<Vec<RecurrenceConfig>>;
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecurrenceStore {
    configs: BTreeMap<String, RecurrenceConfig>,
}

impl MemoryRecurrenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecurrenceStore for MemoryRecurrenceStore {
    fn get_or_create(&mut self, scope_id: &str) -> Result<RecurrenceConfig> {
        Ok(self
            .configs
            .entry(scope_id.to_string())
            .or_insert_with(|| RecurrenceConfig::disabled_default(scope_id))
            .clone())
    }

    fn update(&mut self, config: RecurrenceConfig) -> Result<RecurrenceConfig> {
        config.validate()?;
        self.configs.insert(config.scope_id.clone(), config.clone());
        Ok(config)
    }

    fn list(&self) -> Result<Vec<RecurrenceConfig>> {
        Ok(self.configs.values().cloned().collect())
    }
}
