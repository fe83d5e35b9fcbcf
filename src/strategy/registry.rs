//! Strategy factory registry and definition storage

use crate::strategy::ema_cross::{EmaCrossParams, EmaCrossStrategy};
use crate::strategy::rules::RuleDefinition;
use crate::strategy::{RuleStrategy, Strategy};
use crate::Result;
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

type StrategyFactory = Box<dyn Fn(serde_json::Value) -> Result<Arc<dyn Strategy>> + Send + Sync>;

/// Maps strategy kind names to constructors taking a JSON params blob.
pub struct StrategyRegistry {
    factories: HashMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in strategy kinds.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("rule", |params| {
            let definition: RuleDefinition = serde_json::from_value(params)?;
            Ok(Arc::new(RuleStrategy::new(definition)?))
        });
        registry.register("ema_cross", |params| {
            let params: EmaCrossParams = if params.is_null() {
                EmaCrossParams::default()
            } else {
                serde_json::from_value(params)?
            };
            Ok(Arc::new(EmaCrossStrategy::new(params)?))
        });
        registry
    }

    /// Register a strategy kind.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(serde_json::Value) -> Result<Arc<dyn Strategy>> + Send + Sync + 'static,
    {
        let kind = kind.into();
        info!(kind, "registered strategy kind");
        self.factories.insert(kind, Box::new(factory));
    }

    /// Instantiate a strategy of the given kind from a params blob.
    pub fn create(&self, kind: &str, params: serde_json::Value) -> Result<Arc<dyn Strategy>> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| anyhow!("unknown strategy kind: {kind}"))?;
        factory(params)
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Storage for rule definitions, keyed by name
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    async fn save(&self, definition: RuleDefinition) -> Result<()>;
    async fn load(&self, name: &str) -> Result<Option<RuleDefinition>>;
    async fn list(&self) -> Result<Vec<String>>;
    async fn remove(&self, name: &str) -> Result<bool>;
}

/// In-memory definition store
#[derive(Default)]
pub struct MemoryDefinitionStore {
    inner: RwLock<HashMap<String, RuleDefinition>>,
}

impl MemoryDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DefinitionStore for MemoryDefinitionStore {
    async fn save(&self, definition: RuleDefinition) -> Result<()> {
        definition.validate()?;
        self.inner
            .write()
            .await
            .insert(definition.name.clone(), definition);
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Option<RuleDefinition>> {
        Ok(self.inner.read().await.get(name).cloned())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.inner.read().await.keys().cloned().collect();
        names.sort_unstable();
        Ok(names)
    }

    async fn remove(&self, name: &str) -> Result<bool> {
        Ok(self.inner.write().await.remove(name).is_some())
    }
}
