use std::sync::Arc;

use async_trait::async_trait;
use crmpilot_core::{OperationCatalog, Parameters, ProviderError};
use tracing::{info, warn};

/// Backend that advertises operations by name and executes them.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn list_operations(&self) -> Result<Vec<String>, ProviderError>;
    async fn invoke(&self, operation: &str, parameters: &Parameters) -> Result<String, ProviderError>;
}

/// Holds the catalog snapshot taken from the provider on connect.
#[derive(Clone, Debug, Default)]
pub struct ToolRegistry {
    catalog: Arc<OperationCatalog>,
}

impl ToolRegistry {
    pub fn with_catalog(catalog: OperationCatalog) -> Self {
        Self { catalog: Arc::new(catalog) }
    }

    /// Replaces the snapshot with what the provider advertises now. On error
    /// the previous snapshot is kept untouched.
    pub async fn refresh(
        &mut self,
        provider: &dyn ToolProvider,
    ) -> Result<Arc<OperationCatalog>, ProviderError> {
        let names = provider.list_operations().await?;
        let catalog = OperationCatalog::from_names(names);

        let unknown = catalog.unknown_names();
        if !unknown.is_empty() {
            warn!(
                event_name = "agent.registry.unknown_operations",
                operations = %unknown.join(", "),
                "provider advertises operations without routing rules; they dispatch by name only"
            );
        }
        info!(
            event_name = "agent.registry.refreshed",
            operation_count = catalog.len(),
            operations = %catalog.listing(),
            "tool catalog refreshed"
        );

        self.catalog = Arc::new(catalog);
        Ok(self.snapshot())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.catalog.contains(name)
    }

    pub fn snapshot(&self) -> Arc<OperationCatalog> {
        Arc::clone(&self.catalog)
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }
}
