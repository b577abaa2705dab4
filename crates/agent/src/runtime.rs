use std::sync::Arc;
use std::time::Duration;

use crmpilot_core::{DispatchResult, InvocationRequest, Operation, OperationCatalog, ProviderError};
use tracing::info;
use uuid::Uuid;

use crate::dispatcher::Dispatcher;
use crate::resolver::IntentResolver;
use crate::tools::{ToolProvider, ToolRegistry};

/// One text-to-result cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct Turn {
    pub correlation_id: Uuid,
    pub request: InvocationRequest,
    pub result: DispatchResult,
}

/// Owns the catalog for one provider connection and runs resolution cycles
/// against it, strictly one at a time.
pub struct AgentRuntime {
    resolver: IntentResolver,
    dispatcher: Dispatcher,
    registry: ToolRegistry,
}

impl AgentRuntime {
    /// Takes the catalog snapshot from the provider and readies the runtime.
    pub async fn connect(
        resolver: IntentResolver,
        provider: Arc<dyn ToolProvider>,
        call_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let mut registry = ToolRegistry::default();
        registry.refresh(provider.as_ref()).await?;
        Ok(Self { resolver, dispatcher: Dispatcher::new(provider, call_timeout), registry })
    }

    pub fn catalog(&self) -> Arc<OperationCatalog> {
        self.registry.snapshot()
    }

    pub fn classifier_configured(&self) -> bool {
        self.resolver.classifier().is_configured()
    }

    /// Operation to prompt for when `text` is exactly an advertised name with a
    /// known kind.
    pub fn guided_operation(&self, text: &str) -> Option<Operation> {
        let text = text.trim();
        if !self.registry.contains(text) {
            return None;
        }
        Operation::from_name(text)
    }

    pub async fn handle_text(&self, text: &str) -> Turn {
        let correlation_id = Uuid::new_v4();
        let catalog = self.catalog();
        info!(
            event_name = "agent.runtime.text_received",
            correlation_id = %correlation_id,
            "resolving free-text command"
        );

        let request = self.resolver.resolve(text, &catalog).await;
        info!(
            event_name = "agent.runtime.resolved",
            correlation_id = %correlation_id,
            operation = %request.operation_name,
            confidence = request.confidence,
            "text resolved to operation"
        );

        let result = self.dispatcher.dispatch(&catalog, &request).await;
        self.finish(correlation_id, request, result)
    }

    /// Dispatches an already-built request (guided path).
    pub async fn execute(&self, request: InvocationRequest) -> Turn {
        let correlation_id = Uuid::new_v4();
        let catalog = self.catalog();
        let result = self.dispatcher.dispatch(&catalog, &request).await;
        self.finish(correlation_id, request, result)
    }

    fn finish(&self, correlation_id: Uuid, request: InvocationRequest, result: DispatchResult) -> Turn {
        info!(
            event_name = "agent.runtime.completed",
            correlation_id = %correlation_id,
            operation = %request.operation_name,
            success = result.is_success(),
            "cycle completed"
        );
        Turn { correlation_id, request, result }
    }
}
