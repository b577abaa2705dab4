use std::sync::Arc;
use std::time::Duration;

use crmpilot_core::{
    DispatchError, DispatchResult, InvocationRequest, OperationCatalog, ProviderError,
};
use tracing::{info, warn};

use crate::tools::ToolProvider;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends resolved requests to the provider. Stateless between calls: one
/// attempt per request, no retry, no caching.
#[derive(Clone)]
pub struct Dispatcher {
    provider: Arc<dyn ToolProvider>,
    call_timeout: Duration,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn ToolProvider>, call_timeout: Duration) -> Self {
        Self { provider, call_timeout }
    }

    pub fn provider(&self) -> &Arc<dyn ToolProvider> {
        &self.provider
    }

    pub async fn dispatch(
        &self,
        catalog: &OperationCatalog,
        request: &InvocationRequest,
    ) -> DispatchResult {
        if !catalog.contains(&request.operation_name) {
            warn!(
                event_name = "agent.dispatch.unrecognized_operation",
                operation = %request.operation_name,
                "operation is not in the provider catalog"
            );
            return DispatchError::UnrecognizedOperation { name: request.operation_name.clone() }
                .into();
        }

        info!(
            event_name = "agent.dispatch.invoke",
            operation = %request.operation_name,
            parameters = %request.describe_parameters(),
            confidence = request.confidence,
            "invoking tool"
        );

        let call = self.provider.invoke(&request.operation_name, &request.parameters);
        let outcome = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProviderError::Timeout { timeout_secs: self.call_timeout.as_secs() }),
        };

        match outcome {
            Ok(payload) => DispatchResult::Success { payload },
            Err(error) => {
                warn!(
                    event_name = "agent.dispatch.provider_error",
                    operation = %request.operation_name,
                    error = %error,
                    "tool call failed"
                );
                DispatchError::ProviderExecution(error).into()
            }
        }
    }
}
