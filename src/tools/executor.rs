//! Tool executor
//!
//! Drives a resolved implementation against one invocation, times it and
//! records outcome statistics. Every failure mode is folded into the
//! [`ExecutionResult`]; nothing that happens inside a tool can take the
//! host process down or abort the owning request's stream.

use crate::tools::registry::Callable;
use crate::tools::types::{ExecutionResult, ToolInvocation};
use std::sync::Arc;
use std::sync::Mutex;

/// Execution statistics for one coordinator's lifetime
#[derive(Debug, Clone, Default)]
pub struct ExecutorStats {
    /// Total executions
    pub total_executions: u64,

    /// Executions that produced usable output
    pub successful_executions: u64,

    /// Executions that degraded to passthrough
    pub failed_executions: u64,

    /// Total execution time (ms)
    pub total_duration_ms: u64,
}

impl ExecutorStats {
    fn record(&mut self, result: &ExecutionResult) {
        self.total_executions += 1;
        self.total_duration_ms += result.duration_ms;
        if result.is_success() {
            self.successful_executions += 1;
        } else {
            self.failed_executions += 1;
        }
    }
}

/// Executor owned by one streaming coordinator
#[derive(Debug, Default)]
pub struct ToolExecutor {
    stats: Mutex<ExecutorStats>,
}

impl ToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute a resolved implementation.
    ///
    /// Synchronous from the coordinator's point of view: the returned
    /// future completes only when the tool has finished (or failed) and
    /// its full output has been accumulated.
    pub async fn execute(
        &self,
        implementation: Arc<dyn Callable>,
        invocation: &ToolInvocation,
    ) -> ExecutionResult {
        tracing::debug!(
            tool = %invocation.tool,
            kind = ?implementation.kind(),
            "executing tool"
        );

        let result = implementation.invoke(invocation).await;

        match &result.error {
            None => tracing::debug!(
                tool = %result.tool,
                duration_ms = result.duration_ms,
                output_bytes = result.output.len(),
                "tool execution completed"
            ),
            Some(error) => tracing::warn!(
                tool = %result.tool,
                duration_ms = result.duration_ms,
                %error,
                "tool execution failed, falling back to model text"
            ),
        }

        if let Ok(mut stats) = self.stats.lock() {
            stats.record(&result);
        }
        result
    }

    /// Snapshot of the stats gathered so far
    pub fn stats(&self) -> ExecutorStats {
        self.stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }
}
