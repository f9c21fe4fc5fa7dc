//! Structured logging and pipeline context

use crate::observability::CorrelationId;

/// Per-swap logger emitting one marker per pipeline stage
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context_id: String,
}

impl StructuredLogger {
    pub fn new(context_id: String) -> Self {
        Self { context_id }
    }

    pub fn log_swap_attempt(&self, swaps: usize) {
        tracing::info!(
            context_id = %self.context_id,
            swaps = %swaps,
            "Attempting swap"
        );
    }

    pub fn log_stage_success(&self, stage: &str, detail: &str) {
        tracing::info!(
            context_id = %self.context_id,
            stage = %stage,
            detail = %detail,
            "✅ Stage complete"
        );
    }

    /// `retryable` tells the caller a rebuild from fresh state may succeed
    pub fn log_stage_failure(&self, stage: &str, category: &str, retryable: bool, error: &str) {
        tracing::error!(
            context_id = %self.context_id,
            stage = %stage,
            category = %category,
            retryable = retryable,
            error = %error,
            "❌ Stage failed"
        );
    }

    pub fn log_swap_submitted(&self, signature: &str, bundle_id: &str, latency_ms: u64) {
        tracing::info!(
            context_id = %self.context_id,
            signature = %signature,
            bundle_id = %bundle_id,
            latency_ms = %latency_ms,
            "✨ Swap submitted, view on Solscan: https://solscan.io/tx/{}",
            signature
        );
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            message = %message,
            "Warning"
        );
    }
}

/// Pipeline execution context for one swap batch
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub correlation_id: CorrelationId,
    pub logger: StructuredLogger,
}

impl PipelineContext {
    pub fn new() -> Self {
        let correlation_id = CorrelationId::new();
        Self {
            logger: StructuredLogger::new(correlation_id.to_string()),
            correlation_id,
        }
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}
