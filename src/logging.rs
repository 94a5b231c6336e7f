//! Structured logging for the mint pipeline
//!
//! Every attempt gets a correlation id so the refresh → build → submit →
//! confirm trail for one mint can be pulled out of interleaved logs.

use uuid::Uuid;

/// Structured logger for mint pipeline events
#[derive(Debug, Clone)]
pub struct MintPipelineLogger {
    attempt_id: String,
}

impl MintPipelineLogger {
    pub fn new() -> Self {
        Self {
            attempt_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    pub fn log_availability(&self, total: u64, minted: u64, remaining: u64, cost_sol: f64) {
        tracing::info!(
            attempt_id = %self.attempt_id,
            total = %total,
            minted = %minted,
            remaining = %remaining,
            cost_sol = %cost_sol,
            "Availability refreshed"
        );
    }

    pub fn log_mint_attempt(&self, machine: &str, asset: &str) {
        tracing::info!(
            attempt_id = %self.attempt_id,
            machine = %machine,
            asset = %asset,
            "Attempting mint transaction"
        );
    }

    pub fn log_mint_success(&self, asset: &str, signature: &str, latency_ms: u64) {
        tracing::info!(
            attempt_id = %self.attempt_id,
            asset = %asset,
            signature = %signature,
            latency_ms = %latency_ms,
            "Mint transaction finalized"
        );
    }

    pub fn log_mint_failure(&self, category: &str, error: &str, latency_ms: u64) {
        tracing::warn!(
            attempt_id = %self.attempt_id,
            category = %category,
            error = %error,
            latency_ms = %latency_ms,
            "Mint transaction failed"
        );
    }
}

impl Default for MintPipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}
