//! Recording helpers over the raw Prometheus metrics.
//!
//! `MetricsCollector` keeps label ordering in one place. Every method silently
//! does nothing when metrics were never initialized, so library code and tests
//! can record unconditionally.

use super::prometheus::{
    GENERATED_ITEMS_TOTAL, GENERATIONS_TOTAL, LIVE_INSTANCES, LLM_LATENCY, LLM_REQUESTS_TOTAL,
    LLM_TOKENS_TOTAL,
};

/// Token usage reported by a provider for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record one outbound LLM request.
    pub fn record_llm_request(&self, provider: &str, success: bool, latency_secs: f64, tokens: TokenUsage) {
        let status = if success { "success" } else { "failure" };

        if let Some(llm_requests) = LLM_REQUESTS_TOTAL.get() {
            llm_requests.with_label_values(&[provider, status]).inc();
        }

        if let Some(llm_latency) = LLM_LATENCY.get() {
            llm_latency.with_label_values(&[provider]).observe(latency_secs);
        }

        if let Some(llm_tokens) = LLM_TOKENS_TOTAL.get() {
            llm_tokens
                .with_label_values(&[provider, "input"])
                .inc_by(tokens.input_tokens as f64);
            llm_tokens
                .with_label_values(&[provider, "output"])
                .inc_by(tokens.output_tokens as f64);
        }

        tracing::trace!(
            provider = provider,
            status = status,
            latency_secs = latency_secs,
            input_tokens = tokens.input_tokens,
            output_tokens = tokens.output_tokens,
            "Recorded LLM request metric"
        );
    }

    /// Record a finished generation run.
    ///
    /// `status` is one of `success`, `partial` (best effort with an error) or `failure`.
    pub fn record_generation(&self, format: &str, status: &str, items: usize) {
        if let Some(generations) = GENERATIONS_TOTAL.get() {
            generations.with_label_values(&[format, status]).inc();
        }

        if let Some(generated) = GENERATED_ITEMS_TOTAL.get() {
            generated.with_label_values(&[format]).inc_by(items as f64);
        }

        tracing::trace!(format = format, status = status, items = items, "Recorded generation metric");
    }

    /// Update the live instance gauge for one kind.
    pub fn set_live_instances(&self, kind: &str, count: usize) {
        if let Some(live) = LIVE_INSTANCES.get() {
            live.with_label_values(&[kind]).set(count as f64);
        }
    }
}
