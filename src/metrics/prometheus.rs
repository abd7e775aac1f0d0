//! Prometheus metrics registration and export.
//!
//! All metrics live in a process-global registry created by [`init_metrics`].
//! Recording through [`super::MetricsCollector`] before initialization is a
//! no-op.

use prometheus::{CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all synth-forge metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Total LLM API requests, labeled by provider and status.
pub static LLM_REQUESTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// LLM API request latency in seconds, labeled by provider.
pub static LLM_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Total tokens used, labeled by provider and type (input/output).
pub static LLM_TOKENS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Generation runs, labeled by dataset format and status.
pub static GENERATIONS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Dataset items produced, labeled by format.
pub static GENERATED_ITEMS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Live instances held by the instance manager, labeled by kind.
pub static LIVE_INSTANCES: OnceLock<GaugeVec> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Safe to call more than once; later calls leave the first registry in place.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let llm_requests_total = CounterVec::new(
        Opts::new("synth_forge_llm_requests_total", "Total LLM API requests"),
        &["provider", "status"],
    )?;

    let llm_latency = HistogramVec::new(
        HistogramOpts::new(
            "synth_forge_llm_latency_seconds",
            "LLM API request latency in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["provider"],
    )?;

    let llm_tokens_total = CounterVec::new(
        Opts::new("synth_forge_llm_tokens_total", "Total tokens used"),
        &["provider", "type"],
    )?;

    let generations_total = CounterVec::new(
        Opts::new("synth_forge_generations_total", "Dataset generation runs"),
        &["format", "status"],
    )?;

    let generated_items_total = CounterVec::new(
        Opts::new("synth_forge_generated_items_total", "Dataset items generated"),
        &["format"],
    )?;

    let live_instances = GaugeVec::new(
        Opts::new("synth_forge_live_instances", "Live plugin instances"),
        &["kind"],
    )?;

    registry.register(Box::new(llm_requests_total.clone()))?;
    registry.register(Box::new(llm_latency.clone()))?;
    registry.register(Box::new(llm_tokens_total.clone()))?;
    registry.register(Box::new(generations_total.clone()))?;
    registry.register(Box::new(generated_items_total.clone()))?;
    registry.register(Box::new(live_instances.clone()))?;

    // A concurrent initializer may have won; its metrics stay authoritative.
    let _ = REGISTRY.set(registry);
    let _ = LLM_REQUESTS_TOTAL.set(llm_requests_total);
    let _ = LLM_LATENCY.set(llm_latency);
    let _ = LLM_TOKENS_TOTAL.set(llm_tokens_total);
    let _ = GENERATIONS_TOTAL.set(generations_total);
    let _ = GENERATED_ITEMS_TOTAL.set(generated_items_total);
    let _ = LIVE_INSTANCES.set(live_instances);

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns a comment line instead of failing when the registry is missing or
/// encoding fails, so the endpoint always answers.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}

/// HTTP handler for the /metrics endpoint.
pub async fn metrics_handler() -> String {
    export_metrics()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
        assert!(REGISTRY.get().is_some());
    }

    #[test]
    fn test_export_after_recording() {
        init_metrics().unwrap();
        if let Some(counter) = GENERATIONS_TOTAL.get() {
            counter.with_label_values(&["qa", "success"]).inc();
        }

        let metrics = export_metrics();
        assert!(!metrics.starts_with("# Error"));
        assert!(metrics.contains("synth_forge_generations_total"));
    }
}
