//! Prometheus-based monitoring.
//!
//! ```ignore
//! use synth_forge::metrics::{init_metrics, export_metrics, MetricsCollector};
//!
//! init_metrics()?;
//! MetricsCollector::new().record_generation("qa", "success", 10);
//! let text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::{MetricsCollector, TokenUsage};
pub use prometheus::{export_metrics, init_metrics, metrics_handler};

pub use prometheus::{
    GENERATED_ITEMS_TOTAL, GENERATIONS_TOTAL, LIVE_INSTANCES, LLM_LATENCY, LLM_REQUESTS_TOTAL,
    LLM_TOKENS_TOTAL, REGISTRY,
};
