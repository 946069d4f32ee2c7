//! Observers shipped with the call core

pub mod metrics_observer;
pub mod tracing_observer;

pub use metrics_observer::MetricsObserver;
pub use tracing_observer::TracingObserver;
