//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - An in-process loopback bearer implementing the channel ports
//! - Observers that turn call reports into logs and metrics

pub mod bearer;
pub mod observers;

pub use bearer::{LoopbackBearer, LoopbackNetwork};
pub use observers::{MetricsObserver, TracingObserver};
