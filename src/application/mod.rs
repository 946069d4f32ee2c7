//! Application layer
//!
//! The orchestrator ties the registry, admission, conferences and the
//! external collaborators together and exposes the call core's command and
//! inbound surfaces.

pub mod command;
pub mod context;
pub mod observers;
pub mod orchestrator;
mod privacy;

pub use command::{DialOptions, Dispatch};
pub use context::CallContext;
pub use observers::ObserverSet;
pub use orchestrator::CallOrchestrator;
