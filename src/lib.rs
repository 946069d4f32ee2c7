//! callcore - call-session core of a telephony stack
//!
//! Tracks every live call, gates each user and network request through
//! admission rules, coordinates conferences, and keeps call attributes
//! consistent while commands and bearer reports arrive concurrently.
//! Layered the Domain-Driven Design way: domain types and ports, an
//! application orchestrator, and infrastructure adapters.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{CallContext, CallOrchestrator, DialOptions, Dispatch};
pub use domain::shared::error::{CallError, ErrorKind};
pub use domain::shared::result::Result;
