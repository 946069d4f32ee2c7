//! Domain layer - call state, admission rules and conference bookkeeping
//!
//! This layer contains:
//! - Entities: one `CallEntity` per live call
//! - Value Objects: call kinds, state machines, identifiers
//! - Domain Services: admission predicates, conference coordinators
//! - Ports: traits for the bearer, companion, privacy and observer collaborators
//! - The call registry

pub mod admission;
pub mod call;
pub mod conference;
pub mod ports;
pub mod registry;
pub mod shared;

// Re-export commonly used types
pub use shared::{CallError, Result};
