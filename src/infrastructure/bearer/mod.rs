//! Bearer implementations

pub mod loopback;

pub use loopback::{LoopbackBearer, LoopbackNetwork};
