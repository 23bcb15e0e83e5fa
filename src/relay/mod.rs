//! Per-request streaming relay

pub mod coordinator;

pub use coordinator::{RelayCoordinator, RelayState};
