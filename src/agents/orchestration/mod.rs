//! Multi-agent orchestration
//!
//! Agents take turns in a fixed order over a bounded number of rounds.
//! Each prompt after the first is a digest of the latest full round.

mod collaborative;

pub use collaborative::{CollaborationCoordinator, DEFAULT_ITERATIONS, MAX_ITERATIONS};
