//! Domain types for the orchestration engine

mod agent;
mod message;
mod run;

pub use agent::*;
pub use message::*;
pub use run::*;
