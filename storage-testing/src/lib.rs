//! Replay harness for the volume lifecycle tracker
//!
//! Scenarios live in `resources/scenarios/*.toml` and describe an initial
//! inventory, a sequence of storage events and the lifecycle notifications
//! the tracker is expected to emit for them.

pub mod errors;
pub mod runner;
pub mod scenario;
pub mod source;

pub use runner::{ScenarioOutcome, run_scenario};
pub use scenario::Scenario;
pub use source::MemoryEventSource;
