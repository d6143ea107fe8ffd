use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TestingError {
    #[error("scenario not found for '{scenario_name}' in resources/scenarios")]
    ScenarioNotFound { scenario_name: String },
    #[error("invalid scenario '{scenario_name}': {reason}")]
    ScenarioInvalid {
        scenario_name: String,
        reason: String,
    },
    #[error("scenario io error for {path:?}: {reason}")]
    ScenarioIo { path: PathBuf, reason: String },
    #[error("scenario '{scenario_name}' failed with {mismatches} mismatch(es)")]
    ScenarioFailed {
        scenario_name: String,
        mismatches: usize,
    },
}

pub type Result<T> = std::result::Result<T, TestingError>;
