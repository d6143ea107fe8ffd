// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the volume lifecycle tracker

use std::path::PathBuf;

use storage_contracts::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    /// The initial enumeration or the subscription failed, so no baseline exists.
    #[error("Storage event source unavailable: {0}")]
    SourceUnavailable(StorageError),

    #[error("Invalid tracker config {path:?}: {reason}")]
    Config {
        path: Option<PathBuf>,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, TrackerError>;
