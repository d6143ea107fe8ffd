// SPDX-License-Identifier: GPL-3.0-only

//! Error types for storage-udisks operations

use storage_contracts::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiskError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Zbus Error: {0}")]
    ZbusError(#[from] zbus::Error),
}

impl From<DiskError> for StorageError {
    fn from(error: DiskError) -> Self {
        StorageError::unavailable(error.to_string())
    }
}
