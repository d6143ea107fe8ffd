// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// How many `VolumeBecameUnusable` notifications a volume leaving service produces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnusableNotifications {
    /// One per usable -> unusable transition; `ejecting -> removed` collapses.
    #[default]
    PerTransition,
    /// One for every delivery whose new state is unusable.
    PerState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub unusable_notifications: UnusableNotifications,
}

impl TrackerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|error| TrackerError::Config {
            path: None,
            reason: error.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|error| TrackerError::Config {
            path: Some(path.to_path_buf()),
            reason: error.to_string(),
        })?;

        toml::from_str(&raw).map_err(|error| TrackerError::Config {
            path: Some(path.to_path_buf()),
            reason: error.to_string(),
        })
    }
}
