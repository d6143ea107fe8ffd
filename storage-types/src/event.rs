// SPDX-License-Identifier: GPL-3.0-only

//! Raw storage events and the normalized lifecycle notifications derived from them

use serde::{Deserialize, Serialize};

use crate::{Disk, Volume, VolumeState};

/// Event as delivered by a storage event source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum StorageEvent {
    VolumeStateChanged {
        volume: Volume,
        /// `None` when the volume was not known to the source before
        old_state: Option<VolumeState>,
        new_state: VolumeState,
    },
    DiskScanned {
        disk: Disk,
        volume_count: u32,
    },
    DiskDestroyed {
        disk: Disk,
    },
}

impl StorageEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StorageEvent::VolumeStateChanged { .. } => "volume_state_changed",
            StorageEvent::DiskScanned { .. } => "disk_scanned",
            StorageEvent::DiskDestroyed { .. } => "disk_destroyed",
        }
    }
}

/// Notification emitted to lifecycle subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event", content = "volume")]
pub enum LifecycleEvent {
    VolumeBecameUsable(Volume),
    VolumeBecameUnusable(Volume),
}

impl LifecycleEvent {
    pub fn volume(&self) -> &Volume {
        match self {
            LifecycleEvent::VolumeBecameUsable(volume)
            | LifecycleEvent::VolumeBecameUnusable(volume) => volume,
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, LifecycleEvent::VolumeBecameUsable(_))
    }
}
