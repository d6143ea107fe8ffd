// SPDX-License-Identifier: GPL-3.0-only

//! Volume data models
//!
//! Typical state sequences reported by the host:
//!
//! - FAT mount: `Unmounted -> Checking -> Mounted`
//! - FAT unmount: `Mounted -> Ejecting -> Unmounted -> BadRemoval`
//! - NTFS mount: `Unmounted -> Checking -> Unmountable`
//! - NTFS unmount: `Unmountable -> Removed`

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Disk;

/// Host-reported state of a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeState {
    Unmounted,
    Checking,
    Mounted,
    MountedReadOnly,
    Ejecting,
    Unmountable,
    Removed,
    BadRemoval,
}

/// What a state means for consumers of the volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Usability {
    /// Present and accessible. Unmountable volumes count as usable raw devices.
    Usable,
    /// On its way out or already gone.
    Unusable,
    /// Nothing actionable yet.
    Transitional,
}

impl VolumeState {
    pub const ALL: [VolumeState; 8] = [
        VolumeState::Unmounted,
        VolumeState::Checking,
        VolumeState::Mounted,
        VolumeState::MountedReadOnly,
        VolumeState::Ejecting,
        VolumeState::Unmountable,
        VolumeState::Removed,
        VolumeState::BadRemoval,
    ];

    pub fn usability(self) -> Usability {
        match self {
            VolumeState::Mounted | VolumeState::MountedReadOnly | VolumeState::Unmountable => {
                Usability::Usable
            }
            VolumeState::Ejecting | VolumeState::Removed => Usability::Unusable,
            VolumeState::Unmounted | VolumeState::Checking | VolumeState::BadRemoval => {
                Usability::Transitional
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VolumeState::Unmounted => "unmounted",
            VolumeState::Checking => "checking",
            VolumeState::Mounted => "mounted",
            VolumeState::MountedReadOnly => "mounted_read_only",
            VolumeState::Ejecting => "ejecting",
            VolumeState::Unmountable => "unmountable",
            VolumeState::Removed => "removed",
            VolumeState::BadRemoval => "bad_removal",
        }
    }
}

impl fmt::Display for VolumeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical volume as last reported by the storage event source.
///
/// `disk_id` is a back-reference only; the disk does not own its volumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Volume identifier (block device name, or the disk id for placeholders)
    pub id: String,

    /// Filesystem UUID, empty when the host has none
    #[serde(default)]
    pub fs_uuid: String,

    /// Identifier of the parent disk, empty when the host has none
    #[serde(default)]
    pub disk_id: String,

    pub state: VolumeState,

    /// Synthesized stand-in for a disk without any real volume
    #[serde(default)]
    pub placeholder: bool,
}

impl Volume {
    pub fn new(
        id: impl Into<String>,
        fs_uuid: impl Into<String>,
        disk_id: impl Into<String>,
        state: VolumeState,
    ) -> Self {
        Self {
            id: id.into(),
            fs_uuid: fs_uuid.into(),
            disk_id: disk_id.into(),
            state,
            placeholder: false,
        }
    }

    /// Build the stand-in volume for a disk that reports no volumes.
    ///
    /// The disk id doubles as the volume id so there is exactly one per disk.
    pub fn placeholder_for(disk: &Disk) -> Self {
        Self {
            id: disk.id.clone(),
            fs_uuid: String::new(),
            disk_id: disk.id.clone(),
            state: VolumeState::Unmounted,
            placeholder: true,
        }
    }

    pub fn with_state(&self, state: VolumeState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    pub fn usability(&self) -> Usability {
        self.state.usability()
    }
}
