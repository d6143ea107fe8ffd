// SPDX-License-Identifier: GPL-3.0-only

//! Volume validity
//!
//! A volume takes part in lifecycle notifications only when it carries a
//! filesystem UUID, names its disk, and that disk is currently tracked.

use std::collections::BTreeMap;
use std::fmt;

use storage_types::{Disk, Volume};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    MissingId,
    /// Synthesized stand-in for a disk without volumes
    Placeholder,
    MissingFsUuid,
    MissingDiskId,
    /// The referenced disk is not (or no longer) tracked
    UnknownDisk(String),
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::MissingId => f.write_str("missing volume id"),
            InvalidReason::Placeholder => f.write_str("placeholder volume"),
            InvalidReason::MissingFsUuid => f.write_str("missing filesystem uuid"),
            InvalidReason::MissingDiskId => f.write_str("missing disk id"),
            InvalidReason::UnknownDisk(id) => write!(f, "unknown disk {id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity<'a> {
    Valid(&'a Volume),
    Invalid(InvalidReason),
}

impl Validity<'_> {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid(_))
    }
}

/// Decide whether `volume` may drive lifecycle notifications.
///
/// `tracked` is the record currently held under the same volume id, if any.
pub fn check_volume<'a>(
    volume: &'a Volume,
    disks: &BTreeMap<String, Disk>,
    tracked: Option<&Volume>,
) -> Validity<'a> {
    if volume.id.trim().is_empty() {
        return Validity::Invalid(InvalidReason::MissingId);
    }
    if volume.placeholder || tracked.is_some_and(|v| v.placeholder) {
        return Validity::Invalid(InvalidReason::Placeholder);
    }
    if volume.fs_uuid.trim().is_empty() {
        return Validity::Invalid(InvalidReason::MissingFsUuid);
    }
    if volume.disk_id.trim().is_empty() {
        return Validity::Invalid(InvalidReason::MissingDiskId);
    }
    if !disks.contains_key(&volume.disk_id) {
        return Validity::Invalid(InvalidReason::UnknownDisk(volume.disk_id.clone()));
    }

    Validity::Valid(volume)
}
