// SPDX-License-Identifier: GPL-3.0-only

//! Disk data models
//!
//! A disk is a physical or virtual storage device that hosts zero or more
//! volumes. Disks are identified by their `id`; everything else is advisory.

use enumflags2::{BitFlags, bitflags};
use serde::{Deserialize, Serialize};

/// Hardware traits reported alongside a disk.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiskFlag {
    /// The disk may be adopted as internal storage
    Adoptable = 1 << 0,
    /// The disk is the default primary storage
    DefaultPrimary = 1 << 1,
    /// SD card reader
    Sd = 1 << 2,
    /// USB attached
    Usb = 1 << 3,
}

/// A disk as last reported by the storage event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    /// Stable disk identifier (e.g. "disk:8,16" or a UDisks2 drive Id)
    pub id: String,

    /// Hardware traits
    #[serde(default)]
    pub flags: BitFlags<DiskFlag>,

    /// Number of volumes currently reported on this disk
    #[serde(default)]
    pub volume_count: u32,
}

impl Disk {
    pub fn new(id: impl Into<String>, volume_count: u32) -> Self {
        Self {
            id: id.into(),
            flags: BitFlags::empty(),
            volume_count,
        }
    }

    pub fn with_flags(mut self, flags: impl Into<BitFlags<DiskFlag>>) -> Self {
        self.flags = flags.into();
        self
    }

    /// A disk without any reported volume has nothing usable on it yet.
    pub fn is_invalid(&self) -> bool {
        self.volume_count == 0
    }

    /// Records without an identifier cannot be tracked at all.
    pub fn is_malformed(&self) -> bool {
        self.id.trim().is_empty()
    }

    pub fn is_usb(&self) -> bool {
        self.flags.contains(DiskFlag::Usb)
    }

    pub fn is_sd(&self) -> bool {
        self.flags.contains(DiskFlag::Sd)
    }
}
