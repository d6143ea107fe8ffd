// SPDX-License-Identifier: GPL-3.0-only

//! Volume lifecycle tracking
//!
//! Consumes disk and volume events from a `StorageEventSource`, keeps a
//! consistent view of which disks and volumes exist, and reports volumes
//! becoming usable or unusable. Records missing identity fields never
//! produce notifications; disks without volumes get a placeholder volume.

pub mod config;
pub mod error;
mod lifecycle;
pub mod registry;
mod tracker;
pub mod validity;

pub use config::{TrackerConfig, UnusableNotifications};
pub use error::{Result, TrackerError};
pub use lifecycle::LifecycleEventStream;
pub use registry::{TrackerSnapshot, VolumeRegistry};
pub use tracker::VolumeLifecycleTracker;
pub use validity::{InvalidReason, Validity, check_volume};
