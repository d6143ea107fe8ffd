// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for COSMIC Ext Storage volume tracking
//!
//! This crate defines the single source of truth for the types that flow
//! between the storage event sources and the lifecycle tracker:
//!
//! - `Disk` / `DiskFlag` → physical or virtual storage devices
//! - `Volume` / `VolumeState` → logical volumes and their host-reported state
//! - `StorageEvent` → raw events delivered by a source
//! - `LifecycleEvent` → normalized usable/unusable notifications

pub mod disk;
pub mod event;
pub mod volume;

pub use disk::{Disk, DiskFlag};
pub use event::{LifecycleEvent, StorageEvent};
pub use volume::{Usability, Volume, VolumeState};
