// SPDX-License-Identifier: GPL-3.0-only

//! UDisks2-backed storage event source
//!
//! Enumerates drives and filesystems through the UDisks2 object manager and
//! turns its D-Bus signals into serially delivered storage events.

pub mod error;
pub mod inventory;
pub mod manager;

pub use error::DiskError;
pub use inventory::{Inventory, ManagedObjects};
pub use manager::{UDisks2ObjectManagerProxy, UdisksEventSource};
