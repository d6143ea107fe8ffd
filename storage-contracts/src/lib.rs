// SPDX-License-Identifier: GPL-3.0-only

//! Contracts between storage event sources and their consumers

pub mod protocol;
pub mod traits;

pub use protocol::{StorageError, StorageErrorKind, SubscriptionId};
pub use traits::{StorageEventListener, StorageEventSource};
