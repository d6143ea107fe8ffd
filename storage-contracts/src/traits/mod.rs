// SPDX-License-Identifier: GPL-3.0-only

pub mod source;

pub use source::{StorageEventListener, StorageEventSource};
