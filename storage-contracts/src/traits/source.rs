// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use async_trait::async_trait;

use storage_types::{Disk, StorageEvent, Volume, VolumeState};

use crate::{StorageError, SubscriptionId};

/// Callbacks a storage event source delivers to its subscribers.
///
/// Sources must deliver events serially: a callback returns before the next
/// one for the same listener starts.
pub trait StorageEventListener: Send + Sync {
    fn on_volume_state_changed(
        &self,
        volume: &Volume,
        old_state: Option<VolumeState>,
        new_state: VolumeState,
    );

    fn on_disk_scanned(&self, disk: &Disk, volume_count: u32);

    fn on_disk_destroyed(&self, disk: &Disk);

    /// Route a raw event to the matching callback.
    fn dispatch(&self, event: &StorageEvent) {
        match event {
            StorageEvent::VolumeStateChanged {
                volume,
                old_state,
                new_state,
            } => self.on_volume_state_changed(volume, *old_state, *new_state),
            StorageEvent::DiskScanned { disk, volume_count } => {
                self.on_disk_scanned(disk, *volume_count)
            }
            StorageEvent::DiskDestroyed { disk } => self.on_disk_destroyed(disk),
        }
    }
}

/// Host service that knows which disks and volumes exist.
#[async_trait]
pub trait StorageEventSource: Send + Sync {
    /// Point-in-time enumeration of disks; may be empty.
    async fn list_disks(&self) -> Result<Vec<Disk>, StorageError>;

    /// Point-in-time enumeration of volumes; may be empty.
    async fn list_volumes(&self) -> Result<Vec<Volume>, StorageError>;

    async fn subscribe(
        &self,
        listener: Arc<dyn StorageEventListener>,
    ) -> Result<SubscriptionId, StorageError>;

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl StorageEventListener for Recorder {
        fn on_volume_state_changed(
            &self,
            volume: &Volume,
            old_state: Option<VolumeState>,
            new_state: VolumeState,
        ) {
            let old = old_state.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
            self.calls
                .lock()
                .unwrap()
                .push(format!("volume {} {old}->{new_state}", volume.id));
        }

        fn on_disk_scanned(&self, disk: &Disk, volume_count: u32) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("scanned {} {volume_count}", disk.id));
        }

        fn on_disk_destroyed(&self, disk: &Disk) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("destroyed {}", disk.id));
        }
    }

    #[test]
    fn dispatch_routes_each_event_kind() {
        let recorder = Recorder::default();
        let disk = Disk::new("D1", 1);
        let volume = Volume::new("V1", "abc", "D1", VolumeState::Mounted);

        recorder.dispatch(&StorageEvent::DiskScanned {
            disk: disk.clone(),
            volume_count: 1,
        });
        recorder.dispatch(&StorageEvent::VolumeStateChanged {
            volume,
            old_state: None,
            new_state: VolumeState::Mounted,
        });
        recorder.dispatch(&StorageEvent::DiskDestroyed { disk });

        assert_eq!(
            *recorder.calls.lock().unwrap(),
            vec![
                "scanned D1 1".to_string(),
                "volume V1 -->mounted".to_string(),
                "destroyed D1".to_string(),
            ]
        );
    }
}
