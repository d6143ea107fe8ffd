//! In-memory storage event source
//!
//! Holds a disk and volume inventory, delivers events to registered
//! listeners on demand and mirrors them into its own inventory so a
//! restarted tracker enumerates what the events left behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use storage_contracts::{StorageError, StorageEventListener, StorageEventSource, SubscriptionId};
use storage_types::{Disk, StorageEvent, Volume};

#[derive(Default)]
struct Inventory {
    disks: Vec<Disk>,
    volumes: Vec<Volume>,
}

impl Inventory {
    fn apply(&mut self, event: &StorageEvent) {
        match event {
            StorageEvent::DiskScanned { disk, volume_count } => {
                let mut disk = disk.clone();
                disk.volume_count = *volume_count;
                match self.disks.iter_mut().find(|d| d.id == disk.id) {
                    Some(existing) => *existing = disk,
                    None => self.disks.push(disk),
                }
            }
            StorageEvent::DiskDestroyed { disk } => {
                self.disks.retain(|d| d.id != disk.id);
                self.volumes.retain(|v| v.disk_id != disk.id);
            }
            StorageEvent::VolumeStateChanged {
                volume, new_state, ..
            } => {
                let volume = volume.with_state(*new_state);
                match self.volumes.iter_mut().find(|v| v.id == volume.id) {
                    Some(existing) => *existing = volume,
                    None => self.volumes.push(volume),
                }
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct MemoryEventSource {
    inventory: Mutex<Inventory>,
    listeners: Mutex<Vec<(SubscriptionId, Arc<dyn StorageEventListener>)>>,
    available: AtomicBool,
}

impl Default for MemoryEventSource {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl MemoryEventSource {
    pub fn new(disks: Vec<Disk>, volumes: Vec<Volume>) -> Self {
        Self {
            inventory: Mutex::new(Inventory { disks, volumes }),
            listeners: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// While unavailable, enumeration and subscription fail with `Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::unavailable("in-memory storage source switched off"))
        }
    }

    /// Deliver `event` to every listener in registration order.
    pub fn emit(&self, event: &StorageEvent) {
        lock(&self.inventory).apply(event);

        let listeners: Vec<_> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener.dispatch(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }
}

#[async_trait]
impl StorageEventSource for MemoryEventSource {
    async fn list_disks(&self) -> Result<Vec<Disk>, StorageError> {
        self.ensure_available()?;
        Ok(lock(&self.inventory).disks.clone())
    }

    async fn list_volumes(&self) -> Result<Vec<Volume>, StorageError> {
        self.ensure_available()?;
        Ok(lock(&self.inventory).volumes.clone())
    }

    async fn subscribe(
        &self,
        listener: Arc<dyn StorageEventListener>,
    ) -> Result<SubscriptionId, StorageError> {
        self.ensure_available()?;
        let id = SubscriptionId::new();
        lock(&self.listeners).push((id, listener));
        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), StorageError> {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(candidate, _)| *candidate != id);
        if listeners.len() == before {
            return Err(StorageError::not_found(format!("subscription {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use storage_types::VolumeState;

    use super::*;

    #[tokio::test]
    async fn unavailable_source_refuses_everything() {
        let source = MemoryEventSource::default();
        source.set_available(false);

        assert!(source.list_disks().await.is_err());
        assert!(source.list_volumes().await.is_err());
    }

    #[tokio::test]
    async fn unknown_subscription_is_not_found() {
        let source = MemoryEventSource::default();
        let error = source
            .unsubscribe(SubscriptionId::new())
            .await
            .expect_err("nothing was subscribed");
        assert_eq!(error.kind, storage_contracts::StorageErrorKind::NotFound);
    }

    #[tokio::test]
    async fn emitted_events_update_inventory() {
        let source = MemoryEventSource::new(vec![Disk::new("D1", 1)], vec![]);
        let v1 = Volume::new("V1", "abc", "D1", VolumeState::Checking);

        source.emit(&StorageEvent::VolumeStateChanged {
            volume: v1.clone(),
            old_state: None,
            new_state: VolumeState::Mounted,
        });
        assert_eq!(
            source.list_volumes().await.unwrap(),
            vec![v1.with_state(VolumeState::Mounted)]
        );

        source.emit(&StorageEvent::DiskDestroyed {
            disk: Disk::new("D1", 1),
        });
        assert!(source.list_disks().await.unwrap().is_empty());
        assert!(source.list_volumes().await.unwrap().is_empty());
    }
}
