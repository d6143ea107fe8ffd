// SPDX-License-Identifier: GPL-3.0-only

//! Volume lifecycle tracker
//!
//! Seeds a `VolumeRegistry` from the source's enumeration, then keeps it
//! current from the source's event stream and fans resulting lifecycle
//! notifications out to subscribers.

use std::sync::{Arc, Mutex, MutexGuard};

use storage_contracts::{StorageEventListener, StorageEventSource, SubscriptionId};
use storage_types::{Disk, LifecycleEvent, Volume, VolumeState};
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::lifecycle::{LifecycleEventStream, LifecycleFanout};
use crate::registry::{TrackerSnapshot, VolumeRegistry};

#[derive(Debug)]
struct TrackerCore {
    registry: VolumeRegistry,
    fanout: LifecycleFanout,
    running: bool,
}

impl TrackerCore {
    fn publish(&mut self, event: Option<LifecycleEvent>) {
        let Some(event) = event else {
            return;
        };

        match &event {
            LifecycleEvent::VolumeBecameUsable(volume) => {
                info!("Volume {} became usable ({})", volume.id, volume.state)
            }
            LifecycleEvent::VolumeBecameUnusable(volume) => {
                info!("Volume {} became unusable ({})", volume.id, volume.state)
            }
        }
        self.fanout.emit(event);
    }
}

fn lock(core: &Mutex<TrackerCore>) -> MutexGuard<'_, TrackerCore> {
    core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Listener registered with the source; forwards into the shared core.
struct TrackerListener {
    core: Arc<Mutex<TrackerCore>>,
}

impl TrackerListener {
    fn with_running_core(&self, event: &str, f: impl FnOnce(&mut TrackerCore)) {
        let mut core = lock(&self.core);
        if !core.running {
            debug!("Tracker stopped, ignoring {event}");
            return;
        }
        f(&mut core);
    }
}

impl StorageEventListener for TrackerListener {
    fn on_volume_state_changed(
        &self,
        volume: &Volume,
        old_state: Option<VolumeState>,
        new_state: VolumeState,
    ) {
        self.with_running_core("volume state change", |core| {
            let event = core
                .registry
                .volume_state_changed(volume, old_state, new_state);
            core.publish(event);
        });
    }

    fn on_disk_scanned(&self, disk: &Disk, volume_count: u32) {
        self.with_running_core("disk scan", |core| {
            core.registry.disk_scanned(disk, volume_count)
        });
    }

    fn on_disk_destroyed(&self, disk: &Disk) {
        self.with_running_core("disk removal", |core| core.registry.disk_destroyed(disk));
    }
}

/// Tracks which disks and volumes exist and reports volumes becoming
/// usable or unusable.
///
/// `start` and `stop` take `&mut self`, so they cannot race each other; the
/// source must deliver events serially.
pub struct VolumeLifecycleTracker<S: ?Sized = dyn StorageEventSource> {
    source: Arc<S>,
    core: Arc<Mutex<TrackerCore>>,
    subscription: Option<SubscriptionId>,
    config: TrackerConfig,
}

impl<S> VolumeLifecycleTracker<S>
where
    S: StorageEventSource + ?Sized,
{
    pub fn new(source: Arc<S>, config: TrackerConfig) -> Self {
        let core = TrackerCore {
            registry: VolumeRegistry::new(config.unusable_notifications),
            fanout: LifecycleFanout::default(),
            running: false,
        };

        Self {
            source,
            core: Arc::new(Mutex::new(core)),
            subscription: None,
            config,
        }
    }

    /// Enumerate the source, seed state, then subscribe to live events.
    ///
    /// States already present at enumeration time are not reported.
    pub async fn start(&mut self) -> Result<()> {
        if self.subscription.is_some() {
            debug!("Volume tracker already running");
            return Ok(());
        }

        let disks = self
            .source
            .list_disks()
            .await
            .map_err(TrackerError::SourceUnavailable)?;
        let volumes = self
            .source
            .list_volumes()
            .await
            .map_err(TrackerError::SourceUnavailable)?;

        {
            let mut core = lock(&self.core);
            core.registry.seed(disks, volumes);
            core.running = true;
        }

        let listener: Arc<dyn StorageEventListener> = Arc::new(TrackerListener {
            core: Arc::clone(&self.core),
        });

        match self.source.subscribe(listener).await {
            Ok(id) => {
                self.subscription = Some(id);
                info!(
                    "Volume tracker started (subscription {id}, {} lifecycle subscribers)",
                    lock(&self.core).fanout.subscriber_count()
                );
                Ok(())
            }
            Err(e) => {
                let mut core = lock(&self.core);
                core.running = false;
                core.registry.clear();
                Err(TrackerError::SourceUnavailable(e))
            }
        }
    }

    /// Unsubscribe and discard tracked state. Lifecycle subscribers stay registered.
    pub async fn stop(&mut self) {
        let Some(id) = self.subscription.take() else {
            debug!("Volume tracker not running");
            return;
        };

        {
            let mut core = lock(&self.core);
            core.running = false;
            core.registry.clear();
        }

        if let Err(e) = self.source.unsubscribe(id).await {
            warn!("Failed to unsubscribe from storage events: {e}");
        }

        info!("Volume tracker stopped");
    }

    pub fn is_running(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn subscribe(&self) -> LifecycleEventStream {
        lock(&self.core).fanout.subscribe()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        lock(&self.core).registry.snapshot()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}
