// SPDX-License-Identifier: GPL-3.0-only

//! Disk and volume inventory - builds storage_types::Disk and Volume from UDisks2 managed objects.
//!
//! Live updates are derived by diffing two consecutive inventories, which
//! turns whatever signal UDisks2 sent into the scanned / state-changed /
//! destroyed events the tracker understands.

use std::collections::{BTreeMap, HashMap};

use enumflags2::BitFlags;
use storage_types::{Disk, DiskFlag, StorageEvent, Volume, VolumeState};
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

pub(crate) const DRIVE_IFACE: &str = "org.freedesktop.UDisks2.Drive";
pub(crate) const BLOCK_IFACE: &str = "org.freedesktop.UDisks2.Block";
pub(crate) const FILESYSTEM_IFACE: &str = "org.freedesktop.UDisks2.Filesystem";

pub type InterfaceProperties = HashMap<String, OwnedValue>;
pub type ManagedObjects = HashMap<OwnedObjectPath, HashMap<String, InterfaceProperties>>;

/// Disks and volumes keyed by their UDisks2 object path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    disks: BTreeMap<String, Disk>,
    volumes: BTreeMap<String, Volume>,
}

fn property<'a>(props: &'a InterfaceProperties, name: &str) -> Option<&'a Value<'static>> {
    props.get(name).map(|value| &**value)
}

fn string_property(props: &InterfaceProperties, name: &str) -> String {
    match property(props, name) {
        Some(Value::Str(s)) => s.as_str().trim().to_string(),
        _ => String::new(),
    }
}

fn bool_property(props: &InterfaceProperties, name: &str) -> bool {
    matches!(property(props, name), Some(Value::Bool(true)))
}

fn object_path_property(props: &InterfaceProperties, name: &str) -> Option<String> {
    match property(props, name) {
        Some(Value::ObjectPath(path)) if path.as_str() != "/" => Some(path.as_str().to_string()),
        _ => None,
    }
}

fn array_len(props: &InterfaceProperties, name: &str) -> usize {
    match property(props, name) {
        Some(Value::Array(array)) => array.len(),
        _ => 0,
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn drive_flags(connection_bus: &str) -> BitFlags<DiskFlag> {
    match connection_bus {
        "usb" => DiskFlag::Usb.into(),
        "sdio" => DiskFlag::Sd.into(),
        _ => BitFlags::empty(),
    }
}

fn volume_state(interfaces: &HashMap<String, InterfaceProperties>, read_only: bool) -> VolumeState {
    match interfaces.get(FILESYSTEM_IFACE) {
        Some(fs) if array_len(fs, "MountPoints") > 0 => {
            if read_only {
                VolumeState::MountedReadOnly
            } else {
                VolumeState::Mounted
            }
        }
        Some(_) => VolumeState::Unmounted,
        // A filesystem UDisks2 cannot mount is still there as a raw device
        None => VolumeState::Unmountable,
    }
}

impl Inventory {
    pub fn from_managed_objects(objects: &ManagedObjects) -> Self {
        let mut disks = BTreeMap::new();
        for (path, interfaces) in objects {
            let Some(drive) = interfaces.get(DRIVE_IFACE) else {
                continue;
            };

            let mut id = string_property(drive, "Id");
            if id.is_empty() {
                id = basename(path.as_str()).to_string();
            }
            let disk = Disk::new(id, 0)
                .with_flags(drive_flags(&string_property(drive, "ConnectionBus")));
            disks.insert(path.as_str().to_string(), disk);
        }

        let mut volumes = BTreeMap::new();
        for (path, interfaces) in objects {
            let Some(block) = interfaces.get(BLOCK_IFACE) else {
                continue;
            };
            if string_property(block, "IdUsage") != "filesystem" {
                continue;
            }

            let drive_path = object_path_property(block, "Drive");
            let disk_id = match drive_path.as_ref().and_then(|p| disks.get_mut(p)) {
                Some(disk) => {
                    disk.volume_count += 1;
                    disk.id.clone()
                }
                None => String::new(),
            };

            let volume = Volume::new(
                basename(path.as_str()),
                string_property(block, "IdUUID"),
                disk_id,
                volume_state(interfaces, bool_property(block, "ReadOnly")),
            );
            volumes.insert(path.as_str().to_string(), volume);
        }

        Self { disks, volumes }
    }

    pub fn disks(&self) -> Vec<Disk> {
        self.disks.values().cloned().collect()
    }

    pub fn volumes(&self) -> Vec<Volume> {
        self.volumes.values().cloned().collect()
    }

    /// Events that turn `self` into `next`.
    ///
    /// Ordered so that disks exist before their volumes change and outlive
    /// their volumes' removal. Volumes are only reported when their state changes.
    pub fn diff(&self, next: &Inventory) -> Vec<StorageEvent> {
        let mut events = Vec::new();

        for (path, disk) in &next.disks {
            if self.disks.get(path) != Some(disk) {
                events.push(StorageEvent::DiskScanned {
                    disk: disk.clone(),
                    volume_count: disk.volume_count,
                });
            }
        }

        for (path, volume) in &next.volumes {
            match self.volumes.get(path) {
                None => events.push(StorageEvent::VolumeStateChanged {
                    volume: volume.clone(),
                    old_state: None,
                    new_state: volume.state,
                }),
                // Property churn without a state change is not a lifecycle step
                Some(previous) if previous.state != volume.state => {
                    events.push(StorageEvent::VolumeStateChanged {
                        volume: volume.clone(),
                        old_state: Some(previous.state),
                        new_state: volume.state,
                    })
                }
                Some(_) => {}
            }
        }

        for (path, volume) in &self.volumes {
            if !next.volumes.contains_key(path) {
                events.push(StorageEvent::VolumeStateChanged {
                    volume: volume.with_state(VolumeState::Removed),
                    old_state: Some(volume.state),
                    new_state: VolumeState::Removed,
                });
            }
        }

        for (path, disk) in &self.disks {
            if !next.disks.contains_key(path) {
                events.push(StorageEvent::DiskDestroyed { disk: disk.clone() });
            }
        }

        events
    }
}
