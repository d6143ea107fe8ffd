// SPDX-License-Identifier: GPL-3.0-only

//! Reconciliation of disk and volume records
//!
//! `VolumeRegistry` is the synchronous core of the tracker: it owns the
//! de-duplicated disk and volume maps, applies one raw event at a time and
//! returns the lifecycle notification (if any) the event warrants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use storage_types::{Disk, LifecycleEvent, Usability, Volume, VolumeState};
use tracing::debug;

use crate::config::UnusableNotifications;
use crate::validity::{Validity, check_volume};

/// Immutable copy of everything the tracker currently knows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub disks: Vec<Disk>,
    pub volumes: Vec<Volume>,
}

impl TrackerSnapshot {
    pub fn disk(&self, id: &str) -> Option<&Disk> {
        self.disks.iter().find(|d| d.id == id)
    }

    pub fn volume(&self, id: &str) -> Option<&Volume> {
        self.volumes.iter().find(|v| v.id == id)
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &Volume> {
        self.volumes.iter().filter(|v| v.placeholder)
    }
}

/// What subscribers have been told about one volume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct VolumeHistory {
    /// Usability of the last notification, or of the state seen at enumeration
    reported: Option<Usability>,
    /// Last delivered state and the notification it produced
    last_delivery: Option<(VolumeState, Option<Usability>)>,
}

impl VolumeHistory {
    fn baseline(state: Option<VolumeState>) -> Self {
        Self {
            reported: state
                .map(VolumeState::usability)
                .filter(|u| *u != Usability::Transitional),
            last_delivery: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct VolumeRegistry {
    disks: BTreeMap<String, Disk>,
    volumes: BTreeMap<String, Volume>,
    histories: BTreeMap<String, VolumeHistory>,
    unusable_notifications: UnusableNotifications,
}

impl VolumeRegistry {
    pub fn new(unusable_notifications: UnusableNotifications) -> Self {
        Self {
            disks: BTreeMap::new(),
            volumes: BTreeMap::new(),
            histories: BTreeMap::new(),
            unusable_notifications,
        }
    }

    pub fn clear(&mut self) {
        self.disks.clear();
        self.volumes.clear();
        self.histories.clear();
    }

    pub fn check_volume<'a>(&self, volume: &'a Volume) -> Validity<'a> {
        check_volume(volume, &self.disks, self.volumes.get(&volume.id))
    }

    /// Replace all state with an enumeration snapshot. Never notifies.
    pub fn seed(&mut self, disks: Vec<Disk>, volumes: Vec<Volume>) {
        self.clear();

        for disk in &disks {
            self.disk_scanned(disk, disk.volume_count);
        }

        for volume in volumes {
            match self.check_volume(&volume) {
                Validity::Valid(_) => {
                    self.histories
                        .insert(volume.id.clone(), VolumeHistory::baseline(Some(volume.state)));
                    self.volumes.insert(volume.id.clone(), volume);
                }
                Validity::Invalid(reason) => {
                    debug!("Skipping enumerated volume {:?}: {}", volume.id, reason);
                }
            }
        }

        debug!(
            "Seeded {} disks and {} volumes",
            self.disks.len(),
            self.volumes.len()
        );
    }

    pub fn volume_state_changed(
        &mut self,
        volume: &Volume,
        old_state: Option<VolumeState>,
        new_state: VolumeState,
    ) -> Option<LifecycleEvent> {
        if let Validity::Invalid(reason) = self.check_volume(volume) {
            debug!(
                "Ignoring state change of volume {:?} to {}: {}",
                volume.id, new_state, reason
            );
            return None;
        }

        let policy = self.unusable_notifications;
        let updated = volume.with_state(new_state);
        let history = self
            .histories
            .entry(updated.id.clone())
            .or_insert_with(|| VolumeHistory::baseline(old_state));

        let outcome = match history.last_delivery {
            // Re-delivery of the last state has the same consequence again
            Some((state, outcome)) if state == new_state => outcome,
            _ => {
                let outcome = match new_state.usability() {
                    Usability::Usable => Some(Usability::Usable),
                    Usability::Unusable
                        if policy == UnusableNotifications::PerTransition
                            && history.reported == Some(Usability::Unusable) =>
                    {
                        debug!(
                            "Volume {:?} already reported unusable, collapsing {}",
                            updated.id, new_state
                        );
                        None
                    }
                    Usability::Unusable => Some(Usability::Unusable),
                    Usability::Transitional => None,
                };
                if outcome.is_some() {
                    history.reported = outcome;
                }
                history.last_delivery = Some((new_state, outcome));
                outcome
            }
        };

        self.volumes.insert(updated.id.clone(), updated.clone());
        match outcome {
            Some(Usability::Usable) => Some(LifecycleEvent::VolumeBecameUsable(updated)),
            Some(Usability::Unusable) => Some(LifecycleEvent::VolumeBecameUnusable(updated)),
            _ => None,
        }
    }

    pub fn disk_scanned(&mut self, disk: &Disk, volume_count: u32) {
        if disk.is_malformed() {
            debug!("Ignoring scanned disk without id");
            return;
        }

        let mut disk = disk.clone();
        disk.volume_count = volume_count;

        let has_placeholder = self.volumes.get(&disk.id).is_some_and(|v| v.placeholder);
        if disk.is_invalid() {
            match self.volumes.get(&disk.id) {
                None => {
                    debug!("Disk {:?} has no volumes, adding placeholder", disk.id);
                    self.volumes
                        .insert(disk.id.clone(), Volume::placeholder_for(&disk));
                }
                Some(existing) if !existing.placeholder => {
                    debug!(
                        "Disk {:?} has no volumes but its id is taken by a real volume",
                        disk.id
                    );
                }
                Some(_) => {}
            }
        } else if has_placeholder {
            debug!("Disk {:?} now reports volumes, dropping placeholder", disk.id);
            self.volumes.remove(&disk.id);
        }

        self.disks.insert(disk.id.clone(), disk);
    }

    pub fn disk_destroyed(&mut self, disk: &Disk) {
        if disk.is_malformed() {
            debug!("Ignoring destroyed disk without id");
            return;
        }

        if self.disks.remove(&disk.id).is_none() {
            debug!("Destroyed disk {:?} was not tracked", disk.id);
        }

        let before = self.volumes.len();
        self.volumes.retain(|_, v| v.disk_id != disk.id);
        let purged = before - self.volumes.len();
        self.histories.retain(|id, _| self.volumes.contains_key(id));
        if purged > 0 {
            debug!("Purged {} volume records of disk {:?}", purged, disk.id);
        }
    }

    pub fn disk(&self, id: &str) -> Option<&Disk> {
        self.disks.get(id)
    }

    pub fn volume(&self, id: &str) -> Option<&Volume> {
        self.volumes.get(id)
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            disks: self.disks.values().cloned().collect(),
            volumes: self.volumes.values().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_d1() -> VolumeRegistry {
        let mut registry = VolumeRegistry::default();
        registry.disk_scanned(&Disk::new("D1", 2), 2);
        registry
    }

    fn v1(state: VolumeState) -> Volume {
        Volume::new("V1", "abc", "D1", state)
    }

    #[test]
    fn mount_sequence_emits_usable_once() {
        let mut registry = registry_with_d1();

        let events: Vec<_> = [
            (None, VolumeState::Unmounted),
            (Some(VolumeState::Unmounted), VolumeState::Checking),
            (Some(VolumeState::Checking), VolumeState::Mounted),
        ]
        .into_iter()
        .filter_map(|(old, new)| registry.volume_state_changed(&v1(new), old, new))
        .collect();

        assert_eq!(
            events,
            vec![LifecycleEvent::VolumeBecameUsable(v1(VolumeState::Mounted))]
        );
    }

    #[test]
    fn ntfs_volume_counts_as_usable() {
        let mut registry = registry_with_d1();
        let event = registry.volume_state_changed(
            &v1(VolumeState::Unmountable),
            Some(VolumeState::Checking),
            VolumeState::Unmountable,
        );
        assert!(event.is_some_and(|e| e.is_usable()));
    }

    #[test]
    fn eject_sequence_emits_unusable_once() {
        let mut registry = registry_with_d1();
        registry.volume_state_changed(&v1(VolumeState::Mounted), None, VolumeState::Mounted);

        let ejecting = registry.volume_state_changed(
            &v1(VolumeState::Ejecting),
            Some(VolumeState::Mounted),
            VolumeState::Ejecting,
        );
        let removed = registry.volume_state_changed(
            &v1(VolumeState::Removed),
            Some(VolumeState::Ejecting),
            VolumeState::Removed,
        );

        assert_eq!(
            ejecting,
            Some(LifecycleEvent::VolumeBecameUnusable(v1(
                VolumeState::Ejecting
            )))
        );
        assert_eq!(removed, None);
        assert_eq!(
            registry.volume("V1").map(|v| v.state),
            Some(VolumeState::Removed)
        );
    }

    #[test]
    fn per_state_policy_emits_every_unusable_state() {
        let mut registry = VolumeRegistry::new(UnusableNotifications::PerState);
        registry.disk_scanned(&Disk::new("D1", 1), 1);
        registry.volume_state_changed(&v1(VolumeState::Mounted), None, VolumeState::Mounted);

        let emitted = [VolumeState::Ejecting, VolumeState::Removed]
            .into_iter()
            .filter_map(|state| registry.volume_state_changed(&v1(state), None, state))
            .filter(|e| !e.is_usable())
            .count();

        assert_eq!(emitted, 2);
    }

    #[test]
    fn untracked_volume_falls_back_to_reported_old_state() {
        let mut registry = registry_with_d1();
        let event = registry.volume_state_changed(
            &v1(VolumeState::Removed),
            Some(VolumeState::Ejecting),
            VolumeState::Removed,
        );
        assert_eq!(event, None);
    }

    #[test]
    fn repeated_delivery_has_same_consequence() {
        let mut registry = registry_with_d1();

        for state in [
            VolumeState::Mounted,
            VolumeState::Ejecting,
            VolumeState::Checking,
        ] {
            let first = registry.volume_state_changed(&v1(state), None, state);
            let second = registry.volume_state_changed(&v1(state), Some(state), state);
            assert_eq!(first, second, "state {state}");
        }
    }

    #[test]
    fn collapsed_unusable_state_stays_collapsed_on_redelivery() {
        let mut registry = registry_with_d1();
        registry.volume_state_changed(&v1(VolumeState::Mounted), None, VolumeState::Mounted);

        let ejecting = registry.volume_state_changed(
            &v1(VolumeState::Ejecting),
            Some(VolumeState::Mounted),
            VolumeState::Ejecting,
        );
        let removed: Vec<_> = (0..2)
            .map(|_| {
                registry.volume_state_changed(
                    &v1(VolumeState::Removed),
                    Some(VolumeState::Ejecting),
                    VolumeState::Removed,
                )
            })
            .collect();

        assert!(ejecting.is_some_and(|e| !e.is_usable()));
        assert_eq!(removed, vec![None, None]);
    }

    #[test]
    fn unplug_through_unmounted_reports_unusable_once() {
        let mut registry = registry_with_d1();

        let unusable = [
            VolumeState::Mounted,
            VolumeState::Ejecting,
            VolumeState::Unmounted,
            VolumeState::Removed,
        ]
        .into_iter()
        .filter_map(|state| registry.volume_state_changed(&v1(state), None, state))
        .filter(|e| !e.is_usable())
        .count();

        assert_eq!(unusable, 1);
    }

    #[test]
    fn remount_after_removal_reports_again() {
        let mut registry = registry_with_d1();

        let events: Vec<_> = [
            VolumeState::Mounted,
            VolumeState::Ejecting,
            VolumeState::Removed,
            VolumeState::Checking,
            VolumeState::Mounted,
            VolumeState::Ejecting,
        ]
        .into_iter()
        .filter_map(|state| registry.volume_state_changed(&v1(state), None, state))
        .map(|e| e.is_usable())
        .collect();

        assert_eq!(events, vec![true, false, true, false]);
    }

    #[test]
    fn seeded_unusable_volume_does_not_report_again() {
        let mut registry = VolumeRegistry::default();
        registry.seed(vec![Disk::new("D1", 1)], vec![v1(VolumeState::Ejecting)]);

        assert_eq!(
            registry.volume_state_changed(
                &v1(VolumeState::Removed),
                Some(VolumeState::Ejecting),
                VolumeState::Removed,
            ),
            None
        );
    }

    #[test]
    fn invalid_volumes_neither_emit_nor_mutate() {
        let mut registry = registry_with_d1();
        let before = registry.snapshot();

        let invalid = [
            Volume::new("V2", "", "D1", VolumeState::Mounted),
            Volume::new("V3", "abc", "", VolumeState::Mounted),
            Volume::new("V4", "abc", "D9", VolumeState::Mounted),
        ];
        for volume in &invalid {
            assert_eq!(
                registry.volume_state_changed(volume, None, VolumeState::Mounted),
                None
            );
            assert_eq!(
                registry.volume_state_changed(volume, None, VolumeState::Removed),
                None
            );
        }

        assert_eq!(registry.snapshot(), before);
    }

    #[test]
    fn empty_disk_gets_exactly_one_placeholder() {
        let mut registry = VolumeRegistry::default();
        let d2 = Disk::new("D2", 0);

        registry.disk_scanned(&d2, 0);
        registry.disk_scanned(&d2, 0);

        let snapshot = registry.snapshot();
        let placeholders: Vec<_> = snapshot.placeholders().collect();
        assert_eq!(placeholders.len(), 1);
        assert_eq!(placeholders[0].id, "D2");
        assert!(!registry.check_volume(placeholders[0]).is_valid());

        registry.disk_destroyed(&d2);
        assert_eq!(registry.snapshot(), TrackerSnapshot::default());
    }

    #[test]
    fn placeholder_never_emits_even_when_mounted() {
        let mut registry = VolumeRegistry::default();
        registry.disk_scanned(&Disk::new("D2", 0), 0);

        let claimed = Volume::new("D2", "xyz", "D2", VolumeState::Mounted);
        for state in VolumeState::ALL {
            assert_eq!(registry.volume_state_changed(&claimed, None, state), None);
        }
        assert!(registry.volume("D2").is_some_and(|v| v.placeholder));
    }

    #[test]
    fn rescan_with_volumes_drops_placeholder() {
        let mut registry = VolumeRegistry::default();
        registry.disk_scanned(&Disk::new("D2", 0), 0);
        registry.disk_scanned(&Disk::new("D2", 0), 1);

        assert!(registry.volume("D2").is_none());
        assert_eq!(registry.disk("D2").map(|d| d.volume_count), Some(1));
    }

    #[test]
    fn destroying_disk_purges_its_volumes_only() {
        let mut registry = registry_with_d1();
        registry.disk_scanned(&Disk::new("D3", 1), 1);
        registry.volume_state_changed(&v1(VolumeState::Mounted), None, VolumeState::Mounted);
        let other = Volume::new("V9", "def", "D3", VolumeState::Mounted);
        registry.volume_state_changed(&other, None, VolumeState::Mounted);

        registry.disk_destroyed(&Disk::new("D1", 2));

        assert!(registry.disk("D1").is_none());
        assert!(registry.volume("V1").is_none());
        assert!(registry.volume("V9").is_some());
        assert_eq!(
            registry.volume_state_changed(&v1(VolumeState::Mounted), None, VolumeState::Mounted),
            None
        );
    }

    #[test]
    fn seed_skips_invalid_volumes_and_adds_placeholders() {
        let mut registry = VolumeRegistry::default();
        registry.seed(
            vec![Disk::new("D1", 1), Disk::new("D2", 0), Disk::new("", 1)],
            vec![
                v1(VolumeState::Mounted),
                Volume::new("V2", "", "D1", VolumeState::Mounted),
                Volume::new("V5", "ghi", "D7", VolumeState::Mounted),
            ],
        );

        let snapshot = registry.snapshot();
        let disk_ids: Vec<_> = snapshot.disks.iter().map(|d| d.id.as_str()).collect();
        let volume_ids: Vec<_> = snapshot.volumes.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(disk_ids, vec!["D1", "D2"]);
        assert_eq!(volume_ids, vec!["D2", "V1"]);
    }

    #[test]
    fn volume_on_unknown_disk_does_not_create_disk() {
        let mut registry = VolumeRegistry::default();
        let orphan = Volume::new("V1", "abc", "D1", VolumeState::Mounted);

        assert_eq!(
            registry.volume_state_changed(&orphan, None, VolumeState::Mounted),
            None
        );
        assert!(registry.disk("D1").is_none());
    }
}
