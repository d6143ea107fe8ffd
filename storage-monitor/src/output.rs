// SPDX-License-Identifier: GPL-3.0-only

use anyhow::Result;
use storage_types::LifecycleEvent;

use crate::config::OutputFormat;

/// Render one lifecycle event as a single output line.
pub fn format_event(event: &LifecycleEvent, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(event)?),
        OutputFormat::Text => {
            let verdict = if event.is_usable() { "usable" } else { "unusable" };
            let volume = event.volume();
            Ok(format!(
                "{verdict}\t{}\t{}\tuuid={}\tdisk={}",
                volume.id, volume.state, volume.fs_uuid, volume.disk_id
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use storage_types::{Volume, VolumeState};

    use super::*;

    fn usable() -> LifecycleEvent {
        LifecycleEvent::VolumeBecameUsable(Volume::new(
            "sdb1",
            "01D9-NTFS",
            "usb-1",
            VolumeState::Unmountable,
        ))
    }

    #[test]
    fn text_line_is_tab_separated() {
        assert_eq!(
            format_event(&usable(), OutputFormat::Text).unwrap(),
            "usable\tsdb1\tunmountable\tuuid=01D9-NTFS\tdisk=usb-1"
        );
    }

    #[test]
    fn json_line_round_trips() {
        let line = format_event(&usable(), OutputFormat::Json).unwrap();
        assert!(!line.contains('\n'));
        let parsed: LifecycleEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, usable());
    }
}
