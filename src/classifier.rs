//! Device classification
//!
//! An ordered chain of guard clauses; the first rule that matches decides.
//! Optical (`srN`) names are examined before the generic trailing-digit
//! partition rule, so `sr0` is never mistaken for a partition.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::collaborators::CdromRegistry;
use crate::event::{DeviceAction, DeviceEvent, BLOCK_SUBSYSTEM};

/// What the pipeline should treat a device as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
    Ignore,
    CdromConfirmed,
    UsbBlock,
}

impl fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceCategory::Ignore => write!(f, "ignore"),
            DeviceCategory::CdromConfirmed => write!(f, "cdrom"),
            DeviceCategory::UsbBlock => write!(f, "block"),
        }
    }
}

/// Rule that produced a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// Subsystem is not "block"
    NotBlock,
    /// Event carried no kernel name
    MissingKernelName,
    /// Malformed uevent (unknown action, missing variables)
    Malformed,
    /// Optical node removed; registry can no longer be consulted
    OpticalRemoval,
    /// Listed in the CD-ROM registry
    CdromRegistered,
    /// Optical node not in the registry but attached over USB
    OpticalOnUsb,
    /// Optical node neither registered nor on USB
    OpticalUnregistered,
    /// Trailing digit: a partition of some disk
    Partition,
    /// Whole non-optical disk
    WholeDisk,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Reason::NotBlock => "not a block device",
            Reason::MissingKernelName => "no kernel name",
            Reason::Malformed => "malformed event",
            Reason::OpticalRemoval => "optical drive removed",
            Reason::CdromRegistered => "registered CD-ROM drive",
            Reason::OpticalOnUsb => "optical drive on USB",
            Reason::OpticalUnregistered => "unregistered optical drive",
            Reason::Partition => "partition",
            Reason::WholeDisk => "whole disk",
        };
        f.write_str(text)
    }
}

/// Category together with the rule that chose it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category: DeviceCategory,
    pub reason: Reason,
}

impl Classification {
    pub fn new(category: DeviceCategory, reason: Reason) -> Self {
        Self { category, reason }
    }

    pub fn ignore(reason: Reason) -> Self {
        Self::new(DeviceCategory::Ignore, reason)
    }

    pub fn is_ignored(&self) -> bool {
        self.category == DeviceCategory::Ignore
    }
}

/// Classify a hotplug event
///
/// A failing registry counts as "not a CD-ROM".
pub fn classify(event: &DeviceEvent, registry: &dyn CdromRegistry) -> Classification {
    if event.subsystem() != BLOCK_SUBSYSTEM {
        return Classification::ignore(Reason::NotBlock);
    }

    if event.kernel_name().is_empty() {
        return Classification::ignore(Reason::MissingKernelName);
    }

    if event.is_optical_named() {
        if event.action() == DeviceAction::Remove {
            return Classification::new(DeviceCategory::UsbBlock, Reason::OpticalRemoval);
        }

        if registered_cdrom(event, registry) {
            return Classification::new(DeviceCategory::CdromConfirmed, Reason::CdromRegistered);
        }

        if event.has_ancestor("usb") {
            return Classification::new(DeviceCategory::UsbBlock, Reason::OpticalOnUsb);
        }

        return Classification::ignore(Reason::OpticalUnregistered);
    }

    if event.ends_in_digit() {
        return Classification::ignore(Reason::Partition);
    }

    Classification::new(DeviceCategory::UsbBlock, Reason::WholeDisk)
}

fn registered_cdrom(event: &DeviceEvent, registry: &dyn CdromRegistry) -> bool {
    match registry.is_cdrom(event.kernel_name()) {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(
                kernel_name = event.kernel_name(),
                "CD-ROM registry lookup failed, treating as not registered: {}",
                e
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{KnownDrives, Unavailable};

    fn no_drives() -> KnownDrives {
        KnownDrives::default()
    }

    #[test]
    fn test_non_block_ignored() {
        let event = DeviceEvent::new("sdb", "scsi_disk", DeviceAction::Add);
        let c = classify(&event, &no_drives());
        assert_eq!(c, Classification::ignore(Reason::NotBlock));
    }

    #[test]
    fn test_empty_name_ignored() {
        let event = DeviceEvent::block("", DeviceAction::Add);
        let c = classify(&event, &no_drives());
        assert_eq!(c.reason, Reason::MissingKernelName);
        assert!(c.is_ignored());
    }

    #[test]
    fn test_whole_disk_is_usb_block() {
        let event = DeviceEvent::block("sdb", DeviceAction::Add);
        let c = classify(&event, &no_drives());
        assert_eq!(c.category, DeviceCategory::UsbBlock);
        assert_eq!(c.reason, Reason::WholeDisk);
    }

    #[test]
    fn test_partition_ignored() {
        for name in ["sdb1", "sda15", "loop0", "nvme0n1", "dm-3"] {
            let event = DeviceEvent::block(name, DeviceAction::Add).with_subsystems(["usb"]);
            assert_eq!(
                classify(&event, &no_drives()),
                Classification::ignore(Reason::Partition),
                "{} should be a partition",
                name
            );
        }
    }

    #[test]
    fn test_registered_cdrom() {
        let drives = KnownDrives::new(["sr0"]);
        for action in [DeviceAction::Add, DeviceAction::Change] {
            let c = classify(&DeviceEvent::block("sr0", action), &drives);
            assert_eq!(c.category, DeviceCategory::CdromConfirmed);
            assert_eq!(c.reason, Reason::CdromRegistered);
        }
    }

    #[test]
    fn test_unregistered_optical_on_usb() {
        let event = DeviceEvent::block("sr1", DeviceAction::Add).with_subsystems(["usb", "scsi"]);
        let c = classify(&event, &no_drives());
        assert_eq!(c, Classification::new(DeviceCategory::UsbBlock, Reason::OpticalOnUsb));
    }

    #[test]
    fn test_unregistered_optical_ignored() {
        let event = DeviceEvent::block("sr1", DeviceAction::Add).with_subsystems(["scsi"]);
        let c = classify(&event, &no_drives());
        assert_eq!(c, Classification::ignore(Reason::OpticalUnregistered));
    }

    #[test]
    fn test_optical_removal_skips_registry() {
        let event = DeviceEvent::block("sr0", DeviceAction::Remove);
        let c = classify(&event, &Unavailable);
        assert_eq!(c, Classification::new(DeviceCategory::UsbBlock, Reason::OpticalRemoval));
    }

    #[test]
    fn test_registry_failure_fails_closed() {
        let event = DeviceEvent::block("sr0", DeviceAction::Add);
        assert_eq!(
            classify(&event, &Unavailable),
            Classification::ignore(Reason::OpticalUnregistered)
        );

        let on_usb = event.with_subsystems(["usb"]);
        assert_eq!(classify(&on_usb, &Unavailable).reason, Reason::OpticalOnUsb);
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(Reason::Partition.to_string(), "partition");
        assert_eq!(Reason::CdromRegistered.to_string(), "registered CD-ROM drive");
    }
}
