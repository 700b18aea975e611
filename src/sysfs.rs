//! Sysfs ancestry lookup
//!
//! udev's `SUBSYSTEMS==` key matches the device or any parent. The same set
//! is recovered here by walking a `DEVPATH` upward and reading the
//! `subsystem` link of every directory on the way.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path};

/// Collect subsystem names of a device and all of its sysfs ancestors
///
/// Unreadable directories are skipped; a missing device yields an empty set.
/// A `DEVPATH` with `..` components is never followed and yields an empty set.
pub fn ancestor_subsystems(sys_root: &Path, devpath: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    if Path::new(devpath)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        tracing::debug!(devpath, "rejecting DEVPATH with parent components");
        return found;
    }

    let mut current = sys_root.join(devpath.trim_start_matches('/'));

    while current.starts_with(sys_root) && current != sys_root {
        if let Ok(link) = fs::read_link(current.join("subsystem")) {
            if let Some(name) = link.file_name().and_then(|n| n.to_str()) {
                found.insert(name.to_string());
            }
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    tracing::trace!(devpath, subsystems = ?found, "walked sysfs ancestry");
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn link_subsystem(dir: &Path, name: &str) {
        fs::create_dir_all(dir).unwrap();
        symlink(format!("../../../../class/{}", name), dir.join("subsystem")).unwrap();
    }

    #[test]
    fn test_usb_stick_ancestry() {
        let sys = TempDir::new().unwrap();
        let usb = sys.path().join("devices/pci0000:00/0000:00:14.0/usb1/1-1");
        let scsi = usb.join("1-1:1.0/host6/target6:0:0/6:0:0:0");
        let disk = scsi.join("block/sdb");

        link_subsystem(&sys.path().join("devices/pci0000:00/0000:00:14.0"), "pci");
        link_subsystem(&usb, "usb");
        link_subsystem(&scsi, "scsi");
        link_subsystem(&disk, "block");

        let devpath = disk.strip_prefix(sys.path()).unwrap().to_str().unwrap();
        let found = ancestor_subsystems(sys.path(), &format!("/{}", devpath));

        assert!(found.contains("usb"));
        assert!(found.contains("scsi"));
        assert!(found.contains("block"));
        assert!(found.contains("pci"));
    }

    #[test]
    fn test_ata_disk_has_no_usb() {
        let sys = TempDir::new().unwrap();
        let ata = sys.path().join("devices/pci0000:00/0000:00:1f.2/ata1");
        let disk = ata.join("host0/target0:0:0/0:0:0:0/block/sda");

        link_subsystem(&ata, "ata_port");
        link_subsystem(&disk, "block");

        let found = ancestor_subsystems(
            sys.path(),
            "/devices/pci0000:00/0000:00:1f.2/ata1/host0/target0:0:0/0:0:0:0/block/sda",
        );

        assert!(!found.contains("usb"));
        assert!(found.contains("block"));
    }

    #[test]
    fn test_missing_device_is_empty() {
        let sys = TempDir::new().unwrap();
        let found = ancestor_subsystems(sys.path(), "/devices/virtual/block/loop0");
        assert!(found.is_empty());
    }

    #[test]
    fn test_walk_stays_below_root() {
        let outer = TempDir::new().unwrap();
        link_subsystem(outer.path(), "usb");
        let sys = outer.path().join("sys");
        fs::create_dir_all(sys.join("devices/block/sda")).unwrap();

        let found = ancestor_subsystems(&sys, "/devices/block/sda");
        assert!(found.is_empty());
    }

    #[test]
    fn test_parent_components_are_rejected() {
        let outer = TempDir::new().unwrap();
        let escaped = outer.path().join("outside/dev");
        link_subsystem(&escaped, "usb");
        let sys = outer.path().join("sys");
        fs::create_dir_all(sys.join("devices")).unwrap();

        let found = ancestor_subsystems(&sys, "/devices/../../outside/dev");
        assert!(found.is_empty());

        let found = ancestor_subsystems(&sys, "/../outside/dev");
        assert!(found.is_empty());
    }
}
