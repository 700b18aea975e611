//! Action planning
//!
//! Turns a classified event into the ordered side effects to perform.
//! Within one plan a symlink always precedes the service notification that
//! refers to it, and the topology script always comes last.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::classifier::DeviceCategory;
use crate::collaborators::SharingCheck;
use crate::event::{DeviceAction, DeviceEvent};
use crate::systemd;

/// Symlink namespace for confirmed optical drives
pub const CD_NAMESPACE: &str = "xapi/cd";

/// Symlink namespace for every other published block device
pub const BLOCK_NAMESPACE: &str = "xapi/block";

/// Unit template started for each confirmed optical drive
pub const CDROM_UNIT_TEMPLATE: &str = "cdrommon@";

/// Script recording topology changes
pub const TOPOLOGY_SCRIPT: &str = "local-device-change";

/// Canonical device root used in unit instance names
const CANONICAL_DEV_ROOT: &str = "/dev";

/// One planned side effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Link `<dev root>/<target>` to the device node `<dev root>/<device>`
    CreateSymlink { target: String, device: String },
    /// Start `<unit_template><instance_name>.service`
    NotifyServiceManager {
        unit_template: String,
        instance_name: String,
    },
    /// Run a script; detached runs are never waited on
    RunScript {
        path: String,
        args: Vec<String>,
        detached: bool,
    },
}

impl Action {
    pub fn symlink(namespace: &str, kernel_name: &str) -> Self {
        Action::CreateSymlink {
            target: format!("{}/{}", namespace, kernel_name),
            device: kernel_name.to_string(),
        }
    }

    pub fn topology_change(kernel_name: &str) -> Self {
        Action::RunScript {
            path: TOPOLOGY_SCRIPT.to_string(),
            args: vec![kernel_name.to_string()],
            detached: true,
        }
    }

    pub fn cdrom_monitor(kernel_name: &str) -> Self {
        let link = format!("{}/{}/{}", CANONICAL_DEV_ROOT, CD_NAMESPACE, kernel_name);
        Action::NotifyServiceManager {
            unit_template: CDROM_UNIT_TEMPLATE.to_string(),
            instance_name: systemd::escape_path(&link),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::CreateSymlink { target, device } => write!(f, "symlink {} -> {}", target, device),
            Action::NotifyServiceManager {
                unit_template,
                instance_name,
            } => write!(f, "start {}", systemd::instance_unit(unit_template, instance_name)),
            Action::RunScript {
                path,
                args,
                detached,
            } => {
                write!(f, "run {}", path)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                if *detached {
                    write!(f, " &")?;
                }
                Ok(())
            }
        }
    }
}

/// Plan the actions for a classified event
///
/// The sharing check is only consulted for whole devices being added; a
/// failing check suppresses the device just like a negative answer.
pub fn plan(event: &DeviceEvent, category: DeviceCategory, sharing: &dyn SharingCheck) -> Vec<Action> {
    let name = event.kernel_name();

    match (category, event.action()) {
        (DeviceCategory::Ignore, _) => Vec::new(),

        (DeviceCategory::CdromConfirmed, DeviceAction::Add) => vec![
            Action::symlink(CD_NAMESPACE, name),
            Action::cdrom_monitor(name),
            Action::topology_change(name),
        ],
        (DeviceCategory::CdromConfirmed, DeviceAction::Change) => vec![
            Action::symlink(CD_NAMESPACE, name),
            Action::cdrom_monitor(name),
        ],
        (DeviceCategory::CdromConfirmed, DeviceAction::Remove) => vec![Action::topology_change(name)],

        (DeviceCategory::UsbBlock, DeviceAction::Add) => {
            if !shareable(name, sharing) {
                tracing::debug!(kernel_name = name, "device not shareable, skipping");
                return Vec::new();
            }
            vec![Action::symlink(BLOCK_NAMESPACE, name), Action::topology_change(name)]
        }
        (DeviceCategory::UsbBlock, DeviceAction::Change) => vec![Action::symlink(BLOCK_NAMESPACE, name)],
        (DeviceCategory::UsbBlock, DeviceAction::Remove) => vec![Action::topology_change(name)],
    }
}

fn shareable(kernel_name: &str, sharing: &dyn SharingCheck) -> bool {
    match sharing.is_shareable(kernel_name) {
        Ok(answer) => answer,
        Err(e) => {
            tracing::warn!(kernel_name, "sharing check failed, treating as local: {}", e);
            false
        }
    }
}
