//! Block device hotplug events
//!
//! A `DeviceEvent` is built once per kernel uevent, either from explicit
//! values (CLI, tests) or from the udev environment handed to RUN programs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::sysfs;

/// Subsystem this pipeline applies to
pub const BLOCK_SUBSYSTEM: &str = "block";

/// Errors building an event from raw uevent data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("Missing uevent variable: {0}")]
    MissingVariable(&'static str),

    #[error("Unknown uevent action: {0}")]
    UnknownAction(String),
}

/// Hotplug action reported by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DeviceAction {
    Add,
    Change,
    Remove,
}

impl fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceAction::Add => write!(f, "add"),
            DeviceAction::Change => write!(f, "change"),
            DeviceAction::Remove => write!(f, "remove"),
        }
    }
}

impl FromStr for DeviceAction {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(DeviceAction::Add),
            "change" => Ok(DeviceAction::Change),
            "remove" => Ok(DeviceAction::Remove),
            other => Err(EventError::UnknownAction(other.to_string())),
        }
    }
}

/// One hotplug notification for a device
///
/// Fields are read-only once built; ancestors can only be added through the
/// consuming `with_subsystems` builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    /// Kernel device name (e.g., "sdb", "sr0")
    kernel_name: String,
    /// Kernel subsystem of the device itself
    subsystem: String,
    action: DeviceAction,
    /// Subsystems of the device and all of its sysfs ancestors
    subsystems: BTreeSet<String>,
}

impl DeviceEvent {
    /// Create an event with no ancestor information
    pub fn new(kernel_name: impl Into<String>, subsystem: impl Into<String>, action: DeviceAction) -> Self {
        Self {
            kernel_name: kernel_name.into(),
            subsystem: subsystem.into(),
            action,
            subsystems: BTreeSet::new(),
        }
    }

    /// Create a block subsystem event
    pub fn block(kernel_name: impl Into<String>, action: DeviceAction) -> Self {
        Self::new(kernel_name, BLOCK_SUBSYSTEM, action)
    }

    /// Add ancestor subsystem names
    pub fn with_subsystems<I, S>(mut self, subsystems: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subsystems.extend(subsystems.into_iter().map(Into::into));
        self
    }

    /// Build an event from a udev RUN environment
    ///
    /// Reads `ACTION`, `SUBSYSTEM` and `KERNEL` (falling back to the basename
    /// of `DEVNAME`). Ancestor subsystems come from walking `DEVPATH` below
    /// `sys_root`, plus `ID_BUS`.
    pub fn from_env(vars: &HashMap<String, String>, sys_root: &Path) -> Result<Self, EventError> {
        let action = vars
            .get("ACTION")
            .ok_or(EventError::MissingVariable("ACTION"))?
            .parse::<DeviceAction>()?;

        let subsystem = vars
            .get("SUBSYSTEM")
            .ok_or(EventError::MissingVariable("SUBSYSTEM"))?;

        let kernel_name = vars
            .get("KERNEL")
            .cloned()
            .or_else(|| {
                vars.get("DEVNAME")
                    .and_then(|devname| devname.rsplit('/').next())
                    .map(str::to_string)
            })
            .unwrap_or_default();

        let mut subsystems = BTreeSet::new();
        if let Some(devpath) = vars.get("DEVPATH") {
            subsystems.extend(sysfs::ancestor_subsystems(sys_root, devpath));
        }
        if let Some(bus) = vars.get("ID_BUS").filter(|bus| !bus.is_empty()) {
            subsystems.insert(bus.clone());
        }

        Ok(Self {
            kernel_name,
            subsystem: subsystem.clone(),
            action,
            subsystems,
        })
    }

    pub fn kernel_name(&self) -> &str {
        &self.kernel_name
    }

    pub fn subsystem(&self) -> &str {
        &self.subsystem
    }

    pub fn action(&self) -> DeviceAction {
        self.action
    }

    /// Subsystems of the device and its ancestors
    pub fn subsystems(&self) -> &BTreeSet<String> {
        &self.subsystems
    }

    /// True if the kernel name ends in a digit
    pub fn ends_in_digit(&self) -> bool {
        self.kernel_name
            .chars()
            .last()
            .is_some_and(|c| c.is_ascii_digit())
    }

    /// True if the name is an optical drive node: `sr` followed only by digits
    pub fn is_optical_named(&self) -> bool {
        self.kernel_name
            .strip_prefix("sr")
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    }

    /// True if the device or any ancestor sits on the given subsystem
    pub fn has_ancestor(&self, subsystem: &str) -> bool {
        self.subsystems.contains(subsystem)
    }
}

impl fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.action, self.subsystem, self.kernel_name)
    }
}
