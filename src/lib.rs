//! xapi-block-hotplug - block device hotplug classification for xapi
//!
//! Decides, for every block device uevent, whether the device is a CD-ROM
//! drive, a removable block device, or something to leave alone, and then
//! performs the matching side effects: a stable symlink under `xapi/cd` or
//! `xapi/block`, a `cdrommon@` service start, and a detached call to
//! `local-device-change`.
//!
//! The decision half (`classifier`, `planner`, `pipeline`) is pure and
//! stateless; all host interaction lives behind the traits in
//! `collaborators` and `executor`.

pub mod classifier;
pub mod cli;
pub mod collaborators;
pub mod config;
pub mod event;
pub mod executor;
pub mod pipeline;
pub mod planner;
pub mod report;
pub mod sysfs;
pub mod systemd;

pub use classifier::{classify, Classification, DeviceCategory, Reason};
pub use event::{DeviceAction, DeviceEvent};
pub use executor::{ExecutionReport, Executor, HostOps, HostSystem};
pub use pipeline::{decide, decide_env, Decision};
pub use planner::{plan, Action};
