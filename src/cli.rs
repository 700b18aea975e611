//! CLI argument parsing for xapi-block-hotplug

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::event::{DeviceAction, DeviceEvent};

/// Output format for decisions and execution reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "xapi-block-hotplug")]
#[command(version)]
#[command(
    about = "Classify a block device hotplug event and publish it for xapi",
    long_about = "Classify a block device hotplug event and publish it for xapi.\n\n\
        Without --kernel the event is read from the udev environment \
        (ACTION, SUBSYSTEM, KERNEL/DEVNAME, DEVPATH)."
)]
pub struct Cli {
    /// Kernel device name (e.g., sdb, sr0); omit to read the udev environment
    #[arg(short = 'k', long = "kernel", value_name = "NAME")]
    pub kernel: Option<String>,

    /// Kernel subsystem of the device (only with --kernel)
    #[arg(
        long = "subsystem",
        value_name = "SUBSYSTEM",
        default_value = "block",
        requires = "kernel"
    )]
    pub subsystem: String,

    /// Hotplug action (required with --kernel)
    #[arg(short = 'a', long = "action", value_enum, requires = "kernel")]
    pub action: Option<DeviceAction>,

    /// Subsystem of the device or an ancestor (repeatable, e.g. --ancestor usb)
    #[arg(long = "ancestor", value_name = "SUBSYSTEM", requires = "kernel")]
    pub ancestors: Vec<String>,

    /// Classify and plan only; do not touch the system
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file (default: /etc/xapi-block-hotplug.toml if present)
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug tracing to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Event given explicitly on the command line, if any
    pub fn explicit_event(&self) -> Option<anyhow::Result<DeviceEvent>> {
        let kernel = self.kernel.as_ref()?;
        Some(match self.action {
            Some(action) => Ok(DeviceEvent::new(kernel.clone(), self.subsystem.clone(), action)
                .with_subsystems(self.ancestors.iter().cloned())),
            None => Err(anyhow::anyhow!("--kernel requires --action add|change|remove")),
        })
    }
}
