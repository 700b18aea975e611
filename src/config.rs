//! Runtime configuration
//!
//! Loaded from a TOML file. Every key is optional:
//!
//! ```toml
//! dev_root = "/dev"
//! sys_root = "/sys"
//! cdrom_info = "/proc/sys/dev/cdrom/info"
//! script_dir = "/opt/xensource/libexec"
//! systemctl = "systemctl"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file consulted when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "/etc/xapi-block-hotplug.toml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HotplugConfig {
    /// Directory holding device nodes and the xapi symlink namespaces
    pub dev_root: PathBuf,
    /// Sysfs mount point used to resolve device ancestry
    pub sys_root: PathBuf,
    /// Kernel CD-ROM information table
    pub cdrom_info: PathBuf,
    /// Directory containing `local-device-change` and `check-device-sharing`
    pub script_dir: PathBuf,
    /// Service manager control binary
    pub systemctl: PathBuf,
}

impl Default for HotplugConfig {
    fn default() -> Self {
        Self {
            dev_root: PathBuf::from("/dev"),
            sys_root: PathBuf::from("/sys"),
            cdrom_info: PathBuf::from("/proc/sys/dev/cdrom/info"),
            script_dir: PathBuf::from("/opt/xensource/libexec"),
            systemctl: PathBuf::from("systemctl"),
        }
    }
}

impl HotplugConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::from_toml_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML")
    }

    /// Load an explicit file, else the default file if present, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Resolve a script name against `script_dir`; absolute paths pass through
    pub fn script_path(&self, script: &str) -> PathBuf {
        self.script_dir.join(script)
    }
}
