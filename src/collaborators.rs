//! External collaborators consulted during classification and planning
//!
//! - `CdromRegistry`: is this kernel name a recognized optical drive?
//! - `SharingCheck`: may this device be handed out as removable media?
//!
//! Both return `Result` so callers can log the failure, but the pipeline
//! treats an error exactly like a negative answer.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

/// Script consulted before publishing a whole block device on add
pub const SHARING_CHECK_SCRIPT: &str = "check-device-sharing";

/// Errors from the registry or the sharing check
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("Failed to read CD-ROM registry {}: {source}", path.display())]
    Registry {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to run {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0} unavailable")]
    Unavailable(&'static str),
}

/// Lookup of recognized optical drives
pub trait CdromRegistry {
    fn is_cdrom(&self, kernel_name: &str) -> Result<bool, CollaboratorError>;
}

/// Decides whether a device is safe to expose (not root, not mounted)
pub trait SharingCheck {
    fn is_shareable(&self, kernel_name: &str) -> Result<bool, CollaboratorError>;
}

/// Registry backed by the kernel's `/proc/sys/dev/cdrom/info` table
#[derive(Debug, Clone)]
pub struct ProcCdromRegistry {
    path: PathBuf,
}

impl ProcCdromRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CdromRegistry for ProcCdromRegistry {
    fn is_cdrom(&self, kernel_name: &str) -> Result<bool, CollaboratorError> {
        let content = fs::read_to_string(&self.path).map_err(|source| CollaboratorError::Registry {
            path: self.path.clone(),
            source,
        })?;

        let found = drive_names(&content).any(|drive| drive == kernel_name);
        Ok(found)
    }
}

/// Drive names listed on the `drive name:` row of a cdrom info table
pub fn drive_names(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .filter_map(|line| line.strip_prefix("drive name:"))
        .flat_map(str::split_whitespace)
}

/// Sharing check that runs the `check-device-sharing` script
///
/// Exit status 0 means the device may be shared.
#[derive(Debug, Clone)]
pub struct ScriptSharingCheck {
    program: PathBuf,
}

impl ScriptSharingCheck {
    /// Use `check-device-sharing` from the given script directory
    pub fn in_dir(script_dir: &Path) -> Self {
        Self::new(script_dir.join(SHARING_CHECK_SCRIPT))
    }

    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl SharingCheck for ScriptSharingCheck {
    fn is_shareable(&self, kernel_name: &str) -> Result<bool, CollaboratorError> {
        let status = Command::new(&self.program)
            .arg(kernel_name)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| CollaboratorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        tracing::debug!(kernel_name, ?status, "sharing check finished");
        Ok(status.success())
    }
}

/// Registry answering from a fixed set of drive names
#[derive(Debug, Clone, Default)]
pub struct KnownDrives(pub BTreeSet<String>);

impl KnownDrives {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }
}

impl CdromRegistry for KnownDrives {
    fn is_cdrom(&self, kernel_name: &str) -> Result<bool, CollaboratorError> {
        Ok(self.0.contains(kernel_name))
    }
}

/// Sharing check with a fixed answer
#[derive(Debug, Clone, Copy)]
pub struct FixedSharing(pub bool);

impl SharingCheck for FixedSharing {
    fn is_shareable(&self, _kernel_name: &str) -> Result<bool, CollaboratorError> {
        Ok(self.0)
    }
}

/// Collaborator that always fails, in either role
#[derive(Debug, Clone, Copy)]
pub struct Unavailable;

impl CdromRegistry for Unavailable {
    fn is_cdrom(&self, _kernel_name: &str) -> Result<bool, CollaboratorError> {
        Err(CollaboratorError::Unavailable("CD-ROM registry"))
    }
}

impl SharingCheck for Unavailable {
    fn is_shareable(&self, _kernel_name: &str) -> Result<bool, CollaboratorError> {
        Err(CollaboratorError::Unavailable("sharing check"))
    }
}
