//! Action execution
//!
//! Actions run strictly in list order. Symlink creation and service
//! notification are synchronous; a failure is recorded in the report and
//! the remaining actions still run. Detached scripts are spawned in their
//! own session with stdio discarded and are never waited on by the caller.

use nix::unistd::setsid;
use serde::Serialize;
use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;

use crate::config::HotplugConfig;
use crate::planner::Action;
use crate::systemd;

/// Errors from host side effects
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Refusing device name {0:?}")]
    InvalidName(String),

    #[error("Failed to create symlink {}: {source}", link.display())]
    Symlink {
        link: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to run {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Side effects the executor needs from the host
pub trait HostOps {
    /// Point `<dev root>/<target>` at the device node `<dev root>/<device>`
    fn create_symlink(&self, target: &str, device: &str) -> Result<(), ExecError>;

    /// Ask the service manager to start a unit without waiting for it
    fn start_unit(&self, unit: &str) -> Result<(), ExecError>;

    /// Run a script to completion
    fn run_script(&self, script: &str, args: &[String]) -> Result<(), ExecError>;

    /// Start a script and return immediately
    fn spawn_detached(&self, script: &str, args: &[String]) -> Result<(), ExecError>;
}

/// Result of one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    /// Handed off; its result is never observed
    Detached,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub action: Action,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

/// Per-action outcomes, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub outcomes: Vec<ActionOutcome>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ActionOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Failed { .. }))
    }
}

/// Runs planned actions against a host
pub struct Executor<H: HostOps> {
    host: H,
}

impl<H: HostOps> Executor<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Execute actions in order, continuing past failures
    pub fn execute(&self, actions: &[Action]) -> ExecutionReport {
        let outcomes = actions
            .iter()
            .map(|action| {
                let status = match self.perform(action) {
                    Ok(status) => {
                        tracing::info!(%action, "action done");
                        status
                    }
                    Err(e) => {
                        tracing::warn!(%action, "action failed: {}", e);
                        OutcomeStatus::Failed {
                            error: e.to_string(),
                        }
                    }
                };
                ActionOutcome {
                    action: action.clone(),
                    status,
                }
            })
            .collect();

        ExecutionReport { outcomes }
    }

    fn perform(&self, action: &Action) -> Result<OutcomeStatus, ExecError> {
        match action {
            Action::CreateSymlink { target, device } => {
                self.host.create_symlink(target, device)?;
                Ok(OutcomeStatus::Completed)
            }
            Action::NotifyServiceManager {
                unit_template,
                instance_name,
            } => {
                self.host
                    .start_unit(&systemd::instance_unit(unit_template, instance_name))?;
                Ok(OutcomeStatus::Completed)
            }
            Action::RunScript {
                path,
                args,
                detached: true,
            } => {
                self.host.spawn_detached(path, args)?;
                Ok(OutcomeStatus::Detached)
            }
            Action::RunScript {
                path,
                args,
                detached: false,
            } => {
                self.host.run_script(path, args)?;
                Ok(OutcomeStatus::Completed)
            }
        }
    }
}

/// The real system: device directory, systemctl and the script directory
#[derive(Debug, Clone)]
pub struct HostSystem {
    config: HotplugConfig,
}

impl HostSystem {
    pub fn new(config: &HotplugConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl HostOps for HostSystem {
    fn create_symlink(&self, target: &str, device: &str) -> Result<(), ExecError> {
        if device.is_empty() || device.contains('/') || device == "." || device == ".." {
            return Err(ExecError::InvalidName(device.to_string()));
        }
        if target.starts_with('/') || target.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(ExecError::InvalidName(target.to_string()));
        }

        let link = self.config.dev_root.join(target);
        let wrap = |source| ExecError::Symlink {
            link: link.clone(),
            source,
        };

        if let Some(parent) = link.parent() {
            fs::create_dir_all(parent).map_err(wrap)?;
        }

        // Relative like udev's own links: xapi/cd/sr0 -> ../../sr0
        let depth = target.split('/').count() - 1;
        let relative: PathBuf = std::iter::repeat("..")
            .take(depth)
            .map(Path::new)
            .chain(std::iter::once(Path::new(device)))
            .collect();

        // Build beside the final name and rename over it so readers never see a gap
        let staging = link.with_file_name(format!(".{}.{}.tmp", device, std::process::id()));
        let _ = fs::remove_file(&staging);
        symlink(&relative, &staging).map_err(wrap)?;
        fs::rename(&staging, &link).map_err(|source| {
            let _ = fs::remove_file(&staging);
            wrap(source)
        })?;

        tracing::debug!(link = %link.display(), target = %relative.display(), "symlink created");
        Ok(())
    }

    fn start_unit(&self, unit: &str) -> Result<(), ExecError> {
        let output = Command::new(&self.config.systemctl)
            .args(["--no-block", "start", unit])
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ExecError::Spawn {
                program: self.config.systemctl.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExecError::CommandFailed {
                command: format!("{} start {}", self.config.systemctl.display(), unit),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn run_script(&self, script: &str, args: &[String]) -> Result<(), ExecError> {
        let program = self.config.script_path(script);
        let output = Command::new(&program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ExecError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExecError::CommandFailed {
                command: program.display().to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn spawn_detached(&self, script: &str, args: &[String]) -> Result<(), ExecError> {
        let program = self.config.script_path(script);
        let mut command = Command::new(&program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // SAFETY: setsid is async-signal-safe and touches no parent state
        unsafe {
            command.pre_exec(|| setsid().map(|_| ()).map_err(io::Error::from));
        }

        let mut child = command.spawn().map_err(|source| ExecError::Spawn {
            program: program.clone(),
            source,
        })?;
        tracing::debug!(program = %program.display(), pid = child.id(), "detached script started");

        // Reap in the background; the exit status is deliberately dropped
        if let Err(e) = std::thread::Builder::new()
            .name("reap-script".to_string())
            .spawn(move || {
                let _ = child.wait();
            })
        {
            tracing::debug!("could not start reaper thread: {}", e);
        }
        Ok(())
    }
}
