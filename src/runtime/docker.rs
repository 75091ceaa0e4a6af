use anyhow::Context;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::options::run_command_line;
use super::{ContainerRuntime, RunMode};
use crate::config::RuntimeConfig;
use crate::descriptor::NodeDescriptor;
use crate::error::{ExecutorError, Result};
use crate::utils::{failure_message, run_with_timeout};

/// Docker CLI adapter
pub struct DockerRuntime {
    config: RuntimeConfig,
}

impl DockerRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    fn binary(&self) -> &Path {
        &self.config.binary
    }
}

/// Runtime reports for a container it does not know
fn is_missing_container(message: &str) -> bool {
    message.contains("No such container") || message.contains("No such object")
}

/// Volume origins must exist before the runtime bind-mounts them
async fn prepare_volume_origins(descriptor: &NodeDescriptor) -> anyhow::Result<()> {
    for volume in &descriptor.volumes {
        let origin = Path::new(&volume.origin);
        if !origin.exists() {
            debug!(origin = %volume.origin, "creating volume origin");
            tokio::fs::create_dir_all(origin)
                .await
                .with_context(|| format!("creating volume origin {}", volume.origin))?;
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn pull(&self, image: &str) -> Result<()> {
        info!(target: "runtime", image = %image, "pulling image");

        let pull_err = |reason: String| ExecutorError::ImagePull {
            image: image.to_string(),
            reason,
        };

        let output = run_with_timeout(self.binary(), ["pull", image], self.config.pull_timeout())
            .await
            .map_err(|e| pull_err(format!("{:#}", e)))?;

        if !output.status.success() {
            return Err(pull_err(failure_message(&output)));
        }
        Ok(())
    }

    async fn run(&self, descriptor: &NodeDescriptor, mode: RunMode) -> Result<()> {
        let name = descriptor.container_name();
        let start_err = |reason: String| ExecutorError::RuntimeStart {
            container: name.clone(),
            reason,
        };

        prepare_volume_origins(descriptor)
            .await
            .map_err(|e| start_err(format!("{:#}", e)))?;

        let line = run_command_line(descriptor, mode.is_daemon(), self.config.cpu_period);
        let args = shell_words::split(&line)
            .map_err(|e| start_err(format!("parsing run options {:?}: {}", line, e)))?;

        info!(target: "runtime", container = %name, daemon = mode.is_daemon(), "starting container");
        debug!(target: "runtime", container = %name, args = ?args, "run arguments");

        match mode {
            RunMode::Daemon => {
                let output = run_with_timeout(self.binary(), &args, self.config.command_timeout())
                    .await
                    .map_err(|e| start_err(format!("{:#}", e)))?;
                if !output.status.success() {
                    return Err(start_err(failure_message(&output)));
                }
            }
            RunMode::Foreground => {
                // Attached for the container's lifetime, so no deadline
                let status = Command::new(self.binary())
                    .args(&args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .kill_on_drop(true)
                    .status()
                    .await
                    .map_err(|e| start_err(e.to_string()))?;
                if !status.success() {
                    return Err(start_err(format!("container exited with {}", status)));
                }
                info!(target: "runtime", container = %name, "container exited");
            }
        }
        Ok(())
    }

    async fn namespace_pid(&self, name: &str) -> Result<Option<u32>> {
        let output = run_with_timeout(
            self.binary(),
            ["inspect", "--format", "{{.State.Pid}}", name],
            self.config.command_timeout(),
        )
        .await
        .map_err(|e| ExecutorError::RuntimeStart {
            container: name.to_string(),
            reason: format!("{:#}", e),
        })?;

        if !output.status.success() {
            let message = failure_message(&output);
            if is_missing_container(&message) {
                return Ok(None);
            }
            return Err(ExecutorError::RuntimeStart {
                container: name.to_string(),
                reason: message,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match stdout.trim().parse::<u32>() {
            Ok(0) => Ok(None),
            Ok(pid) => Ok(Some(pid)),
            Err(_) => Err(ExecutorError::RuntimeStart {
                container: name.to_string(),
                reason: format!("unexpected inspect output {:?}", stdout.trim()),
            }),
        }
    }

    async fn stop(&self, name: &str) -> Result<()> {
        info!(target: "runtime", container = %name, "stopping container");
        let stop_err = |reason: String| ExecutorError::RuntimeStop {
            container: name.to_string(),
            reason,
        };

        let output = run_with_timeout(self.binary(), ["stop", name], self.config.command_timeout())
            .await
            .map_err(|e| stop_err(format!("{:#}", e)))?;

        if !output.status.success() {
            let message = failure_message(&output);
            if is_missing_container(&message) {
                warn!(target: "runtime", container = %name, "container doesn't exist, nothing to stop");
                return Ok(());
            }
            return Err(stop_err(message));
        }
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        info!(target: "runtime", container = %name, "removing container");
        let rm_err = |reason: String| ExecutorError::RuntimeRemove {
            container: name.to_string(),
            reason,
        };

        let output = run_with_timeout(self.binary(), ["rm", name], self.config.command_timeout())
            .await
            .map_err(|e| rm_err(format!("{:#}", e)))?;

        if !output.status.success() {
            let message = failure_message(&output);
            if is_missing_container(&message) {
                warn!(target: "runtime", container = %name, "container already removed");
                return Ok(());
            }
            return Err(rm_err(message));
        }
        Ok(())
    }
}
