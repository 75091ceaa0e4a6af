//! Wait for a freshly started container to own a network namespace.
//!
//! Wiring needs the container's namespace to exist. Rather than sleeping a fixed
//! interval, poll the runtime for the container's init pid until it appears (and
//! its `/proc` entry is visible) or the deadline passes.

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info};

use crate::config::ReadinessConfig;
use crate::error::{ExecutorError, Result};
use crate::runtime::ContainerRuntime;
use crate::utils::is_process_alive;

/// Poll until the container has a live namespace pid
pub async fn wait_for_namespace(
    runtime: &dyn ContainerRuntime,
    container: &str,
    config: &ReadinessConfig,
) -> Result<u32> {
    info!(target: "readiness", container = %container, timeout_secs = config.timeout_secs, "waiting for container namespace");

    let start = Instant::now();
    let interval = config.poll_interval();

    let poll = async {
        loop {
            match runtime.namespace_pid(container).await {
                Ok(Some(pid)) if is_process_alive(pid) => return Ok(pid),
                Ok(Some(pid)) => {
                    debug!(target: "readiness", container = %container, pid = pid, "pid reported but not visible yet");
                }
                Ok(None) => {
                    debug!(target: "readiness", container = %container, "container not running yet");
                }
                Err(e) => return Err(e),
            }
            sleep(interval).await;
        }
    };

    let pid = timeout(config.timeout(), poll)
        .await
        .map_err(|_| ExecutorError::RuntimeStart {
            container: container.to_string(),
            reason: format!(
                "namespace not ready after {}s",
                config.timeout().as_secs()
            ),
        })??;

    info!(
        target: "readiness",
        container = %container,
        pid = pid,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "container namespace ready"
    );
    Ok(pid)
}
