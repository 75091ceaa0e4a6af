use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::utils::{failure_message, run_with_timeout};

/// Path of the namespace alias for a pid
pub fn alias_path(netns_dir: &Path, pid: u32) -> PathBuf {
    netns_dir.join(pid.to_string())
}

/// Makes a process's network namespace addressable by `ip netns` under its pid
///
/// Links `/proc/{pid}/ns/net` into the netns directory. An existing alias is reused.
pub async fn create_alias(netns_dir: &Path, pid: u32) -> Result<PathBuf> {
    let alias = alias_path(netns_dir, pid);
    debug!(namespace = %alias.display(), pid = pid, "creating namespace alias");

    tokio::fs::create_dir_all(netns_dir)
        .await
        .with_context(|| format!("creating {}", netns_dir.display()))?;

    let target = PathBuf::from(format!("/proc/{}/ns/net", pid));
    match tokio::fs::symlink(&target, &alias).await {
        Ok(()) => Ok(alias),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            warn!(namespace = %alias.display(), "namespace alias already exists, reusing");
            Ok(alias)
        }
        Err(e) => Err(e).with_context(|| format!("linking {}", alias.display())),
    }
}

/// Removes a namespace alias; a missing alias is not an error
pub async fn delete_alias(netns_dir: &Path, pid: u32) -> Result<()> {
    let alias = alias_path(netns_dir, pid);
    debug!(namespace = %alias.display(), "deleting namespace alias");

    match tokio::fs::remove_file(&alias).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(namespace = %alias.display(), "namespace alias doesn't exist or already deleted");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("removing {}", alias.display())),
    }
}

/// Deletes a link, either on the host or inside a named namespace
///
/// "Cannot find device" is treated as already deleted.
pub async fn delete_link(
    ip_binary: &Path,
    namespace: Option<&str>,
    device: &str,
    timeout: Duration,
) -> Result<()> {
    debug!(device = %device, namespace = ?namespace, "deleting link");

    let mut args: Vec<&str> = Vec::new();
    if let Some(ns) = namespace {
        args.extend_from_slice(&["netns", "exec", ns, ip_binary_name(ip_binary)]);
    }
    args.extend_from_slice(&["link", "del", device]);

    let output = run_with_timeout(ip_binary, &args, timeout)
        .await
        .context("executing ip link del")?;

    if !output.status.success() {
        let message = failure_message(&output);
        if message.contains("Cannot find device") || message.contains("does not exist") {
            warn!(device = %device, namespace = ?namespace, "link already deleted");
            return Ok(());
        }
        bail!("failed to delete link {}: {}", device, message);
    }

    Ok(())
}

/// Program name to run inside `ip netns exec`
fn ip_binary_name(ip_binary: &Path) -> &str {
    ip_binary.to_str().unwrap_or("ip")
}
