use anyhow::{bail, Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

const LOCK_FILE: &str = ".lock";

/// Exclusive per-node operation lock
///
/// Two lifecycle operations on the same node must not interleave: runtime state is
/// read at the start and written at the end of each one. The advisory lock is
/// released when the guard is dropped (or the process exits).
pub struct NodeLock {
    file: File,
}

impl NodeLock {
    /// Take the lock in `node_dir`, failing fast if another operation holds it
    pub fn acquire(node_dir: &Path) -> Result<Self> {
        let file = open_lock_file(node_dir)?;
        if file.try_lock_exclusive().is_err() {
            bail!(
                "another operation is in progress for {}",
                node_dir.display()
            );
        }

        Ok(Self { file })
    }

    /// Take the lock in `node_dir`, waiting for whichever operation holds it
    pub async fn acquire_wait(node_dir: &Path) -> Result<Self> {
        let file = open_lock_file(node_dir)?;
        let file = tokio::task::spawn_blocking(move || file.lock_exclusive().map(|_| file))
            .await
            .context("lock task failed")?
            .with_context(|| format!("locking {}", node_dir.display()))?;
        Ok(Self { file })
    }
}

fn open_lock_file(node_dir: &Path) -> Result<File> {
    std::fs::create_dir_all(node_dir)
        .with_context(|| format!("creating {}", node_dir.display()))?;
    let path = node_dir.join(LOCK_FILE);
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .with_context(|| format!("opening lock file {}", path.display()))
}

impl Drop for NodeLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
