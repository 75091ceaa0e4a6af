//! Shared setup for lifecycle commands
//!
//! Every command that touches a node's runtime state goes through [`open_node`], which
//! serializes operations on that node with an exclusive lock.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::ExecutorConfig;
use crate::orchestrator::Orchestrator;
use crate::state::{FileStore, NodeLock};

/// Load the configuration file and apply command line overrides
pub fn load_config(config: Option<&Path>, store_dir: Option<&Path>) -> Result<ExecutorConfig> {
    let mut config = ExecutorConfig::load(config)?;
    if let Some(dir) = store_dir {
        config.store.root = dir.to_path_buf();
    }
    Ok(config)
}

/// Lock a node and build an orchestrator for it
///
/// The lock is held until the returned guard is dropped.
pub fn open_node(config: &ExecutorConfig, node: &str) -> Result<(Orchestrator, NodeLock)> {
    let store = FileStore::new(config.store.root.clone());
    let node_dir = store
        .node_dir(node)
        .with_context(|| format!("resolving store directory for {}", node))?;
    let lock = NodeLock::acquire(&node_dir)?;
    let orchestrator = Orchestrator::from_config(config).context("building clients")?;
    Ok((orchestrator, lock))
}

/// Take a node's lock again, waiting for any operation that holds it
pub async fn relock_node(config: &ExecutorConfig, node: &str) -> Result<NodeLock> {
    let node_dir = FileStore::new(config.store.root.clone())
        .node_dir(node)
        .with_context(|| format!("resolving store directory for {}", node))?;
    NodeLock::acquire_wait(&node_dir).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_dir_override() {
        let dir = TempDir::new().unwrap();
        let config = load_config(None, Some(dir.path())).unwrap();
        assert_eq!(config.store.root, dir.path());
        assert_eq!(config.runtime.cpu_period, 50_000);
    }

    #[test]
    fn test_second_open_fails_fast() {
        let dir = TempDir::new().unwrap();
        let config = load_config(None, Some(dir.path())).unwrap();

        let (_orchestrator, _lock) = open_node(&config, "cluster9/slave1").unwrap();
        let err = open_node(&config, "cluster9/slave1").err().unwrap();
        assert!(err.to_string().contains("in progress"));

        // Other nodes are independent
        assert!(open_node(&config, "cluster9/slave2").is_ok());
    }

    #[test]
    fn test_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let config = load_config(None, Some(dir.path())).unwrap();
        assert!(open_node(&config, "../etc").is_err());
    }
}
