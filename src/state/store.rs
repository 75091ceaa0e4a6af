use anyhow::Context;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::types::ContainerRuntimeState;
use super::utils::node_id_to_path;
use crate::descriptor::NodeDescriptor;
use crate::error::{ExecutorError, Result};

const DESCRIPTOR_FILE: &str = "descriptor.yaml";
const STATE_FILE: &str = "state.json";

/// Source of node descriptors and sink for runtime state
///
/// The orchestrator is the only writer of runtime state.
#[async_trait::async_trait]
pub trait DescriptorStore: Send + Sync {
    async fn get(&self, node_id: &str) -> Result<NodeDescriptor>;

    async fn get_runtime_state(&self, node_id: &str) -> Result<ContainerRuntimeState>;

    async fn set_runtime_state(&self, node_id: &str, state: &ContainerRuntimeState)
        -> Result<()>;
}

/// Directory backed store
///
/// Layout: `{root}/{node_id}/descriptor.yaml` and `{root}/{node_id}/state.json`.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Directory holding everything for one node
    pub fn node_dir(&self, node_id: &str) -> Result<PathBuf> {
        let rel = node_id_to_path(node_id).map_err(|e| ExecutorError::InvalidDescriptor {
            node: node_id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.root.join(rel))
    }

    /// Store a descriptor document and reset the node to pending
    pub async fn put_descriptor(&self, node_id: &str, yaml: &str) -> Result<()> {
        // Reject documents that would not load back
        NodeDescriptor::from_yaml(node_id, yaml)?;

        let dir = self.node_dir(node_id)?;
        fs::create_dir_all(&dir)
            .await
            .context("creating node directory")
            .map_err(store_err)?;
        write_private(&dir.join(DESCRIPTOR_FILE), yaml.as_bytes())
            .await
            .map_err(store_err)?;
        self.set_runtime_state(node_id, &ContainerRuntimeState::pending())
            .await
    }
}

#[async_trait::async_trait]
impl DescriptorStore for FileStore {
    async fn get(&self, node_id: &str) -> Result<NodeDescriptor> {
        let path = self.node_dir(node_id)?.join(DESCRIPTOR_FILE);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExecutorError::DescriptorNotFound(node_id.to_string()));
            }
            Err(e) => {
                return Err(ExecutorError::Store(format!(
                    "reading {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        NodeDescriptor::from_yaml(node_id, &content)
    }

    async fn get_runtime_state(&self, node_id: &str) -> Result<ContainerRuntimeState> {
        let path = self.node_dir(node_id)?.join(STATE_FILE);
        match fs::read_to_string(&path).await {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|e| ExecutorError::Store(format!("parsing {}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(node = %node_id, "no runtime state yet, reporting pending");
                Ok(ContainerRuntimeState::pending())
            }
            Err(e) => Err(ExecutorError::Store(format!(
                "reading {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn set_runtime_state(
        &self,
        node_id: &str,
        state: &ContainerRuntimeState,
    ) -> Result<()> {
        let dir = self.node_dir(node_id)?;
        fs::create_dir_all(&dir)
            .await
            .context("creating node directory")
            .map_err(store_err)?;
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| ExecutorError::Store(format!("serializing state: {}", e)))?;
        write_private(&dir.join(STATE_FILE), json.as_bytes())
            .await
            .map_err(store_err)?;
        debug!(node = %node_id, status = %state.status, "runtime state saved");
        Ok(())
    }
}

fn store_err(e: anyhow::Error) -> ExecutorError {
    ExecutorError::Store(format!("{:#}", e))
}

/// Write through a temp file and rename so readers never see a torn file
async fn write_private(path: &Path, content: &[u8]) -> anyhow::Result<()> {
    let tmp = path.with_extension("tmp");
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&tmp)
        .await
        .with_context(|| format!("opening {}", tmp.display()))?;
    file.write_all(content)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    file.sync_all().await.context("syncing state file")?;
    drop(file);
    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("renaming {} into place", tmp.display()))?;
    Ok(())
}
