use anyhow::{bail, Context, Result};
use tracing::info;

use super::common::open_node;
use crate::cli::PutArgs;
use crate::config::ExecutorConfig;
use crate::state::{ContainerStatus, DescriptorStore, FileStore};

pub async fn cmd_put(config: &ExecutorConfig, args: PutArgs) -> Result<()> {
    info!("node-executor put {} {}", args.node, args.file.display());
    let yaml = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;

    // Replacing the descriptor resets runtime state, so hold the node lock
    let (_orchestrator, _lock) = open_node(config, &args.node)?;
    let store = FileStore::new(config.store.root.clone());

    let state = store.get_runtime_state(&args.node).await?;
    if state.status == ContainerStatus::Running {
        bail!("{} is running, stop it before replacing its descriptor", args.node);
    }

    store
        .put_descriptor(&args.node, &yaml)
        .await
        .with_context(|| format!("storing descriptor for {}", args.node))?;
    println!("{}: descriptor stored", args.node);
    Ok(())
}
