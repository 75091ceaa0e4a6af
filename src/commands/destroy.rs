use anyhow::{Context, Result};
use tracing::info;

use super::common::open_node;
use crate::cli::NodeArgs;
use crate::config::ExecutorConfig;

pub async fn cmd_destroy(config: &ExecutorConfig, args: NodeArgs) -> Result<()> {
    info!("node-executor destroy {}", args.node);
    let (orchestrator, _lock) = open_node(config, &args.node)?;
    orchestrator
        .destroy(&args.node)
        .await
        .with_context(|| format!("destroying {}", args.node))?;
    println!("{}: destroyed", args.node);
    Ok(())
}
