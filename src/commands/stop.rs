use anyhow::{Context, Result};
use tracing::info;

use super::common::open_node;
use crate::cli::NodeArgs;
use crate::config::ExecutorConfig;

pub async fn cmd_stop(config: &ExecutorConfig, args: NodeArgs) -> Result<()> {
    info!("node-executor stop {}", args.node);
    let (orchestrator, _lock) = open_node(config, &args.node)?;
    orchestrator
        .stop(&args.node)
        .await
        .with_context(|| format!("stopping {}", args.node))?;
    println!("{}: stopped", args.node);
    Ok(())
}
