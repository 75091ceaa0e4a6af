use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use super::common::{open_node, relock_node};
use crate::cli::RunArgs;
use crate::config::ExecutorConfig;
use crate::runtime::RunMode;

pub async fn cmd_run(config: &ExecutorConfig, args: RunArgs) -> Result<()> {
    let mode = if args.daemon {
        RunMode::Daemon
    } else {
        RunMode::Foreground
    };
    info!("node-executor run {} ({:?})", args.node, mode);

    let (orchestrator, lock) = open_node(config, &args.node)?;

    if mode.is_daemon() {
        let state = orchestrator
            .provision(&args.node, mode)
            .await
            .with_context(|| format!("provisioning {}", args.node))?;
        println!(
            "{}: {} on {}",
            state.id.as_deref().unwrap_or(&args.node),
            state.status,
            state.host.as_deref().unwrap_or("-")
        );
        return Ok(());
    }

    // Setup signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let mut launched = orchestrator
        .launch(&args.node, mode)
        .await
        .with_context(|| format!("provisioning {}", args.node))?;

    // Recorded as running: stop or destroy from another shell may go ahead while
    // the container stays attached here
    drop(lock);

    let signalled = tokio::select! {
        _ = launched.wait() => false,
        _ = sigterm.recv() => {
            info!("received SIGTERM, stopping container");
            true
        }
        _ = sigint.recv() => {
            info!("received SIGINT, stopping container");
            true
        }
    };
    if signalled {
        if let Err(e) = orchestrator.interrupt(&args.node).await {
            warn!("failed to stop container: {}", e);
        }
        launched.wait().await;
    }

    let _lock = relock_node(config, &args.node).await?;
    let state = orchestrator
        .finish(launched)
        .await
        .with_context(|| format!("running {}", args.node))?;
    println!(
        "{}: {}",
        state.id.as_deref().unwrap_or(&args.node),
        state.status
    );
    Ok(())
}
