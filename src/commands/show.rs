use anyhow::{Context, Result};

use crate::cli::ShowArgs;
use crate::config::ExecutorConfig;
use crate::orchestrator::{ContainerSummary, Orchestrator};

/// Read-only, so no node lock
pub async fn cmd_show(config: &ExecutorConfig, args: ShowArgs) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config).context("building clients")?;
    let summary = orchestrator
        .show(&args.node)
        .await
        .with_context(|| format!("reading {}", args.node))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render_table(&summary));
    }
    Ok(())
}

fn render_table(summary: &ContainerSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<24} {:<20} {:<10}\n",
        "NAME", "HOST", "STATUS"
    ));
    out.push_str(&format!(
        "{:<24} {:<20} {:<10}\n",
        summary.name,
        summary.host.as_deref().unwrap_or("-"),
        summary.status
    ));
    out.push('\n');
    out.push_str(&format!(
        "{:<10} {:<16} {:<18} {:<8}\n",
        "DEVICE", "NETWORK", "ADDRESS", "DYNAMIC"
    ));
    for iface in &summary.interfaces {
        out.push_str(&format!(
            "{:<10} {:<16} {:<18} {:<8}\n",
            iface.device,
            iface.network,
            iface.address.as_deref().unwrap_or("-"),
            if iface.dynamic { "yes" } else { "no" }
        ));
    }
    out
}
