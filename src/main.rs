use anyhow::Result;
use clap::Parser;
use node_executor::cli::Commands;
use node_executor::{cli, commands};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Only use colors when outputting to a TTY (not when piped to a file)
    let use_color = atty::is(atty::Stream::Stdout);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_target(true)
        .with_ansi(use_color)
        .with_writer(std::io::stderr)
        .init();

    let result = match commands::common::load_config(cli.config.as_deref(), cli.store_dir.as_deref()) {
        Ok(config) => match cli.cmd {
            Commands::Run(args) => commands::cmd_run(&config, args).await,
            Commands::Stop(args) => commands::cmd_stop(&config, args).await,
            Commands::Destroy(args) => commands::cmd_destroy(&config, args).await,
            Commands::Show(args) => commands::cmd_show(&config, args).await,
            Commands::Put(args) => commands::cmd_put(&config, args).await,
        },
        Err(e) => Err(e),
    };

    // Handle errors
    if let Err(e) = &result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }

    result
}
