use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "node-executor",
    version,
    about = "Run, wire and register containers described by node descriptors"
)]
pub struct Cli {
    /// Executor configuration file (YAML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Descriptor store root, overrides the config file
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision a node's container
    Run(RunArgs),
    /// Deregister, unwire and stop a node's container
    Stop(NodeArgs),
    /// Stop a node's container and remove it with its storage
    Destroy(NodeArgs),
    /// Show a node's container name, host, status and interfaces
    Show(ShowArgs),
    /// Store a descriptor document for a node
    Put(PutArgs),
}

#[derive(Args, Debug)]
pub struct NodeArgs {
    /// Node id (e.g. `cluster9/slave1`)
    pub node: String,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Node id (e.g. `cluster9/slave1`)
    pub node: String,

    /// Start detached and return once the container is running
    #[arg(long, short)]
    pub daemon: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Node id (e.g. `cluster9/slave1`)
    pub node: String,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PutArgs {
    /// Node id (e.g. `cluster9/slave1`)
    pub node: String,

    /// Descriptor YAML file
    pub file: PathBuf,
}
