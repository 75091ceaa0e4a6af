pub mod cli;
pub mod commands;
pub mod config;
pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod network;
pub mod orchestrator;
pub mod readiness;
pub mod runtime;
pub mod state;
pub mod utils;

// Re-export core types for convenience
pub use error::{ExecutorError, Result, Stage};
pub use orchestrator::Orchestrator;
