pub mod common;
pub mod destroy;
pub mod put;
pub mod run;
pub mod show;
pub mod stop;

// Re-export command functions
pub use destroy::cmd_destroy;
pub use put::cmd_put;
pub use run::cmd_run;
pub use show::cmd_show;
pub use stop::cmd_stop;
