pub mod config;
pub mod protocol;
pub mod runner;

pub use config::CliConfig;
pub use protocol::CliCommand;
pub use runner::run_command;
