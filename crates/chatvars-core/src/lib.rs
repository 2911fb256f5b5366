pub mod codec;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod filter;
pub mod mirror;
pub mod models;
pub mod persistence;
pub mod resolver;
pub mod runtime;
pub mod store;

// Re-export the command surface at crate root for convenience
pub use commands::{
    DeleteVariableArgs, GetAllVariablesArgs, GetVariableArgs, MessageTarget, SetVariableArgs,
    VariableCommands,
};
pub use config::{MessageVariableSettings, SettingsStorage, SharedSettings};
pub use error::{MessageRef, VariableError};
pub use runtime::VariableRuntime;
