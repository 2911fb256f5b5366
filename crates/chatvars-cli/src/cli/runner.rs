use std::path::Path;

use anyhow::{Context, Result};
use chatvars_core::{SettingsStorage, SharedSettings, VariableRuntime};
use serde_json::Value;

use super::protocol::{self, CliCommand};

/// Render a command result for stdout. Text is printed raw, anything else as JSON.
pub fn render(value: &Value, pretty: bool) -> Result<String> {
    Ok(match value {
        Value::String(text) => text.clone(),
        other if pretty => serde_json::to_string_pretty(other)?,
        other => serde_json::to_string(other)?,
    })
}

/// Execute one command against a chat file, flushing pending saves before returning.
/// Returns the rendered result.
pub async fn run_command(
    command: CliCommand,
    chat_path: &Path,
    settings: SharedSettings,
    pretty: bool,
) -> Result<String> {
    let name = command.name();
    let mut runtime = VariableRuntime::open(chat_path, settings)
        .with_context(|| format!("Failed to open chat {}", chat_path.display()))?;

    let result = execute(&mut runtime, command, pretty).await;
    runtime.shutdown().await;
    result.with_context(|| format!("/{} failed", name))
}

/// Changes to apply to the stored settings
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub mirror: Option<bool>,
    pub poll_interval_ms: Option<u64>,
    pub save_debounce_ms: Option<u64>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.mirror.is_none() && self.poll_interval_ms.is_none() && self.save_debounce_ms.is_none()
    }
}

/// Apply `update` to the settings file (if it changes anything) and render the result.
pub fn update_settings(storage: &SettingsStorage, update: SettingsUpdate, pretty: bool) -> Result<String> {
    if !update.is_empty() {
        storage
            .update(|settings| {
                if let Some(mirror) = update.mirror {
                    settings.mirror_latest_to_metadata = mirror;
                }
                if let Some(ms) = update.poll_interval_ms {
                    settings.poll_interval_ms = ms;
                }
                if let Some(ms) = update.save_debounce_ms {
                    settings.save_debounce_ms = ms;
                }
            })
            .with_context(|| format!("Failed to save settings to {}", storage.path().display()))?;
    }
    let value = serde_json::to_value(storage.settings().get())?;
    render(&value, pretty)
}

async fn execute(runtime: &mut VariableRuntime, command: CliCommand, pretty: bool) -> Result<String> {
    let commands = runtime.commands().clone();
    match command {
        CliCommand::Set {
            key,
            value,
            index,
            json,
            target,
        } => {
            let args = protocol::set_args(key, value, index, json, target)?;
            let value = commands.set_message_variable(args).await?;
            render(&value, pretty)
        }
        CliCommand::Get {
            key,
            index,
            target,
            unnamed,
        } => {
            let args = protocol::get_args(key, index, target, unnamed)?;
            let value = commands.get_message_variable(args).await?;
            render(&value, pretty)
        }
        CliCommand::GetAll { target, unnamed } => {
            let args = protocol::get_all_args(target, unnamed)?;
            let table = commands.get_all_message_variables(args).await?;
            if pretty {
                let parsed: Value = serde_json::from_str(&table)?;
                render(&parsed, true)
            } else {
                Ok(table)
            }
        }
        CliCommand::Delete {
            key,
            target,
            unnamed,
        } => {
            let args = protocol::delete_args(key, target, unnamed)?;
            Ok(commands.delete_message_variable(args).await?)
        }
        CliCommand::Watch => {
            runtime.start_mirror();
            tracing::info!("Watching chat, press Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            Ok(String::new())
        }
    }
}
