use std::path::Path;
use std::sync::Arc;

use crate::commands::VariableCommands;
use crate::config::SharedSettings;
use crate::mirror::{MirrorHandle, MirrorSynchronizer};
use crate::persistence::{DebouncedSaver, PersistenceScheduler};
use crate::store::{ChatFile, ChatFileError, SharedChat};

/// One loaded conversation with its save scheduler and, optionally, the
/// mirror reconciliation loop. Must be created inside a tokio runtime.
pub struct VariableRuntime {
    chat: SharedChat,
    file: ChatFile,
    settings: SharedSettings,
    saver: Arc<DebouncedSaver>,
    commands: VariableCommands,
    mirror: Option<MirrorHandle>,
}

impl VariableRuntime {
    pub fn open<P: AsRef<Path>>(path: P, settings: SharedSettings) -> Result<Self, ChatFileError> {
        let file = ChatFile::new(path);
        let state = file.load()?;
        tracing::info!(
            "Loaded chat {} ({} messages)",
            file.path().display(),
            state.messages.len()
        );

        let chat = SharedChat::new(state);
        let saver = Arc::new(DebouncedSaver::spawn(
            chat.clone(),
            file.clone(),
            settings.get().save_debounce(),
        ));
        let persistence: Arc<dyn PersistenceScheduler> = saver.clone();
        let commands = VariableCommands::new(chat.clone(), settings.clone(), persistence);

        Ok(Self {
            chat,
            file,
            settings,
            saver,
            commands,
            mirror: None,
        })
    }

    pub fn chat(&self) -> &SharedChat {
        &self.chat
    }

    pub fn commands(&self) -> &VariableCommands {
        &self.commands
    }

    /// Start the mirror reconciliation loop, which also reloads the chat file
    /// when another process writes to it. Does nothing if it already runs.
    pub fn start_mirror(&mut self) {
        if self.mirror.is_some() {
            return;
        }
        let persistence: Arc<dyn PersistenceScheduler> = self.saver.clone();
        let synchronizer =
            MirrorSynchronizer::new(self.chat.clone(), self.settings.clone(), persistence)
                .with_source(self.file.clone());
        self.mirror = Some(synchronizer.spawn());
    }

    /// Stop the mirror loop and flush any pending save
    pub async fn shutdown(mut self) {
        if let Some(mut mirror) = self.mirror.take() {
            mirror.shutdown().await;
        }
        self.saver.shutdown().await;
    }
}
