//! Chat-level mirror of the newest non-system message's variables.
//!
//! Two paths keep `chat_metadata.variables` current:
//! - writes through the variable store copy the touched key immediately
//!   ([`propagate_write`]);
//! - [`MirrorSynchronizer`] polls the newest message and merges its table
//!   whenever its serialization changed, which catches the newest message
//!   itself changing (a new turn arriving, a swipe switch).
//!
//! When the synchronizer watches a chat file, each pass first reloads the
//! file if something else wrote to it, so turns appended by the host are
//! seen and never overwritten by an older in-memory copy.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::SharedSettings;
use crate::persistence::PersistenceScheduler;
use crate::store::{ChatFile, ChatState, SharedChat};

/// Copy `key` from message `index` into the mirror if that message is the
/// newest non-system message. A key that no longer exists is removed from
/// the mirror. Returns whether the mirror was touched.
pub fn propagate_write(state: &mut ChatState, index: usize, key: &str) -> bool {
    if state.last_non_system_index() != Some(index) {
        return false;
    }
    let value = state.messages[index]
        .active_variables()
        .and_then(|table| table.get(key))
        .cloned();
    match value {
        Some(value) => {
            state.mirror_mut().insert(key.to_string(), value);
        }
        None => {
            state.mirror_mut().remove(key);
        }
    }
    true
}

/// Periodic reconciliation of the mirror
pub struct MirrorSynchronizer {
    chat: SharedChat,
    settings: SharedSettings,
    persistence: Arc<dyn PersistenceScheduler>,
    source: Option<ChatFile>,
    /// Serialized table observed on the previous pass
    last_seen: Option<String>,
}

impl MirrorSynchronizer {
    pub fn new(
        chat: SharedChat,
        settings: SharedSettings,
        persistence: Arc<dyn PersistenceScheduler>,
    ) -> Self {
        Self {
            chat,
            settings,
            persistence,
            source: None,
            last_seen: None,
        }
    }

    /// Reload `file` into the chat before each pass when it changed on disk
    pub fn with_source(mut self, file: ChatFile) -> Self {
        self.source = Some(file);
        self
    }

    /// Pick up outside writes to the source file. Returns whether it reloaded.
    pub fn reload_source(&mut self) -> bool {
        let Some(file) = &self.source else {
            return false;
        };
        match file.reload_into(&self.chat) {
            Ok(true) => {
                tracing::debug!("Reloaded {} after an outside write", file.path().display());
                self.last_seen = None;
                true
            }
            Ok(false) => false,
            Err(e) => {
                tracing::warn!("Failed to reload chat: {}", e);
                false
            }
        }
    }

    /// One reconciliation pass. Returns whether the mirror changed.
    pub fn reconcile_once(&mut self) -> bool {
        if !self.settings.mirror_enabled() {
            return false;
        }

        {
            let mut state = self.chat.lock();
            let Some(message) = state.last_non_system() else {
                return false;
            };
            if message.variables.is_none() {
                return false;
            }

            let table = message.active_variables().cloned();
            let current = match serde_json::to_string(&table) {
                Ok(current) => current,
                Err(e) => {
                    tracing::warn!("Failed to serialize variables for mirror: {}", e);
                    return false;
                }
            };
            if self.last_seen.as_deref() == Some(current.as_str()) {
                return false;
            }
            self.last_seen = Some(current);

            let Some(table) = table else {
                return false;
            };
            let mirror = state.mirror_mut();
            let mut changed = false;
            for (key, value) in table {
                if mirror.get(&key) != Some(&value) {
                    mirror.insert(key, value);
                    changed = true;
                }
            }
            if !changed {
                return false;
            }
        }

        tracing::debug!("Republished newest message variables to chat metadata");
        self.persistence.request_metadata_save();
        true
    }

    /// Poll until `cancel_rx` flips to `true` or its sender goes away.
    pub async fn run(mut self, mut cancel_rx: watch::Receiver<bool>) {
        tracing::info!("Mirror synchronizer started");
        loop {
            if *cancel_rx.borrow() {
                break;
            }

            let interval = self.settings.get().poll_interval();
            tokio::select! {
                changed = cancel_rx.changed() => {
                    if changed.is_err() || *cancel_rx.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(interval) => {
                    if self.settings.mirror_enabled() {
                        self.reload_source();
                    }
                    self.reconcile_once();
                }
            }
        }
        tracing::info!("Mirror synchronizer stopped");
    }

    pub fn spawn(self) -> MirrorHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(cancel_rx));
        MirrorHandle {
            cancel_tx,
            join: Some(join),
        }
    }
}

/// Stop handle for a spawned [`MirrorSynchronizer`]
pub struct MirrorHandle {
    cancel_tx: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
}

impl MirrorHandle {
    pub async fn shutdown(&mut self) {
        let _ = self.cancel_tx.send(true);
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                tracing::warn!("Mirror synchronizer task failed: {}", e);
            }
        }
    }
}
