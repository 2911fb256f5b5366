//! Save scheduling.
//!
//! The core only ever *requests* saves. Requests are fire-and-forget: the
//! caller never waits for the write and never sees its failure.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::store::{ChatFile, SharedChat};

pub trait PersistenceScheduler: Send + Sync {
    /// The conversation (messages) changed
    fn request_chat_save(&self);
    /// Chat metadata changed
    fn request_metadata_save(&self);
}

/// Drops every request. For read-only use.
pub struct NoopScheduler;

impl PersistenceScheduler for NoopScheduler {
    fn request_chat_save(&self) {}
    fn request_metadata_save(&self) {}
}

/// Counts requests; lets tests assert on save traffic
#[derive(Debug, Clone, Default)]
pub struct RecordingScheduler {
    chat_saves: Arc<AtomicUsize>,
    metadata_saves: Arc<AtomicUsize>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chat_saves(&self) -> usize {
        self.chat_saves.load(Ordering::SeqCst)
    }

    pub fn metadata_saves(&self) -> usize {
        self.metadata_saves.load(Ordering::SeqCst)
    }
}

impl PersistenceScheduler for RecordingScheduler {
    fn request_chat_save(&self) {
        self.chat_saves.fetch_add(1, Ordering::SeqCst);
    }

    fn request_metadata_save(&self) {
        self.metadata_saves.fetch_add(1, Ordering::SeqCst);
    }
}

/// Debounced writer for a chat file.
///
/// Requests arriving within the debounce window of each other collapse into
/// one write. Messages and metadata share one file, so both kinds of
/// request mark the same dirty flag. A write is skipped when the file
/// changed on disk since this process last read or wrote it.
pub struct DebouncedSaver {
    dirty: Arc<AtomicBool>,
    notify: Arc<Notify>,
    cancel_tx: watch::Sender<bool>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl DebouncedSaver {
    pub fn spawn(chat: SharedChat, file: ChatFile, debounce: Duration) -> Self {
        let dirty = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let join = tokio::spawn(run_saver(
            chat,
            file,
            debounce,
            dirty.clone(),
            notify.clone(),
            cancel_rx,
        ));

        Self {
            dirty,
            notify,
            cancel_tx,
            join: Mutex::new(Some(join)),
        }
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Stop the writer, flushing a pending save first
    pub async fn shutdown(&self) {
        let _ = self.cancel_tx.send(true);
        let join = self.join.lock().take();
        if let Some(join) = join {
            if let Err(e) = join.await {
                tracing::warn!("Chat saver task failed: {}", e);
            }
        }
    }
}

impl PersistenceScheduler for DebouncedSaver {
    fn request_chat_save(&self) {
        tracing::trace!("chat save requested");
        self.mark_dirty();
    }

    fn request_metadata_save(&self) {
        tracing::trace!("metadata save requested");
        self.mark_dirty();
    }
}

fn flush(chat: &SharedChat, file: &ChatFile, dirty: &AtomicBool) {
    if !dirty.swap(false, Ordering::SeqCst) {
        return;
    }
    match file.save_if_unchanged(chat) {
        Ok(true) => tracing::debug!("Saved chat to {}", file.path().display()),
        Ok(false) => tracing::warn!(
            "{} changed on disk; dropped in-memory changes instead of overwriting it",
            file.path().display()
        ),
        Err(e) => tracing::warn!("Debounced chat save failed: {}", e),
    }
}

async fn run_saver(
    chat: SharedChat,
    file: ChatFile,
    debounce: Duration,
    dirty: Arc<AtomicBool>,
    notify: Arc<Notify>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    loop {
        if *cancel_rx.borrow() {
            break;
        }

        tokio::select! {
            _ = notify.notified() => {}
            changed = cancel_rx.changed() => {
                if changed.is_err() || *cancel_rx.borrow() {
                    break;
                }
                continue;
            }
        }

        // Keep pushing the deadline back while requests keep arriving
        loop {
            tokio::select! {
                _ = notify.notified() => continue,
                _ = tokio::time::sleep(debounce) => break,
                _ = cancel_rx.changed() => break,
            }
        }

        flush(&chat, &file, &dirty);
    }

    flush(&chat, &file, &dirty);
    tracing::debug!("Chat saver stopped");
}
