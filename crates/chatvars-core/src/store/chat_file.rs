//! JSONL chat files.
//!
//! Line 1 is the header object carrying `chat_metadata`; every following
//! line is one message. Fields this crate does not model are preserved.
//!
//! The host application may append to the file while a chat is open.
//! [`ChatFile`] remembers the modification time and size it last read or
//! wrote, so a stale in-memory copy is never written over newer content.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::models::{ChatHeader, ChatMessage};
use crate::store::{ChatState, SharedChat};

#[derive(Debug, thiserror::Error)]
pub enum ChatFileError {
    #[error("Failed to read chat file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse line {line} of {path}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },

    #[error("Chat file {0} has no header line")]
    MissingHeader(PathBuf),

    #[error("Failed to write chat file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize chat: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What the file looked like on disk. `None` stands for "no file".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

impl FileStamp {
    fn read(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        Some(Self {
            modified: meta.modified().ok()?,
            len: meta.len(),
        })
    }
}

/// Handle to a chat file. Clones share the last observed on-disk version.
#[derive(Debug, Clone)]
pub struct ChatFile {
    path: PathBuf,
    stamp: Arc<Mutex<Option<FileStamp>>>,
}

impl ChatFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            stamp: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<ChatState, ChatFileError> {
        // Stamp first: a write racing the read then shows up as a change later
        let observed = FileStamp::read(&self.path);
        let state = self.read_state()?;
        *self.stamp.lock() = observed;
        Ok(state)
    }

    /// Whether the file differs from the version last loaded or saved
    pub fn changed_on_disk(&self) -> bool {
        FileStamp::read(&self.path) != *self.stamp.lock()
    }

    /// Replace `chat` with the file's contents if the file changed since it
    /// was last loaded or saved. Returns whether it reloaded.
    pub fn reload_into(&self, chat: &SharedChat) -> Result<bool, ChatFileError> {
        let mut stamp = self.stamp.lock();
        let observed = FileStamp::read(&self.path);
        if observed == *stamp {
            return Ok(false);
        }
        let state = self.read_state()?;
        *chat.lock() = state;
        *stamp = observed;
        Ok(true)
    }

    /// Save a snapshot of `chat` unless the file changed since it was last
    /// loaded or saved. Returns whether it wrote.
    pub fn save_if_unchanged(&self, chat: &SharedChat) -> Result<bool, ChatFileError> {
        let mut stamp = self.stamp.lock();
        if FileStamp::read(&self.path) != *stamp {
            return Ok(false);
        }
        self.write_state(&chat.snapshot())?;
        *stamp = FileStamp::read(&self.path);
        Ok(true)
    }

    /// Write the chat atomically (temp file, then rename).
    pub fn save(&self, state: &ChatState) -> Result<(), ChatFileError> {
        let mut stamp = self.stamp.lock();
        self.write_state(state)?;
        *stamp = FileStamp::read(&self.path);
        Ok(())
    }

    fn read_state(&self) -> Result<ChatState, ChatFileError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| ChatFileError::Read {
            path: self.path.clone(),
            source,
        })?;

        let mut lines = contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let (header_line, header_text) = lines
            .next()
            .ok_or_else(|| ChatFileError::MissingHeader(self.path.clone()))?;
        let header: ChatHeader = self.parse_line(header_line, header_text)?;

        let messages = lines
            .map(|(n, text)| self.parse_line::<ChatMessage>(n, text))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            "Loaded {} messages from {}",
            messages.len(),
            self.path.display()
        );
        Ok(ChatState::new(header, messages))
    }

    fn parse_line<T: serde::de::DeserializeOwned>(
        &self,
        index: usize,
        text: &str,
    ) -> Result<T, ChatFileError> {
        serde_json::from_str(text).map_err(|source| ChatFileError::Parse {
            path: self.path.clone(),
            line: index + 1,
            source,
        })
    }

    fn write_state(&self, state: &ChatState) -> Result<(), ChatFileError> {
        let mut out = serde_json::to_string(&state.header)?;
        out.push('\n');
        for message in &state.messages {
            out.push_str(&serde_json::to_string(message)?);
            out.push('\n');
        }

        let temp = self.path.with_extension("jsonl.tmp");
        let write_err = |source| ChatFileError::Write {
            path: self.path.clone(),
            source,
        };
        fs::write(&temp, out).map_err(write_err)?;
        fs::rename(&temp, &self.path).map_err(write_err)?;
        Ok(())
    }
}
