use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::models::{ChatHeader, ChatMessage, VariableTable};

/// A loaded conversation: header (with chat metadata) plus messages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    pub header: ChatHeader,
    pub messages: Vec<ChatMessage>,
}

impl ChatState {
    pub fn new(header: ChatHeader, messages: Vec<ChatMessage>) -> Self {
        Self { header, messages }
    }

    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            header: ChatHeader::default(),
            messages,
        }
    }

    /// Position of the newest message that is not a system message
    pub fn last_non_system_index(&self) -> Option<usize> {
        self.messages.iter().rposition(|m| !m.is_system)
    }

    pub fn last_non_system(&self) -> Option<&ChatMessage> {
        self.last_non_system_index().map(|i| &self.messages[i])
    }

    /// Chat-level copy of the newest message's variables
    pub fn mirror(&self) -> &VariableTable {
        &self.header.chat_metadata.variables
    }

    pub fn mirror_mut(&mut self) -> &mut VariableTable {
        &mut self.header.chat_metadata.variables
    }
}

/// Handle to the conversation shared by commands, the mirror loop and the saver.
///
/// Every mutation happens under the lock; callers never hold the guard
/// across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct SharedChat {
    inner: Arc<Mutex<ChatState>>,
}

impl SharedChat {
    pub fn new(state: ChatState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.inner.lock()
    }

    pub fn snapshot(&self) -> ChatState {
        self.inner.lock().clone()
    }

    /// Append a message, as the host does when a new turn arrives
    pub fn push_message(&self, message: ChatMessage) -> usize {
        let mut state = self.inner.lock();
        state.messages.push(message);
        state.messages.len() - 1
    }
}
