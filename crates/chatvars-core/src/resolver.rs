//! Message reference resolution.
//!
//! A reference picks one message out of a candidate list: the whole
//! conversation, or only the messages a filter keeps. Non-negative
//! references count from the start, negative ones from the end.

use crate::error::{MessageRef, Result, VariableError};
use crate::filter::MessageFilter;
use crate::store::SharedChat;

/// A message picked by the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedMessage {
    /// Position in the full conversation
    pub index: usize,
    /// The reference that selected it, for error reporting
    pub reference: MessageRef,
}

/// Pick the element at `reference` the way a slice starting at that offset
/// would: negative offsets count from the end and clamp at the start.
pub fn select_from<T: Copy>(candidates: &[T], reference: i64) -> Option<T> {
    let len = candidates.len() as i64;
    let start = if reference < 0 {
        (len + reference).max(0)
    } else {
        reference
    };
    usize::try_from(start)
        .ok()
        .and_then(|start| candidates.get(start))
        .copied()
}

#[derive(Debug, Clone)]
pub struct MessageResolver {
    chat: SharedChat,
}

impl MessageResolver {
    pub fn new(chat: SharedChat) -> Self {
        Self { chat }
    }

    pub async fn resolve(
        &self,
        message: Option<i64>,
        filter: Option<&dyn MessageFilter>,
    ) -> Result<ResolvedMessage> {
        // Snapshot what we need and release the lock before any filter runs
        let (default_position, total, bindings) = {
            let state = self.chat.lock();
            let bindings = filter.map(|_| {
                state
                    .messages
                    .iter()
                    .map(|m| m.bindings())
                    .collect::<Vec<_>>()
            });
            (state.last_non_system_index(), state.messages.len(), bindings)
        };

        let position = match message {
            Some(position) => position,
            None => default_position.ok_or(VariableError::NoNonSystemMessage)? as i64,
        };

        let candidates: Vec<usize> = match (filter, bindings) {
            (Some(filter), Some(bindings)) => {
                let mut kept = Vec::new();
                for (index, fields) in bindings.into_iter().enumerate() {
                    let mut scope = filter.base_scope();
                    scope.extend(fields);
                    if filter.evaluate(scope).await?.is_truthy() {
                        kept.push(index);
                    }
                }
                tracing::debug!("filter kept {} of {} messages", kept.len(), total);
                kept
            }
            _ => (0..total).collect(),
        };

        let reference = MessageRef::from_option(message);
        select_from(&candidates, position)
            .map(|index| ResolvedMessage { index, reference })
            .ok_or(VariableError::MessageNotFound { reference })
    }
}
