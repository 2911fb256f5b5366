//! Per-message, per-swipe variable tables.

use std::sync::Arc;

use serde_json::{Number, Value};

use crate::codec::{self, VariableIndex};
use crate::config::SharedSettings;
use crate::error::{Result, VariableError};
use crate::mirror;
use crate::models::{ChatMessage, VariableTable};
use crate::persistence::PersistenceScheduler;
use crate::resolver::ResolvedMessage;
use crate::store::{ChatState, SharedChat};

/// Reads and writes variables of resolved messages.
///
/// Writes to the newest non-system message are copied into the chat
/// metadata mirror right away (when enabled), and every write requests a
/// chat save.
#[derive(Clone)]
pub struct VariableStore {
    chat: SharedChat,
    settings: SharedSettings,
    persistence: Arc<dyn PersistenceScheduler>,
}

impl VariableStore {
    pub fn new(
        chat: SharedChat,
        settings: SharedSettings,
        persistence: Arc<dyn PersistenceScheduler>,
    ) -> Self {
        Self {
            chat,
            settings,
            persistence,
        }
    }

    fn message<'a>(state: &'a ChatState, target: &ResolvedMessage) -> Result<&'a ChatMessage> {
        state
            .messages
            .get(target.index)
            .ok_or(VariableError::MessageNotFound {
                reference: target.reference,
            })
    }

    fn message_mut<'a>(
        state: &'a mut ChatState,
        target: &ResolvedMessage,
    ) -> Result<&'a mut ChatMessage> {
        state
            .messages
            .get_mut(target.index)
            .ok_or(VariableError::MessageNotFound {
                reference: target.reference,
            })
    }

    // ===== Reads =====

    pub fn get(&self, target: &ResolvedMessage, key: &str) -> Result<Option<Value>> {
        let state = self.chat.lock();
        let message = Self::message(&state, target)?;
        Ok(message
            .active_variables()
            .and_then(|table| table.get(key))
            .cloned())
    }

    /// Value of `key`, projected through `index` when one is given
    pub fn get_indexed(
        &self,
        target: &ResolvedMessage,
        key: &str,
        index: Option<&VariableIndex>,
    ) -> Result<Option<Value>> {
        let raw = self.get(target, key)?;
        Ok(codec::decode_indexed(raw.as_ref(), index))
    }

    pub fn get_all(&self, target: &ResolvedMessage) -> Result<VariableTable> {
        let state = self.chat.lock();
        let message = Self::message(&state, target)?;
        Ok(message.active_variables().cloned().unwrap_or_default())
    }

    // ===== Writes =====

    /// Store `value` under `key`, or inside it at `index`. Returns the stored value.
    pub fn set(
        &self,
        target: &ResolvedMessage,
        key: &str,
        value: Value,
        index: Option<&VariableIndex>,
    ) -> Result<Value> {
        let mirror_enabled = self.settings.mirror_enabled();
        let (stored, mirrored) = {
            let mut state = self.chat.lock();
            let message = Self::message_mut(&mut state, target)?;

            let value = match (index, value) {
                (None, composite @ (Value::Array(_) | Value::Object(_))) => {
                    Value::String(composite.to_string())
                }
                (_, value) => value,
            };
            let stored =
                codec::encode_indexed(key, message.active_variables().and_then(|t| t.get(key)), index, value)?;
            message
                .active_variables_or_insert()?
                .insert(key.to_string(), stored.clone());

            let mirrored = mirror_enabled && mirror::propagate_write(&mut state, target.index, key);
            (stored, mirrored)
        };

        tracing::debug!(
            "set message {} variable '{}'{}",
            target.index,
            key,
            index.map(|i| format!(" at [{}]", i)).unwrap_or_default()
        );

        if mirrored {
            self.persistence.request_metadata_save();
        }
        self.persistence.request_chat_save();
        Ok(stored)
    }

    /// Remove `key`. A message whose active swipe has no table is left untouched.
    pub fn delete(&self, target: &ResolvedMessage, key: &str) -> Result<()> {
        let mirror_enabled = self.settings.mirror_enabled();
        let mirrored = {
            let mut state = self.chat.lock();
            let message = Self::message_mut(&mut state, target)?;
            let Some(table) = message.active_variables_mut() else {
                return Ok(());
            };
            table.remove(key);
            mirror_enabled && mirror::propagate_write(&mut state, target.index, key)
        };

        tracing::debug!("deleted message {} variable '{}'", target.index, key);

        if mirrored {
            self.persistence.request_metadata_save();
        }
        self.persistence.request_chat_save();
        Ok(())
    }
}

/// Presentation of a single variable to script callers.
///
/// Non-empty strings that parse as a finite number come back as numbers;
/// other strings come back unchanged (the empty string stays empty). A
/// missing value is the empty string.
pub fn coerce_for_read(value: Option<Value>) -> Value {
    match value {
        None | Some(Value::Null) => Value::String(String::new()),
        Some(Value::String(s)) => match parse_number(&s) {
            Some(number) => Value::Number(number),
            None => Value::String(s),
        },
        Some(composite @ (Value::Array(_) | Value::Object(_))) => Value::String(composite.to_string()),
        Some(scalar) => scalar,
    }
}

fn parse_number(text: &str) -> Option<Number> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed: f64 = trimmed.parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    if parsed.fract() == 0.0 && parsed.abs() < i64::MAX as f64 {
        Some(Number::from(parsed as i64))
    } else {
        Number::from_f64(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MessageRef;
    use crate::persistence::RecordingScheduler;
    use serde_json::json;

    fn target(index: usize) -> ResolvedMessage {
        ResolvedMessage {
            index,
            reference: MessageRef::Position(index as i64),
        }
    }

    fn fixture() -> (VariableStore, SharedChat, RecordingScheduler, SharedSettings) {
        let chat = SharedChat::new(ChatState::from_messages(vec![
            ChatMessage::new("User", "hi"),
            ChatMessage::new("Bot", "hello"),
            ChatMessage::system("note"),
        ]));
        let recorder = RecordingScheduler::new();
        let settings = SharedSettings::default();
        let store = VariableStore::new(chat.clone(), settings.clone(), Arc::new(recorder.clone()));
        (store, chat, recorder, settings)
    }

    #[test]
    fn test_set_then_get_all_only_adds_key() {
        let (store, _chat, recorder, _) = fixture();
        store.set(&target(0), "a", json!("1"), None).unwrap();
        store.set(&target(0), "b", json!("2"), None).unwrap();
        store.set(&target(0), "b", json!("3"), None).unwrap();

        let all = store.get_all(&target(0)).unwrap();
        assert_eq!(Value::Object(all), json!({"a": "1", "b": "3"}));
        assert_eq!(recorder.chat_saves(), 3);
    }

    #[test]
    fn test_reads_on_untouched_message() {
        let (store, _chat, _, _) = fixture();
        assert_eq!(store.get(&target(1), "x").unwrap(), None);
        assert!(store.get_all(&target(1)).unwrap().is_empty());
    }

    #[test]
    fn test_vanished_message_is_not_found() {
        let (store, _chat, _, _) = fixture();
        assert!(matches!(
            store.set(&target(7), "x", json!(1), None),
            Err(VariableError::MessageNotFound { .. })
        ));
    }

    #[test]
    fn test_writes_follow_active_swipe() {
        let (store, chat, _, _) = fixture();
        store.set(&target(1), "mood", json!("calm"), None).unwrap();
        chat.lock().messages[1].swipe_id = Some(1);
        assert_eq!(store.get(&target(1), "mood").unwrap(), None);
        store.set(&target(1), "mood", json!("angry"), None).unwrap();

        chat.lock().messages[1].swipe_id = Some(0);
        assert_eq!(store.get(&target(1), "mood").unwrap(), Some(json!("calm")));
    }

    #[test]
    fn test_composite_value_is_stored_as_json_string() {
        let (store, _chat, _, _) = fixture();
        store.set(&target(0), "list", json!([1, 2]), None).unwrap();
        assert_eq!(store.get(&target(0), "list").unwrap(), Some(json!("[1,2]")));
        assert_eq!(
            store
                .get_indexed(&target(0), "list", Some(&VariableIndex::Position(1)))
                .unwrap(),
            Some(json!(2))
        );
    }

    #[test]
    fn test_indexed_write_roundtrip() {
        let (store, _chat, _, _) = fixture();
        let index = VariableIndex::Key("hp".into());
        store.set(&target(0), "stats", json!("10"), Some(&index)).unwrap();
        assert_eq!(
            store.get_indexed(&target(0), "stats", Some(&index)).unwrap(),
            Some(json!("10"))
        );
    }

    #[test]
    fn test_delete_is_idempotent_and_noop_without_table() {
        let (store, _chat, recorder, _) = fixture();
        store.delete(&target(0), "a").unwrap();
        assert_eq!(recorder.chat_saves(), 0);

        store.set(&target(0), "a", json!("1"), None).unwrap();
        store.delete(&target(0), "a").unwrap();
        let after_once = store.get_all(&target(0)).unwrap();
        store.delete(&target(0), "a").unwrap();
        assert_eq!(store.get_all(&target(0)).unwrap(), after_once);
        assert!(after_once.is_empty());
    }

    #[test]
    fn test_write_to_newest_message_updates_mirror() {
        let (store, chat, recorder, _) = fixture();
        store.set(&target(1), "score", json!("2"), None).unwrap();
        assert_eq!(chat.lock().mirror()["score"], json!("2"));
        assert_eq!(recorder.metadata_saves(), 1);

        store.set(&target(0), "other", json!("x"), None).unwrap();
        assert!(!chat.lock().mirror().contains_key("other"));
        assert_eq!(recorder.metadata_saves(), 1);

        store.delete(&target(1), "score").unwrap();
        assert!(!chat.lock().mirror().contains_key("score"));
        assert_eq!(recorder.metadata_saves(), 2);
    }

    #[test]
    fn test_mirror_disabled_by_settings() {
        let (store, chat, recorder, settings) = fixture();
        settings.update(|s| s.mirror_latest_to_metadata = false);
        store.set(&target(1), "score", json!("2"), None).unwrap();
        assert!(chat.lock().mirror().is_empty());
        assert_eq!(recorder.metadata_saves(), 0);
        assert_eq!(recorder.chat_saves(), 1);
    }

    #[test]
    fn test_out_of_range_swipe_fails_without_saving() {
        let (store, chat, recorder, _) = fixture();
        chat.lock().messages[1].swipe_id = Some(u32::MAX);
        assert!(matches!(
            store.set(&target(1), "k", json!("v"), None),
            Err(VariableError::SwipeOutOfRange { .. })
        ));
        assert!(chat.lock().messages[1].variables.is_none());
        assert_eq!(recorder.chat_saves(), 0);
    }

    #[test]
    fn test_coerce_for_read() {
        assert_eq!(coerce_for_read(Some(json!("5"))), json!(5));
        assert_eq!(coerce_for_read(Some(json!(" 2.5 "))), json!(2.5));
        assert_eq!(coerce_for_read(Some(json!(""))), json!(""));
        assert_eq!(coerce_for_read(Some(json!("   "))), json!("   "));
        assert_eq!(coerce_for_read(Some(json!("abc"))), json!("abc"));
        assert_eq!(coerce_for_read(Some(json!("NaN"))), json!("NaN"));
        assert_eq!(coerce_for_read(Some(json!(true))), json!(true));
        assert_eq!(coerce_for_read(None), json!(""));
    }
}
