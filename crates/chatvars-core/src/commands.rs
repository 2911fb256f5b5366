//! The four message-variable commands: set, get, get-all and delete.
//!
//! Each command resolves its target message first and only then touches
//! storage, so a failed lookup never leaves a partial write behind.

use std::sync::Arc;

use serde_json::Value;

use crate::codec::VariableIndex;
use crate::config::SharedSettings;
use crate::constants::commands;
use crate::error::{Result, VariableError};
use crate::filter::MessageFilter;
use crate::persistence::PersistenceScheduler;
use crate::resolver::{MessageResolver, ResolvedMessage};
use crate::store::{coerce_for_read, SharedChat, VariableStore};

/// Name and help text of one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: &'static str,
    pub help: &'static str,
}

pub const COMMANDS: [CommandInfo; 4] = [
    CommandInfo {
        name: commands::SET,
        help: "Set a variable on a message. Use index= to write into a JSON list or \
               dictionary stored in the variable. mes= picks the message (negative counts \
               from the end, default is the last non-system message); filter= narrows the \
               messages mes= counts over.",
    },
    CommandInfo {
        name: commands::GET,
        help: "Get a variable of a message. The key may also be given unnamed. Numeric \
               strings come back as numbers; a missing variable comes back empty.",
    },
    CommandInfo {
        name: commands::GET_ALL,
        help: "Get every variable of a message as a JSON dictionary. The message index \
               may be given unnamed.",
    },
    CommandInfo {
        name: commands::DELETE,
        help: "Delete a variable from a message. The key may also be given unnamed. \
               Deleting a missing variable does nothing.",
    },
];

/// Help text for a command name
pub fn help(name: &str) -> Option<&'static str> {
    COMMANDS
        .iter()
        .find(|info| info.name == name)
        .map(|info| info.help)
}

/// Message selection shared by every command
#[derive(Clone, Default)]
pub struct MessageTarget {
    /// Position in the candidate list; `None` means the last non-system message
    pub message: Option<i64>,
    /// Narrows the candidate list before `message` is applied
    pub filter: Option<Arc<dyn MessageFilter>>,
}

impl MessageTarget {
    pub fn at(message: i64) -> Self {
        Self {
            message: Some(message),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Arc<dyn MessageFilter>) -> Self {
        self.filter = Some(filter);
        self
    }
}

#[derive(Clone, Default)]
pub struct SetVariableArgs {
    pub key: Option<String>,
    pub value: Value,
    pub index: Option<VariableIndex>,
    pub target: MessageTarget,
}

#[derive(Clone, Default)]
pub struct GetVariableArgs {
    pub key: Option<String>,
    pub index: Option<VariableIndex>,
    pub target: MessageTarget,
    /// Unnamed argument, used as the key when `key` is absent
    pub unnamed: Option<String>,
}

#[derive(Clone, Default)]
pub struct GetAllVariablesArgs {
    pub target: MessageTarget,
    /// Unnamed argument, used as the message index when `target.message` is absent
    pub unnamed: Option<String>,
}

#[derive(Clone, Default)]
pub struct DeleteVariableArgs {
    pub key: Option<String>,
    pub target: MessageTarget,
    /// Unnamed argument, used as the key when `key` is absent
    pub unnamed: Option<String>,
}

/// Command surface over one conversation
#[derive(Clone)]
pub struct VariableCommands {
    resolver: MessageResolver,
    store: VariableStore,
}

impl VariableCommands {
    pub fn new(
        chat: SharedChat,
        settings: SharedSettings,
        persistence: Arc<dyn PersistenceScheduler>,
    ) -> Self {
        Self {
            resolver: MessageResolver::new(chat.clone()),
            store: VariableStore::new(chat, settings, persistence),
        }
    }

    async fn resolve(&self, target: &MessageTarget) -> Result<ResolvedMessage> {
        self.resolver
            .resolve(target.message, target.filter.as_deref())
            .await
    }

    /// `/setmesvar`. Returns the value as given.
    pub async fn set_message_variable(&self, args: SetVariableArgs) -> Result<Value> {
        let key = require_key(commands::SET, args.key, None)?;
        let resolved = self.resolve(&args.target).await?;
        self.store
            .set(&resolved, &key, args.value.clone(), args.index.as_ref())?;
        Ok(args.value)
    }

    /// `/getmesvar`
    pub async fn get_message_variable(&self, args: GetVariableArgs) -> Result<Value> {
        let key = require_key(commands::GET, args.key, args.unnamed)?;
        let resolved = self.resolve(&args.target).await?;
        let value = self.store.get_indexed(&resolved, &key, args.index.as_ref())?;
        Ok(coerce_for_read(value))
    }

    /// `/getmesvars`. Returns the active swipe's table as a JSON string.
    pub async fn get_all_message_variables(&self, args: GetAllVariablesArgs) -> Result<String> {
        let mut target = args.target;
        if target.message.is_none() {
            target.message = parse_message_ref(args.unnamed.as_deref())?;
        }
        let resolved = self.resolve(&target).await?;
        let table = self.store.get_all(&resolved)?;
        Ok(serde_json::to_string(&table)?)
    }

    /// `/flushmesvar`. Returns an empty string.
    pub async fn delete_message_variable(&self, args: DeleteVariableArgs) -> Result<String> {
        let key = require_key(commands::DELETE, args.key, args.unnamed)?;
        let resolved = self.resolve(&args.target).await?;
        self.store.delete(&resolved, &key)?;
        Ok(String::new())
    }
}

fn require_key(
    command: &'static str,
    named: Option<String>,
    unnamed: Option<String>,
) -> Result<String> {
    named
        .filter(|key| !key.is_empty())
        .or_else(|| unnamed.filter(|key| !key.trim().is_empty()))
        .ok_or(VariableError::MissingArgument {
            command,
            argument: "key",
        })
}

fn parse_message_ref(raw: Option<&str>) -> Result<Option<i64>> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    raw.parse::<i64>()
        .map(Some)
        .map_err(|_| VariableError::InvalidMessageRef(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MessageRef;
    use crate::filter::ExpressionFilter;
    use crate::mirror::MirrorSynchronizer;
    use crate::models::ChatMessage;
    use crate::persistence::RecordingScheduler;
    use crate::store::ChatState;
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        chat: SharedChat,
        settings: SharedSettings,
        recorder: RecordingScheduler,
        commands: VariableCommands,
    }

    fn fixture(messages: Vec<ChatMessage>) -> Fixture {
        let chat = SharedChat::new(ChatState::from_messages(messages));
        let settings = SharedSettings::default();
        let recorder = RecordingScheduler::new();
        let commands = VariableCommands::new(chat.clone(), settings.clone(), Arc::new(recorder.clone()));
        Fixture {
            chat,
            settings,
            recorder,
            commands,
        }
    }

    fn conversation() -> Vec<ChatMessage> {
        let mut user = ChatMessage::new("User", "hi");
        user.is_user = true;
        vec![
            user,
            ChatMessage::new("Bot", "hello"),
            ChatMessage::system("note"),
        ]
    }

    fn set(key: &str, value: Value, message: Option<i64>) -> SetVariableArgs {
        SetVariableArgs {
            key: Some(key.to_string()),
            value,
            target: MessageTarget {
                message,
                filter: None,
            },
            ..Default::default()
        }
    }

    fn get(key: &str, message: Option<i64>) -> GetVariableArgs {
        GetVariableArgs {
            key: Some(key.to_string()),
            target: MessageTarget {
                message,
                filter: None,
            },
            ..Default::default()
        }
    }

    fn all(message: i64) -> GetAllVariablesArgs {
        GetAllVariablesArgs {
            target: MessageTarget::at(message),
            unnamed: None,
        }
    }

    #[test]
    fn test_help_covers_every_command() {
        for name in [commands::SET, commands::GET, commands::GET_ALL, commands::DELETE] {
            assert!(help(name).is_some_and(|text| !text.is_empty()));
        }
        assert!(help("setvar").is_none());
    }

    #[tokio::test]
    async fn test_set_then_get_all_contains_only_new_key() {
        let f = fixture(conversation());
        f.commands
            .set_message_variable(set("a", json!("1"), Some(0)))
            .await
            .unwrap();
        let returned = f
            .commands
            .set_message_variable(set("b", json!("two"), Some(0)))
            .await
            .unwrap();
        assert_eq!(returned, json!("two"));

        let table = f.commands.get_all_message_variables(all(0)).await.unwrap();
        let table: Value = serde_json::from_str(&table).unwrap();
        assert_eq!(table, json!({"a": "1", "b": "two"}));

        let other = f.commands.get_all_message_variables(all(1)).await.unwrap();
        assert_eq!(other, "{}");
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_mutation() {
        let f = fixture(conversation());
        let err = f
            .commands
            .set_message_variable(SetVariableArgs {
                value: json!("x"),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VariableError::MissingArgument {
                command: "setmesvar",
                ..
            }
        ));
        assert_eq!(f.recorder.chat_saves(), 0);

        let err = f
            .commands
            .get_message_variable(GetVariableArgs::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "/getmesvar requires key");

        assert!(f
            .commands
            .delete_message_variable(DeleteVariableArgs::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unnamed_key_and_message() {
        let f = fixture(conversation());
        f.commands
            .set_message_variable(set("mood", json!("calm"), None))
            .await
            .unwrap();

        let value = f
            .commands
            .get_message_variable(GetVariableArgs {
                unnamed: Some("mood".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(value, json!("calm"));

        let table = f
            .commands
            .get_all_message_variables(GetAllVariablesArgs {
                unnamed: Some("1".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(table, r#"{"mood":"calm"}"#);

        let err = f
            .commands
            .get_all_message_variables(GetAllVariablesArgs {
                unnamed: Some("last".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, VariableError::InvalidMessageRef(_)));

        f.commands
            .delete_message_variable(DeleteVariableArgs {
                unnamed: Some("mood".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(
            f.commands.get_message_variable(get("mood", None)).await.unwrap(),
            json!("")
        );
    }

    #[tokio::test]
    async fn test_delete_twice_matches_once() {
        let f = fixture(conversation());
        f.commands
            .set_message_variable(set("k", json!("v"), Some(1)))
            .await
            .unwrap();
        let delete = DeleteVariableArgs {
            key: Some("k".into()),
            target: MessageTarget::at(1),
            unnamed: None,
        };
        assert_eq!(
            f.commands.delete_message_variable(delete.clone()).await.unwrap(),
            ""
        );
        let once = f.chat.snapshot();
        f.commands.delete_message_variable(delete).await.unwrap();
        assert_eq!(f.chat.snapshot(), once);
    }

    #[tokio::test]
    async fn test_indexed_roundtrip_and_container_shape() {
        let f = fixture(conversation());
        let mut args = set("list", json!("x"), Some(0));
        args.index = VariableIndex::parse("0");
        f.commands.set_message_variable(args).await.unwrap();

        let mut args = set("dict", json!("x"), Some(0));
        args.index = VariableIndex::parse("a");
        f.commands.set_message_variable(args).await.unwrap();

        let mut args = set("dict", json!({"deep": [1, 2]}), Some(0));
        args.index = VariableIndex::parse("b");
        f.commands.set_message_variable(args).await.unwrap();

        let raw_list = f.commands.get_message_variable(get("list", Some(0))).await.unwrap();
        assert_eq!(raw_list, json!(r#"["x"]"#));

        let mut read = get("dict", Some(0));
        read.index = VariableIndex::parse("a");
        assert_eq!(f.commands.get_message_variable(read).await.unwrap(), json!("x"));

        let mut read = get("dict", Some(0));
        read.index = VariableIndex::parse("b");
        let nested = f.commands.get_message_variable(read).await.unwrap();
        let nested: Value = serde_json::from_str(nested.as_str().unwrap()).unwrap();
        assert_eq!(nested, json!({"deep": [1, 2]}));
    }

    #[tokio::test]
    async fn test_numeric_coercion_on_get() {
        let f = fixture(conversation());
        f.commands
            .set_message_variable(set("n", json!("5"), Some(0)))
            .await
            .unwrap();
        f.commands
            .set_message_variable(set("e", json!(""), Some(0)))
            .await
            .unwrap();
        assert_eq!(
            f.commands.get_message_variable(get("n", Some(0))).await.unwrap(),
            json!(5)
        );
        assert_eq!(
            f.commands.get_message_variable(get("e", Some(0))).await.unwrap(),
            json!("")
        );
    }

    #[tokio::test]
    async fn test_negative_reference_with_and_without_filter() {
        let f = fixture(conversation());
        f.commands
            .set_message_variable(set("where", json!("last"), Some(-1)))
            .await
            .unwrap();
        assert_eq!(
            f.commands.get_message_variable(get("where", Some(2))).await.unwrap(),
            json!("last")
        );

        let filter: Arc<dyn MessageFilter> = Arc::new(ExpressionFilter::parse("is_user").unwrap());
        f.commands
            .set_message_variable(SetVariableArgs {
                key: Some("where".into()),
                value: json!("user"),
                index: None,
                target: MessageTarget::at(-1).with_filter(filter),
            })
            .await
            .unwrap();
        assert_eq!(
            f.commands.get_message_variable(get("where", Some(0))).await.unwrap(),
            json!("user")
        );
    }

    #[tokio::test]
    async fn test_unknown_message_is_reported_with_reference() {
        let f = fixture(conversation());
        let err = f
            .commands
            .set_message_variable(set("k", json!("v"), Some(10)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VariableError::MessageNotFound {
                reference: MessageRef::Position(10)
            }
        ));
        assert_eq!(err.to_string(), "message 10 does not exist");
        assert_eq!(f.recorder.chat_saves(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mirror_scenario() {
        let mut bot = ChatMessage::new("Bot", "hello");
        bot.active_variables_or_insert()
            .unwrap()
            .insert("score".into(), json!("1"));
        let f = fixture(vec![ChatMessage::new("User", "hi"), bot]);

        let mut handle = MirrorSynchronizer::new(
            f.chat.clone(),
            f.settings.clone(),
            Arc::new(f.recorder.clone()),
        )
        .spawn();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(f.chat.lock().mirror()["score"], json!("1"));

        f.commands
            .set_message_variable(set("score", json!("2"), Some(1)))
            .await
            .unwrap();
        assert_eq!(f.chat.lock().mirror()["score"], json!("2"));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let mirror = f.chat.lock().mirror().clone();
        assert_eq!(Value::Object(mirror), json!({"score": "2"}));

        handle.shutdown().await;
    }
}
