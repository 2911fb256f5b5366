use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::message::VariableTable;

/// Chat-wide metadata. `variables` holds the mirror of the newest
/// non-system message's variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMetadata {
    #[serde(default)]
    pub variables: VariableTable,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// First line of a chat file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
    #[serde(default)]
    pub chat_metadata: ChatMetadata,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_without_metadata_gets_empty_mirror() {
        let header: ChatHeader =
            serde_json::from_value(json!({"user_name": "You", "create_date": "now"})).unwrap();
        assert_eq!(header.user_name.as_deref(), Some("You"));
        assert!(header.chat_metadata.variables.is_empty());
        assert_eq!(header.rest["create_date"], json!("now"));
    }

    #[test]
    fn test_metadata_keeps_foreign_keys() {
        let header: ChatHeader = serde_json::from_value(json!({
            "chat_metadata": {"note_prompt": "x", "variables": {"hp": "10"}}
        }))
        .unwrap();
        assert_eq!(header.chat_metadata.variables["hp"], json!("10"));
        assert_eq!(header.chat_metadata.rest["note_prompt"], json!("x"));
    }
}
