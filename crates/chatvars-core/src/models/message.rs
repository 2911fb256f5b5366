use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::MAX_SWIPE_INDEX;
use crate::error::{Result, VariableError};

/// Key/value table owned by one swipe of one message
pub type VariableTable = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_user: bool,
    /// System messages are skipped when looking for the "last" message
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub mes: String,
    /// Active swipe; absent means swipe 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swipe_id: Option<u32>,
    /// One table per swipe. Holes (`null`) are swipes that were never written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<Option<VariableTable>>>,
    /// Every other field the host stores on a message, kept verbatim
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl ChatMessage {
    pub fn new(name: &str, mes: &str) -> Self {
        Self {
            name: name.to_string(),
            mes: mes.to_string(),
            ..Default::default()
        }
    }

    pub fn system(mes: &str) -> Self {
        Self {
            name: "System".to_string(),
            is_system: true,
            mes: mes.to_string(),
            ..Default::default()
        }
    }

    pub fn active_swipe(&self) -> usize {
        self.swipe_id.unwrap_or(0) as usize
    }

    /// Table of the active swipe, if any write ever touched it
    pub fn active_variables(&self) -> Option<&VariableTable> {
        self.variables
            .as_ref()?
            .get(self.active_swipe())?
            .as_ref()
    }

    pub fn active_variables_mut(&mut self) -> Option<&mut VariableTable> {
        let swipe = self.active_swipe();
        self.variables.as_mut()?.get_mut(swipe)?.as_mut()
    }

    /// Table of the active swipe, creating the swipe list and the table on demand.
    /// Fails for a `swipe_id` past [`MAX_SWIPE_INDEX`].
    pub fn active_variables_or_insert(&mut self) -> Result<&mut VariableTable> {
        let swipe = self.active_swipe();
        if swipe > MAX_SWIPE_INDEX {
            return Err(VariableError::SwipeOutOfRange {
                swipe,
                max: MAX_SWIPE_INDEX,
            });
        }
        let swipes = self.variables.get_or_insert_with(Vec::new);
        if swipes.len() <= swipe {
            swipes.resize(swipe + 1, None);
        }
        Ok(swipes[swipe].get_or_insert_with(Map::new))
    }

    /// Message fields as a JSON object, used as filter bindings.
    pub fn bindings(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(fields)) => fields,
            _ => Map::new(),
        }
    }
}
