use std::fmt;

/// How a command addressed its target message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRef {
    /// No reference given: the last message that is not a system message
    LastNonSystem,
    /// Explicit position; negative values count from the end
    Position(i64),
}

impl MessageRef {
    pub fn from_option(message: Option<i64>) -> Self {
        match message {
            Some(position) => MessageRef::Position(position),
            None => MessageRef::LastNonSystem,
        }
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRef::LastNonSystem => f.write_str("last non-system"),
            MessageRef::Position(position) => write!(f, "{}", position),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VariableError {
    #[error("/{command} requires {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("message {reference} does not exist")]
    MessageNotFound { reference: MessageRef },

    #[error("'{0}' is not a message index")]
    InvalidMessageRef(String),

    #[error("conversation has no non-system message")]
    NoNonSystemMessage,

    #[error("variable '{key}' cannot be indexed by '{index}'")]
    NotIndexable { key: String, index: String },

    #[error("index {index} is beyond the largest writable position ({max})")]
    IndexOutOfRange { index: usize, max: usize },

    #[error("swipe {swipe} is beyond the largest writable swipe ({max})")]
    SwipeOutOfRange { swipe: usize, max: usize },

    #[error("filter error: {0}")]
    Filter(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VariableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_includes_reference() {
        let err = VariableError::MessageNotFound {
            reference: MessageRef::Position(-4),
        };
        assert_eq!(err.to_string(), "message -4 does not exist");

        let err = VariableError::MessageNotFound {
            reference: MessageRef::LastNonSystem,
        };
        assert_eq!(err.to_string(), "message last non-system does not exist");
    }

    #[test]
    fn test_missing_argument_names_command() {
        let err = VariableError::MissingArgument {
            command: "setmesvar",
            argument: "key",
        };
        assert_eq!(err.to_string(), "/setmesvar requires key");
    }
}
