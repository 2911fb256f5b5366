pub mod chat;
pub mod message;

pub use chat::{ChatHeader, ChatMetadata};
pub use message::{ChatMessage, VariableTable};
