pub mod chat_file;
pub mod chat_state;
pub mod variables;

pub use chat_file::{ChatFile, ChatFileError};
pub use chat_state::{ChatState, SharedChat};
pub use variables::{coerce_for_read, VariableStore};
