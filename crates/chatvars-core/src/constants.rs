//! Application-wide constants
//!
//! Centralized location for magic strings and configuration values
//! that are used across multiple modules.

/// Default interval between two mirror reconciliation passes
pub const MIRROR_POLL_INTERVAL_MS: u64 = 500;

/// Default window in which repeated save requests are coalesced into one write
pub const SAVE_DEBOUNCE_MS: u64 = 1000;

/// Largest array position an indexed write may create.
/// Writing past the end pads the array with `null`, so this bounds the padding.
pub const MAX_INDEXED_POSITION: usize = 65_536;

/// Largest active swipe index a write may create a table for.
/// `swipe_id` comes from the chat file, so this bounds the swipe list.
pub const MAX_SWIPE_INDEX: usize = 4096;

/// Settings file name inside the config directory
pub const SETTINGS_FILE_NAME: &str = "message_variables.json";

// Command names, kept identical to the slash commands users already script against
pub mod commands {
    /// Set a message bound variable
    pub const SET: &str = "setmesvar";
    /// Get one message bound variable
    pub const GET: &str = "getmesvar";
    /// Get every variable of a message as a JSON dictionary
    pub const GET_ALL: &str = "getmesvars";
    /// Delete a message bound variable
    pub const DELETE: &str = "flushmesvar";
}
