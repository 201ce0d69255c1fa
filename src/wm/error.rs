//! Typed window manager errors.
//!
//! Adapter and startup paths return `anyhow::Result`; these variants are the
//! failures callers are expected to match on.

use thiserror::Error;

use crate::wm::adapter::Window;

#[derive(Debug, Error)]
pub enum WmError {
    /// The window handle no longer refers to a live window
    #[error("window 0x{0:x} is not a valid window")]
    InvalidWindow(Window),

    /// Substructure redirect on the root is held by another client
    #[error("another window manager is already running on screen {0}")]
    OtherWmRunning(usize),

    /// A binding string could not be parsed
    #[error("invalid binding `{binding}`: {reason}")]
    BadBinding { binding: String, reason: String },

    /// An action name in the configuration is not known
    #[error("unknown action `{0}`")]
    UnknownAction(String),

    /// An autogroup rule or action named a group that does not exist
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
}
