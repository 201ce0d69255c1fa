//! Client Flags
//!
//! Bitfield flags for client state and protocol support.

use bitflags::bitflags;

bitflags! {
    /// Client state flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClientFlags: u32 {
        /// Unmapped by the window manager (iconified or in a hidden group)
        const HIDDEN          = 1 << 0;
        /// Matched the ignore list: no border, skipped by cycling
        const IGNORE          = 1 << 1;
        const VMAXIMIZED      = 1 << 2;
        const HMAXIMIZED      = 1 << 3;
        const FREEZE          = 1 << 4;
        const ACTIVE          = 1 << 5;
        const URGENT          = 1 << 6;
        /// Group membership survived the last group-edit commit
        const GROUP_COMMITTED = 1 << 7;

        const MAXIMIZED = Self::VMAXIMIZED.bits() | Self::HMAXIMIZED.bits();
    }
}

impl ClientFlags {
    /// Both axes maximized
    pub fn is_maximized(&self) -> bool {
        self.contains(Self::MAXIMIZED)
    }
}

bitflags! {
    /// WM_PROTOCOLS the client participates in
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WmProtocols: u32 {
        const DELETE     = 1 << 0;
        const TAKE_FOCUS = 1 << 1;
    }
}

/// Border highlight marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Highlight {
    #[default]
    None,
    /// Member of the group being edited
    Primary,
    /// Pending removal from the group being edited
    Secondary,
}
