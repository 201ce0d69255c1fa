use std::collections::VecDeque;

use slotmap::new_key_type;

use crate::shared::{Geometry, Point};
use crate::wm::adapter::Window;
use crate::wm::client_flags::{ClientFlags, Highlight, WmProtocols};
use crate::wm::group::GroupId;
use crate::wm::hints::{ClassHint, SizeHints, WmHints};

new_key_type! {
    /// Stable handle of a managed client
    pub struct ClientId;
}

/// Default number of remembered window names
pub const NAME_HISTORY_LEN: usize = 5;

/// Bounded, most-recent-last history of a window's display names
#[derive(Debug, Clone)]
pub struct NameHistory {
    names: VecDeque<String>,
    capacity: usize,
}

impl NameHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            names: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a name; a repeat moves to the tail instead of duplicating
    pub fn push(&mut self, name: &str) {
        if let Some(pos) = self.names.iter().position(|n| n == name) {
            if let Some(existing) = self.names.remove(pos) {
                self.names.push_back(existing);
            }
            return;
        }

        self.names.push_back(name.to_string());
        while self.names.len() > self.capacity {
            self.names.pop_front();
        }
    }

    /// Current (most recent) name
    pub fn current(&self) -> Option<&str> {
        self.names.back().map(String::as_str)
    }

    /// Names from most to least recent
    pub fn recent_first(&self) -> impl Iterator<Item = &str> {
        self.names.iter().rev().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

/// Window Manager client state
/// Represents a window being managed by the WM
#[derive(Debug, Clone)]
pub struct Client {
    /// Content window
    pub window: Window,

    /// Decoration frame the content window is reparented into
    pub frame: Window,

    /// Index of the screen the client lives on
    pub screen: usize,

    /// Frame position and content size
    pub geometry: Geometry,

    /// Geometry to restore when leaving a maximized state
    pub saved_geometry: Geometry,

    pub border_width: u32,

    /// Border width the window had before it was managed
    pub original_border_width: u32,

    pub size_hints: SizeHints,

    pub wm_hints: WmHints,

    /// Pointer position relative to the frame, remembered across focus changes
    pub pointer: Option<Point>,

    pub flags: ClientFlags,

    pub protocols: WmProtocols,

    /// User-assigned label
    pub label: Option<String>,

    pub highlight: Highlight,

    /// Owning group, if any
    pub group: Option<GroupId>,

    /// Position in the stacking order, bottom-most visible client is 0
    pub stack_rank: u32,

    pub class: ClassHint,

    /// WM_COMMAND, joined with spaces
    pub command: Option<String>,

    /// UnmapNotify events caused by reparenting, not by the client
    pub ignore_unmaps: u32,

    names: NameHistory,
}

impl Client {
    pub fn new(window: Window, screen: usize, geometry: Geometry, border_width: u32) -> Self {
        Self {
            window,
            frame: window,
            screen,
            geometry,
            saved_geometry: geometry,
            border_width,
            original_border_width: border_width,
            size_hints: SizeHints::default(),
            wm_hints: WmHints::default(),
            pointer: None,
            flags: ClientFlags::empty(),
            protocols: WmProtocols::empty(),
            label: None,
            highlight: Highlight::None,
            group: None,
            stack_rank: 0,
            class: ClassHint::default(),
            command: None,
            ignore_unmaps: 0,
            names: NameHistory::new(NAME_HISTORY_LEN),
        }
    }

    /// Replace the name history with one of a different capacity
    pub fn with_name_capacity(mut self, capacity: usize) -> Self {
        self.names = NameHistory::new(capacity);
        self
    }

    pub fn names(&self) -> &NameHistory {
        &self.names
    }

    pub fn set_name(&mut self, name: &str) {
        self.names.push(name);
    }

    /// Current display name, empty when the window never reported one
    pub fn name(&self) -> &str {
        self.names.current().unwrap_or("")
    }

    pub fn release_names(&mut self) {
        self.names.clear();
    }

    pub fn is_hidden(&self) -> bool {
        self.flags.contains(ClientFlags::HIDDEN)
    }

    pub fn is_active(&self) -> bool {
        self.flags.contains(ClientFlags::ACTIVE)
    }

    /// Frame rectangle including the border on both sides
    pub fn outer_geometry(&self) -> Geometry {
        Geometry::new(
            self.geometry.x,
            self.geometry.y,
            self.geometry.width + self.border_width * 2,
            self.geometry.height + self.border_width * 2,
        )
    }

    /// Whether a frame-relative point lies inside the client
    pub fn contains_relative(&self, point: Point) -> bool {
        point.x >= 0
            && point.y >= 0
            && point.x < self.geometry.width as i32
            && point.y < self.geometry.height as i32
    }
}
