//! Display Adapter
//!
//! The boundary between the window-management engine and the display server.
//! The engine only ever talks to a `DisplayAdapter`; the X11 implementation
//! lives in `display.rs` and tests use a recording fake.

use anyhow::Result;

use crate::shared::{Geometry, Point};
use crate::wm::client_flags::WmProtocols;
use crate::wm::hints::{ClassHint, SizeHints, WmHints};

/// Opaque window handle
pub type Window = u32;

/// Modifier bits as carried in input event state
pub mod modifier {
    pub const SHIFT: u16 = 1 << 0;
    pub const LOCK: u16 = 1 << 1;
    pub const CONTROL: u16 = 1 << 2;
    pub const MOD1: u16 = 1 << 3;
    pub const MOD2: u16 = 1 << 4;
    pub const MOD3: u16 = 1 << 5;
    pub const MOD4: u16 = 1 << 6;
    pub const MOD5: u16 = 1 << 7;

    /// Modifiers that take part in binding matches (Lock and NumLock do not)
    pub const RELEVANT: u16 = SHIFT | CONTROL | MOD1 | MOD3 | MOD4 | MOD5;

    /// Lock-style modifiers a grab must be repeated for
    pub const IGNORED: [u16; 4] = [0, LOCK, MOD2, LOCK | MOD2];

    /// Strip lock modifiers and pointer button state
    pub fn clean(state: u16) -> u16 {
        state & RELEVANT
    }
}

/// Per-screen information reported by the adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenInfo {
    pub index: usize,
    pub root: Window,
    pub width: u32,
    pub height: u32,
}

/// Attributes of a not-yet-managed window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub geometry: Geometry,
    pub border_width: u32,
    pub screen: usize,
    /// Map state is viewable
    pub viewable: bool,
    pub override_redirect: bool,
}

/// Pointer cursor shown during a grab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    Normal,
    Move,
    Resize,
    Menu,
}

/// ICCCM WM_STATE values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WmState {
    Withdrawn,
    Normal,
    Iconic,
}

/// Client messages sent by the window manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Delete,
    TakeFocus,
}

/// Window properties the engine reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    Name,
    NormalHints,
    Hints,
    Protocols,
    Class,
    Other,
}

/// Client messages the engine reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRequest {
    /// _NET_ACTIVE_WINDOW
    Activate,
    /// _NET_CLOSE_WINDOW
    Close,
    /// WM_CHANGE_STATE with IconicState
    Iconify,
    Other,
}

/// Restacking part of a configure request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackMode {
    Above,
    Below,
}

/// ConfigureRequest fields; `None` means the field was not in the value mask
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigureRequest {
    pub window: Window,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub border_width: Option<u32>,
    pub sibling: Option<Window>,
    pub stack_mode: Option<StackMode>,
}

/// Pointer button/motion event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    /// Window the event was reported on
    pub window: Window,
    pub root: Window,
    /// Child of the event window containing the pointer, if any
    pub child: Option<Window>,
    pub root_position: Point,
    pub button: u8,
    pub state: u16,
    pub time: u32,
}

/// Keyboard event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub window: Window,
    pub root: Window,
    pub keycode: u8,
    pub state: u16,
    pub time: u32,
}

/// Event kinds used as dispatcher keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MapRequest,
    UnmapNotify,
    DestroyNotify,
    ConfigureRequest,
    PropertyNotify,
    EnterNotify,
    ButtonPress,
    ButtonRelease,
    MotionNotify,
    KeyPress,
    KeyRelease,
    Expose,
    ClientMessage,
    MappingNotify,
    ScreenChange,
}

/// Display server events, already decoded by the adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    MapRequest {
        window: Window,
        root: Window,
    },
    UnmapNotify {
        window: Window,
        synthetic: bool,
    },
    DestroyNotify {
        window: Window,
    },
    ConfigureRequest(ConfigureRequest),
    PropertyNotify {
        window: Window,
        property: Property,
    },
    EnterNotify {
        window: Window,
        root: Window,
        root_position: Point,
    },
    ButtonPress(PointerEvent),
    ButtonRelease(PointerEvent),
    MotionNotify(PointerEvent),
    KeyPress(KeyEvent),
    KeyRelease(KeyEvent),
    Expose {
        window: Window,
        count: u16,
    },
    ClientMessage {
        window: Window,
        request: ClientRequest,
    },
    MappingNotify,
    ScreenChange {
        root: Window,
        width: u32,
        height: u32,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::MapRequest { .. } => EventKind::MapRequest,
            Event::UnmapNotify { .. } => EventKind::UnmapNotify,
            Event::DestroyNotify { .. } => EventKind::DestroyNotify,
            Event::ConfigureRequest(_) => EventKind::ConfigureRequest,
            Event::PropertyNotify { .. } => EventKind::PropertyNotify,
            Event::EnterNotify { .. } => EventKind::EnterNotify,
            Event::ButtonPress(_) => EventKind::ButtonPress,
            Event::ButtonRelease(_) => EventKind::ButtonRelease,
            Event::MotionNotify(_) => EventKind::MotionNotify,
            Event::KeyPress(_) => EventKind::KeyPress,
            Event::KeyRelease(_) => EventKind::KeyRelease,
            Event::Expose { .. } => EventKind::Expose,
            Event::ClientMessage { .. } => EventKind::ClientMessage,
            Event::MappingNotify => EventKind::MappingNotify,
            Event::ScreenChange { .. } => EventKind::ScreenChange,
        }
    }

    /// The window the event is about, if any
    pub fn window(&self) -> Option<Window> {
        match self {
            Event::MapRequest { window, .. }
            | Event::UnmapNotify { window, .. }
            | Event::DestroyNotify { window }
            | Event::PropertyNotify { window, .. }
            | Event::EnterNotify { window, .. }
            | Event::Expose { window, .. }
            | Event::ClientMessage { window, .. } => Some(*window),
            Event::ConfigureRequest(request) => Some(request.window),
            Event::ButtonPress(e) | Event::ButtonRelease(e) | Event::MotionNotify(e) => {
                Some(e.window)
            }
            Event::KeyPress(e) | Event::KeyRelease(e) => Some(e.window),
            Event::MappingNotify | Event::ScreenChange { .. } => None,
        }
    }

    /// The root window the event was delivered under, if reported
    pub fn root(&self) -> Option<Window> {
        match self {
            Event::MapRequest { root, .. }
            | Event::EnterNotify { root, .. }
            | Event::ScreenChange { root, .. } => Some(*root),
            Event::ButtonPress(e) | Event::ButtonRelease(e) | Event::MotionNotify(e) => {
                Some(e.root)
            }
            Event::KeyPress(e) | Event::KeyRelease(e) => Some(e.root),
            _ => None,
        }
    }
}

/// Operations the engine needs from the display server
pub trait DisplayAdapter {
    fn screens(&self) -> Vec<ScreenInfo>;

    /// Top-level windows present before the window manager started
    fn existing_windows(&mut self, screen: usize) -> Result<Vec<Window>>;

    /// `None` when the handle no longer refers to a window
    fn window_info(&mut self, window: Window) -> Result<Option<WindowInfo>>;

    fn size_hints(&mut self, window: Window) -> Result<SizeHints>;
    fn wm_hints(&mut self, window: Window) -> Result<WmHints>;
    fn class_hint(&mut self, window: Window) -> Result<ClassHint>;
    fn window_name(&mut self, window: Window) -> Result<Option<String>>;
    fn command_line(&mut self, window: Window) -> Result<Option<String>>;
    fn protocols(&mut self, window: Window) -> Result<WmProtocols>;

    /// Create a decoration frame on a screen's root
    fn create_frame(&mut self, screen: usize, geometry: Geometry, border_width: u32) -> Result<Window>;
    fn destroy_window(&mut self, window: Window) -> Result<()>;
    fn reparent(&mut self, window: Window, parent: Window, position: Point) -> Result<()>;
    fn map_window(&mut self, window: Window) -> Result<()>;
    fn unmap_window(&mut self, window: Window) -> Result<()>;
    fn configure(&mut self, window: Window, geometry: Geometry) -> Result<()>;
    fn configure_unmanaged(&mut self, request: &ConfigureRequest) -> Result<()>;
    fn set_border(&mut self, window: Window, width: u32, pixel: u32) -> Result<()>;
    fn raise(&mut self, window: Window) -> Result<()>;
    fn lower(&mut self, window: Window) -> Result<()>;

    /// Restack windows, first entry on top
    fn restack(&mut self, windows: &[Window]) -> Result<()>;

    /// Children of a screen's root, bottom-most first
    fn stacking_order(&mut self, screen: usize) -> Result<Vec<Window>>;

    /// Focus a window, or the pointer root for `None`
    fn set_focus(&mut self, window: Option<Window>) -> Result<()>;
    fn send_protocol(&mut self, window: Window, protocol: Protocol) -> Result<()>;
    fn kill_client(&mut self, window: Window) -> Result<()>;
    fn send_configure_notify(&mut self, window: Window, geometry: Geometry, border_width: u32) -> Result<()>;
    fn set_wm_state(&mut self, window: Window, state: WmState) -> Result<()>;
    fn set_active_window(&mut self, screen: usize, window: Option<Window>) -> Result<()>;

    fn query_pointer(&mut self, screen: usize) -> Result<Point>;
    fn warp_pointer(&mut self, screen: usize, position: Point) -> Result<()>;

    /// `Ok(false)` when another client holds the grab
    fn grab_pointer(&mut self, screen: usize, cursor: CursorKind) -> Result<bool>;
    fn ungrab_pointer(&mut self) -> Result<()>;
    /// `Ok(false)` when another client holds the grab
    fn grab_keyboard(&mut self, screen: usize) -> Result<bool>;
    fn ungrab_keyboard(&mut self) -> Result<()>;
    fn grab_key(&mut self, screen: usize, modifiers: u16, keycode: u8) -> Result<()>;
    fn ungrab_keys(&mut self, screen: usize) -> Result<()>;
    fn grab_button(&mut self, window: Window, modifiers: u16, button: u8) -> Result<()>;

    /// Unshifted and shifted keysym of a physical key
    fn keysyms(&self, keycode: u8) -> (u32, u32);
    /// Keycodes producing a keysym in either level
    fn keycodes(&self, keysym: u32) -> Vec<u8>;
    fn refresh_keyboard_mapping(&mut self) -> Result<()>;

    /// Show (or redraw) the screen's text overlay and return its window
    fn show_overlay(
        &mut self,
        screen: usize,
        origin: Point,
        lines: &[String],
        selected: Option<usize>,
    ) -> Result<Window>;
    fn hide_overlay(&mut self, screen: usize) -> Result<()>;
    /// Height of one overlay text line in pixels
    fn overlay_line_height(&self) -> u32;

    /// Next queued event without blocking
    fn poll_event(&mut self) -> Result<Option<Event>>;

    fn flush(&mut self) -> Result<()>;
}
