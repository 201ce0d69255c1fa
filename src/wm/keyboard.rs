//! Keyboard Module
//!
//! Key and button bindings: binding-string parsing, the action table and
//! the key-press matching rules.

use std::str::FromStr;

use bitflags::bitflags;
use tracing::{debug, warn};

use crate::config::{BindingEntry, KeybindingsConfig, MousebindingsConfig};
use crate::wm::adapter::modifier;
use crate::wm::cycle::CycleMode;
use crate::wm::error::WmError;

/// X keysym values used by the window manager
pub mod keysym {
    pub const NO_SYMBOL: u32 = 0;
    pub const SPACE: u32 = 0x0020;
    pub const BACKSPACE: u32 = 0xff08;
    pub const TAB: u32 = 0xff09;
    pub const RETURN: u32 = 0xff0d;
    pub const ESCAPE: u32 = 0xff1b;
    pub const HOME: u32 = 0xff50;
    pub const LEFT: u32 = 0xff51;
    pub const UP: u32 = 0xff52;
    pub const RIGHT: u32 = 0xff53;
    pub const DOWN: u32 = 0xff54;
    pub const END: u32 = 0xff57;
    pub const PRINT: u32 = 0xff61;
    pub const KP_ENTER: u32 = 0xff8d;
    pub const F1: u32 = 0xffbe;
    pub const DELETE: u32 = 0xffff;
    pub const ISO_LEFT_TAB: u32 = 0xfe20;
    pub const SHIFT_L: u32 = 0xffe1;
    pub const SHIFT_R: u32 = 0xffe2;
    pub const CONTROL_L: u32 = 0xffe3;
    pub const CONTROL_R: u32 = 0xffe4;
    pub const META_L: u32 = 0xffe7;
    pub const META_R: u32 = 0xffe8;
    pub const ALT_L: u32 = 0xffe9;
    pub const ALT_R: u32 = 0xffea;
    pub const SUPER_L: u32 = 0xffeb;
    pub const SUPER_R: u32 = 0xffec;

    const NAMED: &[(&str, u32)] = &[
        ("space", SPACE),
        ("BackSpace", BACKSPACE),
        ("Tab", TAB),
        ("Return", RETURN),
        ("Escape", ESCAPE),
        ("Home", HOME),
        ("Left", LEFT),
        ("Up", UP),
        ("Right", RIGHT),
        ("Down", DOWN),
        ("End", END),
        ("Print", PRINT),
        ("KP_Enter", KP_ENTER),
        ("Delete", DELETE),
        ("exclam", 0x21),
        ("numbersign", 0x23),
        ("dollar", 0x24),
        ("percent", 0x25),
        ("ampersand", 0x26),
        ("apostrophe", 0x27),
        ("parenleft", 0x28),
        ("parenright", 0x29),
        ("asterisk", 0x2a),
        ("plus", 0x2b),
        ("comma", 0x2c),
        ("minus", 0x2d),
        ("period", 0x2e),
        ("slash", 0x2f),
        ("colon", 0x3a),
        ("semicolon", 0x3b),
        ("less", 0x3c),
        ("equal", 0x3d),
        ("greater", 0x3e),
        ("question", 0x3f),
        ("at", 0x40),
        ("bracketleft", 0x5b),
        ("backslash", 0x5c),
        ("bracketright", 0x5d),
        ("grave", 0x60),
    ];

    /// Keysym for a key name (`Return`, `F5`, `a`, `question`)
    pub fn from_name(name: &str) -> Option<u32> {
        if let Some(&(_, sym)) = NAMED.iter().find(|(n, _)| *n == name) {
            return Some(sym);
        }
        if let Some(n) = name.strip_prefix('F').and_then(|n| n.parse::<u32>().ok()) {
            if (1..=24).contains(&n) {
                return Some(F1 + n - 1);
            }
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_graphic() => Some(c as u32),
            _ => None,
        }
    }

    /// Keys whose release ends a cycling session
    pub fn ends_cycle(sym: u32) -> bool {
        matches!(
            sym,
            ALT_L | ALT_R | META_L | META_R | SUPER_L | SUPER_R | CONTROL_L | CONTROL_R
        )
    }

    /// Text produced by a printable keysym
    pub fn to_char(sym: u32) -> Option<char> {
        match sym {
            0x20..=0x7e | 0xa0..=0xff => char::from_u32(sym),
            _ => None,
        }
    }
}

/// Direction of keyboard move/resize actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Unit step on each axis
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

impl FromStr for Direction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            _ => Err(()),
        }
    }
}

/// Everything a binding can do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Terminal,
    Lock,
    ExecCommand(String),
    MenuExec,
    MenuWindow,
    MenuWindowHidden,
    MenuCommand,
    MenuGroup,
    Label,
    Hide,
    Lower,
    Raise,
    Close,
    Maximize,
    VMaximize,
    HMaximize,
    Freeze,
    Cycle { reverse: bool, mode: CycleMode },
    GroupToggle(usize),
    GroupOnly(usize),
    MoveToGroup(usize),
    GroupSlide { forward: bool },
    GroupToggleAll,
    GroupToggleMembership,
    GroupEditNew,
    GroupEditActive,
    GroupEditMember,
    GroupEditCommit,
    GroupEditAbort,
    GroupEditRename,
    Move { direction: Direction, big: bool },
    Resize { direction: Direction, big: bool },
    PointerMove { direction: Direction, big: bool },
    /// Pointer drag move
    DragMove,
    /// Pointer drag resize
    DragResize,
    Restart,
    Quit,
}

impl Action {
    /// Whether the action operates on a client
    pub fn needs_client(&self) -> bool {
        matches!(
            self,
            Action::Label
                | Action::Hide
                | Action::Lower
                | Action::Raise
                | Action::Close
                | Action::Maximize
                | Action::VMaximize
                | Action::HMaximize
                | Action::Freeze
                | Action::MoveToGroup(_)
                | Action::GroupToggleMembership
                | Action::GroupEditMember
                | Action::Move { .. }
                | Action::Resize { .. }
                | Action::DragMove
                | Action::DragResize
        )
    }

    /// Whether the action opens a group edit session
    pub fn starts_group_edit(&self) -> bool {
        matches!(self, Action::GroupEditNew | Action::GroupEditActive)
    }

    /// Keyboard flags for the action
    pub fn flags(&self) -> BindFlags {
        if self.needs_client() {
            BindFlags::CLIENT | BindFlags::FUZZY
        } else {
            BindFlags::empty()
        }
    }

    fn parse(name: &str, command: Option<&str>) -> Result<Self, WmError> {
        let unknown = || WmError::UnknownAction(name.to_string());

        let simple = match name {
            "terminal" => Some(Action::Terminal),
            "lock" => Some(Action::Lock),
            "menu-exec" => Some(Action::MenuExec),
            "menu-window" => Some(Action::MenuWindow),
            "menu-window-hidden" => Some(Action::MenuWindowHidden),
            "menu-cmd" => Some(Action::MenuCommand),
            "menu-group" => Some(Action::MenuGroup),
            "window-menu-label" => Some(Action::Label),
            "window-hide" => Some(Action::Hide),
            "window-lower" => Some(Action::Lower),
            "window-raise" => Some(Action::Raise),
            "window-close" | "window-delete" => Some(Action::Close),
            "window-maximize" => Some(Action::Maximize),
            "window-vmaximize" => Some(Action::VMaximize),
            "window-hmaximize" => Some(Action::HMaximize),
            "window-freeze" => Some(Action::Freeze),
            "window-cycle" => Some(Action::Cycle { reverse: false, mode: CycleMode::All }),
            "window-rcycle" => Some(Action::Cycle { reverse: true, mode: CycleMode::All }),
            "window-cycle-ingroup" => Some(Action::Cycle { reverse: false, mode: CycleMode::Group }),
            "window-rcycle-ingroup" => Some(Action::Cycle { reverse: true, mode: CycleMode::Group }),
            "window-cycle-inclass" => Some(Action::Cycle { reverse: false, mode: CycleMode::Class }),
            "window-rcycle-inclass" => Some(Action::Cycle { reverse: true, mode: CycleMode::Class }),
            "group-cycle" => Some(Action::GroupSlide { forward: true }),
            "group-rcycle" => Some(Action::GroupSlide { forward: false }),
            "group-toggle-all" => Some(Action::GroupToggleAll),
            "window-group" => Some(Action::GroupToggleMembership),
            "group-edit-new" => Some(Action::GroupEditNew),
            "group-edit-active" => Some(Action::GroupEditActive),
            "group-edit-member" => Some(Action::GroupEditMember),
            "group-edit-commit" => Some(Action::GroupEditCommit),
            "group-edit-abort" => Some(Action::GroupEditAbort),
            "group-edit-rename" => Some(Action::GroupEditRename),
            "window-move" => Some(Action::DragMove),
            "window-resize" => Some(Action::DragResize),
            "restart" => Some(Action::Restart),
            "quit" => Some(Action::Quit),
            "exec-command" => {
                let command = command.filter(|c| !c.trim().is_empty()).ok_or_else(unknown)?;
                Some(Action::ExecCommand(command.to_string()))
            }
            _ => None,
        };
        if let Some(action) = simple {
            return Ok(action);
        }

        let numbered = |prefix: &str| {
            name.strip_prefix(prefix)
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| (1..=9).contains(n))
        };
        if let Some(n) = numbered("group-toggle-") {
            return Ok(Action::GroupToggle(n));
        }
        if let Some(n) = numbered("group-only-") {
            return Ok(Action::GroupOnly(n));
        }
        if let Some(n) = numbered("window-movetogroup-") {
            return Ok(Action::MoveToGroup(n));
        }

        // window-move-up, window-resize-left-big, pointer-move-down
        let (rest, big) = match name.strip_suffix("-big") {
            Some(rest) => (rest, true),
            None => (name, false),
        };
        let (kind, direction) = rest.rsplit_once('-').ok_or_else(unknown)?;
        let direction: Direction = direction.parse().map_err(|_| unknown())?;
        match kind {
            "window-move" => Ok(Action::Move { direction, big }),
            "window-resize" => Ok(Action::Resize { direction, big }),
            "pointer-move" => Ok(Action::PointerMove { direction, big }),
            _ => Err(unknown()),
        }
    }
}

impl FromStr for Action {
    type Err = WmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, None)
    }
}

bitflags! {
    /// How a key binding finds its target
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BindFlags: u32 {
        /// Needs a client target
        const CLIENT = 1 << 0;
        /// Fall back to the active client when the event window is not one
        const FUZZY  = 1 << 1;
    }
}

/// Physical key of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Sym(u32),
    Code(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub modifiers: u16,
    pub key: Key,
    pub action: Action,
}

impl KeyBinding {
    pub fn flags(&self) -> BindFlags {
        self.action.flags()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseBinding {
    pub modifiers: u16,
    pub button: u8,
    pub action: Action,
}

/// Split `CM-Return` into its modifier mask and key part
fn parse_modifiers(binding: &str) -> Result<(u16, &str), WmError> {
    let bad = |reason: &str| WmError::BadBinding {
        binding: binding.to_string(),
        reason: reason.to_string(),
    };

    let Some((prefix, key)) = binding.split_once('-').filter(|(_, key)| !key.is_empty()) else {
        return Ok((0, binding));
    };

    let mut mask = 0;
    for c in prefix.chars() {
        mask |= match c {
            'C' => modifier::CONTROL,
            'M' => modifier::MOD1,
            '4' => modifier::MOD4,
            'S' => modifier::SHIFT,
            '5' => modifier::MOD5,
            _ => return Err(bad(&format!("unknown modifier `{c}`"))),
        };
    }
    Ok((mask, key))
}

/// Parse a key binding string
pub fn parse_key(binding: &str) -> Result<(u16, Key), WmError> {
    let (modifiers, key) = parse_modifiers(binding)?;
    let bad = |reason: &str| WmError::BadBinding {
        binding: binding.to_string(),
        reason: reason.to_string(),
    };

    if let Some(code) = key.strip_prefix('#') {
        let code = code.parse::<u8>().map_err(|_| bad("invalid keycode"))?;
        return Ok((modifiers, Key::Code(code)));
    }
    let sym = keysym::from_name(key).ok_or_else(|| bad("unknown key name"))?;
    Ok((modifiers, Key::Sym(sym)))
}

/// Parse a button binding string such as `M-1`
pub fn parse_button(binding: &str) -> Result<(u16, u8), WmError> {
    let (modifiers, button) = parse_modifiers(binding)?;
    let button = button
        .parse::<u8>()
        .ok()
        .filter(|b| (1..=5).contains(b))
        .ok_or_else(|| WmError::BadBinding {
            binding: binding.to_string(),
            reason: "button must be 1-5".to_string(),
        })?;
    Ok((modifiers, button))
}

const DEFAULT_KEYS: &[(&str, &str)] = &[
    ("CM-Return", "terminal"),
    ("CM-Delete", "lock"),
    ("M-question", "menu-exec"),
    ("M-slash", "menu-window"),
    ("C-slash", "menu-cmd"),
    ("M-Return", "window-hide"),
    ("M-Down", "window-lower"),
    ("M-Up", "window-raise"),
    ("CM-n", "window-menu-label"),
    ("CM-x", "window-close"),
    ("CM-m", "window-maximize"),
    ("CM-equal", "window-vmaximize"),
    ("CMS-equal", "window-hmaximize"),
    ("CMS-f", "window-freeze"),
    ("M-Tab", "window-cycle"),
    ("MS-Tab", "window-rcycle"),
    ("CM-Tab", "window-cycle-inclass"),
    ("CMS-Tab", "window-rcycle-inclass"),
    ("M-grave", "window-cycle-ingroup"),
    ("MS-grave", "window-rcycle-ingroup"),
    ("CM-1", "group-toggle-1"),
    ("CM-2", "group-toggle-2"),
    ("CM-3", "group-toggle-3"),
    ("CM-4", "group-toggle-4"),
    ("CM-5", "group-toggle-5"),
    ("CM-6", "group-toggle-6"),
    ("CM-7", "group-toggle-7"),
    ("CM-8", "group-toggle-8"),
    ("CM-9", "group-toggle-9"),
    ("M-1", "group-only-1"),
    ("M-2", "group-only-2"),
    ("M-3", "group-only-3"),
    ("M-4", "group-only-4"),
    ("M-5", "group-only-5"),
    ("M-6", "group-only-6"),
    ("M-7", "group-only-7"),
    ("M-8", "group-only-8"),
    ("M-9", "group-only-9"),
    ("CMS-1", "window-movetogroup-1"),
    ("CMS-2", "window-movetogroup-2"),
    ("CMS-3", "window-movetogroup-3"),
    ("CMS-4", "window-movetogroup-4"),
    ("CMS-5", "window-movetogroup-5"),
    ("CMS-6", "window-movetogroup-6"),
    ("CMS-7", "window-movetogroup-7"),
    ("CMS-8", "window-movetogroup-8"),
    ("CMS-9", "window-movetogroup-9"),
    ("M-Right", "group-cycle"),
    ("M-Left", "group-rcycle"),
    ("CM-0", "group-toggle-all"),
    ("CM-g", "window-group"),
    ("CM-e", "group-edit-new"),
    ("CMS-e", "group-edit-active"),
    ("M-h", "window-move-left"),
    ("M-j", "window-move-down"),
    ("M-k", "window-move-up"),
    ("M-l", "window-move-right"),
    ("MS-h", "window-move-left-big"),
    ("MS-j", "window-move-down-big"),
    ("MS-k", "window-move-up-big"),
    ("MS-l", "window-move-right-big"),
    ("CM-h", "window-resize-left"),
    ("CM-j", "window-resize-down"),
    ("CM-k", "window-resize-up"),
    ("CM-l", "window-resize-right"),
    ("CMS-h", "window-resize-left-big"),
    ("CMS-j", "window-resize-down-big"),
    ("CMS-k", "window-resize-up-big"),
    ("CMS-l", "window-resize-right-big"),
    ("C-Left", "pointer-move-left"),
    ("C-Down", "pointer-move-down"),
    ("C-Up", "pointer-move-up"),
    ("C-Right", "pointer-move-right"),
    ("CS-Left", "pointer-move-left-big"),
    ("CS-Down", "pointer-move-down-big"),
    ("CS-Up", "pointer-move-up-big"),
    ("CS-Right", "pointer-move-right-big"),
    ("CMS-r", "restart"),
    ("CMS-q", "quit"),
];

const DEFAULT_BUTTONS: &[(&str, &str)] = &[
    ("1", "menu-window-hidden"),
    ("2", "menu-group"),
    ("3", "menu-cmd"),
    ("M-1", "window-move"),
    ("CM-1", "window-group"),
    ("M-2", "window-resize"),
    ("M-3", "window-lower"),
    ("CMS-3", "window-hide"),
];

/// All key and button bindings
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    pub keys: Vec<KeyBinding>,
    pub buttons: Vec<MouseBinding>,
}

impl Bindings {
    /// Built-in bindings, then the configured entries applied in order
    pub fn from_config(keys: &KeybindingsConfig, buttons: &MousebindingsConfig) -> Self {
        let mut bindings = Self::default();

        if keys.defaults {
            for (key, action) in DEFAULT_KEYS {
                bindings.bind_key(&BindingEntry {
                    key: key.to_string(),
                    action: action.to_string(),
                    command: None,
                });
            }
        }
        if buttons.defaults {
            for (button, action) in DEFAULT_BUTTONS {
                bindings.bind_button(&BindingEntry {
                    key: button.to_string(),
                    action: action.to_string(),
                    command: None,
                });
            }
        }

        for entry in &keys.bind {
            bindings.bind_key(entry);
        }
        for entry in &buttons.bind {
            bindings.bind_button(entry);
        }

        debug!(
            "Loaded {} key and {} button bindings",
            bindings.keys.len(),
            bindings.buttons.len()
        );
        bindings
    }

    /// Add or replace a key binding; `unbind` only removes. Bad entries are
    /// logged and skipped.
    pub fn bind_key(&mut self, entry: &BindingEntry) {
        let (modifiers, key) = match parse_key(&entry.key) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Skipping key binding: {}", e);
                return;
            }
        };
        self.keys.retain(|b| !(b.modifiers == modifiers && b.key == key));
        if entry.action == "unbind" {
            return;
        }

        match Action::parse(&entry.action, entry.command.as_deref()) {
            Ok(action) => self.keys.push(KeyBinding {
                modifiers,
                key,
                action,
            }),
            Err(e) => warn!("Skipping key binding {}: {}", entry.key, e),
        }
    }

    pub fn bind_button(&mut self, entry: &BindingEntry) {
        let (modifiers, button) = match parse_button(&entry.key) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Skipping button binding: {}", e);
                return;
            }
        };
        self.buttons
            .retain(|b| !(b.modifiers == modifiers && b.button == button));
        if entry.action == "unbind" {
            return;
        }

        match Action::parse(&entry.action, entry.command.as_deref()) {
            Ok(action) => self.buttons.push(MouseBinding {
                modifiers,
                button,
                action,
            }),
            Err(e) => warn!("Skipping button binding {}: {}", entry.key, e),
        }
    }

    /// First key binding matching a key press.
    ///
    /// `syms` are the unshifted and shifted keysyms of the key. A binding on
    /// the shifted keysym matches with Shift added to its mask.
    pub fn match_key(&self, keycode: u8, state: u16, syms: (u32, u32)) -> Option<&KeyBinding> {
        let (sym, shifted) = syms;
        let state = modifier::clean(state);

        self.keys.iter().find(|binding| {
            let bound_sym = match binding.key {
                Key::Sym(s) => Some(s),
                Key::Code(_) => None,
            };
            let modshift = match bound_sym {
                Some(s) if s != sym && s == shifted => modifier::SHIFT,
                _ => 0,
            };
            if (binding.modifiers | modshift) != state {
                return false;
            }
            match binding.key {
                Key::Code(code) => code == keycode,
                Key::Sym(s) => s == if modshift != 0 { shifted } else { sym },
            }
        })
    }

    /// Button binding for a press. Client actions apply on client frames,
    /// everything else only on the bare root.
    pub fn match_button(&self, button: u8, state: u16, on_root: bool) -> Option<&MouseBinding> {
        let state = modifier::clean(state);
        self.buttons.iter().find(|b| {
            b.button == button && b.modifiers == state && b.action.needs_client() != on_root
        })
    }
}
