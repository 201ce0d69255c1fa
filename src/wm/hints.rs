//! Hints Module
//!
//! ICCCM hint decoding (WM_NORMAL_HINTS, WM_HINTS, WM_CLASS) and size
//! constraint application.

use bitflags::bitflags;

bitflags! {
    /// WM_SIZE_HINTS flags field (ICCCM 4.1.2.3)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SizeHintFlags: u32 {
        const US_POSITION = 1 << 0;
        const US_SIZE     = 1 << 1;
        const P_POSITION  = 1 << 2;
        const P_SIZE      = 1 << 3;
        const P_MIN_SIZE  = 1 << 4;
        const P_MAX_SIZE  = 1 << 5;
        const P_RESIZE_INC = 1 << 6;
        const P_ASPECT    = 1 << 7;
        const P_BASE_SIZE = 1 << 8;
        const P_WIN_GRAVITY = 1 << 9;
    }
}

/// Window gravity (X11 `win_gravity` values)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    #[default]
    NorthWest,
    North,
    NorthEast,
    West,
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
    Static,
}

impl Gravity {
    /// Decode a raw protocol value; unknown values fall back to north-west
    pub fn from_raw(value: u32) -> Self {
        match value {
            2 => Self::North,
            3 => Self::NorthEast,
            4 => Self::West,
            5 => Self::Center,
            6 => Self::East,
            7 => Self::SouthWest,
            8 => Self::South,
            9 => Self::SouthEast,
            10 => Self::Static,
            _ => Self::NorthWest,
        }
    }
}

/// Normalized size hints
///
/// Missing base size falls back to the minimum size and vice versa; increments
/// and minimum sizes are never below one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeHints {
    pub flags: SizeHintFlags,
    pub min_width: u32,
    pub min_height: u32,
    /// Zero means unbounded
    pub max_width: u32,
    pub max_height: u32,
    pub width_inc: u32,
    pub height_inc: u32,
    pub base_width: u32,
    pub base_height: u32,
    pub gravity: Gravity,
}

impl Default for SizeHints {
    fn default() -> Self {
        Self {
            flags: SizeHintFlags::empty(),
            min_width: 1,
            min_height: 1,
            max_width: 0,
            max_height: 0,
            width_inc: 1,
            height_inc: 1,
            base_width: 0,
            base_height: 0,
            gravity: Gravity::NorthWest,
        }
    }
}

impl SizeHints {
    /// Decode the 18 CARD32 values of a WM_SIZE_HINTS property
    pub fn from_raw(values: &[u32]) -> Self {
        if values.len() < 18 {
            return Self::default();
        }

        let flags = SizeHintFlags::from_bits_truncate(values[0]);
        let (raw_min_w, raw_min_h) = (values[5], values[6]);
        let (raw_base_w, raw_base_h) = (values[15], values[16]);

        let mut hints = Self {
            flags,
            ..Self::default()
        };

        if flags.contains(SizeHintFlags::P_BASE_SIZE) {
            hints.base_width = raw_base_w;
            hints.base_height = raw_base_h;
        } else if flags.contains(SizeHintFlags::P_MIN_SIZE) {
            hints.base_width = raw_min_w;
            hints.base_height = raw_min_h;
        }

        if flags.contains(SizeHintFlags::P_MIN_SIZE) {
            hints.min_width = raw_min_w;
            hints.min_height = raw_min_h;
        } else if flags.contains(SizeHintFlags::P_BASE_SIZE) {
            hints.min_width = raw_base_w;
            hints.min_height = raw_base_h;
        }

        if flags.contains(SizeHintFlags::P_MAX_SIZE) {
            hints.max_width = values[7];
            hints.max_height = values[8];
        }

        if flags.contains(SizeHintFlags::P_RESIZE_INC) {
            hints.width_inc = values[9];
            hints.height_inc = values[10];
        }

        if flags.contains(SizeHintFlags::P_WIN_GRAVITY) {
            hints.gravity = Gravity::from_raw(values[17]);
        }

        hints.normalize();
        hints
    }

    /// Build hints from explicit values (minimum size doubles as base size)
    pub fn with_limits(min: (u32, u32), max: (u32, u32), inc: (u32, u32)) -> Self {
        let mut hints = Self {
            flags: SizeHintFlags::P_MIN_SIZE | SizeHintFlags::P_MAX_SIZE | SizeHintFlags::P_RESIZE_INC,
            min_width: min.0,
            min_height: min.1,
            max_width: max.0,
            max_height: max.1,
            width_inc: inc.0,
            height_inc: inc.1,
            base_width: min.0,
            base_height: min.1,
            gravity: Gravity::NorthWest,
        };
        hints.normalize();
        hints
    }

    fn normalize(&mut self) {
        self.width_inc = self.width_inc.max(1);
        self.height_inc = self.height_inc.max(1);
        self.min_width = self.min_width.max(1);
        self.min_height = self.min_height.max(1);
    }

    /// Whether the client asked for an explicit (user or program) position
    pub fn has_position(&self) -> bool {
        self.flags
            .intersects(SizeHintFlags::US_POSITION | SizeHintFlags::P_POSITION)
    }

    /// Snap a requested size to increments and clamp it to min/max.
    ///
    /// The base size is removed before snapping so sizes land on
    /// `base + n * increment`.
    pub fn constrain(&self, width: i32, height: i32) -> (u32, u32) {
        let width = Self::constrain_axis(
            width,
            self.base_width,
            self.width_inc,
            self.min_width,
            self.max_width,
        );
        let height = Self::constrain_axis(
            height,
            self.base_height,
            self.height_inc,
            self.min_height,
            self.max_height,
        );
        (width, height)
    }

    fn constrain_axis(size: i32, base: u32, inc: u32, min: u32, max: u32) -> u32 {
        let base = base as i32;
        let inc = inc.max(1) as i32;

        let mut size = size - base;
        size -= size.rem_euclid(inc);
        size += base;

        size = size.max(min as i32);
        if max > 0 {
            size = size.min(max as i32);
        }
        size.max(1) as u32
    }
}

/// Decoded WM_HINTS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WmHints {
    /// Whether the client wants keyboard input via SetInputFocus
    pub input: bool,
    pub urgent: bool,
    pub initial_iconic: bool,
}

impl Default for WmHints {
    fn default() -> Self {
        Self {
            input: true,
            urgent: false,
            initial_iconic: false,
        }
    }
}

impl WmHints {
    const INPUT_HINT: u32 = 1 << 0;
    const STATE_HINT: u32 = 1 << 1;
    const URGENCY_HINT: u32 = 1 << 8;
    const ICONIC_STATE: u32 = 3;

    /// Decode the CARD32 values of a WM_HINTS property
    pub fn from_raw(values: &[u32]) -> Self {
        let Some(&flags) = values.first() else {
            return Self::default();
        };
        let input = if flags & Self::INPUT_HINT != 0 {
            values.get(1).copied().unwrap_or(1) != 0
        } else {
            true
        };
        let initial_iconic = flags & Self::STATE_HINT != 0
            && values.get(2).copied() == Some(Self::ICONIC_STATE);

        Self {
            input,
            urgent: flags & Self::URGENCY_HINT != 0,
            initial_iconic,
        }
    }
}

/// WM_CLASS contents
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassHint {
    /// `res_name`
    pub instance: String,
    /// `res_class`
    pub class: String,
}

impl ClassHint {
    pub fn new(instance: &str, class: &str) -> Self {
        Self {
            instance: instance.to_string(),
            class: class.to_string(),
        }
    }

    /// Decode the NUL-separated `instance\0class\0` property value
    pub fn from_raw(value: &[u8]) -> Self {
        let mut parts = value
            .split(|&b| b == 0)
            .map(|part| String::from_utf8_lossy(part).into_owned());
        let instance = parts.next().unwrap_or_default();
        let class = parts.next().unwrap_or_default();
        Self { instance, class }
    }
}
