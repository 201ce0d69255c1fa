//! Recording display used by engine tests.

use std::collections::{HashMap, VecDeque};

use anyhow::Result;

use crate::shared::{Geometry, Point};
use crate::wm::adapter::{
    ConfigureRequest, CursorKind, DisplayAdapter, Event, Protocol, ScreenInfo, Window, WindowInfo,
    WmState,
};
use crate::wm::client_flags::WmProtocols;
use crate::wm::hints::{ClassHint, SizeHints, WmHints};
use crate::wm::keyboard::keysym;

/// Side effects requested by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateFrame(Window),
    Destroy(Window),
    Reparent(Window, Window, Point),
    Map(Window),
    Unmap(Window),
    Configure(Window, Geometry),
    ConfigureUnmanaged(Window),
    Border(Window, u32, u32),
    Raise(Window),
    Lower(Window),
    Restack(Vec<Window>),
    Focus(Option<Window>),
    Protocol(Window, Protocol),
    Kill(Window),
    ConfigureNotify(Window),
    State(Window, WmState),
    ActiveWindow(usize, Option<Window>),
    Warp(usize, Point),
    GrabPointer(CursorKind),
    UngrabPointer,
    GrabKeyboard,
    UngrabKeyboard,
    GrabKey(u16, u8),
    UngrabKeys(usize),
    GrabButton(Window, u16, u8),
    Overlay(usize, Vec<String>, Option<usize>),
    HideOverlay(usize),
}

/// Properties of a simulated top-level window
#[derive(Debug, Clone)]
pub struct FakeWindow {
    pub info: WindowInfo,
    pub name: Option<String>,
    pub class: ClassHint,
    pub size_hints: SizeHints,
    pub wm_hints: WmHints,
    pub protocols: WmProtocols,
    pub command: Option<String>,
}

impl FakeWindow {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            info: WindowInfo {
                geometry,
                border_width: 0,
                screen: 0,
                viewable: false,
                override_redirect: false,
            },
            name: None,
            class: ClassHint::default(),
            size_hints: SizeHints::default(),
            wm_hints: WmHints::default(),
            protocols: WmProtocols::empty(),
            command: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn class(mut self, instance: &str, class: &str) -> Self {
        self.class = ClassHint::new(instance, class);
        self
    }
}

pub const ROOT: Window = 1;
pub const OVERLAY: Window = 2;

#[derive(Debug)]
pub struct FakeDisplay {
    pub calls: Vec<Call>,
    pub screens: Vec<ScreenInfo>,
    pub windows: HashMap<Window, FakeWindow>,
    /// Root children, bottom-most first
    pub stack: Vec<Window>,
    pub pointer: Point,
    pub grabs_fail: bool,
    /// Events returned by `poll_event`
    pub events: VecDeque<Event>,
    keymap: HashMap<u8, (u32, u32)>,
    next_frame: Window,
}

impl FakeDisplay {
    /// One 1280x800 screen with a small US keymap
    pub fn new() -> Self {
        let mut keymap = HashMap::new();
        keymap.insert(9, (keysym::ESCAPE, keysym::ESCAPE));
        keymap.insert(22, (keysym::BACKSPACE, keysym::BACKSPACE));
        keymap.insert(23, (keysym::TAB, keysym::ISO_LEFT_TAB));
        keymap.insert(36, (keysym::RETURN, keysym::RETURN));
        keymap.insert(37, (keysym::CONTROL_L, keysym::CONTROL_L));
        keymap.insert(50, (keysym::SHIFT_L, keysym::SHIFT_L));
        keymap.insert(64, (keysym::ALT_L, keysym::META_L));
        keymap.insert(65, (keysym::SPACE, keysym::SPACE));
        keymap.insert(111, (keysym::UP, keysym::UP));
        keymap.insert(116, (keysym::DOWN, keysym::DOWN));
        keymap.insert(133, (keysym::SUPER_L, keysym::SUPER_L));
        for (i, c) in "1234567890".chars().enumerate() {
            keymap.insert(10 + i as u8, (c as u32, c as u32));
        }
        for (row, start) in [("qwertyuiop", 24u8), ("asdfghjkl", 38), ("zxcvbnm", 52)] {
            for (i, c) in row.chars().enumerate() {
                let lower = c as u32;
                let upper = c.to_ascii_uppercase() as u32;
                keymap.insert(start + i as u8, (lower, upper));
            }
        }

        Self {
            calls: Vec::new(),
            screens: vec![ScreenInfo {
                index: 0,
                root: ROOT,
                width: 1280,
                height: 800,
            }],
            windows: HashMap::new(),
            stack: Vec::new(),
            pointer: Point::new(640, 400),
            grabs_fail: false,
            events: VecDeque::new(),
            keymap,
            next_frame: 0x1000,
        }
    }

    /// Register a top-level window that can later be mapped
    pub fn add_window(&mut self, window: Window, fake: FakeWindow) {
        self.windows.insert(window, fake);
    }

    /// Keycode for a keysym in the fake keymap
    pub fn keycode(&self, sym: u32) -> u8 {
        self.keycodes(sym).first().copied().unwrap_or(0)
    }

    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    fn move_to_top(&mut self, window: Window) {
        self.stack.retain(|&w| w != window);
        self.stack.push(window);
    }
}

impl Default for FakeDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayAdapter for FakeDisplay {
    fn screens(&self) -> Vec<ScreenInfo> {
        self.screens.clone()
    }

    fn existing_windows(&mut self, _screen: usize) -> Result<Vec<Window>> {
        let mut windows: Vec<Window> = self.windows.keys().copied().collect();
        windows.sort_unstable();
        Ok(windows)
    }

    fn window_info(&mut self, window: Window) -> Result<Option<WindowInfo>> {
        Ok(self.windows.get(&window).map(|w| w.info.clone()))
    }

    fn size_hints(&mut self, window: Window) -> Result<SizeHints> {
        Ok(self.windows.get(&window).map(|w| w.size_hints.clone()).unwrap_or_default())
    }

    fn wm_hints(&mut self, window: Window) -> Result<WmHints> {
        Ok(self.windows.get(&window).map(|w| w.wm_hints).unwrap_or_default())
    }

    fn class_hint(&mut self, window: Window) -> Result<ClassHint> {
        Ok(self.windows.get(&window).map(|w| w.class.clone()).unwrap_or_default())
    }

    fn window_name(&mut self, window: Window) -> Result<Option<String>> {
        Ok(self.windows.get(&window).and_then(|w| w.name.clone()))
    }

    fn command_line(&mut self, window: Window) -> Result<Option<String>> {
        Ok(self.windows.get(&window).and_then(|w| w.command.clone()))
    }

    fn protocols(&mut self, window: Window) -> Result<WmProtocols> {
        Ok(self.windows.get(&window).map(|w| w.protocols).unwrap_or_default())
    }

    fn create_frame(&mut self, _screen: usize, _geometry: Geometry, _border_width: u32) -> Result<Window> {
        self.next_frame += 1;
        let frame = self.next_frame;
        self.stack.push(frame);
        self.calls.push(Call::CreateFrame(frame));
        Ok(frame)
    }

    fn destroy_window(&mut self, window: Window) -> Result<()> {
        self.stack.retain(|&w| w != window);
        self.calls.push(Call::Destroy(window));
        Ok(())
    }

    fn reparent(&mut self, window: Window, parent: Window, position: Point) -> Result<()> {
        self.calls.push(Call::Reparent(window, parent, position));
        Ok(())
    }

    fn map_window(&mut self, window: Window) -> Result<()> {
        self.calls.push(Call::Map(window));
        Ok(())
    }

    fn unmap_window(&mut self, window: Window) -> Result<()> {
        self.calls.push(Call::Unmap(window));
        Ok(())
    }

    fn configure(&mut self, window: Window, geometry: Geometry) -> Result<()> {
        self.calls.push(Call::Configure(window, geometry));
        Ok(())
    }

    fn configure_unmanaged(&mut self, request: &ConfigureRequest) -> Result<()> {
        self.calls.push(Call::ConfigureUnmanaged(request.window));
        Ok(())
    }

    fn set_border(&mut self, window: Window, width: u32, pixel: u32) -> Result<()> {
        self.calls.push(Call::Border(window, width, pixel));
        Ok(())
    }

    fn raise(&mut self, window: Window) -> Result<()> {
        self.move_to_top(window);
        self.calls.push(Call::Raise(window));
        Ok(())
    }

    fn lower(&mut self, window: Window) -> Result<()> {
        self.stack.retain(|&w| w != window);
        self.stack.insert(0, window);
        self.calls.push(Call::Lower(window));
        Ok(())
    }

    fn restack(&mut self, windows: &[Window]) -> Result<()> {
        if let Some((&top, rest)) = windows.split_first() {
            self.stack.retain(|w| !rest.contains(w));
            let pos = self.stack.iter().position(|&w| w == top).unwrap_or(self.stack.len());
            // each following window goes directly below the previous one
            for &w in rest {
                self.stack.insert(pos, w);
            }
        }
        self.calls.push(Call::Restack(windows.to_vec()));
        Ok(())
    }

    fn stacking_order(&mut self, _screen: usize) -> Result<Vec<Window>> {
        Ok(self.stack.clone())
    }

    fn set_focus(&mut self, window: Option<Window>) -> Result<()> {
        self.calls.push(Call::Focus(window));
        Ok(())
    }

    fn send_protocol(&mut self, window: Window, protocol: Protocol) -> Result<()> {
        self.calls.push(Call::Protocol(window, protocol));
        Ok(())
    }

    fn kill_client(&mut self, window: Window) -> Result<()> {
        self.calls.push(Call::Kill(window));
        Ok(())
    }

    fn send_configure_notify(&mut self, window: Window, _geometry: Geometry, _border_width: u32) -> Result<()> {
        self.calls.push(Call::ConfigureNotify(window));
        Ok(())
    }

    fn set_wm_state(&mut self, window: Window, state: WmState) -> Result<()> {
        self.calls.push(Call::State(window, state));
        Ok(())
    }

    fn set_active_window(&mut self, screen: usize, window: Option<Window>) -> Result<()> {
        self.calls.push(Call::ActiveWindow(screen, window));
        Ok(())
    }

    fn query_pointer(&mut self, _screen: usize) -> Result<Point> {
        Ok(self.pointer)
    }

    fn warp_pointer(&mut self, screen: usize, position: Point) -> Result<()> {
        self.pointer = position;
        self.calls.push(Call::Warp(screen, position));
        Ok(())
    }

    fn grab_pointer(&mut self, _screen: usize, cursor: CursorKind) -> Result<bool> {
        if self.grabs_fail {
            return Ok(false);
        }
        self.calls.push(Call::GrabPointer(cursor));
        Ok(true)
    }

    fn ungrab_pointer(&mut self) -> Result<()> {
        self.calls.push(Call::UngrabPointer);
        Ok(())
    }

    fn grab_keyboard(&mut self, _screen: usize) -> Result<bool> {
        if self.grabs_fail {
            return Ok(false);
        }
        self.calls.push(Call::GrabKeyboard);
        Ok(true)
    }

    fn ungrab_keyboard(&mut self) -> Result<()> {
        self.calls.push(Call::UngrabKeyboard);
        Ok(())
    }

    fn grab_key(&mut self, _screen: usize, modifiers: u16, keycode: u8) -> Result<()> {
        self.calls.push(Call::GrabKey(modifiers, keycode));
        Ok(())
    }

    fn ungrab_keys(&mut self, screen: usize) -> Result<()> {
        self.calls.push(Call::UngrabKeys(screen));
        Ok(())
    }

    fn grab_button(&mut self, window: Window, modifiers: u16, button: u8) -> Result<()> {
        self.calls.push(Call::GrabButton(window, modifiers, button));
        Ok(())
    }

    fn keysyms(&self, keycode: u8) -> (u32, u32) {
        self.keymap.get(&keycode).copied().unwrap_or((keysym::NO_SYMBOL, keysym::NO_SYMBOL))
    }

    fn keycodes(&self, sym: u32) -> Vec<u8> {
        let mut codes: Vec<u8> = self
            .keymap
            .iter()
            .filter(|&(_, &(lower, upper))| lower == sym || upper == sym)
            .map(|(&code, _)| code)
            .collect();
        codes.sort_unstable();
        codes
    }

    fn refresh_keyboard_mapping(&mut self) -> Result<()> {
        Ok(())
    }

    fn show_overlay(
        &mut self,
        screen: usize,
        _origin: Point,
        lines: &[String],
        selected: Option<usize>,
    ) -> Result<Window> {
        self.calls.push(Call::Overlay(screen, lines.to_vec(), selected));
        Ok(OVERLAY)
    }

    fn hide_overlay(&mut self, screen: usize) -> Result<()> {
        self.calls.push(Call::HideOverlay(screen));
        Ok(())
    }

    fn overlay_line_height(&self) -> u32 {
        14
    }

    fn poll_event(&mut self) -> Result<Option<Event>> {
        Ok(self.events.pop_front())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
