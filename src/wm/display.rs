//! Display Module
//!
//! The X11 side of the display adapter: connection setup, cursors, the
//! overlay windows used for menus and readouts, keyboard mapping, grabs, and
//! translation of protocol events into engine events.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use x11rb::connection::{Connection, RequestConnection as _};
use x11rb::errors::ReplyError;
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{self as xp, ConnectionExt as _};
use x11rb::protocol::Event as XEvent;
use x11rb::rust_connection::RustConnection;
use x11rb::{COPY_DEPTH_FROM_PARENT, COPY_FROM_PARENT, CURRENT_TIME, NONE};

use crate::config::ColorConfig;
use crate::shared::{Geometry, Point};
use crate::wm::adapter::{
    ClientRequest, ConfigureRequest, CursorKind, DisplayAdapter, Event, KeyEvent, PointerEvent,
    Property, Protocol, ScreenInfo, StackMode, Window, WindowInfo, WmState,
};
use crate::wm::client_flags::WmProtocols;
use crate::wm::error::WmError;
use crate::wm::ewmh::{self, Atoms};
use crate::wm::hints::{ClassHint, SizeHints, WmHints};

/// Focus target meaning "whatever is under the pointer"
const POINTER_ROOT: Window = 1;

/// Horizontal padding inside the overlay
const OVERLAY_PADDING: u32 = 4;

/// Longest string a core text request carries
const MAX_TEXT: usize = 255;

/// Cursor font glyphs
mod glyph {
    pub const LEFT_PTR: u16 = 68;
    pub const FLEUR: u16 = 52;
    pub const SIZING: u16 = 120;
    pub const TOP_LEFT_ARROW: u16 = 132;
}

/// Cursors shown during grabs
#[derive(Debug)]
struct Cursors {
    normal: u32,
    moving: u32,
    resize: u32,
    menu: u32,
}

impl Cursors {
    fn new(conn: &RustConnection) -> Result<Self> {
        let font = conn.generate_id()?;
        conn.open_font(font, b"cursor")?;

        let create_cursor = |glyph_id: u16| -> Result<u32> {
            let cursor_id = conn.generate_id()?;
            conn.create_glyph_cursor(
                cursor_id,
                font,
                font,
                glyph_id,
                glyph_id + 1,
                0,
                0,
                0,
                0xffff,
                0xffff,
                0xffff,
            )?;
            Ok(cursor_id)
        };

        let cursors = Self {
            normal: create_cursor(glyph::LEFT_PTR)?,
            moving: create_cursor(glyph::FLEUR)?,
            resize: create_cursor(glyph::SIZING)?,
            menu: create_cursor(glyph::TOP_LEFT_ARROW)?,
        };
        conn.close_font(font)?;
        Ok(cursors)
    }

    fn get(&self, kind: CursorKind) -> u32 {
        match kind {
            CursorKind::Normal => self.normal,
            CursorKind::Move => self.moving,
            CursorKind::Resize => self.resize,
            CursorKind::Menu => self.menu,
        }
    }
}

/// Server keyboard mapping
#[derive(Debug, Default, Clone)]
struct Keymap {
    min_keycode: u8,
    per_keycode: u8,
    keysyms: Vec<u32>,
}

impl Keymap {
    fn load(conn: &RustConnection) -> Result<Self> {
        let setup = conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let reply = conn
            .get_keyboard_mapping(min, max - min + 1)?
            .reply()
            .context("Failed to read keyboard mapping")?;
        debug!(
            "Keyboard mapping: keycodes {}..={}, {} keysyms each",
            min, max, reply.keysyms_per_keycode
        );
        Ok(Self {
            min_keycode: min,
            per_keycode: reply.keysyms_per_keycode,
            keysyms: reply.keysyms,
        })
    }

    /// First two levels of a key; a missing shifted level repeats the first
    fn keysyms(&self, keycode: u8) -> (u32, u32) {
        if keycode < self.min_keycode || self.per_keycode == 0 {
            return (0, 0);
        }
        let start = (keycode - self.min_keycode) as usize * self.per_keycode as usize;
        let lower = self.keysyms.get(start).copied().unwrap_or(0);
        let upper = match self.keysyms.get(start + 1).copied() {
            Some(0) | None => lower,
            Some(sym) if self.per_keycode > 1 => sym,
            Some(_) => lower,
        };
        (lower, upper)
    }

    fn keycodes(&self, keysym: u32) -> Vec<u8> {
        if self.per_keycode == 0 {
            return Vec::new();
        }
        self.keysyms
            .chunks(self.per_keycode as usize)
            .enumerate()
            .filter(|(_, syms)| syms.iter().take(2).any(|&s| s == keysym))
            .filter_map(|(i, _)| u8::try_from(i + self.min_keycode as usize).ok())
            .collect()
    }
}

/// Metrics of the overlay font
#[derive(Debug, Clone, Copy)]
struct FontMetrics {
    ascent: u32,
    line_height: u32,
    char_width: u32,
}

/// A screen's text overlay and what it last showed
#[derive(Debug)]
struct Overlay {
    window: Window,
    gc: u32,
    width: u32,
    lines: Vec<String>,
    selected: Option<usize>,
    mapped: bool,
}

/// X11 implementation of the display adapter
pub struct X11Display {
    conn: Arc<RustConnection>,
    atoms: Atoms,
    screens: Vec<ScreenInfo>,
    colormap: u32,
    cursors: Cursors,
    keymap: Keymap,
    font: FontMetrics,
    colors: ColorConfig,
    overlays: Vec<Overlay>,
    /// Supporting-WM check window
    check: Window,
    /// Allocated pixels by 0xRRGGBB value
    pixels: HashMap<u32, u32>,
    /// Timestamp of the last input event
    time: u32,
}

impl X11Display {
    /// Connect, claim substructure redirect on every screen and set up the
    /// window manager's own windows.
    pub fn connect(display_name: Option<&str>, font_name: &str, colors: &ColorConfig) -> Result<Self> {
        let (conn, default_screen) =
            x11rb::connect(display_name).context("Failed to connect to X server")?;
        let conn = Arc::new(conn);
        info!(
            "Connected to X server (default screen {}, {} screen(s))",
            default_screen,
            conn.setup().roots.len()
        );

        let root_mask = xp::EventMask::SUBSTRUCTURE_REDIRECT
            | xp::EventMask::SUBSTRUCTURE_NOTIFY
            | xp::EventMask::ENTER_WINDOW
            | xp::EventMask::PROPERTY_CHANGE
            | xp::EventMask::BUTTON_PRESS;
        for (index, screen) in conn.setup().roots.iter().enumerate() {
            let aux = xp::ChangeWindowAttributesAux::new().event_mask(root_mask);
            if conn.change_window_attributes(screen.root, &aux)?.check().is_err() {
                return Err(WmError::OtherWmRunning(index).into());
            }
        }

        let atoms = Atoms::new(conn.as_ref())?;
        let cursors = Cursors::new(conn.as_ref())?;
        let keymap = Keymap::load(conn.as_ref())?;

        let font_id = conn.generate_id()?;
        conn.open_font(font_id, font_name.as_bytes())?
            .check()
            .with_context(|| format!("Failed to open font {:?}", font_name))?;
        let metrics = conn.query_font(font_id)?.reply()?;
        let font = FontMetrics {
            ascent: metrics.font_ascent.max(0) as u32,
            line_height: (metrics.font_ascent + metrics.font_descent).max(1) as u32,
            char_width: metrics.max_bounds.character_width.max(1) as u32,
        };
        debug!("Overlay font {:?}: {:?}", font_name, font);

        let have_randr = conn
            .extension_information(randr::X11_EXTENSION_NAME)?
            .is_some();

        let first = &conn.setup().roots[0];
        let colormap = first.default_colormap;
        let check = conn.generate_id()?;
        conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            check,
            first.root,
            -1,
            -1,
            1,
            1,
            0,
            xp::WindowClass::INPUT_OUTPUT,
            COPY_FROM_PARENT,
            &xp::CreateWindowAux::new().override_redirect(1),
        )?;

        let mut display = Self {
            conn: Arc::clone(&conn),
            atoms,
            screens: Vec::new(),
            colormap,
            cursors,
            keymap,
            font,
            colors: colors.clone(),
            overlays: Vec::new(),
            check,
            pixels: HashMap::new(),
            time: CURRENT_TIME,
        };

        let roots: Vec<(Window, u16, u16)> = conn
            .setup()
            .roots
            .iter()
            .map(|s| (s.root, s.width_in_pixels, s.height_in_pixels))
            .collect();
        for (index, (root, width, height)) in roots.into_iter().enumerate() {
            display.screens.push(ScreenInfo {
                index,
                root,
                width: width as u32,
                height: height as u32,
            });

            display.atoms.setup_supported(conn.as_ref(), root, check)?;
            let cursor = xp::ChangeWindowAttributesAux::new().cursor(display.cursors.normal);
            conn.change_window_attributes(root, &cursor)?;
            if have_randr {
                conn.randr_select_input(root, randr::NotifyMask::SCREEN_CHANGE)?;
            }

            let overlay = display.create_overlay(root, font_id)?;
            display.overlays.push(overlay);
        }

        conn.flush()?;
        Ok(display)
    }

    /// Shared connection, for the event stream
    pub fn connection(&self) -> Arc<RustConnection> {
        Arc::clone(&self.conn)
    }

    fn create_overlay(&mut self, root: Window, font: u32) -> Result<Overlay> {
        let background = self.pixel(self.colors.menu_background)?;
        let foreground = self.pixel(self.colors.menu_foreground)?;

        let window = self.conn.generate_id()?;
        let aux = xp::CreateWindowAux::new()
            .background_pixel(background)
            .border_pixel(foreground)
            .override_redirect(1)
            .backing_store(xp::BackingStore::WHEN_MAPPED)
            .event_mask(xp::EventMask::EXPOSURE);
        self.conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            window,
            root,
            0,
            0,
            1,
            1,
            1,
            xp::WindowClass::INPUT_OUTPUT,
            COPY_FROM_PARENT,
            &aux,
        )?;

        let gc = self.conn.generate_id()?;
        let aux = xp::CreateGCAux::new()
            .foreground(foreground)
            .background(background)
            .font(font);
        self.conn.create_gc(gc, window, &aux)?;

        Ok(Overlay {
            window,
            gc,
            width: 1,
            lines: Vec::new(),
            selected: None,
            mapped: false,
        })
    }

    /// Pixel for a 0xRRGGBB color, allocated once
    fn pixel(&mut self, rgb: u32) -> Result<u32> {
        if let Some(&pixel) = self.pixels.get(&rgb) {
            return Ok(pixel);
        }
        let scale = |c: u32| ((c & 0xff) * 0x101) as u16;
        let reply = self
            .conn
            .alloc_color(self.colormap, scale(rgb >> 16), scale(rgb >> 8), scale(rgb))?
            .reply()
            .with_context(|| format!("Failed to allocate color #{:06x}", rgb))?;
        self.pixels.insert(rgb, reply.pixel);
        Ok(reply.pixel)
    }

    fn root(&self, screen: usize) -> Result<Window> {
        self.screens
            .get(screen)
            .map(|s| s.root)
            .with_context(|| format!("No screen {}", screen))
    }

    fn is_root(&self, window: Window) -> bool {
        self.screens.iter().any(|s| s.root == window)
    }

    /// Property reply, or `None` if the window is gone or the property unset
    fn property(&self, window: Window, property: u32, type_: u32) -> Result<Option<xp::GetPropertyReply>> {
        match self.conn.get_property(false, window, property, type_, 0, 1024)?.reply() {
            Ok(reply) if reply.type_ != NONE => Ok(Some(reply)),
            Ok(_) | Err(ReplyError::X11Error(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn property32(&self, window: Window, property: u32, type_: u32) -> Result<Vec<u32>> {
        Ok(self
            .property(window, property, type_)?
            .and_then(|reply| reply.value32().map(|values| values.collect()))
            .unwrap_or_default())
    }

    fn draw_overlay(&mut self, screen: usize) -> Result<()> {
        let background = self.pixel(self.colors.menu_background)?;
        let foreground = self.pixel(self.colors.menu_foreground)?;
        let selection = self.pixel(self.colors.menu_selection)?;
        let font = self.font;
        let Some(overlay) = self.overlays.get(screen) else {
            return Ok(());
        };

        self.conn.clear_area(false, overlay.window, 0, 0, 0, 0)?;
        for (i, line) in overlay.lines.iter().enumerate() {
            let top = (i as u32 * font.line_height) as i16;
            let fill = if overlay.selected == Some(i) {
                let rect = xp::Rectangle {
                    x: 0,
                    y: top,
                    width: overlay.width as u16,
                    height: font.line_height as u16,
                };
                let aux = xp::ChangeGCAux::new().foreground(selection);
                self.conn.change_gc(overlay.gc, &aux)?;
                self.conn.poly_fill_rectangle(overlay.window, overlay.gc, &[rect])?;
                selection
            } else {
                background
            };
            let aux = xp::ChangeGCAux::new().foreground(foreground).background(fill);
            self.conn.change_gc(overlay.gc, &aux)?;
            self.conn.image_text8(
                overlay.window,
                overlay.gc,
                OVERLAY_PADDING as i16,
                top + font.ascent as i16,
                &latin1(line),
            )?;
        }
        Ok(())
    }

    /// Decode a protocol event; `None` for events the engine has no use for
    fn translate(&mut self, event: XEvent) -> Result<Option<Event>> {
        let translated = match event {
            XEvent::MapRequest(e) => Event::MapRequest {
                window: e.window,
                root: e.parent,
            },
            XEvent::UnmapNotify(e) => Event::UnmapNotify {
                window: e.window,
                synthetic: e.response_type & 0x80 != 0,
            },
            XEvent::DestroyNotify(e) => Event::DestroyNotify { window: e.window },
            XEvent::ConfigureRequest(e) => Event::ConfigureRequest(configure_request(&e)),
            XEvent::PropertyNotify(e) => Event::PropertyNotify {
                window: e.window,
                property: self.property_kind(e.atom),
            },
            XEvent::EnterNotify(e) => {
                if e.mode != xp::NotifyMode::NORMAL {
                    return Ok(None);
                }
                Event::EnterNotify {
                    window: e.event,
                    root: e.root,
                    root_position: Point::new(e.root_x as i32, e.root_y as i32),
                }
            }
            XEvent::ButtonPress(e) => {
                self.time = e.time;
                Event::ButtonPress(pointer_event(&e, e.detail))
            }
            XEvent::ButtonRelease(e) => {
                self.time = e.time;
                Event::ButtonRelease(pointer_event(&e, e.detail))
            }
            XEvent::MotionNotify(e) => Event::MotionNotify(PointerEvent {
                window: e.event,
                root: e.root,
                child: (e.child != NONE).then_some(e.child),
                root_position: Point::new(e.root_x as i32, e.root_y as i32),
                button: 0,
                state: u16::from(e.state),
                time: e.time,
            }),
            XEvent::KeyPress(e) => {
                self.time = e.time;
                Event::KeyPress(key_event(&e))
            }
            XEvent::KeyRelease(e) => {
                self.time = e.time;
                Event::KeyRelease(key_event(&e))
            }
            XEvent::Expose(e) => {
                if e.count == 0 {
                    if let Some(screen) = self.overlays.iter().position(|o| o.window == e.window) {
                        self.draw_overlay(screen)?;
                        return Ok(None);
                    }
                }
                Event::Expose {
                    window: e.window,
                    count: e.count,
                }
            }
            XEvent::ClientMessage(e) => {
                if e.format != 32 {
                    return Ok(None);
                }
                let data = e.data.as_data32();
                let request = if e.type_ == self.atoms.net_active_window {
                    ClientRequest::Activate
                } else if e.type_ == self.atoms.net_close_window {
                    ClientRequest::Close
                } else if e.type_ == self.atoms.wm_change_state && data[0] == ewmh::ICONIC_STATE {
                    ClientRequest::Iconify
                } else {
                    ClientRequest::Other
                };
                Event::ClientMessage {
                    window: e.window,
                    request,
                }
            }
            XEvent::MappingNotify(e) => {
                if e.request == xp::Mapping::POINTER {
                    return Ok(None);
                }
                Event::MappingNotify
            }
            XEvent::RandrScreenChangeNotify(e) => {
                let (width, height) = (e.width as u32, e.height as u32);
                if let Some(screen) = self.screens.iter_mut().find(|s| s.root == e.root) {
                    screen.width = width;
                    screen.height = height;
                }
                Event::ScreenChange {
                    root: e.root,
                    width,
                    height,
                }
            }
            XEvent::Error(e) => {
                debug!("X11 error: {:?} (request {})", e.error_kind, e.major_opcode);
                return Ok(None);
            }
            _ => return Ok(None),
        };
        Ok(Some(translated))
    }

    fn property_kind(&self, atom: u32) -> Property {
        if atom == u32::from(xp::AtomEnum::WM_NAME) || atom == self.atoms.net_wm_name {
            Property::Name
        } else if atom == u32::from(xp::AtomEnum::WM_NORMAL_HINTS) {
            Property::NormalHints
        } else if atom == u32::from(xp::AtomEnum::WM_HINTS) {
            Property::Hints
        } else if atom == self.atoms.wm_protocols {
            Property::Protocols
        } else if atom == u32::from(xp::AtomEnum::WM_CLASS) {
            Property::Class
        } else {
            Property::Other
        }
    }
}

fn configure_request(e: &xp::ConfigureRequestEvent) -> ConfigureRequest {
    let has = |flag: xp::ConfigWindow| e.value_mask.contains(flag);
    ConfigureRequest {
        window: e.window,
        x: has(xp::ConfigWindow::X).then_some(e.x as i32),
        y: has(xp::ConfigWindow::Y).then_some(e.y as i32),
        width: has(xp::ConfigWindow::WIDTH).then_some(e.width as u32),
        height: has(xp::ConfigWindow::HEIGHT).then_some(e.height as u32),
        border_width: has(xp::ConfigWindow::BORDER_WIDTH).then_some(e.border_width as u32),
        sibling: has(xp::ConfigWindow::SIBLING).then_some(e.sibling),
        stack_mode: if has(xp::ConfigWindow::STACK_MODE) {
            match e.stack_mode {
                xp::StackMode::ABOVE => Some(StackMode::Above),
                xp::StackMode::BELOW => Some(StackMode::Below),
                _ => None,
            }
        } else {
            None
        },
    }
}

fn pointer_event(e: &xp::ButtonPressEvent, button: u8) -> PointerEvent {
    PointerEvent {
        window: e.event,
        root: e.root,
        child: (e.child != NONE).then_some(e.child),
        root_position: Point::new(e.root_x as i32, e.root_y as i32),
        button,
        state: u16::from(e.state),
        time: e.time,
    }
}

fn key_event(e: &xp::KeyPressEvent) -> KeyEvent {
    KeyEvent {
        window: e.event,
        root: e.root,
        keycode: e.detail,
        state: u16::from(e.state),
        time: e.time,
    }
}

/// Text for core font requests: non-Latin-1 characters become '?'
fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .take(MAX_TEXT)
        .collect()
}

impl DisplayAdapter for X11Display {
    fn screens(&self) -> Vec<ScreenInfo> {
        self.screens.clone()
    }

    fn existing_windows(&mut self, screen: usize) -> Result<Vec<Window>> {
        let own: Vec<Window> = self.overlays.iter().map(|o| o.window).chain([self.check]).collect();
        Ok(self
            .stacking_order(screen)?
            .into_iter()
            .filter(|w| !own.contains(w))
            .collect())
    }

    fn window_info(&mut self, window: Window) -> Result<Option<WindowInfo>> {
        let attributes = match self.conn.get_window_attributes(window)?.reply() {
            Ok(reply) => reply,
            Err(ReplyError::X11Error(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let geometry = match self.conn.get_geometry(window)?.reply() {
            Ok(reply) => reply,
            Err(ReplyError::X11Error(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let screen = self
            .screens
            .iter()
            .position(|s| s.root == geometry.root)
            .unwrap_or(0);

        Ok(Some(WindowInfo {
            geometry: Geometry::new(
                geometry.x as i32,
                geometry.y as i32,
                geometry.width as u32,
                geometry.height as u32,
            ),
            border_width: geometry.border_width as u32,
            screen,
            viewable: attributes.map_state == xp::MapState::VIEWABLE,
            override_redirect: attributes.override_redirect,
        }))
    }

    fn size_hints(&mut self, window: Window) -> Result<SizeHints> {
        let values = self.property32(
            window,
            xp::AtomEnum::WM_NORMAL_HINTS.into(),
            xp::AtomEnum::WM_SIZE_HINTS.into(),
        )?;
        Ok(SizeHints::from_raw(&values))
    }

    fn wm_hints(&mut self, window: Window) -> Result<WmHints> {
        let values = self.property32(window, xp::AtomEnum::WM_HINTS.into(), xp::AtomEnum::WM_HINTS.into())?;
        Ok(WmHints::from_raw(&values))
    }

    fn class_hint(&mut self, window: Window) -> Result<ClassHint> {
        let value = self
            .property(window, xp::AtomEnum::WM_CLASS.into(), xp::AtomEnum::STRING.into())?
            .map(|reply| reply.value)
            .unwrap_or_default();
        Ok(ClassHint::from_raw(&value))
    }

    fn window_name(&mut self, window: Window) -> Result<Option<String>> {
        let utf8 = self.property(window, self.atoms.net_wm_name, self.atoms.utf8_string)?;
        let reply = match utf8 {
            Some(reply) => Some(reply),
            None => self.property(window, xp::AtomEnum::WM_NAME.into(), xp::AtomEnum::ANY.into())?,
        };
        Ok(reply
            .map(|r| String::from_utf8_lossy(&r.value).into_owned())
            .filter(|name| !name.is_empty()))
    }

    fn command_line(&mut self, window: Window) -> Result<Option<String>> {
        Ok(self
            .property(window, xp::AtomEnum::WM_COMMAND.into(), xp::AtomEnum::STRING.into())?
            .and_then(|reply| ewmh::decode_command(&reply.value)))
    }

    fn protocols(&mut self, window: Window) -> Result<WmProtocols> {
        let atoms = self.property32(window, self.atoms.wm_protocols, xp::AtomEnum::ATOM.into())?;
        Ok(self.atoms.protocols(&atoms))
    }

    fn create_frame(&mut self, screen: usize, geometry: Geometry, border_width: u32) -> Result<Window> {
        let root = self.root(screen)?;
        let frame = self.conn.generate_id()?;
        let aux = xp::CreateWindowAux::new().event_mask(
            xp::EventMask::SUBSTRUCTURE_REDIRECT
                | xp::EventMask::SUBSTRUCTURE_NOTIFY
                | xp::EventMask::ENTER_WINDOW,
        );
        self.conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            frame,
            root,
            geometry.x as i16,
            geometry.y as i16,
            geometry.width.max(1) as u16,
            geometry.height.max(1) as u16,
            border_width as u16,
            xp::WindowClass::INPUT_OUTPUT,
            COPY_FROM_PARENT,
            &aux,
        )?;
        debug!("Created frame 0x{:x} on screen {}", frame, screen);
        Ok(frame)
    }

    fn destroy_window(&mut self, window: Window) -> Result<()> {
        self.conn.destroy_window(window)?;
        Ok(())
    }

    fn reparent(&mut self, window: Window, parent: Window, position: Point) -> Result<()> {
        if self.is_root(parent) {
            self.conn.change_save_set(xp::SetMode::DELETE, window)?;
        } else {
            let aux = xp::ChangeWindowAttributesAux::new().event_mask(xp::EventMask::PROPERTY_CHANGE);
            self.conn.change_window_attributes(window, &aux)?;
            self.conn.change_save_set(xp::SetMode::INSERT, window)?;
            self.conn
                .configure_window(window, &xp::ConfigureWindowAux::new().border_width(0))?;
        }
        self.conn
            .reparent_window(window, parent, position.x as i16, position.y as i16)?;
        Ok(())
    }

    fn map_window(&mut self, window: Window) -> Result<()> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap_window(&mut self, window: Window) -> Result<()> {
        self.conn.unmap_window(window)?;
        Ok(())
    }

    fn configure(&mut self, window: Window, geometry: Geometry) -> Result<()> {
        let aux = xp::ConfigureWindowAux::new()
            .x(geometry.x)
            .y(geometry.y)
            .width(geometry.width.max(1))
            .height(geometry.height.max(1));
        self.conn.configure_window(window, &aux)?;
        Ok(())
    }

    fn configure_unmanaged(&mut self, request: &ConfigureRequest) -> Result<()> {
        let mut aux = xp::ConfigureWindowAux::new();
        aux.x = request.x;
        aux.y = request.y;
        aux.width = request.width;
        aux.height = request.height;
        aux.border_width = request.border_width;
        aux.sibling = request.sibling;
        aux.stack_mode = request.stack_mode.map(|mode| match mode {
            StackMode::Above => xp::StackMode::ABOVE,
            StackMode::Below => xp::StackMode::BELOW,
        });
        self.conn.configure_window(request.window, &aux)?;
        Ok(())
    }

    fn set_border(&mut self, window: Window, width: u32, pixel: u32) -> Result<()> {
        let pixel = self.pixel(pixel)?;
        self.conn
            .configure_window(window, &xp::ConfigureWindowAux::new().border_width(width))?;
        self.conn
            .change_window_attributes(window, &xp::ChangeWindowAttributesAux::new().border_pixel(pixel))?;
        Ok(())
    }

    fn raise(&mut self, window: Window) -> Result<()> {
        let aux = xp::ConfigureWindowAux::new().stack_mode(xp::StackMode::ABOVE);
        self.conn.configure_window(window, &aux)?;
        Ok(())
    }

    fn lower(&mut self, window: Window) -> Result<()> {
        let aux = xp::ConfigureWindowAux::new().stack_mode(xp::StackMode::BELOW);
        self.conn.configure_window(window, &aux)?;
        Ok(())
    }

    fn restack(&mut self, windows: &[Window]) -> Result<()> {
        for pair in windows.windows(2) {
            let aux = xp::ConfigureWindowAux::new()
                .sibling(pair[0])
                .stack_mode(xp::StackMode::BELOW);
            self.conn.configure_window(pair[1], &aux)?;
        }
        Ok(())
    }

    fn stacking_order(&mut self, screen: usize) -> Result<Vec<Window>> {
        let root = self.root(screen)?;
        Ok(self.conn.query_tree(root)?.reply()?.children)
    }

    fn set_focus(&mut self, window: Option<Window>) -> Result<()> {
        let target = window.unwrap_or(POINTER_ROOT);
        self.conn
            .set_input_focus(xp::InputFocus::POINTER_ROOT, target, CURRENT_TIME)?;
        Ok(())
    }

    fn send_protocol(&mut self, window: Window, protocol: Protocol) -> Result<()> {
        let atom = match protocol {
            Protocol::Delete => self.atoms.wm_delete_window,
            Protocol::TakeFocus => self.atoms.wm_take_focus,
        };
        self.atoms.send_protocol(self.conn.as_ref(), window, atom, self.time)
    }

    fn kill_client(&mut self, window: Window) -> Result<()> {
        info!("Killing client of window 0x{:x}", window);
        self.conn.kill_client(window)?;
        Ok(())
    }

    fn send_configure_notify(&mut self, window: Window, geometry: Geometry, border_width: u32) -> Result<()> {
        let event = xp::ConfigureNotifyEvent {
            response_type: xp::CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: NONE,
            x: geometry.x as i16,
            y: geometry.y as i16,
            width: geometry.width as u16,
            height: geometry.height as u16,
            border_width: border_width as u16,
            override_redirect: false,
        };
        self.conn
            .send_event(false, window, xp::EventMask::STRUCTURE_NOTIFY, event)?;
        Ok(())
    }

    fn set_wm_state(&mut self, window: Window, state: WmState) -> Result<()> {
        self.atoms.set_wm_state(self.conn.as_ref(), window, state)
    }

    fn set_active_window(&mut self, screen: usize, window: Option<Window>) -> Result<()> {
        let root = self.root(screen)?;
        self.atoms.update_active_window(self.conn.as_ref(), root, window)
    }

    fn query_pointer(&mut self, screen: usize) -> Result<Point> {
        let root = self.root(screen)?;
        let reply = self.conn.query_pointer(root)?.reply()?;
        Ok(Point::new(reply.root_x as i32, reply.root_y as i32))
    }

    fn warp_pointer(&mut self, screen: usize, position: Point) -> Result<()> {
        let root = self.root(screen)?;
        self.conn
            .warp_pointer(NONE, root, 0, 0, 0, 0, position.x as i16, position.y as i16)?;
        Ok(())
    }

    fn grab_pointer(&mut self, screen: usize, cursor: CursorKind) -> Result<bool> {
        let root = self.root(screen)?;
        let mask = xp::EventMask::BUTTON_PRESS | xp::EventMask::BUTTON_RELEASE | xp::EventMask::POINTER_MOTION;
        let reply = self
            .conn
            .grab_pointer(
                false,
                root,
                mask,
                xp::GrabMode::ASYNC,
                xp::GrabMode::ASYNC,
                NONE,
                self.cursors.get(cursor),
                CURRENT_TIME,
            )?
            .reply()?;
        Ok(reply.status == xp::GrabStatus::SUCCESS)
    }

    fn ungrab_pointer(&mut self) -> Result<()> {
        self.conn.ungrab_pointer(CURRENT_TIME)?;
        Ok(())
    }

    fn grab_keyboard(&mut self, screen: usize) -> Result<bool> {
        let root = self.root(screen)?;
        let reply = self
            .conn
            .grab_keyboard(false, root, CURRENT_TIME, xp::GrabMode::ASYNC, xp::GrabMode::ASYNC)?
            .reply()?;
        Ok(reply.status == xp::GrabStatus::SUCCESS)
    }

    fn ungrab_keyboard(&mut self) -> Result<()> {
        self.conn.ungrab_keyboard(CURRENT_TIME)?;
        Ok(())
    }

    fn grab_key(&mut self, screen: usize, modifiers: u16, keycode: u8) -> Result<()> {
        let root = self.root(screen)?;
        self.conn.grab_key(
            true,
            root,
            xp::ModMask::from(modifiers),
            keycode,
            xp::GrabMode::ASYNC,
            xp::GrabMode::ASYNC,
        )?;
        Ok(())
    }

    fn ungrab_keys(&mut self, screen: usize) -> Result<()> {
        let root = self.root(screen)?;
        self.conn.ungrab_key(xp::Grab::ANY, root, xp::ModMask::ANY)?;
        Ok(())
    }

    fn grab_button(&mut self, window: Window, modifiers: u16, button: u8) -> Result<()> {
        let mask = xp::EventMask::BUTTON_PRESS | xp::EventMask::BUTTON_RELEASE;
        self.conn.grab_button(
            false,
            window,
            mask,
            xp::GrabMode::ASYNC,
            xp::GrabMode::ASYNC,
            NONE,
            NONE,
            xp::ButtonIndex::from(button),
            xp::ModMask::from(modifiers),
        )?;
        Ok(())
    }

    fn keysyms(&self, keycode: u8) -> (u32, u32) {
        self.keymap.keysyms(keycode)
    }

    fn keycodes(&self, keysym: u32) -> Vec<u8> {
        self.keymap.keycodes(keysym)
    }

    fn refresh_keyboard_mapping(&mut self) -> Result<()> {
        self.keymap = Keymap::load(self.conn.as_ref())?;
        Ok(())
    }

    fn show_overlay(
        &mut self,
        screen: usize,
        origin: Point,
        lines: &[String],
        selected: Option<usize>,
    ) -> Result<Window> {
        let font = self.font;
        let Some(overlay) = self.overlays.get_mut(screen) else {
            anyhow::bail!("No overlay on screen {}", screen);
        };

        let longest = lines.iter().map(|l| l.chars().count().min(MAX_TEXT)).max().unwrap_or(0) as u32;
        overlay.width = (longest * font.char_width + 2 * OVERLAY_PADDING).max(1);
        overlay.lines = lines.to_vec();
        overlay.selected = selected;
        let window = overlay.window;
        let height = (lines.len() as u32 * font.line_height).max(1);

        let aux = xp::ConfigureWindowAux::new()
            .x(origin.x)
            .y(origin.y)
            .width(overlay.width)
            .height(height)
            .stack_mode(xp::StackMode::ABOVE);
        self.conn.configure_window(window, &aux)?;
        if !overlay.mapped {
            self.conn.map_window(window)?;
            overlay.mapped = true;
        }
        self.draw_overlay(screen)?;
        Ok(window)
    }

    fn hide_overlay(&mut self, screen: usize) -> Result<()> {
        if let Some(overlay) = self.overlays.get_mut(screen) {
            if overlay.mapped {
                self.conn.unmap_window(overlay.window)?;
                overlay.mapped = false;
            }
            overlay.lines.clear();
            overlay.selected = None;
        }
        Ok(())
    }

    fn overlay_line_height(&self) -> u32 {
        self.font.line_height
    }

    fn poll_event(&mut self) -> Result<Option<Event>> {
        loop {
            let Some(event) = self.conn.poll_for_event()? else {
                return Ok(None);
            };
            match self.translate(event) {
                Ok(Some(event)) => return Ok(Some(event)),
                Ok(None) => {}
                Err(e) => warn!("Failed to decode event: {:#}", e),
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn keymap() -> Keymap {
        // keycode 8: a/A, 9: Return, 10: 1/exclam
        Keymap {
            min_keycode: 8,
            per_keycode: 2,
            keysyms: vec![0x61, 0x41, 0xff0d, 0, 0x31, 0x21],
        }
    }

    #[test]
    fn keysym_levels() {
        let map = keymap();
        assert_eq!(map.keysyms(8), (0x61, 0x41));
        assert_eq!(map.keysyms(9), (0xff0d, 0xff0d));
        assert_eq!(map.keysyms(7), (0, 0));
        assert_eq!(map.keysyms(200), (0, 0));
    }

    #[test]
    fn keycodes_match_either_level() {
        let map = keymap();
        assert_eq!(map.keycodes(0x21), vec![10]);
        assert_eq!(map.keycodes(0x61), vec![8]);
        assert!(map.keycodes(0xffff).is_empty());
    }

    #[test]
    fn text_outside_latin1_is_replaced() {
        assert_eq!(latin1("café ✓"), b"caf\xe9 ?".to_vec());
        assert_eq!(latin1(&"x".repeat(300)).len(), MAX_TEXT);
    }

    #[test]
    fn configure_request_keeps_only_masked_fields() {
        let event = xp::ConfigureRequestEvent {
            response_type: xp::CONFIGURE_REQUEST_EVENT,
            stack_mode: xp::StackMode::ABOVE,
            sequence: 0,
            parent: 1,
            window: 42,
            sibling: 0,
            x: 10,
            y: 20,
            width: 300,
            height: 200,
            border_width: 2,
            value_mask: xp::ConfigWindow::X | xp::ConfigWindow::WIDTH | xp::ConfigWindow::STACK_MODE,
        };
        assert_eq!(
            configure_request(&event),
            ConfigureRequest {
                window: 42,
                x: Some(10),
                width: Some(300),
                stack_mode: Some(StackMode::Above),
                ..ConfigureRequest::default()
            }
        );
    }
}
