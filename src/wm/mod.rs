//! Window Manager Module
//!
//! The window-management engine. `WindowManager` owns the display adapter
//! and all state: clients, groups, MRU order, bindings and the interactive
//! sessions. Events are fed in one at a time through `handle_event`.

mod actions;
pub mod adapter;
pub mod client;
pub mod client_flags;
pub mod commands;
pub mod cycle;
pub mod decorations;
pub mod display;
pub mod error;
pub mod events;
pub mod ewmh;
pub mod group;
mod handlers;
pub mod hints;
pub mod keyboard;
pub mod menu;
pub mod moveresize;
pub mod placement;
pub mod registry;
pub mod screen;
pub mod search;
pub mod stacking;
#[cfg(test)]
pub mod testing;

use std::collections::VecDeque;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::shared::{Geometry, Point};
use crate::wm::adapter::{DisplayAdapter, Event, EventKind, Protocol, Window, WmState, modifier};
use crate::wm::client::{Client, ClientId};
use crate::wm::client_flags::{ClientFlags, WmProtocols};
use crate::wm::commands::CommandMenu;
use crate::wm::cycle::CycleManager;
use crate::wm::error::WmError;
use crate::wm::events::Dispatcher;
use crate::wm::group::GroupManager;
use crate::wm::keyboard::{Bindings, Key};
use crate::wm::menu::Menu;
use crate::wm::moveresize::DragSession;
use crate::wm::registry::ClientRegistry;
use crate::wm::screen::Screen;

/// Dispatcher handler tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    MapRequest,
    UnmapNotify,
    DestroyNotify,
    ConfigureRequest,
    PropertyNotify,
    EnterNotify,
    ButtonPress,
    KeyPress,
    KeyRelease,
    ClientMessage,
    MappingNotify,
    ScreenChange,
    DragMotion,
    DragRelease,
    DragKey,
    MenuKey,
    MenuMotion,
    MenuRelease,
}

/// What the event loop should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// Release all clients and start over with a fresh configuration
    Restart,
    Quit,
}

/// An open menu and the client its result applies to
#[derive(Debug)]
struct MenuSession {
    menu: Menu,
    screen: usize,
    origin: Point,
    target: Option<ClientId>,
}

/// Events kept for later while a modal session has no listener for them
fn deferrable(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::MapRequest
            | EventKind::UnmapNotify
            | EventKind::DestroyNotify
            | EventKind::ConfigureRequest
            | EventKind::PropertyNotify
            | EventKind::ClientMessage
            | EventKind::MappingNotify
            | EventKind::ScreenChange
    )
}

pub struct WindowManager<D: DisplayAdapter> {
    display: D,
    config: Config,

    /// DISPLAY value passed to spawned programs
    display_name: Option<String>,

    screens: Vec<Screen>,
    registry: ClientRegistry,
    groups: GroupManager,
    cycle: CycleManager,
    dispatcher: Dispatcher<Handler>,
    bindings: Bindings,
    commands: CommandMenu,

    drag: Option<DragSession>,
    menu: Option<MenuSession>,

    /// Structural events received during a modal session
    deferred: VecDeque<Event>,

    /// Clients highlighted by a membership toggle, cleared on modifier release
    toggled: Vec<ClientId>,

    keyboard_grabbed: bool,
    state: RunState,
}

impl<D: DisplayAdapter> WindowManager<D> {
    /// Create the engine; nothing is grabbed or managed until `setup`
    pub fn new(display: D, config: Config, display_name: Option<String>) -> Self {
        let screens: Vec<Screen> = display
            .screens()
            .iter()
            .map(|info| Screen::new(info, config.general.gap))
            .collect();
        let bindings = Bindings::from_config(&config.keybindings, &config.mousebindings);

        let mut dispatcher = Dispatcher::new();
        for screen in &screens {
            let root = Some(screen.root);
            dispatcher.register(Some(EventKind::MapRequest), None, root, Handler::MapRequest);
            dispatcher.register(Some(EventKind::EnterNotify), None, root, Handler::EnterNotify);
            dispatcher.register(Some(EventKind::ButtonPress), None, root, Handler::ButtonPress);
            dispatcher.register(Some(EventKind::KeyPress), None, root, Handler::KeyPress);
            dispatcher.register(Some(EventKind::KeyRelease), None, root, Handler::KeyRelease);
            dispatcher.register(Some(EventKind::ScreenChange), None, root, Handler::ScreenChange);
        }
        dispatcher.register(Some(EventKind::UnmapNotify), None, None, Handler::UnmapNotify);
        dispatcher.register(Some(EventKind::DestroyNotify), None, None, Handler::DestroyNotify);
        dispatcher.register(Some(EventKind::ConfigureRequest), None, None, Handler::ConfigureRequest);
        dispatcher.register(Some(EventKind::PropertyNotify), None, None, Handler::PropertyNotify);
        dispatcher.register(Some(EventKind::ClientMessage), None, None, Handler::ClientMessage);
        dispatcher.register(Some(EventKind::MappingNotify), None, None, Handler::MappingNotify);

        Self {
            display,
            groups: GroupManager::new(&config.groups.names),
            commands: CommandMenu::new(&config.commands),
            config,
            display_name,
            screens,
            registry: ClientRegistry::new(),
            cycle: CycleManager::new(),
            dispatcher,
            bindings,
            drag: None,
            menu: None,
            deferred: VecDeque::new(),
            toggled: Vec::new(),
            keyboard_grabbed: false,
            state: RunState::Running,
        }
    }

    /// Grab bindings and adopt the windows that are already visible
    pub fn setup(&mut self) -> Result<()> {
        for index in 0..self.screens.len() {
            self.grab_keys(index)?;

            for window in self.display.existing_windows(index)? {
                let Some(info) = self.display.window_info(window)? else {
                    continue;
                };
                if info.override_redirect || !info.viewable {
                    continue;
                }
                if let Err(e) = self.manage_window(window, true) {
                    warn!("Failed to adopt window 0x{:x}: {:#}", window, e);
                }
            }
        }
        self.display.flush()?;
        info!(
            "Window manager ready: {} screen(s), {} client(s)",
            self.screens.len(),
            self.registry.len()
        );
        Ok(())
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn groups(&self) -> &GroupManager {
        &self.groups
    }

    pub fn cycle(&self) -> &CycleManager {
        &self.cycle
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    /// Handle every event the display has queued, then flush
    pub fn process_pending(&mut self) -> Result<()> {
        while let Some(event) = self.display.poll_event()? {
            self.handle_event(event);
        }
        self.display.flush()
    }

    /// Route one event through the dispatcher.
    ///
    /// Handler failures are logged and never stop the loop.
    pub fn handle_event(&mut self, event: Event) {
        let handlers = self.dispatcher.begin(&event);

        if handlers.is_empty() && self.dispatcher.is_modal() {
            self.dispatcher.finish();
            if deferrable(event.kind()) {
                debug!("Deferring {:?} until the modal session ends", event.kind());
                self.deferred.push_back(event);
            }
            return;
        }

        for handler in handlers {
            if let Err(e) = self.run_handler(handler, &event) {
                warn!("Error handling {:?}: {:#}", event.kind(), e);
            }
        }
        self.dispatcher.finish();

        while !self.dispatcher.is_modal() {
            let Some(deferred) = self.deferred.pop_front() else {
                break;
            };
            self.handle_event(deferred);
        }
    }

    /// Start managing a top-level window.
    ///
    /// `mapped` is set for windows that were already visible; they keep
    /// their position. Returns `None` for windows that are never managed.
    pub fn manage_window(&mut self, window: Window, mapped: bool) -> Result<Option<ClientId>> {
        if let Some(id) = self.registry.find(window) {
            return Ok(Some(id));
        }

        let info = self
            .display
            .window_info(window)?
            .ok_or(WmError::InvalidWindow(window))?;
        if info.override_redirect {
            debug!("Window 0x{:x} is override-redirect, skipping", window);
            return Ok(None);
        }
        let Some(screen) = self.screens.get(info.screen) else {
            warn!("Window 0x{:x} is on unknown screen {}", window, info.screen);
            return Ok(None);
        };
        let area = screen.work_area();

        let mut client = Client::new(window, info.screen, info.geometry, self.config.general.border_width)
            .with_name_capacity(self.config.general.name_history);
        client.original_border_width = info.border_width;
        client.size_hints = self.display.size_hints(window)?;
        client.wm_hints = self.display.wm_hints(window)?;
        client.class = self.display.class_hint(window)?;
        client.protocols = self.display.protocols(window)?;
        client.command = self.display.command_line(window)?;
        if let Some(name) = self.display.window_name(window)? {
            client.set_name(&name);
        }
        if client.wm_hints.urgent {
            client.flags.insert(ClientFlags::URGENT);
        }
        if self.config.is_ignored(client.name()) {
            client.flags.insert(ClientFlags::IGNORE);
            client.border_width = 0;
        }

        placement::gravitate(&mut client, true);
        if !mapped {
            let pointer = self.display.query_pointer(info.screen)?;
            placement::place_initial(&mut client, area, pointer);
        }

        let geometry = client.geometry;
        let frame = self
            .display
            .create_frame(info.screen, geometry, client.border_width)?;
        client.frame = frame;
        self.display.reparent(window, frame, Point::new(0, 0))?;
        self.display
            .configure(window, Geometry::new(0, 0, geometry.width, geometry.height))?;
        if mapped {
            client.ignore_unmaps += 1;
        }

        let iconic = !mapped && client.wm_hints.initial_iconic;
        info!("Managing window 0x{:x} {:?}", window, client.name());
        let id = self.registry.insert(client);
        self.grab_buttons(frame)?;
        self.cycle.push(info.screen, id);

        let group = self.registry.get(id).and_then(|c| {
            self.groups.autogroup(
                c,
                &self.config.windows.autogroup,
                self.config.general.sticky_groups,
            )
        });
        if let Some(group) = group {
            self.groups.add(&mut self.registry, group, id);
        }
        let group_hidden = group
            .and_then(|g| self.groups.get(g))
            .is_some_and(|g| g.hidden);

        self.display.map_window(window)?;
        if iconic || group_hidden {
            self.registry.hide(&mut self.display, id)?;
        } else {
            self.display.map_window(frame)?;
            self.display.set_wm_state(window, WmState::Normal)?;
        }
        self.redraw_border(id)?;
        Ok(Some(id))
    }

    /// Stop managing a client.
    ///
    /// A hidden client is left alone unless `close_requested` is set; the
    /// return value reports that case as already handled. `ignore_reparent`
    /// skips handing the window back to the root (it is gone).
    pub fn delete_client(&mut self, id: ClientId, close_requested: bool, ignore_reparent: bool) -> Result<bool> {
        let Some(client) = self.registry.get(id) else {
            return Ok(true);
        };
        if client.is_hidden() && !close_requested {
            return Ok(true);
        }
        let (window, frame, screen) = (client.window, client.frame, client.screen);
        debug!("Releasing window 0x{:x}", window);

        if self.drag.as_ref().is_some_and(|d| d.client == id) {
            self.end_drag()?;
        }

        if !ignore_reparent {
            if let Some(client) = self.registry.get_mut(id) {
                placement::gravitate(client, false);
                let position = Point::new(client.geometry.x, client.geometry.y);
                let root = self.screens[screen].root;
                self.display.reparent(window, root, position)?;
                self.display.set_wm_state(window, WmState::Withdrawn)?;
            }
        }
        self.display.destroy_window(frame)?;

        let was_active = self.registry.active() == Some(id);
        self.groups.remove(&mut self.registry, id);
        self.cycle.remove(id);
        self.toggled.retain(|&c| c != id);
        if let Some(mut client) = self.registry.remove(id) {
            client.release_names();
        }
        if was_active {
            self.display.set_active_window(screen, None)?;
        }
        Ok(false)
    }

    /// Make a client the active one (or none).
    ///
    /// Moves it to the head of its screen's MRU order unless a cycle is in
    /// progress. Hidden clients cannot become active.
    pub fn set_active(&mut self, id: Option<ClientId>, focus: bool) -> Result<()> {
        let id = id.filter(|&id| self.registry.get(id).is_some_and(|c| !c.is_hidden()));
        let previous = self.registry.active();

        if previous != id {
            self.registry.set_active(id);
            if let Some(previous) = previous {
                self.redraw_border(previous)?;
            }
        }

        let Some(id) = id else {
            let screen = previous
                .and_then(|p| self.registry.get(p))
                .map_or(0, |c| c.screen);
            if focus {
                self.display.set_focus(None)?;
            }
            return self.display.set_active_window(screen, None);
        };

        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        let (screen, window) = (client.screen, client.window);
        let input = client.wm_hints.input;
        let take_focus = client.protocols.contains(WmProtocols::TAKE_FOCUS);

        self.cycle.touch(screen, id);
        self.redraw_border(id)?;
        if focus {
            if input {
                self.display.set_focus(Some(window))?;
            }
            if take_focus {
                self.display.send_protocol(window, Protocol::TakeFocus)?;
            }
        }
        self.display.set_active_window(screen, Some(window))
    }

    /// Hand every client back to the root, undoing gravity and hiding
    pub fn shutdown(&mut self) -> Result<()> {
        info!("Releasing {} client(s)", self.registry.len());
        if self.menu.is_some() {
            self.close_menu()?;
        }
        if self.drag.is_some() {
            self.end_drag()?;
        }

        for id in self.registry.ids().to_vec() {
            let Some(client) = self.registry.get_mut(id) else {
                continue;
            };
            placement::gravitate(client, false);
            let (window, frame) = (client.window, client.frame);
            let position = Point::new(client.geometry.x, client.geometry.y);
            let root = self.screens[client.screen].root;

            self.display.reparent(window, root, position)?;
            self.display.set_wm_state(window, WmState::Normal)?;
            self.display.destroy_window(frame)?;
            self.registry.remove(id);
        }

        self.display.set_focus(None)?;
        self.display.flush()
    }

    /// Index of the screen owning a root window
    fn screen_of_root(&self, root: Window) -> usize {
        self.screens
            .iter()
            .position(|s| s.root == root)
            .unwrap_or(0)
    }

    fn redraw_border(&mut self, id: ClientId) -> Result<()> {
        match self.registry.get(id) {
            Some(client) => decorations::draw_border(&mut self.display, client, &self.config.colors),
            None => Ok(()),
        }
    }

    /// Push a client's geometry to its frame and content window
    fn apply_geometry(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        let geometry = client.geometry;
        self.display.configure(client.frame, geometry)?;
        self.display
            .configure(client.window, Geometry::new(0, 0, geometry.width, geometry.height))?;
        self.display
            .send_configure_notify(client.window, geometry, client.border_width)
    }

    /// Grab every key binding on a screen, for each lock-modifier combination
    fn grab_keys(&mut self, screen: usize) -> Result<()> {
        self.display.ungrab_keys(screen)?;

        for binding in &self.bindings.keys {
            let codes: Vec<(u8, u16)> = match binding.key {
                Key::Code(code) => vec![(code, 0)],
                Key::Sym(sym) => self
                    .display
                    .keycodes(sym)
                    .into_iter()
                    .map(|code| {
                        let (lower, upper) = self.display.keysyms(code);
                        let shift = if lower != sym && upper == sym {
                            modifier::SHIFT
                        } else {
                            0
                        };
                        (code, shift)
                    })
                    .collect(),
            };
            for (code, shift) in codes {
                for ignored in modifier::IGNORED {
                    self.display
                        .grab_key(screen, binding.modifiers | shift | ignored, code)?;
                }
            }
        }
        Ok(())
    }

    /// Grab modified button bindings on a client frame
    fn grab_buttons(&mut self, frame: Window) -> Result<()> {
        for binding in self.bindings.buttons.iter().filter(|b| b.modifiers != 0) {
            for ignored in modifier::IGNORED {
                self.display
                    .grab_button(frame, binding.modifiers | ignored, binding.button)?;
            }
        }
        Ok(())
    }

    /// Take the keyboard unless already held; `false` when the grab failed
    fn grab_keyboard(&mut self, screen: usize) -> Result<bool> {
        if !self.keyboard_grabbed {
            self.keyboard_grabbed = self.display.grab_keyboard(screen)?;
            if !self.keyboard_grabbed {
                warn!("Keyboard grab failed on screen {}", screen);
            }
        }
        Ok(self.keyboard_grabbed)
    }

    /// Let the keyboard go once no session needs it
    fn release_keyboard(&mut self) -> Result<()> {
        let needed = self.menu.is_some()
            || self.groups.editing().is_some()
            || !self.toggled.is_empty()
            || (0..self.screens.len()).any(|s| self.cycle.is_cycling(s));
        if self.keyboard_grabbed && !needed {
            self.display.ungrab_keyboard()?;
            self.keyboard_grabbed = false;
        }
        Ok(())
    }
}
