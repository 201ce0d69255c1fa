//! Event handlers
//!
//! Window-system notifications and input routing. Bound actions and the
//! interactive sessions they start live in `actions.rs`.

use anyhow::Result;
use tracing::{debug, info};

use crate::wm::adapter::{
    ClientRequest, ConfigureRequest, DisplayAdapter, Event, KeyEvent, PointerEvent, Property,
    StackMode, Window, WmState, modifier,
};
use crate::wm::client_flags::ClientFlags;
use crate::wm::client::ClientId;
use crate::wm::group::{GroupEdit, RenameKey};
use crate::wm::keyboard::{BindFlags, keysym};
use crate::wm::{Handler, WindowManager, placement};

impl<D: DisplayAdapter> WindowManager<D> {
    pub(super) fn run_handler(&mut self, handler: Handler, event: &Event) -> Result<()> {
        match (handler, event) {
            (Handler::MapRequest, Event::MapRequest { window, .. }) => self.on_map_request(*window),
            (Handler::UnmapNotify, Event::UnmapNotify { window, synthetic }) => {
                self.on_unmap(*window, *synthetic)
            }
            (Handler::DestroyNotify, Event::DestroyNotify { window }) => self.on_destroy(*window),
            (Handler::ConfigureRequest, Event::ConfigureRequest(request)) => {
                self.on_configure_request(request)
            }
            (Handler::PropertyNotify, Event::PropertyNotify { window, property }) => {
                self.on_property(*window, *property)
            }
            (Handler::EnterNotify, Event::EnterNotify { window, .. }) => self.on_enter(*window),
            (Handler::ButtonPress, Event::ButtonPress(e)) => self.on_button_press(e),
            (Handler::KeyPress, Event::KeyPress(e)) => self.on_key_press(e),
            (Handler::KeyRelease, Event::KeyRelease(e)) => self.on_key_release(e),
            (Handler::ClientMessage, Event::ClientMessage { window, request }) => {
                self.on_client_message(*window, *request)
            }
            (Handler::MappingNotify, Event::MappingNotify) => self.on_mapping_notify(),
            (Handler::ScreenChange, Event::ScreenChange { root, width, height }) => {
                self.on_screen_change(*root, *width, *height)
            }
            (Handler::DragMotion, Event::MotionNotify(e)) => self.drag_motion(e),
            (Handler::DragRelease, Event::ButtonRelease(_)) => self.end_drag(),
            (Handler::DragKey, Event::KeyPress(e)) => self.drag_key(e),
            (Handler::MenuKey, Event::KeyPress(e)) => self.menu_key(e),
            (Handler::MenuMotion, Event::MotionNotify(e)) => self.menu_motion(e),
            (Handler::MenuRelease, Event::ButtonRelease(e)) => self.menu_release(e),
            (handler, event) => {
                debug!("{:?} does not apply to {:?}", handler, event.kind());
                Ok(())
            }
        }
    }

    /// Client owning `window` as its content window (not its frame)
    fn content_client(&self, window: Window) -> Option<ClientId> {
        self.registry
            .find(window)
            .filter(|&id| self.registry.get(id).is_some_and(|c| c.window == window))
    }

    fn on_map_request(&mut self, window: Window) -> Result<()> {
        match self.registry.find(window) {
            Some(id) => {
                if self.registry.get(id).is_some_and(|c| c.is_hidden()) {
                    self.show_client(id, false)?;
                }
                Ok(())
            }
            None => self.manage_window(window, false).map(|_| ()),
        }
    }

    fn on_unmap(&mut self, window: Window, synthetic: bool) -> Result<()> {
        let Some(id) = self.content_client(window) else {
            return Ok(());
        };
        if synthetic {
            return self.display.set_wm_state(window, WmState::Withdrawn);
        }

        if let Some(client) = self.registry.get_mut(id) {
            if client.ignore_unmaps > 0 {
                client.ignore_unmaps -= 1;
                return Ok(());
            }
        }
        self.delete_client(id, false, false).map(|_| ())
    }

    fn on_destroy(&mut self, window: Window) -> Result<()> {
        match self.content_client(window) {
            Some(id) => self.delete_client(id, true, true).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Managed windows get their request applied with gravity and a
    /// synthetic ConfigureNotify; anything else passes straight through
    fn on_configure_request(&mut self, request: &ConfigureRequest) -> Result<()> {
        let Some(id) = self.content_client(request.window) else {
            return self.display.configure_unmanaged(request);
        };
        let Some(client) = self.registry.get_mut(id) else {
            return Ok(());
        };

        if !client.flags.contains(ClientFlags::FREEZE) {
            if let Some(width) = request.width {
                client.geometry.width = width.max(1);
            }
            if let Some(height) = request.height {
                client.geometry.height = height.max(1);
            }
            if request.x.is_some() || request.y.is_some() {
                if let Some(x) = request.x {
                    client.geometry.x = x;
                }
                if let Some(y) = request.y {
                    client.geometry.y = y;
                }
                placement::gravitate(client, true);
            }
        }
        let frame = client.frame;

        self.apply_geometry(id)?;
        match request.stack_mode {
            Some(StackMode::Above) => self.display.raise(frame),
            Some(StackMode::Below) => self.display.lower(frame),
            None => Ok(()),
        }
    }

    fn on_property(&mut self, window: Window, property: Property) -> Result<()> {
        let Some(id) = self.content_client(window) else {
            return Ok(());
        };

        match property {
            Property::Name => {
                if let Some(name) = self.display.window_name(window)? {
                    if let Some(client) = self.registry.get_mut(id) {
                        client.set_name(&name);
                    }
                }
            }
            Property::NormalHints => {
                let hints = self.display.size_hints(window)?;
                if let Some(client) = self.registry.get_mut(id) {
                    client.size_hints = hints;
                }
            }
            Property::Hints => {
                let hints = self.display.wm_hints(window)?;
                if let Some(client) = self.registry.get_mut(id) {
                    client.wm_hints = hints;
                    client.flags.set(ClientFlags::URGENT, hints.urgent);
                }
                self.redraw_border(id)?;
            }
            Property::Protocols => {
                let protocols = self.display.protocols(window)?;
                if let Some(client) = self.registry.get_mut(id) {
                    client.protocols = protocols;
                }
            }
            Property::Class => {
                let class = self.display.class_hint(window)?;
                if let Some(client) = self.registry.get_mut(id) {
                    client.class = class;
                }
            }
            Property::Other => {}
        }
        Ok(())
    }

    /// Focus follows the pointer
    fn on_enter(&mut self, window: Window) -> Result<()> {
        let Some(id) = self.registry.find(window) else {
            return Ok(());
        };
        if self.registry.active() == Some(id) {
            return Ok(());
        }
        self.set_active(Some(id), true)
    }

    fn on_button_press(&mut self, event: &PointerEvent) -> Result<()> {
        let screen = self.screen_of_root(event.root);
        let on_root = event.window == self.screens[screen].root && event.child.is_none();
        let target = if on_root {
            None
        } else {
            self.registry
                .find(event.window)
                .or_else(|| event.child.and_then(|child| self.registry.find(child)))
        };

        let Some(binding) = self
            .bindings
            .match_button(event.button, event.state, on_root)
            .cloned()
        else {
            return Ok(());
        };
        if binding.action.starts_group_edit() && self.groups.editing().is_some() {
            return Ok(());
        }
        if binding.action.needs_client() && target.is_none() {
            debug!("No client under the pointer for {:?}", binding.action);
            return Ok(());
        }
        self.run_action(&binding.action, target, screen, Some(event.root_position))
    }

    /// First matching binding wins; unbound keys feed a running group edit.
    ///
    /// Bindings that would open another edit session are treated as unbound
    /// while one is running.
    fn on_key_press(&mut self, event: &KeyEvent) -> Result<()> {
        let screen = self.screen_of_root(event.root);
        let syms = self.display.keysyms(event.keycode);
        let editing = self.groups.editing().is_some();

        let binding = self
            .bindings
            .match_key(event.keycode, event.state, syms)
            .filter(|b| !(editing && b.action.starts_group_edit()))
            .cloned();
        if let Some(binding) = binding {
            let flags = binding.flags();
            let mut target = self.registry.find(event.window);
            if target.is_none() && flags.contains(BindFlags::FUZZY) {
                target = self.registry.active();
            }
            if flags.contains(BindFlags::CLIENT) && target.is_none() {
                debug!("No client for {:?}", binding.action);
                return Ok(());
            }
            return self.run_action(&binding.action, target, screen, None);
        }

        if editing {
            let sym = if event.state & modifier::SHIFT != 0 { syms.1 } else { syms.0 };
            return self.group_edit_key(screen, sym);
        }
        Ok(())
    }

    fn group_edit_key(&mut self, screen: usize, sym: u32) -> Result<()> {
        match self.groups.edit_state().clone() {
            GroupEdit::Idle => return Ok(()),
            GroupEdit::Renaming { .. } => {
                let key = match sym {
                    keysym::RETURN | keysym::KP_ENTER => RenameKey::Confirm,
                    keysym::ESCAPE => RenameKey::Cancel,
                    keysym::BACKSPACE => RenameKey::Backspace,
                    sym => match keysym::to_char(sym) {
                        Some(c) => RenameKey::Char(c),
                        None => return Ok(()),
                    },
                };
                self.groups.rename_key(key);
            }
            GroupEdit::Editing { .. } => match sym {
                keysym::RETURN | keysym::KP_ENTER => return self.commit_group_edit(screen),
                keysym::ESCAPE => return self.abort_group_edit(screen),
                keysym::SPACE => {
                    if let Some(active) = self.registry.active() {
                        self.edit_toggle_member(active)?;
                    }
                }
                sym if keysym::to_char(sym) == Some('r') => self.groups.begin_rename(),
                _ => return Ok(()),
            },
        }
        self.draw_group_edit(screen)
    }

    /// Releasing the cycling modifier ends a cycle and clears membership
    /// toggle highlights
    fn on_key_release(&mut self, event: &KeyEvent) -> Result<()> {
        let (sym, _) = self.display.keysyms(event.keycode);
        if !keysym::ends_cycle(sym) {
            return Ok(());
        }
        let screen = self.screen_of_root(event.root);

        if self.cycle.release(screen) {
            debug!("Cycle finished on screen {}", screen);
            self.display.hide_overlay(screen)?;
            if let Some(active) = self.registry.active() {
                self.cycle.touch(screen, active);
            }
        }

        for id in std::mem::take(&mut self.toggled) {
            if let Some(client) = self.registry.get_mut(id) {
                client.highlight = Default::default();
            }
            self.redraw_border(id)?;
        }
        self.release_keyboard()
    }

    fn on_client_message(&mut self, window: Window, request: ClientRequest) -> Result<()> {
        let Some(id) = self.content_client(window) else {
            return Ok(());
        };
        match request {
            ClientRequest::Activate => {
                if let Some(active) = self.registry.active() {
                    self.save_pointer(active)?;
                }
                self.show_client(id, true)
            }
            ClientRequest::Close => self.close_client(id),
            ClientRequest::Iconify => self.hide_client(id),
            ClientRequest::Other => Ok(()),
        }
    }

    fn on_mapping_notify(&mut self) -> Result<()> {
        self.display.refresh_keyboard_mapping()?;
        for screen in 0..self.screens.len() {
            self.grab_keys(screen)?;
        }
        Ok(())
    }

    fn on_screen_change(&mut self, root: Window, width: u32, height: u32) -> Result<()> {
        let index = self.screen_of_root(root);
        info!("Screen {} is now {}x{}", index, width, height);
        self.screens[index].resize(width, height);
        Ok(())
    }
}
