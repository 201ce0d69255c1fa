//! Bound actions
//!
//! Everything a key or button binding can trigger, plus the interactive
//! sessions those actions start: cycling, group editing, menus and pointer
//! drags.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::shared::Point;
use crate::wm::adapter::{CursorKind, DisplayAdapter, EventKind, KeyEvent, PointerEvent, Protocol, modifier};
use crate::wm::client::{Client, ClientId};
use crate::wm::client_flags::{ClientFlags, WmProtocols};
use crate::wm::commands;
use crate::wm::cycle::CycleMode;
use crate::wm::group::{GroupEdit, GroupId};
use crate::wm::keyboard::{Action, keysym};
use crate::wm::menu::{Menu, MenuInput, MenuItem, MenuKind, MenuOutcome, MenuValue};
use crate::wm::moveresize::{DragKind, DragSession};
use crate::wm::search::ClientCandidate;
use crate::wm::{Handler, MenuSession, RunState, WindowManager, placement};

/// Multiplier for the `-big` variants of keyboard moves
const BIG_STEP: i32 = 10;

/// Name given to a group created by a group edit
const NEW_GROUP_NAME: &str = "new";

impl<D: DisplayAdapter> WindowManager<D> {
    /// Run a bound action.
    ///
    /// `target` is the client the binding resolved to, `pointer` the root
    /// position for pointer-triggered bindings.
    pub(super) fn run_action(
        &mut self,
        action: &Action,
        target: Option<ClientId>,
        screen: usize,
        pointer: Option<Point>,
    ) -> Result<()> {
        debug!("Running {:?}", action);
        if action.needs_client() {
            return match target {
                Some(id) => self.client_action(action, id, pointer),
                None => Ok(()),
            };
        }

        match action {
            Action::Terminal => self.spawn(&self.config.commands.terminal),
            Action::Lock => self.spawn(&self.config.commands.lock),
            Action::ExecCommand(command) => self.spawn(command),
            Action::MenuExec => self.open_exec_menu(screen, pointer),
            Action::MenuWindow => self.open_window_menu(screen, pointer, MenuKind::Windows),
            Action::MenuWindowHidden => {
                self.open_window_menu(screen, pointer, MenuKind::HiddenWindows)
            }
            Action::MenuCommand => self.open_command_menu(screen, pointer),
            Action::MenuGroup => self.open_group_menu(screen, pointer),
            Action::Cycle { reverse, mode } => self.cycle_step(screen, *reverse, *mode),
            Action::GroupToggle(number) => self.with_numbered_group(*number, |wm, group| {
                wm.groups.toggle(&mut wm.display, &mut wm.registry, group)
            }),
            Action::GroupOnly(number) => self.with_numbered_group(*number, |wm, group| {
                wm.groups.only(&mut wm.display, &mut wm.registry, group)
            }),
            Action::GroupSlide { forward } => {
                self.groups
                    .slide(&mut self.display, &mut self.registry, *forward)?;
                Ok(())
            }
            Action::GroupToggleAll => self.toggle_all_groups(),
            Action::GroupEditNew => self.begin_group_edit(screen, None),
            Action::GroupEditActive => {
                let active = self.groups.active();
                self.begin_group_edit(screen, Some(active))
            }
            Action::GroupEditCommit if self.edit_in_progress() => self.commit_group_edit(screen),
            Action::GroupEditAbort if self.edit_in_progress() => self.abort_group_edit(screen),
            Action::GroupEditRename if self.edit_in_progress() => {
                self.groups.begin_rename();
                self.draw_group_edit(screen)
            }
            Action::PointerMove { direction, big } => {
                let (dx, dy) = direction.delta();
                let step = self.move_step(*big);
                let position = self.display.query_pointer(screen)?;
                self.display
                    .warp_pointer(screen, Point::new(position.x + dx * step, position.y + dy * step))
            }
            Action::Restart => {
                info!("Restart requested");
                self.state = RunState::Restart;
                Ok(())
            }
            Action::Quit => {
                info!("Quit requested");
                self.state = RunState::Quit;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn client_action(&mut self, action: &Action, id: ClientId, pointer: Option<Point>) -> Result<()> {
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        let (screen, frame) = (client.screen, client.frame);
        let area = self.screens[screen].work_area();

        match action {
            Action::Label => self.open_label_menu(id, pointer),
            Action::Hide => self.hide_client(id),
            Action::Lower => self.display.lower(frame),
            Action::Raise => self.display.raise(frame),
            Action::Close => self.close_client(id),
            Action::Maximize | Action::VMaximize | Action::HMaximize => {
                let Some(client) = self.registry.get_mut(id) else {
                    return Ok(());
                };
                let changed = match action {
                    Action::Maximize => placement::toggle_maximize(client, area),
                    Action::VMaximize => placement::toggle_vmaximize(client, area),
                    _ => placement::toggle_hmaximize(client, area),
                };
                if changed {
                    self.apply_geometry(id)?;
                }
                Ok(())
            }
            Action::Freeze => {
                if let Some(client) = self.registry.get_mut(id) {
                    client.flags.toggle(ClientFlags::FREEZE);
                }
                Ok(())
            }
            Action::MoveToGroup(number) => self.with_numbered_group(*number, |wm, group| {
                wm.groups
                    .move_client(&mut wm.display, &mut wm.registry, id, group)?;
                wm.redraw_border(id)
            }),
            Action::GroupToggleMembership => {
                if self.groups.editing().is_some() {
                    return self.edit_toggle_member(id);
                }
                self.groups.toggle_membership(&mut self.registry, id);
                if !self.toggled.contains(&id) {
                    self.toggled.push(id);
                }
                self.grab_keyboard(screen)?;
                self.redraw_border(id)
            }
            Action::GroupEditMember => {
                if self.groups.editing().is_none() {
                    debug!("No group edit in progress");
                    return Ok(());
                }
                self.edit_toggle_member(id)
            }
            Action::Move { direction, big } => {
                let (dx, dy) = direction.delta();
                let step = self.move_step(*big);
                let view = self.screens[screen].view();
                let snap = self.config.general.snap_distance as i32;
                let Some(client) = self.registry.get_mut(id) else {
                    return Ok(());
                };
                if placement::move_by(client, dx * step, dy * step, view, area, snap) {
                    self.apply_geometry(id)?;
                }
                Ok(())
            }
            Action::Resize { direction, big } => {
                let (dx, dy) = direction.delta();
                let step = if *big { BIG_STEP } else { 1 };
                let Some(client) = self.registry.get_mut(id) else {
                    return Ok(());
                };
                if placement::resize_by(client, dx * step, dy * step) {
                    self.apply_geometry(id)?;
                }
                Ok(())
            }
            Action::DragMove | Action::DragResize => {
                let kind = if *action == Action::DragMove {
                    DragKind::Move
                } else {
                    DragKind::Resize
                };
                let position = match pointer {
                    Some(position) => position,
                    None => self.display.query_pointer(screen)?,
                };
                self.start_drag(kind, id, position, screen)
            }
            _ => Ok(()),
        }
    }

    fn move_step(&self, big: bool) -> i32 {
        let amount = self.config.general.move_amount as i32;
        if big { amount * BIG_STEP } else { amount }
    }

    fn with_numbered_group<F>(&mut self, number: usize, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self, GroupId) -> Result<()>,
    {
        match self.groups.by_number(number) {
            Some(group) => f(self, group),
            None => {
                warn!("No group numbered {}", number);
                Ok(())
            }
        }
    }

    fn spawn(&self, command: &str) -> Result<()> {
        commands::spawn(command, self.display_name.as_deref())?;
        Ok(())
    }

    pub(super) fn hide_client(&mut self, id: ClientId) -> Result<()> {
        if self.registry.active() == Some(id) {
            self.save_pointer(id)?;
        }
        self.registry.hide(&mut self.display, id)
    }

    /// Unhide, raise and focus a client, optionally moving the pointer in
    pub(super) fn show_client(&mut self, id: ClientId, warp: bool) -> Result<()> {
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        let (frame, hidden) = (client.frame, client.is_hidden());

        if hidden {
            self.registry.unhide(&mut self.display, id)?;
        }
        self.display.raise(frame)?;
        if warp {
            self.warp_into(id)?;
        }
        self.set_active(Some(id), true)
    }

    /// Ask politely when the client supports it, otherwise kill it
    pub(super) fn close_client(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        if client.protocols.contains(WmProtocols::DELETE) {
            self.display.send_protocol(client.window, Protocol::Delete)
        } else {
            info!("Killing window 0x{:x}", client.window);
            self.display.kill_client(client.window)
        }
    }

    /// Remember where the pointer is inside a client
    pub(super) fn save_pointer(&mut self, id: ClientId) -> Result<()> {
        let Some(screen) = self.registry.get(id).map(|c| c.screen) else {
            return Ok(());
        };
        let position = self.display.query_pointer(screen)?;
        if let Some(client) = self.registry.get_mut(id) {
            let relative = Point::new(position.x - client.geometry.x, position.y - client.geometry.y);
            client.pointer = client.contains_relative(relative).then_some(relative);
        }
        Ok(())
    }

    /// Put the pointer back where it last was inside a client, or its center
    fn warp_into(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        let geometry = client.geometry;
        let relative = client.pointer.unwrap_or_else(|| {
            Point::new(geometry.width as i32 / 2, geometry.height as i32 / 2)
        });
        let target = Point::new(geometry.x + relative.x, geometry.y + relative.y);
        self.display.warp_pointer(client.screen, target)
    }

    /// One step of MRU cycling; the first step grabs the keyboard so the
    /// modifier release is seen
    fn cycle_step(&mut self, screen: usize, reverse: bool, mode: CycleMode) -> Result<()> {
        if !self.cycle.is_cycling(screen) && !self.grab_keyboard(screen)? {
            return Ok(());
        }

        let previous = self.registry.active();
        let Some(step) = self.cycle.cycle_next(screen, &self.registry, reverse, mode) else {
            return self.release_keyboard();
        };

        if let Some(previous) = previous {
            self.save_pointer(previous)?;
        }
        if let Some(frame) = self.registry.get(step.target).map(|c| c.frame) {
            self.display.raise(frame)?;
        }
        self.warp_into(step.target)?;
        self.set_active(Some(step.target), true)?;

        let lines: Vec<String> = step
            .preview
            .iter()
            .filter_map(|&id| self.registry.get(id))
            .map(menu_title)
            .collect();
        let selected = step.preview.iter().position(|&id| id == step.target);
        let origin = self.overlay_origin(screen);
        self.display.show_overlay(screen, origin, &lines, selected)?;
        Ok(())
    }

    fn overlay_origin(&self, screen: usize) -> Point {
        let area = self.screens[screen].work_area();
        Point::new(area.x, area.y)
    }

    /// Hide every populated group, or show them all when everything is
    /// already hidden. The active group does not change.
    fn toggle_all_groups(&mut self) -> Result<()> {
        let groups: Vec<GroupId> = self
            .groups
            .iter()
            .filter(|(_, g)| !g.is_empty())
            .map(|(id, _)| id)
            .collect();
        let all_hidden = groups
            .iter()
            .all(|&g| self.groups.holds_only_hidden(&self.registry, g));
        let active = self.groups.active();

        for group in groups {
            if all_hidden {
                self.groups.show(&mut self.display, &mut self.registry, group)?;
            } else {
                self.groups.hide(&mut self.display, &mut self.registry, group)?;
            }
        }
        self.groups.set_active(active);
        Ok(())
    }

    /// Open an edit session; callers must not start one while another runs
    fn begin_group_edit(&mut self, screen: usize, group: Option<GroupId>) -> Result<()> {
        if !self.grab_keyboard(screen)? {
            return Ok(());
        }

        let group = match group {
            Some(group) => group,
            None => self.groups.create(NEW_GROUP_NAME),
        };
        self.groups.begin_edit(&mut self.registry, group);
        self.redraw_group(group)?;
        self.draw_group_edit(screen)
    }

    /// An edit session that is not in the middle of a rename
    fn edit_in_progress(&self) -> bool {
        matches!(self.groups.edit_state(), GroupEdit::Editing { .. })
    }

    pub(super) fn edit_toggle_member(&mut self, id: ClientId) -> Result<()> {
        if !self.edit_in_progress() {
            return Ok(());
        }
        self.groups.edit_toggle_member(&mut self.registry, id);
        self.redraw_border(id)
    }

    pub(super) fn commit_group_edit(&mut self, screen: usize) -> Result<()> {
        let group = self.groups.commit_edit(&mut self.registry);
        self.redraw_group(group)?;
        self.display.hide_overlay(screen)?;
        self.release_keyboard()
    }

    pub(super) fn abort_group_edit(&mut self, screen: usize) -> Result<()> {
        let members = self
            .groups
            .editing()
            .and_then(|g| self.groups.get(g))
            .map(|g| g.members.clone())
            .unwrap_or_default();

        self.groups.abort_edit(&mut self.registry);
        for id in members {
            self.redraw_border(id)?;
        }
        self.display.hide_overlay(screen)?;
        self.release_keyboard()
    }

    fn redraw_group(&mut self, group: GroupId) -> Result<()> {
        let members = self.groups.get(group).map(|g| g.members.clone()).unwrap_or_default();
        for id in members {
            self.redraw_border(id)?;
        }
        Ok(())
    }

    /// Overlay listing the group being edited and its members
    pub(super) fn draw_group_edit(&mut self, screen: usize) -> Result<()> {
        let Some(group) = self.groups.editing().and_then(|g| self.groups.get(g)) else {
            return self.display.hide_overlay(screen);
        };

        let header = match self.groups.rename_buffer() {
            Some(buffer) => format!("name: {}", buffer),
            None => format!("group: {}", group.name),
        };
        let mut lines = vec![header];
        lines.extend(
            group
                .members
                .iter()
                .filter_map(|&id| self.registry.get(id))
                .map(menu_title),
        );

        let origin = self.overlay_origin(screen);
        self.display.show_overlay(screen, origin, &lines, None)?;
        Ok(())
    }

    fn open_window_menu(&mut self, screen: usize, pointer: Option<Point>, kind: MenuKind) -> Result<()> {
        let items: Vec<MenuItem> = self
            .registry
            .iter()
            .filter(|(_, c)| c.screen == screen)
            .filter(|(_, c)| kind != MenuKind::HiddenWindows || c.is_hidden())
            .map(|(id, c)| MenuItem::client(menu_title(c), ClientCandidate::new(id, c)))
            .collect();
        if kind == MenuKind::HiddenWindows && items.is_empty() {
            debug!("No hidden windows");
            return Ok(());
        }
        self.open_menu(screen, Menu::new(kind, items), None, pointer)
    }

    fn open_command_menu(&mut self, screen: usize, pointer: Option<Point>) -> Result<()> {
        let items = self
            .commands
            .entries()
            .into_iter()
            .map(|entry| MenuItem::new(entry.name, MenuValue::Command(entry.path)))
            .collect();
        self.open_menu(screen, Menu::new(MenuKind::Commands, items), None, pointer)
    }

    fn open_group_menu(&mut self, screen: usize, pointer: Option<Point>) -> Result<()> {
        let items: Vec<MenuItem> = self
            .groups
            .iter()
            .filter(|(_, g)| !g.is_empty())
            .map(|(id, g)| {
                let text = match g.number {
                    Some(number) => format!("{} {}", number, g.name),
                    None => g.name.clone(),
                };
                MenuItem::new(text, MenuValue::Group(id))
            })
            .collect();
        if items.is_empty() {
            debug!("No groups with members");
            return Ok(());
        }
        self.open_menu(screen, Menu::new(MenuKind::Groups, items), None, pointer)
    }

    fn open_exec_menu(&mut self, screen: usize, pointer: Option<Point>) -> Result<()> {
        let path = std::env::var_os("PATH").unwrap_or_default();
        let items = commands::path_executables(&path)
            .into_iter()
            .map(|name| MenuItem::new(name.clone(), MenuValue::Command(name)))
            .collect();
        self.open_menu(screen, Menu::new(MenuKind::Exec, items), None, pointer)
    }

    fn open_label_menu(&mut self, id: ClientId, pointer: Option<Point>) -> Result<()> {
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        let screen = client.screen;
        let menu = Menu::new(MenuKind::Label, Vec::new()).with_query(client.label.as_deref().unwrap_or(""));
        self.open_menu(screen, menu, Some(id), pointer)
    }

    /// Grab input and route keys, motion and button release to the menu
    fn open_menu(&mut self, screen: usize, menu: Menu, target: Option<ClientId>, pointer: Option<Point>) -> Result<()> {
        if self.dispatcher.is_modal() {
            debug!("Another interactive session is running");
            return Ok(());
        }
        let origin = match pointer {
            Some(position) => position,
            None => self.display.query_pointer(screen)?,
        };

        self.menu = Some(MenuSession {
            menu,
            screen,
            origin,
            target,
        });
        if !self.grab_keyboard(screen)? || !self.display.grab_pointer(screen, CursorKind::Menu)? {
            warn!("Could not grab input for the menu");
            self.menu = None;
            return self.release_keyboard();
        }

        self.dispatcher.begin_modal();
        self.dispatcher
            .register_modal(Some(EventKind::KeyPress), None, Handler::MenuKey, false);
        self.dispatcher
            .register_modal(Some(EventKind::MotionNotify), None, Handler::MenuMotion, false);
        self.dispatcher
            .register_modal(Some(EventKind::ButtonRelease), None, Handler::MenuRelease, false);
        self.draw_menu()
    }

    fn draw_menu(&mut self) -> Result<()> {
        let Some(session) = &self.menu else {
            return Ok(());
        };
        let (lines, selected) = session.menu.lines();
        self.display
            .show_overlay(session.screen, session.origin, &lines, selected)?;
        Ok(())
    }

    /// Tear down the open menu and hand back its session
    pub(super) fn close_menu(&mut self) -> Result<Option<MenuSession>> {
        let session = self.menu.take();
        if let Some(session) = &session {
            self.display.hide_overlay(session.screen)?;
            self.display.ungrab_pointer()?;
        }
        self.dispatcher.end_modal();
        self.release_keyboard()?;
        Ok(session)
    }

    pub(super) fn menu_key(&mut self, event: &KeyEvent) -> Result<()> {
        let (lower, upper) = self.display.keysyms(event.keycode);
        let state = modifier::clean(event.state);
        let sym = if state & modifier::SHIFT != 0 { upper } else { lower };

        let input = match sym {
            keysym::RETURN | keysym::KP_ENTER => MenuInput::Select,
            keysym::ESCAPE => MenuInput::Abort,
            keysym::BACKSPACE => MenuInput::Backspace,
            keysym::UP => MenuInput::Up,
            keysym::DOWN => MenuInput::Down,
            keysym::TAB => MenuInput::Complete,
            sym if state & modifier::CONTROL != 0 => match keysym::to_char(sym) {
                Some('u') => MenuInput::Clear,
                Some('a') => MenuInput::ListAll,
                Some('p') => MenuInput::Up,
                Some('n') => MenuInput::Down,
                Some('h') => MenuInput::Backspace,
                _ => return Ok(()),
            },
            sym => match keysym::to_char(sym) {
                Some(c) if state & modifier::MOD1 == 0 => MenuInput::Char(c),
                _ => return Ok(()),
            },
        };

        let Some(session) = &mut self.menu else {
            return Ok(());
        };
        let outcome = session.menu.input(input);
        self.menu_outcome(outcome)
    }

    pub(super) fn menu_motion(&mut self, event: &PointerEvent) -> Result<()> {
        let line_height = self.display.overlay_line_height();
        let Some(session) = &mut self.menu else {
            return Ok(());
        };
        if let Some(line) = line_at(session.origin, event.root_position, line_height) {
            session.menu.hover_line(line);
        }
        self.draw_menu()
    }

    /// A release away from the opening position picks the line under the
    /// pointer, or aborts when there is none
    pub(super) fn menu_release(&mut self, event: &PointerEvent) -> Result<()> {
        let line_height = self.display.overlay_line_height();
        let Some(session) = &self.menu else {
            return Ok(());
        };
        if event.root_position == session.origin {
            return Ok(());
        }
        let outcome = match line_at(session.origin, event.root_position, line_height) {
            Some(line) => session.menu.select_line(line),
            None => MenuOutcome::Aborted,
        };
        self.menu_outcome(outcome)
    }

    fn menu_outcome(&mut self, outcome: MenuOutcome) -> Result<()> {
        match outcome {
            MenuOutcome::Pending => self.draw_menu(),
            MenuOutcome::Aborted => {
                debug!("Menu aborted");
                self.close_menu().map(|_| ())
            }
            MenuOutcome::Selected(value) => {
                let Some(session) = self.close_menu()? else {
                    return Ok(());
                };
                self.apply_menu_value(session, value)
            }
        }
    }

    fn apply_menu_value(&mut self, session: MenuSession, value: MenuValue) -> Result<()> {
        match (session.menu.kind, value) {
            (MenuKind::Label, MenuValue::Text(text)) => {
                let Some(client) = session.target.and_then(|id| self.registry.get_mut(id)) else {
                    return Ok(());
                };
                let text = text.trim();
                client.label = (!text.is_empty()).then(|| text.to_string());
                Ok(())
            }
            (_, MenuValue::Client(id)) => {
                if let Some(active) = self.registry.active() {
                    self.save_pointer(active)?;
                }
                self.show_client(id, true)
            }
            (_, MenuValue::Command(command)) | (MenuKind::Exec, MenuValue::Text(command)) => {
                self.spawn(&command)
            }
            (_, MenuValue::Group(group)) => {
                self.groups
                    .toggle(&mut self.display, &mut self.registry, group)
            }
            (kind, value) => {
                debug!("{:?} menu ignores {:?}", kind, value);
                Ok(())
            }
        }
    }

    /// Start a pointer move or resize; frozen clients stay put
    fn start_drag(&mut self, kind: DragKind, id: ClientId, pointer: Point, screen: usize) -> Result<()> {
        if self.dispatcher.is_modal() {
            debug!("Another interactive session is running");
            return Ok(());
        }
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        if !DragSession::allowed(client) {
            debug!("Window 0x{:x} is frozen", client.window);
            return Ok(());
        }

        let cursor = match kind {
            DragKind::Move => CursorKind::Move,
            DragKind::Resize => CursorKind::Resize,
        };
        if !self.display.grab_pointer(screen, cursor)? {
            warn!("Could not grab the pointer for a drag");
            return Ok(());
        }

        let (session, position) = match kind {
            DragKind::Move => (DragSession::begin_move(id, client, pointer), pointer),
            DragKind::Resize => DragSession::begin_resize(id, client),
        };
        let readout = session.readout(client);
        let frame = client.frame;
        if kind == DragKind::Resize {
            self.display.warp_pointer(screen, position)?;
        }
        self.display.raise(frame)?;

        self.dispatcher.begin_modal();
        self.dispatcher
            .register_modal(Some(EventKind::MotionNotify), None, Handler::DragMotion, false);
        self.dispatcher
            .register_modal(Some(EventKind::ButtonRelease), None, Handler::DragRelease, true);
        self.dispatcher
            .register_modal(Some(EventKind::KeyPress), None, Handler::DragKey, false);
        self.drag = Some(session);
        self.display.show_overlay(screen, position, &[readout], None)?;
        Ok(())
    }

    pub(super) fn drag_motion(&mut self, event: &PointerEvent) -> Result<()> {
        let Some(drag) = &mut self.drag else {
            return Ok(());
        };
        if !drag.throttle(event.time) {
            return Ok(());
        }
        let id = drag.client;
        let Some(client) = self.registry.get_mut(id) else {
            return Ok(());
        };
        let screen = client.screen;
        let area = self.screens[screen].work_area();
        let snap = self.config.general.snap_distance as i32;

        if drag.motion(client, event.root_position, area, snap) {
            let readout = drag.readout(client);
            self.apply_geometry(id)?;
            self.display
                .show_overlay(screen, event.root_position, &[readout], None)?;
        }
        Ok(())
    }

    /// Escape puts the window back and ends the drag
    pub(super) fn drag_key(&mut self, event: &KeyEvent) -> Result<()> {
        let (sym, _) = self.display.keysyms(event.keycode);
        if sym != keysym::ESCAPE {
            return Ok(());
        }
        let Some(drag) = &self.drag else {
            return Ok(());
        };
        let id = drag.client;
        if let Some(client) = self.registry.get_mut(id) {
            drag.abort(client);
        }
        self.apply_geometry(id)?;
        self.end_drag()
    }

    pub(super) fn end_drag(&mut self) -> Result<()> {
        let Some(drag) = self.drag.take() else {
            return Ok(());
        };
        let screen = self.registry.get(drag.client).map_or(0, |c| c.screen);
        self.display.ungrab_pointer()?;
        self.display.hide_overlay(screen)?;
        self.dispatcher.end_modal();
        Ok(())
    }
}

/// Overlay line under a root position, counting from `origin`
fn line_at(origin: Point, position: Point, line_height: u32) -> Option<usize> {
    if position.x < origin.x || position.y < origin.y {
        return None;
    }
    Some(((position.y - origin.y) as u32 / line_height.max(1)) as usize)
}

fn menu_title(client: &Client) -> String {
    match &client.label {
        Some(label) => format!("{} [{}]", client.name(), label),
        None => client.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::shared::Geometry;
    use crate::wm::adapter::Event;
    use crate::wm::testing::{Call, FakeDisplay, ROOT};
    use crate::wm::tests::{map, wm, wm_with};
    use pretty_assertions::assert_eq;

    fn key(wm: &WindowManager<FakeDisplay>, sym: u32, state: u16) -> Event {
        Event::KeyPress(KeyEvent {
            window: ROOT,
            root: ROOT,
            keycode: wm.display.keycode(sym),
            state,
            time: 0,
        })
    }

    fn typed(wm: &mut WindowManager<FakeDisplay>, text: &str) {
        for c in text.chars() {
            let event = key(wm, c as u32, 0);
            wm.handle_event(event);
        }
    }

    fn pointer(window: u32, x: i32, y: i32, button: u8, state: u16, time: u32) -> PointerEvent {
        PointerEvent {
            window,
            root: ROOT,
            child: None,
            root_position: Point::new(x, y),
            button,
            state,
            time,
        }
    }

    #[test]
    fn cycling_walks_mru_and_settles_on_release() {
        let mut wm = wm();
        let a = map(&mut wm, 100, "a");
        let b = map(&mut wm, 101, "b");
        let c = map(&mut wm, 102, "c");
        wm.set_active(Some(a), true).unwrap();

        let tab = key(&wm, keysym::TAB, modifier::MOD1);
        wm.handle_event(tab.clone());
        assert_eq!(wm.registry.active(), Some(b));
        wm.handle_event(tab);
        assert_eq!(wm.registry.active(), Some(c));
        assert_eq!(wm.cycle.mru(0), &[a, b, c]);

        wm.handle_event(Event::KeyRelease(KeyEvent {
            window: ROOT,
            root: ROOT,
            keycode: wm.display.keycode(keysym::ALT_L),
            state: modifier::MOD1,
            time: 0,
        }));
        assert_eq!(wm.cycle.mru(0), &[c, a, b]);
        assert!(!wm.keyboard_grabbed);
        assert!(wm.display.calls.contains(&Call::HideOverlay(0)));
    }

    #[test]
    fn cycling_skips_hidden_clients() {
        let mut wm = wm();
        let a = map(&mut wm, 100, "a");
        let b = map(&mut wm, 101, "b");
        let c = map(&mut wm, 102, "c");
        wm.set_active(Some(a), true).unwrap();
        wm.hide_client(b).unwrap();

        let tab = key(&wm, keysym::TAB, modifier::MOD1);
        wm.handle_event(tab);
        assert_eq!(wm.registry.active(), Some(c));
    }

    #[test]
    fn cycling_needs_the_keyboard() {
        let mut wm = wm();
        let a = map(&mut wm, 100, "a");
        map(&mut wm, 101, "b");
        wm.set_active(Some(a), true).unwrap();
        wm.display.grabs_fail = true;

        let tab = key(&wm, keysym::TAB, modifier::MOD1);
        wm.handle_event(tab);
        assert_eq!(wm.registry.active(), Some(a));
        assert!(!wm.cycle.is_cycling(0));
    }

    #[test]
    fn window_search_shows_selected_client() {
        let mut wm = wm();
        map(&mut wm, 100, "alpha");
        let b = map(&mut wm, 101, "beta");
        wm.hide_client(b).unwrap();

        wm.run_action(&Action::MenuWindow, None, 0, None).unwrap();
        assert!(wm.dispatcher.is_modal());
        typed(&mut wm, "be");
        let enter = key(&wm, keysym::RETURN, 0);
        wm.handle_event(enter);

        let client = wm.registry.get(b).unwrap();
        assert!(!client.is_hidden());
        assert!(client.is_active());
        assert!(!wm.dispatcher.is_modal());
        assert!(!wm.keyboard_grabbed);
        assert!(wm.display.calls.contains(&Call::UngrabPointer));
    }

    #[test]
    fn escape_closes_menu_without_effect() {
        let mut wm = wm();
        let a = map(&mut wm, 100, "alpha");
        wm.hide_client(a).unwrap();

        wm.run_action(&Action::MenuWindow, None, 0, None).unwrap();
        typed(&mut wm, "al");
        let escape = key(&wm, keysym::ESCAPE, 0);
        wm.handle_event(escape);
        assert!(wm.registry.get(a).unwrap().is_hidden());
        assert!(wm.menu.is_none());
        assert!(!wm.dispatcher.is_modal());
    }

    #[test]
    fn label_menu_sets_and_clears_label() {
        let mut wm = wm();
        let a = map(&mut wm, 100, "a");
        wm.set_active(Some(a), true).unwrap();
        let open = key(&wm, 'n' as u32, modifier::CONTROL | modifier::MOD1);
        let enter = key(&wm, keysym::RETURN, 0);

        wm.handle_event(open.clone());
        typed(&mut wm, "mail");
        wm.handle_event(enter.clone());
        assert_eq!(wm.registry.get(a).unwrap().label.as_deref(), Some("mail"));

        wm.handle_event(open);
        let clear = key(&wm, 'u' as u32, modifier::CONTROL);
        wm.handle_event(clear);
        wm.handle_event(enter);
        assert_eq!(wm.registry.get(a).unwrap().label, None);
    }

    #[test]
    fn root_click_menu_selects_on_release() {
        let mut wm = wm();
        let a = map(&mut wm, 100, "a");
        wm.hide_client(a).unwrap();

        wm.handle_event(Event::ButtonPress(pointer(ROOT, 100, 100, 1, 0, 0)));
        assert!(wm.menu.is_some());
        wm.handle_event(Event::MotionNotify(pointer(ROOT, 110, 105, 0, 0, 5)));
        wm.handle_event(Event::ButtonRelease(pointer(ROOT, 110, 105, 1, 0, 10)));

        assert!(!wm.registry.get(a).unwrap().is_hidden());
        assert!(!wm.dispatcher.is_modal());
    }

    #[test]
    fn root_click_menu_release_outside_aborts() {
        let mut wm = wm();
        let a = map(&mut wm, 100, "a");
        wm.hide_client(a).unwrap();

        wm.handle_event(Event::ButtonPress(pointer(ROOT, 100, 100, 1, 0, 0)));
        wm.handle_event(Event::ButtonRelease(pointer(ROOT, 110, 170, 1, 0, 10)));
        assert!(wm.registry.get(a).unwrap().is_hidden());
        assert!(wm.menu.is_none());
    }

    #[test]
    fn hidden_menu_without_hidden_windows_stays_closed() {
        let mut wm = wm();
        map(&mut wm, 100, "a");
        wm.handle_event(Event::ButtonPress(pointer(ROOT, 100, 100, 1, 0, 0)));
        assert!(wm.menu.is_none());
        assert!(!wm.dispatcher.is_modal());
    }

    #[test]
    fn drag_move_follows_pointer_and_escape_restores() {
        let mut wm = wm();
        let a = map(&mut wm, 100, "a");
        let frame = wm.registry.get(a).unwrap().frame;
        let start = wm.registry.get(a).unwrap().geometry;

        wm.handle_event(Event::ButtonPress(pointer(frame, 500, 300, 1, modifier::MOD1, 0)));
        assert!(wm.drag.is_some());
        wm.handle_event(Event::MotionNotify(pointer(frame, 550, 320, 0, modifier::MOD1, 100)));
        assert_eq!(
            wm.registry.get(a).unwrap().geometry,
            Geometry::new(start.x + 50, start.y + 20, start.width, start.height)
        );

        // structural events wait for the drag to finish
        wm.handle_event(Event::UnmapNotify { window: 100, synthetic: false });
        assert!(wm.registry.get(a).is_some());

        let escape = key(&wm, keysym::ESCAPE, 0);
        wm.handle_event(escape);
        assert!(wm.drag.is_none());
        assert!(!wm.dispatcher.is_modal());
        assert!(wm.registry.get(a).is_none());
    }

    #[test]
    fn drag_release_keeps_new_position() {
        let mut wm = wm();
        let a = map(&mut wm, 100, "a");
        let frame = wm.registry.get(a).unwrap().frame;
        let start = wm.registry.get(a).unwrap().geometry;

        wm.handle_event(Event::ButtonPress(pointer(frame, 500, 300, 1, modifier::MOD1, 0)));
        wm.handle_event(Event::MotionNotify(pointer(frame, 480, 310, 0, modifier::MOD1, 100)));
        wm.handle_event(Event::ButtonRelease(pointer(frame, 480, 310, 1, modifier::MOD1, 120)));

        assert!(wm.drag.is_none());
        let geometry = wm.registry.get(a).unwrap().geometry;
        assert_eq!((geometry.x, geometry.y), (start.x - 20, start.y + 10));
    }

    #[test]
    fn drag_resize_starts_at_corner() {
        let mut wm = wm();
        let a = map(&mut wm, 100, "a");
        let frame = wm.registry.get(a).unwrap().frame;
        let start = wm.registry.get(a).unwrap().geometry;

        wm.handle_event(Event::ButtonPress(pointer(frame, 500, 300, 2, modifier::MOD1, 0)));
        let corner = Point::new(start.right(), start.bottom());
        assert!(wm.display.calls.contains(&Call::Warp(0, corner)));
        assert!(wm.display.calls.contains(&Call::GrabPointer(CursorKind::Resize)));
    }

    #[test]
    fn frozen_client_is_not_dragged() {
        let mut wm = wm();
        let a = map(&mut wm, 100, "a");
        wm.run_action(&Action::Freeze, Some(a), 0, None).unwrap();
        let frame = wm.registry.get(a).unwrap().frame;

        wm.handle_event(Event::ButtonPress(pointer(frame, 500, 300, 1, modifier::MOD1, 0)));
        assert!(wm.drag.is_none());
        assert!(!wm.dispatcher.is_modal());
    }

    #[test]
    fn maximize_toggles_back() {
        let mut wm = wm();
        let a = map(&mut wm, 100, "a");
        let before = wm.registry.get(a).unwrap().geometry;

        wm.run_action(&Action::Maximize, Some(a), 0, None).unwrap();
        assert_eq!(wm.registry.get(a).unwrap().geometry, Geometry::new(0, 0, 1278, 798));
        wm.run_action(&Action::Maximize, Some(a), 0, None).unwrap();
        assert_eq!(wm.registry.get(a).unwrap().geometry, before);
    }

    #[test]
    fn group_toggle_hides_and_shows_members() {
        let mut wm = wm();
        let a = map(&mut wm, 100, "a");
        wm.run_action(&Action::MoveToGroup(2), Some(a), 0, None).unwrap();
        assert_eq!(wm.registry.get(a).unwrap().group, wm.groups.by_number(2));

        wm.run_action(&Action::GroupToggle(2), None, 0, None).unwrap();
        assert!(wm.registry.get(a).unwrap().is_hidden());
        wm.run_action(&Action::GroupToggle(2), None, 0, None).unwrap();
        assert!(!wm.registry.get(a).unwrap().is_hidden());
    }

    #[test]
    fn toggle_all_hides_then_shows_everything() {
        let mut wm = wm();
        let a = map(&mut wm, 100, "a");
        let b = map(&mut wm, 101, "b");
        wm.run_action(&Action::MoveToGroup(1), Some(a), 0, None).unwrap();
        wm.run_action(&Action::MoveToGroup(2), Some(b), 0, None).unwrap();

        wm.run_action(&Action::GroupToggleAll, None, 0, None).unwrap();
        assert!(wm.registry.get(a).unwrap().is_hidden());
        assert!(wm.registry.get(b).unwrap().is_hidden());

        wm.run_action(&Action::GroupToggleAll, None, 0, None).unwrap();
        assert!(!wm.registry.get(a).unwrap().is_hidden());
        assert!(!wm.registry.get(b).unwrap().is_hidden());
    }

    #[test]
    fn second_group_edit_is_refused() {
        let mut wm = wm();
        let count = wm.groups.ids().len();
        wm.run_action(&Action::GroupEditNew, None, 0, None).unwrap();
        let editing = wm.groups.editing();
        wm.run_action(&Action::GroupEditNew, None, 0, None).unwrap();

        assert_eq!(wm.groups.editing(), editing);
        assert_eq!(wm.groups.ids().len(), count + 1);
    }

    #[test]
    fn keyboard_move_uses_move_amount() {
        let mut wm = wm();
        let a = map(&mut wm, 100, "a");
        wm.set_active(Some(a), true).unwrap();
        let before = wm.registry.get(a).unwrap().geometry;
        let amount = wm.config.general.move_amount as i32;

        let right = key(&wm, 'l' as u32, modifier::MOD1);
        wm.handle_event(right);
        let big_down = key(&wm, 'J' as u32, modifier::MOD1 | modifier::SHIFT);
        wm.handle_event(big_down);

        let after = wm.registry.get(a).unwrap().geometry;
        assert_eq!(after.x, before.x + amount);
        assert_eq!(after.y, before.y + amount * BIG_STEP);
    }

    #[test]
    fn quit_and_restart_set_run_state() {
        let mut wm = wm();
        wm.run_action(&Action::Restart, None, 0, None).unwrap();
        assert_eq!(wm.run_state(), RunState::Restart);
        wm.run_action(&Action::Quit, None, 0, None).unwrap();
        assert_eq!(wm.run_state(), RunState::Quit);
    }

    #[test]
    #[should_panic(expected = "another session")]
    fn second_group_edit_is_a_bug() {
        let mut wm = wm();
        wm.run_action(&Action::GroupEditNew, None, 0, None).unwrap();
        let _ = wm.run_action(&Action::GroupEditActive, None, 0, None);
    }

    #[tokio::test]
    async fn terminal_spawns_without_touching_clients() {
        let mut config = Config::default();
        config.commands.terminal = "true".to_string();
        let mut wm = wm_with(config, &[]);
        let a = map(&mut wm, 100, "a");
        wm.set_active(Some(a), true).unwrap();
        wm.display.take_calls();

        assert!(!Action::Terminal.needs_client());
        wm.run_action(&Action::Terminal, None, 0, None).unwrap();

        assert_eq!(wm.run_state(), RunState::Running);
        assert_eq!(wm.registry.active(), Some(a));
        assert!(wm.display.take_calls().is_empty());
    }
}
