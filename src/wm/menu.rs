//! Menu Module
//!
//! Interactive menus (window search, command and group lists, exec prompt,
//! label entry). A menu is a small state machine fed one input at a time;
//! the window manager owns the grab and the overlay.

use crate::wm::client::ClientId;
use crate::wm::group::GroupId;
use crate::wm::search::{self, ClientCandidate};

/// What a menu lists and how it filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKind {
    /// Search over all clients
    Windows,
    /// Pointer menu of hidden clients
    HiddenWindows,
    Commands,
    Groups,
    /// Executable prefix completion
    Exec,
    /// Free-text label for the target client
    Label,
}

impl MenuKind {
    /// Menus that show every entry before anything is typed
    fn lists_initially(self) -> bool {
        matches!(self, MenuKind::HiddenWindows | MenuKind::Commands | MenuKind::Groups)
    }

    /// Menus where Select with no match returns the typed text
    fn accepts_text(self) -> bool {
        matches!(self, MenuKind::Exec | MenuKind::Label)
    }

    fn prompt(self) -> Option<&'static str> {
        match self {
            MenuKind::Windows => Some("window"),
            MenuKind::Exec => Some("exec"),
            MenuKind::Label => Some("label"),
            MenuKind::HiddenWindows | MenuKind::Commands | MenuKind::Groups => None,
        }
    }
}

/// Payload of a menu entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuValue {
    Client(ClientId),
    /// Command line to spawn
    Command(String),
    Group(GroupId),
    /// Text typed by the user
    Text(String),
}

#[derive(Debug, Clone)]
pub struct MenuItem {
    pub text: String,
    pub value: MenuValue,
    /// Ranking data for client entries
    pub candidate: Option<ClientCandidate>,
}

impl MenuItem {
    pub fn new(text: impl Into<String>, value: MenuValue) -> Self {
        Self {
            text: text.into(),
            value,
            candidate: None,
        }
    }

    pub fn client(text: impl Into<String>, candidate: ClientCandidate) -> Self {
        Self {
            text: text.into(),
            value: MenuValue::Client(candidate.id),
            candidate: Some(candidate),
        }
    }
}

/// Keyboard input understood by menus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuInput {
    Char(char),
    Backspace,
    /// Erase the whole query
    Clear,
    Up,
    Down,
    Select,
    Abort,
    /// Replace the query with the highlighted entry
    Complete,
    /// Show every entry regardless of the query
    ListAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuOutcome {
    Pending,
    Selected(MenuValue),
    Aborted,
}

#[derive(Debug, Clone)]
pub struct Menu {
    pub kind: MenuKind,
    query: String,
    items: Vec<MenuItem>,
    /// Indices into `items`, best first
    results: Vec<usize>,
    selected: usize,
    list_all: bool,
}

impl Menu {
    pub fn new(kind: MenuKind, items: Vec<MenuItem>) -> Self {
        let mut menu = Self {
            kind,
            query: String::new(),
            items,
            results: Vec::new(),
            selected: 0,
            list_all: kind.lists_initially(),
        };
        menu.refilter();
        menu
    }

    /// Start with text already typed
    pub fn with_query(mut self, query: &str) -> Self {
        self.query = query.to_string();
        self.refilter();
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> impl Iterator<Item = &MenuItem> {
        self.results.iter().map(|&i| &self.items[i])
    }

    #[cfg(test)]
    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    pub fn selected(&self) -> Option<&MenuItem> {
        self.results.get(self.selected).map(|&i| &self.items[i])
    }

    pub fn input(&mut self, input: MenuInput) -> MenuOutcome {
        match input {
            MenuInput::Char(c) => {
                self.query.push(c);
                self.refilter();
            }
            MenuInput::Backspace => {
                if self.query.pop().is_some() {
                    self.refilter();
                }
            }
            MenuInput::Clear => {
                self.query.clear();
                self.refilter();
            }
            MenuInput::Up => {
                if !self.results.is_empty() {
                    self.selected = (self.selected + self.results.len() - 1) % self.results.len();
                }
            }
            MenuInput::Down => {
                if !self.results.is_empty() {
                    self.selected = (self.selected + 1) % self.results.len();
                }
            }
            MenuInput::Complete => {
                if let Some(text) = self.selected().map(|item| item.text.clone()) {
                    self.query = text;
                    self.refilter();
                }
            }
            MenuInput::ListAll => {
                self.list_all = true;
                self.refilter();
            }
            MenuInput::Select => return self.select(),
            MenuInput::Abort => return MenuOutcome::Aborted,
        }
        MenuOutcome::Pending
    }

    fn select(&self) -> MenuOutcome {
        if let Some(item) = self.selected() {
            return MenuOutcome::Selected(item.value.clone());
        }
        // an empty label clears it
        if self.kind == MenuKind::Label || (self.kind.accepts_text() && !self.query.is_empty()) {
            return MenuOutcome::Selected(MenuValue::Text(self.query.clone()));
        }
        MenuOutcome::Aborted
    }

    /// Pick the entry drawn on an overlay line (pointer menus)
    pub fn select_line(&self, line: usize) -> MenuOutcome {
        let offset = usize::from(self.kind.prompt().is_some());
        line.checked_sub(offset)
            .and_then(|i| self.results.get(i))
            .map_or(MenuOutcome::Aborted, |&i| {
                MenuOutcome::Selected(self.items[i].value.clone())
            })
    }

    /// Highlight the entry drawn on an overlay line
    pub fn hover_line(&mut self, line: usize) {
        let offset = usize::from(self.kind.prompt().is_some());
        if let Some(i) = line.checked_sub(offset).filter(|&i| i < self.results.len()) {
            self.selected = i;
        }
    }

    /// Overlay text and the highlighted line
    pub fn lines(&self) -> (Vec<String>, Option<usize>) {
        let mut lines = Vec::with_capacity(self.results.len() + 1);
        let offset = match self.kind.prompt() {
            Some(prompt) => {
                lines.push(format!("{}: {}", prompt, self.query));
                1
            }
            None => 0,
        };
        lines.extend(self.results().map(|item| item.text.clone()));
        let selected = (!self.results.is_empty()).then_some(self.selected + offset);
        (lines, selected)
    }

    /// Recompute results from scratch for the current query
    fn refilter(&mut self) {
        self.selected = 0;

        if self.query.is_empty() {
            self.results = if self.list_all {
                (0..self.items.len()).collect()
            } else {
                Vec::new()
            };
            return;
        }

        self.results = match self.kind {
            MenuKind::Windows | MenuKind::HiddenWindows => {
                let candidates: Vec<ClientCandidate> = self
                    .items
                    .iter()
                    .filter_map(|item| item.candidate.clone())
                    .collect();
                search::rank_clients(&self.query, &candidates)
                    .into_iter()
                    .filter_map(|hit| {
                        self.items
                            .iter()
                            .position(|item| item.value == MenuValue::Client(hit.id))
                    })
                    .collect()
            }
            MenuKind::Commands | MenuKind::Groups => {
                search::filter_text(&self.query, self.items.iter().map(|i| i.text.as_str()))
            }
            MenuKind::Exec => {
                search::filter_path(&self.query, self.items.iter().map(|i| i.text.as_str()))
            }
            MenuKind::Label => Vec::new(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use slotmap::SlotMap;

    fn commands() -> Vec<MenuItem> {
        ["term", "lock", "xterm"]
            .iter()
            .map(|name| MenuItem::new(*name, MenuValue::Command(format!("/usr/bin/{name}"))))
            .collect()
    }

    fn type_text(menu: &mut Menu, text: &str) {
        for c in text.chars() {
            assert_eq!(menu.input(MenuInput::Char(c)), MenuOutcome::Pending);
        }
    }

    #[test]
    fn command_menu_lists_everything_initially() {
        let menu = Menu::new(MenuKind::Commands, commands());
        assert_eq!(menu.result_count(), 3);
        let (lines, selected) = menu.lines();
        assert_eq!(lines, vec!["term", "lock", "xterm"]);
        assert_eq!(selected, Some(0));
    }

    #[test]
    fn typing_refilters_and_backspace_widens() {
        let mut menu = Menu::new(MenuKind::Commands, commands());
        type_text(&mut menu, "term");
        assert_eq!(menu.result_count(), 2);
        type_text(&mut menu, "x");
        assert_eq!(menu.result_count(), 0);
        menu.input(MenuInput::Backspace);
        assert_eq!(menu.result_count(), 2);
        menu.input(MenuInput::Clear);
        assert_eq!(menu.result_count(), 3);
    }

    #[test]
    fn navigation_wraps_and_select_returns_value() {
        let mut menu = Menu::new(MenuKind::Commands, commands());
        menu.input(MenuInput::Up);
        assert_eq!(
            menu.input(MenuInput::Select),
            MenuOutcome::Selected(MenuValue::Command("/usr/bin/xterm".to_string()))
        );
        menu.input(MenuInput::Down);
        assert_eq!(menu.selected().map(|i| i.text.as_str()), Some("term"));
    }

    #[test]
    fn search_menu_is_empty_until_typed() {
        let mut ids: SlotMap<ClientId, ()> = SlotMap::with_key();
        let id = ids.insert(());
        let candidate = ClientCandidate {
            id,
            label: None,
            names: vec!["mutt".to_string()],
            class: "XTerm".to_string(),
            active: false,
            hidden: false,
        };
        let mut menu = Menu::new(MenuKind::Windows, vec![MenuItem::client("mutt", candidate)]);
        assert_eq!(menu.result_count(), 0);
        assert_eq!(menu.lines(), (vec!["window: ".to_string()], None));

        type_text(&mut menu, "xt");
        assert_eq!(menu.input(MenuInput::Select), MenuOutcome::Selected(MenuValue::Client(id)));

        menu.input(MenuInput::Clear);
        menu.input(MenuInput::ListAll);
        assert_eq!(menu.result_count(), 1);
    }

    #[test]
    fn exec_completes_and_accepts_free_text() {
        let items = ["firefox", "xterm", "xclock"]
            .iter()
            .map(|name| MenuItem::new(*name, MenuValue::Command(name.to_string())))
            .collect();
        let mut menu = Menu::new(MenuKind::Exec, items);
        type_text(&mut menu, "xc");
        menu.input(MenuInput::Complete);
        assert_eq!(menu.query(), "xclock");

        menu.input(MenuInput::Clear);
        type_text(&mut menu, "xclock -digital");
        assert_eq!(
            menu.input(MenuInput::Select),
            MenuOutcome::Selected(MenuValue::Text("xclock -digital".to_string()))
        );
    }

    #[test]
    fn select_with_nothing_matching_aborts() {
        let mut menu = Menu::new(MenuKind::Groups, Vec::new());
        assert_eq!(menu.input(MenuInput::Select), MenuOutcome::Aborted);
        assert_eq!(menu.input(MenuInput::Abort), MenuOutcome::Aborted);
    }

    #[test]
    fn pointer_lines_map_to_results() {
        let mut menu = Menu::new(MenuKind::Commands, commands());
        menu.hover_line(2);
        assert_eq!(menu.selected().map(|i| i.text.as_str()), Some("xterm"));
        assert_eq!(menu.select_line(7), MenuOutcome::Aborted);
        assert_eq!(
            menu.select_line(1),
            MenuOutcome::Selected(MenuValue::Command("/usr/bin/lock".to_string()))
        );
    }

    #[test]
    fn label_menu_starts_with_current_label() {
        let mut menu = Menu::new(MenuKind::Label, Vec::new()).with_query("mail");
        menu.input(MenuInput::Char('2'));
        assert_eq!(
            menu.input(MenuInput::Select),
            MenuOutcome::Selected(MenuValue::Text("mail2".to_string()))
        );
    }

    #[test]
    fn empty_label_selects_empty_text() {
        let mut menu = Menu::new(MenuKind::Label, Vec::new());
        assert_eq!(
            menu.input(MenuInput::Select),
            MenuOutcome::Selected(MenuValue::Text(String::new()))
        );
    }
}
