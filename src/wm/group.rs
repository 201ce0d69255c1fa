//! Group Module
//!
//! Named sets of clients that are shown and hidden together. Nine numbered
//! groups always exist; more can be created from a group-edit session.
//! Clients without a group are never hidden by group operations.

use anyhow::Result;
use slotmap::{new_key_type, SlotMap};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::config::AutogroupRule;
use crate::wm::adapter::DisplayAdapter;
use crate::wm::client::{Client, ClientId};
use crate::wm::client_flags::{ClientFlags, Highlight};
use crate::wm::registry::ClientRegistry;
use crate::wm::stacking;

new_key_type! {
    /// Stable handle of a group
    pub struct GroupId;
}

/// Number of always-present numbered groups
pub const NUMBERED_GROUPS: usize = 9;

const DEFAULT_NAMES: [&str; NUMBERED_GROUPS] = [
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
];

#[derive(Debug, Clone)]
pub struct Group {
    pub name: String,

    /// 1-based number of a fixed group, `None` for groups created at runtime
    pub number: Option<usize>,

    /// Members in order of joining
    pub members: Vec<ClientId>,

    pub hidden: bool,

    /// Members hidden by the last `hide`
    pub hidden_count: usize,

    /// Highest stack rank among members at the last `hide`
    pub highest_rank: u32,
}

impl Group {
    fn new(name: &str, number: Option<usize>) -> Self {
        Self {
            name: name.to_string(),
            number,
            members: Vec::new(),
            hidden: false,
            hidden_count: 0,
            highest_rank: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_custom(&self) -> bool {
        self.number.is_none()
    }
}

/// Group-edit session state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GroupEdit {
    #[default]
    Idle,
    /// Membership changes apply to `group`
    Editing { group: GroupId },
    /// Keystrokes go to a name buffer for `group`
    Renaming { group: GroupId, buffer: String },
}

/// Input accepted while renaming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameKey {
    Char(char),
    Backspace,
    Confirm,
    Cancel,
}

#[derive(Debug)]
pub struct GroupManager {
    groups: SlotMap<GroupId, Group>,

    /// Circular order used by sliding (numbered groups first)
    order: Vec<GroupId>,

    active: GroupId,

    edit: GroupEdit,
}

impl GroupManager {
    /// Create the numbered groups; `names` overrides the default names in order
    pub fn new(names: &[String]) -> Self {
        let mut groups = SlotMap::with_key();
        let mut order = Vec::with_capacity(NUMBERED_GROUPS);
        for (i, default) in DEFAULT_NAMES.iter().enumerate() {
            let name = names.get(i).map(String::as_str).unwrap_or(default);
            order.push(groups.insert(Group::new(name, Some(i + 1))));
        }
        let active = order[0];

        Self {
            groups,
            order,
            active,
            edit: GroupEdit::Idle,
        }
    }

    pub fn get(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id)
    }

    pub fn contains(&self, id: GroupId) -> bool {
        self.groups.contains_key(id)
    }

    /// Groups in cycling order
    pub fn ids(&self) -> &[GroupId] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (GroupId, &Group)> {
        self.order
            .iter()
            .filter_map(|&id| self.groups.get(id).map(|g| (id, g)))
    }

    /// Numbered group 1..=9
    pub fn by_number(&self, number: usize) -> Option<GroupId> {
        self.iter()
            .find(|(_, g)| g.number == Some(number))
            .map(|(id, _)| id)
    }

    pub fn by_name(&self, name: &str) -> Option<GroupId> {
        self.iter()
            .find(|(_, g)| g.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| id)
    }

    pub fn active(&self) -> GroupId {
        self.active
    }

    pub fn set_active(&mut self, id: GroupId) {
        if self.groups.contains_key(id) {
            debug!("Active group is now {:?}", self.groups[id].name);
            self.active = id;
        }
    }

    /// Create an empty runtime group at the end of the cycling order
    pub fn create(&mut self, name: &str) -> GroupId {
        let id = self.groups.insert(Group::new(name, None));
        self.order.push(id);
        info!("Created group {:?}", name);
        id
    }

    /// Put a client into a group, leaving any previous group first
    pub fn add(&mut self, registry: &mut ClientRegistry, group: GroupId, client: ClientId) {
        if !self.groups.contains_key(group) || !registry.contains(client) {
            return;
        }
        if registry.get(client).and_then(|c| c.group) == Some(group) {
            return;
        }
        self.remove(registry, client);

        self.groups[group].members.push(client);
        let editing = self.editing() == Some(group);
        if let Some(c) = registry.get_mut(client) {
            c.group = Some(group);
            if editing {
                c.highlight = Highlight::Primary;
                c.flags.remove(ClientFlags::GROUP_COMMITTED);
            } else {
                c.flags.insert(ClientFlags::GROUP_COMMITTED);
            }
        }
    }

    /// Take a client out of its group and clear its highlight
    pub fn remove(&mut self, registry: &mut ClientRegistry, client: ClientId) -> Option<GroupId> {
        let c = registry.get_mut(client)?;
        c.highlight = Highlight::None;
        c.flags.remove(ClientFlags::GROUP_COMMITTED);
        let group = c.group.take()?;

        if let Some(g) = self.groups.get_mut(group) {
            g.members.retain(|&m| m != client);
        }
        Some(group)
    }

    /// Detach every member; runtime groups are dropped entirely
    pub fn destroy(&mut self, registry: &mut ClientRegistry, group: GroupId) {
        let Some(g) = self.groups.get(group) else {
            return;
        };
        for client in g.members.clone() {
            self.remove(registry, client);
        }

        if self.groups[group].is_custom() {
            info!("Destroying group {:?}", self.groups[group].name);
            self.groups.remove(group);
            self.order.retain(|&id| id != group);
            if self.active == group {
                self.active = self.order[0];
            }
        }
    }

    /// Whether every member of a group is hidden (true for an empty group)
    pub fn holds_only_hidden(&self, registry: &ClientRegistry, group: GroupId) -> bool {
        self.groups.get(group).is_none_or(|g| {
            g.members
                .iter()
                .filter_map(|&id| registry.get(id))
                .all(Client::is_hidden)
        })
    }

    /// Hide every member, remembering how to restack them on `show`
    pub fn hide<D: DisplayAdapter>(
        &mut self,
        display: &mut D,
        registry: &mut ClientRegistry,
        group: GroupId,
    ) -> Result<()> {
        let Some(g) = self.groups.get(group) else {
            return Ok(());
        };
        debug!("Hiding group {:?}", g.name);

        let screens: BTreeSet<usize> = g
            .members
            .iter()
            .filter_map(|&id| registry.get(id))
            .map(|c| c.screen)
            .collect();
        for screen in screens {
            let order = display.stacking_order(screen)?;
            stacking::update_ranks(registry, screen, &order);
        }

        let members = g.members.clone();
        let mut hidden_count = 0;
        let mut highest_rank = 0;
        for client in members {
            registry.hide(display, client)?;
            hidden_count += 1;
            if let Some(c) = registry.get(client) {
                highest_rank = highest_rank.max(c.stack_rank);
            }
        }

        let g = &mut self.groups[group];
        g.hidden_count = hidden_count;
        g.highest_rank = highest_rank;
        g.hidden = true;
        Ok(())
    }

    /// Restack members in their recorded order, map them and activate the group
    pub fn show<D: DisplayAdapter>(
        &mut self,
        display: &mut D,
        registry: &mut ClientRegistry,
        group: GroupId,
    ) -> Result<()> {
        let Some(g) = self.groups.get(group) else {
            return Ok(());
        };
        debug!("Showing group {:?}", g.name);

        let members = g.members.clone();
        let ranked = stacking::ranked_frames(registry, &members);
        let windows = stacking::restack_order(&ranked, g.highest_rank);
        if !windows.is_empty() {
            display.restack(&windows)?;
        }
        for client in members {
            registry.unhide(display, client)?;
        }

        self.groups[group].hidden = false;
        self.set_active(group);
        Ok(())
    }

    /// Flip a group's visibility
    pub fn toggle<D: DisplayAdapter>(
        &mut self,
        display: &mut D,
        registry: &mut ClientRegistry,
        group: GroupId,
    ) -> Result<()> {
        let Some(g) = self.groups.get(group) else {
            return Ok(());
        };

        // No member agrees with the group flag: the flag drifted, trust the members.
        let agreeing = g
            .members
            .iter()
            .filter_map(|&id| registry.get(id))
            .filter(|c| c.is_hidden() == g.hidden)
            .count();
        if agreeing == 0 {
            self.groups[group].hidden = !self.groups[group].hidden;
        }

        if self.groups[group].hidden {
            self.show(display, registry, group)
        } else {
            self.hide(display, registry, group)?;
            if self.groups[group].is_empty() {
                self.set_active(group);
            }
            Ok(())
        }
    }

    /// Show one group and hide every other
    pub fn only<D: DisplayAdapter>(
        &mut self,
        display: &mut D,
        registry: &mut ClientRegistry,
        group: GroupId,
    ) -> Result<()> {
        for id in self.order.clone() {
            if id == group {
                self.show(display, registry, id)?;
            } else {
                self.hide(display, registry, id)?;
            }
        }
        Ok(())
    }

    /// Move to the next (or previous) non-empty group, hiding the others.
    ///
    /// Returns the newly shown group, or `None` when there is nowhere to go.
    pub fn slide<D: DisplayAdapter>(
        &mut self,
        display: &mut D,
        registry: &mut ClientRegistry,
        forward: bool,
    ) -> Result<Option<GroupId>> {
        let old = self.active;
        let Some(start) = self.order.iter().position(|&id| id == old) else {
            return Ok(None);
        };
        let len = self.order.len();

        let mut target = None;
        let mut passed = Vec::new();
        for step in 1..=len {
            let index = if forward {
                (start + step) % len
            } else {
                (start + len - step % len) % len
            };
            let id = self.order[index];
            if id == old {
                break;
            }
            if self.groups[id].is_empty() {
                continue;
            }
            if target.is_none() {
                target = Some(id);
            } else if !self.holds_only_hidden(registry, id) {
                passed.push(id);
            }
        }

        let Some(target) = target else {
            debug!("No other group to slide to");
            return Ok(None);
        };

        for id in passed {
            self.hide(display, registry, id)?;
        }
        self.hide(display, registry, old)?;
        if self.holds_only_hidden(registry, target) {
            self.show(display, registry, target)?;
        } else {
            self.set_active(target);
        }
        Ok(Some(target))
    }

    /// Move a client into another group, hiding it if that group is hidden
    pub fn move_client<D: DisplayAdapter>(
        &mut self,
        display: &mut D,
        registry: &mut ClientRegistry,
        client: ClientId,
        group: GroupId,
    ) -> Result<()> {
        let Some(target) = self.groups.get(group) else {
            return Ok(());
        };
        if registry.get(client).and_then(|c| c.group) == Some(group) {
            return Ok(());
        }
        if target.hidden {
            registry.hide(display, client)?;
        }
        self.add(registry, group, client);
        Ok(())
    }

    /// Group a new client should join: first matching rule, else the active
    /// group in sticky mode
    pub fn autogroup(&self, client: &Client, rules: &[AutogroupRule], sticky: bool) -> Option<GroupId> {
        let matched = rules.iter().find(|rule| {
            rule.class == client.class.class
                && rule
                    .instance
                    .as_ref()
                    .is_none_or(|instance| *instance == client.class.instance)
        });

        match matched {
            Some(rule) => self.by_name(&rule.group).or_else(|| {
                rule.group
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| self.by_number(n))
            }),
            None if sticky => Some(self.active),
            None => None,
        }
    }

    pub fn edit_state(&self) -> &GroupEdit {
        &self.edit
    }

    /// Group being edited or renamed
    pub fn editing(&self) -> Option<GroupId> {
        match self.edit {
            GroupEdit::Idle => None,
            GroupEdit::Editing { group } | GroupEdit::Renaming { group, .. } => Some(group),
        }
    }

    /// Start editing a group.
    ///
    /// Panics when a session is already running.
    pub fn begin_edit(&mut self, registry: &mut ClientRegistry, group: GroupId) {
        assert!(
            self.edit == GroupEdit::Idle,
            "group edit started while another session is active"
        );
        assert!(self.groups.contains_key(group), "group edit on a missing group");

        info!("Editing group {:?}", self.groups[group].name);
        for &client in &self.groups[group].members {
            if let Some(c) = registry.get_mut(client) {
                c.highlight = Highlight::Primary;
            }
        }
        self.edit = GroupEdit::Editing { group };
    }

    /// Add or remove a client from the group being edited.
    ///
    /// Returns whether the client is now a member.
    pub fn edit_toggle_member(&mut self, registry: &mut ClientRegistry, client: ClientId) -> bool {
        let GroupEdit::Editing { group } = self.edit else {
            panic!("group membership edited outside an edit session");
        };

        if registry.get(client).and_then(|c| c.group) == Some(group) {
            self.remove(registry, client);
            false
        } else {
            self.add(registry, group, client);
            true
        }
    }

    /// Keep the current membership and end the session
    pub fn commit_edit(&mut self, registry: &mut ClientRegistry) -> GroupId {
        let GroupEdit::Editing { group } = self.edit else {
            panic!("group edit committed outside an edit session");
        };

        for &client in &self.groups[group].members {
            if let Some(c) = registry.get_mut(client) {
                c.flags.insert(ClientFlags::GROUP_COMMITTED);
                c.highlight = Highlight::None;
            }
        }
        self.edit = GroupEdit::Idle;
        info!("Committed group {:?}", self.groups[group].name);
        group
    }

    /// Drop uncommitted members and end the session; a group left empty is
    /// torn down
    pub fn abort_edit(&mut self, registry: &mut ClientRegistry) -> GroupId {
        let GroupEdit::Editing { group } = self.edit else {
            panic!("group edit aborted outside an edit session");
        };

        for client in self.groups[group].members.clone() {
            let committed = registry
                .get(client)
                .is_some_and(|c| c.flags.contains(ClientFlags::GROUP_COMMITTED));
            if committed {
                if let Some(c) = registry.get_mut(client) {
                    c.highlight = Highlight::None;
                }
            } else {
                self.remove(registry, client);
            }
        }

        self.edit = GroupEdit::Idle;
        if self.groups[group].is_empty() {
            self.destroy(registry, group);
        }
        info!("Aborted group edit");
        group
    }

    /// Enter the rename sub-state with the current name in the buffer
    pub fn begin_rename(&mut self) {
        let GroupEdit::Editing { group } = self.edit else {
            panic!("group rename outside an edit session");
        };
        let buffer = self.groups[group].name.clone();
        self.edit = GroupEdit::Renaming { group, buffer };
    }

    /// Feed a key to the rename buffer; confirm or cancel return to editing
    pub fn rename_key(&mut self, key: RenameKey) {
        let GroupEdit::Renaming { group, buffer } = &mut self.edit else {
            panic!("rename input outside a rename session");
        };
        let group = *group;

        match key {
            RenameKey::Char(c) => buffer.push(c),
            RenameKey::Backspace => {
                buffer.pop();
            }
            RenameKey::Confirm => {
                let name = buffer.trim().to_string();
                if !name.is_empty() {
                    info!("Renamed group {:?} to {:?}", self.groups[group].name, name);
                    self.groups[group].name = name;
                }
                self.edit = GroupEdit::Editing { group };
            }
            RenameKey::Cancel => {
                self.edit = GroupEdit::Editing { group };
            }
        }
    }

    /// Text of the rename buffer while renaming
    pub fn rename_buffer(&self) -> Option<&str> {
        match &self.edit {
            GroupEdit::Renaming { buffer, .. } => Some(buffer),
            _ => None,
        }
    }

    /// Toggle a client's membership of the active group outside an edit
    /// session; the returned highlight lasts until the modifier is released
    pub fn toggle_membership(&mut self, registry: &mut ClientRegistry, client: ClientId) -> Highlight {
        let active = self.active;
        let highlight = if registry.get(client).and_then(|c| c.group) == Some(active) {
            self.remove(registry, client);
            Highlight::Secondary
        } else {
            self.add(registry, active, client);
            Highlight::Primary
        };

        if let Some(c) = registry.get_mut(client) {
            c.highlight = highlight;
        }
        highlight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Geometry;
    use crate::wm::testing::{Call, FakeDisplay};
    use pretty_assertions::assert_eq;

    fn setup(count: u32) -> (FakeDisplay, ClientRegistry, GroupManager, Vec<ClientId>) {
        let mut display = FakeDisplay::new();
        let mut registry = ClientRegistry::new();
        let mut ids = Vec::new();
        for window in 1..=count {
            let window = 100 + window;
            let mut client = Client::new(window, 0, Geometry::new(0, 0, 50, 50), 1);
            let frame = display
                .create_frame(0, client.geometry, 1)
                .unwrap();
            client.frame = frame;
            ids.push(registry.insert(client));
        }
        display.take_calls();
        (display, registry, GroupManager::new(&[]), ids)
    }

    fn group_of(registry: &ClientRegistry, id: ClientId) -> Option<GroupId> {
        registry.get(id).and_then(|c| c.group)
    }

    #[test]
    fn numbered_groups_exist() {
        let groups = GroupManager::new(&["www".to_string()]);
        assert_eq!(groups.ids().len(), NUMBERED_GROUPS);
        let first = groups.by_number(1).unwrap();
        assert_eq!(groups.get(first).unwrap().name, "www");
        assert_eq!(groups.by_name("two"), groups.by_number(2));
        assert_eq!(groups.active(), first);
    }

    #[test]
    fn adding_to_new_group_leaves_old_one() {
        let (_, mut registry, mut groups, ids) = setup(1);
        let one = groups.by_number(1).unwrap();
        let two = groups.by_number(2).unwrap();

        groups.add(&mut registry, one, ids[0]);
        groups.add(&mut registry, two, ids[0]);

        assert_eq!(group_of(&registry, ids[0]), Some(two));
        assert!(groups.get(one).unwrap().members.is_empty());
        assert_eq!(groups.get(two).unwrap().members, vec![ids[0]]);
    }

    #[test]
    fn removing_clears_highlight() {
        let (_, mut registry, mut groups, ids) = setup(1);
        let one = groups.by_number(1).unwrap();
        groups.add(&mut registry, one, ids[0]);
        registry.get_mut(ids[0]).unwrap().highlight = Highlight::Primary;

        assert_eq!(groups.remove(&mut registry, ids[0]), Some(one));
        assert_eq!(registry.get(ids[0]).unwrap().highlight, Highlight::None);
        assert_eq!(groups.remove(&mut registry, ids[0]), None);
    }

    #[test]
    fn hide_then_show_round_trips_visibility() {
        let (mut display, mut registry, mut groups, ids) = setup(3);
        let one = groups.by_number(1).unwrap();
        groups.add(&mut registry, one, ids[0]);
        groups.add(&mut registry, one, ids[1]);

        groups.hide(&mut display, &mut registry, one).unwrap();
        assert!(registry.get(ids[0]).unwrap().is_hidden());
        assert!(registry.get(ids[1]).unwrap().is_hidden());
        assert!(!registry.get(ids[2]).unwrap().is_hidden());
        assert_eq!(groups.get(one).unwrap().hidden_count, 2);

        groups.show(&mut display, &mut registry, one).unwrap();
        let hidden: Vec<bool> = ids.iter().map(|&id| registry.get(id).unwrap().is_hidden()).collect();
        assert_eq!(hidden, vec![false, false, false]);
        assert!(!groups.get(one).unwrap().hidden);
    }

    #[test]
    fn show_restacks_top_first() {
        let (mut display, mut registry, mut groups, ids) = setup(3);
        let one = groups.by_number(1).unwrap();
        for &id in &ids {
            groups.add(&mut registry, one, id);
        }
        let frames: Vec<_> = ids.iter().map(|&id| registry.get(id).unwrap().frame).collect();

        groups.hide(&mut display, &mut registry, one).unwrap();
        display.take_calls();
        groups.show(&mut display, &mut registry, one).unwrap();

        let calls = display.take_calls();
        assert_eq!(calls[0], Call::Restack(vec![frames[2], frames[1], frames[0]]));
    }

    #[test]
    fn toggle_hides_then_shows() {
        let (mut display, mut registry, mut groups, ids) = setup(1);
        let two = groups.by_number(2).unwrap();
        groups.add(&mut registry, two, ids[0]);

        groups.toggle(&mut display, &mut registry, two).unwrap();
        assert!(registry.get(ids[0]).unwrap().is_hidden());
        groups.toggle(&mut display, &mut registry, two).unwrap();
        assert!(!registry.get(ids[0]).unwrap().is_hidden());
        assert_eq!(groups.active(), two);
    }

    #[test]
    fn toggle_corrects_drifted_flag() {
        let (mut display, mut registry, mut groups, ids) = setup(1);
        let two = groups.by_number(2).unwrap();
        groups.add(&mut registry, two, ids[0]);
        // member hidden behind the group's back
        registry.hide(&mut display, ids[0]).unwrap();

        groups.toggle(&mut display, &mut registry, two).unwrap();
        assert!(!registry.get(ids[0]).unwrap().is_hidden());
        assert!(!groups.get(two).unwrap().hidden);
    }

    #[test]
    fn slide_moves_to_next_non_empty_group() {
        let (mut display, mut registry, mut groups, ids) = setup(2);
        let one = groups.by_number(1).unwrap();
        let four = groups.by_number(4).unwrap();
        groups.add(&mut registry, one, ids[0]);
        groups.add(&mut registry, four, ids[1]);
        groups.hide(&mut display, &mut registry, four).unwrap();
        groups.set_active(one);

        let target = groups.slide(&mut display, &mut registry, true).unwrap();
        assert_eq!(target, Some(four));
        assert_eq!(groups.active(), four);
        assert!(registry.get(ids[0]).unwrap().is_hidden());
        assert!(!registry.get(ids[1]).unwrap().is_hidden());

        let back = groups.slide(&mut display, &mut registry, false).unwrap();
        assert_eq!(back, Some(one));
    }

    #[test]
    fn slide_with_single_group_is_noop() {
        let (mut display, mut registry, mut groups, ids) = setup(1);
        let one = groups.by_number(1).unwrap();
        groups.add(&mut registry, one, ids[0]);

        assert_eq!(groups.slide(&mut display, &mut registry, true).unwrap(), None);
        assert!(!registry.get(ids[0]).unwrap().is_hidden());
        assert!(display.calls.is_empty());
    }

    #[test]
    fn autogroup_first_rule_wins() {
        let (_, mut registry, groups, ids) = setup(1);
        registry.get_mut(ids[0]).unwrap().class =
            crate::wm::hints::ClassHint::new("navigator", "Firefox");
        let rules = vec![
            AutogroupRule {
                class: "Firefox".to_string(),
                instance: Some("other".to_string()),
                group: "five".to_string(),
            },
            AutogroupRule {
                class: "Firefox".to_string(),
                instance: None,
                group: "3".to_string(),
            },
            AutogroupRule {
                class: "Firefox".to_string(),
                instance: None,
                group: "two".to_string(),
            },
        ];

        let client = registry.get(ids[0]).unwrap();
        assert_eq!(groups.autogroup(client, &rules, false), groups.by_number(3));
        assert_eq!(groups.autogroup(client, &[], false), None);
        assert_eq!(groups.autogroup(client, &[], true), Some(groups.active()));
    }

    #[test]
    fn aborted_edit_of_new_group_destroys_it() {
        let (_, mut registry, mut groups, ids) = setup(1);
        let custom = groups.create("scratch");
        groups.begin_edit(&mut registry, custom);
        assert!(groups.edit_toggle_member(&mut registry, ids[0]));
        assert_eq!(registry.get(ids[0]).unwrap().highlight, Highlight::Primary);

        groups.abort_edit(&mut registry);
        assert_eq!(group_of(&registry, ids[0]), None);
        assert!(!groups.contains(custom));
        assert!(!groups.ids().contains(&custom));
        assert_eq!(groups.edit_state(), &GroupEdit::Idle);
    }

    #[test]
    fn abort_after_commit_keeps_committed_members() {
        let (_, mut registry, mut groups, ids) = setup(2);
        let custom = groups.create("work");
        groups.begin_edit(&mut registry, custom);
        groups.edit_toggle_member(&mut registry, ids[0]);
        groups.commit_edit(&mut registry);

        groups.begin_edit(&mut registry, custom);
        groups.edit_toggle_member(&mut registry, ids[1]);
        groups.abort_edit(&mut registry);

        assert_eq!(group_of(&registry, ids[0]), Some(custom));
        assert_eq!(group_of(&registry, ids[1]), None);
        assert!(groups.contains(custom));
        assert_eq!(registry.get(ids[0]).unwrap().highlight, Highlight::None);
    }

    #[test]
    #[should_panic(expected = "another session")]
    fn double_edit_is_a_bug() {
        let (_, mut registry, mut groups, _) = setup(0);
        let one = groups.by_number(1).unwrap();
        groups.begin_edit(&mut registry, one);
        groups.begin_edit(&mut registry, one);
    }

    #[test]
    fn rename_confirm_and_cancel() {
        let (_, mut registry, mut groups, _) = setup(0);
        let custom = groups.create("tmp");
        groups.begin_edit(&mut registry, custom);

        groups.begin_rename();
        groups.rename_key(RenameKey::Backspace);
        groups.rename_key(RenameKey::Backspace);
        groups.rename_key(RenameKey::Char('x'));
        assert_eq!(groups.rename_buffer(), Some("tx"));
        groups.rename_key(RenameKey::Confirm);
        assert_eq!(groups.get(custom).unwrap().name, "tx");
        assert_eq!(groups.edit_state(), &GroupEdit::Editing { group: custom });

        groups.begin_rename();
        groups.rename_key(RenameKey::Char('y'));
        groups.rename_key(RenameKey::Cancel);
        assert_eq!(groups.get(custom).unwrap().name, "tx");
    }

    #[test]
    fn membership_toggle_marks_removed_client() {
        let (_, mut registry, mut groups, ids) = setup(1);
        assert_eq!(groups.toggle_membership(&mut registry, ids[0]), Highlight::Primary);
        assert_eq!(group_of(&registry, ids[0]), Some(groups.active()));
        assert_eq!(groups.toggle_membership(&mut registry, ids[0]), Highlight::Secondary);
        assert_eq!(group_of(&registry, ids[0]), None);
        assert_eq!(registry.get(ids[0]).unwrap().highlight, Highlight::Secondary);
    }

    #[test]
    fn destroying_numbered_group_only_detaches() {
        let (_, mut registry, mut groups, ids) = setup(1);
        let three = groups.by_number(3).unwrap();
        groups.add(&mut registry, three, ids[0]);
        groups.destroy(&mut registry, three);
        assert!(groups.contains(three));
        assert_eq!(group_of(&registry, ids[0]), None);
    }
}
