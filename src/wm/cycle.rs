//! Cycle Module
//!
//! Most-recently-used order per screen and Alt+Tab style cycling over it.
//! While the cycling modifier is held the order is frozen so repeated
//! presses walk the same sequence.

use std::collections::HashMap;

use tracing::debug;

use crate::wm::client::{Client, ClientId};
use crate::wm::client_flags::ClientFlags;
use crate::wm::registry::ClientRegistry;

/// Which clients take part in a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleMode {
    /// Every visible client on the screen
    All,
    /// Clients in the same group as the starting client
    Group,
    /// Clients with the same class as the starting client
    Class,
}

/// Result of a successful cycle step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleStep {
    pub target: ClientId,

    /// Client the step started from
    pub from: ClientId,

    /// Previous, current and next eligible entries around the target
    pub preview: Vec<ClientId>,
}

#[derive(Debug, Default)]
struct ScreenCycle {
    /// Most recent first
    mru: Vec<ClientId>,

    /// Set while the cycling modifier is held
    persist: bool,

    /// Where the next step starts while `persist` is set
    anchor: Option<ClientId>,
}

/// Cycle manager
#[derive(Debug, Default)]
pub struct CycleManager {
    screens: HashMap<usize, ScreenCycle>,
}

impl CycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly managed client at the end of its screen's order
    pub fn push(&mut self, screen: usize, client: ClientId) {
        let state = self.screens.entry(screen).or_default();
        if !state.mru.contains(&client) {
            state.mru.push(client);
        }
    }

    /// Forget a client everywhere
    pub fn remove(&mut self, client: ClientId) {
        for state in self.screens.values_mut() {
            state.mru.retain(|&c| c != client);
            if state.anchor == Some(client) {
                state.anchor = None;
            }
        }
    }

    /// Move a client to the front unless a cycle is in progress
    pub fn touch(&mut self, screen: usize, client: ClientId) {
        let state = self.screens.entry(screen).or_default();
        if state.persist {
            return;
        }
        state.mru.retain(|&c| c != client);
        state.mru.insert(0, client);
    }

    pub fn mru(&self, screen: usize) -> &[ClientId] {
        self.screens
            .get(&screen)
            .map(|s| s.mru.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_cycling(&self, screen: usize) -> bool {
        self.screens.get(&screen).is_some_and(|s| s.persist)
    }

    pub fn anchor(&self, screen: usize) -> Option<ClientId> {
        self.screens.get(&screen).and_then(|s| s.anchor)
    }

    /// Step to the next eligible client.
    ///
    /// Outside a cycle the step starts at the most recent client. Returns
    /// `None`, leaving the anchor untouched, when nothing is eligible.
    pub fn cycle_next(
        &mut self,
        screen: usize,
        registry: &ClientRegistry,
        reverse: bool,
        mode: CycleMode,
    ) -> Option<CycleStep> {
        let state = self.screens.get_mut(&screen)?;
        let len = state.mru.len();

        let start = match state.anchor.filter(|_| state.persist) {
            Some(anchor) => anchor,
            None => *state.mru.first()?,
        };
        let start_index = state.mru.iter().position(|&c| c == start)?;
        let origin = registry.get(start)?;

        let eligible = |id: ClientId| registry.get(id).is_some_and(|c| Self::eligible(c, origin, mode));

        let mut target = None;
        for step in 1..=len {
            let index = if reverse {
                (start_index + len - step) % len
            } else {
                (start_index + step) % len
            };
            let candidate = state.mru[index];
            if eligible(candidate) {
                target = Some(candidate);
                break;
            }
        }

        let Some(target) = target else {
            debug!("No eligible client to cycle to on screen {}", screen);
            return None;
        };

        state.anchor = Some(target);
        state.persist = true;

        let ring: Vec<ClientId> = state.mru.iter().copied().filter(|&id| eligible(id)).collect();
        let preview = Self::preview(&ring, target);
        debug!("Cycled to {:?} on screen {}", target, screen);

        Some(CycleStep {
            target,
            from: start,
            preview,
        })
    }

    /// End a cycling session; returns whether one was running
    pub fn release(&mut self, screen: usize) -> bool {
        let Some(state) = self.screens.get_mut(&screen) else {
            return false;
        };
        let was_cycling = state.persist;
        state.persist = false;
        was_cycling
    }

    fn eligible(client: &Client, origin: &Client, mode: CycleMode) -> bool {
        if client
            .flags
            .intersects(ClientFlags::HIDDEN | ClientFlags::IGNORE)
        {
            return false;
        }
        match mode {
            CycleMode::All => true,
            CycleMode::Group => client.group == origin.group,
            CycleMode::Class => client.class.class == origin.class.class,
        }
    }

    fn preview(ring: &[ClientId], target: ClientId) -> Vec<ClientId> {
        let Some(pos) = ring.iter().position(|&c| c == target) else {
            return vec![target];
        };
        if ring.len() < 3 {
            let mut preview = ring[pos..].to_vec();
            preview.extend_from_slice(&ring[..pos]);
            return preview;
        }
        let len = ring.len();
        vec![ring[(pos + len - 1) % len], target, ring[(pos + 1) % len]]
    }
}
