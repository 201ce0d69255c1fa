//! Client Registry
//!
//! Canonical set of managed clients. Clients live in an arena addressed by
//! stable `ClientId` handles; the registry also keeps the global management
//! order and an index from both frame and content windows to the client.

use std::collections::HashMap;

use anyhow::Result;
use slotmap::SlotMap;
use tracing::debug;

use crate::wm::adapter::{DisplayAdapter, Window, WmState};
use crate::wm::client::{Client, ClientId};
use crate::wm::client_flags::ClientFlags;

#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: SlotMap<ClientId, Client>,

    /// Global order of management (oldest first)
    order: Vec<ClientId>,

    /// Frame and content window -> client
    windows: HashMap<Window, ClientId>,

    /// The single globally active client
    active: Option<ClientId>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client and index both of its windows
    pub fn insert(&mut self, client: Client) -> ClientId {
        let window = client.window;
        let frame = client.frame;
        let id = self.clients.insert(client);
        self.order.push(id);
        self.windows.insert(window, id);
        self.windows.insert(frame, id);
        id
    }

    /// Drop a client from the arena, the order and the window index
    pub fn remove(&mut self, id: ClientId) -> Option<Client> {
        let client = self.clients.remove(id)?;
        self.order.retain(|&c| c != id);
        self.windows.remove(&client.window);
        self.windows.remove(&client.frame);
        if self.active == Some(id) {
            self.active = None;
        }
        Some(client)
    }

    /// Look up a client by frame or content window
    pub fn find(&self, window: Window) -> Option<ClientId> {
        self.windows.get(&window).copied()
    }

    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.clients.get_mut(id)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Client ids in management order
    pub fn ids(&self) -> &[ClientId] {
        &self.order
    }

    /// Clients in management order
    pub fn iter(&self) -> impl Iterator<Item = (ClientId, &Client)> {
        self.order
            .iter()
            .filter_map(|&id| self.clients.get(id).map(|c| (id, c)))
    }

    pub fn active(&self) -> Option<ClientId> {
        self.active
    }

    /// Record the active client and keep the ACTIVE flag in sync
    pub fn set_active(&mut self, id: Option<ClientId>) {
        if let Some(old) = self.active.and_then(|old| self.clients.get_mut(old)) {
            old.flags.remove(ClientFlags::ACTIVE);
        }
        self.active = id.filter(|&id| self.clients.contains_key(id));
        if let Some(new) = self.active.and_then(|new| self.clients.get_mut(new)) {
            new.flags.insert(ClientFlags::ACTIVE);
        }
    }

    /// Unmap a client's frame and mark it iconic; a hidden client loses focus
    pub fn hide<D: DisplayAdapter>(&mut self, display: &mut D, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        debug!("Hiding window 0x{:x}", client.window);
        let screen = client.screen;
        display.unmap_window(client.frame)?;
        display.set_wm_state(client.window, WmState::Iconic)?;
        client.flags.insert(ClientFlags::HIDDEN);

        if self.active == Some(id) {
            self.set_active(None);
            display.set_focus(None)?;
            display.set_active_window(screen, None)?;
        }
        Ok(())
    }

    /// Map a hidden client's frame again without changing its stacking
    pub fn unhide<D: DisplayAdapter>(&mut self, display: &mut D, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        debug!("Unhiding window 0x{:x}", client.window);
        display.map_window(client.frame)?;
        display.set_wm_state(client.window, WmState::Normal)?;
        client.flags.remove(ClientFlags::HIDDEN);
        Ok(())
    }
}
