//! MoveResize Module
//!
//! Pointer-driven move and resize. A `DragSession` lives for one drag: it
//! remembers where the drag started so motion can be applied as absolute
//! deltas and Escape can put the window back.

use tracing::debug;

use crate::shared::{Geometry, Point};
use crate::wm::client::{Client, ClientId};
use crate::wm::client_flags::ClientFlags;
use crate::wm::placement;

/// Minimum milliseconds between two applied motion events (about 60 Hz)
pub const MOTION_INTERVAL_MS: u32 = 1000 / 60;

/// Drag operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Move,
    Resize,
}

#[derive(Debug, Clone)]
pub struct DragSession {
    pub client: ClientId,
    pub kind: DragKind,

    /// Pointer position when the drag began (root coordinates)
    pub start: Point,

    /// Client geometry when the drag began
    pub original: Geometry,

    /// Time of the last applied motion event
    last_motion: Option<u32>,
}

impl DragSession {
    /// Start moving a client with the pointer at `pointer`
    pub fn begin_move(id: ClientId, client: &Client, pointer: Point) -> Self {
        debug!("Starting move for window 0x{:x}", client.window);
        Self {
            client: id,
            kind: DragKind::Move,
            start: pointer,
            original: client.geometry,
            last_motion: None,
        }
    }

    /// Start resizing a client from its bottom-right corner.
    ///
    /// Returns the session and the root position the pointer should be
    /// warped to.
    pub fn begin_resize(id: ClientId, client: &Client) -> (Self, Point) {
        debug!("Starting resize for window 0x{:x}", client.window);
        let corner = Point::new(
            client.geometry.x + client.geometry.width as i32,
            client.geometry.y + client.geometry.height as i32,
        );
        let session = Self {
            client: id,
            kind: DragKind::Resize,
            start: corner,
            original: client.geometry,
            last_motion: None,
        };
        (session, corner)
    }

    /// Whether a client may be dragged at all
    pub fn allowed(client: &Client) -> bool {
        !client.flags.contains(ClientFlags::FREEZE)
    }

    /// Drop motion events arriving faster than the redraw rate
    pub fn throttle(&mut self, time: u32) -> bool {
        if let Some(last) = self.last_motion {
            if time.wrapping_sub(last) <= MOTION_INTERVAL_MS {
                return false;
            }
        }
        self.last_motion = Some(time);
        true
    }

    /// Apply pointer motion to the client's geometry.
    ///
    /// Returns whether the geometry changed.
    pub fn motion(&self, client: &mut Client, pointer: Point, area: Geometry, snap: i32) -> bool {
        let before = client.geometry;
        match self.kind {
            DragKind::Move => {
                client.geometry.x = self.original.x + (pointer.x - self.start.x);
                client.geometry.y = self.original.y + (pointer.y - self.start.y);
                placement::snap_to_edges(client, area, snap);
            }
            DragKind::Resize => {
                let origin = Point::new(self.original.x, self.original.y);
                placement::sweep_resize(client, origin, pointer);
                client.flags.remove(ClientFlags::MAXIMIZED);
            }
        }
        client.geometry != before
    }

    /// Put the client back where the drag started
    pub fn abort(&self, client: &mut Client) {
        debug!("Drag aborted, restoring {:?}", self.original);
        client.geometry = self.original;
    }

    /// Overlay text describing the current position or size
    pub fn readout(&self, client: &Client) -> String {
        match self.kind {
            DragKind::Move => format!("{:4}, {:<4}", client.geometry.x, client.geometry.y),
            DragKind::Resize => {
                let hints = &client.size_hints;
                let steps = |size: u32, base: u32, inc: u32| size.saturating_sub(base) / inc.max(1);
                format!(
                    "{:4} x {:<4}",
                    steps(client.geometry.width, hints.base_width, hints.width_inc),
                    steps(client.geometry.height, hints.base_height, hints.height_inc),
                )
            }
        }
    }
}
