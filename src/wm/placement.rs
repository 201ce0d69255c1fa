//! Placement Module
//!
//! Geometry engine: gravity compensation, initial placement, sweep resize,
//! edge snapping, keyboard move/resize and the maximize family. Everything
//! here is side-effect free apart from writing back into a client's geometry.

use crate::shared::{Geometry, Point};
use crate::wm::client::Client;
use crate::wm::client_flags::ClientFlags;
use crate::wm::hints::Gravity;

/// Border offset for a gravity, applied with +1 entering a frame and -1 leaving.
///
/// Only the west edge moves X and only the north edge moves Y.
pub fn gravity_offset(gravity: Gravity, border_width: u32) -> (i32, i32) {
    let bw = border_width as i32;
    match gravity {
        Gravity::NorthWest | Gravity::Center | Gravity::Static => (bw, bw),
        Gravity::North | Gravity::NorthEast => (0, bw),
        Gravity::West | Gravity::SouthWest => (bw, 0),
        Gravity::East | Gravity::South | Gravity::SouthEast => (0, 0),
    }
}

/// Shift a client by its border width according to its gravity
pub fn gravitate(client: &mut Client, entering: bool) {
    let (dx, dy) = gravity_offset(client.size_hints.gravity, client.border_width);
    let sign = if entering { 1 } else { -1 };
    client.geometry.x += dx * sign;
    client.geometry.y += dy * sign;
}

/// Compute the initial position of a window that was not yet visible.
///
/// Explicit positions are honored; otherwise the window is centered under the
/// pointer and kept inside `area`.
pub fn place_initial(client: &mut Client, area: Geometry, pointer: Point) {
    let bw = client.border_width as i32;

    if client.size_hints.has_position() {
        let geom = &mut client.geometry;
        if geom.x <= area.x || geom.x >= area.right() {
            geom.x = area.x + bw;
        }
        if geom.y <= area.y || geom.y >= area.bottom() {
            geom.y = area.y + bw;
        }
        if geom.right() + bw > area.right() {
            geom.x = (area.right() - geom.width as i32 - bw).max(area.x + bw);
        }
        if geom.bottom() + bw > area.bottom() {
            geom.y = (area.bottom() - geom.height as i32 - bw).max(area.y + bw);
        }
        return;
    }

    let (x, width) = center_axis(pointer.x, client.geometry.width, bw, area.x, area.width);
    let (y, height) = center_axis(pointer.y, client.geometry.height, bw, area.y, area.height);
    client.geometry = Geometry::new(x, y, width, height);
}

/// Center `size` on `pointer` inside `[start, start + extent)`, shrinking when
/// the window (plus both borders) does not fit
fn center_axis(pointer: i32, size: u32, bw: i32, start: i32, extent: u32) -> (i32, u32) {
    let outer = size as i32 + bw * 2;
    let extent = extent as i32;

    if outer > extent {
        return (start, (extent - bw * 2).max(1) as u32);
    }

    let pos = (pointer - outer / 2).clamp(start, start + extent - outer);
    (pos, size)
}

/// Resize from a fixed origin corner towards the pointer.
///
/// Returns whether the dimensions changed.
pub fn sweep_resize(client: &mut Client, origin: Point, pointer: Point) -> bool {
    let bw = client.border_width as i32;
    let (old_width, old_height) = (client.geometry.width, client.geometry.height);

    let raw_width = (pointer.x - origin.x).abs() - bw;
    let raw_height = (pointer.y - origin.y).abs() - bw;
    let (width, height) = client.size_hints.constrain(raw_width, raw_height);

    client.geometry.width = width;
    client.geometry.height = height;
    client.geometry.x = if origin.x <= pointer.x {
        origin.x
    } else {
        origin.x - width as i32
    };
    client.geometry.y = if origin.y <= pointer.y {
        origin.y
    } else {
        origin.y - height as i32
    };

    width != old_width || height != old_height
}

/// Offset that snaps the span `[n0, n1]` onto edge `e0` or `e1`, preferring
/// the closer edge; zero when neither is within `distance`
pub fn snap_offset(n0: i32, n1: i32, e0: i32, e1: i32, distance: i32) -> i32 {
    let s0 = if (e0 - n0).abs() <= distance { e0 - n0 } else { 0 };
    let s1 = if (e1 - n1).abs() <= distance { e1 - n1 } else { 0 };

    match (s0, s1) {
        (0, 0) => 0,
        (s0, 0) => s0,
        (0, s1) => s1,
        (s0, s1) if s0.abs() < s1.abs() => s0,
        (_, s1) => s1,
    }
}

/// Snap a client's position to the area edges
pub fn snap_to_edges(client: &mut Client, area: Geometry, distance: i32) {
    if distance <= 0 {
        return;
    }
    let outer = client.outer_geometry();
    client.geometry.x += snap_offset(outer.x, outer.right(), area.x, area.right(), distance);
    client.geometry.y += snap_offset(outer.y, outer.bottom(), area.y, area.bottom(), distance);
}

/// Keyboard move; the window is kept at least one pixel reachable
pub fn move_by(client: &mut Client, dx: i32, dy: i32, view: Geometry, area: Geometry, snap: i32) -> bool {
    if client.flags.contains(ClientFlags::FREEZE) {
        return false;
    }
    let bw = client.border_width as i32;
    let geom = &mut client.geometry;

    geom.x = (geom.x + dx)
        .max(-(geom.width as i32 + bw - 1))
        .min(view.right() - bw - 1);
    geom.y = (geom.y + dy)
        .max(-(geom.height as i32 + bw - 1))
        .min(view.bottom() - bw - 1);

    snap_to_edges(client, area, snap);
    true
}

/// Keyboard resize in increment steps, never below the minimum size
pub fn resize_by(client: &mut Client, dx: i32, dy: i32) -> bool {
    if client.flags.contains(ClientFlags::FREEZE) {
        return false;
    }
    let hints = &client.size_hints;
    let width = client.geometry.width as i32 + dx * hints.width_inc as i32;
    let height = client.geometry.height as i32 + dy * hints.height_inc as i32;

    let mut width = width.max(hints.min_width as i32);
    let mut height = height.max(hints.min_height as i32);
    if hints.max_width > 0 {
        width = width.min(hints.max_width as i32);
    }
    if hints.max_height > 0 {
        height = height.min(hints.max_height as i32);
    }

    client.geometry.width = width.max(1) as u32;
    client.geometry.height = height.max(1) as u32;
    client.flags.remove(ClientFlags::MAXIMIZED);
    true
}

/// Toggle full maximization inside `area`
pub fn toggle_maximize(client: &mut Client, area: Geometry) -> bool {
    if client.flags.contains(ClientFlags::FREEZE) {
        return false;
    }

    if client.flags.is_maximized() {
        client.geometry = client.saved_geometry;
        client.flags.remove(ClientFlags::MAXIMIZED);
        return true;
    }

    if !client.flags.contains(ClientFlags::VMAXIMIZED) {
        client.saved_geometry.y = client.geometry.y;
        client.saved_geometry.height = client.geometry.height;
    }
    if !client.flags.contains(ClientFlags::HMAXIMIZED) {
        client.saved_geometry.x = client.geometry.x;
        client.saved_geometry.width = client.geometry.width;
    }

    let bw = client.border_width;
    client.geometry = Geometry::new(
        area.x,
        area.y,
        area.width.saturating_sub(bw * 2).max(1),
        area.height.saturating_sub(bw * 2).max(1),
    );
    client.flags.insert(ClientFlags::MAXIMIZED);
    true
}

/// Toggle vertical maximization inside `area`
pub fn toggle_vmaximize(client: &mut Client, area: Geometry) -> bool {
    if client.flags.contains(ClientFlags::FREEZE) {
        return false;
    }

    if client.flags.contains(ClientFlags::VMAXIMIZED) {
        client.geometry.y = client.saved_geometry.y;
        client.geometry.height = client.saved_geometry.height;
        client.flags.remove(ClientFlags::VMAXIMIZED);
        return true;
    }

    client.saved_geometry.y = client.geometry.y;
    client.saved_geometry.height = client.geometry.height;
    client.geometry.y = area.y;
    client.geometry.height = area.height.saturating_sub(client.border_width * 2).max(1);
    client.flags.insert(ClientFlags::VMAXIMIZED);
    true
}

/// Toggle horizontal maximization inside `area`
pub fn toggle_hmaximize(client: &mut Client, area: Geometry) -> bool {
    if client.flags.contains(ClientFlags::FREEZE) {
        return false;
    }

    if client.flags.contains(ClientFlags::HMAXIMIZED) {
        client.geometry.x = client.saved_geometry.x;
        client.geometry.width = client.saved_geometry.width;
        client.flags.remove(ClientFlags::HMAXIMIZED);
        return true;
    }

    client.saved_geometry.x = client.geometry.x;
    client.saved_geometry.width = client.geometry.width;
    client.geometry.x = area.x;
    client.geometry.width = area.width.saturating_sub(client.border_width * 2).max(1);
    client.flags.insert(ClientFlags::HMAXIMIZED);
    true
}
