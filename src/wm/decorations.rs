//! Window decorations for sill
//!
//! Frames are plain borders; the border color reflects focus, urgency and
//! group-edit highlight.

use anyhow::Result;

use crate::config::ColorConfig;
use crate::wm::adapter::DisplayAdapter;
use crate::wm::client::Client;
use crate::wm::client_flags::{ClientFlags, Highlight};

/// Border pixel for a client's current state
pub fn border_pixel(client: &Client, colors: &ColorConfig) -> u32 {
    if client.flags.contains(ClientFlags::URGENT) {
        return colors.urgent;
    }

    match client.highlight {
        Highlight::Primary => colors.group,
        Highlight::Secondary => colors.ungroup,
        Highlight::None if client.is_active() => colors.active,
        Highlight::None => colors.inactive,
    }
}

/// Redraw a client's frame border
pub fn draw_border<D: DisplayAdapter>(display: &mut D, client: &Client, colors: &ColorConfig) -> Result<()> {
    display.set_border(client.frame, client.border_width, border_pixel(client, colors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Geometry;

    #[test]
    fn urgency_overrides_everything() {
        let colors = ColorConfig::default();
        let mut client = Client::new(1, 0, Geometry::new(0, 0, 10, 10), 1);
        client.flags.insert(ClientFlags::ACTIVE | ClientFlags::URGENT);
        client.highlight = Highlight::Primary;
        assert_eq!(border_pixel(&client, &colors), colors.urgent);
    }

    #[test]
    fn highlight_beats_focus() {
        let colors = ColorConfig::default();
        let mut client = Client::new(1, 0, Geometry::new(0, 0, 10, 10), 1);
        assert_eq!(border_pixel(&client, &colors), colors.inactive);
        client.flags.insert(ClientFlags::ACTIVE);
        assert_eq!(border_pixel(&client, &colors), colors.active);
        client.highlight = Highlight::Secondary;
        assert_eq!(border_pixel(&client, &colors), colors.ungroup);
    }
}
