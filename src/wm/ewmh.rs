//! EWMH and ICCCM atoms
//!
//! Interned atoms and the handful of root and client properties the window
//! manager maintains or reads.

use anyhow::Result;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ClientMessageEvent, *};
use x11rb::wrapper::ConnectionExt as _;

use crate::wm::adapter::WmState;
use crate::wm::client_flags::WmProtocols;

/// Name advertised on the supporting-WM check window
pub const WM_NAME: &str = "sill";

/// ICCCM IconicState as carried by WM_CHANGE_STATE
pub const ICONIC_STATE: u32 = 3;

/// Holds all interned atoms
#[derive(Debug, Default, Clone)]
pub struct Atoms {
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
    pub wm_take_focus: Atom,
    pub wm_state: Atom,
    pub wm_change_state: Atom,
    pub utf8_string: Atom,
    pub net_supported: Atom,
    pub net_supporting_wm_check: Atom,
    pub net_wm_name: Atom,
    pub net_active_window: Atom,
    pub net_close_window: Atom,
}

impl Atoms {
    /// Intern all required atoms
    pub fn new<C: Connection>(conn: &C) -> Result<Self> {
        let intern = |name: &str| -> Result<Atom> {
            Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
        };

        Ok(Self {
            wm_protocols: intern("WM_PROTOCOLS")?,
            wm_delete_window: intern("WM_DELETE_WINDOW")?,
            wm_take_focus: intern("WM_TAKE_FOCUS")?,
            wm_state: intern("WM_STATE")?,
            wm_change_state: intern("WM_CHANGE_STATE")?,
            utf8_string: intern("UTF8_STRING")?,
            net_supported: intern("_NET_SUPPORTED")?,
            net_supporting_wm_check: intern("_NET_SUPPORTING_WM_CHECK")?,
            net_wm_name: intern("_NET_WM_NAME")?,
            net_active_window: intern("_NET_ACTIVE_WINDOW")?,
            net_close_window: intern("_NET_CLOSE_WINDOW")?,
        })
    }

    /// Advertise the supported hints and the check window on a root
    pub fn setup_supported<C: Connection>(&self, conn: &C, root: Window, check: Window) -> Result<()> {
        let supported = [
            self.net_supported,
            self.net_supporting_wm_check,
            self.net_wm_name,
            self.net_active_window,
            self.net_close_window,
        ];
        conn.change_property32(PropMode::REPLACE, root, self.net_supported, AtomEnum::ATOM, &supported)?;

        for window in [root, check] {
            conn.change_property32(
                PropMode::REPLACE,
                window,
                self.net_supporting_wm_check,
                AtomEnum::WINDOW,
                &[check],
            )?;
        }
        conn.change_property8(
            PropMode::REPLACE,
            check,
            self.net_wm_name,
            self.utf8_string,
            WM_NAME.as_bytes(),
        )?;
        Ok(())
    }

    /// Update _NET_ACTIVE_WINDOW
    pub fn update_active_window<C: Connection>(&self, conn: &C, root: Window, window: Option<Window>) -> Result<()> {
        let win = window.unwrap_or(x11rb::NONE);
        conn.change_property32(PropMode::REPLACE, root, self.net_active_window, AtomEnum::WINDOW, &[win])?;
        Ok(())
    }

    /// Write WM_STATE (state, no icon window)
    pub fn set_wm_state<C: Connection>(&self, conn: &C, window: Window, state: WmState) -> Result<()> {
        conn.change_property32(
            PropMode::REPLACE,
            window,
            self.wm_state,
            self.wm_state,
            &[wm_state_value(state), x11rb::NONE],
        )?;
        Ok(())
    }

    /// Protocols named by a WM_PROTOCOLS atom list
    pub fn protocols(&self, atoms: &[Atom]) -> WmProtocols {
        let mut protocols = WmProtocols::empty();
        for &atom in atoms {
            if atom == self.wm_delete_window {
                protocols |= WmProtocols::DELETE;
            } else if atom == self.wm_take_focus {
                protocols |= WmProtocols::TAKE_FOCUS;
            }
        }
        protocols
    }

    /// Send a WM_PROTOCOLS client message
    pub fn send_protocol<C: Connection>(&self, conn: &C, window: Window, protocol: Atom, time: u32) -> Result<()> {
        let event = ClientMessageEvent::new(32, window, self.wm_protocols, [protocol, time, 0, 0, 0]);
        if let Err(e) = conn.send_event(false, window, EventMask::NO_EVENT, event) {
            debug!("Failed to send protocol message to 0x{:x}: {}", window, e);
        }
        Ok(())
    }
}

fn wm_state_value(state: WmState) -> u32 {
    match state {
        WmState::Withdrawn => 0,
        WmState::Normal => 1,
        WmState::Iconic => ICONIC_STATE,
    }
}

/// WM_COMMAND is a list of NUL-terminated arguments
pub fn decode_command(value: &[u8]) -> Option<String> {
    let args: Vec<String> = value
        .split(|&b| b == 0)
        .filter(|arg| !arg.is_empty())
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect();
    if args.is_empty() {
        None
    } else {
        Some(args.join(" "))
    }
}
