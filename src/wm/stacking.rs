//! Stacking Module
//!
//! Stack ranks of managed clients and the bottom-to-top bookkeeping used when
//! a hidden group is shown again.

use tracing::debug;

use crate::wm::adapter::Window;
use crate::wm::client::ClientId;
use crate::wm::registry::ClientRegistry;

/// Recompute stack ranks from a screen's bottom-first window order.
///
/// Only visible managed clients take part; the bottom-most one gets rank 0.
pub fn update_ranks(registry: &mut ClientRegistry, screen: usize, bottom_first: &[Window]) {
    let mut rank = 0;
    for &window in bottom_first {
        let Some(id) = registry.find(window) else {
            continue;
        };
        let Some(client) = registry.get_mut(id) else {
            continue;
        };
        if client.screen != screen || client.is_hidden() {
            continue;
        }
        client.stack_rank = rank;
        rank += 1;
    }
    debug!("Updated stack ranks for {} clients on screen {}", rank, screen);
}

/// Order windows top-first from their recorded ranks.
///
/// Each window lands in the slot `highest - rank`; entries sharing a slot keep
/// their input order and empty slots are dropped.
pub fn restack_order(windows: &[(Window, u32)], highest: u32) -> Vec<Window> {
    let mut slots: Vec<Vec<Window>> = vec![Vec::new(); highest as usize + 1];
    for &(window, rank) in windows {
        let slot = highest.saturating_sub(rank.min(highest)) as usize;
        slots[slot].push(window);
    }
    slots.into_iter().flatten().collect()
}

/// Frames of the given clients paired with their ranks
pub fn ranked_frames(registry: &ClientRegistry, ids: &[ClientId]) -> Vec<(Window, u32)> {
    ids.iter()
        .filter_map(|&id| registry.get(id))
        .map(|c| (c.frame, c.stack_rank))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Geometry;
    use crate::wm::client::Client;
    use crate::wm::client_flags::ClientFlags;

    #[test]
    fn ranks_skip_hidden_and_unmanaged() {
        let mut registry = ClientRegistry::new();
        let a = registry.insert(Client::new(1, 0, Geometry::new(0, 0, 10, 10), 0));
        let b = registry.insert(Client::new(2, 0, Geometry::new(0, 0, 10, 10), 0));
        let c = registry.insert(Client::new(3, 0, Geometry::new(0, 0, 10, 10), 0));
        if let Some(client) = registry.get_mut(b) {
            client.flags.insert(ClientFlags::HIDDEN);
        }

        update_ranks(&mut registry, 0, &[3, 99, 2, 1]);
        assert_eq!(registry.get(c).map(|c| c.stack_rank), Some(0));
        assert_eq!(registry.get(a).map(|c| c.stack_rank), Some(1));
    }

    #[test]
    fn restack_puts_highest_rank_first() {
        let order = restack_order(&[(10, 0), (11, 4), (12, 2)], 4);
        assert_eq!(order, vec![11, 12, 10]);
    }

    #[test]
    fn restack_keeps_equal_ranks_stable() {
        let order = restack_order(&[(10, 1), (11, 1), (12, 0)], 1);
        assert_eq!(order, vec![10, 11, 12]);
    }
}
