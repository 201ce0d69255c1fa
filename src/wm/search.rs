//! Search Module
//!
//! Text matching behind the menus. Client search ranks candidates into
//! priority tiers; everything else is a plain case-insensitive filter.

use crate::wm::client::{Client, ClientId};

/// Number of client ranking tiers
pub const TIERS: usize = 4;

const LABEL_TIER: usize = 0;
const NAME_TIER: usize = 2;
const CLASS_TIER: usize = 3;

/// What client search looks at
#[derive(Debug, Clone)]
pub struct ClientCandidate {
    pub id: ClientId,
    pub label: Option<String>,
    /// Name history, most recent first
    pub names: Vec<String>,
    pub class: String,
    pub active: bool,
    pub hidden: bool,
}

impl ClientCandidate {
    pub fn new(id: ClientId, client: &Client) -> Self {
        Self {
            id,
            label: client.label.clone(),
            names: client.names().recent_first().map(str::to_string).collect(),
            class: client.class.class.clone(),
            active: client.is_active(),
            hidden: client.is_hidden(),
        }
    }
}

/// A ranked client and the text that matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub id: ClientId,
    pub tier: usize,
    pub matched: String,
}

/// Case-insensitive substring match
pub fn match_text(query: &str, text: &str) -> bool {
    text.to_lowercase().contains(&query.to_lowercase())
}

/// Case-insensitive prefix match
pub fn match_path(query: &str, text: &str) -> bool {
    text.to_lowercase().starts_with(&query.to_lowercase())
}

/// Tier a candidate falls in before focus/visibility adjustment
fn base_tier(query: &str, candidate: &ClientCandidate) -> Option<(usize, String)> {
    if let Some(label) = candidate.label.as_deref().filter(|label| match_text(query, label)) {
        return Some((LABEL_TIER, label.to_string()));
    }
    if let Some(name) = candidate.names.iter().find(|name| match_text(query, name)) {
        return Some((NAME_TIER, name.clone()));
    }
    if match_text(query, &candidate.class) {
        return Some((CLASS_TIER, candidate.class.clone()));
    }
    None
}

/// Rank clients against a query.
///
/// Lower tiers sort first. The active client drops one tier and hidden
/// clients rise one. Within a tier candidates keep their input order.
pub fn rank_clients(query: &str, candidates: &[ClientCandidate]) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = Vec::new();
    // Index of the last hit inserted per tier
    let mut last_in_tier: [Option<usize>; TIERS] = [None; TIERS];

    for candidate in candidates {
        let Some((mut tier, matched)) = base_tier(query, candidate) else {
            continue;
        };
        if candidate.active && tier < TIERS - 1 {
            tier += 1;
        }
        if candidate.hidden && tier != 0 {
            tier -= 1;
        }

        let mut t = tier;
        while t > 0 && last_in_tier[t].is_none() {
            t -= 1;
        }
        let pos = last_in_tier[t].map_or(0, |p| p + 1);

        hits.insert(
            pos,
            SearchHit {
                id: candidate.id,
                tier,
                matched,
            },
        );
        for p in last_in_tier.iter_mut().flatten() {
            if *p >= pos {
                *p += 1;
            }
        }
        last_in_tier[tier] = Some(pos);
    }

    hits
}

/// Indices of texts containing the query, in input order
pub fn filter_text<'a>(query: &str, texts: impl IntoIterator<Item = &'a str>) -> Vec<usize> {
    texts
        .into_iter()
        .enumerate()
        .filter(|(_, text)| match_text(query, text))
        .map(|(i, _)| i)
        .collect()
}

/// Indices of texts starting with the query, sorted by text ignoring case
pub fn filter_path<'a>(query: &str, texts: impl IntoIterator<Item = &'a str>) -> Vec<usize> {
    let mut matches: Vec<(usize, &str)> = texts
        .into_iter()
        .enumerate()
        .filter(|(_, text)| match_path(query, text))
        .collect();
    matches.sort_by_cached_key(|(_, text)| text.to_lowercase());
    matches.into_iter().map(|(i, _)| i).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use slotmap::SlotMap;

    fn ids(count: usize) -> Vec<ClientId> {
        let mut map: SlotMap<ClientId, ()> = SlotMap::with_key();
        (0..count).map(|_| map.insert(())).collect()
    }

    fn candidate(id: ClientId, label: Option<&str>, names: &[&str], class: &str) -> ClientCandidate {
        ClientCandidate {
            id,
            label: label.map(str::to_string),
            names: names.iter().map(|n| n.to_string()).collect(),
            class: class.to_string(),
            active: false,
            hidden: false,
        }
    }

    #[test]
    fn label_beats_name_beats_class() {
        let ids = ids(4);
        let candidates = vec![
            candidate(ids[0], None, &[], "Beta"),
            candidate(ids[1], None, &["beta-2", "old"], "XTerm"),
            candidate(ids[2], Some("beta"), &["shell"], "XTerm"),
            candidate(ids[3], Some("alpha"), &["shell"], "XTerm"),
        ];

        let hits = rank_clients("beta", &candidates);
        let order: Vec<ClientId> = hits.iter().map(|h| h.id).collect();
        assert_eq!(order, vec![ids[2], ids[1], ids[0]]);
        assert_eq!(hits[1].matched, "beta-2");
        assert_eq!(hits.iter().map(|h| h.tier).collect::<Vec<_>>(), vec![0, 2, 3]);
    }

    #[test]
    fn most_recent_name_matches_first() {
        let ids = ids(1);
        let candidates = vec![candidate(ids[0], None, &["vim main.rs", "vim lib.rs"], "XTerm")];
        let hits = rank_clients("vim", &candidates);
        assert_eq!(hits[0].matched, "vim main.rs");
    }

    #[test]
    fn active_client_is_demoted_and_hidden_promoted() {
        let ids = ids(3);
        let mut active = candidate(ids[0], Some("mail"), &[], "");
        active.active = true;
        let mut hidden = candidate(ids[1], None, &[], "Mail");
        hidden.hidden = true;
        let plain = candidate(ids[2], None, &["mail"], "");

        let hits = rank_clients("mail", &[active, hidden, plain]);
        let tiers: Vec<(ClientId, usize)> = hits.iter().map(|h| (h.id, h.tier)).collect();
        assert_eq!(tiers, vec![(ids[0], 1), (ids[1], 2), (ids[2], 2)]);
    }

    #[test]
    fn equal_tiers_keep_input_order() {
        let ids = ids(3);
        let candidates = vec![
            candidate(ids[0], None, &[], "term"),
            candidate(ids[1], None, &["term one"], ""),
            candidate(ids[2], None, &[], "term"),
        ];
        let order: Vec<ClientId> = rank_clients("term", &candidates).iter().map(|h| h.id).collect();
        assert_eq!(order, vec![ids[1], ids[0], ids[2]]);
    }

    #[test]
    fn no_match_is_excluded() {
        let ids = ids(1);
        let candidates = vec![candidate(ids[0], Some("a"), &["b"], "c")];
        assert!(rank_clients("zzz", &candidates).is_empty());
    }

    #[test]
    fn text_and_path_filters() {
        let texts = ["Firefox", "xterm", "XTerm-256"];
        assert_eq!(filter_text("TERM", texts), vec![1, 2]);
        assert_eq!(filter_path("x", texts), vec![1, 2]);
        assert_eq!(filter_path("term", texts), Vec::<usize>::new());
    }

    #[test]
    fn path_completions_sort_ignoring_case() {
        let texts = ["XTerm-256", "xterm", "Xclock", "firefox"];
        assert_eq!(filter_path("X", texts), vec![2, 1, 0]);
    }
}
