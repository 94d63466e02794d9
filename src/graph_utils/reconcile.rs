//! Link maintenance for the color clique rule.
//!
//! Nodes sharing a non-neutral color tag must be pairwise linked. When a
//! node's tag changes, [`plan`] works out which links to drop and which pairs
//! to join. The store applies removals before additions.
//!
//! Removal looks at any previous tag, the neutral one included: leaving a tag
//! unlinks the node from peers still carrying it. Only additions skip the
//! neutral tag.
//!
//! Scope is the session node set only: nodes outside the current context view
//! are neither linked nor unlinked by a color change, even when they carry the
//! same tag. This limitation is kept on purpose and may be widened to the full
//! graph later.

use std::collections::HashSet;

use super::graph::{links_by_color, ColorTag, Link, LinkId, LinkKey, Node, NodeId};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkPlan {
    pub remove: Vec<LinkId>,
    pub add: Vec<LinkKey>,
}

impl LinkPlan {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}

/// Compute the link changes for `node` moving from `old` to `new`.
///
/// `scope` holds the session nodes as they are *after* the color change was
/// recorded (the recolored node's own entry is ignored), `links` the
/// canonical link set before any change.
pub fn plan(
    scope: &[Node],
    links: &[Link],
    node: NodeId,
    old: Option<ColorTag>,
    new: Option<ColorTag>,
) -> LinkPlan {
    let mut out = LinkPlan::default();
    if !scope.iter().any(|n| n.id == node) {
        return out;
    }

    if old.is_some() && old != new {
        let former_peers: HashSet<NodeId> = scope
            .iter()
            .filter(|n| n.id != node && n.color == old)
            .map(|n| n.id)
            .collect();
        out.remove = links
            .iter()
            .filter_map(|l| match l.other_end(node) {
                Some(other) if former_peers.contains(&other) => Some(l.id),
                _ => None,
            })
            .collect();
    }

    if links_by_color(new) {
        let existing: HashSet<LinkKey> = links
            .iter()
            .filter(|l| !out.remove.contains(&l.id))
            .map(Link::key)
            .collect();
        out.add = scope
            .iter()
            .filter(|n| n.id != node && n.color == new)
            .map(|n| LinkKey::new(node, n.id))
            .filter(|k| !existing.contains(k))
            .collect();
    }

    out
}
