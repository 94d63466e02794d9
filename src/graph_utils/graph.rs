use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::reconcile::{self, LinkPlan};

// Basic type aliases for clarity
pub type NodeId = Uuid;
pub type LinkId = Uuid;

/// Closed set of color tags a node can carry, numbered 1..=9 in the UI.
///
/// `Gray` is the neutral tag: it paints like any other color but never pulls
/// nodes into an auto-linked clique.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorTag {
    Red,
    Orange,
    Yellow,
    Green,
    Teal,
    Blue,
    Purple,
    Pink,
    Gray,
}

impl ColorTag {
    pub const ALL: [ColorTag; 9] = [
        ColorTag::Red,
        ColorTag::Orange,
        ColorTag::Yellow,
        ColorTag::Green,
        ColorTag::Teal,
        ColorTag::Blue,
        ColorTag::Purple,
        ColorTag::Pink,
        ColorTag::Gray,
    ];

    /// Tag for a 1-based number as shown in the UI (1..=9).
    pub fn from_number(n: u8) -> Option<Self> {
        if n == 0 { return None; }
        Self::ALL.get(n as usize - 1).copied()
    }

    pub fn number(self) -> u8 {
        self as u8 + 1
    }

    pub fn is_neutral(self) -> bool {
        self == ColorTag::Gray
    }

    pub fn name(self) -> &'static str {
        match self {
            ColorTag::Red => "red",
            ColorTag::Orange => "orange",
            ColorTag::Yellow => "yellow",
            ColorTag::Green => "green",
            ColorTag::Teal => "teal",
            ColorTag::Blue => "blue",
            ColorTag::Purple => "purple",
            ColorTag::Pink => "pink",
            ColorTag::Gray => "gray",
        }
    }
}

/// True when the tag takes part in auto-linking.
pub fn links_by_color(color: Option<ColorTag>) -> bool {
    matches!(color, Some(c) if !c.is_neutral())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub text: String,
    pub color: Option<ColorTag>,
    // Captured once the layout settles; None lets it re-settle
    pub position: Option<(f32, f32)>,
    pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub source: NodeId,
    pub target: NodeId,
}

impl Link {
    pub fn key(&self) -> LinkKey {
        LinkKey::new(self.source, self.target)
    }

    pub fn touches(&self, id: NodeId) -> bool {
        self.source == id || self.target == id
    }

    /// The endpoint that is not `id`, if `id` is an endpoint at all.
    pub fn other_end(&self, id: NodeId) -> Option<NodeId> {
        if self.source == id {
            Some(self.target)
        } else if self.target == id {
            Some(self.source)
        } else {
            None
        }
    }
}

/// Unordered endpoint pair; `LinkKey::new(a, b) == LinkKey::new(b, a)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LinkKey(NodeId, NodeId);

impl LinkKey {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        if a <= b { LinkKey(a, b) } else { LinkKey(b, a) }
    }

    pub fn ends(&self) -> (NodeId, NodeId) {
        (self.0, self.1)
    }
}

/// Immutable view of nodes and links handed out to renderers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphData {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

impl GraphData {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    pub fn find_link(&self, a: NodeId, b: NodeId) -> Option<&Link> {
        let key = LinkKey::new(a, b);
        self.links.iter().find(|l| l.key() == key)
    }

    pub fn links_of(&self, id: NodeId) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(move |l| l.touches(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    EmptyText,
    UnknownNode(NodeId),
    SelfLink(NodeId),
    DuplicateLink(NodeId, NodeId),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::EmptyText => write!(f, "node text is empty"),
            StoreError::UnknownNode(id) => write!(f, "unknown node {}", id),
            StoreError::SelfLink(id) => write!(f, "cannot link node {} to itself", id),
            StoreError::DuplicateLink(a, b) => write!(f, "nodes {} and {} are already linked", a, b),
        }
    }
}

impl std::error::Error for StoreError {}

/// Mutation record mirrored to the persistence collaborator.
#[derive(Clone, Debug, PartialEq)]
pub enum PersistOp {
    CreateNode(Node),
    UpdateNode(Node),
    UpdateNodes(Vec<Node>),
    DeleteNode(NodeId),
    CreateLink(Link),
    DeleteLink(LinkId),
}

/// Canonical graph plus the session subset.
///
/// Both graphs sit behind `Arc` and are mutated copy-on-write, so snapshots
/// returned earlier never observe later changes. Session links are always
/// the canonical links whose endpoints are both session members.
#[derive(Debug, Default)]
pub struct GraphStore {
    canonical: Arc<GraphData>,
    session: Arc<GraphData>,
    outbox: Vec<PersistOp>,
}

impl GraphStore {
    // Instantiate a new, empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from backend records. Links with a missing endpoint, self
    /// links, and repeated pairs are dropped. The session starts empty.
    pub fn from_records(nodes: Vec<Node>, links: Vec<Link>) -> Self {
        let ids: HashSet<NodeId> = nodes.iter().map(|n| n.id).collect();
        let mut seen: HashSet<LinkKey> = HashSet::new();
        let mut kept = Vec::with_capacity(links.len());
        for link in links {
            let valid = link.source != link.target
                && ids.contains(&link.source)
                && ids.contains(&link.target);
            if valid && seen.insert(link.key()) {
                kept.push(link);
            } else {
                debug!("dropping stored link {} ({} - {})", link.id, link.source, link.target);
            }
        }
        Self {
            canonical: Arc::new(GraphData { nodes, links: kept }),
            session: Arc::new(GraphData::default()),
            outbox: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> Arc<GraphData> {
        Arc::clone(&self.canonical)
    }

    pub fn session_snapshot(&self) -> Arc<GraphData> {
        Arc::clone(&self.session)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.canonical.node(id)
    }

    pub fn node_count(&self) -> usize {
        self.canonical.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.canonical.links.len()
    }

    pub fn links_of(&self, id: NodeId) -> Vec<Link> {
        self.canonical.links_of(id).cloned().collect()
    }

    pub fn in_session(&self, id: NodeId) -> bool {
        self.session.contains_node(id)
    }

    /// Take every mutation recorded since the last drain, oldest first.
    pub fn drain_outbox(&mut self) -> Vec<PersistOp> {
        std::mem::take(&mut self.outbox)
    }

    // Node operations

    pub fn create_node(&mut self, text: &str) -> Result<Node, StoreError> {
        if text.trim().is_empty() {
            warn!("rejected node with empty text");
            return Err(StoreError::EmptyText);
        }
        let node = Node {
            id: Uuid::now_v7(),
            text: text.to_string(),
            color: None,
            position: None,
            updated_at: OffsetDateTime::now_utc(),
        };
        Arc::make_mut(&mut self.canonical).nodes.push(node.clone());
        Arc::make_mut(&mut self.session).nodes.push(node.clone());
        self.outbox.push(PersistOp::CreateNode(node.clone()));
        debug!("created node {}", node.id);
        Ok(node)
    }

    pub fn update_node_text(&mut self, id: NodeId, text: &str) -> Result<Node, StoreError> {
        if !self.canonical.contains_node(id) {
            warn!("text update for unknown node {}", id);
            return Err(StoreError::UnknownNode(id));
        }
        if text.trim().is_empty() {
            warn!("rejected empty text for node {}", id);
            return Err(StoreError::EmptyText);
        }
        let updated = self.modify_node(id, |n| n.text = text.to_string())?;
        self.outbox.push(PersistOp::UpdateNode(updated.clone()));
        Ok(updated)
    }

    /// Capture or clear a layout position.
    pub fn set_node_position(&mut self, id: NodeId, position: Option<(f32, f32)>) -> Result<Node, StoreError> {
        let updated = self.modify_node(id, |n| n.position = position)?;
        self.outbox.push(PersistOp::UpdateNode(updated.clone()));
        Ok(updated)
    }

    /// Clear every captured position so the layout can settle again.
    /// Mirrored as a single batch update.
    pub fn clear_positions(&mut self) -> usize {
        let pinned: Vec<NodeId> = self
            .canonical
            .nodes
            .iter()
            .filter(|n| n.position.is_some())
            .map(|n| n.id)
            .collect();
        let mut batch = Vec::with_capacity(pinned.len());
        for id in pinned {
            if let Ok(n) = self.modify_node(id, |n| n.position = None) {
                batch.push(n);
            }
        }
        let count = batch.len();
        if count > 0 {
            self.outbox.push(PersistOp::UpdateNodes(batch));
        }
        count
    }

    pub fn delete_node(&mut self, id: NodeId) {
        if !self.canonical.contains_node(id) {
            return;
        }
        let incident: Vec<LinkId> = self.canonical.links_of(id).map(|l| l.id).collect();
        for lid in incident {
            self.delete_link(lid);
        }
        Arc::make_mut(&mut self.canonical).nodes.retain(|n| n.id != id);
        if self.session.contains_node(id) {
            Arc::make_mut(&mut self.session).nodes.retain(|n| n.id != id);
        }
        self.outbox.push(PersistOp::DeleteNode(id));
        debug!("deleted node {}", id);
    }

    /// Color entry point. Link maintenance for the color clique happens
    /// before this returns: links justified only by the old tag go first,
    /// then links to every session peer with the new tag are added.
    pub fn update_node_color(&mut self, id: NodeId, color: Option<ColorTag>) -> Result<Node, StoreError> {
        let old = match self.canonical.node(id) {
            Some(n) => n.color,
            None => {
                warn!("color update for unknown node {}", id);
                return Err(StoreError::UnknownNode(id));
            }
        };
        let updated = self.modify_node(id, |n| n.color = color)?;
        self.outbox.push(PersistOp::UpdateNode(updated.clone()));

        let plan = reconcile::plan(&self.session.nodes, &self.canonical.links, id, old, color);
        self.apply_plan(plan);
        Ok(updated)
    }

    // Link operations

    pub fn create_link(&mut self, a: NodeId, b: NodeId) -> Result<Link, StoreError> {
        if a == b {
            warn!("rejected self link on {}", a);
            return Err(StoreError::SelfLink(a));
        }
        for id in [a, b] {
            if !self.canonical.contains_node(id) {
                warn!("rejected link to unknown node {}", id);
                return Err(StoreError::UnknownNode(id));
            }
        }
        if self.canonical.find_link(a, b).is_some() {
            debug!("link {} - {} already present", a, b);
            return Err(StoreError::DuplicateLink(a, b));
        }
        let link = Link { id: Uuid::now_v7(), source: a, target: b };
        Arc::make_mut(&mut self.canonical).links.push(link.clone());
        if self.session.contains_node(a) && self.session.contains_node(b) {
            Arc::make_mut(&mut self.session).links.push(link.clone());
        }
        self.outbox.push(PersistOp::CreateLink(link.clone()));
        Ok(link)
    }

    pub fn delete_link(&mut self, id: LinkId) {
        if !self.canonical.links.iter().any(|l| l.id == id) {
            return;
        }
        Arc::make_mut(&mut self.canonical).links.retain(|l| l.id != id);
        if self.session.links.iter().any(|l| l.id == id) {
            Arc::make_mut(&mut self.session).links.retain(|l| l.id != id);
        }
        self.outbox.push(PersistOp::DeleteLink(id));
    }

    // Session membership

    /// Replace the session with the given nodes (unknown ids are ignored).
    pub fn set_session(&mut self, ids: &HashSet<NodeId>) {
        let nodes: Vec<Node> = self
            .canonical
            .nodes
            .iter()
            .filter(|n| ids.contains(&n.id))
            .cloned()
            .collect();
        self.session = Arc::new(self.session_graph(nodes));
    }

    /// Add nodes to the session, keeping current members.
    pub fn add_to_session(&mut self, ids: &HashSet<NodeId>) {
        let nodes: Vec<Node> = self
            .canonical
            .nodes
            .iter()
            .filter(|n| ids.contains(&n.id) || self.session.contains_node(n.id))
            .cloned()
            .collect();
        self.session = Arc::new(self.session_graph(nodes));
    }

    pub fn clear_session(&mut self) {
        self.session = Arc::new(GraphData::default());
    }

    // Internals

    fn session_graph(&self, nodes: Vec<Node>) -> GraphData {
        let members: HashSet<NodeId> = nodes.iter().map(|n| n.id).collect();
        let links = self
            .canonical
            .links
            .iter()
            .filter(|l| members.contains(&l.source) && members.contains(&l.target))
            .cloned()
            .collect();
        GraphData { nodes, links }
    }

    // Apply `f` to the node in both graphs and stamp it.
    fn modify_node(&mut self, id: NodeId, f: impl Fn(&mut Node)) -> Result<Node, StoreError> {
        let canonical = Arc::make_mut(&mut self.canonical);
        let Some(node) = canonical.node_mut(id) else {
            warn!("update for unknown node {}", id);
            return Err(StoreError::UnknownNode(id));
        };
        f(node);
        node.updated_at = OffsetDateTime::now_utc();
        let updated = node.clone();
        if self.session.contains_node(id) {
            if let Some(s) = Arc::make_mut(&mut self.session).node_mut(id) {
                *s = updated.clone();
            }
        }
        Ok(updated)
    }

    fn apply_plan(&mut self, plan: LinkPlan) {
        if plan.is_empty() {
            return;
        }
        debug!("reconcile: -{} +{} links", plan.remove.len(), plan.add.len());
        for lid in plan.remove {
            self.delete_link(lid);
        }
        for key in plan.add {
            let (a, b) = key.ends();
            // Plan already excludes existing pairs; a rejection here is a no-op.
            if let Err(e) = self.create_link(a, b) {
                debug!("reconcile skipped link: {}", e);
            }
        }
    }
}
