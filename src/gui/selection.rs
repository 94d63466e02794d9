use std::collections::HashSet;

use egui::{Pos2, Rect, Vec2};

use crate::graph_utils::graph::{GraphStore, NodeId};

/// Mapping between graph space and screen space, supplied by whatever lays
/// out and draws the graph.
pub trait ScreenTransform {
    fn graph_to_screen(&self, p: Pos2) -> Pos2;
    fn screen_to_graph(&self, p: Pos2) -> Pos2;
}

/// Pan/zoom around the canvas center, as used by the built-in canvas.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PanZoom {
    pub center: Pos2,
    pub pan: Vec2,
    pub zoom: f32,
}

impl PanZoom {
    pub fn identity() -> Self {
        Self { center: Pos2::ZERO, pan: Vec2::ZERO, zoom: 1.0 }
    }
}

impl ScreenTransform for PanZoom {
    fn graph_to_screen(&self, p: Pos2) -> Pos2 {
        Pos2::new(
            (p.x - self.center.x) * self.zoom + self.center.x + self.pan.x,
            (p.y - self.center.y) * self.zoom + self.center.y + self.pan.y,
        )
    }

    fn screen_to_graph(&self, p: Pos2) -> Pos2 {
        Pos2::new(
            ((p.x - self.pan.x) - self.center.x) / self.zoom + self.center.x,
            ((p.y - self.pan.y) - self.center.y) / self.zoom + self.center.y,
        )
    }
}

/// Receives the finished selection of a rubber-band drag.
pub trait SelectionSink {
    fn selection_changed(&mut self, selected: &HashSet<NodeId>);
}

// The session view follows the latest rectangle selection.
impl SelectionSink for GraphStore {
    fn selection_changed(&mut self, selected: &HashSet<NodeId>) {
        self.set_session(selected);
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum DragState {
    Idle,
    Dragging { start: Pos2, end: Pos2 },
}

/// Whether pointer drags pan the view or draw a selection rectangle.
/// Holding the command modifier switches to `Select`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InteractionMode {
    Navigate,
    Select,
}

#[derive(Debug)]
pub struct SelectionOverlay {
    state: DragState,
    mode: InteractionMode,
    selected: HashSet<NodeId>,
}

impl Default for SelectionOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionOverlay {
    pub fn new() -> Self {
        Self { state: DragState::Idle, mode: InteractionMode::Navigate, selected: HashSet::new() }
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    /// Layout pan/zoom is suspended while in select mode.
    pub fn pan_zoom_enabled(&self) -> bool {
        self.mode == InteractionMode::Navigate
    }

    pub fn set_select_mode(&mut self, held: bool) {
        self.mode = if held { InteractionMode::Select } else { InteractionMode::Navigate };
        if !held {
            self.state = DragState::Idle;
        }
    }

    pub fn selected(&self) -> &HashSet<NodeId> {
        &self.selected
    }

    /// Primary press on the canvas. Returns true when a drag started.
    pub fn press(&mut self, pos: Pos2) -> bool {
        if self.mode != InteractionMode::Select {
            return false;
        }
        self.state = DragState::Dragging { start: pos, end: pos };
        true
    }

    pub fn drag_to(&mut self, pos: Pos2) {
        if let DragState::Dragging { start, .. } = self.state {
            self.state = DragState::Dragging { start, end: pos };
        }
    }

    /// Screen-space rubber band while dragging.
    pub fn current_rect(&self) -> Option<Rect> {
        match self.state {
            DragState::Dragging { start, end } => Some(Rect::from_two_pos(start, end)),
            DragState::Idle => None,
        }
    }

    /// Finish the drag: every node whose projected position lies in the
    /// rectangle (edges inclusive) becomes the selection, replacing the
    /// previous one. `positions` are graph-space node positions.
    pub fn release(
        &mut self,
        positions: impl IntoIterator<Item = (NodeId, Pos2)>,
        view: &impl ScreenTransform,
    ) -> Option<&HashSet<NodeId>> {
        let DragState::Dragging { start, end } = std::mem::replace(&mut self.state, DragState::Idle) else {
            return None;
        };
        let rect = Rect::from_two_pos(start, end);
        self.selected = positions
            .into_iter()
            .filter(|(_, p)| rect.contains(view.graph_to_screen(*p)))
            .map(|(id, _)| id)
            .collect();
        log::debug!("rectangle selected {} nodes", self.selected.len());
        Some(&self.selected)
    }

    /// Release and hand the result to `sink`.
    pub fn release_into(
        &mut self,
        positions: impl IntoIterator<Item = (NodeId, Pos2)>,
        view: &impl ScreenTransform,
        sink: &mut impl SelectionSink,
    ) -> bool {
        match self.release(positions, view) {
            Some(selected) => {
                sink.selection_changed(selected);
                true
            }
            None => false,
        }
    }

    pub fn toggle(&mut self, id: NodeId) {
        if !self.selected.remove(&id) {
            self.selected.insert(id);
        }
    }

    pub fn select_only(&mut self, id: NodeId) {
        self.selected.clear();
        self.selected.insert(id);
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Drop ids that no longer exist in the store.
    pub fn retain_existing(&mut self, store: &GraphStore) {
        self.selected.retain(|id| store.node(*id).is_some());
    }
}
