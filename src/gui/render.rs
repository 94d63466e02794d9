//! Paint attributes for nodes and links.
//!
//! Everything here is a pure function of node data plus hover/selection
//! state; the canvas only turns the resulting values into shapes.

use std::collections::HashSet;

use egui::{Color32, Pos2, Rect, Vec2};
use time::OffsetDateTime;

use crate::graph_utils::graph::{ColorTag, Link, Node, NodeId};

pub const ELLIPSIS: char = '…';
pub const DEFAULT_LABEL_BUDGET: usize = 24;

pub const LABEL_FONT_SIZE: f32 = 13.0;
pub const LABEL_PADDING: Vec2 = Vec2::new(8.0, 5.0);
pub const HOVER_SCALE: f32 = 1.2;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NodeStyle {
    pub fill: Color32,
    pub border: Color32,
}

// Indexed by ColorTag discriminant.
const PALETTE: [NodeStyle; 9] = [
    NodeStyle { fill: Color32::from_rgb(0xff, 0xb3, 0xb3), border: Color32::from_rgb(0xd6, 0x45, 0x45) }, // red
    NodeStyle { fill: Color32::from_rgb(0xff, 0xd1, 0xa3), border: Color32::from_rgb(0xe0, 0x84, 0x2c) }, // orange
    NodeStyle { fill: Color32::from_rgb(0xff, 0xf1, 0xa3), border: Color32::from_rgb(0xcc, 0xad, 0x1f) }, // yellow
    NodeStyle { fill: Color32::from_rgb(0xbf, 0xec, 0xb0), border: Color32::from_rgb(0x4c, 0xa6, 0x3a) }, // green
    NodeStyle { fill: Color32::from_rgb(0xa8, 0xe8, 0xe0), border: Color32::from_rgb(0x2a, 0x9d, 0x8f) }, // teal
    NodeStyle { fill: Color32::from_rgb(0xb3, 0xcd, 0xff), border: Color32::from_rgb(0x3d, 0x6f, 0xd6) }, // blue
    NodeStyle { fill: Color32::from_rgb(0xd7, 0xbd, 0xff), border: Color32::from_rgb(0x80, 0x4d, 0xd6) }, // purple
    NodeStyle { fill: Color32::from_rgb(0xff, 0xbd, 0xe6), border: Color32::from_rgb(0xd6, 0x4d, 0xa3) }, // pink
    NodeStyle { fill: Color32::from_rgb(0xd0, 0xd0, 0xd0), border: Color32::from_rgb(0x80, 0x80, 0x80) }, // gray
];

pub const NEUTRAL_STYLE: NodeStyle = NodeStyle {
    fill: Color32::from_rgb(0xf4, 0xf4, 0xf4),
    border: Color32::from_rgb(0xb0, 0xb0, 0xb0),
};

pub const SELECTED_BORDER: Color32 = Color32::from_rgb(0x1e, 0x90, 0xff);
pub const LINK_COLOR: Color32 = Color32::from_rgb(0x9a, 0x9a, 0x9a);
pub const LINK_HOVER_COLOR: Color32 = Color32::from_rgb(0x55, 0x55, 0x55);

impl ColorTag {
    pub fn style(self) -> &'static NodeStyle {
        &PALETTE[self as usize]
    }
}

pub fn style_for(color: Option<ColorTag>) -> &'static NodeStyle {
    match color {
        Some(c) => c.style(),
        None => &NEUTRAL_STYLE,
    }
}

/// First line of `text`, cut to `budget` characters plus an ellipsis when
/// longer.
pub fn label_for(text: &str, budget: usize) -> String {
    let first = text.lines().next().unwrap_or("").trim_end();
    if first.chars().count() > budget {
        let mut out: String = first.chars().take(budget).collect();
        out.push(ELLIPSIS);
        out
    } else {
        first.to_string()
    }
}

// (max age in days, opacity); older than the last entry uses RECENCY_FLOOR
const RECENCY_STEPS: [(i64, f32); 5] = [(0, 1.0), (1, 0.85), (3, 0.7), (7, 0.55), (30, 0.4)];
pub const RECENCY_FLOOR: f32 = 0.3;

/// Opacity by calendar days between the node's last change and `now`, both
/// read in `now`'s offset. Timestamps in the future count as today.
pub fn recency_opacity(updated_at: OffsetDateTime, now: OffsetDateTime) -> f32 {
    let changed_on = updated_at.to_offset(now.offset()).date();
    let days = (now.date() - changed_on).whole_days().max(0);
    RECENCY_STEPS
        .iter()
        .find(|(max_days, _)| days <= *max_days)
        .map(|(_, o)| *o)
        .unwrap_or(RECENCY_FLOOR)
}

/// Per-frame state that influences painting.
pub struct PaintContext<'a> {
    pub hover: Option<NodeId>,
    pub selected: &'a HashSet<NodeId>,
    pub now: OffsetDateTime,
    pub label_budget: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodePaint {
    pub label: String,
    pub fill: Color32,
    pub border: Color32,
    pub opacity: f32,
    pub scale: f32,
    pub shadow: bool,
}

pub fn node_paint(node: &Node, ctx: &PaintContext<'_>) -> NodePaint {
    let style = style_for(node.color);
    let hovered = ctx.hover == Some(node.id);
    let border = if !hovered && ctx.selected.contains(&node.id) { SELECTED_BORDER } else { style.border };
    NodePaint {
        label: label_for(&node.text, ctx.label_budget),
        fill: style.fill,
        border,
        opacity: recency_opacity(node.updated_at, ctx.now),
        scale: if hovered { HOVER_SCALE } else { 1.0 },
        shadow: hovered,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkPaint {
    pub color: Color32,
    pub width: f32,
}

pub fn link_paint(link: &Link, ctx: &PaintContext<'_>) -> LinkPaint {
    match ctx.hover {
        Some(h) if link.touches(h) => LinkPaint { color: LINK_HOVER_COLOR, width: 2.0 },
        _ => LinkPaint { color: LINK_COLOR, width: 1.0 },
    }
}

/// Screen-space box a node's label occupies; used for both drawing and
/// pointer hits. `label_width` is the unscaled text width.
pub fn hit_region(center: Pos2, label_width: f32, zoom: f32, scale: f32) -> Rect {
    let size = Vec2::new(label_width, LABEL_FONT_SIZE) + LABEL_PADDING * 2.0;
    Rect::from_center_size(center, size * zoom * scale)
}

/// Topmost region (last painted) containing `pos`.
pub fn hit_test(regions: &[(NodeId, Rect)], pos: Pos2) -> Option<NodeId> {
    regions.iter().rev().find(|(_, r)| r.contains(pos)).map(|(id, _)| *id)
}

/// Apply node opacity to a color.
pub fn faded(color: Color32, opacity: f32) -> Color32 {
    color.gamma_multiply(opacity)
}
