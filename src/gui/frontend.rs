#![allow(clippy::collapsible_if)]
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui::{self, Color32, FontId, Pos2, Rect, Sense, Stroke, Vec2};
use log::{info, warn};
use time::OffsetDateTime;

use crate::graph_utils::graph::{ColorTag, GraphData, GraphStore, NodeId};
use crate::graph_utils::import::DEFAULT_DELIMITER;
use crate::gui::commands::{Command, CommandTable};
use crate::gui::render::{self, PaintContext, LABEL_FONT_SIZE};
use crate::gui::selection::{InteractionMode, PanZoom, ScreenTransform, SelectionOverlay};
use crate::persistence::settings::AppSettings;
use crate::persistence::worker::PersistWorker;

// Style for toast notifications
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum NoticeStyle {
    Info,
    Error,
}

// What a canvas drag is doing this gesture
#[derive(Copy, Clone, Debug, PartialEq)]
enum CanvasDrag {
    None,
    Select,
    Node(NodeId),
    Pan,
}

pub struct GraphApp {
    store: GraphStore,
    worker: Option<PersistWorker>,
    settings: AppSettings,
    commands: CommandTable,
    selection: SelectionOverlay,
    // Graph-space layout positions; captured positions in the store win
    layout: HashMap<NodeId, Pos2>,
    canvas_drag: CanvasDrag,
    hover: Option<NodeId>,
    pan: Vec2,
    zoom: f32,
    show_session: bool,
    // Sidebar forms
    new_node_text: String,
    focus_new_node: bool,
    edit_node: Option<NodeId>,
    edit_text: String,
    import_text: String,
    import_delimiter: String,
    // Toasts
    notice: Option<(String, NoticeStyle, Instant)>,
}

impl GraphApp {
    pub fn new(store: GraphStore, worker: Option<PersistWorker>, settings: AppSettings) -> Self {
        Self {
            store,
            worker,
            show_session: settings.show_session_view,
            settings,
            commands: CommandTable::default(),
            selection: SelectionOverlay::new(),
            layout: HashMap::new(),
            canvas_drag: CanvasDrag::None,
            hover: None,
            pan: Vec2::ZERO,
            zoom: 1.0,
            new_node_text: String::new(),
            focus_new_node: false,
            edit_node: None,
            edit_text: String::new(),
            import_text: String::new(),
            import_delimiter: DEFAULT_DELIMITER.to_string(),
            notice: None,
        }
    }

    fn notify(&mut self, msg: impl Into<String>, style: NoticeStyle) {
        self.notice = Some((msg.into(), style, Instant::now()));
    }

    fn report<T, E: std::fmt::Display>(&mut self, res: Result<T, E>) -> Option<T> {
        match res {
            Ok(v) => Some(v),
            Err(e) => {
                self.notify(e.to_string(), NoticeStyle::Error);
                None
            }
        }
    }

    fn view_graph(&self) -> Arc<GraphData> {
        if self.show_session { self.store.session_snapshot() } else { self.store.snapshot() }
    }

    // Dragged position, else captured position, else a stable spiral seed
    fn position_of(&mut self, id: NodeId, captured: Option<(f32, f32)>, rect: Rect) -> Pos2 {
        if self.canvas_drag == CanvasDrag::Node(id) {
            if let Some(p) = self.layout.get(&id) {
                return *p;
            }
        }
        if let Some((x, y)) = captured {
            return Pos2::new(x, y);
        }
        if let Some(p) = self.layout.get(&id) {
            return *p;
        }
        let k = self.layout.len() as u32;
        let pos = golden_spiral_position(rect.center(), k, rect);
        self.layout.insert(id, pos);
        pos
    }

    fn selected_ids(&self) -> Vec<NodeId> {
        self.selection.selected().iter().copied().collect()
    }

    fn run_command(&mut self, cmd: Command) {
        match cmd {
            Command::DeleteSelected => {
                let ids = self.selected_ids();
                for id in &ids {
                    self.store.delete_node(*id);
                    self.layout.remove(id);
                }
                self.selection.clear();
                if !ids.is_empty() {
                    self.notify(format!("Deleted {} node(s)", ids.len()), NoticeStyle::Info);
                }
            }
            Command::ClearSelection => self.selection.clear(),
            Command::ToggleView => self.show_session = !self.show_session,
            Command::LinkSelected => {
                let ids = self.selected_ids();
                if let [a, b] = ids[..] {
                    let res = self.store.create_link(a, b);
                    self.report(res);
                } else {
                    self.notify("Select exactly two nodes to link", NoticeStyle::Error);
                }
            }
            Command::ColorSelected(color) => {
                for id in self.selected_ids() {
                    let res = self.store.update_node_color(id, color);
                    self.report(res);
                }
            }
            Command::ReleasePositions => {
                let n = self.store.clear_positions();
                self.layout.clear();
                self.notify(format!("Released {} position(s)", n), NoticeStyle::Info);
            }
            Command::AddSelectionToSession => {
                let ids = self.selection.selected().clone();
                self.store.add_to_session(&ids);
            }
            Command::FocusNewNode => self.focus_new_node = true,
        }
    }

    // Forward pending mutations and surface any persistence failures
    fn sync_persistence(&mut self) {
        let ops = self.store.drain_outbox();
        let Some(worker) = &self.worker else { return };
        if !ops.is_empty() {
            worker.submit(ops);
        }
        let failures = worker.poll_failures();
        if let Some(f) = failures.last() {
            let msg = format!("Could not save ({}): {}", f.op, f.message);
            self.notify(msg, NoticeStyle::Error);
        }
    }

    fn sidebar(&mut self, ui: &mut egui::Ui) {
        ui.heading("New node");
        let resp = ui.add(egui::TextEdit::multiline(&mut self.new_node_text).desired_rows(3));
        if self.focus_new_node {
            resp.request_focus();
            self.focus_new_node = false;
        }
        if ui.button("Add node").clicked() {
            let text = std::mem::take(&mut self.new_node_text);
            let res = self.store.create_node(&text);
            if let Some(node) = self.report(res) {
                self.selection.select_only(node.id);
            } else {
                self.new_node_text = text;
            }
        }

        ui.separator();
        ui.heading("Selection");
        let selected = self.selected_ids();
        ui.small(format!("{} selected", selected.len()));
        if let [id] = selected[..] {
            if self.edit_node != Some(id) {
                self.edit_node = Some(id);
                self.edit_text = self.store.node(id).map(|n| n.text.clone()).unwrap_or_default();
            }
            ui.add(egui::TextEdit::multiline(&mut self.edit_text).desired_rows(4));
            if ui.button("Save text").clicked() {
                let text = self.edit_text.clone();
                let res = self.store.update_node_text(id, &text);
                self.report(res);
            }
        } else {
            self.edit_node = None;
        }
        if !selected.is_empty() {
            ui.horizontal_wrapped(|ui| {
                for tag in ColorTag::ALL {
                    let style = tag.style();
                    let btn = egui::Button::new(tag.number().to_string())
                        .fill(style.fill)
                        .stroke(Stroke::new(1.0, style.border));
                    if ui.add(btn).on_hover_text(tag.name()).clicked() {
                        self.run_command(Command::ColorSelected(Some(tag)));
                    }
                }
                if ui.button("none").clicked() {
                    self.run_command(Command::ColorSelected(None));
                }
            });
            ui.horizontal(|ui| {
                if ui.button("Link").clicked() { self.run_command(Command::LinkSelected); }
                if ui.button("Delete").clicked() { self.run_command(Command::DeleteSelected); }
                if ui.button("Add to session").clicked() { self.run_command(Command::AddSelectionToSession); }
            });
            if let [id] = selected[..] {
                let links = self.store.links_of(id);
                if !links.is_empty() {
                    ui.small("Links:");
                    for link in links {
                        let Some(other) = link.other_end(id) else { continue };
                        let caption = self
                            .store
                            .node(other)
                            .map(|n| render::label_for(&n.text, self.settings.label_char_budget))
                            .unwrap_or_default();
                        ui.horizontal(|ui| {
                            ui.small(caption);
                            if ui.small_button("unlink").clicked() {
                                self.store.delete_link(link.id);
                            }
                        });
                    }
                }
            }
        }

        ui.separator();
        ui.heading("Session");
        ui.horizontal(|ui| {
            if ui.selectable_label(!self.show_session, "Full graph").clicked() { self.show_session = false; }
            if ui.selectable_label(self.show_session, "Session").clicked() { self.show_session = true; }
        });
        let session = self.store.session_snapshot();
        ui.small(format!("{} nodes, {} links in session", session.nodes.len(), session.links.len()));
        if ui.button("Clear session").clicked() {
            self.store.clear_session();
        }

        ui.separator();
        ui.collapsing("Import", |ui| {
            ui.add(egui::TextEdit::multiline(&mut self.import_text).desired_rows(4));
            ui.horizontal(|ui| {
                ui.label("Delimiter");
                ui.text_edit_singleline(&mut self.import_delimiter);
            });
            if ui.button("Import sections").clicked() {
                let created = self.store.import_sections(&self.import_text, self.import_delimiter.trim());
                self.notify(format!("Imported {} node(s)", created.len()), NoticeStyle::Info);
                self.import_text.clear();
            }
        });
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let available = ui.available_rect_before_wrap();
        let resp = ui.allocate_rect(available, Sense::click_and_drag());
        let painter = ui.painter_at(available);
        let graph = self.view_graph();

        self.selection.set_select_mode(ui.input(|i| i.modifiers.command));

        // Zoom with scroll only while pan/zoom is active
        if resp.hovered() && self.selection.pan_zoom_enabled() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                let factor = (1.0 + scroll * 0.001).clamp(0.9, 1.1);
                self.zoom = (self.zoom * factor).clamp(0.25, 3.0);
            }
        }

        let positions: Vec<(NodeId, Pos2)> = graph
            .nodes
            .iter()
            .map(|n| (n.id, self.position_of(n.id, n.position, available)))
            .collect();
        let world: HashMap<NodeId, Pos2> = positions.iter().copied().collect();
        let view = PanZoom { center: available.center(), pan: self.pan, zoom: self.zoom };
        let to_screen = |p: Pos2| view.graph_to_screen(p);

        let paint_ctx = PaintContext {
            hover: self.hover,
            selected: self.selection.selected(),
            now: OffsetDateTime::now_utc(),
            label_budget: self.settings.label_char_budget,
        };

        // Links first so nodes paint over them
        for link in &graph.links {
            if let (Some(a), Some(b)) = (world.get(&link.source), world.get(&link.target)) {
                let lp = render::link_paint(link, &paint_ctx);
                painter.line_segment([to_screen(*a), to_screen(*b)], Stroke::new(lp.width * self.zoom.max(0.5), lp.color));
            }
        }

        let mut regions: Vec<(NodeId, Rect)> = Vec::with_capacity(graph.nodes.len());
        let mut hovered_paint = None;
        for node in &graph.nodes {
            let Some(p) = world.get(&node.id) else { continue };
            let np = render::node_paint(node, &paint_ctx);
            let measured = painter.layout_no_wrap(np.label.clone(), FontId::proportional(LABEL_FONT_SIZE), Color32::BLACK);
            let rect = render::hit_region(to_screen(*p), measured.size().x, self.zoom, np.scale);
            regions.push((node.id, rect));
            // Hovered node paints last so it sits on top
            if np.shadow {
                hovered_paint = Some((np, rect));
                continue;
            }
            paint_node(&painter, &np, rect, self.zoom);
        }
        if let Some((np, rect)) = hovered_paint {
            paint_node(&painter, &np, rect, self.zoom);
        }

        // Rubber band
        if let Some(r) = self.selection.current_rect() {
            painter.rect_filled(r, 0.0, Color32::from_rgba_unmultiplied(30, 144, 255, 30));
            painter.rect_stroke(r, 0.0, Stroke::new(1.0, render::SELECTED_BORDER), egui::StrokeKind::Inside);
        }

        self.hover = ui.ctx().pointer_hover_pos().and_then(|pos| render::hit_test(&regions, pos));

        // Gesture routing
        if resp.drag_started() {
            let origin = ui.input(|i| i.pointer.press_origin()).or(resp.interact_pointer_pos());
            self.canvas_drag = match origin {
                Some(pos) if self.selection.mode() == InteractionMode::Select => {
                    self.selection.press(pos);
                    CanvasDrag::Select
                }
                Some(pos) => match render::hit_test(&regions, pos) {
                    Some(id) => {
                        if let Some(p) = world.get(&id) {
                            self.layout.insert(id, *p);
                        }
                        CanvasDrag::Node(id)
                    }
                    None => CanvasDrag::Pan,
                },
                None => CanvasDrag::None,
            };
        }
        if resp.dragged() {
            match self.canvas_drag {
                CanvasDrag::Select => {
                    if let Some(pos) = resp.interact_pointer_pos() {
                        self.selection.drag_to(pos);
                    }
                }
                CanvasDrag::Node(id) => {
                    let delta = resp.drag_delta() / self.zoom;
                    let current = self.layout.get(&id).copied().unwrap_or(available.center());
                    self.layout.insert(id, current + delta);
                }
                CanvasDrag::Pan => {
                    if self.selection.pan_zoom_enabled() {
                        self.pan += resp.drag_delta();
                    }
                }
                CanvasDrag::None => {}
            }
        }
        if resp.drag_stopped() {
            match self.canvas_drag {
                CanvasDrag::Select => {
                    if self.selection.release_into(positions.iter().copied(), &view, &mut self.store) {
                        let n = self.selection.selected().len();
                        info!("selected {} node(s) into session", n);
                    }
                }
                CanvasDrag::Node(id) => {
                    if let Some(p) = self.layout.get(&id).copied() {
                        let res = self.store.set_node_position(id, Some((p.x, p.y)));
                        self.report(res);
                    }
                }
                _ => {}
            }
            self.canvas_drag = CanvasDrag::None;
        }
        if resp.clicked() {
            let cmd_held = ui.input(|i| i.modifiers.command);
            match resp.interact_pointer_pos().and_then(|pos| render::hit_test(&regions, pos)) {
                Some(id) if cmd_held => self.selection.toggle(id),
                Some(id) => self.selection.select_only(id),
                None => self.selection.clear(),
            }
        }
    }
}

fn paint_node(painter: &egui::Painter, np: &render::NodePaint, rect: Rect, zoom: f32) {
    let radius = 6.0 * zoom;
    if np.shadow {
        painter.rect_filled(rect.translate(Vec2::new(2.0, 3.0) * zoom), radius, Color32::from_black_alpha(60));
    }
    painter.rect_filled(rect, radius, render::faded(np.fill, np.opacity));
    painter.rect_stroke(
        rect,
        radius,
        Stroke::new(1.5 * zoom.max(0.5), render::faded(np.border, np.opacity)),
        egui::StrokeKind::Inside,
    );
    painter.text(
        rect.center(),
        egui::Align2::CENTER_CENTER,
        &np.label,
        FontId::proportional(LABEL_FONT_SIZE * zoom * np.scale),
        render::faded(Color32::from_gray(30), np.opacity),
    );
}

impl eframe::App for GraphApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Shortcuts only when no text field has focus
        if ctx.memory(|m| m.focused().is_none()) {
            let cmds = ctx.input(|i| self.commands.collect(i));
            for cmd in cmds {
                self.run_command(cmd);
            }
        }

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("Note-Loom");
                ui.separator();
                ui.small(format!("N:{} L:{}", self.store.node_count(), self.store.link_count()));
                if self.settings.use_backup_tables {
                    ui.separator();
                    ui.colored_label(Color32::YELLOW, "backup tables");
                }
                ui.separator();
                ui.small(if self.show_session { "session view" } else { "full graph" });
                if ui.small_button("Reset view").clicked() {
                    self.pan = Vec2::ZERO;
                    self.zoom = 1.0;
                }
            });
        });

        egui::SidePanel::left("tooling_sidebar")
            .resizable(true)
            .default_width(260.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.sidebar(ui));
            });

        egui::CentralPanel::default().show(ctx, |ui| self.canvas(ui));

        self.selection.retain_existing(&self.store);
        self.sync_persistence();

        // Bottom-right transient toast (visible for 4 seconds)
        let expired = self.notice.as_ref().is_some_and(|(_, _, when)| when.elapsed() > Duration::from_secs(4));
        if expired {
            self.notice = None;
        }
        if let Some((msg, style, _)) = &self.notice {
            let text_col = match style {
                NoticeStyle::Info => Color32::LIGHT_GREEN,
                NoticeStyle::Error => Color32::from_rgb(255, 120, 120),
            };
            egui::Area::new("bottom_right_toast".into())
                .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-12.0, -12.0))
                .interactable(false)
                .show(ctx, |ui| {
                    egui::Frame::popup(ui.style())
                        .corner_radius(egui::CornerRadius::same(8))
                        .fill(Color32::from_rgba_premultiplied(30, 30, 30, 230))
                        .inner_margin(egui::Margin::symmetric(12, 8))
                        .show(ui, |ui| { ui.colored_label(text_col, msg); });
                });
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.settings.show_session_view = self.show_session;
        if let Err(e) = self.settings.save() {
            warn!("could not save settings: {}", e);
        }
        self.sync_persistence();
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
            for f in worker.poll_failures() {
                warn!("unsaved on exit: {} ({})", f.op, f.message);
            }
        }
    }
}

// Golden-angle spiral placement around the provided center.
// k is the 0-based index along the spiral.
fn golden_spiral_position(center: Pos2, k: u32, rect: Rect) -> Pos2 {
    let golden_angle = std::f32::consts::TAU * (1.0 - 1.0 / 1.618_033_9);
    let t = k as f32;
    let base = (rect.size().min_elem() * 0.12).max(20.0);
    let r = base * t.sqrt();
    let theta = t * golden_angle;
    Pos2::new(center.x + r * theta.cos(), center.y + r * theta.sin())
}
