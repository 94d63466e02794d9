use std::collections::{HashMap, HashSet};

use egui::{Key, Pos2, Vec2};
use tempfile::TempDir;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use note_loom::graph_utils::graph::{ColorTag, GraphStore, LinkKey, Node, NodeId, PersistOp, StoreError};
use note_loom::graph_utils::import::split_sections;
use note_loom::graph_utils::reconcile;
use note_loom::gui::commands::{Command, CommandTable, KeyChord};
use note_loom::gui::render::{self, PaintContext};
use note_loom::gui::selection::{DragState, PanZoom, ScreenTransform, SelectionOverlay};
use note_loom::persistence::backend::{MemoryBackend, NoteBackend, RonBackend, TableSet};
use note_loom::persistence::settings::AppSettings;
use note_loom::persistence::worker::PersistWorker;

fn new_store() -> GraphStore {
    GraphStore::new()
}

fn add(store: &mut GraphStore, text: &str) -> NodeId {
    store.create_node(text).expect("node should be created").id
}

fn color(store: &mut GraphStore, id: NodeId, n: u8) {
    store
        .update_node_color(id, ColorTag::from_number(n))
        .expect("color update ok");
}

fn linked(store: &GraphStore, a: NodeId, b: NodeId) -> bool {
    store.snapshot().find_link(a, b).is_some()
}

fn link_count_between(store: &GraphStore, a: NodeId, b: NodeId) -> usize {
    let key = LinkKey::new(a, b);
    store.snapshot().links.iter().filter(|l| l.key() == key).count()
}

fn node_at(days_old: i64) -> Node {
    Node {
        id: Uuid::now_v7(),
        text: "note".into(),
        color: None,
        position: None,
        updated_at: OffsetDateTime::now_utc() - Duration::days(days_old),
    }
}

fn temp_dir() -> TempDir {
    TempDir::new().expect("temp dir")
}

// Graph store

#[test]
fn store_create_node_rejects_blank_text() {
    let mut store = new_store();
    assert_eq!(store.create_node("   \n\t"), Err(StoreError::EmptyText));
    assert_eq!(store.node_count(), 0);
    assert!(store.drain_outbox().is_empty());
}

#[test]
fn store_create_node_lands_in_canonical_and_session() {
    let mut store = new_store();
    let node = store.create_node("first thought").unwrap();
    assert_eq!(node.color, None);
    assert_eq!(node.position, None);
    assert!(store.snapshot().contains_node(node.id));
    assert!(store.in_session(node.id));
}

#[test]
fn store_update_text_unknown_node_changes_nothing() {
    let mut store = new_store();
    let a = add(&mut store, "a");
    store.drain_outbox();
    let before = store.snapshot();
    let missing = Uuid::now_v7();
    assert_eq!(store.update_node_text(missing, "x"), Err(StoreError::UnknownNode(missing)));
    assert_eq!(*store.snapshot(), *before);
    assert!(store.drain_outbox().is_empty());

    let updated = store.update_node_text(a, "a, revised").unwrap();
    assert_eq!(updated.text, "a, revised");
    assert!(updated.updated_at >= before.node(a).unwrap().updated_at);
    assert_eq!(store.link_count(), 0);
}

#[test]
fn store_link_dedups_unordered_pairs() {
    let mut store = new_store();
    let a = add(&mut store, "a");
    let b = add(&mut store, "b");
    store.create_link(a, b).expect("first link ok");
    assert_eq!(store.create_link(a, b), Err(StoreError::DuplicateLink(a, b)));
    assert_eq!(store.create_link(b, a), Err(StoreError::DuplicateLink(b, a)));
    assert_eq!(link_count_between(&store, a, b), 1);
    assert_eq!(store.link_count(), 1);
}

#[test]
fn store_link_rejects_self_and_unknown() {
    let mut store = new_store();
    let a = add(&mut store, "a");
    let ghost = Uuid::now_v7();
    assert_eq!(store.create_link(a, a), Err(StoreError::SelfLink(a)));
    assert_eq!(store.create_link(a, ghost), Err(StoreError::UnknownNode(ghost)));
    assert_eq!(store.link_count(), 0);
}

#[test]
fn store_delete_node_cascades_and_is_idempotent() {
    let mut store = new_store();
    let a = add(&mut store, "a");
    let b = add(&mut store, "b");
    let c = add(&mut store, "c");
    store.create_link(a, b).unwrap();
    store.create_link(b, c).unwrap();
    let keep = store.create_link(a, c).unwrap();

    store.delete_node(b);
    let once = store.snapshot();
    store.delete_node(b);
    assert_eq!(*store.snapshot(), *once);
    assert!(!once.contains_node(b));
    assert_eq!(once.links, vec![keep]);
    assert!(!store.in_session(b));
    assert!(store.session_snapshot().links.iter().all(|l| !l.touches(b)));
}

#[test]
fn store_delete_link_is_idempotent() {
    let mut store = new_store();
    let a = add(&mut store, "a");
    let b = add(&mut store, "b");
    let link = store.create_link(a, b).unwrap();
    store.delete_link(link.id);
    store.drain_outbox();
    store.delete_link(link.id);
    assert_eq!(store.link_count(), 0);
    assert!(store.drain_outbox().is_empty(), "second delete records nothing");
}

#[test]
fn store_snapshots_are_not_affected_by_later_mutations() {
    let mut store = new_store();
    let a = add(&mut store, "a");
    let b = add(&mut store, "b");
    let before = store.snapshot();
    let session_before = store.session_snapshot();

    store.update_node_text(a, "changed").unwrap();
    store.create_link(a, b).unwrap();
    store.set_node_position(b, Some((3.0, 4.0))).unwrap();

    assert_eq!(before.node(a).unwrap().text, "a");
    assert!(before.links.is_empty());
    assert_eq!(before.node(b).unwrap().position, None);
    assert!(session_before.links.is_empty());
    assert_eq!(store.snapshot().node(b).unwrap().position, Some((3.0, 4.0)));
}

#[test]
fn store_clear_positions_batches_one_update() {
    let mut store = new_store();
    let a = add(&mut store, "a");
    let b = add(&mut store, "b");
    add(&mut store, "c");
    store.set_node_position(a, Some((1.0, 1.0))).unwrap();
    store.set_node_position(b, Some((2.0, 2.0))).unwrap();
    store.drain_outbox();

    assert_eq!(store.clear_positions(), 2);
    let ops = store.drain_outbox();
    assert_eq!(ops.len(), 1);
    match &ops[0] {
        PersistOp::UpdateNodes(batch) => {
            assert_eq!(batch.len(), 2);
            assert!(batch.iter().all(|n| n.position.is_none()));
        }
        other => panic!("unexpected op {:?}", other),
    }
    assert!(store.snapshot().nodes.iter().all(|n| n.position.is_none()));
}

#[test]
fn store_outbox_mirrors_mutations_in_order() {
    let mut store = new_store();
    let a = add(&mut store, "a");
    let b = add(&mut store, "b");
    let link = store.create_link(a, b).unwrap();
    store.delete_node(a);
    let ops = store.drain_outbox();
    assert!(matches!(ops[0], PersistOp::CreateNode(ref n) if n.id == a));
    assert!(matches!(ops[1], PersistOp::CreateNode(ref n) if n.id == b));
    assert!(matches!(ops[2], PersistOp::CreateLink(ref l) if l.id == link.id));
    assert_eq!(ops[3], PersistOp::DeleteLink(link.id));
    assert_eq!(ops[4], PersistOp::DeleteNode(a));
    assert_eq!(ops.len(), 5);
}

#[test]
fn store_session_tracks_canonical_links_between_members() {
    let mut store = new_store();
    let a = add(&mut store, "a");
    let b = add(&mut store, "b");
    let c = add(&mut store, "c");
    store.create_link(a, b).unwrap();
    store.create_link(b, c).unwrap();

    store.set_session(&HashSet::from([a, b]));
    let session = store.session_snapshot();
    assert_eq!(session.nodes.len(), 2);
    assert_eq!(session.links.len(), 1);
    assert!(session.find_link(a, b).is_some());

    // Link with an endpoint outside the session stays canonical only
    store.create_link(a, c).unwrap();
    assert!(store.session_snapshot().find_link(a, c).is_none());
    assert!(linked(&store, a, c));

    store.add_to_session(&HashSet::from([c]));
    assert_eq!(store.session_snapshot().links.len(), 3);

    store.clear_session();
    assert!(store.session_snapshot().nodes.is_empty());
    assert_eq!(store.node_count(), 3);
}

#[test]
fn store_from_records_drops_duplicate_and_dangling_links() {
    let mut seed = new_store();
    let a = add(&mut seed, "a");
    let b = add(&mut seed, "b");
    let link = seed.create_link(a, b).unwrap();
    let snap = seed.snapshot();

    let mut reversed = link.clone();
    reversed.id = Uuid::now_v7();
    std::mem::swap(&mut reversed.source, &mut reversed.target);
    let mut dangling = link.clone();
    dangling.id = Uuid::now_v7();
    dangling.target = Uuid::now_v7();

    let store = GraphStore::from_records(snap.nodes.clone(), vec![link.clone(), reversed, dangling]);
    assert_eq!(store.snapshot().links, vec![link]);
    assert!(store.session_snapshot().nodes.is_empty());
}

// Color reconciliation

#[test]
fn color_same_tag_forms_clique() {
    let mut store = new_store();
    let ids: Vec<NodeId> = (0..4).map(|i| add(&mut store, &format!("n{}", i))).collect();
    for id in &ids {
        color(&mut store, *id, 4);
    }
    for (i, a) in ids.iter().enumerate() {
        for b in &ids[i + 1..] {
            assert_eq!(link_count_between(&store, *a, *b), 1);
        }
    }
    assert_eq!(store.link_count(), 6);
}

#[test]
fn color_recolor_moves_links_to_new_peers() {
    let mut store = new_store();
    let a = add(&mut store, "a");
    let b = add(&mut store, "b");
    let c = add(&mut store, "c");
    let d = add(&mut store, "d");
    let e = add(&mut store, "e");
    color(&mut store, b, 2);
    color(&mut store, c, 2);
    color(&mut store, a, 2);
    color(&mut store, d, 3);
    let unrelated = store.create_link(b, e).unwrap();
    assert_eq!(store.links_of(a).len(), 2);

    color(&mut store, a, 3);

    let links = store.links_of(a);
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].other_end(a), Some(d));
    assert!(!linked(&store, a, b));
    assert!(!linked(&store, a, c));
    assert!(linked(&store, b, c), "former peers stay linked to each other");
    assert!(store.snapshot().links.contains(&unrelated));
}

#[test]
fn color_change_leaves_links_between_other_colors_alone() {
    let mut store = new_store();
    let x = add(&mut store, "x");
    let y = add(&mut store, "y");
    let z = add(&mut store, "z");
    color(&mut store, x, 1);
    color(&mut store, y, 6);
    let xy = store.create_link(x, y).unwrap();
    color(&mut store, z, 1);
    assert!(linked(&store, x, z));

    color(&mut store, z, 6);
    assert!(store.snapshot().links.contains(&xy));
    assert!(!linked(&store, x, z));
    assert!(linked(&store, y, z));
}

#[test]
fn color_existing_user_link_is_not_duplicated() {
    let mut store = new_store();
    let a = add(&mut store, "a");
    let b = add(&mut store, "b");
    store.create_link(b, a).unwrap();
    color(&mut store, a, 5);
    color(&mut store, b, 5);
    assert_eq!(link_count_between(&store, a, b), 1);
    assert_eq!(store.link_count(), 1);
}

#[test]
fn color_neutral_and_cleared_tags_do_not_link() {
    let mut store = new_store();
    let a = add(&mut store, "a");
    let b = add(&mut store, "b");
    color(&mut store, a, 9);
    color(&mut store, b, 9);
    assert_eq!(store.link_count(), 0);

    color(&mut store, a, 7);
    color(&mut store, b, 7);
    assert!(linked(&store, a, b));
    store.update_node_color(a, None).unwrap();
    assert!(!linked(&store, a, b));
}

#[test]
fn color_reconciliation_is_scoped_to_session() {
    let mut store = new_store();
    let inside = add(&mut store, "inside");
    let outside = add(&mut store, "outside");
    let mover = add(&mut store, "mover");
    color(&mut store, outside, 2);
    store.set_session(&HashSet::from([inside, mover]));
    color(&mut store, inside, 2);
    color(&mut store, mover, 2);

    assert!(linked(&store, inside, mover));
    assert!(!linked(&store, outside, mover), "nodes outside the session are not auto-linked");
    assert!(!linked(&store, outside, inside));
}

#[test]
fn color_removal_is_scoped_to_session() {
    let mut store = new_store();
    let a = add(&mut store, "a");
    let b = add(&mut store, "b");
    color(&mut store, a, 1);
    color(&mut store, b, 1);
    assert!(linked(&store, a, b));

    store.set_session(&HashSet::from([a]));
    color(&mut store, a, 5);
    assert!(linked(&store, a, b), "peer outside the session keeps its link");
}

#[test]
fn color_leaving_neutral_drops_links_to_neutral_peers() {
    let mut store = new_store();
    let a = add(&mut store, "a");
    let b = add(&mut store, "b");
    let c = add(&mut store, "c");
    color(&mut store, a, 9);
    color(&mut store, b, 9);
    store.create_link(a, b).unwrap();
    store.create_link(a, c).unwrap();

    color(&mut store, a, 1);
    assert!(!linked(&store, a, b));
    assert!(linked(&store, a, c), "uncolored peer is not touched");
}

#[test]
fn color_unknown_node_is_rejected() {
    let mut store = new_store();
    let ghost = Uuid::now_v7();
    assert_eq!(store.update_node_color(ghost, ColorTag::from_number(1)), Err(StoreError::UnknownNode(ghost)));
}

#[test]
fn reconcile_plan_removes_before_adding() {
    let mut store = new_store();
    let a = add(&mut store, "a");
    let b = add(&mut store, "b");
    let c = add(&mut store, "c");
    color(&mut store, a, 1);
    color(&mut store, b, 1);
    color(&mut store, c, 2);

    let session = store.session_snapshot();
    let canonical = store.snapshot();
    let plan = reconcile::plan(&session.nodes, &canonical.links, a, Some(ColorTag::Red), Some(ColorTag::Orange));
    assert_eq!(plan.remove.len(), 1);
    assert_eq!(plan.add, vec![LinkKey::new(a, c)]);
}

#[test]
fn color_tag_numbers_round_trip_and_bounds() {
    assert_eq!(ColorTag::from_number(0), None);
    assert_eq!(ColorTag::from_number(10), None);
    for tag in ColorTag::ALL {
        assert_eq!(ColorTag::from_number(tag.number()), Some(tag));
    }
    assert!(ColorTag::Gray.is_neutral());
}

// Selection overlay

fn three_nodes() -> Vec<(NodeId, Pos2)> {
    vec![
        (Uuid::now_v7(), Pos2::new(10.0, 10.0)),
        (Uuid::now_v7(), Pos2::new(50.0, 50.0)),
        (Uuid::now_v7(), Pos2::new(200.0, 200.0)),
    ]
}

#[test]
fn selection_rectangle_picks_nodes_inside() {
    let nodes = three_nodes();
    let mut overlay = SelectionOverlay::new();
    overlay.set_select_mode(true);
    assert!(overlay.press(Pos2::new(0.0, 0.0)));
    overlay.drag_to(Pos2::new(60.0, 60.0));
    let selected = overlay.release(nodes.iter().copied(), &PanZoom::identity()).cloned().unwrap();
    assert_eq!(selected, HashSet::from([nodes[0].0, nodes[1].0]));
    assert_eq!(overlay.state(), DragState::Idle);
}

#[test]
fn selection_drag_in_any_direction_and_replaces_previous() {
    let nodes = three_nodes();
    let mut overlay = SelectionOverlay::new();
    overlay.set_select_mode(true);
    overlay.press(Pos2::new(60.0, 60.0));
    overlay.drag_to(Pos2::new(0.0, 0.0));
    overlay.release(nodes.iter().copied(), &PanZoom::identity());
    assert_eq!(overlay.selected().len(), 2);

    overlay.press(Pos2::new(250.0, 150.0));
    overlay.drag_to(Pos2::new(150.0, 250.0));
    overlay.release(nodes.iter().copied(), &PanZoom::identity());
    assert_eq!(overlay.selected(), &HashSet::from([nodes[2].0]));
}

#[test]
fn selection_requires_select_mode() {
    let mut overlay = SelectionOverlay::new();
    assert!(overlay.pan_zoom_enabled());
    assert!(!overlay.press(Pos2::new(1.0, 1.0)));
    assert_eq!(overlay.state(), DragState::Idle);

    overlay.set_select_mode(true);
    assert!(!overlay.pan_zoom_enabled());
    overlay.press(Pos2::new(1.0, 1.0));
    overlay.set_select_mode(false);
    assert_eq!(overlay.state(), DragState::Idle, "leaving select mode cancels the drag");
    assert!(overlay.release(three_nodes(), &PanZoom::identity()).is_none());
}

#[test]
fn selection_projects_through_pan_and_zoom() {
    let view = PanZoom { center: Pos2::ZERO, pan: Vec2::new(100.0, 0.0), zoom: 2.0 };
    let p = Pos2::new(10.0, 10.0);
    let s = view.graph_to_screen(p);
    assert_eq!(s, Pos2::new(120.0, 20.0));
    assert_eq!(view.screen_to_graph(s), p);

    let nodes = three_nodes();
    let mut overlay = SelectionOverlay::new();
    overlay.set_select_mode(true);
    overlay.press(Pos2::new(0.0, 0.0));
    overlay.drag_to(Pos2::new(130.0, 30.0));
    overlay.release(nodes.iter().copied(), &view);
    assert_eq!(overlay.selected(), &HashSet::from([nodes[0].0]));
}

#[test]
fn selection_release_updates_session() {
    let mut store = new_store();
    let a = add(&mut store, "a");
    let b = add(&mut store, "b");
    let c = add(&mut store, "c");
    store.create_link(a, b).unwrap();
    store.create_link(b, c).unwrap();
    let positions = vec![(a, Pos2::new(5.0, 5.0)), (b, Pos2::new(15.0, 5.0)), (c, Pos2::new(500.0, 5.0))];

    let mut overlay = SelectionOverlay::new();
    overlay.set_select_mode(true);
    overlay.press(Pos2::new(0.0, 0.0));
    overlay.drag_to(Pos2::new(20.0, 20.0));
    assert!(overlay.release_into(positions, &PanZoom::identity(), &mut store));

    let session = store.session_snapshot();
    let ids: HashSet<NodeId> = session.nodes.iter().map(|n| n.id).collect();
    assert_eq!(ids, HashSet::from([a, b]));
    assert_eq!(session.links.len(), 1);
}

// Render adapter

#[test]
fn render_truncates_long_first_line() {
    let text = format!("{}\nsecond line", "x".repeat(200));
    let label = render::label_for(&text, 24);
    assert_eq!(label.chars().count(), 25);
    assert!(label.ends_with(render::ELLIPSIS));
    assert_eq!(label, format!("{}{}", "x".repeat(24), render::ELLIPSIS));

    assert_eq!(render::label_for("short\nmore", 24), "short");
    assert_eq!(render::label_for(&"y".repeat(24), 24), "y".repeat(24));
}

#[test]
fn render_opacity_steps_down_with_age() {
    let now = OffsetDateTime::now_utc();
    let ages = [0, 1, 2, 5, 20, 90, 400];
    let values: Vec<f32> = ages
        .iter()
        .map(|d| render::recency_opacity(now - Duration::days(*d), now))
        .collect();
    assert_eq!(values[0], 1.0);
    for pair in [(0, 1), (1, 2), (2, 3), (3, 4), (4, 5)] {
        assert!(values[pair.0] > values[pair.1], "{:?}", values);
    }
    assert_eq!(values[5], render::RECENCY_FLOOR);
    assert_eq!(values[6], render::RECENCY_FLOOR);
    // Clock skew counts as fresh
    assert_eq!(render::recency_opacity(now + Duration::days(2), now), 1.0);
}

#[test]
fn render_opacity_counts_calendar_days() {
    let now = datetime!(2026-03-10 00:30 UTC);
    assert_eq!(render::recency_opacity(datetime!(2026-03-10 00:05 UTC), now), 1.0);
    assert_eq!(render::recency_opacity(datetime!(2026-03-09 23:50 UTC), now), 0.85, "yesterday, minutes ago");
    // Same instant read in another offset is still yesterday in now's offset
    assert_eq!(render::recency_opacity(datetime!(2026-03-10 01:50 +02:00), now), 0.85);
}

#[test]
fn render_hover_and_selection_highlight() {
    let mut node = node_at(0);
    node.color = Some(ColorTag::Blue);
    let selected = HashSet::from([node.id]);
    let mut ctx = PaintContext {
        hover: None,
        selected: &selected,
        now: OffsetDateTime::now_utc(),
        label_budget: 24,
    };
    let plain = render::node_paint(&node, &ctx);
    assert_eq!(plain.border, render::SELECTED_BORDER);
    assert_eq!(plain.fill, ColorTag::Blue.style().fill);
    assert_eq!(plain.scale, 1.0);
    assert!(!plain.shadow);

    ctx.hover = Some(node.id);
    let hovered = render::node_paint(&node, &ctx);
    assert!(hovered.scale > 1.0);
    assert!(hovered.shadow);
    assert_eq!(hovered.border, ColorTag::Blue.style().border, "hover wins over selection border");
    assert_eq!(node.color, Some(ColorTag::Blue));

    let uncolored = render::node_paint(&node_at(100), &ctx);
    assert_eq!(uncolored.fill, render::NEUTRAL_STYLE.fill);
    assert_eq!(uncolored.opacity, render::RECENCY_FLOOR);
}

#[test]
fn render_hit_region_scales_with_zoom() {
    let center = Pos2::new(100.0, 100.0);
    let r1 = render::hit_region(center, 60.0, 1.0, 1.0);
    let r2 = render::hit_region(center, 60.0, 2.0, 1.0);
    assert_eq!(r1.center(), center);
    assert!((r2.width() - r1.width() * 2.0).abs() < 1e-3);
    assert!((r1.width() - (60.0 + render::LABEL_PADDING.x * 2.0)).abs() < 1e-3);

    let a = Uuid::now_v7();
    let b = Uuid::now_v7();
    let regions = vec![(a, r1), (b, render::hit_region(Pos2::new(120.0, 100.0), 60.0, 1.0, 1.0))];
    assert_eq!(render::hit_test(&regions, Pos2::new(115.0, 100.0)), Some(b), "topmost wins");
    assert_eq!(render::hit_test(&regions, Pos2::new(75.0, 100.0)), Some(a));
    assert_eq!(render::hit_test(&regions, Pos2::new(0.0, 0.0)), None);
}

// Commands

#[test]
fn commands_default_bindings() {
    let table = CommandTable::default();
    assert_eq!(table.lookup(KeyChord::plain(Key::Delete)), Some(Command::DeleteSelected));
    assert_eq!(table.lookup(KeyChord::plain(Key::Num3)), Some(Command::ColorSelected(Some(ColorTag::Yellow))));
    assert_eq!(table.lookup(KeyChord::plain(Key::Num0)), Some(Command::ColorSelected(None)));
    assert_eq!(table.lookup(KeyChord::with_command(Key::N)), Some(Command::FocusNewNode));
    assert_eq!(table.lookup(KeyChord::plain(Key::N)), None);
}

// Import

#[test]
fn import_splits_on_delimiter_lines() {
    let blob = "first idea\nmore detail\n---\n\n---\n  second  \n---";
    assert_eq!(split_sections(blob, "---"), vec!["first idea\nmore detail".to_string(), "second".to_string()]);

    let mut store = new_store();
    let created = store.import_sections(blob, "---");
    assert_eq!(created.len(), 2);
    assert_eq!(store.session_snapshot().nodes.len(), 2);
}

// Persistence

#[test]
fn ron_backend_round_trip_and_table_sets() {
    let dir = temp_dir();
    let mut store = new_store();
    let a = add(&mut store, "a");
    let b = add(&mut store, "b");
    color(&mut store, a, 1);
    color(&mut store, b, 1);
    store.set_node_position(a, Some((1.5, -2.0))).unwrap();

    let mut primary = RonBackend::open(dir.path(), TableSet::Primary).unwrap();
    for op in store.drain_outbox() {
        note_loom::persistence::worker::apply(&mut primary, &op).expect("op applies");
    }
    let nodes = primary.get_all_nodes().unwrap();
    let links = primary.get_all_links().unwrap();
    assert_eq!(nodes, store.snapshot().nodes);
    assert_eq!(links.len(), 1);

    let mut backup = RonBackend::open(dir.path(), TableSet::from_flag(true)).unwrap();
    assert!(backup.get_all_nodes().unwrap().is_empty());

    primary.delete_node(a).unwrap();
    assert_eq!(primary.get_all_nodes().unwrap().len(), 1);
    assert!(primary.get_all_links().unwrap().is_empty());
}

#[test]
fn ron_backend_update_unknown_node_fails() {
    let dir = temp_dir();
    let mut backend = RonBackend::open(dir.path(), TableSet::Primary).unwrap();
    assert!(backend.update_node(&node_at(0)).is_err());
}

#[test]
fn backends_reject_batch_update_with_unknown_node() {
    let dir = temp_dir();
    let stored = node_at(3);
    let mut moved = stored.clone();
    moved.position = Some((4.0, 4.0));
    let batch = vec![moved, node_at(0)];

    let mut ron = RonBackend::open(dir.path(), TableSet::Primary).unwrap();
    ron.create_node(&stored).unwrap();
    assert!(ron.update_nodes(&batch).is_err());
    assert_eq!(ron.get_all_nodes().unwrap(), vec![stored.clone()], "nothing written on failure");

    let mut memory = MemoryBackend::default();
    memory.create_node(&stored).unwrap();
    assert!(memory.update_nodes(&batch).is_err());
    assert_eq!(memory.get_all_nodes().unwrap(), vec![stored.clone()]);

    assert_eq!(ron.update_nodes(&batch[..1]).unwrap(), batch[..1].to_vec());
    assert_eq!(ron.get_all_nodes().unwrap()[0].position, Some((4.0, 4.0)));
}

#[test]
fn settings_save_and_load_through_file() {
    let dir = temp_dir();
    let path = dir.path().join("nested").join("settings.json");
    assert_eq!(AppSettings::load_from(&path).unwrap(), AppSettings::default());

    let settings = AppSettings {
        use_backup_tables: true,
        label_char_budget: 40,
        show_session_view: true,
        ..Default::default()
    };
    settings.save_to(&path).unwrap();
    assert_eq!(AppSettings::load_from(&path).unwrap(), settings);
}

#[test]
fn worker_reports_failures_without_touching_store() {
    let backend = MemoryBackend { fail: true, ..Default::default() };
    let mut worker = PersistWorker::spawn(Box::new(backend)).unwrap();
    let mut store = new_store();
    let a = add(&mut store, "kept locally");
    worker.submit(store.drain_outbox());
    worker.shutdown();

    let failures = worker.poll_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].op, "createNode");
    assert!(store.node(a).is_some());
}

#[test]
fn worker_mirrors_ops_into_backend() {
    let mut store = new_store();
    let a = add(&mut store, "a");
    let b = add(&mut store, "b");
    store.create_link(a, b).unwrap();
    let mut memory = MemoryBackend::default();
    let by_op: HashMap<&str, usize> = store
        .drain_outbox()
        .iter()
        .map(|op| {
            note_loom::persistence::worker::apply(&mut memory, op).unwrap();
            match op {
                PersistOp::CreateNode(_) => "node",
                _ => "other",
            }
        })
        .fold(HashMap::new(), |mut m, k| {
            *m.entry(k).or_insert(0) += 1;
            m
        });
    assert_eq!(by_op["node"], 2);
    assert_eq!(memory.get_all_nodes().unwrap().len(), 2);
    assert_eq!(memory.get_all_links().unwrap().len(), 1);
}
