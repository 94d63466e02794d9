use anyhow::Context;
use eframe::egui;
use log::{error, info};

use note_loom::graph_utils::graph::GraphStore;
use note_loom::gui::frontend::GraphApp;
use note_loom::persistence::backend::{NoteBackend, RonBackend, TableSet};
use note_loom::persistence::settings::AppSettings;
use note_loom::persistence::worker::PersistWorker;

// Load the stored graph and start the mirror worker on the same tables
fn open_store(settings: &AppSettings) -> anyhow::Result<(GraphStore, PersistWorker)> {
    let tables = TableSet::from_flag(settings.use_backup_tables);
    let dir = settings.data_dir();
    let mut backend = RonBackend::open(&dir, tables)
        .with_context(|| format!("opening tables in {}", dir.display()))?;
    let nodes = backend.get_all_nodes()?;
    let links = backend.get_all_links()?;
    info!("loaded {} nodes, {} links from {} ({:?})", nodes.len(), links.len(), dir.display(), tables);
    let store = GraphStore::from_records(nodes, links);
    let worker = PersistWorker::spawn(Box::new(backend))?;
    Ok((store, worker))
}

fn main() -> eframe::Result {
    env_logger::init();

    let settings = AppSettings::load().unwrap_or_else(|e| {
        error!("settings unreadable, using defaults: {:#}", e);
        AppSettings::default()
    });
    // The app stays usable without a backend; edits just are not mirrored
    let (store, worker) = match open_store(&settings) {
        Ok((store, worker)) => (store, Some(worker)),
        Err(e) => {
            error!("persistence unavailable: {:#}", e);
            (GraphStore::new(), None)
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 720.0])
            .with_min_inner_size([700.0, 420.0])
            .with_resizable(true),
        ..Default::default()
    };
    eframe::run_native(
        "Note-Loom",
        options,
        Box::new(move |_cc| Ok(Box::new(GraphApp::new(store, worker, settings)) as Box<dyn eframe::App>)),
    )
}
