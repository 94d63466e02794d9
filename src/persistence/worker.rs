//! Background thread that mirrors store mutations into a [`NoteBackend`].
//!
//! The UI thread never waits on it: ops go in through a channel and
//! failures come back on another, to be shown as non-fatal notices. The
//! in-memory store stays authoritative either way.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use log::{debug, error};

use super::backend::NoteBackend;
use crate::graph_utils::graph::PersistOp;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistFailure {
    pub op: &'static str,
    pub message: String,
}

fn op_name(op: &PersistOp) -> &'static str {
    match op {
        PersistOp::CreateNode(_) => "createNode",
        PersistOp::UpdateNode(_) => "updateNode",
        PersistOp::UpdateNodes(_) => "updateNodes",
        PersistOp::DeleteNode(_) => "deleteNode",
        PersistOp::CreateLink(_) => "createLink",
        PersistOp::DeleteLink(_) => "deleteLink",
    }
}

/// Run one op against the backend.
pub fn apply(backend: &mut dyn NoteBackend, op: &PersistOp) -> anyhow::Result<()> {
    match op {
        PersistOp::CreateNode(n) => backend.create_node(n).map(|_| ()),
        PersistOp::UpdateNode(n) => backend.update_node(n).map(|_| ()),
        PersistOp::UpdateNodes(ns) => backend.update_nodes(ns).map(|_| ()),
        PersistOp::DeleteNode(id) => backend.delete_node(*id),
        PersistOp::CreateLink(l) => backend.create_link(l).map(|_| ()),
        PersistOp::DeleteLink(id) => backend.delete_link(*id),
    }
}

pub struct PersistWorker {
    tx: Option<Sender<PersistOp>>,
    failures: Receiver<PersistFailure>,
    handle: Option<JoinHandle<()>>,
}

impl PersistWorker {
    pub fn spawn(mut backend: Box<dyn NoteBackend>) -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::channel::<PersistOp>();
        let (fail_tx, failures) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("persist".into())
            .spawn(move || {
                for op in rx {
                    let name = op_name(&op);
                    match apply(backend.as_mut(), &op) {
                        Ok(()) => debug!("persisted {}", name),
                        Err(e) => {
                            error!("{} failed: {:#}", name, e);
                            let _ = fail_tx.send(PersistFailure { op: name, message: format!("{:#}", e) });
                        }
                    }
                }
            })?;
        Ok(Self { tx: Some(tx), failures, handle: Some(handle) })
    }

    pub fn submit(&self, ops: Vec<PersistOp>) {
        let Some(tx) = &self.tx else { return };
        for op in ops {
            if tx.send(op).is_err() {
                error!("persist worker has stopped; dropping remaining ops");
                return;
            }
        }
    }

    /// Failures reported since the last poll.
    pub fn poll_failures(&self) -> Vec<PersistFailure> {
        self.failures.try_iter().collect()
    }

    /// Finish queued ops and stop the thread.
    pub fn shutdown(&mut self) {
        self.tx.take();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for PersistWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
