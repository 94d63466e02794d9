pub mod graph;
pub mod import;
pub mod reconcile;
