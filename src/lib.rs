//! Note graph with color-driven auto-linking.
//!
//! `graph_utils` holds the store and its link rules, `gui` the selection
//! overlay, paint attributes and the egui frontend, `persistence` the
//! backend mirror and settings.

pub mod graph_utils;
pub mod gui;
pub mod persistence;
