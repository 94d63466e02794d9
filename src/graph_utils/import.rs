use log::info;

use super::graph::{GraphStore, Node};

pub const DEFAULT_DELIMITER: &str = "---";

/// Split a pasted blob into node payloads. A line whose trimmed content
/// equals `delimiter` ends a section; sections are trimmed and empty ones
/// dropped.
pub fn split_sections(blob: &str, delimiter: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in blob.lines() {
        if line.trim() == delimiter {
            push_section(&mut sections, &current);
            current.clear();
        } else {
            current.push(line);
        }
    }
    push_section(&mut sections, &current);
    sections
}

fn push_section(out: &mut Vec<String>, lines: &[&str]) {
    let joined = lines.join("\n");
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

impl GraphStore {
    /// Create one node per section of `blob`.
    pub fn import_sections(&mut self, blob: &str, delimiter: &str) -> Vec<Node> {
        let created: Vec<Node> = split_sections(blob, delimiter)
            .iter()
            .filter_map(|s| self.create_node(s).ok())
            .collect();
        info!("imported {} nodes", created.len());
        created
    }
}
