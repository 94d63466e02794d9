use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use ron::ser::PrettyConfig;
use serde::{de::DeserializeOwned, Serialize};

use crate::graph_utils::graph::{Link, LinkId, Node, NodeId};

/// Which table pair a backend reads and writes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TableSet {
    Primary,
    Backup,
}

impl TableSet {
    pub fn from_flag(use_backup: bool) -> Self {
        if use_backup { TableSet::Backup } else { TableSet::Primary }
    }

    fn file_names(self) -> (&'static str, &'static str) {
        match self {
            TableSet::Primary => ("nodes.ron", "links.ron"),
            TableSet::Backup => ("nodes_backup.ron", "links_backup.ron"),
        }
    }
}

/// Durable mirror of the in-memory graph. Each call returns the stored
/// record, or an error the caller reports without rolling back.
pub trait NoteBackend: Send {
    fn create_node(&mut self, node: &Node) -> anyhow::Result<Node>;
    fn update_node(&mut self, node: &Node) -> anyhow::Result<Node>;
    fn update_nodes(&mut self, nodes: &[Node]) -> anyhow::Result<Vec<Node>>;
    fn delete_node(&mut self, id: NodeId) -> anyhow::Result<()>;
    fn create_link(&mut self, link: &Link) -> anyhow::Result<Link>;
    fn delete_link(&mut self, id: LinkId) -> anyhow::Result<()>;
    fn get_all_nodes(&mut self) -> anyhow::Result<Vec<Node>>;
    fn get_all_links(&mut self) -> anyhow::Result<Vec<Link>>;
}

/// In-memory tables; `fail` makes every call error, for exercising the
/// failure path.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    pub fail: bool,
}

impl MemoryBackend {
    fn check(&self) -> anyhow::Result<()> {
        if self.fail { Err(anyhow!("backend unavailable")) } else { Ok(()) }
    }
}

fn upsert(nodes: &mut Vec<Node>, node: &Node) -> bool {
    match nodes.iter_mut().find(|n| n.id == node.id) {
        Some(slot) => { *slot = node.clone(); true }
        None => false,
    }
}

impl NoteBackend for MemoryBackend {
    fn create_node(&mut self, node: &Node) -> anyhow::Result<Node> {
        self.check()?;
        self.nodes.push(node.clone());
        Ok(node.clone())
    }

    fn update_node(&mut self, node: &Node) -> anyhow::Result<Node> {
        self.check()?;
        if !upsert(&mut self.nodes, node) {
            return Err(anyhow!("node {} not found", node.id));
        }
        Ok(node.clone())
    }

    fn update_nodes(&mut self, batch: &[Node]) -> anyhow::Result<Vec<Node>> {
        self.check()?;
        let mut nodes = self.nodes.clone();
        for n in batch {
            if !upsert(&mut nodes, n) {
                return Err(anyhow!("node {} not found", n.id));
            }
        }
        self.nodes = nodes;
        Ok(batch.to_vec())
    }

    fn delete_node(&mut self, id: NodeId) -> anyhow::Result<()> {
        self.check()?;
        self.nodes.retain(|n| n.id != id);
        self.links.retain(|l| !l.touches(id));
        Ok(())
    }

    fn create_link(&mut self, link: &Link) -> anyhow::Result<Link> {
        self.check()?;
        self.links.push(link.clone());
        Ok(link.clone())
    }

    fn delete_link(&mut self, id: LinkId) -> anyhow::Result<()> {
        self.check()?;
        self.links.retain(|l| l.id != id);
        Ok(())
    }

    fn get_all_nodes(&mut self) -> anyhow::Result<Vec<Node>> {
        self.check()?;
        Ok(self.nodes.clone())
    }

    fn get_all_links(&mut self) -> anyhow::Result<Vec<Link>> {
        self.check()?;
        Ok(self.links.clone())
    }
}

/// One RON file per table in a directory. Every write rewrites the table
/// through a temp file and rename.
#[derive(Debug)]
pub struct RonBackend {
    nodes_path: PathBuf,
    links_path: PathBuf,
}

impl RonBackend {
    pub fn open(dir: &Path, tables: TableSet) -> anyhow::Result<Self> {
        fs::create_dir_all(dir)?;
        let (nodes, links) = tables.file_names();
        Ok(Self { nodes_path: dir.join(nodes), links_path: dir.join(links) })
    }

    fn read_nodes(&self) -> anyhow::Result<Vec<Node>> {
        read_table(&self.nodes_path)
    }

    fn read_links(&self) -> anyhow::Result<Vec<Link>> {
        read_table(&self.links_path)
    }
}

fn read_table<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut f = File::open(path)?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let rows: Vec<T> = ron::from_str(&buf)?;
    Ok(rows)
}

fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> anyhow::Result<()> {
    let pretty = PrettyConfig::new().separate_tuple_members(true);
    let s = ron::ser::to_string_pretty(rows, pretty)?;
    atomic_write(path, s.as_bytes())?;
    Ok(())
}

fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("ron.tmp");
    {
        let mut f = File::create(&tmp_path)?;
        f.write_all(data)?;
        f.flush()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

impl NoteBackend for RonBackend {
    fn create_node(&mut self, node: &Node) -> anyhow::Result<Node> {
        let mut nodes = self.read_nodes()?;
        if nodes.iter().any(|n| n.id == node.id) {
            return Err(anyhow!("node {} already stored", node.id));
        }
        nodes.push(node.clone());
        write_table(&self.nodes_path, &nodes)?;
        Ok(node.clone())
    }

    fn update_node(&mut self, node: &Node) -> anyhow::Result<Node> {
        let mut nodes = self.read_nodes()?;
        if !upsert(&mut nodes, node) {
            return Err(anyhow!("node {} not found", node.id));
        }
        write_table(&self.nodes_path, &nodes)?;
        Ok(node.clone())
    }

    fn update_nodes(&mut self, batch: &[Node]) -> anyhow::Result<Vec<Node>> {
        let mut nodes = self.read_nodes()?;
        // Nothing is written unless every id in the batch is stored
        for n in batch {
            if !upsert(&mut nodes, n) {
                return Err(anyhow!("node {} not found", n.id));
            }
        }
        write_table(&self.nodes_path, &nodes)?;
        Ok(batch.to_vec())
    }

    fn delete_node(&mut self, id: NodeId) -> anyhow::Result<()> {
        let mut nodes = self.read_nodes()?;
        nodes.retain(|n| n.id != id);
        write_table(&self.nodes_path, &nodes)?;
        let mut links = self.read_links()?;
        let before = links.len();
        links.retain(|l| !l.touches(id));
        if links.len() != before {
            write_table(&self.links_path, &links)?;
        }
        Ok(())
    }

    fn create_link(&mut self, link: &Link) -> anyhow::Result<Link> {
        let mut links = self.read_links()?;
        links.push(link.clone());
        write_table(&self.links_path, &links)?;
        Ok(link.clone())
    }

    fn delete_link(&mut self, id: LinkId) -> anyhow::Result<()> {
        let mut links = self.read_links()?;
        links.retain(|l| l.id != id);
        write_table(&self.links_path, &links)?;
        Ok(())
    }

    fn get_all_nodes(&mut self) -> anyhow::Result<Vec<Node>> {
        self.read_nodes()
    }

    fn get_all_links(&mut self) -> anyhow::Result<Vec<Link>> {
        self.read_links()
    }
}
