//! In-memory knowledge map: concept nodes and relation edges.
//!
//! The model is owned by the session controller. Every mutation that changes
//! it bumps `revision` exactly once, which is what the autosave path observes.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A concept node as rendered and edited on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub position: Position,
    /// Rendering variant.
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    /// Excerpt of the memo this concept was derived from.
    pub sentence: String,
    /// Backend-assigned node id, used to correlate suggestion queries.
    pub source_id: String,
    // Client-only state, never persisted.
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub dragging: bool,
}

/// A directed relation between two nodes.
///
/// Endpoints are expected to reference node ids of the same map, but dangling
/// edges are tolerated: they simply do not render a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub animated: bool,
    #[serde(default)]
    pub selected: bool,
}

impl GraphEdge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            animated: false,
            selected: false,
        }
    }
}

/// Raw node mutation emitted by the rendering surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeChange {
    Position {
        id: String,
        position: Position,
        #[serde(default)]
        dragging: bool,
    },
    Select {
        id: String,
        selected: bool,
    },
    Remove {
        id: String,
    },
    Add {
        node: GraphNode,
    },
}

/// Raw edge mutation emitted by the rendering surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EdgeChange {
    Select { id: String, selected: bool },
    Remove { id: String },
    Add { edge: GraphEdge },
}

/// Counts from an additive merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub nodes_added: usize,
    pub edges_added: usize,
    pub skipped: usize,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        self.nodes_added + self.edges_added > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphModel {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    revision: u64,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Number of transitions applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Replace the whole map. Duplicate node and edge ids keep their first occurrence.
    pub fn replace(&mut self, nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) {
        let mut seen = HashSet::new();
        self.nodes = nodes
            .into_iter()
            .filter(|n| seen.insert(n.id.clone()))
            .collect();
        let mut seen = HashSet::new();
        self.edges = edges
            .into_iter()
            .filter(|e| {
                let fresh = seen.insert(e.id.clone());
                if !fresh {
                    tracing::warn!(edge_id = %e.id, "Dropping edge with duplicate id");
                }
                fresh
            })
            .collect();
        self.revision += 1;
    }

    /// Append nodes and edges in a single transition.
    ///
    /// Items whose id already exists are skipped. When nothing is added the
    /// revision is left untouched.
    pub fn extend(&mut self, nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        let mut node_ids: HashSet<String> = self.nodes.iter().map(|n| n.id.clone()).collect();
        let mut edge_ids: HashSet<String> = self.edges.iter().map(|e| e.id.clone()).collect();

        for node in nodes {
            if node_ids.insert(node.id.clone()) {
                self.nodes.push(node);
                outcome.nodes_added += 1;
            } else {
                tracing::warn!(node_id = %node.id, "Skipping node with duplicate id");
                outcome.skipped += 1;
            }
        }
        for edge in edges {
            if edge_ids.insert(edge.id.clone()) {
                self.edges.push(edge);
                outcome.edges_added += 1;
            } else {
                tracing::warn!(edge_id = %edge.id, "Skipping edge with duplicate id");
                outcome.skipped += 1;
            }
        }

        if outcome.changed() {
            self.revision += 1;
        }
        outcome
    }

    /// Apply a batch of node changes as one transition. Returns whether anything changed.
    pub fn apply_node_changes(&mut self, changes: Vec<NodeChange>) -> bool {
        let mut changed = false;
        for change in changes {
            changed |= match change {
                NodeChange::Position {
                    id,
                    position,
                    dragging,
                } => match self.nodes.iter_mut().find(|n| n.id == id) {
                    Some(node) => {
                        node.position = position;
                        node.dragging = dragging;
                        true
                    }
                    None => false,
                },
                NodeChange::Select { id, selected } => {
                    match self.nodes.iter_mut().find(|n| n.id == id) {
                        Some(node) if node.selected != selected => {
                            node.selected = selected;
                            true
                        }
                        _ => false,
                    }
                }
                NodeChange::Remove { id } => {
                    let before = self.nodes.len();
                    self.nodes.retain(|n| n.id != id);
                    self.nodes.len() != before
                }
                NodeChange::Add { node } => {
                    if self.node(&node.id).is_some() {
                        tracing::warn!(node_id = %node.id, "Ignoring add for existing node id");
                        false
                    } else {
                        self.nodes.push(node);
                        true
                    }
                }
            };
        }
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Apply a batch of edge changes as one transition. Returns whether anything changed.
    pub fn apply_edge_changes(&mut self, changes: Vec<EdgeChange>) -> bool {
        let mut changed = false;
        for change in changes {
            changed |= match change {
                EdgeChange::Select { id, selected } => {
                    match self.edges.iter_mut().find(|e| e.id == id) {
                        Some(edge) if edge.selected != selected => {
                            edge.selected = selected;
                            true
                        }
                        _ => false,
                    }
                }
                EdgeChange::Remove { id } => {
                    let before = self.edges.len();
                    self.edges.retain(|e| e.id != id);
                    self.edges.len() != before
                }
                EdgeChange::Add { edge } => {
                    if self.edges.iter().any(|e| e.id == edge.id) {
                        false
                    } else {
                        self.edges.push(edge);
                        true
                    }
                }
            };
        }
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Edges whose source or target is not a node of this map.
    pub fn dangling_edges(&self) -> impl Iterator<Item = &GraphEdge> + '_ {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        self.edges
            .iter()
            .filter(move |e| !ids.contains(e.source.as_str()) || !ids.contains(e.target.as_str()))
    }
}
