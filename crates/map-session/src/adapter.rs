//! Translation between backend map payloads and the editable graph model.

use std::collections::HashSet;

use rand::Rng;

use crate::config::Viewport;
use crate::graph::{GraphEdge, GraphModel, GraphNode, Position};
use crate::wire::{
    KnowledgeMap, PersistedEdge, PersistedMap, PersistedNode, PersistedNodeData, RawEdge,
    RawMapData, RawNode, RawNodeData, TemporalRelatedNodes,
};

/// Rendering variant used when the backend does not name one.
pub const DEFAULT_NODE_KIND: &str = "default";

/// Canonical nodes and edges produced from a backend payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelParts {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl ModelParts {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Convert a fetched or generated map into model parts.
///
/// `None`, or a map without a `nodes` sequence, yields an empty model.
pub fn to_model(raw: Option<&KnowledgeMap>, viewport: Viewport) -> ModelParts {
    to_model_with(raw, viewport, &mut rand::rng())
}

pub fn to_model_with<R: Rng>(
    raw: Option<&KnowledgeMap>,
    viewport: Viewport,
    rng: &mut R,
) -> ModelParts {
    match raw.and_then(|map| map.map_data.as_ref()) {
        Some(RawMapData {
            nodes: Some(nodes),
            edges,
        }) => ModelParts {
            nodes: nodes.iter().map(|n| resolve_node(n, viewport, rng)).collect(),
            edges: resolve_edges(edges.iter().flatten()),
        },
        _ => ModelParts::default(),
    }
}

/// Convert a temporal-relation suggestion into model parts.
pub fn temporal_to_model(related: &TemporalRelatedNodes, viewport: Viewport) -> ModelParts {
    let mut rng = rand::rng();
    ModelParts {
        nodes: related
            .nodes
            .iter()
            .map(|n| resolve_node(n, viewport, &mut rng))
            .collect(),
        edges: resolve_edges(&related.edges),
    }
}

/// Project the model onto the fields the backend persists.
pub fn to_persisted(nodes: &[GraphNode], edges: &[GraphEdge]) -> PersistedMap {
    PersistedMap {
        nodes: nodes
            .iter()
            .map(|n| PersistedNode {
                id: n.id.clone(),
                kind: n.kind.clone(),
                position: n.position,
                data: PersistedNodeData {
                    label: n.label.clone(),
                    sentence: n.sentence.clone(),
                    source_id: n.source_id.clone(),
                },
            })
            .collect(),
        edges: edges
            .iter()
            .map(|e| PersistedEdge {
                id: e.id.clone(),
                source: e.source.clone(),
                target: e.target.clone(),
                animated: e.animated,
            })
            .collect(),
    }
}

pub fn model_to_persisted(model: &GraphModel) -> PersistedMap {
    to_persisted(model.nodes(), model.edges())
}

/// Display fields after resolving the nested and flat layouts.
struct NodeFields {
    label: String,
    sentence: String,
    source_id: Option<String>,
}

/// Nested `data` wins field by field; the top level is the fallback.
fn resolve_fields(nested: Option<&RawNodeData>, flat: &RawNodeData) -> NodeFields {
    let pick = |f: fn(&RawNodeData) -> Option<String>| nested.and_then(f).or_else(|| f(flat));
    NodeFields {
        label: pick(|d| d.label.clone()).unwrap_or_default(),
        sentence: pick(|d| d.sentence.clone()).unwrap_or_default(),
        source_id: pick(|d| d.source_id.as_ref().map(|id| id.canonical())),
    }
}

fn resolve_node<R: Rng>(raw: &RawNode, viewport: Viewport, rng: &mut R) -> GraphNode {
    let id = raw.id.canonical();
    let fields = resolve_fields(raw.data.as_ref(), &raw.flat);
    let position = raw
        .position
        .unwrap_or_else(|| random_position(viewport, rng));

    GraphNode {
        source_id: fields.source_id.unwrap_or_else(|| id.clone()),
        id,
        position,
        kind: raw
            .kind
            .clone()
            .unwrap_or_else(|| DEFAULT_NODE_KIND.to_string()),
        label: fields.label,
        sentence: fields.sentence,
        selected: false,
        dragging: false,
    }
}

/// Edges without an id get `e{source}-{target}`, suffixed with `-1`, `-2`, ...
/// when that id is already used in the same batch.
fn resolve_edges<'a>(raws: impl IntoIterator<Item = &'a RawEdge>) -> Vec<GraphEdge> {
    let raws: Vec<&RawEdge> = raws.into_iter().collect();
    let mut taken: HashSet<String> = raws
        .iter()
        .filter_map(|raw| raw.id.as_ref().map(|id| id.canonical()))
        .collect();

    raws.into_iter()
        .map(|raw| {
            let source = raw.source.canonical();
            let target = raw.target.canonical();
            let id = match &raw.id {
                Some(id) => id.canonical(),
                None => unused_id(format!("e{}-{}", source, target), &mut taken),
            };
            GraphEdge {
                id,
                source,
                target,
                animated: raw.animated.unwrap_or(false),
                selected: false,
            }
        })
        .collect()
}

fn unused_id(base: String, taken: &mut HashSet<String>) -> String {
    let mut candidate = base.clone();
    let mut n = 0;
    while !taken.insert(candidate.clone()) {
        n += 1;
        candidate = format!("{base}-{n}");
    }
    candidate
}

/// Cosmetic fallback for nodes without a position: somewhere inside the viewport.
fn random_position<R: Rng>(viewport: Viewport, rng: &mut R) -> Position {
    let mut sample = |extent: f64| {
        if extent > 0.0 {
            rng.random_range(0.0..extent)
        } else {
            0.0
        }
    };
    Position::new(sample(viewport.width), sample(viewport.height))
}
