//! Turning suggestion payloads into graph insertions.

use rand::Rng;
use uuid::Uuid;

use crate::adapter::DEFAULT_NODE_KIND;
use crate::graph::{GraphEdge, GraphNode, Position};
use crate::wire::{SuggestedNode, TemporalQuery};

/// Horizontal distance between an anchor and a freshly placed suggestion.
const SUGGESTION_OFFSET_X: f64 = 220.0;
const SUGGESTION_JITTER_Y: f64 = 120.0;

/// What accepting a suggestion adds to the map.
#[derive(Debug, Clone, PartialEq)]
pub struct Insertion {
    pub node: Option<GraphNode>,
    pub edge: GraphEdge,
}

/// Build the insertion for an accepted suggestion.
///
/// Labels are compared trimmed and case-insensitively. If another node with
/// the suggested label exists, only an edge from `anchor` to it is produced,
/// or nothing when the two are already linked. A suggestion naming the anchor
/// itself yields nothing. Otherwise a new node is placed to the right of the
/// anchor and linked to it.
pub fn accept_suggestion(
    nodes: &[GraphNode],
    edges: &[GraphEdge],
    anchor: &GraphNode,
    suggestion: &SuggestedNode,
) -> Option<Insertion> {
    let label = suggestion.label.trim();
    let same_label = |n: &GraphNode| n.label.trim().eq_ignore_ascii_case(label);

    if let Some(found) = nodes.iter().find(|n| n.id != anchor.id && same_label(n)) {
        let linked = edges.iter().any(|e| {
            (e.source == anchor.id && e.target == found.id)
                || (e.source == found.id && e.target == anchor.id)
        });
        return (!linked).then(|| Insertion {
            node: None,
            edge: new_edge(&anchor.id, &found.id),
        });
    }
    if same_label(anchor) {
        return None;
    }

    let id = Uuid::new_v4().to_string();
    let jitter = rand::rng().random_range(-SUGGESTION_JITTER_Y..SUGGESTION_JITTER_Y);
    let node = GraphNode {
        source_id: suggestion
            .id
            .as_ref()
            .map(|raw| raw.canonical())
            .unwrap_or_else(|| id.clone()),
        position: Position::new(
            anchor.position.x + SUGGESTION_OFFSET_X,
            anchor.position.y + jitter,
        ),
        kind: DEFAULT_NODE_KIND.to_string(),
        label: label.to_string(),
        sentence: suggestion.sentence.clone().unwrap_or_default(),
        selected: false,
        dragging: false,
        id,
    };
    let edge = new_edge(&anchor.id, &node.id);
    Some(Insertion {
        node: Some(node),
        edge,
    })
}

/// Query for the temporal-relation suggestion anchored at `node`.
pub fn temporal_query(node: &GraphNode) -> TemporalQuery {
    TemporalQuery {
        id: node.source_id.clone(),
        label: node.label.clone(),
    }
}

fn new_edge(source: &str, target: &str) -> GraphEdge {
    GraphEdge::new(Uuid::new_v4().to_string(), source, target)
}
