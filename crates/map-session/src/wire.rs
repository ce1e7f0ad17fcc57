//! Backend payload shapes.
//!
//! Incoming shapes are deliberately loose (ids may be numbers or strings,
//! display fields may be nested under `data` or sit at the top level). They
//! are resolved into the canonical graph model by [`crate::adapter`] and must
//! not be used past that boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::graph::Position;

/// An identifier the backend sends either as a number or as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl RawId {
    /// Canonical string form.
    pub fn canonical(&self) -> String {
        match self {
            RawId::Text(s) => s.clone(),
            RawId::Number(n) => n.to_string(),
        }
    }
}

/// Identifier of a memo, always kept in canonical string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct MemoId(String);

impl MemoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<RawId> for MemoId {
    fn from(raw: RawId) -> Self {
        Self(raw.canonical())
    }
}

impl From<MemoId> for String {
    fn from(id: MemoId) -> Self {
        id.0
    }
}

impl fmt::Display for MemoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// User-authored source text of a knowledge map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memo {
    pub id: MemoId,
    pub content: String,
}

/// Display fields of a node. Appears nested under `data` or flattened at the top level.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawNodeData {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub sentence: Option<String>,
    #[serde(default, rename = "sourceId", alias = "source_id")]
    pub source_id: Option<RawId>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawNode {
    pub id: RawId,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub data: Option<RawNodeData>,
    #[serde(flatten)]
    pub flat: RawNodeData,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawEdge {
    #[serde(default)]
    pub id: Option<RawId>,
    pub source: RawId,
    pub target: RawId,
    #[serde(default)]
    pub animated: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawMapData {
    #[serde(default)]
    pub nodes: Option<Vec<RawNode>>,
    #[serde(default)]
    pub edges: Option<Vec<RawEdge>>,
}

/// A knowledge map as returned by fetch and generate.
///
/// Accepts both `{ "map_data": { nodes, edges } }` and a bare `{ nodes, edges }`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "MapEnvelope")]
pub struct KnowledgeMap {
    pub map_data: Option<RawMapData>,
}

#[derive(Deserialize)]
struct MapEnvelope {
    #[serde(default)]
    map_data: Option<RawMapData>,
    #[serde(flatten)]
    bare: RawMapData,
}

impl From<MapEnvelope> for KnowledgeMap {
    fn from(envelope: MapEnvelope) -> Self {
        let map_data = match envelope.map_data {
            Some(data) => Some(data),
            None if envelope.bare.nodes.is_some() => Some(envelope.bare),
            None => None,
        };
        Self { map_data }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedNodeData {
    pub label: String,
    pub sentence: String,
    #[serde(rename = "sourceId")]
    pub source_id: String,
}

/// Node projection the backend stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub position: Position,
    pub data: PersistedNodeData,
}

/// Edge projection the backend stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub animated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedMap {
    pub nodes: Vec<PersistedNode>,
    pub edges: Vec<PersistedEdge>,
}

/// A node proposed by the related-nodes suggestion query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedNode {
    #[serde(default)]
    pub id: Option<RawId>,
    pub label: String,
    #[serde(default)]
    pub sentence: Option<String>,
}

/// Anchor of a temporal-relation suggestion query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalQuery {
    pub id: String,
    pub label: String,
}

/// Sub-graph proposed by the temporal-relation suggestion query.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TemporalRelatedNodes {
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub edges: Vec<RawEdge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memo_id_coercion() {
        let memo: Memo = serde_json::from_str(r#"{"id": 42, "content": "hi"}"#).unwrap();
        assert_eq!(memo.id.as_str(), "42");
        let memo: Memo = serde_json::from_str(r#"{"id": "42", "content": "hi"}"#).unwrap();
        assert_eq!(memo.id, MemoId::new("42"));
        // Serializes back as a string
        assert_eq!(serde_json::to_value(&memo.id).unwrap(), serde_json::json!("42"));
    }

    #[test]
    fn test_knowledge_map_wrapped() {
        let map: KnowledgeMap =
            serde_json::from_str(r#"{"map_data": {"nodes": [{"id": "n1"}], "edges": []}}"#)
                .unwrap();
        assert_eq!(map.map_data.unwrap().nodes.unwrap().len(), 1);
    }

    #[test]
    fn test_knowledge_map_bare() {
        let map: KnowledgeMap =
            serde_json::from_str(r#"{"nodes": [{"id": 1, "label": "A"}], "edges": []}"#).unwrap();
        let nodes = map.map_data.unwrap().nodes.unwrap();
        assert_eq!(nodes[0].id.canonical(), "1");
        assert_eq!(nodes[0].flat.label.as_deref(), Some("A"));
    }

    #[test]
    fn test_knowledge_map_without_nodes() {
        let map: KnowledgeMap = serde_json::from_str(r#"{"map_data": null}"#).unwrap();
        assert!(map.map_data.is_none());
        let map: KnowledgeMap = serde_json::from_str(r#"{"memo_id": 3}"#).unwrap();
        assert!(map.map_data.is_none());
    }

    #[test]
    fn test_persisted_node_wire_names() {
        let node = PersistedNode {
            id: "n1".to_string(),
            kind: "concept".to_string(),
            position: Position::new(1.0, 2.0),
            data: PersistedNodeData {
                label: "A".to_string(),
                sentence: "s".to_string(),
                source_id: "77".to_string(),
            },
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "concept");
        assert_eq!(json["data"]["sourceId"], "77");
        assert!(json.get("selected").is_none());
    }
}
