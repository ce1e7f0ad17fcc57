//! Line-delimited JSON protocol spoken by the `kmap` bridge.
//!
//! Each input line is a [`BridgeRequest`]. Each output line is either a
//! [`BridgeResponse`], a [`SessionEvent`](crate::notify::SessionEvent) or a
//! [`ViewEvent`]. Events carry an `event` field, responses never do.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::graph::{EdgeChange, NodeChange};
use crate::session::SessionView;
use crate::wire::SuggestedNode;

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const SESSION_ERROR: i32 = -32000;

#[derive(Debug, Deserialize, Serialize)]
pub struct BridgeRequest {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct BridgeResponse {
    pub id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BridgeError>,
}

impl BridgeResponse {
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<serde_json::Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(BridgeError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BridgeError {
    pub code: i32,
    pub message: String,
}

/// A published view snapshot, written as `{"event": "view", ...}`.
#[derive(Debug, Serialize)]
pub struct ViewEvent<'a> {
    pub event: &'static str,
    #[serde(flatten)]
    pub view: &'a SessionView,
}

impl<'a> ViewEvent<'a> {
    pub fn new(view: &'a SessionView) -> Self {
        Self { event: "view", view }
    }
}

/// Why a request could not be served.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("invalid params: {0}")]
    InvalidParams(#[source] serde_json::Error),

    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl DispatchError {
    pub fn code(&self) -> i32 {
        match self {
            DispatchError::UnknownMethod(_) => METHOD_NOT_FOUND,
            DispatchError::InvalidParams(_) => INVALID_PARAMS,
            DispatchError::Encode(_) => INTERNAL_ERROR,
            DispatchError::Session(_) => SESSION_ERROR,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitParams {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct NodeChangesParams {
    pub changes: Vec<NodeChange>,
}

#[derive(Debug, Deserialize)]
pub struct EdgeChangesParams {
    pub changes: Vec<EdgeChange>,
}

#[derive(Debug, Deserialize)]
pub struct LabelParams {
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct AcceptSuggestionParams {
    pub anchor_id: String,
    pub suggestion: SuggestedNode,
}

#[derive(Debug, Deserialize)]
pub struct NodeParams {
    pub node_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PanelParams {
    pub open: bool,
}
