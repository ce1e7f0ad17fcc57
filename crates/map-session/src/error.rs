use serde::Serialize;

/// Errors returned by a [`MapBackend`](crate::backend::MapBackend).
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The requested memo or map does not exist (HTTP 404).
    #[error("resource not found")]
    NotFound,

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned a non-success status code.
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The client could not be constructed from its configuration.
    #[error("client configuration error: {0}")]
    Config(String),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound)
    }
}

/// Errors surfaced by the session controller and its handle.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("memo text is empty")]
    EmptyMemo,

    #[error("a knowledge map is already being generated")]
    GenerationInFlight,

    #[error("the session is still loading")]
    StillLoading,

    #[error("the session has been torn down")]
    Closed,

    #[error("no node with id {0}")]
    UnknownNode(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// How a failure is reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Initial fetch failed for a reason other than "not found".
    TransientLoad,
    /// A map is absent. Never reported as an error, kept for classification.
    NotFound,
    /// Input rejected before any network call.
    Validation,
    /// Autosave, memo creation or map generation failed.
    WriteFailure,
    /// Anything else caught at a workflow boundary.
    Unexpected,
}

impl FailureKind {
    /// Classify a backend failure that happened while loading.
    pub fn for_load(err: &BackendError) -> Self {
        match err {
            BackendError::NotFound => FailureKind::NotFound,
            BackendError::Http(_) | BackendError::Server { .. } => FailureKind::TransientLoad,
            BackendError::Json(_) | BackendError::Config(_) => FailureKind::Unexpected,
        }
    }

    /// Classify a backend failure that happened while writing.
    pub fn for_write(err: &BackendError) -> Self {
        match err {
            BackendError::Json(_) | BackendError::Config(_) => FailureKind::Unexpected,
            _ => FailureKind::WriteFailure,
        }
    }
}
