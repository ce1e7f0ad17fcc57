//! Outbound session events: user notifications and UI requests.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::FailureKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Success,
    Warning,
    Error,
}

/// A user-visible message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub level: Level,
    /// Set for failures, absent for plain confirmations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            kind: None,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        let level = match kind {
            FailureKind::Validation => Level::Warning,
            _ => Level::Error,
        };
        Self {
            kind: Some(kind),
            ..Self::new(level, message)
        }
    }
}

/// Everything the controller pushes to its observer, besides view snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Notification(Notification),
    /// Fit the viewport around the current nodes.
    LayoutRequested,
    PanelChanged { open: bool },
}
