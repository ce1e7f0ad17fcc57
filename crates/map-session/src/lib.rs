pub mod adapter;
pub mod autosave;
pub mod backend;
pub mod config;
pub mod error;
pub mod graph;
pub mod notify;
pub mod protocol;
pub mod session;
pub mod stdio;
pub mod suggest;
pub mod timer;
pub mod wire;
pub mod workflow;

pub use backend::{HttpBackend, HttpBackendConfig, MapBackend};
pub use config::{SessionConfig, Viewport};
pub use error::{BackendError, FailureKind, SessionError};
pub use graph::{EdgeChange, GraphEdge, GraphModel, GraphNode, NodeChange, Position};
pub use notify::{Level, Notification, SessionEvent};
pub use session::{SessionController, SessionHandle, SessionView};
pub use stdio::run_stdio;
