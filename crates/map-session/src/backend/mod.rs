//! Backend operations consumed by the session controller.

use futures::future::BoxFuture;

use crate::error::BackendError;
use crate::wire::{
    KnowledgeMap, Memo, MemoId, PersistedMap, SuggestedNode, TemporalQuery,
    TemporalRelatedNodes,
};

pub mod http;

pub use http::{HttpBackend, HttpBackendConfig};

pub type Result<T> = std::result::Result<T, BackendError>;

/// The knowledge-map API as seen by the controller.
///
/// Implementations must report a missing memo map as [`BackendError::NotFound`];
/// the controller treats that as an empty map rather than a failure.
pub trait MapBackend: Send + Sync {
    /// Memos, most recent first.
    fn list_memos(&self) -> BoxFuture<'_, Result<Vec<Memo>>>;

    fn create_memo<'a>(&'a self, content: &'a str) -> BoxFuture<'a, Result<Memo>>;

    fn fetch_map<'a>(&'a self, memo_id: &'a MemoId) -> BoxFuture<'a, Result<KnowledgeMap>>;

    fn generate_map<'a>(&'a self, memo_id: &'a MemoId) -> BoxFuture<'a, Result<KnowledgeMap>>;

    fn update_map<'a>(
        &'a self,
        memo_id: &'a MemoId,
        map: &'a PersistedMap,
    ) -> BoxFuture<'a, Result<()>>;

    fn suggest_related_nodes<'a>(&'a self, label: &'a str)
        -> BoxFuture<'a, Result<Vec<SuggestedNode>>>;

    fn suggest_temporal_related_nodes<'a>(
        &'a self,
        anchor: &'a TemporalQuery,
    ) -> BoxFuture<'a, Result<TemporalRelatedNodes>>;
}
