#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use kmap_core::backend::{MapBackend, Result};
use kmap_core::wire::{
    KnowledgeMap, Memo, MemoId, PersistedMap, SuggestedNode, TemporalQuery, TemporalRelatedNodes,
};
use kmap_core::{
    BackendError, NodeChange, Notification, Position, SessionConfig, SessionController,
    SessionEvent, SessionHandle,
};
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// A scripted backend failure.
#[derive(Debug, Clone, Copy)]
pub enum MockFailure {
    NotFound,
    Status(u16),
    /// The call panics instead of answering.
    Panic,
}

impl MockFailure {
    fn error(self) -> BackendError {
        match self {
            MockFailure::NotFound => BackendError::NotFound,
            MockFailure::Status(status) => BackendError::Server {
                status,
                message: "scripted failure".to_string(),
            },
            MockFailure::Panic => panic!("scripted panic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListMemos,
    CreateMemo(String),
    FetchMap(String),
    GenerateMap(String),
    UpdateMap(String, PersistedMap),
    SuggestRelated(String),
    SuggestTemporal(TemporalQuery),
}

type Scripted<T> = std::result::Result<T, MockFailure>;

/// In-memory backend. Replies are read when a call starts; every call
/// sleeps for the configured latency before answering.
pub struct MockBackend {
    latency: Mutex<Duration>,
    calls: Mutex<Vec<Call>>,
    memos: Mutex<Scripted<Vec<Memo>>>,
    maps: Mutex<HashMap<String, Scripted<Value>>>,
    created: Mutex<Scripted<Memo>>,
    generated: Mutex<Scripted<Value>>,
    update_failures: Mutex<VecDeque<MockFailure>>,
    related: Mutex<Vec<SuggestedNode>>,
    temporal: Mutex<Value>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            latency: Mutex::new(Duration::ZERO),
            calls: Mutex::new(Vec::new()),
            memos: Mutex::new(Ok(Vec::new())),
            maps: Mutex::new(HashMap::new()),
            created: Mutex::new(Ok(memo("42", ""))),
            generated: Mutex::new(Ok(map_json(&[], &[]))),
            update_failures: Mutex::new(VecDeque::new()),
            related: Mutex::new(Vec::new()),
            temporal: Mutex::new(json!({ "nodes": [], "edges": [] })),
        })
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn set_memos(&self, memos: Vec<Memo>) {
        *self.memos.lock().unwrap() = Ok(memos);
    }

    pub fn fail_memos(&self, failure: MockFailure) {
        *self.memos.lock().unwrap() = Err(failure);
    }

    pub fn set_map(&self, memo_id: &str, map: Value) {
        self.maps.lock().unwrap().insert(memo_id.to_string(), Ok(map));
    }

    pub fn fail_map(&self, memo_id: &str, failure: MockFailure) {
        self.maps
            .lock()
            .unwrap()
            .insert(memo_id.to_string(), Err(failure));
    }

    pub fn set_created(&self, memo: Memo) {
        *self.created.lock().unwrap() = Ok(memo);
    }

    pub fn fail_create(&self, failure: MockFailure) {
        *self.created.lock().unwrap() = Err(failure);
    }

    pub fn set_generated(&self, map: Value) {
        *self.generated.lock().unwrap() = Ok(map);
    }

    pub fn fail_generate(&self, failure: MockFailure) {
        *self.generated.lock().unwrap() = Err(failure);
    }

    pub fn fail_next_update(&self, failure: MockFailure) {
        self.update_failures.lock().unwrap().push_back(failure);
    }

    pub fn set_related(&self, related: Vec<SuggestedNode>) {
        *self.related.lock().unwrap() = related;
    }

    pub fn set_temporal(&self, related: Value) {
        *self.temporal.lock().unwrap() = related;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(String, PersistedMap)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::UpdateMap(id, map) => Some((id, map)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(*c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn pause(&self) {
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

impl MapBackend for MockBackend {
    fn list_memos(&self) -> BoxFuture<'_, Result<Vec<Memo>>> {
        self.record(Call::ListMemos);
        let reply = self.memos.lock().unwrap().clone();
        Box::pin(async move {
            self.pause().await;
            reply.map_err(MockFailure::error)
        })
    }

    fn create_memo<'a>(&'a self, content: &'a str) -> BoxFuture<'a, Result<Memo>> {
        self.record(Call::CreateMemo(content.to_string()));
        let reply = self.created.lock().unwrap().clone().map(|memo| Memo {
            content: content.to_string(),
            ..memo
        });
        Box::pin(async move {
            self.pause().await;
            reply.map_err(MockFailure::error)
        })
    }

    fn fetch_map<'a>(&'a self, memo_id: &'a MemoId) -> BoxFuture<'a, Result<KnowledgeMap>> {
        self.record(Call::FetchMap(memo_id.to_string()));
        let reply = self
            .maps
            .lock()
            .unwrap()
            .get(memo_id.as_str())
            .cloned()
            .unwrap_or(Err(MockFailure::NotFound));
        Box::pin(async move {
            self.pause().await;
            let value = reply.map_err(MockFailure::error)?;
            Ok(serde_json::from_value(value)?)
        })
    }

    fn generate_map<'a>(&'a self, memo_id: &'a MemoId) -> BoxFuture<'a, Result<KnowledgeMap>> {
        self.record(Call::GenerateMap(memo_id.to_string()));
        let reply = self.generated.lock().unwrap().clone();
        Box::pin(async move {
            self.pause().await;
            let value = reply.map_err(MockFailure::error)?;
            Ok(serde_json::from_value(value)?)
        })
    }

    fn update_map<'a>(
        &'a self,
        memo_id: &'a MemoId,
        map: &'a PersistedMap,
    ) -> BoxFuture<'a, Result<()>> {
        self.record(Call::UpdateMap(memo_id.to_string(), map.clone()));
        let failure = self.update_failures.lock().unwrap().pop_front();
        Box::pin(async move {
            self.pause().await;
            match failure {
                Some(failure) => Err(failure.error()),
                None => Ok(()),
            }
        })
    }

    fn suggest_related_nodes<'a>(
        &'a self,
        label: &'a str,
    ) -> BoxFuture<'a, Result<Vec<SuggestedNode>>> {
        self.record(Call::SuggestRelated(label.to_string()));
        let reply = self.related.lock().unwrap().clone();
        Box::pin(async move {
            self.pause().await;
            Ok(reply)
        })
    }

    fn suggest_temporal_related_nodes<'a>(
        &'a self,
        anchor: &'a TemporalQuery,
    ) -> BoxFuture<'a, Result<TemporalRelatedNodes>> {
        self.record(Call::SuggestTemporal(anchor.clone()));
        let reply = self.temporal.lock().unwrap().clone();
        Box::pin(async move {
            self.pause().await;
            Ok(serde_json::from_value(reply)?)
        })
    }
}

pub struct Session {
    pub handle: SessionHandle,
    pub events: UnboundedReceiver<SessionEvent>,
    pub task: JoinHandle<()>,
}

impl Session {
    /// Events emitted so far.
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

pub fn start(backend: &Arc<MockBackend>) -> Session {
    start_with(backend, SessionConfig::default())
}

pub fn start_with(backend: &Arc<MockBackend>, config: SessionConfig) -> Session {
    let backend: Arc<dyn MapBackend> = backend.clone();
    let (controller, handle, events) = SessionController::new(backend, config);
    let task = tokio::spawn(controller.run());
    Session {
        handle,
        events,
        task,
    }
}

/// Let every ready task run. With paused time this advances the clock by 1ms.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn memo(id: &str, content: &str) -> Memo {
    Memo {
        id: MemoId::new(id),
        content: content.to_string(),
    }
}

/// A `{ map_data: { nodes, edges } }` payload with nested node data.
pub fn map_json(nodes: &[(&str, &str)], edges: &[(&str, &str)]) -> Value {
    let nodes: Vec<Value> = nodes
        .iter()
        .enumerate()
        .map(|(i, (id, label))| {
            json!({
                "id": id,
                "type": "default",
                "position": { "x": i as f64 * 100.0, "y": 50.0 },
                "data": { "label": label, "sentence": format!("About {label}"), "sourceId": id }
            })
        })
        .collect();
    let edges: Vec<Value> = edges
        .iter()
        .map(|(source, target)| json!({ "source": source, "target": target }))
        .collect();
    json!({ "map_data": { "nodes": nodes, "edges": edges } })
}

pub fn move_node(id: &str, x: f64, y: f64) -> NodeChange {
    NodeChange::Position {
        id: id.to_string(),
        position: Position::new(x, y),
        dragging: false,
    }
}

pub fn notifications(events: &[SessionEvent]) -> Vec<&Notification> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Notification(n) => Some(n),
            _ => None,
        })
        .collect()
}
