//! The session controller.
//!
//! One actor task owns the graph model, the current memo and every workflow
//! flag. Callers talk to it through a [`SessionHandle`]; backend calls and
//! timers run as spawned tasks and report back on an internal queue, so all
//! state transitions happen on the actor task, one message at a time.
//!
//! Each spawned backend call carries the session epoch it was issued under.
//! Reload and teardown bump the epoch, which turns any late result into a
//! no-op.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

use crate::adapter::{self, ModelParts};
use crate::autosave::{AutosavePhase, AutosaveScheduler};
use crate::backend::{self, MapBackend};
use crate::config::{SessionConfig, Viewport};
use crate::error::{FailureKind, SessionError};
use crate::graph::{EdgeChange, GraphEdge, GraphModel, GraphNode, NodeChange};
use crate::notify::{Level, Notification, SessionEvent};
use crate::suggest;
use crate::timer::{Debouncer, Ticket};
use crate::wire::{KnowledgeMap, Memo, MemoId, SuggestedNode, TemporalRelatedNodes};
use crate::workflow::{GenerationPhase, GenerationStep, GenerationWorkflow};

/// Snapshot of the session published after every processed message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionView {
    pub memo: Option<Memo>,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub revision: u64,
    /// Startup load (or reload) in progress.
    pub loading: bool,
    /// The first load has been applied.
    pub loaded: bool,
    /// A memo submission is in flight.
    pub processing: bool,
    pub saving: bool,
    pub panel_open: bool,
    pub generation: GenerationPhase,
    pub autosave: AutosavePhase,
}

#[derive(Debug)]
enum Command {
    Submit(String),
    NodeChanges(Vec<NodeChange>),
    EdgeChanges(Vec<EdgeChange>),
    Insert {
        node: Option<GraphNode>,
        edge: GraphEdge,
    },
    Merge(ModelParts),
    SetPanel(bool),
    Reload,
    Teardown,
}

#[derive(Debug)]
enum Completion {
    MemosListed {
        epoch: u64,
        result: backend::Result<Vec<Memo>>,
    },
    MapFetched {
        epoch: u64,
        memo_id: MemoId,
        result: backend::Result<KnowledgeMap>,
    },
    MemoCreated {
        epoch: u64,
        result: backend::Result<Memo>,
    },
    MapGenerated {
        epoch: u64,
        memo_id: MemoId,
        result: backend::Result<KnowledgeMap>,
    },
    SaveFinished {
        epoch: u64,
        memo_id: MemoId,
        result: backend::Result<()>,
    },
    /// The spawned call panicked before reporting back.
    Aborted {
        epoch: u64,
        call: CallKind,
    },
    AutosaveDue(Ticket),
    LayoutDue(Ticket),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    ListMemos,
    FetchMap,
    CreateMemo,
    GenerateMap,
    UpdateMap,
}

impl Completion {
    fn epoch(&self) -> Option<u64> {
        match self {
            Completion::MemosListed { epoch, .. }
            | Completion::MapFetched { epoch, .. }
            | Completion::MemoCreated { epoch, .. }
            | Completion::MapGenerated { epoch, .. }
            | Completion::SaveFinished { epoch, .. }
            | Completion::Aborted { epoch, .. } => Some(*epoch),
            Completion::AutosaveDue(_) | Completion::LayoutDue(_) => None,
        }
    }
}

pub struct SessionController {
    backend: Arc<dyn MapBackend>,
    config: SessionConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    completions: mpsc::UnboundedReceiver<Completion>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    events: mpsc::UnboundedSender<SessionEvent>,
    view: watch::Sender<SessionView>,

    epoch: u64,
    memo: Option<Memo>,
    graph: GraphModel,
    loading: bool,
    loaded: bool,
    /// The model mirrors what the backend stores for `memo`, so saving it
    /// cannot clobber a map that failed to load.
    save_eligible: bool,
    panel_open: bool,
    workflow: GenerationWorkflow,
    autosave: AutosaveScheduler,
    layout: Debouncer,
}

impl SessionController {
    /// Create a controller together with its handle and event stream.
    ///
    /// Nothing happens until [`SessionController::run`] is awaited.
    pub fn new(
        backend: Arc<dyn MapBackend>,
        config: SessionConfig,
    ) -> (Self, SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();
        let (view, view_rx) = watch::channel(SessionView::default());

        let handle = SessionHandle {
            commands: commands_tx,
            view: view_rx,
            backend: Arc::clone(&backend),
            viewport: config.viewport,
        };

        let controller = Self {
            autosave: AutosaveScheduler::new(config.autosave_delay),
            backend,
            config,
            commands,
            completions,
            completions_tx,
            events,
            view,
            epoch: 0,
            memo: None,
            graph: GraphModel::new(),
            loading: false,
            loaded: false,
            save_eligible: false,
            panel_open: false,
            workflow: GenerationWorkflow::new(),
            layout: Debouncer::new(),
        };

        (controller, handle, events_rx)
    }

    /// Run the session until it is torn down or every handle is dropped.
    pub async fn run(mut self) {
        info!("Session started");
        self.start_load();
        self.publish();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Teardown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(done) = self.completions.recv() => self.handle_completion(done),
            }
            self.publish();
        }

        self.shutdown();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Submit(text) => self.submit(text),
            Command::NodeChanges(changes) => {
                if self.reject_while_loading("node changes") {
                    return;
                }
                if self.graph.apply_node_changes(changes) {
                    self.graph_changed();
                }
            }
            Command::EdgeChanges(changes) => {
                if self.reject_while_loading("edge changes") {
                    return;
                }
                if self.graph.apply_edge_changes(changes) {
                    self.graph_changed();
                }
            }
            Command::Insert { node, edge } => {
                if self.reject_while_loading("suggestion insert") {
                    return;
                }
                let outcome = self.graph.extend(node.into_iter().collect(), vec![edge]);
                debug!(?outcome, "Suggestion inserted");
                if outcome.changed() {
                    self.graph_changed();
                }
            }
            Command::Merge(parts) => {
                if self.reject_while_loading("merge") {
                    return;
                }
                let outcome = self.graph.extend(parts.nodes, parts.edges);
                info!(
                    nodes_added = outcome.nodes_added,
                    edges_added = outcome.edges_added,
                    skipped = outcome.skipped,
                    "Merged related nodes"
                );
                if outcome.changed() {
                    self.graph_changed();
                }
            }
            Command::SetPanel(open) => self.set_panel(open),
            Command::Reload => self.reload(),
            Command::Teardown => {}
        }
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::AutosaveDue(ticket) => self.autosave_due(ticket),
            Completion::LayoutDue(ticket) => {
                if self.layout.fire(ticket) {
                    self.emit(SessionEvent::LayoutRequested);
                }
            }
            stale if stale.epoch() != Some(self.epoch) => {
                debug!(epoch = ?stale.epoch(), current = self.epoch, "Dropping stale result");
            }
            Completion::MemosListed { result, .. } => self.memos_listed(result),
            Completion::MapFetched {
                memo_id, result, ..
            } => self.map_fetched(memo_id, result),
            Completion::MemoCreated { result, .. } => self.memo_created(result),
            Completion::MapGenerated {
                memo_id, result, ..
            } => self.map_generated(memo_id, result),
            Completion::SaveFinished {
                memo_id, result, ..
            } => self.save_finished(memo_id, result),
            Completion::Aborted { call, .. } => self.call_aborted(call),
        }
    }

    // Loading

    fn start_load(&mut self) {
        self.loading = true;
        let epoch = self.epoch;
        let backend = Arc::clone(&self.backend);
        self.spawn_call(CallKind::ListMemos, async move {
            let result = backend.list_memos().await;
            Completion::MemosListed { epoch, result }
        });
    }

    fn memos_listed(&mut self, result: backend::Result<Vec<Memo>>) {
        let first = match result {
            Ok(memos) => memos.into_iter().next(),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                error!(error = %e, "Failed to list memos");
                self.notify(Notification::failure(
                    FailureKind::for_load(&e),
                    format!("Could not load your memos: {e}"),
                ));
                self.fail_load();
                return;
            }
        };

        let Some(memo) = first else {
            info!("No memos yet, opening the input panel");
            self.finish_load(ModelParts::default());
            self.set_panel(true);
            return;
        };

        info!(memo_id = %memo.id, "Loading knowledge map");
        let epoch = self.epoch;
        let memo_id = memo.id.clone();
        self.memo = Some(memo);
        let backend = Arc::clone(&self.backend);
        self.spawn_call(CallKind::FetchMap, async move {
            let result = backend.fetch_map(&memo_id).await;
            Completion::MapFetched {
                epoch,
                memo_id,
                result,
            }
        });
    }

    fn map_fetched(&mut self, memo_id: MemoId, result: backend::Result<KnowledgeMap>) {
        match result {
            Ok(map) => {
                let parts = adapter::to_model(Some(&map), self.config.viewport);
                info!(
                    memo_id = %memo_id,
                    nodes = parts.nodes.len(),
                    edges = parts.edges.len(),
                    "Knowledge map loaded"
                );
                self.finish_load(parts);
            }
            Err(e) if e.is_not_found() => {
                info!(memo_id = %memo_id, "No knowledge map for memo yet");
                self.finish_load(ModelParts::default());
            }
            Err(e) => {
                error!(memo_id = %memo_id, error = %e, "Failed to fetch knowledge map");
                self.notify(Notification::failure(
                    FailureKind::for_load(&e),
                    format!("Could not load the knowledge map: {e}"),
                ));
                self.fail_load();
            }
        }
    }

    /// Apply the loaded model. Runs while `loading` is still set, so the
    /// replacement never schedules a save.
    fn finish_load(&mut self, parts: ModelParts) {
        let has_nodes = !parts.nodes.is_empty();
        self.graph.replace(parts.nodes, parts.edges);
        self.log_dangling_edges();
        self.loading = false;
        self.loaded = true;
        self.save_eligible = true;
        if has_nodes {
            self.request_layout();
        }
    }

    /// Finish a load that never saw the stored map. Edits stay local until a
    /// later load or generation succeeds.
    fn fail_load(&mut self) {
        self.finish_load(ModelParts::default());
        self.save_eligible = false;
    }

    fn reload(&mut self) {
        info!("Reloading session");
        self.epoch += 1;
        self.autosave.reset();
        self.layout.cancel();
        self.workflow.finish();
        self.memo = None;
        self.loaded = false;
        self.save_eligible = false;
        self.graph.replace(Vec::new(), Vec::new());
        self.start_load();
    }

    fn reject_while_loading(&self, what: &str) -> bool {
        if self.loading {
            debug!(what, "Ignoring edit while the map is loading");
        }
        self.loading
    }

    // Generation

    fn submit(&mut self, text: String) {
        if self.loading {
            self.notify(Notification::new(
                Level::Warning,
                SessionError::StillLoading.to_string(),
            ));
            return;
        }
        match self.workflow.submit(&text) {
            Ok(step) => self.run_step(step),
            Err(SessionError::EmptyMemo) => {
                self.notify(Notification::failure(
                    FailureKind::Validation,
                    "Please enter some text before generating a map",
                ));
            }
            Err(e) => self.notify(Notification::new(Level::Warning, e.to_string())),
        }
    }

    fn run_step(&mut self, step: GenerationStep) {
        let epoch = self.epoch;
        let backend = Arc::clone(&self.backend);
        match step {
            GenerationStep::CreateMemo(content) => {
                debug!(chars = content.len(), "Creating memo");
                self.spawn_call(CallKind::CreateMemo, async move {
                    let result = backend.create_memo(&content).await;
                    Completion::MemoCreated { epoch, result }
                });
            }
            GenerationStep::GenerateMap(memo_id) => {
                info!(memo_id = %memo_id, "Generating knowledge map");
                self.spawn_call(CallKind::GenerateMap, async move {
                    let result = backend.generate_map(&memo_id).await;
                    Completion::MapGenerated {
                        epoch,
                        memo_id,
                        result,
                    }
                });
            }
        }
    }

    fn memo_created(&mut self, result: backend::Result<Memo>) {
        match result {
            Ok(memo) => {
                info!(memo_id = %memo.id, "Memo created");
                let next = self.workflow.memo_created(&memo);
                self.memo = Some(memo);
                // A fresh memo has no stored map to overwrite.
                self.save_eligible = true;
                self.notify(Notification::new(Level::Success, "Memo saved"));
                match next {
                    Some(step) => self.run_step(step),
                    None => self.finish_generation(),
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to create memo");
                self.notify(Notification::failure(
                    FailureKind::for_write(&e),
                    format!("Could not save the memo: {e}"),
                ));
                self.finish_generation();
            }
        }
    }

    fn map_generated(&mut self, memo_id: MemoId, result: backend::Result<KnowledgeMap>) {
        match result {
            Ok(map) => {
                let parts = adapter::to_model(Some(&map), self.config.viewport);
                info!(
                    memo_id = %memo_id,
                    nodes = parts.nodes.len(),
                    edges = parts.edges.len(),
                    "Knowledge map generated"
                );
                let has_nodes = !parts.nodes.is_empty();
                self.graph.replace(parts.nodes, parts.edges);
                self.log_dangling_edges();
                self.save_eligible = true;
                self.graph_changed();
                if has_nodes {
                    self.request_layout();
                }
                self.notify(Notification::new(Level::Success, "Knowledge map generated"));
            }
            Err(e) => {
                error!(memo_id = %memo_id, error = %e, "Failed to generate knowledge map");
                self.notify(Notification::failure(
                    FailureKind::for_write(&e),
                    format!("Could not generate the knowledge map: {e}"),
                ));
            }
        }
        self.finish_generation();
    }

    fn finish_generation(&mut self) {
        self.workflow.finish();
        self.set_panel(false);
    }

    // Autosave

    fn graph_changed(&mut self) {
        if self.loading || !self.loaded || !self.save_eligible || self.memo.is_none() {
            trace!(revision = self.graph.revision(), "Change not eligible for autosave");
            return;
        }
        self.autosave
            .schedule(&self.completions_tx, Completion::AutosaveDue);
    }

    fn autosave_due(&mut self, ticket: Ticket) {
        if !self.autosave.begin_save(ticket) {
            trace!("Ignoring superseded autosave timer");
            return;
        }
        let Some(memo_id) = self.memo.as_ref().map(|m| m.id.clone()) else {
            self.autosave.finish_save();
            return;
        };

        let payload = adapter::model_to_persisted(&self.graph);
        debug!(
            memo_id = %memo_id,
            nodes = payload.nodes.len(),
            edges = payload.edges.len(),
            revision = self.graph.revision(),
            "Saving knowledge map"
        );
        let epoch = self.epoch;
        let backend = Arc::clone(&self.backend);
        self.spawn_call(CallKind::UpdateMap, async move {
            let result = backend.update_map(&memo_id, &payload).await;
            Completion::SaveFinished {
                epoch,
                memo_id,
                result,
            }
        });
    }

    fn save_finished(&mut self, memo_id: MemoId, result: backend::Result<()>) {
        self.autosave.finish_save();
        match result {
            Ok(()) => debug!(memo_id = %memo_id, "Knowledge map saved"),
            Err(e) => {
                warn!(memo_id = %memo_id, error = %e, "Autosave failed");
                self.notify(Notification::failure(
                    FailureKind::for_write(&e),
                    format!("Autosave failed: {e}"),
                ));
            }
        }
    }

    fn call_aborted(&mut self, call: CallKind) {
        self.notify(Notification::failure(
            FailureKind::Unexpected,
            "Something went wrong, please try again",
        ));
        match call {
            CallKind::ListMemos | CallKind::FetchMap => self.fail_load(),
            CallKind::CreateMemo | CallKind::GenerateMap => self.finish_generation(),
            CallKind::UpdateMap => self.autosave.finish_save(),
        }
    }

    // Plumbing

    fn request_layout(&mut self) {
        self.layout.arm(
            self.config.layout_delay,
            &self.completions_tx,
            Completion::LayoutDue,
        );
    }

    fn set_panel(&mut self, open: bool) {
        if self.panel_open != open {
            self.panel_open = open;
            self.emit(SessionEvent::PanelChanged { open });
        }
    }

    fn log_dangling_edges(&self) {
        let dangling = self.graph.dangling_edges().count();
        if dangling > 0 {
            debug!(dangling, "Edges reference missing nodes");
        }
    }

    fn notify(&self, notification: Notification) {
        self.emit(SessionEvent::Notification(notification));
    }

    fn emit(&self, event: SessionEvent) {
        // No observer is fine.
        let _ = self.events.send(event);
    }

    /// Run a backend call off the actor. The call runs in its own task so a
    /// panic still reports back as [`Completion::Aborted`].
    fn spawn_call<F>(&self, kind: CallKind, call: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let done = match tokio::spawn(call).await {
                Ok(done) => done,
                Err(e) => {
                    error!(call = ?kind, error = %e, "Backend call aborted");
                    Completion::Aborted { epoch, call: kind }
                }
            };
            let _ = tx.send(done);
        });
    }

    fn publish(&self) {
        self.view.send_replace(SessionView {
            memo: self.memo.clone(),
            nodes: self.graph.nodes().to_vec(),
            edges: self.graph.edges().to_vec(),
            revision: self.graph.revision(),
            loading: self.loading,
            loaded: self.loaded,
            processing: self.workflow.is_in_flight(),
            saving: self.autosave.is_saving(),
            panel_open: self.panel_open,
            generation: self.workflow.phase(),
            autosave: self.autosave.phase(),
        });
    }

    fn shutdown(&mut self) {
        self.epoch += 1;
        let pending_save = self.autosave.cancel();
        self.layout.cancel();
        info!(pending_save, "Session torn down");
    }
}

/// Cloneable entry point into a running session.
///
/// Mutations are queued to the controller and applied in order. Suggestion
/// queries do not touch session state and go straight to the backend.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<SessionView>,
    backend: Arc<dyn MapBackend>,
    viewport: Viewport,
}

impl SessionHandle {
    fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::Closed)
    }

    /// Create a memo from `text` and generate its map.
    pub fn submit(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(Command::Submit(text.into()))
    }

    pub fn apply_node_changes(&self, changes: Vec<NodeChange>) -> Result<(), SessionError> {
        self.send(Command::NodeChanges(changes))
    }

    pub fn apply_edge_changes(&self, changes: Vec<EdgeChange>) -> Result<(), SessionError> {
        self.send(Command::EdgeChanges(changes))
    }

    /// Insert an optional node and an edge as one transition.
    pub fn insert(&self, node: Option<GraphNode>, edge: GraphEdge) -> Result<(), SessionError> {
        self.send(Command::Insert { node, edge })
    }

    /// Append nodes and edges as one transition. Ids already present are skipped.
    pub fn merge(&self, nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Result<(), SessionError> {
        self.send(Command::Merge(ModelParts { nodes, edges }))
    }

    /// Convert a temporal suggestion and merge it.
    pub fn merge_temporal(&self, related: &TemporalRelatedNodes) -> Result<(), SessionError> {
        self.send(Command::Merge(adapter::temporal_to_model(
            related,
            self.viewport,
        )))
    }

    pub fn set_panel_open(&self, open: bool) -> Result<(), SessionError> {
        self.send(Command::SetPanel(open))
    }

    /// Drop in-flight work and load the most recent memo again.
    pub fn reload(&self) -> Result<(), SessionError> {
        self.send(Command::Reload)
    }

    /// Stop the session. A pending autosave is discarded.
    pub fn teardown(&self) -> Result<(), SessionError> {
        self.send(Command::Teardown)
    }

    /// Latest published snapshot.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Wait for the next snapshot.
    pub async fn changed(&mut self) -> Result<SessionView, SessionError> {
        self.view.changed().await.map_err(|_| SessionError::Closed)?;
        Ok(self.view.borrow_and_update().clone())
    }

    pub async fn suggest_related(&self, label: &str) -> Result<Vec<SuggestedNode>, SessionError> {
        let suggestions = self.backend.suggest_related_nodes(label).await?;
        debug!(label, count = suggestions.len(), "Related nodes suggested");
        Ok(suggestions)
    }

    /// Insert an accepted suggestion next to the node `anchor_id`.
    pub fn accept_related(
        &self,
        anchor_id: &str,
        suggestion: &SuggestedNode,
    ) -> Result<(), SessionError> {
        let view = self.view();
        let anchor = view
            .nodes
            .iter()
            .find(|n| n.id == anchor_id)
            .ok_or_else(|| SessionError::UnknownNode(anchor_id.to_string()))?;
        match suggest::accept_suggestion(&view.nodes, &view.edges, anchor, suggestion) {
            Some(insertion) => self.insert(insertion.node, insertion.edge),
            None => {
                debug!(anchor_id, label = %suggestion.label, "Suggestion already on the map");
                Ok(())
            }
        }
    }

    /// Query the sub-graph temporally related to the node `node_id`.
    pub async fn suggest_temporal(&self, node_id: &str) -> Result<TemporalRelatedNodes, SessionError> {
        let query = {
            let view = self.view.borrow();
            let node = view
                .nodes
                .iter()
                .find(|n| n.id == node_id)
                .ok_or_else(|| SessionError::UnknownNode(node_id.to_string()))?;
            suggest::temporal_query(node)
        };
        let related = self.backend.suggest_temporal_related_nodes(&query).await?;
        debug!(
            node_id,
            nodes = related.nodes.len(),
            edges = related.edges.len(),
            "Temporal relations suggested"
        );
        Ok(related)
    }
}
