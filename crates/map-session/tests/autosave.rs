mod common;

use std::time::Duration;

use common::*;
use kmap_core::autosave::AutosavePhase;
use kmap_core::{FailureKind, GraphEdge, GraphNode, Position, SessionView};

async fn loaded_session(backend: &std::sync::Arc<MockBackend>) -> Session {
    backend.set_memos(vec![memo("42", "Photosynthesis")]);
    backend.set_map("42", map_json(&[("n1", "Sun"), ("n2", "Leaf")], &[("n1", "n2")]));
    let session = start(backend);
    settle().await;
    assert!(session.handle.view().loaded);
    session
}

fn node(id: &str, label: &str) -> GraphNode {
    GraphNode {
        id: id.to_string(),
        position: Position::new(10.0, 10.0),
        kind: "default".to_string(),
        label: label.to_string(),
        sentence: String::new(),
        source_id: id.to_string(),
        selected: false,
        dragging: false,
    }
}

fn x_of(view: &SessionView, id: &str) -> f64 {
    view.nodes.iter().find(|n| n.id == id).unwrap().position.x
}

#[tokio::test(start_paused = true)]
async fn test_edits_within_window_coalesce_into_one_save() {
    let backend = MockBackend::new();
    let session = loaded_session(&backend).await;

    session.handle.apply_node_changes(vec![move_node("n1", 10.0, 0.0)]).unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    session.handle.apply_node_changes(vec![move_node("n1", 20.0, 0.0)]).unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    session.handle.apply_node_changes(vec![move_node("n1", 30.0, 0.0)]).unwrap();

    tokio::time::sleep(Duration::from_millis(1999)).await;
    assert!(backend.updates().is_empty());
    assert_eq!(session.handle.view().autosave, AutosavePhase::Pending);

    tokio::time::sleep(Duration::from_millis(2)).await;
    let updates = backend.updates();
    assert_eq!(updates.len(), 1);
    let (memo_id, map) = &updates[0];
    assert_eq!(memo_id, "42");
    assert_eq!(map.nodes[0].id, "n1");
    assert_eq!(map.nodes[0].position.x, 30.0);
    assert_eq!(map.edges.len(), 1);

    // Nothing else fires afterwards.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(backend.updates().len(), 1);
    assert_eq!(x_of(&session.handle.view(), "n1"), 30.0);
}

#[tokio::test(start_paused = true)]
async fn test_merge_is_one_transition_and_one_save() {
    let backend = MockBackend::new();
    let session = loaded_session(&backend).await;
    let before = session.handle.view().revision;

    session
        .handle
        .merge(
            vec![node("a", "A"), node("b", "B"), node("c", "C")],
            vec![GraphEdge::new("e1", "n1", "a"), GraphEdge::new("e2", "a", "b")],
        )
        .unwrap();
    settle().await;

    let view = session.handle.view();
    assert_eq!(view.revision, before + 1);
    assert_eq!(view.nodes.len(), 5);
    assert_eq!(view.edges.len(), 3);

    tokio::time::sleep(Duration::from_millis(2001)).await;
    let updates = backend.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].1.nodes.len(), 5);
    assert_eq!(updates[0].1.edges.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_merge_of_known_ids_changes_nothing() {
    let backend = MockBackend::new();
    let session = loaded_session(&backend).await;
    let before = session.handle.view().revision;

    session.handle.merge(vec![node("n1", "Dup")], vec![]).unwrap();
    settle().await;

    let view = session.handle.view();
    assert_eq!(view.revision, before);
    assert_eq!(view.nodes.len(), 2);
    assert_eq!(view.nodes[0].label, "Sun");

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(backend.updates().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_teardown_cancels_pending_save() {
    let backend = MockBackend::new();
    let session = loaded_session(&backend).await;

    session.handle.apply_node_changes(vec![move_node("n1", 99.0, 0.0)]).unwrap();
    tokio::time::sleep(Duration::from_millis(1000)).await;
    session.handle.teardown().unwrap();

    tokio::time::timeout(Duration::from_secs(1), session.task)
        .await
        .expect("session should stop")
        .unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(backend.updates().is_empty());
    assert!(session.handle.submit("late").is_err());
}

#[tokio::test(start_paused = true)]
async fn test_failed_save_is_reported_and_next_edit_retries() {
    let backend = MockBackend::new();
    let mut session = loaded_session(&backend).await;
    session.drain();
    backend.fail_next_update(MockFailure::Status(500));

    session.handle.apply_node_changes(vec![move_node("n2", 5.0, 5.0)]).unwrap();
    tokio::time::sleep(Duration::from_millis(2001)).await;

    let events = session.drain();
    let notes = notifications(&events);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, Some(FailureKind::WriteFailure));
    assert_eq!(backend.updates().len(), 1);
    assert!(!session.handle.view().saving);

    session.handle.apply_node_changes(vec![move_node("n2", 6.0, 6.0)]).unwrap();
    tokio::time::sleep(Duration::from_millis(2001)).await;

    let updates = backend.updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[1].1.nodes[1].position.x, 6.0);
    assert!(notifications(&session.drain()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_save_schedules_another_save() {
    let backend = MockBackend::new();
    let session = loaded_session(&backend).await;
    backend.set_latency(Duration::from_millis(1500));

    session.handle.apply_node_changes(vec![move_node("n1", 1.0, 0.0)]).unwrap();
    tokio::time::sleep(Duration::from_millis(2001)).await;
    assert!(session.handle.view().saving);

    session.handle.apply_node_changes(vec![move_node("n1", 2.0, 0.0)]).unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let updates = backend.updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[1].1.nodes[0].position.x, 2.0);
    assert!(!session.handle.view().saving);
}

#[tokio::test(start_paused = true)]
async fn test_save_in_flight_across_reload_is_dropped() {
    let backend = MockBackend::new();
    let mut session = loaded_session(&backend).await;
    session.drain();
    backend.set_latency(Duration::from_millis(1500));
    backend.fail_next_update(MockFailure::Status(500));

    session.handle.apply_node_changes(vec![move_node("n1", 1.0, 0.0)]).unwrap();
    tokio::time::sleep(Duration::from_millis(2001)).await;
    assert!(session.handle.view().saving);

    session.handle.reload().unwrap();
    settle().await;
    let view = session.handle.view();
    assert!(view.loading);
    assert!(!view.saving);

    tokio::time::sleep(Duration::from_secs(5)).await;
    let view = session.handle.view();
    assert!(view.loaded);
    assert!(!view.saving);
    assert_eq!(view.autosave, AutosavePhase::Idle);
    // The save failed after the reload, so nobody hears about it.
    assert!(notifications(&session.drain()).is_empty());
    assert_eq!(backend.updates().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_selection_change_is_persisted() {
    let backend = MockBackend::new();
    let session = loaded_session(&backend).await;

    session
        .handle
        .apply_edge_changes(vec![kmap_core::EdgeChange::Select {
            id: "en1-n2".to_string(),
            selected: true,
        }])
        .unwrap();
    tokio::time::sleep(Duration::from_millis(2001)).await;

    assert_eq!(backend.updates().len(), 1);
    assert!(session.handle.view().edges[0].selected);
}

#[tokio::test(start_paused = true)]
async fn test_no_save_without_a_memo() {
    let backend = MockBackend::new();
    let session = start(&backend);
    settle().await;

    session.handle.merge(vec![node("a", "A")], vec![]).unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(session.handle.view().nodes.len(), 1);
    assert!(backend.updates().is_empty());
}
