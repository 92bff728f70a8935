//! Integration tests: command history driven through an exploration session.
//!
//! Every intent pushes at most one command; undoing all of them walks the
//! view back through each intermediate state to where it started.

use gv_core::{Color, EntityId, EntityStyle, StyleKey, ViewError};
use gv_engine::{ExplorerSession, InMemoryGraphService, SelectionMode, SessionConfig, TemporalGraph, ViewState};
use pretty_assertions::assert_eq;

fn service() -> InMemoryGraphService {
    let graph = TemporalGraph::from_json(include_str!("fixtures/event.json")).unwrap();
    InMemoryGraphService::new().with_graph("event", graph)
}

fn session_with(config: SessionConfig) -> ExplorerSession<InMemoryGraphService> {
    ExplorerSession::new(service(), "event", config)
}

fn session() -> ExplorerSession<InMemoryGraphService> {
    session_with(SessionConfig::default())
}

fn id(s: &str) -> EntityId {
    EntityId::intern(s)
}

fn state(s: &ExplorerSession<InMemoryGraphService>) -> ViewState {
    s.store().state().clone()
}

// ─── Undo walks back ─────────────────────────────────────────────────────

#[tokio::test]
async fn undo_n_times_returns_to_initial_state() {
    let mut s = session();
    let mut states = vec![state(&s)];

    s.expand_neighbours(id("Pedro")).await.unwrap();
    states.push(state(&s));
    s.select(&[id("Pedro")], SelectionMode::Replace);
    states.push(state(&s));
    s.toggle_pin(id("Pedro")).unwrap();
    states.push(state(&s));
    s.set_type_style(
        StyleKey::NodeType("Person".into()),
        EntityStyle::color(Color::rgb(0xFF, 0x00, 0x00)),
    );
    states.push(state(&s));
    s.expand_two_hop(id("Pedro")).await.unwrap();
    states.push(state(&s));
    s.delete_selected().unwrap();
    states.push(state(&s));

    assert_eq!(s.store().history_len(), (6, 0));

    // Positions differ between runs; equality ignores them.
    states.pop();
    while let Some(expected) = states.pop() {
        s.undo().unwrap();
        assert_eq!(state(&s), expected);
    }
    assert!(s.store().state().graph.is_empty());
    assert_eq!(s.undo().unwrap_err(), ViewError::NothingToUndo);
}

#[tokio::test]
async fn redo_reproduces_the_state_before_undo() {
    let mut s = session();
    s.expand_neighbours(id("Pedro")).await.unwrap();
    s.select(&[id("Ben")], SelectionMode::Replace);
    let before = state(&s);

    s.undo().unwrap();
    assert_eq!(s.store().redo_description(), Some("Select"));
    s.redo().unwrap();
    assert_eq!(state(&s), before);
    assert_eq!(s.redo().unwrap_err(), ViewError::NothingToRedo);
}

#[tokio::test]
async fn new_command_after_undo_clears_redo() {
    let mut s = session();
    s.expand_neighbours(id("Pedro")).await.unwrap();
    s.select(&[id("Ben")], SelectionMode::Replace);
    s.undo().unwrap();
    assert!(s.store().can_redo());

    s.select(&[id("Hamza")], SelectionMode::Replace);
    assert!(!s.store().can_redo());
    assert_eq!(s.store().history_len(), (2, 0));
}

// ─── Removal ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn removing_a_node_takes_its_edges_and_undo_restores_everything() {
    let mut s = session();
    s.expand_neighbours(id("Pedro")).await.unwrap();
    let hamza = id("Hamza");
    s.toggle_pin(hamza).unwrap();
    s.set_instance_style(id("Hamza->Pedro"), EntityStyle::default().with_size(5.0))
        .unwrap();
    let before = state(&s);
    let edges_before = before.graph.edge_count();

    s.remove(&[hamza]);
    let graph = &s.store().state().graph;
    assert!(!graph.contains_node(hamza));
    assert!(!graph.contains_edge(id("Hamza->Pedro")));
    assert!(!graph.contains_edge(id("Pedro->Hamza")));
    assert_eq!(graph.edge_count(), edges_before - 3);
    assert_eq!(s.store().history_len(), (4, 0));

    s.undo().unwrap();
    assert_eq!(state(&s), before);
    assert!(s.store().state().pinned.contains(&hamza));
    assert_eq!(
        s.store()
            .state()
            .styles
            .instance_style(id("Hamza->Pedro"))
            .and_then(|st| st.size),
        Some(5.0)
    );
}

#[tokio::test]
async fn deleting_nothing_pushes_nothing() {
    let mut s = session();
    s.expand_neighbours(id("Pedro")).await.unwrap();
    assert!(s.delete_selected().is_none());
    assert!(s.deselect_all().is_none());
    assert_eq!(s.store().history_len(), (1, 0));
}

// ─── Preview ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn committed_preview_is_one_command() {
    let mut s = session();
    s.expand_neighbours(id("Pedro")).await.unwrap();
    let person = StyleKey::NodeType("Person".into());
    let red = Color::rgb(0xFF, 0x00, 0x00);

    s.preview_style(
        gv_core::StyleTarget::Type { key: person.clone() },
        EntityStyle::color(red),
    )
    .unwrap();
    assert_eq!(s.store().resolved_style(id("Ben")).map(|r| r.color), Some(red));
    assert_eq!(s.store().history_len(), (1, 0));

    s.commit_preview().unwrap();
    assert!(s.store().preview().is_none());
    assert_eq!(s.store().history_len(), (2, 0));
    assert_eq!(s.store().state().styles.type_style(&person).and_then(|st| st.color), Some(red));

    s.undo().unwrap();
    assert!(s.store().state().styles.type_style(&person).is_none());
}

#[tokio::test]
async fn preview_of_a_removed_node_is_discarded_on_commit() {
    let mut s = session();
    s.expand_neighbours(id("Pedro")).await.unwrap();
    s.preview_style(
        gv_core::StyleTarget::Instance { id: id("Ben") },
        EntityStyle::default().with_size(30.0),
    )
    .unwrap();
    s.remove(&[id("Ben")]);
    assert_eq!(s.store().history_len(), (2, 0));

    assert!(s.commit_preview().is_none());
    assert!(s.store().preview().is_none());
    assert_eq!(s.store().history_len(), (2, 0));
    assert!(s.store().state().styles.instance_style(id("Ben")).is_none());

    // The next undo brings Ben back rather than reverting an invisible style
    s.undo().unwrap();
    assert!(s.store().state().graph.contains_node(id("Ben")));
}

// ─── Depth bound ─────────────────────────────────────────────────────────

#[tokio::test]
async fn history_is_bounded_by_config() {
    let mut s = session_with(SessionConfig {
        history_depth: 2,
        ..SessionConfig::default()
    });
    s.expand_neighbours(id("Pedro")).await.unwrap();
    s.select(&[id("Ben")], SelectionMode::Replace);
    s.select(&[id("Hamza")], SelectionMode::Add);
    assert_eq!(s.store().history_len(), (2, 0));

    s.undo().unwrap();
    s.undo().unwrap();
    // The expansion fell off the bottom of the stack
    assert!(!s.store().can_undo());
    assert!(s.store().state().graph.contains_node(id("Pedro")));
}
