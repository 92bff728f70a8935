//! Integration tests: exploration and search against the event fixture.
//!
//! The fixture graph has four people and companies linked by `meets`,
//! `founds` and `transfers` events, plus one isolated untyped node.

use gv_core::{DateRange, EntityId, ViewError, parse_condition, parse_conditions};
use gv_engine::{
    ExplorerSession, GraphService, InMemoryGraphService, Resolution, SelectionMode, SessionConfig, TemporalGraph,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::time::Duration;

fn service() -> InMemoryGraphService {
    let graph = TemporalGraph::from_json(include_str!("fixtures/event.json")).unwrap();
    InMemoryGraphService::new().with_graph("event", graph)
}

fn session() -> ExplorerSession<InMemoryGraphService> {
    ExplorerSession::new(service(), "event", SessionConfig::default())
}

fn id(s: &str) -> EntityId {
    EntityId::intern(s)
}

fn names(ids: impl IntoIterator<Item = EntityId>) -> BTreeSet<String> {
    ids.into_iter().map(|i| i.as_str().to_string()).collect()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ─── Neighbourhoods ──────────────────────────────────────────────────────

#[tokio::test]
async fn two_hop_from_pedro_is_one_command() {
    let mut s = session();
    let r = s.expand_two_hop(id("Pedro")).await.unwrap();
    assert_eq!(r, Resolution::Applied);

    let graph = &s.store().state().graph;
    assert_eq!(names(graph.node_ids()), set(&["Ben", "Hamza", "Pedro", "Pometry"]));
    assert_eq!(graph.edge_count(), 6);
    assert_eq!(s.store().history_len(), (1, 0));
    assert_eq!(s.store().undo_description(), Some("Two-hop Pedro"));
}

#[tokio::test]
async fn edges_aggregate_every_layer_between_a_pair() {
    let mut s = session();
    s.expand_neighbours(id("Hamza")).await.unwrap();
    let graph = &s.store().state().graph;
    let edge = graph.edge(id("Hamza->Pedro")).unwrap();
    assert_eq!(edge.layer_names(), "meets, transfers");
    assert_eq!(edge.logs.len(), 3);
    assert_eq!(edge.earliest, Some(1689734400000));
    assert_eq!(edge.latest, Some(1705017600000));
    assert_eq!(edge.logs_for("meets").count(), 2);
}

#[tokio::test]
async fn shared_neighbours_from_shift_selection() {
    let mut s = session();
    s.search(s.edge_filter(Some("Hamza"), Some("Pedro"), &[]))
        .await
        .unwrap();
    s.add_search_results().await.unwrap();
    assert_eq!(names(s.store().state().graph.node_ids()), set(&["Hamza", "Pedro"]));

    // Pedro, then shift-add the other endpoint of Hamza->Pedro
    s.select(&[id("Pedro")], SelectionMode::Replace);
    let other = s.store().state().graph.edge(id("Hamza->Pedro")).unwrap().other_end(id("Pedro")).unwrap();
    s.select(&[other], SelectionMode::Add);
    assert_eq!(s.store().state().selection.nodes(), &[id("Pedro"), id("Hamza")]);

    let r = s.shared_neighbours().await.unwrap();
    assert_eq!(r, Resolution::Applied);
    let graph = &s.store().state().graph;
    assert!(graph.contains_node(id("Ben")));
    assert!(graph.contains_edge(id("Ben->Hamza")));
    assert!(graph.contains_edge(id("Ben->Pedro")));
    assert!(!graph.contains_node(id("Pometry")));
}

#[tokio::test]
async fn shared_neighbours_needs_exactly_two() {
    let mut s = session();
    s.expand_neighbours(id("Pedro")).await.unwrap();
    s.select_all();
    let err = s.shared_neighbours().await.unwrap_err();
    assert_eq!(err, ViewError::InvalidSelectionSize { expected: 2, found: 3 });
    assert_eq!(s.store().history_len(), (2, 0));
}

#[tokio::test]
async fn failed_fetch_leaves_view_and_history_alone() {
    let mut s = ExplorerSession::new(service(), "unknown", SessionConfig::default());
    let err = s.expand_neighbours(id("Pedro")).await.unwrap_err();
    assert!(matches!(err, ViewError::FetchFailed(_)));
    assert!(s.store().state().graph.is_empty());
    assert!(!s.store().can_undo());

    let mut s = session();
    s.expand_neighbours(id("Pedro")).await.unwrap();
    let before = s.store().state().clone();
    let err = s.expand_neighbours(id("Nobody")).await.unwrap_err();
    assert!(matches!(err, ViewError::FetchFailed(_)));
    assert_eq!(s.store().state(), &before);
    assert_eq!(s.store().history_len(), (1, 0));
}

// ─── Select similar ──────────────────────────────────────────────────────

#[tokio::test]
async fn select_similar_selects_every_person() {
    let mut s = session();
    s.expand_neighbours(id("Pometry")).await.unwrap();
    s.select_similar(id("Ben")).await.unwrap();

    assert_eq!(names(s.store().state().selection.ids()), set(&["Ben", "Hamza", "Pedro"]));
    assert_eq!(s.store().history_len(), (2, 0));

    s.undo().unwrap();
    assert!(!s.store().state().graph.contains_node(id("Pedro")));
}

#[tokio::test]
async fn select_similar_on_untyped_node_selects_itself() {
    let mut s = session();
    let spec = s.node_filter(None, vec![parse_condition(r#"ID Is "None""#).unwrap()]);
    s.search(spec).await.unwrap();
    s.add_search_results().await.unwrap();

    s.select_similar(id("None")).await.unwrap();
    assert_eq!(s.store().state().selection.ids(), vec![id("None")]);
}

// ─── Search ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn includes_and_excludes_partition_people() {
    let svc = service();
    let mut s = session();

    let persons = svc.search(&s.node_filter(Some("Person"), vec![])).await.unwrap();
    let total = persons.items.len();
    assert_eq!(total, 3);

    s.search(s.node_filter(Some("Person"), parse_conditions(r#"ID Includes "Pe""#).unwrap()))
        .await
        .unwrap();
    let included = names(s.search_state().results.iter().map(|e| e.id()));

    s.search(s.node_filter(Some("Person"), parse_conditions(r#"ID Excludes "Pe""#).unwrap()))
        .await
        .unwrap();
    let excluded = names(s.search_state().results.iter().map(|e| e.id()));

    assert_eq!(included, set(&["Pedro"]));
    assert!(included.is_disjoint(&excluded));
    assert_eq!(included.len() + excluded.len(), total);
}

#[tokio::test]
async fn property_conditions_combine() {
    let mut s = session();
    let conditions = parse_conditions(r#"age Is 30 AND ID Is Not "Ben""#).unwrap();
    s.search(s.node_filter(Some("Person"), conditions)).await.unwrap();
    assert_eq!(names(s.search_state().results.iter().map(|e| e.id())), set(&["Hamza"]));

    s.search(s.node_filter(None, parse_conditions("age Is 28").unwrap()))
        .await
        .unwrap();
    assert_eq!(names(s.search_state().results.iter().map(|e| e.id())), set(&["Pedro"]));
}

#[tokio::test]
async fn edge_search_with_date_range() {
    let mut s = session();
    let spec = s
        .edge_filter(None, None, &[])
        .with_date_range(DateRange::between(1689000000000, 1700000000000));
    s.search(spec).await.unwrap();
    assert_eq!(
        names(s.search_state().results.iter().map(|e| e.id())),
        set(&["Ben->Hamza", "Hamza->Pedro"])
    );

    s.search(s.edge_filter(None, Some("Pometry"), &["founds"])).await.unwrap();
    assert_eq!(s.search_state().results.len(), 2);
}

#[tokio::test]
async fn search_pages_and_clear() {
    let mut s = ExplorerSession::new(
        service(),
        "event",
        SessionConfig {
            page_size: 2,
            ..SessionConfig::default()
        },
    );
    s.search(s.node_filter(None, vec![])).await.unwrap();
    assert_eq!(s.search_state().total_pages, 3);
    assert_eq!(s.search_state().results.len(), 2);

    assert_eq!(s.next_page().await.unwrap(), Resolution::Applied);
    assert_eq!(s.next_page().await.unwrap(), Resolution::Applied);
    assert_eq!(s.search_state().page, 2);
    assert_eq!(s.search_state().results.len(), 1);
    assert_eq!(s.next_page().await.unwrap(), Resolution::Unchanged);
    assert_eq!(s.prev_page().await.unwrap(), Resolution::Applied);
    assert_eq!(s.search_state().page, 1);

    s.clear_search();
    assert!(s.search_state().spec.is_none());
    assert_eq!(s.next_page().await.unwrap(), Resolution::Unchanged);
    // Searching never touches history
    assert!(!s.store().can_undo());
}

// ─── Collapse ────────────────────────────────────────────────────────────

#[tokio::test]
async fn collapse_removes_nodes_only_reachable_through_it() {
    let mut s = session();
    s.search(s.edge_filter(None, None, &["founds"])).await.unwrap();
    s.add_search_results().await.unwrap();
    // Ben->Pometry, Hamza->Pometry
    s.search(s.edge_filter(Some("Ben"), Some("Pedro"), &[])).await.unwrap();
    s.add_search_results().await.unwrap();

    s.toggle_pin(id("Hamza")).unwrap();
    assert_eq!(s.collapse(id("Pometry")).unwrap(), Resolution::Unchanged);
    assert_eq!(s.collapse(id("Ben")).unwrap(), Resolution::Applied);
    assert!(!s.store().state().graph.contains_node(id("Pedro")));
    assert!(s.store().state().graph.contains_node(id("Pometry")));

    s.undo().unwrap();
    assert!(s.store().state().graph.contains_edge(id("Ben->Pedro")));
}

// ─── Requests in flight ──────────────────────────────────────────────────

#[tokio::test]
async fn older_expansion_resolving_last_is_dropped() {
    let mut s = session();
    let older = s.begin_expand(id("Pedro"));
    let newer = tokio::spawn(s.begin_expand(id("Pometry")));
    let older = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        older.await
    });

    let newer = newer.await.unwrap();
    assert_eq!(s.resolve_fetch(newer), Ok(Resolution::Applied));
    let after_newer = names(s.store().state().graph.node_ids());
    assert_eq!(after_newer, set(&["Ben", "Hamza", "Pometry"]));

    let older = older.await.unwrap();
    assert_eq!(s.resolve_fetch(older), Ok(Resolution::Stale));
    assert_eq!(names(s.store().state().graph.node_ids()), after_newer);
    assert_eq!(s.store().history_len(), (1, 0));
    assert_eq!(s.store().undo_description(), Some("Expand Pometry"));
}

#[tokio::test]
async fn older_search_resolving_last_is_dropped() {
    let mut s = session();
    let people = s.node_filter(Some("Person"), vec![]);
    let companies = s.node_filter(Some("Company"), vec![]);
    let older = s.begin_search(people);
    let newer = s.begin_search(companies);
    let (older, newer) = tokio::join!(older, newer);

    assert_eq!(s.resolve_search(newer), Ok(Resolution::Applied));
    assert_eq!(s.resolve_search(older), Ok(Resolution::Stale));
    assert_eq!(
        names(s.search_state().results.iter().map(|e| e.id())),
        set(&["Pometry"])
    );
    assert!(s.store().state().graph.is_empty());
}
