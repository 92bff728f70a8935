//! JSON rendering of a session's current view.

use gv_core::{EntityId, LayoutConfig, Position, ResolvedStyle, ViewError, ViewResult};
use gv_engine::{ExplorerSession, GraphService};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Report<'a> {
    graph: &'a str,
    nodes: Vec<NodeReport<'a>>,
    edges: Vec<EdgeReport>,
    selection: Vec<EntityId>,
    pinned: Vec<EntityId>,
    layout: LayoutConfig,
    generation: u64,
    history: HistoryReport<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<SearchReport>,
}

#[derive(Debug, Serialize)]
struct NodeReport<'a> {
    id: EntityId,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    node_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<Position>,
    style: Option<ResolvedStyle>,
}

#[derive(Debug, Serialize)]
struct EdgeReport {
    id: EntityId,
    src: EntityId,
    dst: EntityId,
    layers: String,
    style: Option<ResolvedStyle>,
}

#[derive(Debug, Serialize)]
struct HistoryReport<'a> {
    undo: Option<&'a str>,
    redo: Option<&'a str>,
    depth: (usize, usize),
}

#[derive(Debug, Serialize)]
struct SearchReport {
    page: usize,
    total_pages: usize,
    results: Vec<EntityId>,
}

pub fn render<S: GraphService>(session: &ExplorerSession<S>) -> ViewResult<String> {
    let store = session.store();
    let state = store.state();
    let graph = &state.graph;

    let nodes = graph
        .node_ids()
        .into_iter()
        .filter_map(|id| graph.node(id))
        .map(|node| NodeReport {
            id: node.id,
            node_type: node.node_type.as_deref(),
            position: state.positions.get(&node.id).copied(),
            style: store.resolved_style(node.id),
        })
        .collect();
    let edges = graph
        .edge_ids()
        .into_iter()
        .filter_map(|id| graph.edge(id))
        .map(|edge| EdgeReport {
            id: edge.id,
            src: edge.src,
            dst: edge.dst,
            layers: edge.layer_names(),
            style: store.resolved_style(edge.id),
        })
        .collect();

    let search = session.search_state();
    let report = Report {
        graph: session.graph_name(),
        nodes,
        edges,
        selection: state.selection.ids(),
        pinned: state.pinned.iter().copied().collect(),
        layout: store.layout().config,
        generation: store.layout().generation,
        history: HistoryReport {
            undo: store.undo_description(),
            redo: store.redo_description(),
            depth: store.history_len(),
        },
        search: search.spec.as_ref().map(|_| SearchReport {
            page: search.page,
            total_pages: search.total_pages,
            results: search.results.iter().map(|e| e.id()).collect(),
        }),
    };
    serde_json::to_string_pretty(&report).map_err(|e| ViewError::Persistence(format!("report: {e}")))
}
