//! The graph query service the exploration adapter fetches from.

use crate::temporal::TemporalGraph;
use gv_core::query::paginate;
use gv_core::{Edge, Entity, EntityId, FilterSpec, Node, SearchTarget, ViewError, ViewResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::{self, Future};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighbourhoodRequest {
    pub graph: String,
    pub node: EntityId,
    pub hops: usize,
}

/// Nodes within the requested hops (center included) and the edges among them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Neighbourhood {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub items: Vec<Entity>,
    pub total_pages: usize,
}

/// Backend that holds the full graph. Failures surface as
/// [`ViewError::FetchFailed`].
pub trait GraphService: Send + Sync {
    fn neighbourhood(&self, request: &NeighbourhoodRequest) -> impl Future<Output = ViewResult<Neighbourhood>> + Send;

    fn search(&self, spec: &FilterSpec) -> impl Future<Output = ViewResult<SearchPage>> + Send;
}

/// A [`GraphService`] over named in-memory temporal graphs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraphService {
    graphs: HashMap<String, Arc<TemporalGraph>>,
}

impl InMemoryGraphService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(mut self, name: &str, graph: TemporalGraph) -> Self {
        self.insert(name, graph);
        self
    }

    pub fn insert(&mut self, name: &str, graph: TemporalGraph) {
        self.graphs.insert(name.to_string(), Arc::new(graph));
    }

    fn graph(&self, name: &str) -> ViewResult<&TemporalGraph> {
        self.graphs
            .get(name)
            .map(Arc::as_ref)
            .ok_or_else(|| ViewError::FetchFailed(format!("unknown graph `{name}`")))
    }

    fn neighbourhood_now(&self, request: &NeighbourhoodRequest) -> ViewResult<Neighbourhood> {
        let graph = self.graph(&request.graph)?;
        if graph.node(request.node).is_none() {
            return Err(ViewError::FetchFailed(format!(
                "node `{}` not found in `{}`",
                request.node, request.graph
            )));
        }
        let ids = graph.reachable(request.node, request.hops);
        Ok(Neighbourhood {
            nodes: ids.iter().filter_map(|id| graph.node(*id).cloned()).collect(),
            edges: graph.edges_among(&ids).into_iter().cloned().collect(),
        })
    }

    fn search_now(&self, spec: &FilterSpec) -> ViewResult<SearchPage> {
        let graph = self.graph(&spec.graph)?;
        let matches: Vec<Entity> = match spec.target {
            SearchTarget::Nodes { .. } => graph
                .nodes()
                .filter(|n| spec.matches_node(n))
                .cloned()
                .map(Entity::Node)
                .collect(),
            SearchTarget::Edges { .. } => graph
                .edges()
                .filter(|e| spec.matches_edge(e))
                .cloned()
                .map(Entity::Edge)
                .collect(),
        };
        let (items, total_pages) = paginate(&matches, spec.page, spec.page_size);
        log::trace!(
            "search {:?}: {} matches, page {}/{}",
            spec.target,
            matches.len(),
            spec.page + 1,
            total_pages
        );
        Ok(SearchPage { items, total_pages })
    }
}

impl GraphService for InMemoryGraphService {
    fn neighbourhood(&self, request: &NeighbourhoodRequest) -> impl Future<Output = ViewResult<Neighbourhood>> + Send {
        future::ready(self.neighbourhood_now(request))
    }

    fn search(&self, spec: &FilterSpec) -> impl Future<Output = ViewResult<SearchPage>> + Send {
        future::ready(self.search_now(spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gv_core::parse_condition;

    fn service() -> InMemoryGraphService {
        let graph = TemporalGraph::from_json(
            r#"[
                {"time": 1, "id": "Pedro", "type": "Person"},
                {"time": 1, "id": "Ben", "type": "Person"},
                {"time": 1, "id": "Pometry", "type": "Company"},
                {"time": 2, "src": "Ben", "dst": "Pedro", "layer": "meets"},
                {"time": 3, "src": "Ben", "dst": "Pometry", "layer": "founds"}
            ]"#,
        )
        .unwrap();
        InMemoryGraphService::new().with_graph("event", graph)
    }

    #[tokio::test]
    async fn neighbourhood_includes_center_and_edges_among() {
        let svc = service();
        let hood = svc
            .neighbourhood(&NeighbourhoodRequest {
                graph: "event".into(),
                node: EntityId::intern("Pedro"),
                hops: 1,
            })
            .await
            .unwrap();
        let names: Vec<&str> = hood.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(names, vec!["Ben", "Pedro"]);
        assert_eq!(hood.edges.len(), 1);
    }

    #[tokio::test]
    async fn unknown_graph_or_node_fails() {
        let svc = service();
        let err = svc
            .neighbourhood(&NeighbourhoodRequest {
                graph: "nope".into(),
                node: EntityId::intern("Pedro"),
                hops: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ViewError::FetchFailed(_)));

        let err = svc
            .neighbourhood(&NeighbourhoodRequest {
                graph: "event".into(),
                node: EntityId::intern("Nobody"),
                hops: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ViewError::FetchFailed(_)));
    }

    #[tokio::test]
    async fn search_paginates() {
        let svc = service();
        let mut spec = FilterSpec::nodes("event", Some("Person"), vec![]);
        spec.page_size = 1;
        let first = svc.search(&spec).await.unwrap();
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.items[0].id().as_str(), "Ben");

        let second = svc.search(&spec.at_page(1)).await.unwrap();
        assert_eq!(second.items[0].id().as_str(), "Pedro");

        let none = FilterSpec::nodes("event", None, vec![parse_condition(r#"ID Is "Zed""#).unwrap()]);
        let page = svc.search(&none).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 0);
    }
}
