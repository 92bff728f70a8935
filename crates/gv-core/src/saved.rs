//! Saved-graph format: the seed subgraph, style overrides and layout choice.
//!
//! Positions, selection and pins are session state and are not saved.

use crate::error::{ViewError, ViewResult};
use crate::graph::ViewGraph;
use crate::layout::LayoutConfig;
use crate::model::{Edge, Node};
use crate::style::StyleOverrides;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedGraph {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub styles: StyleOverrides,
    #[serde(default)]
    pub layout: LayoutConfig,
}

impl SavedGraph {
    /// Capture a view graph in stable id order.
    pub fn capture(name: &str, graph: &ViewGraph, styles: &StyleOverrides, layout: LayoutConfig) -> Self {
        Self {
            name: name.to_string(),
            nodes: graph
                .node_ids()
                .into_iter()
                .filter_map(|id| graph.node(id).cloned())
                .collect(),
            edges: graph
                .edge_ids()
                .into_iter()
                .filter_map(|id| graph.edge(id).cloned())
                .collect(),
            styles: styles.clone(),
            layout,
        }
    }

    /// Rebuild the view graph. Fails if an edge references a node that was
    /// not saved.
    pub fn to_graph(&self) -> ViewResult<ViewGraph> {
        let mut graph = ViewGraph::new();
        for node in &self.nodes {
            graph.insert_node(node.clone());
        }
        for edge in &self.edges {
            graph.insert_edge(edge.clone())?;
        }
        Ok(graph)
    }

    pub fn to_json(&self) -> ViewResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ViewError::Persistence(e.to_string()))
    }

    pub fn from_json(input: &str) -> ViewResult<Self> {
        serde_json::from_str(input).map_err(|e| ViewError::Persistence(e.to_string()))
    }

    /// Compact MessagePack form (named fields).
    pub fn to_msgpack(&self) -> ViewResult<Vec<u8>> {
        rmp_serde::to_vec_named(self).map_err(|e| ViewError::Persistence(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> ViewResult<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| ViewError::Persistence(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::EntityId;
    use crate::layout::LayoutAlgorithm;
    use crate::model::Properties;
    use crate::style::{Color, EntityStyle, StyleKey};

    fn sample() -> SavedGraph {
        let mut graph = ViewGraph::new();
        graph.insert_node(Node::new("Ben").with_type("Person").with_property("age", 30));
        graph.insert_node(Node::new("Pometry").with_type("Company"));
        graph
            .insert_edge(Edge::new("Ben", "Pometry").with_event(1687132800000, "founds", Properties::new()))
            .unwrap();

        let mut styles = StyleOverrides::default();
        styles.set_type_style(
            &StyleKey::NodeType("Person".into()),
            Some(EntityStyle::default().with_size(20.0)),
        );
        styles.set_instance_style(
            EntityId::intern("Pometry"),
            Some(EntityStyle::color(Color::rgb(255, 0, 0))),
        );
        SavedGraph::capture("founders", &graph, &styles, LayoutConfig::for_algorithm(LayoutAlgorithm::Concentric))
    }

    #[test]
    fn json_and_msgpack_preserve_everything() {
        let saved = sample();
        let from_json = SavedGraph::from_json(&saved.to_json().unwrap()).unwrap();
        assert_eq!(from_json, saved);

        let from_mp = SavedGraph::from_msgpack(&saved.to_msgpack().unwrap()).unwrap();
        assert_eq!(from_mp, saved);
        assert_eq!(from_mp.layout.algorithm, LayoutAlgorithm::Concentric);
    }

    #[test]
    fn rebuild_graph() {
        let graph = sample().to_graph().unwrap();
        assert_eq!(graph.node_count(), 2);
        assert!(graph.contains_edge(EntityId::intern("Ben->Pometry")));
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let mut saved = sample();
        saved.nodes.retain(|n| n.id.as_str() != "Pometry");
        assert!(matches!(saved.to_graph(), Err(ViewError::MissingEndpoint { .. })));
    }

    #[test]
    fn malformed_input_is_a_persistence_error() {
        assert!(matches!(SavedGraph::from_json("{"), Err(ViewError::Persistence(_))));
    }
}
