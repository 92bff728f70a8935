//! The materialized view graph.
//!
//! An arena of entities (`StableDiGraph`) plus id indices. Cross-references
//! between edges and nodes go through ids only; arena indices never leak out
//! of this module, so equality and undo are independent of where entities
//! were re-inserted.

use crate::error::{ViewError, ViewResult};
use crate::id::EntityId;
use crate::model::{Edge, EntityKind, Node};
use petgraph::Direction;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct ViewGraph {
    graph: StableDiGraph<Node, Edge>,
    node_index: HashMap<EntityId, NodeIndex>,
    edge_index: HashMap<EntityId, EdgeIndex>,
}

impl ViewGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.node_index.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_index.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.kind_of(id).is_some()
    }

    pub fn contains_node(&self, id: EntityId) -> bool {
        self.node_index.contains_key(&id)
    }

    pub fn contains_edge(&self, id: EntityId) -> bool {
        self.edge_index.contains_key(&id)
    }

    pub fn kind_of(&self, id: EntityId) -> Option<EntityKind> {
        if self.node_index.contains_key(&id) {
            Some(EntityKind::Node)
        } else if self.edge_index.contains_key(&id) {
            Some(EntityKind::Edge)
        } else {
            None
        }
    }

    pub fn node(&self, id: EntityId) -> Option<&Node> {
        self.node_index
            .get(&id)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    pub fn edge(&self, id: EntityId) -> Option<&Edge> {
        self.edge_index
            .get(&id)
            .and_then(|&idx| self.graph.edge_weight(idx))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.node_index
            .values()
            .filter_map(|&idx| self.graph.node_weight(idx))
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edge_index
            .values()
            .filter_map(|&idx| self.graph.edge_weight(idx))
    }

    /// Node ids in stable (string) order.
    pub fn node_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.node_index.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Edge ids in stable (string) order.
    pub fn edge_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.edge_index.keys().copied().collect();
        ids.sort();
        ids
    }

    /// `(src, dst)` pairs for every edge, in stable edge-id order.
    pub fn edge_endpoints(&self) -> Vec<(EntityId, EntityId)> {
        self.edge_ids()
            .into_iter()
            .filter_map(|id| self.edge(id).map(|e| (e.src, e.dst)))
            .collect()
    }

    /// Insert a node. Returns `false` (and leaves the existing node untouched)
    /// if the id is already present.
    pub fn insert_node(&mut self, node: Node) -> bool {
        if self.node_index.contains_key(&node.id) {
            return false;
        }
        let id = node.id;
        let idx = self.graph.add_node(node);
        self.node_index.insert(id, idx);
        true
    }

    /// Insert an edge between two nodes already in the view. Returns
    /// `Ok(false)` if the edge id is already present.
    pub fn insert_edge(&mut self, edge: Edge) -> ViewResult<bool> {
        if self.edge_index.contains_key(&edge.id) {
            return Ok(false);
        }
        let src = self.endpoint(&edge, edge.src)?;
        let dst = self.endpoint(&edge, edge.dst)?;
        let id = edge.id;
        let idx = self.graph.add_edge(src, dst, edge);
        self.edge_index.insert(id, idx);
        Ok(true)
    }

    fn endpoint(&self, edge: &Edge, node: EntityId) -> ViewResult<NodeIndex> {
        self.node_index
            .get(&node)
            .copied()
            .ok_or(ViewError::MissingEndpoint {
                edge: edge.id,
                node,
            })
    }

    /// Remove a node together with every incident edge. The removed edges
    /// are returned so the caller can restore them as one unit.
    pub fn remove_node(&mut self, id: EntityId) -> Option<(Node, Vec<Edge>)> {
        let idx = self.node_index.remove(&id)?;
        let mut removed = Vec::new();
        for edge_id in self.incident_edges_at(idx) {
            if let Some(edge) = self.remove_edge(edge_id) {
                removed.push(edge);
            }
        }
        let node = self.graph.remove_node(idx)?;
        Some((node, removed))
    }

    pub fn remove_edge(&mut self, id: EntityId) -> Option<Edge> {
        let idx = self.edge_index.remove(&id)?;
        self.graph.remove_edge(idx)
    }

    /// Ids of edges touching `id` in either direction, in stable order.
    pub fn incident_edges(&self, id: EntityId) -> Vec<EntityId> {
        match self.node_index.get(&id) {
            Some(&idx) => self.incident_edges_at(idx),
            None => Vec::new(),
        }
    }

    fn incident_edges_at(&self, idx: NodeIndex) -> Vec<EntityId> {
        let ids: BTreeSet<EntityId> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.graph.edges_directed(idx, Direction::Incoming))
            .map(|e| e.weight().id)
            .collect();
        ids.into_iter().collect()
    }

    /// Distinct neighbours of `id`, ignoring edge direction.
    pub fn neighbours(&self, id: EntityId) -> Vec<EntityId> {
        let Some(&idx) = self.node_index.get(&id) else {
            return Vec::new();
        };
        let ids: BTreeSet<EntityId> = self
            .graph
            .neighbors_undirected(idx)
            .filter_map(|n| self.graph.node_weight(n))
            .map(|n| n.id)
            .filter(|&n| n != id)
            .collect();
        ids.into_iter().collect()
    }

    pub fn degree(&self, id: EntityId) -> usize {
        self.incident_edges(id).len()
    }
}

impl PartialEq for ViewGraph {
    fn eq(&self, other: &Self) -> bool {
        self.node_index.len() == other.node_index.len()
            && self.edge_index.len() == other.edge_index.len()
            && self
                .node_index
                .keys()
                .all(|&id| self.node(id) == other.node(id))
            && self
                .edge_index
                .keys()
                .all(|&id| self.edge(id) == other.edge(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Properties;

    fn triangle() -> ViewGraph {
        let mut g = ViewGraph::new();
        for name in ["Ben", "Hamza", "Pedro"] {
            g.insert_node(Node::new(name).with_type("Person"));
        }
        for (s, d) in [("Ben", "Hamza"), ("Ben", "Pedro"), ("Hamza", "Pedro")] {
            let edge = Edge::new(s, d).with_event(1, "meets", Properties::new());
            g.insert_edge(edge).unwrap();
        }
        g
    }

    #[test]
    fn reinsert_is_noop() {
        let mut g = triangle();
        let pedro = Node::new("Pedro").with_property("age", 99);
        assert!(!g.insert_node(pedro));
        // Original payload kept
        assert!(g.node(EntityId::intern("Pedro")).unwrap().properties.is_empty());
        assert!(!g.insert_edge(Edge::new("Ben", "Hamza")).unwrap());
        assert_eq!(g.edge_count(), 3);
    }

    #[test]
    fn edge_requires_endpoints() {
        let mut g = triangle();
        let err = g.insert_edge(Edge::new("Ben", "Pometry")).unwrap_err();
        assert_eq!(
            err,
            ViewError::MissingEndpoint {
                edge: EntityId::intern("Ben->Pometry"),
                node: EntityId::intern("Pometry"),
            }
        );
    }

    #[test]
    fn removing_node_cascades_to_incident_edges() {
        let mut g = triangle();
        let (node, edges) = g.remove_node(EntityId::intern("Pedro")).unwrap();
        assert_eq!(node.id.as_str(), "Pedro");
        let ids: Vec<&str> = edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["Ben->Pedro", "Hamza->Pedro"]);
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 1);
        assert!(g.contains_edge(EntityId::intern("Ben->Hamza")));
    }

    #[test]
    fn equality_ignores_arena_positions() {
        let original = triangle();
        let mut g = triangle();
        let (node, edges) = g.remove_node(EntityId::intern("Ben")).unwrap();
        assert_ne!(g, original);

        g.insert_node(node);
        for e in edges {
            g.insert_edge(e).unwrap();
        }
        assert_eq!(g, original);
    }

    #[test]
    fn neighbours_ignore_direction() {
        let g = triangle();
        let n_set = g.neighbours(EntityId::intern("Hamza"));
        let n: Vec<&str> = n_set
            .iter()
            .map(|id| id.as_str())
            .collect();
        assert_eq!(n, vec!["Ben", "Pedro"]);
    }
}
