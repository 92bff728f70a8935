//! An in-memory temporal graph built from timed updates.
//!
//! This is the backing store of [`crate::service::InMemoryGraphService`]:
//! nodes and edges accumulate events over time, and neighbourhoods are
//! walked over a `DiGraphMap` of ids ignoring direction.

use gv_core::{Edge, EdgeEvent, EntityId, Node, Properties, Timestamp, ViewError, ViewResult};
use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// Layer used for edge updates that do not name one.
pub const DEFAULT_LAYER: &str = "_default";

/// One timed update, as found in graph fixture files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum GraphUpdate {
    Edge {
        time: Timestamp,
        src: String,
        dst: String,
        #[serde(default)]
        layer: Option<String>,
        #[serde(default)]
        properties: Properties,
    },
    Node {
        time: Timestamp,
        id: String,
        #[serde(default, rename = "type")]
        node_type: Option<String>,
        #[serde(default)]
        properties: Properties,
    },
}

#[derive(Debug, Clone, Default)]
pub struct TemporalGraph {
    nodes: BTreeMap<EntityId, Node>,
    edges: BTreeMap<EntityId, Edge>,
    topology: DiGraphMap<EntityId, EntityId>,
}

impl TemporalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_updates(updates: impl IntoIterator<Item = GraphUpdate>) -> Self {
        let mut graph = Self::new();
        for update in updates {
            graph.apply(update);
        }
        graph
    }

    /// Parse a JSON array of updates.
    pub fn from_json(input: &str) -> ViewResult<Self> {
        let updates: Vec<GraphUpdate> =
            serde_json::from_str(input).map_err(|e| ViewError::Parse(format!("graph updates: {e}")))?;
        Ok(Self::from_updates(updates))
    }

    pub fn apply(&mut self, update: GraphUpdate) {
        match update {
            GraphUpdate::Node {
                time,
                id,
                node_type,
                properties,
            } => self.add_node(time, &id, node_type.as_deref(), properties),
            GraphUpdate::Edge {
                time,
                src,
                dst,
                layer,
                properties,
            } => self.add_edge(time, &src, &dst, layer.as_deref(), properties),
        }
    }

    /// Record a node update. A type, once set, is kept; properties merge.
    pub fn add_node(&mut self, time: Timestamp, id: &str, node_type: Option<&str>, properties: Properties) {
        let node = self.node_entry(id);
        node.touch(time);
        if node.node_type.is_none() {
            node.node_type = node_type.map(str::to_string);
        }
        node.properties.merge(&properties);
    }

    /// Record an edge event, creating missing endpoints.
    pub fn add_edge(&mut self, time: Timestamp, src: &str, dst: &str, layer: Option<&str>, properties: Properties) {
        self.node_entry(src).touch(time);
        self.node_entry(dst).touch(time);

        let (s, d) = (EntityId::intern(src), EntityId::intern(dst));
        let id = EntityId::edge(s, d, None, None);
        self.edges
            .entry(id)
            .or_insert_with(|| Edge::new(src, dst))
            .record(EdgeEvent {
                time,
                layer: layer.unwrap_or(DEFAULT_LAYER).to_string(),
                properties,
            });
        self.topology.add_edge(s, d, id);
    }

    fn node_entry(&mut self, id: &str) -> &mut Node {
        let key = EntityId::intern(id);
        self.topology.add_node(key);
        self.nodes.entry(key).or_insert_with(|| Node::new(id))
    }

    pub fn node(&self, id: EntityId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn edge(&self, id: EntityId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Every node within `hops` of `center` ignoring direction, `center`
    /// included, in id order.
    pub fn reachable(&self, center: EntityId, hops: usize) -> BTreeSet<EntityId> {
        let mut seen = BTreeSet::new();
        if !self.topology.contains_node(center) {
            return seen;
        }
        seen.insert(center);
        let mut frontier = vec![center];
        for _ in 0..hops {
            let mut next = Vec::new();
            for n in frontier {
                let around = self
                    .topology
                    .neighbors_directed(n, Direction::Outgoing)
                    .chain(self.topology.neighbors_directed(n, Direction::Incoming));
                for m in around {
                    if seen.insert(m) {
                        next.push(m);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        seen
    }

    /// Edges with both endpoints in `nodes`, in id order.
    pub fn edges_among(&self, nodes: &BTreeSet<EntityId>) -> Vec<&Edge> {
        self.edges
            .values()
            .filter(|e| nodes.contains(&e.src) && nodes.contains(&e.dst))
            .collect()
    }
}
