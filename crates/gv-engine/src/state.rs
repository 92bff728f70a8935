//! The mutable view model and the mutations that change it.
//!
//! `ViewState` is the single source of truth for what the render layer
//! shows: the materialized graph, the selection, pinned nodes, committed
//! style overrides and the last known node positions. Every change goes
//! through [`ViewState::apply_mutation`]; the command stack in
//! [`crate::commands`] wraps mutations with their inverses.

use crate::selection::{SelectionMode, SelectionSet};
use gv_core::{Edge, EntityId, EntityKind, EntityStyle, Node, Position, Positions, StyleKey, StyleOverrides, ViewGraph};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub graph: ViewGraph,
    pub selection: SelectionSet,
    pub pinned: BTreeSet<EntityId>,
    pub styles: StyleOverrides,
    /// Last known position per node. Not part of equality.
    pub positions: Positions,
}

/// Equality covers everything undo must restore. Positions are excluded.
impl PartialEq for ViewState {
    fn eq(&self, other: &Self) -> bool {
        self.graph == other.graph
            && self.selection == other.selection
            && self.pinned == other.pinned
            && self.styles == other.styles
    }
}

/// Everything a removal took out of the view, enough to put it back as it was.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemovedEntities {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub selected: Vec<(EntityId, EntityKind)>,
    pub pinned: Vec<EntityId>,
    pub instance_styles: Vec<(EntityId, EntityStyle)>,
    /// Positions of pinned nodes only; unpinned nodes are re-laid out.
    pub positions: Vec<(EntityId, Position)>,
}

impl RemovedEntities {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.nodes
            .iter()
            .map(|n| n.id)
            .chain(self.edges.iter().map(|e| e.id))
            .collect()
    }
}

/// A change to the view state.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Materialize entities. Ids already present are left untouched.
    AddEntities { nodes: Vec<Node>, edges: Vec<Edge> },
    /// Remove entities; removing a node also removes its incident edges.
    RemoveEntities { ids: Vec<EntityId> },
    /// Put back a removal with its selection, pins, styles and pinned positions.
    RestoreEntities(Box<RemovedEntities>),
    SetSelection { ids: Vec<EntityId>, mode: SelectionMode },
    TogglePin { id: EntityId },
    SetInstanceStyle { id: EntityId, style: EntityStyle },
    ClearInstanceStyle { id: EntityId },
    SetTypeStyle { key: StyleKey, style: EntityStyle },
    ClearTypeStyle { key: StyleKey },
    /// Several mutations applied in order as one step.
    Batch(Vec<Mutation>),
}

impl Mutation {
    /// Whether applying this mutation changes which entities are in the view.
    pub fn changes_topology(&self) -> bool {
        match self {
            Mutation::AddEntities { .. } | Mutation::RemoveEntities { .. } | Mutation::RestoreEntities(_) => true,
            Mutation::Batch(steps) => steps.iter().any(Mutation::changes_topology),
            _ => false,
        }
    }

    pub fn is_empty_batch(&self) -> bool {
        matches!(self, Mutation::Batch(steps) if steps.is_empty())
    }
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one mutation. Mutations referencing unknown ids skip those ids.
    pub fn apply_mutation(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::AddEntities { nodes, edges } => self.add_entities(nodes, edges),
            Mutation::RemoveEntities { ids } => {
                self.take_entities(&ids);
            }
            Mutation::RestoreEntities(removed) => self.restore_entities(*removed),
            Mutation::SetSelection { ids, mode } => self.set_selection(&ids, mode),
            Mutation::TogglePin { id } => {
                if !self.graph.contains_node(id) {
                    log::debug!("ignoring pin toggle for non-node {id}");
                } else if !self.pinned.remove(&id) {
                    self.pinned.insert(id);
                }
            }
            Mutation::SetInstanceStyle { id, style } => {
                if self.graph.contains(id) {
                    self.styles.set_instance_style(id, Some(style));
                }
            }
            Mutation::ClearInstanceStyle { id } => {
                self.styles.set_instance_style(id, None);
            }
            Mutation::SetTypeStyle { key, style } => {
                self.styles.set_type_style(&key, Some(style));
            }
            Mutation::ClearTypeStyle { key } => {
                self.styles.set_type_style(&key, None);
            }
            Mutation::Batch(steps) => {
                for step in steps {
                    self.apply_mutation(step);
                }
            }
        }
    }

    fn add_entities(&mut self, nodes: Vec<Node>, edges: Vec<Edge>) {
        for node in nodes {
            self.graph.insert_node(node);
        }
        for edge in edges {
            if let Err(err) = self.graph.insert_edge(edge) {
                log::warn!("skipping edge: {err}");
            }
        }
    }

    /// Remove `ids` (cascading to incident edges) and return what was removed.
    pub(crate) fn take_entities(&mut self, ids: &[EntityId]) -> RemovedEntities {
        let mut removed = RemovedEntities::default();
        for &id in ids {
            if self.graph.contains_node(id) {
                self.capture_side_state(id, EntityKind::Node, &mut removed);
                if let Some((node, edges)) = self.graph.remove_node(id) {
                    for edge in &edges {
                        self.capture_side_state(edge.id, EntityKind::Edge, &mut removed);
                    }
                    removed.nodes.push(node);
                    removed.edges.extend(edges);
                }
            } else if self.graph.contains_edge(id) {
                self.capture_side_state(id, EntityKind::Edge, &mut removed);
                if let Some(edge) = self.graph.remove_edge(id) {
                    removed.edges.push(edge);
                }
            } else {
                log::trace!("remove: {id} not in view");
            }
        }
        removed
    }

    fn capture_side_state(&mut self, id: EntityId, kind: EntityKind, removed: &mut RemovedEntities) {
        if self.selection.remove(id) {
            removed.selected.push((id, kind));
        }
        if let Some(style) = self.styles.set_instance_style(id, None) {
            removed.instance_styles.push((id, style));
        }
        let position = self.positions.remove(&id);
        if self.pinned.remove(&id) {
            removed.pinned.push(id);
            if let Some(p) = position {
                removed.positions.push((id, p));
            }
        }
    }

    fn restore_entities(&mut self, removed: RemovedEntities) {
        self.add_entities(removed.nodes, removed.edges);
        for (id, kind) in removed.selected {
            self.selection.insert(id, kind);
        }
        self.pinned.extend(removed.pinned);
        for (id, style) in removed.instance_styles {
            self.styles.set_instance_style(id, Some(style));
        }
        self.positions.extend(removed.positions);
    }

    fn set_selection(&mut self, ids: &[EntityId], mode: SelectionMode) {
        if mode == SelectionMode::Replace {
            self.selection.clear();
        }
        for &id in ids {
            match self.graph.kind_of(id) {
                Some(kind) => {
                    self.selection.insert(id, kind);
                }
                None => log::debug!("cannot select {id}: not in view"),
            }
        }
    }

    /// Ids of nodes the layout may move: unpinned nodes, plus pinned nodes
    /// that have never been placed.
    pub fn movable_nodes(&self) -> Vec<EntityId> {
        self.graph
            .node_ids()
            .into_iter()
            .filter(|id| !self.pinned.contains(id) || !self.positions.contains_key(id))
            .collect()
    }

    /// Positions of pinned nodes that have one.
    pub fn anchors(&self) -> Positions {
        self.pinned
            .iter()
            .filter_map(|id| self.positions.get(id).map(|p| (*id, *p)))
            .collect()
    }
}
