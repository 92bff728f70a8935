//! Selection set: the ids the user has picked, partitioned by kind.

use gv_core::{EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Plain click replaces the selection; shift-click adds to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Replace,
    Add,
}

/// Selected ids, kept in pick order per kind. Equality ignores order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionSet {
    nodes: SmallVec<[EntityId; 8]>,
    edges: SmallVec<[EntityId; 4]>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[EntityId] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EntityId] {
        &self.edges
    }

    /// Every selected id, nodes first.
    pub fn ids(&self) -> Vec<EntityId> {
        self.nodes.iter().chain(self.edges.iter()).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.nodes.contains(&id) || self.edges.contains(&id)
    }

    pub fn kind_of(&self, id: EntityId) -> Option<EntityKind> {
        if self.nodes.contains(&id) {
            Some(EntityKind::Node)
        } else if self.edges.contains(&id) {
            Some(EntityKind::Edge)
        } else {
            None
        }
    }

    /// Add `id` under `kind`. Returns `false` if it was already selected.
    pub fn insert(&mut self, id: EntityId, kind: EntityKind) -> bool {
        if self.contains(id) {
            return false;
        }
        match kind {
            EntityKind::Node => self.nodes.push(id),
            EntityKind::Edge => self.edges.push(id),
        }
        true
    }

    pub fn remove(&mut self, id: EntityId) -> bool {
        let before = self.len();
        self.nodes.retain(|n| *n != id);
        self.edges.retain(|e| *e != id);
        self.len() != before
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }
}

impl PartialEq for SelectionSet {
    fn eq(&self, other: &Self) -> bool {
        self.nodes.len() == other.nodes.len()
            && self.edges.len() == other.edges.len()
            && self.nodes.iter().all(|n| other.nodes.contains(n))
            && self.edges.iter().all(|e| other.edges.contains(e))
    }
}
