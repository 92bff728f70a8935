use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt::{self, Write as _};
use std::sync::LazyLock;

use crate::model::Timestamp;

/// Global string interner for entity IDs — fast comparisons, low memory.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// A lightweight, interned identifier for nodes and edges in the view graph.
/// Internally a `Spur` index — 4 bytes, Copy, Eq, Hash in O(1).
///
/// Ordering compares the underlying strings so that sorted output is stable
/// across runs, independent of interning order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(Spur);

impl EntityId {
    /// Intern a new string as an EntityId, or return existing if already interned.
    pub fn intern(s: &str) -> Self {
        EntityId(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Derive the id of an edge from its endpoints.
    ///
    /// `layer` and `time` narrow the identity to a single layer or a single
    /// event; edges aggregated over every layer between a pair use neither.
    pub fn edge(src: EntityId, dst: EntityId, layer: Option<&str>, time: Option<Timestamp>) -> Self {
        let mut key = format!("{}->{}", src.as_str(), dst.as_str());
        if let Some(layer) = layer {
            key.push('@');
            key.push_str(layer);
        }
        if let Some(time) = time {
            let _ = write!(key, "#{time}");
        }
        Self::intern(&key)
    }
}

impl PartialOrd for EntityId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntityId {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.0 == other.0 {
            return Ordering::Equal;
        }
        self.as_str().cmp(other.as_str())
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(EntityId::intern(&s))
    }
}
