//! Entity data model for the temporal property graph shown in a view.
//!
//! Nodes carry a user-facing type ("Person", "Company") and an ordered property
//! bag. Edges aggregate every timed event between an ordered pair of nodes:
//! the layers they appear in ("meets", "transfers"), the latest property
//! values, and the full event log used for edge statistics.

use crate::id::EntityId;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::fmt;

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

// ─── Property values ─────────────────────────────────────────────────────

/// A typed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Bool(b) => write!(f, "{b}"),
            PropValue::Int(i) => write!(f, "{i}"),
            PropValue::Float(x) => write!(f, "{x}"),
            PropValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Str(s.to_string())
    }
}

impl From<i64> for PropValue {
    fn from(i: i64) -> Self {
        PropValue::Int(i)
    }
}

/// Ordered property bag. Insertion order is kept for display; setting an
/// existing name replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(SmallVec<[(String, PropValue); 4]>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropValue>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Overlay `other` on top of `self` (later values win, new names append).
    pub fn merge(&mut self, other: &Properties) {
        for (k, v) in other.iter() {
            self.insert(k, v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Properties {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PropertiesVisitor;

        impl<'de> Visitor<'de> for PropertiesVisitor {
            type Value = Properties;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of property names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Properties, A::Error> {
                let mut props = Properties::new();
                while let Some((k, v)) = access.next_entry::<String, PropValue>()? {
                    props.insert(k, v);
                }
                Ok(props)
            }
        }

        deserializer.deserialize_map(PropertiesVisitor)
    }
}

// ─── Entities ────────────────────────────────────────────────────────────

/// Kind discriminator shared by selection, search results and lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Node,
    Edge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: EntityId,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<Timestamp>,
}

impl Node {
    pub fn new(id: &str) -> Self {
        Self {
            id: EntityId::intern(id),
            node_type: None,
            properties: Properties::new(),
            earliest: None,
            latest: None,
        }
    }

    pub fn with_type(mut self, node_type: &str) -> Self {
        self.node_type = Some(node_type.to_string());
        self
    }

    pub fn with_property(mut self, name: &str, value: impl Into<PropValue>) -> Self {
        self.properties.insert(name, value);
        self
    }

    /// Widen the activity window to include `time`.
    pub fn touch(&mut self, time: Timestamp) {
        self.earliest = Some(self.earliest.map_or(time, |e| e.min(time)));
        self.latest = Some(self.latest.map_or(time, |l| l.max(time)));
    }
}

/// A single timed event on an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeEvent {
    pub time: Timestamp,
    pub layer: String,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EntityId,
    pub src: EntityId,
    pub dst: EntityId,
    #[serde(default)]
    pub layers: SmallVec<[String; 2]>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<Timestamp>,
    /// Events ordered by time.
    #[serde(default)]
    pub logs: Vec<EdgeEvent>,
}

impl Edge {
    /// An edge aggregated over every layer between `src` and `dst`.
    pub fn new(src: &str, dst: &str) -> Self {
        let src = EntityId::intern(src);
        let dst = EntityId::intern(dst);
        Self {
            id: EntityId::edge(src, dst, None, None),
            src,
            dst,
            layers: SmallVec::new(),
            properties: Properties::new(),
            earliest: None,
            latest: None,
            logs: Vec::new(),
        }
    }

    /// Fold an event into the aggregate: layer set, latest properties,
    /// activity window and the time-ordered log.
    pub fn record(&mut self, event: EdgeEvent) {
        if !self.layers.iter().any(|l| *l == event.layer) {
            self.layers.push(event.layer.clone());
        }
        self.earliest = Some(self.earliest.map_or(event.time, |e| e.min(event.time)));
        self.latest = Some(self.latest.map_or(event.time, |l| l.max(event.time)));
        let pos = self.logs.partition_point(|e| e.time <= event.time);
        if pos == self.logs.len() {
            self.properties.merge(&event.properties);
        } else {
            for (k, v) in event.properties.iter() {
                if self.properties.get(k).is_none() {
                    self.properties.insert(k, v.clone());
                }
            }
        }
        self.logs.insert(pos, event);
    }

    pub fn with_event(mut self, time: Timestamp, layer: &str, properties: Properties) -> Self {
        self.record(EdgeEvent {
            time,
            layer: layer.to_string(),
            properties,
        });
        self
    }

    pub fn touches(&self, node: EntityId) -> bool {
        self.src == node || self.dst == node
    }

    /// The endpoint opposite `node`, if `node` is an endpoint at all.
    pub fn other_end(&self, node: EntityId) -> Option<EntityId> {
        if self.src == node {
            Some(self.dst)
        } else if self.dst == node {
            Some(self.src)
        } else {
            None
        }
    }

    /// Comma-separated layer names, e.g. `"meets, transfers"`.
    pub fn layer_names(&self) -> String {
        self.layers.join(", ")
    }

    pub fn logs_for<'a>(&'a self, layer: &'a str) -> impl Iterator<Item = &'a EdgeEvent> + 'a {
        self.logs.iter().filter(move |e| e.layer == layer)
    }
}

/// An owned node or edge, as returned by the query service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entity {
    Node(Node),
    Edge(Edge),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Node(n) => n.id,
            Entity::Edge(e) => e.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Node(_) => EntityKind::Node,
            Entity::Edge(_) => EntityKind::Edge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_keep_insertion_order_and_replace_in_place() {
        let mut props = Properties::new();
        props.insert("where", "London");
        props.insert("amount", 20);
        props.insert("where", "Madrid");

        let names: Vec<&str> = props.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["where", "amount"]);
        assert_eq!(props.get("where"), Some(&PropValue::from("Madrid")));
    }

    #[test]
    fn edge_aggregates_layers_and_logs() {
        let mut where_london = Properties::new();
        where_london.insert("where", "London");
        let mut amount = Properties::new();
        amount.insert("amount", 20);

        let edge = Edge::new("Hamza", "Pedro")
            .with_event(1705017600000, "transfers", amount)
            .with_event(1689734400000, "meets", where_london);

        assert_eq!(edge.layer_names(), "transfers, meets");
        assert_eq!(edge.earliest, Some(1689734400000));
        assert_eq!(edge.latest, Some(1705017600000));
        // Log is time ordered regardless of insertion order
        assert_eq!(edge.logs[0].layer, "meets");
        // Latest event's properties win; older ones only fill gaps
        assert_eq!(edge.properties.get("amount"), Some(&PropValue::Int(20)));
        assert_eq!(edge.properties.get("where"), Some(&PropValue::from("London")));
        assert_eq!(edge.logs_for("meets").count(), 1);
    }

    #[test]
    fn node_json_shape() {
        let node = Node::new("Pedro").with_type("Person").with_property("age", 28);
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(json, r#"{"id":"Pedro","type":"Person","properties":{"age":28}}"#);

        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}
