//! Visual style overrides.
//!
//! Resolution order, lowest to highest precedence:
//! built-in defaults → type style (node type or edge layer) → instance style
//! → preview. The preview layer is never part of committed state; it only
//! participates in resolution while an edit is in progress.

use crate::id::EntityId;
use crate::model::{Edge, Node};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

pub const DEFAULT_NODE_SIZE: f32 = 10.0;
pub const DEFAULT_EDGE_SIZE: f32 = 1.0;
pub const DEFAULT_NODE_COLOR: Color = Color::rgb(0x5B, 0x8F, 0xF9);
pub const DEFAULT_EDGE_COLOR: Color = Color::rgb(0x99, 0x99, 0x99);

// ─── Colors ──────────────────────────────────────────────────────────────

/// RGBA color, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#RGB`, `#RRGGBB` or `#RRGGBBAA`. The `#` is optional.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let bytes = hex.as_bytes();
        let pair = |i: usize| Some(hex_val(bytes[i])? << 4 | hex_val(bytes[i + 1])?);

        match bytes.len() {
            3 => Some(Self::rgb(
                hex_val(bytes[0])? * 17,
                hex_val(bytes[1])? * 17,
                hex_val(bytes[2])? * 17,
            )),
            6 => Some(Self::rgb(pair(0)?, pair(2)?, pair(4)?)),
            8 => Some(Self {
                r: pair(0)?,
                g: pair(2)?,
                b: pair(4)?,
                a: pair(6)?,
            }),
            _ => None,
        }
    }

    /// `#RRGGBB`, or `#RRGGBBAA` when not fully opaque.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid color '{s}'")))
    }
}

// ─── Styles ──────────────────────────────────────────────────────────────

/// A partial style: unset fields fall through to the next layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
}

impl EntityStyle {
    pub fn color(color: Color) -> Self {
        Self {
            color: Some(color),
            size: None,
        }
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.size.is_none()
    }

    /// Overwrite only the fields `src` sets.
    pub fn merge(&mut self, src: &EntityStyle) {
        if src.color.is_some() {
            self.color = src.color;
        }
        if src.size.is_some() {
            self.size = src.size;
        }
    }
}

/// Fully resolved style handed to the render layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedStyle {
    pub color: Color,
    pub size: f32,
}

/// Key of a type-level style: nodes are styled by type, edges by layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum StyleKey {
    NodeType(String),
    EdgeLayer(String),
}

/// What a style edit (committed or preview) applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum StyleTarget {
    Instance { id: EntityId },
    Type { key: StyleKey },
}

/// Committed style overrides, persisted with the saved graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleOverrides {
    #[serde(default)]
    by_node_type: HashMap<String, EntityStyle>,
    #[serde(default)]
    by_edge_layer: HashMap<String, EntityStyle>,
    #[serde(default)]
    by_instance: HashMap<EntityId, EntityStyle>,
}

impl StyleOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_style(&self, key: &StyleKey) -> Option<&EntityStyle> {
        match key {
            StyleKey::NodeType(t) => self.by_node_type.get(t),
            StyleKey::EdgeLayer(l) => self.by_edge_layer.get(l),
        }
    }

    /// Set (or with `None`, clear) a type style. Returns the previous value.
    pub fn set_type_style(&mut self, key: &StyleKey, style: Option<EntityStyle>) -> Option<EntityStyle> {
        let map = match key {
            StyleKey::NodeType(_) => &mut self.by_node_type,
            StyleKey::EdgeLayer(_) => &mut self.by_edge_layer,
        };
        let name = match key {
            StyleKey::NodeType(t) | StyleKey::EdgeLayer(t) => t.clone(),
        };
        match style {
            Some(s) => map.insert(name, s),
            None => map.remove(&name),
        }
    }

    pub fn instance_style(&self, id: EntityId) -> Option<&EntityStyle> {
        self.by_instance.get(&id)
    }

    /// Set (or with `None`, clear) an instance style. Returns the previous value.
    pub fn set_instance_style(&mut self, id: EntityId, style: Option<EntityStyle>) -> Option<EntityStyle> {
        match style {
            Some(s) => self.by_instance.insert(id, s),
            None => self.by_instance.remove(&id),
        }
    }

    pub fn resolve_node(&self, node: &Node, preview: Option<&PreviewStyle>) -> ResolvedStyle {
        let mut style = EntityStyle::default();
        let type_key = node.node_type.as_ref().map(|t| StyleKey::NodeType(t.clone()));
        if let Some(key) = &type_key
            && let Some(s) = self.type_style(key)
        {
            style.merge(s);
        }
        if let Some(s) = self.by_instance.get(&node.id) {
            style.merge(s);
        }
        if let Some(p) = preview {
            p.overlay(&mut style, node.id, type_key.as_slice());
        }
        ResolvedStyle {
            color: style.color.unwrap_or(DEFAULT_NODE_COLOR),
            size: style.size.unwrap_or(DEFAULT_NODE_SIZE),
        }
    }

    /// Edges take the style of their layers in layer order (later layers win),
    /// then the instance override.
    pub fn resolve_edge(&self, edge: &Edge, preview: Option<&PreviewStyle>) -> ResolvedStyle {
        let mut style = EntityStyle::default();
        let keys: Vec<StyleKey> = edge
            .layers
            .iter()
            .map(|l| StyleKey::EdgeLayer(l.clone()))
            .collect();
        for key in &keys {
            if let Some(s) = self.type_style(key) {
                style.merge(s);
            }
        }
        if let Some(s) = self.by_instance.get(&edge.id) {
            style.merge(s);
        }
        if let Some(p) = preview {
            p.overlay(&mut style, edge.id, &keys);
        }
        ResolvedStyle {
            color: style.color.unwrap_or(DEFAULT_EDGE_COLOR),
            size: style.size.unwrap_or(DEFAULT_EDGE_SIZE),
        }
    }
}

/// An uncommitted style edit shown optimistically until saved or discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewStyle {
    pub target: StyleTarget,
    pub style: EntityStyle,
}

impl PreviewStyle {
    fn overlay(&self, style: &mut EntityStyle, id: EntityId, type_keys: &[StyleKey]) {
        let applies = match &self.target {
            StyleTarget::Instance { id: target } => *target == id,
            StyleTarget::Type { key } => type_keys.contains(key),
        };
        if applies {
            style.merge(&self.style);
        }
    }
}
