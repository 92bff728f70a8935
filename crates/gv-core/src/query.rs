//! Query-builder filters: conditions, date ranges and search targets.
//!
//! Conditions can be built directly or parsed from the textual form the
//! query builder displays, e.g. `ID Includes "Pe"` or `age Is 28`.

use crate::error::{ViewError, ViewResult};
use crate::id::EntityId;
use crate::model::{Edge, Entity, Node, PropValue, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use winnow::ascii::{space0, space1};
use winnow::combinator::{alt, delimited, separated};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

/// Results per page when a search does not ask for a specific size.
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Is,
    IsNot,
    Includes,
    Excludes,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operator::Is => "Is",
            Operator::IsNot => "Is Not",
            Operator::Includes => "Includes",
            Operator::Excludes => "Excludes",
        })
    }
}

/// What a condition looks at: the entity id or a named property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Id,
    Property(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: Field,
    pub operator: Operator,
    pub value: PropValue,
}

impl Condition {
    pub fn new(field: Field, operator: Operator, value: impl Into<PropValue>) -> Self {
        Self {
            field,
            operator,
            value: value.into(),
        }
    }

    /// Values compare by their display text, so `age Is 28` matches an
    /// integer property and a string "28" alike. A missing property never
    /// satisfies `Is`/`Includes` and always satisfies `IsNot`/`Excludes`.
    pub fn matches_node(&self, node: &Node) -> bool {
        let actual = match &self.field {
            Field::Id => Some(node.id.as_str().to_string()),
            Field::Property(name) => node.properties.get(name).map(PropValue::to_string),
        };
        let expected = self.value.to_string();
        match (self.operator, actual) {
            (Operator::Is, Some(a)) => a == expected,
            (Operator::IsNot, Some(a)) => a != expected,
            (Operator::Includes, Some(a)) => a.contains(&expected),
            (Operator::Excludes, Some(a)) => !a.contains(&expected),
            (Operator::Is | Operator::Includes, None) => false,
            (Operator::IsNot | Operator::Excludes, None) => true,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Field::Id => f.write_str("ID")?,
            Field::Property(name) => f.write_str(name)?,
        }
        match &self.value {
            PropValue::Str(s) => write!(f, " {} \"{s}\"", self.operator),
            other => write!(f, " {} {other}", self.operator),
        }
    }
}

/// Inclusive time window. An entity matches when its activity window
/// overlaps the range; entities without timestamps only match an unbounded
/// range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Timestamp>,
}

impl DateRange {
    pub fn between(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn overlaps(&self, earliest: Option<Timestamp>, latest: Option<Timestamp>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let (Some(earliest), Some(latest)) = (earliest, latest) else {
            return false;
        };
        self.start.is_none_or(|s| latest >= s) && self.end.is_none_or(|e| earliest <= e)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum SearchTarget {
    Nodes {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_type: Option<String>,
        #[serde(default)]
        conditions: Vec<Condition>,
    },
    Edges {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        src: Option<EntityId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dst: Option<EntityId>,
        /// Any of these layers; empty means every layer.
        #[serde(default)]
        layers: Vec<String>,
    },
}

/// A paginated search request as sent to the graph service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub graph: String,
    pub target: SearchTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub page: usize,
    pub page_size: usize,
}

impl FilterSpec {
    pub fn nodes(graph: &str, node_type: Option<&str>, conditions: Vec<Condition>) -> Self {
        Self {
            graph: graph.to_string(),
            target: SearchTarget::Nodes {
                node_type: node_type.map(str::to_string),
                conditions,
            },
            date_range: None,
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn edges(graph: &str, src: Option<&str>, dst: Option<&str>, layers: &[&str]) -> Self {
        Self {
            graph: graph.to_string(),
            target: SearchTarget::Edges {
                src: src.map(EntityId::intern),
                dst: dst.map(EntityId::intern),
                layers: layers.iter().map(|l| l.to_string()).collect(),
            },
            date_range: None,
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn at_page(&self, page: usize) -> Self {
        Self { page, ..self.clone() }
    }

    pub fn matches_node(&self, node: &Node) -> bool {
        let SearchTarget::Nodes { node_type, conditions } = &self.target else {
            return false;
        };
        node_type
            .as_deref()
            .is_none_or(|t| node.node_type.as_deref() == Some(t))
            && conditions.iter().all(|c| c.matches_node(node))
            && self
                .date_range
                .is_none_or(|r| r.overlaps(node.earliest, node.latest))
    }

    pub fn matches_edge(&self, edge: &Edge) -> bool {
        let SearchTarget::Edges { src, dst, layers } = &self.target else {
            return false;
        };
        src.is_none_or(|s| edge.src == s)
            && dst.is_none_or(|d| edge.dst == d)
            && (layers.is_empty() || edge.layers.iter().any(|l| layers.contains(l)))
            && self
                .date_range
                .is_none_or(|r| r.overlaps(edge.earliest, edge.latest))
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        match entity {
            Entity::Node(n) => self.matches_node(n),
            Entity::Edge(e) => self.matches_edge(e),
        }
    }
}

/// Number of pages needed for `total` items; zero when there are none.
pub fn total_pages(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

/// The `page`-th slice of `items` (zero-based) and the page count.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> (Vec<T>, usize) {
    let pages = total_pages(items.len(), page_size);
    let start = page.saturating_mul(page_size).min(items.len());
    let end = start.saturating_add(page_size).min(items.len());
    (items[start..end].to_vec(), pages)
}

// ─── Textual conditions ──────────────────────────────────────────────────

/// Parse a single condition such as `ID Includes "Pe"`.
pub fn parse_condition(input: &str) -> ViewResult<Condition> {
    let mut rest = input.trim();
    let condition = condition
        .parse_next(&mut rest)
        .map_err(|e| ViewError::Parse(format!("condition `{input}`: {e}")))?;
    if !rest.trim().is_empty() {
        return Err(ViewError::Parse(format!("trailing input after condition: `{rest}`")));
    }
    Ok(condition)
}

/// Parse conditions joined by `AND`.
pub fn parse_conditions(input: &str) -> ViewResult<Vec<Condition>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut rest = input.trim();
    let conditions: Vec<Condition> = separated(1.., condition, (space1, "AND", space1))
        .parse_next(&mut rest)
        .map_err(|e: winnow::error::ErrMode<ContextError>| ViewError::Parse(format!("conditions `{input}`: {e}")))?;
    if !rest.trim().is_empty() {
        return Err(ViewError::Parse(format!("trailing input after conditions: `{rest}`")));
    }
    Ok(conditions)
}

fn condition(input: &mut &str) -> ModalResult<Condition> {
    let field = field.parse_next(input)?;
    let _ = space1.parse_next(input)?;
    let operator = operator.parse_next(input)?;
    let _ = space0.parse_next(input)?;
    let value = value.parse_next(input)?;
    Ok(Condition {
        field,
        operator,
        value,
    })
}

fn field(input: &mut &str) -> ModalResult<Field> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_' || c == '-')
        .map(|name: &str| {
            if name.eq_ignore_ascii_case("id") {
                Field::Id
            } else {
                Field::Property(name.to_string())
            }
        })
        .parse_next(input)
}

fn operator(input: &mut &str) -> ModalResult<Operator> {
    alt((
        ("Is", space1, "Not").value(Operator::IsNot),
        "IsNot".value(Operator::IsNot),
        "Is".value(Operator::Is),
        "Includes".value(Operator::Includes),
        "Excludes".value(Operator::Excludes),
    ))
    .parse_next(input)
}

fn value(input: &mut &str) -> ModalResult<PropValue> {
    alt((
        delimited('"', take_till(0.., '"'), '"').map(PropValue::from),
        take_while(1.., |c: char| !c.is_whitespace()).map(bare_value),
    ))
    .parse_next(input)
}

fn bare_value(token: &str) -> PropValue {
    if let Ok(i) = token.parse::<i64>() {
        PropValue::Int(i)
    } else if let Ok(x) = token.parse::<f64>() {
        PropValue::Float(x)
    } else if let Ok(b) = token.parse::<bool>() {
        PropValue::Bool(b)
    } else {
        PropValue::from(token)
    }
}
