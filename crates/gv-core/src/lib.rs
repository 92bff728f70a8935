pub mod error;
pub mod graph;
pub mod id;
pub mod layout;
pub mod model;
pub mod query;
pub mod saved;
pub mod style;

pub use error::{LayoutError, ViewError, ViewResult};
pub use graph::ViewGraph;
pub use id::EntityId;
pub use layout::{
    BuiltinLayouts, LayoutAlgorithm, LayoutConfig, LayoutEngine, LayoutParams, LayoutRequest, Position, Positions,
    PreLayout, Viewport,
};
pub use model::*;
pub use query::{Condition, DateRange, Field, FilterSpec, Operator, SearchTarget, parse_condition, parse_conditions};
pub use saved::SavedGraph;
pub use style::{Color, EntityStyle, PreviewStyle, ResolvedStyle, StyleKey, StyleOverrides, StyleTarget};
