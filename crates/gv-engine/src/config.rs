//! Session configuration.

use gv_core::query::DEFAULT_PAGE_SIZE;
use gv_core::{LayoutAlgorithm, PreLayout, ViewError, ViewResult, Viewport};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Undo steps kept; older ones are dropped.
    pub history_depth: usize,
    /// Search results per page.
    pub page_size: usize,
    pub layout: LayoutAlgorithm,
    pub pre_layout: Option<PreLayout>,
    /// Buffered change notifications per subscriber.
    pub notification_capacity: usize,
    pub viewport: Viewport,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_depth: 100,
            page_size: DEFAULT_PAGE_SIZE,
            layout: LayoutAlgorithm::Default,
            pre_layout: None,
            notification_capacity: 64,
            viewport: Viewport::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_json(input: &str) -> ViewResult<Self> {
        serde_json::from_str(input).map_err(|e| ViewError::Parse(format!("config: {e}")))
    }

    pub fn load(path: &Path) -> ViewResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ViewError::Persistence(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }
}
