//! The view store: state, history, preview and change notifications.
//!
//! All mutation goes through [`ViewStore::apply_command`], [`ViewStore::undo`]
//! and [`ViewStore::redo`]. Topology changes raise a layout-dirty flag that
//! the session hands to the layout orchestrator; pure selection, pin and
//! style changes do not.

use crate::commands::CommandStack;
use crate::config::SessionConfig;
use crate::state::{Mutation, ViewState};
use gv_core::{
    EntityId, EntityStyle, LayoutConfig, Positions, PreviewStyle, ResolvedStyle, StyleOverrides, StyleTarget,
    ViewError, ViewGraph, ViewResult,
};
use tokio::sync::broadcast;

/// Algorithm settings plus the generation of the last applied layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutState {
    pub config: LayoutConfig,
    pub generation: u64,
}

/// Change notifications for the render layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewChange {
    Applied { description: String, topology: bool },
    Undone { description: String, topology: bool },
    Redone { description: String, topology: bool },
    /// The whole view was replaced (saved graph loaded).
    Reset,
    Layout { generation: u64 },
    Preview,
}

/// An owned copy of everything the render layer draws.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub state: ViewState,
    pub layout: LayoutState,
    pub preview: Option<PreviewStyle>,
}

impl Snapshot {
    /// Resolved style of a node or edge, preview included.
    pub fn style_of(&self, id: EntityId) -> Option<ResolvedStyle> {
        resolve_style(&self.state, self.preview.as_ref(), id)
    }
}

fn resolve_style(state: &ViewState, preview: Option<&PreviewStyle>, id: EntityId) -> Option<ResolvedStyle> {
    if let Some(node) = state.graph.node(id) {
        Some(state.styles.resolve_node(node, preview))
    } else {
        state.graph.edge(id).map(|edge| state.styles.resolve_edge(edge, preview))
    }
}

pub struct ViewStore {
    state: ViewState,
    history: CommandStack,
    layout: LayoutState,
    preview: Option<PreviewStyle>,
    /// Set when topology changed since the orchestrator last looked.
    layout_dirty: bool,
    changes: broadcast::Sender<ViewChange>,
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

impl ViewStore {
    pub fn new(config: &SessionConfig) -> Self {
        let (changes, _) = broadcast::channel(config.notification_capacity.max(1));
        let mut layout = LayoutConfig::for_algorithm(config.layout);
        layout.pre_layout = config.pre_layout;
        Self {
            state: ViewState::new(),
            history: CommandStack::new(config.history_depth),
            layout: LayoutState {
                config: layout,
                generation: 0,
            },
            preview: None,
            layout_dirty: false,
            changes,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn layout(&self) -> &LayoutState {
        &self.layout
    }

    pub fn preview(&self) -> Option<&PreviewStyle> {
        self.preview.as_ref()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
            layout: self.layout.clone(),
            preview: self.preview.clone(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewChange> {
        self.changes.subscribe()
    }

    fn notify(&self, change: ViewChange) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }

    // ─── History ─────────────────────────────────────────────────────────

    /// Apply a mutation as one undoable command and return the new snapshot.
    pub fn apply_command(&mut self, mutation: Mutation, description: &str) -> Snapshot {
        let cmd = self.history.execute(&mut self.state, mutation, description);
        let topology = cmd.changes_topology();
        self.layout_dirty |= topology;
        self.notify(ViewChange::Applied {
            description: description.to_string(),
            topology,
        });
        self.snapshot()
    }

    pub fn undo(&mut self) -> ViewResult<Snapshot> {
        let cmd = self.history.undo(&mut self.state).ok_or(ViewError::NothingToUndo)?;
        let change = ViewChange::Undone {
            description: cmd.description().to_string(),
            topology: cmd.changes_topology(),
        };
        self.layout_dirty |= cmd.changes_topology();
        log::debug!("undo: {change:?}");
        self.notify(change);
        Ok(self.snapshot())
    }

    pub fn redo(&mut self) -> ViewResult<Snapshot> {
        let cmd = self.history.redo(&mut self.state).ok_or(ViewError::NothingToRedo)?;
        let change = ViewChange::Redone {
            description: cmd.description().to_string(),
            topology: cmd.changes_topology(),
        };
        self.layout_dirty |= cmd.changes_topology();
        log::debug!("redo: {change:?}");
        self.notify(change);
        Ok(self.snapshot())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.history.undo_description()
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.history.redo_description()
    }

    pub fn history_len(&self) -> (usize, usize) {
        (self.history.undo_len(), self.history.redo_len())
    }

    /// Replace the whole view, e.g. when a saved graph is opened. History,
    /// selection, pins, positions and preview start over.
    pub fn reset(&mut self, graph: ViewGraph, styles: StyleOverrides, layout: LayoutConfig) {
        self.state = ViewState {
            graph,
            styles,
            ..ViewState::default()
        };
        self.history.clear();
        self.preview = None;
        self.layout.config = layout;
        self.layout_dirty = true;
        self.notify(ViewChange::Reset);
    }

    // ─── Preview ─────────────────────────────────────────────────────────

    /// Show `style` on `target` without committing it.
    pub fn preview_style(&mut self, target: StyleTarget, style: EntityStyle) {
        self.preview = Some(PreviewStyle { target, style });
        self.notify(ViewChange::Preview);
    }

    /// Discard the preview. Returns `false` if there was none.
    pub fn reset_preview(&mut self) -> bool {
        let had = self.preview.take().is_some();
        if had {
            self.notify(ViewChange::Preview);
        }
        had
    }

    /// Turn the preview into exactly one history command. The preview is
    /// layered over the currently committed style of its target. A preview
    /// whose entity has left the view is discarded without a command.
    pub fn commit_preview(&mut self) -> Option<Snapshot> {
        let PreviewStyle { target, style } = self.preview.take()?;
        let (mutation, description) = match target {
            StyleTarget::Instance { id } if !self.state.graph.contains(id) => {
                log::debug!("discarding preview of {id}: no longer in the view");
                self.notify(ViewChange::Preview);
                return None;
            }
            StyleTarget::Instance { id } => {
                let mut merged = self.state.styles.instance_style(id).copied().unwrap_or_default();
                merged.merge(&style);
                (Mutation::SetInstanceStyle { id, style: merged }, format!("Style {id}"))
            }
            StyleTarget::Type { key } => {
                let mut merged = self.state.styles.type_style(&key).copied().unwrap_or_default();
                merged.merge(&style);
                let description = format!("Style {key:?}");
                (Mutation::SetTypeStyle { key, style: merged }, description)
            }
        };
        Some(self.apply_command(mutation, &description))
    }

    pub fn resolved_style(&self, id: EntityId) -> Option<ResolvedStyle> {
        resolve_style(&self.state, self.preview.as_ref(), id)
    }

    // ─── Layout ──────────────────────────────────────────────────────────

    /// Returns whether topology changed since the last call, clearing the flag.
    pub fn take_layout_dirty(&mut self) -> bool {
        std::mem::take(&mut self.layout_dirty)
    }

    pub fn set_layout_config(&mut self, config: LayoutConfig) {
        self.layout.config = config;
    }

    /// Merge a completed layout. Pinned nodes that already have a position
    /// keep it, and positions for nodes that left the view are dropped.
    pub fn apply_layout(&mut self, generation: u64, positions: Positions) {
        for (id, pos) in positions {
            let fixed = self.state.pinned.contains(&id) && self.state.positions.contains_key(&id);
            if self.state.graph.contains_node(id) && !fixed {
                self.state.positions.insert(id, pos);
            }
        }
        self.layout.generation = generation;
        self.notify(ViewChange::Layout { generation });
    }
}
