//! One exploration session: the view store, its layout orchestrator and
//! the exploration adapter, wired to a graph service.
//!
//! All UI intents go through here. After every intent that may change the
//! view's topology the session starts a new layout run, so callers only
//! need to drain or settle layout results. Topology-changing intents spawn
//! layout tasks and must be called from within a Tokio runtime.
//!
//! Fetching intents come in two forms. The `async` methods fetch and merge
//! in one call. The `begin_*` methods return a future that borrows nothing
//! from the session, so several fetches can run concurrently; its output is
//! merged with `resolve_fetch` or `resolve_search`, where responses that lost
//! to a newer request of the same kind resolve as [`Resolution::Stale`].

use crate::config::SessionConfig;
use crate::explore::{Explorer, Fetched, PendingFetch, PendingSearch, Resolution, SearchResponse, SearchState};
use crate::layout::{LayoutOrchestrator, RunStatus};
use crate::selection::SelectionMode;
use crate::service::GraphService;
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use crate::state::Mutation;
use crate::store::{Snapshot, ViewChange, ViewStore};
use gv_core::{
    Condition, EntityId, EntityKind, EntityStyle, FilterSpec, LayoutAlgorithm, LayoutEngine, LayoutError, LayoutParams,
    PreLayout, SavedGraph, StyleKey, StyleTarget, ViewError, ViewResult,
};
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct ExplorerSession<S> {
    config: SessionConfig,
    store: ViewStore,
    layout: LayoutOrchestrator,
    explorer: Explorer,
    service: Arc<S>,
}

impl<S: GraphService> ExplorerSession<S> {
    /// A session over `graph` in `service`, laid out with the built-in
    /// algorithms.
    pub fn new(service: S, graph: &str, config: SessionConfig) -> Self {
        let layout = LayoutOrchestrator::builtin(config.viewport);
        Self::with_layout(service, graph, config, layout)
    }

    /// A session with a custom layout engine.
    pub fn with_engine(service: S, graph: &str, config: SessionConfig, engine: Arc<dyn LayoutEngine>) -> Self {
        let layout = LayoutOrchestrator::new(engine, config.viewport);
        Self::with_layout(service, graph, config, layout)
    }

    fn with_layout(service: S, graph: &str, config: SessionConfig, layout: LayoutOrchestrator) -> Self {
        Self {
            store: ViewStore::new(&config),
            explorer: Explorer::new(graph, config.page_size),
            layout,
            service: Arc::new(service),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &ViewStore {
        &self.store
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewChange> {
        self.store.subscribe()
    }

    pub fn graph_name(&self) -> &str {
        self.explorer.graph()
    }

    fn apply(&mut self, mutation: Mutation, description: &str) -> Snapshot {
        let snapshot = self.store.apply_command(mutation, description);
        self.sync_layout();
        snapshot
    }

    /// Start a layout run if topology changed since the last one.
    fn sync_layout(&mut self) {
        if self.store.take_layout_dirty() {
            self.layout.trigger(&self.store);
        }
    }

    fn resolved(&mut self, resolution: ViewResult<Resolution>) -> ViewResult<Resolution> {
        if matches!(resolution, Ok(Resolution::Applied)) {
            self.sync_layout();
        }
        resolution
    }

    // ─── Selection ───────────────────────────────────────────────────────

    /// Plain click replaces the selection; shift-click adds to it.
    pub fn select(&mut self, ids: &[EntityId], mode: SelectionMode) -> Snapshot {
        let description = match mode {
            SelectionMode::Replace => "Select",
            SelectionMode::Add => "Add to selection",
        };
        self.apply(
            Mutation::SetSelection {
                ids: ids.to_vec(),
                mode,
            },
            description,
        )
    }

    /// Select every node in the view. No command is pushed when the view is
    /// empty or every node is already the whole selection.
    pub fn select_all(&mut self) -> Option<Snapshot> {
        let state = self.store.state();
        let ids = state.graph.node_ids();
        let already = state.selection.edges().is_empty()
            && state.selection.nodes().len() == ids.len()
            && ids.iter().all(|id| state.selection.contains(*id));
        if ids.is_empty() || already {
            return None;
        }
        Some(self.apply(
            Mutation::SetSelection {
                ids,
                mode: SelectionMode::Replace,
            },
            "Select all",
        ))
    }

    /// Clear the selection. No command is pushed when nothing is selected.
    pub fn deselect_all(&mut self) -> Option<Snapshot> {
        if self.store.state().selection.is_empty() {
            return None;
        }
        Some(self.apply(
            Mutation::SetSelection {
                ids: Vec::new(),
                mode: SelectionMode::Replace,
            },
            "Deselect all",
        ))
    }

    /// Remove the selected entities as one command.
    pub fn delete_selected(&mut self) -> Option<Snapshot> {
        let ids = self.store.state().selection.ids();
        if ids.is_empty() {
            return None;
        }
        let description = format!("Remove {} entities", ids.len());
        Some(self.apply(Mutation::RemoveEntities { ids }, &description))
    }

    pub fn remove(&mut self, ids: &[EntityId]) -> Snapshot {
        self.apply(Mutation::RemoveEntities { ids: ids.to_vec() }, "Remove")
    }

    pub fn toggle_pin(&mut self, id: EntityId) -> ViewResult<Snapshot> {
        match self.store.state().graph.kind_of(id) {
            Some(EntityKind::Node) => {}
            Some(EntityKind::Edge) => return Err(ViewError::NotANode(id)),
            None => return Err(ViewError::UnknownEntity(id)),
        }
        let description = if self.store.state().pinned.contains(&id) {
            format!("Unpin {id}")
        } else {
            format!("Pin {id}")
        };
        Ok(self.apply(Mutation::TogglePin { id }, &description))
    }

    // ─── Styles ──────────────────────────────────────────────────────────

    pub fn set_instance_style(&mut self, id: EntityId, style: EntityStyle) -> ViewResult<Snapshot> {
        if !self.store.state().graph.contains(id) {
            return Err(ViewError::UnknownEntity(id));
        }
        Ok(self.apply(Mutation::SetInstanceStyle { id, style }, &format!("Style {id}")))
    }

    pub fn clear_instance_style(&mut self, id: EntityId) -> Snapshot {
        self.apply(Mutation::ClearInstanceStyle { id }, &format!("Reset style of {id}"))
    }

    pub fn set_type_style(&mut self, key: StyleKey, style: EntityStyle) -> Snapshot {
        let description = format!("Style {key:?}");
        self.apply(Mutation::SetTypeStyle { key, style }, &description)
    }

    /// Reset a node type or edge layer to the default style.
    pub fn clear_type_style(&mut self, key: StyleKey) -> Snapshot {
        let description = format!("Reset {key:?} to default");
        self.apply(Mutation::ClearTypeStyle { key }, &description)
    }

    /// Show a style without committing it. Instance targets must be in the
    /// view.
    pub fn preview_style(&mut self, target: StyleTarget, style: EntityStyle) -> ViewResult<()> {
        if let StyleTarget::Instance { id } = &target
            && !self.store.state().graph.contains(*id)
        {
            return Err(ViewError::UnknownEntity(*id));
        }
        self.store.preview_style(target, style);
        Ok(())
    }

    pub fn reset_preview(&mut self) -> bool {
        self.store.reset_preview()
    }

    pub fn commit_preview(&mut self) -> Option<Snapshot> {
        self.store.commit_preview()
    }

    // ─── History ─────────────────────────────────────────────────────────

    pub fn undo(&mut self) -> ViewResult<Snapshot> {
        let snapshot = self.store.undo()?;
        self.sync_layout();
        Ok(snapshot)
    }

    pub fn redo(&mut self) -> ViewResult<Snapshot> {
        let snapshot = self.store.redo()?;
        self.sync_layout();
        Ok(snapshot)
    }

    // ─── Layout ──────────────────────────────────────────────────────────

    pub fn layout_status(&self) -> RunStatus {
        self.layout.status()
    }

    pub fn set_layout_algorithm(&mut self, algorithm: LayoutAlgorithm, overrides: Option<LayoutParams>) -> u64 {
        self.layout.set_algorithm(&mut self.store, algorithm, overrides)
    }

    pub fn set_layout_params(&mut self, params: LayoutParams) -> Result<u64, LayoutError> {
        self.layout.set_params(&mut self.store, params)
    }

    pub fn set_pre_layout(&mut self, pre_layout: Option<PreLayout>) -> u64 {
        self.layout.set_pre_layout(&mut self.store, pre_layout)
    }

    pub fn rerun_layout(&mut self) -> u64 {
        self.layout.rerun(&self.store)
    }

    /// Merge layout results delivered so far.
    pub fn poll_layout(&mut self) -> usize {
        self.layout.drain(&mut self.store)
    }

    /// Wait for the current layout run to finish.
    pub async fn settle_layout(&mut self) -> RunStatus {
        self.layout.settle(&mut self.store).await
    }

    // ─── Exploration ─────────────────────────────────────────────────────

    fn detach(&self, pending: PendingFetch) -> impl Future<Output = Fetched> + Send + use<S> {
        let service = Arc::clone(&self.service);
        async move { pending.fetch(&*service).await }
    }

    fn detach_search(&self, pending: PendingSearch) -> impl Future<Output = SearchResponse> + Send + use<S> {
        let service = Arc::clone(&self.service);
        async move { pending.fetch(&*service).await }
    }

    pub fn begin_expand(&mut self, node: EntityId) -> impl Future<Output = Fetched> + Send + use<S> {
        let pending = self.explorer.begin_expand(node);
        self.detach(pending)
    }

    pub fn begin_two_hop(&mut self, node: EntityId) -> impl Future<Output = Fetched> + Send + use<S> {
        let pending = self.explorer.begin_two_hop(node);
        self.detach(pending)
    }

    /// Shared neighbours of the current selection.
    pub fn begin_shared(&mut self) -> ViewResult<impl Future<Output = Fetched> + Send + use<S>> {
        let pending = self.explorer.begin_shared(self.store.state())?;
        Ok(self.detach(pending))
    }

    pub fn begin_similar(&mut self, id: EntityId) -> ViewResult<impl Future<Output = Fetched> + Send + use<S>> {
        let pending = self.explorer.begin_similar(self.store.state(), id)?;
        Ok(self.detach(pending))
    }

    /// Merge a fetched neighbourhood or select-similar response.
    pub fn resolve_fetch(&mut self, fetched: Fetched) -> ViewResult<Resolution> {
        let resolution = self.explorer.finish(&mut self.store, fetched);
        self.resolved(resolution)
    }

    pub async fn expand_neighbours(&mut self, node: EntityId) -> ViewResult<Resolution> {
        let fetched = self.begin_expand(node).await;
        self.resolve_fetch(fetched)
    }

    pub async fn expand_two_hop(&mut self, node: EntityId) -> ViewResult<Resolution> {
        let fetched = self.begin_two_hop(node).await;
        self.resolve_fetch(fetched)
    }

    pub async fn shared_neighbours(&mut self) -> ViewResult<Resolution> {
        let fetched = self.begin_shared()?.await;
        self.resolve_fetch(fetched)
    }

    pub async fn select_similar(&mut self, id: EntityId) -> ViewResult<Resolution> {
        let fetched = self.begin_similar(id)?.await;
        self.resolve_fetch(fetched)
    }

    pub fn collapse(&mut self, node: EntityId) -> ViewResult<Resolution> {
        let resolution = Explorer::collapse(&mut self.store, node);
        self.resolved(resolution)
    }

    // ─── Search ──────────────────────────────────────────────────────────

    pub fn search_state(&self) -> &SearchState {
        self.explorer.search_state()
    }

    /// Node search in this session's graph.
    pub fn node_filter(&self, node_type: Option<&str>, conditions: Vec<Condition>) -> FilterSpec {
        let mut spec = FilterSpec::nodes(self.explorer.graph(), node_type, conditions);
        spec.page_size = self.explorer.page_size();
        spec
    }

    /// Edge search in this session's graph.
    pub fn edge_filter(&self, src: Option<&str>, dst: Option<&str>, layers: &[&str]) -> FilterSpec {
        let mut spec = FilterSpec::edges(self.explorer.graph(), src, dst, layers);
        spec.page_size = self.explorer.page_size();
        spec
    }

    pub fn begin_search(&mut self, spec: FilterSpec) -> impl Future<Output = SearchResponse> + Send + use<S> {
        let pending = self.explorer.begin_search(spec);
        self.detach_search(pending)
    }

    /// `None` on the last page.
    pub fn begin_next_page(&mut self) -> Option<impl Future<Output = SearchResponse> + Send + use<S>> {
        let pending = self.explorer.begin_next_page()?;
        Some(self.detach_search(pending))
    }

    /// `None` on the first page.
    pub fn begin_prev_page(&mut self) -> Option<impl Future<Output = SearchResponse> + Send + use<S>> {
        let pending = self.explorer.begin_prev_page()?;
        Some(self.detach_search(pending))
    }

    pub fn resolve_search(&mut self, response: SearchResponse) -> ViewResult<Resolution> {
        self.explorer.finish_search(response)
    }

    pub async fn search(&mut self, spec: FilterSpec) -> ViewResult<Resolution> {
        let response = self.begin_search(spec).await;
        self.resolve_search(response)
    }

    pub async fn next_page(&mut self) -> ViewResult<Resolution> {
        match self.begin_next_page() {
            Some(fetch) => {
                let response = fetch.await;
                self.resolve_search(response)
            }
            None => Ok(Resolution::Unchanged),
        }
    }

    pub async fn prev_page(&mut self) -> ViewResult<Resolution> {
        match self.begin_prev_page() {
            Some(fetch) => {
                let response = fetch.await;
                self.resolve_search(response)
            }
            None => Ok(Resolution::Unchanged),
        }
    }

    pub fn clear_search(&mut self) {
        self.explorer.clear_search();
    }

    pub async fn add_search_results(&mut self) -> ViewResult<Resolution> {
        let resolution = self
            .explorer
            .add_results_to_view(&*self.service, &mut self.store)
            .await;
        self.resolved(resolution)
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    pub fn save(&self, name: &str) -> SavedGraph {
        let state = self.store.state();
        SavedGraph::capture(name, &state.graph, &state.styles, self.store.layout().config)
    }

    /// Replace the view with a saved graph and lay it out.
    pub fn load(&mut self, saved: &SavedGraph) -> ViewResult<Snapshot> {
        let graph = saved.to_graph()?;
        self.layout.cancel();
        self.explorer.abandon();
        self.store.reset(graph, saved.styles.clone(), saved.layout);
        log::debug!("loaded saved graph `{}`", saved.name);
        self.sync_layout();
        Ok(self.store.snapshot())
    }

    /// Navigating away: cancel the layout run in flight. Fetches still in
    /// flight resolve as stale.
    pub fn close(&mut self) {
        self.layout.cancel();
        self.explorer.abandon();
    }

    // ─── Shortcuts ───────────────────────────────────────────────────────

    /// Resolve a key event and perform its action. Returns the action and
    /// whether the view changed.
    pub fn handle_key(
        &mut self,
        key: &str,
        ctrl: bool,
        shift: bool,
        alt: bool,
        meta: bool,
    ) -> Option<(ShortcutAction, bool)> {
        let action = ShortcutMap::resolve(key, ctrl, shift, alt, meta)?;
        let changed = match action {
            ShortcutAction::Undo => self.undo().is_ok(),
            ShortcutAction::Redo => self.redo().is_ok(),
            ShortcutAction::Delete => self.delete_selected().is_some(),
            ShortcutAction::SelectAll => self.select_all().is_some(),
            ShortcutAction::Deselect => self.deselect_all().is_some(),
            ShortcutAction::RerunLayout => {
                self.rerun_layout();
                false
            }
        };
        Some((action, changed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::InMemoryGraphService;
    use crate::temporal::TemporalGraph;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> EntityId {
        EntityId::intern(s)
    }

    fn session() -> ExplorerSession<InMemoryGraphService> {
        let graph = TemporalGraph::from_json(
            r#"[
                {"time": 1, "id": "Pedro", "type": "Person"},
                {"time": 1, "id": "Ben", "type": "Person"},
                {"time": 2, "src": "Ben", "dst": "Pedro", "layer": "meets"}
            ]"#,
        )
        .unwrap();
        let service = InMemoryGraphService::new().with_graph("event", graph);
        ExplorerSession::new(service, "event", SessionConfig::default())
    }

    #[tokio::test]
    async fn expansion_triggers_layout() {
        let mut s = session();
        s.expand_neighbours(id("Pedro")).await.unwrap();
        assert_eq!(s.layout_status(), RunStatus::Running);
        assert_eq!(s.settle_layout().await, RunStatus::Completed);
        assert_eq!(s.snapshot().state.positions.len(), 2);
    }

    #[tokio::test]
    async fn selection_only_changes_do_not_relayout() {
        let mut s = session();
        s.expand_neighbours(id("Pedro")).await.unwrap();
        s.settle_layout().await;
        s.select(&[id("Ben")], SelectionMode::Replace);
        assert_eq!(s.layout_status(), RunStatus::Completed);
    }

    #[tokio::test]
    async fn shortcuts_drive_history() {
        let mut s = session();
        s.expand_neighbours(id("Pedro")).await.unwrap();
        assert_eq!(s.handle_key("a", true, false, false, false), Some((ShortcutAction::SelectAll, true)));
        assert_eq!(s.handle_key("Backspace", false, false, false, false), Some((ShortcutAction::Delete, true)));
        assert!(s.store().state().graph.is_empty());
        assert_eq!(s.handle_key("z", false, false, false, true), Some((ShortcutAction::Undo, true)));
        assert_eq!(s.store().state().graph.node_count(), 2);
        assert_eq!(s.handle_key("Escape", false, false, false, false), Some((ShortcutAction::Deselect, true)));
        assert_eq!(s.handle_key("Escape", false, false, false, false), Some((ShortcutAction::Deselect, false)));
        assert_eq!(s.handle_key("q", false, false, false, false), None);
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let mut s = session();
        s.expand_neighbours(id("Pedro")).await.unwrap();
        s.set_type_style(StyleKey::NodeType("Person".into()), EntityStyle::default().with_size(3.0));
        s.set_layout_algorithm(LayoutAlgorithm::Concentric, None);
        let saved = s.save("pedro");

        let mut other = session();
        other.load(&saved).unwrap();
        assert_eq!(other.store().state().graph, s.store().state().graph);
        assert_eq!(other.store().state().styles, s.store().state().styles);
        assert_eq!(other.store().layout().config.algorithm, LayoutAlgorithm::Concentric);
        assert!(!other.store().can_undo());
        assert_eq!(other.settle_layout().await, RunStatus::Completed);
    }

    #[tokio::test]
    async fn select_all_pushes_nothing_when_already_selected() {
        let mut s = session();
        assert!(s.select_all().is_none());
        assert_eq!(s.handle_key("a", true, false, false, false), Some((ShortcutAction::SelectAll, false)));

        s.expand_neighbours(id("Pedro")).await.unwrap();
        assert!(s.select_all().is_some());
        assert_eq!(s.handle_key("a", true, false, false, false), Some((ShortcutAction::SelectAll, false)));
        assert_eq!(s.store().history_len(), (2, 0));
    }

    #[tokio::test]
    async fn closing_makes_fetches_in_flight_stale() {
        let mut s = session();
        let pending = s.begin_expand(id("Pedro"));
        s.close();
        let fetched = pending.await;
        assert_eq!(s.resolve_fetch(fetched), Ok(Resolution::Stale));
        assert!(s.store().state().graph.is_empty());
        assert!(!s.store().can_undo());
    }

    #[tokio::test]
    async fn previewing_an_absent_entity_is_rejected() {
        let mut s = session();
        let err = s
            .preview_style(StyleTarget::Instance { id: id("Ghost") }, EntityStyle::default().with_size(4.0))
            .unwrap_err();
        assert_eq!(err, ViewError::UnknownEntity(id("Ghost")));
        assert!(s.store().preview().is_none());
    }

    #[tokio::test]
    async fn pinning_an_edge_is_rejected() {
        let mut s = session();
        s.expand_neighbours(id("Pedro")).await.unwrap();
        assert_eq!(s.toggle_pin(id("Ben->Pedro")).unwrap_err(), ViewError::NotANode(id("Ben->Pedro")));
        assert_eq!(s.toggle_pin(id("Ghost")).unwrap_err(), ViewError::UnknownEntity(id("Ghost")));
        s.toggle_pin(id("Ben")).unwrap();
        assert_eq!(s.store().undo_description(), Some("Pin Ben"));
    }
}
