//! Exploration and query adapter.
//!
//! Turns expand, two-hop, shared-neighbours, select-similar and search
//! intents into fetches against a [`GraphService`] and merges what comes
//! back through the view store as single undoable commands. A failed fetch
//! leaves the view and its history untouched.
//!
//! Every intent runs in two phases. `begin_*` issues a sequence-numbered
//! request that owns everything its fetch needs, so several fetches can be
//! in flight at once. The fetched response is then merged synchronously.
//! A response is only accepted if no newer request for the same slot has
//! resolved first; late responses are dropped and logged.

use crate::selection::SelectionMode;
use crate::service::{GraphService, NeighbourhoodRequest, SearchPage};
use crate::state::{Mutation, ViewState};
use crate::store::ViewStore;
use gv_core::{Edge, Entity, EntityId, EntityKind, FilterSpec, Node, ViewError, ViewResult};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Independent request streams; staleness is tracked per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Expand,
    Similar,
    Search,
}

/// Identifies one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub slot: Slot,
    pub seq: u64,
}

/// How a completed request affected the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A command was pushed (or search state replaced).
    Applied,
    /// Nothing new to show; no command pushed.
    Unchanged,
    /// A newer request for the same slot already resolved; dropped.
    Stale,
}

#[derive(Debug, Clone, Copy, Default)]
struct SlotSeq {
    issued: u64,
    resolved: u64,
}

/// Adapter-local search state: the active filter, current page and results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub spec: Option<FilterSpec>,
    pub page: usize,
    pub total_pages: usize,
    pub results: Vec<Entity>,
}

// ─── Requests in flight ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum FetchKind {
    Around {
        node: EntityId,
        hops: usize,
    },
    Shared {
        a: EntityId,
        b: EntityId,
    },
    Similar {
        id: EntityId,
        spec: Option<FilterSpec>,
        in_view: BTreeSet<EntityId>,
    },
}

/// An issued neighbourhood or select-similar request, not yet fetched.
#[derive(Debug, Clone)]
pub struct PendingFetch {
    ticket: Ticket,
    graph: String,
    kind: FetchKind,
    description: String,
}

impl PendingFetch {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub async fn fetch<S: GraphService>(self, service: &S) -> Fetched {
        let graph = self.graph.as_str();
        let result = match &self.kind {
            FetchKind::Around { node, hops } => service
                .neighbourhood(&request(graph, *node, *hops))
                .await
                .map(|hood| Additions::new(hood.nodes, hood.edges)),
            FetchKind::Shared { a, b } => fetch_shared(service, graph, *a, *b)
                .await
                .map(|(nodes, edges)| Additions::new(nodes, edges)),
            FetchKind::Similar { id, spec: None, .. } => Ok(Additions::default().selecting(vec![*id])),
            FetchKind::Similar {
                id,
                spec: Some(spec),
                in_view,
            } => fetch_all(service, graph, spec, in_view)
                .await
                .map(|(nodes, edges, mut similar)| {
                    if !similar.contains(id) {
                        similar.insert(0, *id);
                    }
                    Additions::new(nodes, edges).selecting(similar)
                }),
        };
        Fetched {
            ticket: self.ticket,
            description: self.description,
            result,
        }
    }
}

/// A fetched response waiting to be merged by [`Explorer::finish`].
#[derive(Debug)]
pub struct Fetched {
    ticket: Ticket,
    description: String,
    result: ViewResult<Additions>,
}

impl Fetched {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }
}

#[derive(Debug, Default)]
struct Additions {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    select: Option<Vec<EntityId>>,
}

impl Additions {
    fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self {
            nodes,
            edges,
            select: None,
        }
    }

    fn selecting(mut self, ids: Vec<EntityId>) -> Self {
        self.select = Some(ids);
        self
    }
}

/// An issued search page request, not yet fetched.
#[derive(Debug, Clone)]
pub struct PendingSearch {
    ticket: Ticket,
    spec: FilterSpec,
}

impl PendingSearch {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub async fn fetch<S: GraphService>(self, service: &S) -> SearchResponse {
        let result = service.search(&self.spec).await;
        SearchResponse {
            ticket: self.ticket,
            spec: self.spec,
            result,
        }
    }
}

/// A fetched search page waiting for [`Explorer::finish_search`].
#[derive(Debug)]
pub struct SearchResponse {
    ticket: Ticket,
    spec: FilterSpec,
    result: ViewResult<SearchPage>,
}

impl SearchResponse {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }
}

// ─── Explorer ────────────────────────────────────────────────────────────

pub struct Explorer {
    graph: String,
    page_size: usize,
    slots: HashMap<Slot, SlotSeq>,
    search: SearchState,
}

impl Explorer {
    pub fn new(graph: &str, page_size: usize) -> Self {
        Self {
            graph: graph.to_string(),
            page_size: page_size.max(1),
            slots: HashMap::new(),
            search: SearchState::default(),
        }
    }

    pub fn graph(&self) -> &str {
        &self.graph
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    // ─── Sequencing ──────────────────────────────────────────────────────

    pub fn issue(&mut self, slot: Slot) -> Ticket {
        let seq = self.slots.entry(slot).or_default();
        seq.issued += 1;
        Ticket { slot, seq: seq.issued }
    }

    /// Accept a response unless a newer one for its slot already resolved.
    pub fn accept(&mut self, ticket: Ticket) -> bool {
        let seq = self.slots.entry(ticket.slot).or_default();
        if ticket.seq > seq.resolved {
            seq.resolved = ticket.seq;
            true
        } else {
            log::debug!(
                "dropping stale {:?} response #{} (latest resolved #{})",
                ticket.slot,
                ticket.seq,
                seq.resolved
            );
            false
        }
    }

    /// Make every request issued so far stale and forget the active search.
    pub fn abandon(&mut self) {
        self.search = SearchState::default();
        for seq in self.slots.values_mut() {
            seq.resolved = seq.issued;
        }
    }

    fn begin(&mut self, slot: Slot, kind: FetchKind, description: String) -> PendingFetch {
        PendingFetch {
            ticket: self.issue(slot),
            graph: self.graph.clone(),
            kind,
            description,
        }
    }

    /// Merge a fetched response. Stale responses and failures leave the
    /// view alone.
    pub fn finish(&mut self, store: &mut ViewStore, fetched: Fetched) -> ViewResult<Resolution> {
        let Fetched {
            ticket,
            description,
            result,
        } = fetched;
        if !self.accept(ticket) {
            return Ok(Resolution::Stale);
        }
        let additions = result.inspect_err(|e| log::warn!("{description}: {e}"))?;
        Ok(merge(
            store,
            additions.nodes,
            additions.edges,
            additions.select,
            &description,
        ))
    }

    // ─── Neighbourhoods ──────────────────────────────────────────────────

    pub fn begin_expand(&mut self, node: EntityId) -> PendingFetch {
        self.begin(Slot::Expand, FetchKind::Around { node, hops: 1 }, format!("Expand {node}"))
    }

    pub fn begin_two_hop(&mut self, node: EntityId) -> PendingFetch {
        self.begin(Slot::Expand, FetchKind::Around { node, hops: 2 }, format!("Two-hop {node}"))
    }

    /// Shared neighbours of the two selected nodes. A single selected edge
    /// stands for its two endpoints.
    pub fn begin_shared(&mut self, state: &ViewState) -> ViewResult<PendingFetch> {
        let (a, b) = resolve_pair(state)?;
        Ok(self.begin(
            Slot::Expand,
            FetchKind::Shared { a, b },
            format!("Shared neighbours of {a} and {b}"),
        ))
    }

    /// Materialize the one-hop neighbourhood of `node`.
    pub async fn expand_neighbours<S: GraphService>(
        &mut self,
        service: &S,
        store: &mut ViewStore,
        node: EntityId,
    ) -> ViewResult<Resolution> {
        let fetched = self.begin_expand(node).fetch(service).await;
        self.finish(store, fetched)
    }

    /// Materialize everything within two hops of `node`.
    pub async fn expand_two_hop<S: GraphService>(
        &mut self,
        service: &S,
        store: &mut ViewStore,
        node: EntityId,
    ) -> ViewResult<Resolution> {
        let fetched = self.begin_two_hop(node).fetch(service).await;
        self.finish(store, fetched)
    }

    pub async fn shared_neighbours<S: GraphService>(
        &mut self,
        service: &S,
        store: &mut ViewStore,
    ) -> ViewResult<Resolution> {
        let fetched = self.begin_shared(store.state())?.fetch(service).await;
        self.finish(store, fetched)
    }

    // ─── Select similar ──────────────────────────────────────────────────

    /// Everything sharing the type of `id` (node type, or any of an edge's
    /// layers) becomes the selection, added to the view where missing, as
    /// one command. An untyped node only selects itself.
    pub fn begin_similar(&mut self, state: &ViewState, id: EntityId) -> ViewResult<PendingFetch> {
        let spec = if let Some(node) = state.graph.node(id) {
            node.node_type
                .as_deref()
                .map(|t| FilterSpec::nodes(&self.graph, Some(t), Vec::new()))
        } else if let Some(edge) = state.graph.edge(id) {
            let layers: Vec<&str> = edge.layers.iter().map(String::as_str).collect();
            Some(FilterSpec::edges(&self.graph, None, None, &layers))
        } else {
            return Err(ViewError::UnknownEntity(id));
        };
        let spec = spec.map(|mut spec| {
            spec.page_size = self.page_size;
            spec
        });
        let in_view = state.graph.node_ids().into_iter().collect();
        Ok(self.begin(
            Slot::Similar,
            FetchKind::Similar { id, spec, in_view },
            format!("Select similar {id}"),
        ))
    }

    pub async fn select_similar<S: GraphService>(
        &mut self,
        service: &S,
        store: &mut ViewStore,
        id: EntityId,
    ) -> ViewResult<Resolution> {
        let fetched = self.begin_similar(store.state(), id)?.fetch(service).await;
        self.finish(store, fetched)
    }

    // ─── Search ──────────────────────────────────────────────────────────

    pub fn search_state(&self) -> &SearchState {
        &self.search
    }

    /// A new search from its first page.
    pub fn begin_search(&mut self, spec: FilterSpec) -> PendingSearch {
        PendingSearch {
            ticket: self.issue(Slot::Search),
            spec: spec.at_page(0),
        }
    }

    /// The page after the current one; `None` on the last page.
    pub fn begin_next_page(&mut self) -> Option<PendingSearch> {
        let spec = match &self.search.spec {
            Some(spec) if self.search.page + 1 < self.search.total_pages => spec.at_page(self.search.page + 1),
            _ => return None,
        };
        Some(PendingSearch {
            ticket: self.issue(Slot::Search),
            spec,
        })
    }

    /// The page before the current one; `None` on the first page.
    pub fn begin_prev_page(&mut self) -> Option<PendingSearch> {
        let spec = match &self.search.spec {
            Some(spec) if self.search.page > 0 => spec.at_page(self.search.page - 1),
            _ => return None,
        };
        Some(PendingSearch {
            ticket: self.issue(Slot::Search),
            spec,
        })
    }

    /// Record a fetched search page as the active search state.
    pub fn finish_search(&mut self, response: SearchResponse) -> ViewResult<Resolution> {
        let SearchResponse { ticket, spec, result } = response;
        if !self.accept(ticket) {
            return Ok(Resolution::Stale);
        }
        let page = result.inspect_err(|e| log::warn!("search failed: {e}"))?;
        self.search = SearchState {
            page: spec.page,
            spec: Some(spec),
            total_pages: page.total_pages,
            results: page.items,
        };
        Ok(Resolution::Applied)
    }

    pub async fn search<S: GraphService>(&mut self, service: &S, spec: FilterSpec) -> ViewResult<Resolution> {
        let response = self.begin_search(spec).fetch(service).await;
        self.finish_search(response)
    }

    pub async fn next_page<S: GraphService>(&mut self, service: &S) -> ViewResult<Resolution> {
        match self.begin_next_page() {
            Some(pending) => {
                let response = pending.fetch(service).await;
                self.finish_search(response)
            }
            None => Ok(Resolution::Unchanged),
        }
    }

    pub async fn prev_page<S: GraphService>(&mut self, service: &S) -> ViewResult<Resolution> {
        match self.begin_prev_page() {
            Some(pending) => {
                let response = pending.fetch(service).await;
                self.finish_search(response)
            }
            None => Ok(Resolution::Unchanged),
        }
    }

    /// Forget the active search. Searches still in flight become stale.
    pub fn clear_search(&mut self) {
        self.search = SearchState::default();
        let seq = self.slots.entry(Slot::Search).or_default();
        seq.resolved = seq.issued;
    }

    /// Add the current page of results to the view as one command.
    pub async fn add_results_to_view<S: GraphService>(
        &mut self,
        service: &S,
        store: &mut ViewStore,
    ) -> ViewResult<Resolution> {
        let items = self.search.results.clone();
        if items.is_empty() {
            return Ok(Resolution::Unchanged);
        }
        let in_view = store.state().graph.node_ids().into_iter().collect();
        let (nodes, edges) = with_endpoints(service, &self.graph, &in_view, items).await?;
        Ok(merge(store, nodes, edges, None, "Add search results"))
    }

    // ─── Collapse ────────────────────────────────────────────────────────

    /// Remove the unpinned neighbours of `node` that are connected to the
    /// rest of the view only through it.
    pub fn collapse(store: &mut ViewStore, node: EntityId) -> ViewResult<Resolution> {
        let state = store.state();
        match state.graph.kind_of(node) {
            Some(EntityKind::Node) => {}
            Some(EntityKind::Edge) => return Err(ViewError::NotANode(node)),
            None => return Err(ViewError::UnknownEntity(node)),
        }
        let leaves: Vec<EntityId> = state
            .graph
            .neighbours(node)
            .into_iter()
            .filter(|n| !state.pinned.contains(n) && state.graph.neighbours(*n) == [node])
            .collect();
        if leaves.is_empty() {
            return Ok(Resolution::Unchanged);
        }
        store.apply_command(Mutation::RemoveEntities { ids: leaves }, &format!("Collapse {node}"));
        Ok(Resolution::Applied)
    }
}

// ─── Fetching ────────────────────────────────────────────────────────────

fn request(graph: &str, node: EntityId, hops: usize) -> NeighbourhoodRequest {
    NeighbourhoodRequest {
        graph: graph.to_string(),
        node,
        hops,
    }
}

async fn fetch_shared<S: GraphService>(
    service: &S,
    graph: &str,
    a: EntityId,
    b: EntityId,
) -> ViewResult<(Vec<Node>, Vec<Edge>)> {
    let around_a = service.neighbourhood(&request(graph, a, 1)).await?;
    let around_b = service.neighbourhood(&request(graph, b, 1)).await?;

    let ids_a: BTreeSet<EntityId> = around_a.nodes.iter().map(|n| n.id).collect();
    let ids_b: BTreeSet<EntityId> = around_b.nodes.iter().map(|n| n.id).collect();
    let shared: BTreeSet<EntityId> = ids_a
        .intersection(&ids_b)
        .copied()
        .filter(|id| *id != a && *id != b)
        .collect();
    if shared.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let ends = [a, b];
    let mut nodes: BTreeMap<EntityId, Node> = BTreeMap::new();
    let mut edges: BTreeMap<EntityId, Edge> = BTreeMap::new();
    for node in around_a.nodes.into_iter().chain(around_b.nodes) {
        if ends.contains(&node.id) || shared.contains(&node.id) {
            nodes.entry(node.id).or_insert(node);
        }
    }
    for edge in around_a.edges.into_iter().chain(around_b.edges) {
        let bridges = (ends.contains(&edge.src) && shared.contains(&edge.dst))
            || (shared.contains(&edge.src) && ends.contains(&edge.dst));
        if bridges {
            edges.entry(edge.id).or_insert(edge);
        }
    }
    Ok((nodes.into_values().collect(), edges.into_values().collect()))
}

/// Fetch every page of `spec` plus any edge endpoints missing from
/// `in_view`. Returns nodes, edges and the matched ids in result order.
async fn fetch_all<S: GraphService>(
    service: &S,
    graph: &str,
    spec: &FilterSpec,
    in_view: &BTreeSet<EntityId>,
) -> ViewResult<(Vec<Node>, Vec<Edge>, Vec<EntityId>)> {
    let mut items = Vec::new();
    let mut page = 0;
    loop {
        let SearchPage { items: batch, total_pages } = service.search(&spec.at_page(page)).await?;
        items.extend(batch);
        page += 1;
        if page >= total_pages {
            break;
        }
    }
    let matched = items.iter().map(Entity::id).collect();
    let (nodes, edges) = with_endpoints(service, graph, in_view, items).await?;
    Ok((nodes, edges, matched))
}

/// Split entities into nodes and edges, fetching endpoint nodes that are
/// neither in the view nor among the entities.
async fn with_endpoints<S: GraphService>(
    service: &S,
    graph: &str,
    in_view: &BTreeSet<EntityId>,
    items: Vec<Entity>,
) -> ViewResult<(Vec<Node>, Vec<Edge>)> {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for item in items {
        match item {
            Entity::Node(n) => nodes.push(n),
            Entity::Edge(e) => edges.push(e),
        }
    }
    let mut known: BTreeSet<EntityId> = nodes.iter().map(|n| n.id).collect();
    let missing: BTreeSet<EntityId> = edges
        .iter()
        .flat_map(|e| [e.src, e.dst])
        .filter(|id| !known.contains(id) && !in_view.contains(id))
        .collect();
    for id in missing {
        let around = service.neighbourhood(&request(graph, id, 0)).await?;
        for node in around.nodes {
            if known.insert(node.id) {
                nodes.push(node);
            }
        }
    }
    Ok((nodes, edges))
}


/// The two node ids a shared-neighbours request works on: two selected
/// nodes, or the endpoints of one selected edge.
pub fn resolve_pair(state: &ViewState) -> ViewResult<(EntityId, EntityId)> {
    let mut ids: Vec<EntityId> = state.selection.nodes().to_vec();
    for edge_id in state.selection.edges() {
        if let Some(edge) = state.graph.edge(*edge_id) {
            for end in [edge.src, edge.dst] {
                if !ids.contains(&end) {
                    ids.push(end);
                }
            }
        }
    }
    match ids.as_slice() {
        [a, b] => Ok((*a, *b)),
        _ => Err(ViewError::InvalidSelectionSize {
            expected: 2,
            found: ids.len(),
        }),
    }
}

/// Add whatever is new as one command, optionally replacing the selection
/// in the same step.
fn merge(
    store: &mut ViewStore,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    select: Option<Vec<EntityId>>,
    description: &str,
) -> Resolution {
    let graph = &store.state().graph;
    let nodes: Vec<Node> = nodes.into_iter().filter(|n| !graph.contains_node(n.id)).collect();
    let edges: Vec<Edge> = edges.into_iter().filter(|e| !graph.contains_edge(e.id)).collect();
    let add = (!nodes.is_empty() || !edges.is_empty()).then_some(Mutation::AddEntities { nodes, edges });

    let mutation = match (add, select) {
        (None, None) => return Resolution::Unchanged,
        (Some(add), None) => add,
        (add, Some(ids)) => {
            let select = Mutation::SetSelection {
                ids,
                mode: SelectionMode::Replace,
            };
            Mutation::Batch(add.into_iter().chain([select]).collect())
        }
    };
    store.apply_command(mutation, description);
    Resolution::Applied
}
