//! Layout orchestration.
//!
//! Each run gets a generation number. Starting a new run aborts the one in
//! flight, and a result is only merged when its generation is still the
//! current one, so an algorithm switch mid-run can never leave positions
//! from the superseded algorithm behind. Computations run on the blocking
//! pool and report back over an `mpsc` channel; the caller drains results
//! on its own thread with [`LayoutOrchestrator::drain`] or waits with
//! [`LayoutOrchestrator::settle`].
//!
//! Runs are spawned with `tokio::spawn`, so triggering requires a Tokio
//! runtime.

use crate::store::ViewStore;
use gv_core::{
    BuiltinLayouts, LayoutAlgorithm, LayoutEngine, LayoutError, LayoutParams, LayoutRequest, Positions, PreLayout,
    Viewport,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// What a finished run reports back.
#[derive(Debug)]
pub struct LayoutResult {
    pub generation: u64,
    pub outcome: Result<Positions, LayoutError>,
}

pub struct LayoutOrchestrator {
    engine: Arc<dyn LayoutEngine>,
    viewport: Viewport,
    generation: u64,
    status: RunStatus,
    in_flight: Option<AbortHandle>,
    tx: mpsc::UnboundedSender<LayoutResult>,
    rx: mpsc::UnboundedReceiver<LayoutResult>,
}

impl LayoutOrchestrator {
    pub fn new(engine: Arc<dyn LayoutEngine>, viewport: Viewport) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            engine,
            viewport,
            generation: 0,
            status: RunStatus::Idle,
            in_flight: None,
            tx,
            rx,
        }
    }

    /// An orchestrator over the built-in algorithms.
    pub fn builtin(viewport: Viewport) -> Self {
        Self::new(Arc::new(BuiltinLayouts), viewport)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Start a new run for the store's current graph and layout settings,
    /// cancelling any run in flight. Returns the new generation.
    pub fn trigger(&mut self, store: &ViewStore) -> u64 {
        self.abort_in_flight();
        self.generation += 1;
        let generation = self.generation;

        let state = store.state();
        let config = store.layout().config;
        let request = LayoutRequest {
            algorithm: config.algorithm,
            params: config.params,
            nodes: state.movable_nodes(),
            edges: state.graph.edge_endpoints(),
            anchors: state.anchors(),
            seed: state.positions.clone(),
            viewport: self.viewport,
        };
        log::debug!(
            "layout generation {generation}: {} over {} movable nodes, {} anchors",
            config.algorithm.label(),
            request.nodes.len(),
            request.anchors.len()
        );

        let engine = Arc::clone(&self.engine);
        let tx = self.tx.clone();
        let pre_layout = config.pre_layout;
        let handle = tokio::spawn(async move {
            let outcome = tokio::task::spawn_blocking(move || run(engine.as_ref(), request, pre_layout))
                .await
                .unwrap_or_else(|err| Err(LayoutError::Failed(format!("layout task failed: {err}"))));
            // The receiver lives as long as the orchestrator.
            let _ = tx.send(LayoutResult { generation, outcome });
        });
        self.in_flight = Some(handle.abort_handle());
        self.status = RunStatus::Running;
        generation
    }

    /// Switch algorithm, resetting parameters to its defaults unless matching
    /// overrides are supplied, and start a run.
    pub fn set_algorithm(
        &mut self,
        store: &mut ViewStore,
        algorithm: LayoutAlgorithm,
        overrides: Option<LayoutParams>,
    ) -> u64 {
        let mut config = store.layout().config;
        config.switch_to(algorithm, overrides);
        store.set_layout_config(config);
        self.trigger(store)
    }

    /// Change the current algorithm's parameters and start a run.
    pub fn set_params(&mut self, store: &mut ViewStore, params: LayoutParams) -> Result<u64, LayoutError> {
        let mut config = store.layout().config;
        if !params.fits(config.algorithm) {
            return Err(LayoutError::ParamsMismatch {
                expected: config.algorithm.label(),
            });
        }
        config.params = params;
        store.set_layout_config(config);
        Ok(self.trigger(store))
    }

    pub fn set_pre_layout(&mut self, store: &mut ViewStore, pre_layout: Option<PreLayout>) -> u64 {
        let mut config = store.layout().config;
        config.pre_layout = pre_layout;
        store.set_layout_config(config);
        self.trigger(store)
    }

    pub fn rerun(&mut self, store: &ViewStore) -> u64 {
        self.trigger(store)
    }

    /// Cancel the run in flight, if any. Any result it still delivers is stale.
    pub fn cancel(&mut self) {
        if self.abort_in_flight() {
            self.generation += 1;
        }
    }

    fn abort_in_flight(&mut self) -> bool {
        let Some(handle) = self.in_flight.take() else {
            return false;
        };
        if self.status == RunStatus::Running {
            handle.abort();
            self.status = RunStatus::Cancelled;
            log::debug!("layout generation {} cancelled", self.generation);
            true
        } else {
            false
        }
    }

    /// Merge a delivered result if it is still current. Returns whether
    /// positions were applied.
    pub fn handle(&mut self, store: &mut ViewStore, result: LayoutResult) -> bool {
        if result.generation != self.generation {
            log::debug!(
                "dropping stale layout result for generation {} (current {})",
                result.generation,
                self.generation
            );
            return false;
        }
        self.in_flight = None;
        match result.outcome {
            Ok(positions) => {
                store.apply_layout(result.generation, positions);
                self.status = RunStatus::Completed;
                true
            }
            Err(err) => {
                log::warn!("layout generation {} failed: {err}", result.generation);
                self.status = RunStatus::Cancelled;
                false
            }
        }
    }

    /// Merge every result delivered so far without waiting.
    pub fn drain(&mut self, store: &mut ViewStore) -> usize {
        let mut applied = 0;
        while let Ok(result) = self.rx.try_recv() {
            if self.handle(store, result) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait until the current run finishes and merge its result.
    pub async fn settle(&mut self, store: &mut ViewStore) -> RunStatus {
        while self.status == RunStatus::Running {
            match self.rx.recv().await {
                Some(result) => {
                    self.handle(store, result);
                }
                None => break,
            }
        }
        self.status
    }
}

impl Drop for LayoutOrchestrator {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

/// Run the optional pre-layout to completion, seed the primary run with its
/// output, then run the primary algorithm.
fn run(engine: &dyn LayoutEngine, mut request: LayoutRequest, pre_layout: Option<PreLayout>) -> Result<Positions, LayoutError> {
    if let Some(pre) = pre_layout {
        let seed = engine.compute(&request.with_algorithm(pre.algorithm, pre.params))?;
        request.seed.extend(seed);
    }
    engine.compute(&request)
}
