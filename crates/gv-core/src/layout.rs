//! Layout contracts and the built-in algorithms.
//!
//! A layout engine receives the movable node set, every edge, the positions
//! of pinned nodes (fixed anchors) and optional seed positions, and returns a
//! position for each movable node. The engines here are deliberately simple;
//! callers only rely on the input/output contract.

use crate::error::LayoutError;
use crate::id::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::f32::consts::TAU;

/// The canvas (viewport) dimensions. Layouts are centered in it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

impl Viewport {
    fn center(&self) -> (f32, f32) {
        (self.width / 2.0, self.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

pub type Positions = HashMap<EntityId, Position>;

// ─── Algorithms & parameters ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutAlgorithm {
    #[default]
    Default,
    Concentric,
    ForceBased,
    HierarchicalTd,
    HierarchicalLr,
}

impl LayoutAlgorithm {
    pub const ALL: [LayoutAlgorithm; 5] = [
        LayoutAlgorithm::Default,
        LayoutAlgorithm::Concentric,
        LayoutAlgorithm::ForceBased,
        LayoutAlgorithm::HierarchicalTd,
        LayoutAlgorithm::HierarchicalLr,
    ];

    /// Menu label, e.g. `"Concentric Layout"`.
    pub fn label(self) -> &'static str {
        match self {
            LayoutAlgorithm::Default => "Default Layout",
            LayoutAlgorithm::Concentric => "Concentric Layout",
            LayoutAlgorithm::ForceBased => "Force Based Layout",
            LayoutAlgorithm::HierarchicalTd => "Hierarchical TD Layout",
            LayoutAlgorithm::HierarchicalLr => "Hierarchical LR Layout",
        }
    }

    /// Accepts a menu label or the snake_case identifier.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|a| {
            a.label().eq_ignore_ascii_case(name)
                || serde_json::to_value(a)
                    .ok()
                    .and_then(|v| v.as_str().map(|s| s == name))
                    .unwrap_or(false)
        })
    }

    pub fn default_params(self) -> LayoutParams {
        match self {
            LayoutAlgorithm::Default => LayoutParams::Grid { spacing: 80.0 },
            LayoutAlgorithm::Concentric => LayoutParams::Concentric {
                clockwise: false,
                equidistant: false,
                prevent_overlap: false,
                min_node_spacing: 50.0,
            },
            LayoutAlgorithm::ForceBased => LayoutParams::Force {
                link_distance: 120.0,
                collision_radius: 20.0,
                many_body_strength: 1.0,
                iterations: 150,
            },
            LayoutAlgorithm::HierarchicalTd | LayoutAlgorithm::HierarchicalLr => LayoutParams::Hierarchical {
                rank_sep: 100.0,
                node_sep: 80.0,
                invert: false,
                alignment: Alignment::UpperLeft,
                ranker: RankingMode::NetworkSimplex,
                retain_control_points: false,
            },
        }
    }

    /// Whether the algorithm starts from seed positions (pre-layout output).
    pub fn accepts_seed(self) -> bool {
        matches!(self, LayoutAlgorithm::ForceBased)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RankingMode {
    #[default]
    NetworkSimplex,
    TightTree,
    LongestPath,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[default]
    UpperLeft,
    UpperRight,
    DownLeft,
    DownRight,
}

/// Algorithm-specific parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutParams {
    Grid {
        spacing: f32,
    },
    Concentric {
        clockwise: bool,
        equidistant: bool,
        prevent_overlap: bool,
        min_node_spacing: f32,
    },
    Force {
        link_distance: f32,
        collision_radius: f32,
        many_body_strength: f32,
        iterations: u32,
    },
    Hierarchical {
        rank_sep: f32,
        node_sep: f32,
        invert: bool,
        alignment: Alignment,
        ranker: RankingMode,
        retain_control_points: bool,
    },
}

impl LayoutParams {
    pub fn fits(&self, algorithm: LayoutAlgorithm) -> bool {
        matches!(
            (self, algorithm),
            (LayoutParams::Grid { .. }, LayoutAlgorithm::Default)
                | (LayoutParams::Concentric { .. }, LayoutAlgorithm::Concentric)
                | (LayoutParams::Force { .. }, LayoutAlgorithm::ForceBased)
                | (
                    LayoutParams::Hierarchical { .. },
                    LayoutAlgorithm::HierarchicalTd | LayoutAlgorithm::HierarchicalLr
                )
        )
    }
}

/// A cheaper layout run to completion first; its output seeds the primary one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreLayout {
    pub algorithm: LayoutAlgorithm,
    pub params: LayoutParams,
}

/// The persisted part of the layout state: which algorithm, with what settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub algorithm: LayoutAlgorithm,
    pub params: LayoutParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_layout: Option<PreLayout>,
}

impl LayoutConfig {
    pub fn for_algorithm(algorithm: LayoutAlgorithm) -> Self {
        Self {
            algorithm,
            params: algorithm.default_params(),
            pre_layout: None,
        }
    }

    /// Switch algorithm. Parameters reset to the new algorithm's defaults
    /// unless matching overrides are supplied.
    pub fn switch_to(&mut self, algorithm: LayoutAlgorithm, overrides: Option<LayoutParams>) {
        self.algorithm = algorithm;
        self.params = match overrides {
            Some(p) if p.fits(algorithm) => p,
            _ => algorithm.default_params(),
        };
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::for_algorithm(LayoutAlgorithm::Default)
    }
}

// ─── Engine contract ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LayoutRequest {
    pub algorithm: LayoutAlgorithm,
    pub params: LayoutParams,
    /// Nodes the engine should position.
    pub nodes: Vec<EntityId>,
    /// Every edge of the view, between movable nodes and/or anchors.
    pub edges: Vec<(EntityId, EntityId)>,
    /// Pinned nodes: fixed obstacles, never repositioned.
    pub anchors: Positions,
    /// Initial positions for algorithms that refine an existing layout.
    pub seed: Positions,
    pub viewport: Viewport,
}

impl LayoutRequest {
    /// The same request re-targeted at a different algorithm.
    pub fn with_algorithm(&self, algorithm: LayoutAlgorithm, params: LayoutParams) -> Self {
        Self {
            algorithm,
            params,
            ..self.clone()
        }
    }
}

pub trait LayoutEngine: Send + Sync {
    /// Compute a position for every node in `request.nodes`.
    fn compute(&self, request: &LayoutRequest) -> Result<Positions, LayoutError>;
}

/// The stock algorithms.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinLayouts;

impl LayoutEngine for BuiltinLayouts {
    fn compute(&self, request: &LayoutRequest) -> Result<Positions, LayoutError> {
        if !request.params.fits(request.algorithm) {
            return Err(LayoutError::ParamsMismatch {
                expected: request.algorithm.label(),
            });
        }
        let mut nodes = request.nodes.clone();
        nodes.sort();
        nodes.dedup();
        if nodes.is_empty() {
            return Ok(Positions::new());
        }

        let positions = match request.params {
            LayoutParams::Grid { spacing } => grid(&nodes, spacing, request.viewport),
            LayoutParams::Concentric {
                clockwise,
                equidistant,
                prevent_overlap,
                min_node_spacing,
            } => concentric(
                &nodes,
                &request.edges,
                Ring {
                    clockwise,
                    equidistant,
                    prevent_overlap,
                    spacing: min_node_spacing,
                },
                request.viewport,
            ),
            LayoutParams::Force {
                link_distance,
                collision_radius,
                many_body_strength,
                iterations,
            } => force(
                &nodes,
                request,
                Forces {
                    link_distance,
                    collision_radius,
                    strength: many_body_strength,
                    iterations,
                },
            ),
            LayoutParams::Hierarchical {
                rank_sep,
                node_sep,
                invert,
                alignment,
                ranker,
                ..
            } => hierarchical(
                &nodes,
                &request.edges,
                Ranks {
                    rank_sep,
                    node_sep,
                    invert,
                    alignment,
                    ranker,
                    left_to_right: request.algorithm == LayoutAlgorithm::HierarchicalLr,
                },
                request.viewport,
            ),
        };
        log::trace!(
            "{}: placed {} nodes around {} anchors",
            request.algorithm.label(),
            positions.len(),
            request.anchors.len()
        );
        Ok(positions)
    }
}

// ─── Grid ────────────────────────────────────────────────────────────────

fn grid(nodes: &[EntityId], spacing: f32, viewport: Viewport) -> Positions {
    let cols = (nodes.len() as f32).sqrt().ceil().max(1.0) as usize;
    let rows = nodes.len().div_ceil(cols);
    let (cx, cy) = viewport.center();
    let x0 = cx - (cols - 1) as f32 * spacing / 2.0;
    let y0 = cy - (rows - 1) as f32 * spacing / 2.0;

    nodes
        .iter()
        .enumerate()
        .map(|(i, &id)| {
            let (row, col) = (i / cols, i % cols);
            (id, Position::new(x0 + col as f32 * spacing, y0 + row as f32 * spacing))
        })
        .collect()
}

// ─── Concentric ──────────────────────────────────────────────────────────

struct Ring {
    clockwise: bool,
    equidistant: bool,
    prevent_overlap: bool,
    spacing: f32,
}

fn degrees(edges: &[(EntityId, EntityId)]) -> HashMap<EntityId, usize> {
    let mut degree = HashMap::new();
    for &(s, d) in edges {
        *degree.entry(s).or_insert(0) += 1;
        *degree.entry(d).or_insert(0) += 1;
    }
    degree
}

/// Highest-degree nodes in the middle, lower degrees on outer rings.
fn concentric(nodes: &[EntityId], edges: &[(EntityId, EntityId)], ring: Ring, viewport: Viewport) -> Positions {
    let degree = degrees(edges);
    let mut ordered = nodes.to_vec();
    ordered.sort_by(|a, b| {
        let da = degree.get(a).copied().unwrap_or(0);
        let db = degree.get(b).copied().unwrap_or(0);
        db.cmp(&da).then_with(|| a.cmp(b))
    });

    let (cx, cy) = viewport.center();
    let gap = ring.spacing * 1.5;
    let direction = if ring.clockwise { 1.0 } else { -1.0 };
    let mut positions = Positions::new();
    let mut placed = 0usize;
    let mut level = 0usize;

    while placed < ordered.len() {
        let mut radius = level as f32 * gap;
        let capacity = if level == 0 {
            1
        } else if ring.prevent_overlap {
            ((TAU * radius) / ring.spacing).floor().max(1.0) as usize
        } else {
            level * 8
        };
        let count = capacity.min(ordered.len() - placed);
        if !ring.equidistant && level > 0 {
            // Spread crowded rings out so arc spacing never drops below `spacing`.
            radius = radius.max(count as f32 * ring.spacing / TAU);
        }
        for (i, &id) in ordered[placed..placed + count].iter().enumerate() {
            let angle = direction * TAU * i as f32 / count as f32;
            positions.insert(
                id,
                Position::new(cx + radius * angle.cos(), cy + radius * angle.sin()),
            );
        }
        placed += count;
        level += 1;
    }
    positions
}

// ─── Hierarchical ────────────────────────────────────────────────────────

struct Ranks {
    rank_sep: f32,
    node_sep: f32,
    invert: bool,
    alignment: Alignment,
    ranker: RankingMode,
    left_to_right: bool,
}

/// Longest-path ranking, bounded to `n` relaxation rounds so cycles cannot
/// push ranks up forever.
fn assign_ranks(nodes: &[EntityId], edges: &[(EntityId, EntityId)], mode: RankingMode) -> HashMap<EntityId, usize> {
    let members: HashSet<EntityId> = nodes.iter().copied().collect();
    let inner: Vec<(EntityId, EntityId)> = edges
        .iter()
        .copied()
        .filter(|(s, d)| s != d && members.contains(s) && members.contains(d))
        .collect();

    let mut rank: HashMap<EntityId, usize> = nodes.iter().map(|&n| (n, 0)).collect();
    for _ in 0..nodes.len() {
        let mut changed = false;
        for &(s, d) in &inner {
            let candidate = rank[&s] + 1;
            if candidate > rank[&d] && candidate < nodes.len() {
                rank.insert(d, candidate);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    if mode != RankingMode::LongestPath {
        // Tighten: pull sources down next to their closest successor.
        for &n in nodes {
            let has_incoming = inner.iter().any(|&(_, d)| d == n);
            if has_incoming {
                continue;
            }
            let closest = inner
                .iter()
                .filter(|&&(s, _)| s == n)
                .map(|&(_, d)| rank[&d])
                .min();
            if let Some(r) = closest.filter(|&r| r > 0) {
                rank.insert(n, r - 1);
            }
        }
    }
    rank
}

fn hierarchical(nodes: &[EntityId], edges: &[(EntityId, EntityId)], opts: Ranks, viewport: Viewport) -> Positions {
    let rank = assign_ranks(nodes, edges, opts.ranker);
    let mut buckets: BTreeMap<usize, Vec<EntityId>> = BTreeMap::new();
    for &n in nodes {
        buckets.entry(rank[&n]).or_default().push(n);
    }
    let depth = buckets.keys().next_back().copied().unwrap_or(0);
    let widest = buckets.values().map(Vec::len).max().unwrap_or(1);

    let (cx, cy) = viewport.center();
    let mut positions = Positions::new();
    for (&r, members) in &mut buckets {
        if matches!(opts.alignment, Alignment::DownLeft | Alignment::DownRight) {
            members.reverse();
        }
        let level = if opts.invert { depth - r } else { r };
        let slack = (widest - members.len()) as f32 * opts.node_sep;
        let offset = match opts.alignment {
            Alignment::UpperLeft | Alignment::DownLeft => 0.0,
            Alignment::UpperRight | Alignment::DownRight => slack,
        };
        for (i, &id) in members.iter().enumerate() {
            let across = offset + i as f32 * opts.node_sep - (widest - 1) as f32 * opts.node_sep / 2.0;
            let along = level as f32 * opts.rank_sep - depth as f32 * opts.rank_sep / 2.0;
            let pos = if opts.left_to_right {
                Position::new(cx + along, cy + across)
            } else {
                Position::new(cx + across, cy + along)
            };
            positions.insert(id, pos);
        }
    }
    positions
}

// ─── Force ───────────────────────────────────────────────────────────────

struct Forces {
    link_distance: f32,
    collision_radius: f32,
    strength: f32,
    iterations: u32,
}

/// Fruchterman–Reingold with anchors: pinned nodes repel and attract but
/// never move.
fn force(nodes: &[EntityId], request: &LayoutRequest, f: Forces) -> Positions {
    let (cx, cy) = request.viewport.center();
    let n = nodes.len();
    let mut pos: HashMap<EntityId, Position> = nodes
        .iter()
        .enumerate()
        .map(|(i, &id)| {
            let start = request.seed.get(&id).copied().unwrap_or_else(|| {
                let angle = TAU * i as f32 / n as f32;
                let r = f.link_distance * (n as f32).sqrt() / 2.0;
                Position::new(cx + r * angle.cos(), cy + r * angle.sin())
            });
            (id, start)
        })
        .collect();

    let movable: HashSet<EntityId> = nodes.iter().copied().collect();
    let all: Vec<EntityId> = nodes
        .iter()
        .copied()
        .chain(request.anchors.keys().copied().filter(|a| !movable.contains(a)))
        .collect();
    let at = |pos: &HashMap<EntityId, Position>, id: &EntityId| pos.get(id).or_else(|| request.anchors.get(id)).copied();

    let k = f.link_distance.max(1.0);
    let mut temperature = k;
    for _ in 0..f.iterations {
        let mut disp: HashMap<EntityId, (f32, f32)> = nodes.iter().map(|&id| (id, (0.0, 0.0))).collect();

        for &a in nodes {
            let Some(pa) = at(&pos, &a) else { continue };
            for &b in &all {
                if a == b {
                    continue;
                }
                let Some(pb) = at(&pos, &b) else { continue };
                let (mut dx, mut dy) = (pa.x - pb.x, pa.y - pb.y);
                let mut d = (dx * dx + dy * dy).sqrt();
                if d < 0.01 {
                    // Coincident: nudge deterministically by id order.
                    dx = if a < b { 0.1 } else { -0.1 };
                    dy = 0.0;
                    d = 0.1;
                }
                let mut push = f.strength * k * k / d;
                if d < 2.0 * f.collision_radius {
                    push += 2.0 * f.collision_radius - d;
                }
                let entry = disp.entry(a).or_insert((0.0, 0.0));
                entry.0 += dx / d * push;
                entry.1 += dy / d * push;
            }
        }

        for &(s, t) in &request.edges {
            let (Some(ps), Some(pt)) = (at(&pos, &s), at(&pos, &t)) else {
                continue;
            };
            let (dx, dy) = (ps.x - pt.x, ps.y - pt.y);
            let d = (dx * dx + dy * dy).sqrt().max(0.01);
            let pull = d * d / k;
            if let Some(e) = disp.get_mut(&s) {
                e.0 -= dx / d * pull;
                e.1 -= dy / d * pull;
            }
            if let Some(e) = disp.get_mut(&t) {
                e.0 += dx / d * pull;
                e.1 += dy / d * pull;
            }
        }

        for (&id, &(dx, dy)) in &disp {
            let len = (dx * dx + dy * dy).sqrt();
            if len < f32::EPSILON {
                continue;
            }
            if let Some(p) = pos.get_mut(&id) {
                let step = len.min(temperature);
                p.x += dx / len * step;
                p.y += dy / len * step;
            }
        }
        temperature = (temperature * 0.95).max(1.0);
    }
    pos
}
