//! Exploration scripts: one intent per line.
//!
//! ```text
//! # comments and blank lines are skipped
//! expand Pedro
//! select Pedro
//! select+ Hamza
//! shared
//! search Person where ID Includes "Pe"
//! search-edges dst=Pometry layers=founds from=1687000000000
//! add-results
//! type-style node Person #FF0000 12
//! layout concentric
//! print
//! ```

use gv_core::{
    Color, Condition, DateRange, EntityId, EntityStyle, LayoutAlgorithm, SavedGraph, StyleKey, Timestamp, ViewError,
    ViewResult, parse_conditions,
};
use gv_engine::{ExplorerSession, GraphService, SelectionMode};
use std::path::{Path, PathBuf};
use winnow::ascii::space0;
use winnow::combinator::{alt, delimited};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Expand(EntityId),
    TwoHop(EntityId),
    Select { ids: Vec<EntityId>, mode: SelectionMode },
    SelectAll,
    Deselect,
    Shared,
    Similar(EntityId),
    Search {
        node_type: Option<String>,
        conditions: Vec<Condition>,
        range: Option<DateRange>,
    },
    SearchEdges {
        src: Option<String>,
        dst: Option<String>,
        layers: Vec<String>,
        range: Option<DateRange>,
    },
    NextPage,
    PrevPage,
    ClearSearch,
    AddResults,
    Delete,
    Pin(EntityId),
    Style { id: EntityId, style: EntityStyle },
    TypeStyle { key: StyleKey, style: EntityStyle },
    ResetTypeStyle(StyleKey),
    Layout(LayoutAlgorithm),
    Rerun,
    Undo,
    Redo,
    Collapse(EntityId),
    Save(PathBuf),
    Print,
}

/// Parse a whole script. Errors carry the 1-based line number.
pub fn parse_script(input: &str) -> ViewResult<Vec<Step>> {
    input
        .lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| parse_step(line).map_err(|e| ViewError::Parse(format!("line {n}: {e}"))))
        .collect()
}

pub fn parse_step(line: &str) -> Result<Step, String> {
    let mut rest = line.trim();
    let command = token(&mut rest)?;
    let step = match command.as_str() {
        "expand" => Step::Expand(id(&mut rest)?),
        "two-hop" => Step::TwoHop(id(&mut rest)?),
        "select" | "select+" => {
            let mut ids = Vec::new();
            while !rest.trim().is_empty() {
                ids.push(id(&mut rest)?);
            }
            let mode = if command == "select+" {
                SelectionMode::Add
            } else {
                SelectionMode::Replace
            };
            Step::Select { ids, mode }
        }
        "select-all" => Step::SelectAll,
        "deselect" => Step::Deselect,
        "shared" => Step::Shared,
        "similar" => Step::Similar(id(&mut rest)?),
        "search" => search(&mut rest)?,
        "search-edges" => search_edges(&mut rest)?,
        "next" => Step::NextPage,
        "prev" => Step::PrevPage,
        "clear" => Step::ClearSearch,
        "add-results" => Step::AddResults,
        "delete" => Step::Delete,
        "pin" => Step::Pin(id(&mut rest)?),
        "style" => {
            let id = id(&mut rest)?;
            Step::Style {
                id,
                style: style(&mut rest)?,
            }
        }
        "type-style" => {
            let key = style_key(&mut rest)?;
            Step::TypeStyle {
                key,
                style: style(&mut rest)?,
            }
        }
        "reset-type-style" => Step::ResetTypeStyle(style_key(&mut rest)?),
        "layout" => {
            let name = rest.trim();
            rest = "";
            Step::Layout(LayoutAlgorithm::from_name(name).ok_or_else(|| format!("unknown layout `{name}`"))?)
        }
        "rerun" => Step::Rerun,
        "undo" => Step::Undo,
        "redo" => Step::Redo,
        "collapse" => Step::Collapse(id(&mut rest)?),
        "save" => Step::Save(PathBuf::from(token(&mut rest)?)),
        "print" => Step::Print,
        other => return Err(format!("unknown command `{other}`")),
    };
    if !rest.trim().is_empty() {
        return Err(format!("unexpected `{}` after `{command}`", rest.trim()));
    }
    Ok(step)
}

// ─── Arguments ───────────────────────────────────────────────────────────

/// A bare word or a double-quoted string.
fn token(input: &mut &str) -> Result<String, String> {
    let _ = space0::<_, ContextError>.parse_next(input);
    alt((
        delimited('"', take_till(0.., '"'), '"'),
        take_while(1.., |c: char| !c.is_whitespace()),
    ))
    .map(str::to_string)
    .parse_next(input)
    .map_err(|_: winnow::error::ErrMode<ContextError>| "expected an argument".to_string())
}

fn id(input: &mut &str) -> Result<EntityId, String> {
    token(input).map(|s| EntityId::intern(&s))
}

/// `key=value` options up to the end of the line or a `where` clause.
fn options(input: &mut &str) -> Result<Vec<(String, String)>, String> {
    let mut options = Vec::new();
    loop {
        let trimmed = input.trim_start();
        if trimmed.is_empty() || trimmed == "where" || trimmed.starts_with("where ") {
            *input = trimmed;
            return Ok(options);
        }
        let word = token(input)?;
        let (key, value) = word
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, found `{word}`"))?;
        options.push((key.to_string(), value.to_string()));
    }
}

fn timestamp(value: &str) -> Result<Timestamp, String> {
    value.parse().map_err(|_| format!("invalid timestamp `{value}`"))
}

fn date_range(options: &[(String, String)]) -> Result<Option<DateRange>, String> {
    let mut range = DateRange::default();
    for (key, value) in options {
        match key.as_str() {
            "from" => range.start = Some(timestamp(value)?),
            "to" => range.end = Some(timestamp(value)?),
            _ => {}
        }
    }
    Ok((!range.is_unbounded()).then_some(range))
}

fn check_keys(options: &[(String, String)], allowed: &[&str]) -> Result<(), String> {
    match options.iter().find(|(k, _)| !allowed.contains(&k.as_str())) {
        Some((key, _)) => Err(format!("unknown option `{key}`")),
        None => Ok(()),
    }
}

/// `search <type|*> [from=T] [to=T] [where <conditions>]`
fn search(input: &mut &str) -> Result<Step, String> {
    let node_type = token(input)?;
    let opts = options(input)?;
    check_keys(&opts, &["from", "to"])?;
    let conditions = match input.strip_prefix("where") {
        Some(clause) => {
            *input = "";
            let clause = clause.trim();
            if clause.is_empty() {
                return Err("missing conditions after `where`".to_string());
            }
            parse_conditions(clause).map_err(|e| e.to_string())?
        }
        None => Vec::new(),
    };
    Ok(Step::Search {
        node_type: (node_type != "*").then_some(node_type),
        conditions,
        range: date_range(&opts)?,
    })
}

/// `search-edges [src=ID] [dst=ID] [layers=a,b] [from=T] [to=T]`
fn search_edges(input: &mut &str) -> Result<Step, String> {
    let opts = options(input)?;
    check_keys(&opts, &["src", "dst", "layers", "from", "to"])?;
    let get = |key: &str| opts.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
    Ok(Step::SearchEdges {
        src: get("src"),
        dst: get("dst"),
        layers: get("layers")
            .map(|l| l.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
        range: date_range(&opts)?,
    })
}

/// `<#color> [size]`
fn style(input: &mut &str) -> Result<EntityStyle, String> {
    let hex = token(input)?;
    let color = Color::from_hex(&hex).ok_or_else(|| format!("invalid color `{hex}`"))?;
    let mut style = EntityStyle::color(color);
    if !input.trim().is_empty() {
        let size = token(input)?;
        style.size = Some(size.parse().map_err(|_| format!("invalid size `{size}`"))?);
    }
    Ok(style)
}

/// `node <type>` or `edge <layer>`
fn style_key(input: &mut &str) -> Result<StyleKey, String> {
    let kind = token(input)?;
    let name = token(input)?;
    match kind.as_str() {
        "node" => Ok(StyleKey::NodeType(name)),
        "edge" => Ok(StyleKey::EdgeLayer(name)),
        other => Err(format!("expected `node` or `edge`, found `{other}`")),
    }
}

// ─── Execution ───────────────────────────────────────────────────────────

impl Step {
    /// Perform the step. `Print` and `Save` return a line of output.
    pub async fn run<S: GraphService>(&self, session: &mut ExplorerSession<S>) -> ViewResult<Option<String>> {
        match self {
            Step::Expand(node) => {
                session.expand_neighbours(*node).await?;
            }
            Step::TwoHop(node) => {
                session.expand_two_hop(*node).await?;
            }
            Step::Select { ids, mode } => {
                session.select(ids, *mode);
            }
            Step::SelectAll => {
                session.select_all();
            }
            Step::Deselect => {
                session.deselect_all();
            }
            Step::Shared => {
                session.shared_neighbours().await?;
            }
            Step::Similar(id) => {
                session.select_similar(*id).await?;
            }
            Step::Search {
                node_type,
                conditions,
                range,
            } => {
                let mut spec = session.node_filter(node_type.as_deref(), conditions.clone());
                spec.date_range = *range;
                session.search(spec).await?;
            }
            Step::SearchEdges {
                src,
                dst,
                layers,
                range,
            } => {
                let layers: Vec<&str> = layers.iter().map(String::as_str).collect();
                let mut spec = session.edge_filter(src.as_deref(), dst.as_deref(), &layers);
                spec.date_range = *range;
                session.search(spec).await?;
            }
            Step::NextPage => {
                session.next_page().await?;
            }
            Step::PrevPage => {
                session.prev_page().await?;
            }
            Step::ClearSearch => session.clear_search(),
            Step::AddResults => {
                session.add_search_results().await?;
            }
            Step::Delete => {
                session.delete_selected();
            }
            Step::Pin(id) => {
                session.toggle_pin(*id)?;
            }
            Step::Style { id, style } => {
                session.set_instance_style(*id, *style)?;
            }
            Step::TypeStyle { key, style } => {
                session.set_type_style(key.clone(), *style);
            }
            Step::ResetTypeStyle(key) => {
                session.clear_type_style(key.clone());
            }
            Step::Layout(algorithm) => {
                session.set_layout_algorithm(*algorithm, None);
            }
            Step::Rerun => {
                session.rerun_layout();
            }
            Step::Undo => {
                session.undo()?;
            }
            Step::Redo => {
                session.redo()?;
            }
            Step::Collapse(id) => {
                session.collapse(*id)?;
            }
            Step::Save(path) => return save(session, path).map(Some),
            Step::Print => return crate::report::render(session).map(Some),
        }
        Ok(None)
    }
}

/// Write the view as a saved graph; `.msgpack` paths get the binary form.
fn save<S: GraphService>(session: &ExplorerSession<S>, path: &Path) -> ViewResult<String> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(session.graph_name());
    let saved: SavedGraph = session.save(name);
    let bytes = match path.extension().and_then(|e| e.to_str()) {
        Some("msgpack") => saved.to_msgpack()?,
        _ => saved.to_json()?.into_bytes(),
    };
    std::fs::write(path, bytes).map_err(|e| ViewError::Persistence(format!("{}: {e}", path.display())))?;
    Ok(format!("saved {} nodes, {} edges to {}", saved.nodes.len(), saved.edges.len(), path.display()))
}
