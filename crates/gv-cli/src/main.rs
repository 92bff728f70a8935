//! gv-explore: run an exploration script against a temporal graph fixture.
//!
//! ```text
//! gv-explore [--config <config.json>] [--name <graph>] <graph.json> [script]
//! ```
//!
//! The graph file is a JSON array of timed node and edge updates. The script
//! is read from the given file, or from stdin when omitted. Each `print` or
//! `save` step writes one result to stdout; failed steps are logged and the
//! script carries on. Set `RUST_LOG=debug` to watch layout runs and stale
//! responses.

mod report;
mod script;

use gv_core::{ViewError, ViewResult};
use gv_engine::{ExplorerSession, InMemoryGraphService, SessionConfig, TemporalGraph};
use std::io::Read;
use std::path::{Path, PathBuf};

const USAGE: &str = "usage: gv-explore [--config <config.json>] [--name <graph>] <graph.json> [script]";

#[derive(Debug, Default, PartialEq)]
struct Options {
    config: Option<PathBuf>,
    name: Option<String>,
    graph: PathBuf,
    script: Option<PathBuf>,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut options = Options::default();
        let mut positional = Vec::new();
        let mut args = args.iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args.next().ok_or("--config needs a path")?;
                    options.config = Some(PathBuf::from(path));
                }
                "--name" => {
                    let name = args.next().ok_or("--name needs a value")?;
                    options.name = Some(name.clone());
                }
                flag if flag.starts_with("--") => return Err(format!("unknown flag `{flag}`")),
                _ => positional.push(PathBuf::from(arg)),
            }
        }
        let mut positional = positional.into_iter();
        options.graph = positional.next().ok_or("missing graph file")?;
        options.script = positional.next();
        if let Some(extra) = positional.next() {
            return Err(format!("unexpected argument `{}`", extra.display()));
        }
        Ok(options)
    }

    /// Graph name used by the service; defaults to the graph file's stem.
    fn graph_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.graph
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("graph")
                .to_string()
        })
    }
}

fn read(path: &Path) -> ViewResult<String> {
    std::fs::read_to_string(path).map_err(|e| ViewError::Persistence(format!("{}: {e}", path.display())))
}

async fn run(options: Options) -> ViewResult<()> {
    let config = match &options.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    let graph = TemporalGraph::from_json(&read(&options.graph)?)?;
    let name = options.graph_name();
    log::info!(
        "loaded `{name}`: {} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    );

    let text = match &options.script {
        Some(path) => read(path)?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| ViewError::Persistence(format!("stdin: {e}")))?;
            text
        }
    };
    let steps = script::parse_script(&text)?;

    let service = InMemoryGraphService::new().with_graph(&name, graph);
    let mut session = ExplorerSession::new(service, &name, config);
    for step in &steps {
        match step.run(&mut session).await {
            Ok(Some(output)) => println!("{output}"),
            Ok(None) => {}
            Err(err) => log::warn!("{step:?}: {err}"),
        }
        // Scripts observe settled layouts.
        session.settle_layout().await;
    }
    session.close();
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{USAGE}");
        return;
    }
    let options = match Options::parse(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("gv-explore: {e}");
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };
    if let Err(e) = run(options).await {
        eprintln!("gv-explore: {e}");
        std::process::exit(1);
    }
}
