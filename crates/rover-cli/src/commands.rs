use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use rover_fs::{FsConfig, FsContext, Namespace, Node, NodeKind};
use rover_graph::GraphFixture;
use tracing::{debug, info};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Mount(args) => cmd_mount(args),
        Command::Ls(args) => cmd_ls(args, cli.format),
        Command::Cat(args) => cmd_cat(args),
        Command::Config(args) => cmd_config(args, cli.format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<FsConfig> {
    match path {
        Some(path) => FsConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(FsConfig::default()),
    }
}

fn open_namespace(graph: &Path, config: FsConfig) -> anyhow::Result<Namespace> {
    let fixture = GraphFixture::from_path(graph)
        .with_context(|| format!("reading graph fixture {}", graph.display()))?;
    let graph = Arc::new(fixture.build().context("building graph")?);
    debug!(
        permanodes = graph.permanode_count(),
        files = graph.file_count(),
        "graph loaded"
    );
    Ok(Namespace::new(FsContext::from_backend(graph, config)))
}

fn cmd_mount(args: MountArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if args.allow_other {
        config = config.with_allow_other(true);
    }
    let namespace = open_namespace(&args.graph, config)?;
    info!(graph = %args.graph.display(), mountpoint = %args.mountpoint.display(), "mount");
    println!(
        "{} Mounting {} at {}",
        "→".cyan(),
        args.graph.display().to_string().bold(),
        args.mountpoint.display().to_string().yellow()
    );
    rover_fs::mount(namespace, &args.mountpoint)?;
    println!("{} Unmounted.", "✓".green());
    Ok(())
}

/// One line of `rover ls`.
#[derive(Debug, PartialEq)]
struct ListingRow {
    name: String,
    kind: NodeKind,
    ino: u64,
    size: u64,
}

fn kind_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Directory => "dir",
        NodeKind::File => "file",
        NodeKind::Symlink => "symlink",
    }
}

/// The rows for `node`: its entries if it is a directory, itself otherwise.
fn listing(node: &Node) -> anyhow::Result<Vec<ListingRow>> {
    let row = |name: String, node: &Node| -> anyhow::Result<ListingRow> {
        let attr = node.attr()?;
        Ok(ListingRow {
            name,
            kind: attr.kind,
            ino: attr.ino,
            size: attr.size,
        })
    };
    if node.kind() != NodeKind::Directory {
        return Ok(vec![row(node.name().to_string(), node)?]);
    }
    node.read_dir()?
        .into_iter()
        .map(|entry| {
            let child = node.lookup(&entry.name)?;
            row(entry.name, &child)
        })
        .collect()
}

fn cmd_ls(args: LsArgs, format: OutputFormat) -> anyhow::Result<()> {
    info!(graph = %args.graph.display(), path = %args.path, "ls");
    let namespace = open_namespace(&args.graph, load_config(args.config.as_deref())?)?;
    let node = namespace
        .resolve(&args.path)
        .with_context(|| format!("resolving {}", args.path))?;
    let rows = listing(&node)?;

    match format {
        OutputFormat::Json => {
            let json: Vec<_> = rows
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "name": r.name,
                        "kind": kind_label(r.kind),
                        "ino": r.ino,
                        "size": r.size,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            for r in &rows {
                let name = match r.kind {
                    NodeKind::Directory => r.name.blue().bold(),
                    NodeKind::Symlink => r.name.cyan(),
                    NodeKind::File => r.name.normal(),
                };
                println!(
                    "{:<8} {:>20} {:>10}  {}",
                    kind_label(r.kind),
                    r.ino.to_string().dimmed(),
                    r.size,
                    name
                );
            }
        }
    }
    Ok(())
}

fn cmd_cat(args: CatArgs) -> anyhow::Result<()> {
    info!(graph = %args.graph.display(), path = %args.path, "cat");
    let namespace = open_namespace(&args.graph, load_config(args.config.as_deref())?)?;
    let node = namespace
        .resolve(&args.path)
        .with_context(|| format!("resolving {}", args.path))?;
    if node.kind() == NodeKind::Symlink {
        println!("{}", node.readlink()?);
        return Ok(());
    }
    let mut opened = node
        .open(libc::O_RDONLY)
        .with_context(|| format!("opening {}", args.path))?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    io::copy(&mut opened.reader, &mut out)?;
    out.flush()?;
    Ok(())
}

fn cmd_config(args: ConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => print!("{}", config.to_toml_string()?),
    }
    Ok(())
}
