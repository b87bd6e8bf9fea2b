//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use graphctx_core::{ContextEngine, KeywordExtractor};
use graphctx_nlp::load_engine;
use graphctx_shared::{AppConfig, ContextMode, RetrievalConfig, init_config, load_config};
use graphctx_storage::LibsqlStore;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::ingest::{prepare, read_document};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Environment variable read when `--db` is not given.
const DB_ENV: &str = "GRAPHCTX_DB";

/// graphctx: retrieve relevant context from a content graph.
#[derive(Parser)]
#[command(
    name = "graphctx",
    version,
    about = "Retrieve the part of a content graph that is relevant to a request.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Retrieve context for a request.
    Context {
        /// Free-text request.
        text: String,

        /// Assembly mode: unrestricted, restricted, or filtered.
        /// Defaults to `retrieval.default_mode` from config.
        #[arg(short, long)]
        mode: Option<String>,

        /// Drop context containing this word (restricted mode, repeatable).
        #[arg(short, long = "restrict")]
        restrict: Vec<String>,

        /// Graph database path (defaults to `store.db_path`).
        #[arg(long, env = DB_ENV)]
        db: Option<PathBuf>,

        /// Stop after this many pages without a match (0 = unbounded).
        #[arg(long)]
        max_rounds: Option<u32>,

        /// Print the context as a JSON array.
        #[arg(long)]
        json: bool,
    },

    /// Show the keywords extracted from a text.
    Keywords {
        /// Free text.
        text: String,
    },

    /// Load an ingest document (nodes + edges JSON) into the graph database.
    Ingest {
        /// Path to the ingest document.
        file: PathBuf,

        /// Graph database path (defaults to `store.db_path`).
        #[arg(long, env = DB_ENV)]
        db: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "graphctx=info",
        1 => "graphctx=debug",
        _ => "graphctx=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so `context --json` output stays machine-readable.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Context {
            text,
            mode,
            restrict,
            db,
            max_rounds,
            json,
        } => {
            let options = ContextOptions {
                mode,
                restrict,
                db,
                max_rounds,
                json,
            };
            cmd_context(&text, options).await
        }
        Command::Keywords { text } => cmd_keywords(&text).await,
        Command::Ingest { file, db } => cmd_ingest(&file, db.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

fn db_path(config: &AppConfig, flag: Option<&Path>) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(config.store.resolved_db_path()?),
    }
}

// ---------------------------------------------------------------------------
// context
// ---------------------------------------------------------------------------

struct ContextOptions {
    mode: Option<String>,
    restrict: Vec<String>,
    db: Option<PathBuf>,
    max_rounds: Option<u32>,
    json: bool,
}

async fn cmd_context(text: &str, options: ContextOptions) -> Result<()> {
    let config = load_config()?;

    let mode = match options.mode.as_deref() {
        Some(raw) => raw.parse::<ContextMode>()?,
        None => config.retrieval.default_mode,
    };
    if mode != ContextMode::Restricted && !options.restrict.is_empty() {
        tracing::warn!(%mode, "--restrict only applies in restricted mode");
    }

    let mut retrieval = RetrievalConfig::from(&config);
    if let Some(rounds) = options.max_rounds {
        retrieval.max_rounds = (rounds > 0).then_some(rounds);
    }

    let path = db_path(&config, options.db.as_deref())?;
    let store = LibsqlStore::open_readonly(&path).await?;
    let nlp = load_engine(&config.nlp.model)?;
    let engine = ContextEngine::new(Arc::new(store), nlp, retrieval)?;

    info!(%mode, db = %path.display(), "retrieving context");
    let context = engine.get_context(text, mode, options.restrict).await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&context)?);
        return Ok(());
    }

    match context {
        Some(items) => {
            for item in items {
                println!("{item}");
            }
        }
        None => println!("No context available."),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// keywords
// ---------------------------------------------------------------------------

async fn cmd_keywords(text: &str) -> Result<()> {
    let config = load_config()?;
    let extractor = KeywordExtractor::new(load_engine(&config.nlp.model)?);

    match extractor.extract(text) {
        Some(keywords) if !keywords.is_empty() => println!("{}", keywords.join(" ")),
        Some(_) => println!("No nouns found."),
        None => println!("Nothing left after removing stop words."),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ingest
// ---------------------------------------------------------------------------

async fn cmd_ingest(file: &Path, db: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let path = db_path(&config, db)?;

    let document = read_document(file)?;
    let graph = prepare(document, chrono::Utc::now())?;

    info!(
        file = %file.display(),
        db = %path.display(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "ingesting graph"
    );

    let store = LibsqlStore::open(&path).await?;
    let progress = ingest_bar(graph.len() as u64);
    let written = store
        .ingest(&graph.nodes, &graph.edges, || progress.inc(1))
        .await;
    progress.finish_and_clear();
    written?;

    let total = store.node_count().await?;
    println!();
    println!("  Graph ingested!");
    println!("  Nodes:  {}", graph.nodes.len());
    println!("  Edges:  {}", graph.edges.len());
    println!("  Total:  {total} nodes in {}", path.display());
    println!();

    Ok(())
}

fn ingest_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    match ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}") {
        Ok(style) => bar.set_style(style.progress_chars("=> ")),
        Err(e) => tracing::debug!(error = %e, "falling back to default progress style"),
    }
    bar.set_message("writing nodes and edges");
    bar
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_context_flags() {
        let cli = Cli::try_parse_from([
            "graphctx",
            "-v",
            "context",
            "weather in New York",
            "--mode",
            "restricted",
            "--restrict",
            "rain",
            "--restrict",
            "snow",
            "--max-rounds",
            "0",
            "--json",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Context {
                text,
                mode,
                restrict,
                max_rounds,
                json,
                ..
            } => {
                assert_eq!(text, "weather in New York");
                assert_eq!(mode.as_deref(), Some("restricted"));
                assert_eq!(restrict, ["rain", "snow"]);
                assert_eq!(max_rounds, Some(0));
                assert!(json);
            }
            _ => panic!("expected context command"),
        }
    }

    #[test]
    fn db_path_reads_environment() {
        // SAFETY: no other test depends on this variable.
        unsafe { std::env::set_var(DB_ENV, "/tmp/from-env.db") };
        let cli = Cli::try_parse_from(["graphctx", "context", "weather"]).unwrap();
        unsafe { std::env::remove_var(DB_ENV) };

        match cli.command {
            Command::Context { db, .. } => assert_eq!(db, Some(PathBuf::from("/tmp/from-env.db"))),
            _ => panic!("expected context command"),
        }
    }

    #[test]
    fn db_flag_overrides_config() {
        let config = AppConfig::default();
        let path = db_path(&config, Some(Path::new("/tmp/graph.db"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/graph.db"));
    }

    #[test]
    fn parses_ingest_and_config() {
        let cli = Cli::try_parse_from(["graphctx", "ingest", "graph.json", "--db", "g.db"]).unwrap();
        assert!(matches!(cli.command, Command::Ingest { .. }));

        let cli = Cli::try_parse_from(["graphctx", "--log-format", "json", "config", "show"]).unwrap();
        assert!(matches!(cli.log_format, LogFormat::Json));
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Show
            }
        ));
    }
}
