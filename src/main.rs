//! tkg CLI: temporal knowledge graph.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use temporal_kg::config::EngineConfig;
use temporal_kg::engine::Engine;
use temporal_kg::paths::TkgPaths;
use temporal_kg::query::TemporalQuery;
use temporal_kg::query::range::TimeRange;
use temporal_kg::report;
use temporal_kg::seeds::{self, SeedPack};
use temporal_kg::temporal::parse_instant;

#[derive(Parser)]
#[command(name = "tkg", version, about = "Temporal knowledge graph")]
struct Cli {
    /// JSON store file (default: config `store_path`, then the XDG data dir).
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/temporal-kg/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API key for the chat-completion endpoint. Overrides the config file.
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract one statement from text and add it.
    Add {
        text: String,
        /// Provenance label stored with the statement.
        #[arg(long)]
        source: Option<String>,
        /// Instant relative dates resolve against (default: now).
        #[arg(long, value_parser = instant_arg)]
        reference: Option<DateTime<Utc>>,
    },

    /// Add every sentence of a text file.
    Ingest {
        #[arg(long)]
        file: PathBuf,
        /// Provenance label (default: the file name).
        #[arg(long)]
        source: Option<String>,
        #[arg(long, value_parser = instant_arg)]
        reference: Option<DateTime<Utc>>,
    },

    /// Statements about an entity, with its timeline.
    Entity {
        name: String,
        /// Only statements valid at this instant.
        #[arg(long, value_parser = instant_arg)]
        at: Option<DateTime<Utc>>,
        /// Only statements with this predicate.
        #[arg(long)]
        predicate: Option<String>,
    },

    /// Statements whose validity overlaps [start, end], inclusive.
    Range {
        #[arg(long, value_parser = instant_arg)]
        start: DateTime<Utc>,
        #[arg(long, value_parser = instant_arg)]
        end: DateTime<Utc>,
        /// Restrict to one entity.
        #[arg(long)]
        entity: Option<String>,
    },

    /// Ask a question; matched statements are summarized by the model.
    Ask {
        question: String,
        /// Answer from this entity's statements only.
        #[arg(long)]
        entity: Option<String>,
        #[arg(long, value_parser = instant_arg)]
        at: Option<DateTime<Utc>>,
    },

    /// Chronological view of an entity.
    Timeline { entity: String },

    /// List known entities.
    Entities,

    /// Show store statistics.
    Stats,

    /// Apply a seed pack.
    Seed {
        /// Bundled pack id.
        #[arg(default_value = "demo")]
        pack: String,
        /// Load the pack from a seed.toml instead.
        #[arg(long)]
        file: Option<PathBuf>,
        /// List bundled packs and exit.
        #[arg(long)]
        list: bool,
    },

    /// Print the effective configuration.
    Config,
}

fn instant_arg(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_instant(s).map_err(|e| e.to_string())
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => TkgPaths::resolve()?.config_file(),
    };
    let mut config = EngineConfig::load_or_default(&path)?;
    if let Some(key) = &cli.api_key {
        config.llm.api_key = Some(key.clone());
    }
    Ok(config)
}

fn store_path(cli: &Cli, config: &EngineConfig) -> Result<PathBuf> {
    if let Some(path) = cli.store.as_ref().or(config.store_path.as_ref()) {
        return Ok(path.clone());
    }
    let paths = TkgPaths::resolve()?;
    paths.ensure_dirs()?;
    Ok(paths.default_store_file())
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if let Commands::Config = cli.command {
        let mut shown = config.clone();
        if shown.llm.api_key.is_some() {
            shown.llm.api_key = Some("<redacted>".into());
        }
        print!("{}", shown.to_toml().map_err(|e| miette::miette!("{e}"))?);
        return Ok(());
    }

    if let Commands::Seed { list: true, .. } = cli.command {
        for pack in seeds::bundled() {
            println!(
                "{} v{}: {} ({} statements)",
                pack.id,
                pack.version,
                pack.description,
                pack.statements.len()
            );
        }
        return Ok(());
    }

    let store = store_path(&cli, &config)?;
    let engine = Engine::with_llm(config);
    if store.exists() {
        engine.load(&store)?;
    }

    match &cli.command {
        Commands::Add {
            text,
            source,
            reference,
        } => {
            let report = engine.add_text(text, source.clone(), *reference)?;
            engine.save(&store)?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!("Added {}", report.statement_id);
                for id in &report.invalidated {
                    println!("  superseded {id}");
                }
            }
        }

        Commands::Ingest {
            file,
            source,
            reference,
        } => {
            let content = std::fs::read_to_string(file).into_diagnostic()?;
            let source = source
                .clone()
                .or_else(|| file.file_name().map(|n| n.to_string_lossy().into_owned()));
            let reports = engine.add_document(&content, source, *reference)?;
            engine.save(&store)?;
            if cli.json {
                print_json(&reports)?;
            } else {
                let superseded: usize = reports.iter().map(|r| r.invalidated.len()).sum();
                println!(
                    "Ingested {} statements from {} ({superseded} superseded)",
                    reports.len(),
                    file.display()
                );
            }
        }

        Commands::Entity {
            name,
            at,
            predicate,
        } => {
            let mut query = TemporalQuery::new().entity(name);
            query.at = *at;
            query.predicate = predicate.clone();
            let result = engine.query(&query);
            if cli.json {
                print_json(&result)?;
            } else {
                print!("{}", report::format_query_result(&result));
            }
        }

        Commands::Range { start, end, entity } => {
            let mut query = TemporalQuery::new().range(TimeRange::new(*start, *end)?);
            query.entity = entity.clone();
            let result = engine.query(&query);
            if cli.json {
                print_json(&result)?;
            } else {
                print!("{}", report::format_query_result(&result));
            }
        }

        Commands::Ask {
            question,
            entity,
            at,
        } => {
            let mut query = TemporalQuery::new().question(question);
            query.entity = entity.clone();
            query.at = *at;
            let result = engine.query(&query);
            if cli.json {
                print_json(&result)?;
            } else {
                print!("{}", report::format_query_result(&result));
            }
        }

        Commands::Timeline { entity } => {
            let timeline = engine.timeline(entity);
            if cli.json {
                print_json(&timeline)?;
            } else {
                print!("{}", report::format_timeline(&timeline));
            }
        }

        Commands::Entities => {
            let entities = engine.entities();
            if cli.json {
                print_json(&entities)?;
            } else if entities.is_empty() {
                println!("No entities.");
            } else {
                println!("Entities ({}):", entities.len());
                for entity in &entities {
                    println!("  {entity}");
                }
            }
        }

        Commands::Stats => {
            let stats = engine.stats();
            if cli.json {
                print_json(&stats)?;
            } else {
                print!("{}", report::format_stats(&stats));
            }
        }

        Commands::Seed { pack, file, .. } => {
            let pack = match file {
                Some(path) => SeedPack::load(path)?,
                None => seeds::find_bundled(pack)?,
            };
            let applied = engine.apply_seed(&pack)?;
            engine.save(&store)?;
            println!(
                "Applied seed \"{}\": {} statements, {} superseded",
                applied.id, applied.statements_applied, applied.invalidated
            );
        }

        Commands::Config => unreachable!("handled above"),
    }

    Ok(())
}
