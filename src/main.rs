use regdoc::cli::{Cli, Commands, ConfigAction};
use regdoc::config::{expand_path, Config};
use regdoc::context::{build_rag_context, ContextScope};
use regdoc::embedding::{provider_from_config, EmbeddingProvider};
use regdoc::error::{RegdocError, Result};
use regdoc::ingest::{index_document, IndexOutcome};
use regdoc::naming::collection_name_for;
use regdoc::retrieval::{
    CancellationToken, HybridRetriever, PageNumber, QueryRequest, ScoredCandidate, Source,
};
use regdoc::store::{ChromaStore, SqliteStore, VectorStore};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Index {
            file,
            name,
            replace,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_index(&config, &file, name, replace)?;
        }
        Commands::Query {
            query,
            collection,
            k,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_query(&config, &query, &collection, k, json)?;
        }
        Commands::Context {
            query,
            collection,
            whole_document,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_context(&config, &query, &collection, whole_document)?;
        }
        Commands::Collections => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_collections(&config)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_filter = if verbose { "regdoc=debug" } else { "regdoc=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Logs go to stderr so query output stays pipeable
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_index(config: &Config, file: &Path, name: Option<String>, replace: bool) -> Result<()> {
    if config.store.backend != "sqlite" {
        return Err(RegdocError::Config(format!(
            "Indexing writes to the sqlite store, but store.backend is '{}'",
            config.store.backend
        )));
    }

    let collection = match name {
        Some(name) => name,
        None => collection_name_for(file, config.collections.max_name_length)?,
    };

    let store = SqliteStore::open(&expand_path(&config.store.db_path)?)?;

    match index_document(&store, file, &collection, replace)? {
        IndexOutcome::Created {
            collection,
            passages,
        } => {
            println!("✓ Indexed {} passages into {}", passages, collection);
        }
        IndexOutcome::Replaced {
            collection,
            passages,
        } => {
            println!("✓ Replaced {} with {} passages", collection, passages);
        }
        IndexOutcome::Skipped { collection } => {
            println!("Collection {} already exists", collection);
            println!("Use --replace to rebuild it");
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct QueryHit<'a> {
    rank: usize,
    text: &'a str,
    page_number: &'a PageNumber,
    source: Source,
    similarity: Option<f32>,
    score: Option<f32>,
}

fn cmd_query(
    config: &Config,
    query: &str,
    collection_name: &str,
    k: Option<usize>,
    json: bool,
) -> Result<()> {
    let provider = provider_from_config(&config.embedding)?;
    let store = open_store(config, Arc::clone(&provider))?;
    let retriever = HybridRetriever::new(provider, config.retrieval)?;

    let collection = store.collection(collection_name)?;
    let request = QueryRequest::new(query, k.unwrap_or(config.retrieval.default_k))?;
    let results = retriever.search(&request, collection.as_ref(), &CancellationToken::new())?;

    if json {
        let hits: Vec<QueryHit> = results.iter().enumerate().map(to_hit).collect();
        let output = serde_json::to_string_pretty(&hits).map_err(|e| RegdocError::Json {
            source: e,
            context: "Failed to serialize results".to_string(),
        })?;
        println!("{}", output);
        return Ok(());
    }

    if results.is_empty() {
        println!("No passages found in {}", collection_name);
        return Ok(());
    }

    for (index, result) in results.iter().enumerate() {
        let score = result
            .similarity
            .map(|s| format!("{:.4}", s))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}. [page {}] ({:?}, similarity {})",
            index + 1,
            result.candidate.passage.page_number,
            result.candidate.source,
            score
        );
        println!("   {}", result.text());
    }

    Ok(())
}

fn to_hit((index, result): (usize, &ScoredCandidate)) -> QueryHit<'_> {
    QueryHit {
        rank: index + 1,
        text: result.text(),
        page_number: &result.candidate.passage.page_number,
        source: result.candidate.source,
        similarity: result.similarity,
        score: Some(result.score).filter(|s| s.is_finite()),
    }
}

fn cmd_context(
    config: &Config,
    query: &str,
    collection_name: &str,
    whole_document: bool,
) -> Result<()> {
    let provider = provider_from_config(&config.embedding)?;
    let store = open_store(config, Arc::clone(&provider))?;
    let retriever = HybridRetriever::new(provider, config.retrieval)?;

    let scope = if whole_document {
        ContextScope::WholeDocument
    } else {
        ContextScope::Default
    };

    let context = build_rag_context(
        &retriever,
        store.as_ref(),
        collection_name,
        query,
        scope,
        &CancellationToken::new(),
    );
    println!("{}", context.text);

    Ok(())
}

fn cmd_collections(config: &Config) -> Result<()> {
    let store: Box<dyn VectorStore> = if config.store.backend == "chroma" {
        let provider = provider_from_config(&config.embedding)?;
        open_store(config, provider)?
    } else {
        Box::new(SqliteStore::open(&expand_path(&config.store.db_path)?)?)
    };

    let names = store.list_collections()?;
    println!("Collections: {} total", names.len());
    for name in names {
        let count = store
            .collection(&name)
            .and_then(|collection| collection.count())
            .map(|n| n.to_string())
            .unwrap_or_else(|_| "?".to_string());
        println!("  {} ({} passages)", name, count);
    }

    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = match profile {
                Some(profile) => Config::load_with_profile(&path, &profile)?,
                None => Config::load(&path)?,
            };
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Create parent directory
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| RegdocError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            let config = Config::default();
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'regdoc config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}

fn open_store(config: &Config, provider: Arc<dyn EmbeddingProvider>) -> Result<Box<dyn VectorStore>> {
    match config.store.backend.as_str() {
        "sqlite" => Ok(Box::new(SqliteStore::open(&expand_path(
            &config.store.db_path,
        )?)?)),
        "chroma" => Ok(Box::new(ChromaStore::new(
            &config.store.chroma_url,
            provider,
            config.embedding.timeout_secs,
        )?)),
        other => Err(RegdocError::Config(format!("Unknown store backend: {}", other))),
    }
}
