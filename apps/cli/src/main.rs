//! booru-search - command-line host for the search engine
//!
//! Runs queries against JSON datasets of users or tags and prints the result
//! envelope as JSON on stdout. Logs go to stderr.
//!
//! Usage:
//!   booru-search users --data users.json --query "rank:regular sort:name" --page 1
//!   booru-search tags --data tags.json --query "-special:unused" --repeat 3
//!   booru-search parse "tag:cat -user:bob sort:date,asc"
//!   booru-search check tags "sort:usages special:implied"

use anyhow::{Context, Result};
use booru_search::domains::{
    serialize_tag, serialize_user, Tag, TagSearchConfig, User, UserSearchConfig,
};
use booru_search::memory::MemoryCollection;
use booru_search::{
    logging, metrics, parse, EntityOf, Executor, PageRequest, ResultCache, SearchConfig, Settings,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug)]
#[clap(name = "booru-search", version)]
#[clap(about = "Search users and tags with booru query syntax")]
struct Cli {
    /// Settings file (defaults to ./booru-search.toml when present)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[clap(long, global = true)]
    json_logs: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search a JSON array of users
    Users(SearchArgs),
    /// Search a JSON array of tags
    Tags(SearchArgs),
    /// Print the tokens of a query
    Parse {
        #[clap(allow_hyphen_values = true)]
        query: String,
    },
    /// Check a query against a domain without running it
    Check {
        #[clap(value_enum)]
        domain: Domain,
        #[clap(allow_hyphen_values = true)]
        query: String,
    },
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Path to a JSON array of entities
    #[clap(short, long)]
    data: PathBuf,

    /// Query text
    #[clap(short, long, default_value = "", allow_hyphen_values = true)]
    query: String,

    /// 1-based page number
    #[clap(long, allow_hyphen_values = true)]
    page: Option<i64>,

    /// Entities per page
    #[clap(long, allow_hyphen_values = true)]
    page_size: Option<i64>,

    /// Run the same search several times (later runs hit the cache)
    #[clap(long, default_value_t = 1)]
    repeat: u32,

    /// Print Prometheus metrics to stderr when done
    #[clap(long)]
    metrics: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Domain {
    Users,
    Tags,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings =
        Settings::load_from(cli.config.as_deref()).context("Failed to load settings")?;
    if cli.json_logs {
        settings.logging.json = true;
    }

    let _logging_guard =
        logging::init_logging(&settings.logging).context("Failed to initialize logging")?;

    let cache = Arc::new(ResultCache::new(
        settings
            .cache
            .to_policy()
            .context("Invalid cache settings")?,
    ));
    tracing::debug!(policy = ?cache.policy(), "Result cache ready");

    match cli.command {
        Command::Users(args) => {
            let users: Vec<User> = load_dataset(&args.data)?;
            let config = UserSearchConfig::new(MemoryCollection::new(users));
            let executor = Executor::new(Arc::new(config), cache);
            run_search(&executor, &args, &settings, serialize_user)
        }
        Command::Tags(args) => {
            let tags: Vec<Tag> = load_dataset(&args.data)?;
            let config = TagSearchConfig::new(MemoryCollection::new(tags));
            let executor = Executor::new(Arc::new(config), cache);
            run_search(&executor, &args, &settings, serialize_tag)
        }
        Command::Parse { query } => print_json(&parse(&query)),
        Command::Check { domain, query } => {
            let parsed = match domain {
                Domain::Users => {
                    let config = UserSearchConfig::new(MemoryCollection::new(Vec::new()));
                    Executor::new(Arc::new(config), cache).parse_and_validate(&query)
                }
                Domain::Tags => {
                    let config = TagSearchConfig::new(MemoryCollection::new(Vec::new()));
                    Executor::new(Arc::new(config), cache).parse_and_validate(&query)
                }
            }
            .context("Invalid query")?;
            print_json(&parsed)
        }
    }
}

fn run_search<C, F>(
    executor: &Executor<C>,
    args: &SearchArgs,
    settings: &Settings,
    serializer: F,
) -> Result<()>
where
    C: SearchConfig + 'static,
    EntityOf<C>: Send + Sync + 'static,
    F: Fn(&EntityOf<C>) -> Value,
{
    let page = PageRequest::from_params(args.page, args.page_size, &settings.search)
        .context("Invalid pagination parameters")?;

    let mut envelope = None;
    for round in 1..=args.repeat.max(1) {
        let started = Instant::now();
        let result = executor
            .execute_and_serialize(&args.query, page, &serializer)
            .with_context(|| format!("Search failed for query {:?}", args.query))?;
        tracing::info!(
            domain = executor.config().domain(),
            round,
            total = result.total,
            returned = result.results.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Search completed"
        );
        envelope = Some(result);
    }

    if let Some(envelope) = envelope {
        print_json(&envelope)?;
    }

    if args.metrics {
        let text = metrics::gather_text().context("Failed to render metrics")?;
        eprint!("{text}");
    }

    Ok(())
}

fn load_dataset<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset {}", path.display()))?;
    let rows: Vec<T> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse dataset {}", path.display()))?;
    tracing::debug!(path = %path.display(), rows = rows.len(), "Dataset loaded");
    Ok(rows)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value).context("Failed to write output")?;
    writeln!(out)?;
    Ok(())
}
