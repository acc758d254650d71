//! Citation Resolver - Entry Point
//!
//! Batch checking of citations and maintenance of the resolution cache.
//! Reports go to stdout, logs to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use citation_resolver::cache::BackupHandle;
use citation_resolver::config::{politeness_from_secs, ttl_from_days};
use citation_resolver::formatters::{json, markdown, substitute};
use citation_resolver::{CitationEngine, Config, ManualOverride, RawCitation};

#[derive(Parser, Debug)]
#[command(name = "citation-resolver")]
#[command(about = "Resolve citations and flag fabricated author attributions")]
#[command(version)]
struct Cli {
    /// Directory holding the resolution cache
    #[arg(long, env = "CITATION_CACHE_DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// Days before an automated cache record expires
    #[arg(long, env = "CITATION_CACHE_TTL_DAYS", global = true)]
    ttl_days: Option<i64>,

    /// Seconds between two requests to the same provider
    #[arg(long, env = "CITATION_POLITENESS_SECS", global = true)]
    politeness: Option<f64>,

    /// Citations resolved concurrently
    #[arg(long, env = "CITATION_WORKERS", global = true)]
    workers: Option<usize>,

    /// Ignore cached automated records
    #[arg(long, global = true)]
    force_refresh: bool,

    /// Contact address sent in the User-Agent
    #[arg(long, env = "CITATION_CONTACT_EMAIL", global = true)]
    contact_email: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve and validate a JSON array of citations
    Check {
        /// JSON file with the citations
        #[arg(long, short)]
        input: PathBuf,

        /// Print JSON instead of Markdown
        #[arg(long)]
        json: bool,

        /// Exit non-zero when any citation is a candidate hallucination
        #[arg(long)]
        strict: bool,

        /// Document whose citations should be rewritten
        #[arg(long, requires = "output")]
        document: Option<PathBuf>,

        /// Where to write the corrected document
        #[arg(long, requires = "document")]
        output: Option<PathBuf>,
    },

    /// Store a manual correction for a URL
    Override {
        /// URL being corrected
        #[arg(long)]
        url: String,

        /// Corrected citation text
        #[arg(long)]
        text: Option<String>,

        /// Author name (repeat for several)
        #[arg(long = "author")]
        authors: Vec<String>,

        /// Publication year
        #[arg(long)]
        year: Option<i32>,

        /// DOI
        #[arg(long)]
        doi: Option<String>,

        /// Title
        #[arg(long)]
        title: Option<String>,
    },

    /// Inspect or maintain the resolution cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Show record counts
    Stats {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// List cached failures
    Failed {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the record for a URL
    Remove {
        /// URL to forget
        url: String,
    },
    /// Delete expired automated records
    Cleanup,
    /// Delete every record
    Clear,
    /// Take a snapshot now
    Backup,
    /// List snapshots
    Backups,
    /// Roll back to a snapshot (newest when no path is given)
    Restore {
        /// Snapshot file
        path: Option<PathBuf>,
    },
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir.clone_from(dir);
    }
    if let Some(days) = cli.ttl_days {
        config.cache_ttl = ttl_from_days(days)?;
    }
    if let Some(secs) = cli.politeness {
        config.politeness_delay = politeness_from_secs(secs)?;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers.max(1);
    }
    if cli.force_refresh {
        config.force_refresh = true;
    }
    if cli.contact_email.is_some() {
        config.contact_email.clone_from(&cli.contact_email);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    let config = build_config(&cli)?;
    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        cache_dir = %config.cache_dir.display(),
        "Starting citation resolver"
    );
    let engine = CitationEngine::new(config)?;

    match cli.command {
        Command::Check { input, json, strict, document, output } => {
            let raw = tokio::fs::read_to_string(&input)
                .await
                .with_context(|| format!("reading {}", input.display()))?;
            let citations: Vec<RawCitation> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing citations from {}", input.display()))?;

            let cancel = CancellationToken::new();
            let cancel_clone = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted; finishing citations in flight");
                    cancel_clone.cancel();
                }
            });

            let batch = engine.resolve_batch(citations, cancel).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&json::compact_batch(&batch))?);
            } else {
                println!("{}", markdown::format_batch_markdown(&batch));
            }

            if let (Some(document), Some(output)) = (document, output) {
                let text = tokio::fs::read_to_string(&document)
                    .await
                    .with_context(|| format!("reading {}", document.display()))?;
                tokio::fs::write(&output, substitute(&text, &batch.reports))
                    .await
                    .with_context(|| format!("writing {}", output.display()))?;
                tracing::info!(output = %output.display(), "Corrected document written");
            }

            if strict && batch.has_candidate_hallucinations() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Override { url, text, authors, year, doi, title } => {
            let record = engine.manual_override(ManualOverride {
                url,
                citation_text: text,
                authors,
                year,
                doi,
                title,
            })?;
            println!("{}", serde_json::to_string_pretty(&json::compact_record(&record))?);
        }
        Command::Cache { action } => run_cache_action(&engine, action)?,
    }

    Ok(ExitCode::SUCCESS)
}

fn run_cache_action(engine: &CitationEngine, action: CacheAction) -> anyhow::Result<()> {
    let cache = engine.cache();
    match action {
        CacheAction::Stats { json } => {
            let stats = cache.stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", markdown::format_stats_markdown(&stats));
            }
        }
        CacheAction::Failed { json } => {
            let records = cache.list_failed()?;
            if json {
                let values: Vec<_> = records.iter().map(json::compact_record).collect();
                println!("{}", serde_json::to_string_pretty(&values)?);
            } else {
                println!("{}", markdown::format_failed_markdown(&records));
            }
        }
        CacheAction::Remove { url } => {
            if cache.remove(&url)? {
                println!("Removed {url}");
            } else {
                println!("No record for {url}");
            }
        }
        CacheAction::Cleanup => println!("Removed {} expired records", cache.cleanup_expired()?),
        CacheAction::Clear => println!("Removed {} records", cache.clear()?),
        CacheAction::Backup => println!("Backup written to {}", cache.backup()?.path.display()),
        CacheAction::Backups => {
            println!("{}", markdown::format_backups_markdown(&cache.list_backups()?));
        }
        CacheAction::Restore { path } => {
            let handle = match path {
                Some(path) => BackupHandle::from_path(&path)
                    .with_context(|| format!("{} is not a cache backup", path.display()))?,
                None => cache.list_backups()?.into_iter().next().context("no backups to restore")?,
            };
            let safety = cache.restore(&handle).map_err(|e| {
                anyhow::anyhow!(citation_resolver::CitationError::from(e).to_user_message())
            })?;
            println!(
                "Restored {}; previous state saved to {}",
                handle.path.display(),
                safety.path.display()
            );
        }
    }
    Ok(())
}
