mod cli;
mod error;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::{OptionExt, ResultExt};
use futures::StreamExt;
use memex_config::Config;
use memex_crawl::{CrawlEvent, CrawlSettings, CrawlSummary, Crawler};
use memex_fetch::FetchHandle;
use memex_fetch::fetcher::HttpFetcher;
use memex_store::{Database, Repository};
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    config.store.dry_run |= cli.dry_run;

    match cli.command {
        Command::Crawl { start, limit, no_parents } => {
            let start = match start {
                Some(start) => config
                    .extract_options()
                    .or_raise(|| ErrorKind::Config)?
                    .resolve(&start)
                    .map(String::from)
                    .ok_or_raise(|| ErrorKind::Config)?,
                None => config.start_url().or_raise(|| ErrorKind::Config)?,
            };
            let settings = CrawlSettings {
                concurrency: config.crawl.concurrency,
                max_entries: limit.or(config.crawl.max_entries),
                follow_parents: config.crawl.follow_parents && !no_parents,
            };
            let repo = open_store(&config).await?;
            let crawler = crawler(&config, settings)?;
            let events = crawler.crawl(&start);
            let summary = drive(events, |entry| {
                let repo = repo.clone();
                async move {
                    if let Err(err) = repo.upsert(&entry).await {
                        error!(url = %entry.url, "could not store entry: {err:?}");
                    }
                }
            })
            .await;
            report(summary)
        },
        Command::Extract { urls } => {
            let settings = CrawlSettings {
                concurrency: config.crawl.concurrency,
                max_entries: None,
                follow_parents: false,
            };
            let crawler = crawler(&config, settings)?;
            let events = crawler.crawl_urls(urls);
            let mut output = Ok(());
            let summary = drive(events, |entry| {
                let line = serde_json::to_string(&entry).or_raise(|| ErrorKind::Output).and_then(|json| {
                    writeln!(std::io::stdout().lock(), "{json}").or_raise(|| ErrorKind::Output)
                });
                if output.is_ok() {
                    output = line;
                }
                std::future::ready(())
            })
            .await;
            output?;
            report(summary)
        },
        Command::Show { url } => {
            let repo = read_store(&config).await?;
            let entry = repo
                .get(&url)
                .await
                .or_raise(|| ErrorKind::Store)?
                .ok_or_raise(|| ErrorKind::NotStored(url.clone()))?;
            let json = serde_json::to_string_pretty(&entry).or_raise(|| ErrorKind::Output)?;
            writeln!(std::io::stdout().lock(), "{json}").or_raise(|| ErrorKind::Output)
        },
        Command::Stats => {
            let repo = read_store(&config).await?;
            let total = repo.count().await.or_raise(|| ErrorKind::Store)?;
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{total} entries").or_raise(|| ErrorKind::Output)?;
            for (category, count) in repo.count_by_category().await.or_raise(|| ErrorKind::Store)? {
                let category = if category.is_empty() { "(none)" } else { category.as_str() };
                writeln!(stdout, "{count:>8}  {category}").or_raise(|| ErrorKind::Output)?;
            }
            Ok(())
        },
    }
}

fn crawler(config: &Config, settings: CrawlSettings) -> Result<Crawler> {
    let fetcher = HttpFetcher::new(&config.http.user_agent, config.http.timeout()).or_raise(|| ErrorKind::Http)?;
    let fetcher: FetchHandle = Arc::new(fetcher);
    let options = config.extract_options().or_raise(|| ErrorKind::Config)?;
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, entries still waiting on relations are dropped");
            on_signal.cancel();
        }
    });
    Ok(Crawler::new(fetcher, options, settings, cancel))
}

/// Opens the entry store for a crawl. A dry run never touches the file
/// system: it reads an existing database, or works against an empty one in
/// memory.
async fn open_store(config: &Config) -> Result<Repository> {
    let path = &config.store.path;
    let db = if config.store.dry_run {
        if path.is_file() { Database::open_read_only(path).await } else { Database::connect_in_memory().await }
    } else {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Store)?;
        }
        Database::connect(path).await
    }
    .or_raise(|| ErrorKind::Store)?;
    debug!(path = %path.display(), dry_run = config.store.dry_run, "entry store opened");
    Ok(Repository::new(db.pool().clone(), config.store.dry_run || db.is_read_only()))
}

/// Opens the entry store for lookups only.
async fn read_store(config: &Config) -> Result<Repository> {
    let db = Database::open_read_only(&config.store.path).await.or_raise(|| ErrorKind::Store)?;
    Ok(Repository::from(&db))
}

/// Consumes a crawl, handing every emitted entry to `on_entry`.
async fn drive<S, F, Fut>(events: S, mut on_entry: F) -> CrawlSummary
where
    S: futures::Stream<Item = CrawlEvent>,
    F: FnMut(memex_extract::models::Entry) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut events = std::pin::pin!(events);
    let mut summary = CrawlSummary::default();
    while let Some(event) = events.next().await {
        match event {
            CrawlEvent::Started => info!("crawl started"),
            CrawlEvent::Discovered(url) => debug!(%url, "discovered"),
            CrawlEvent::Emitted(entry) => {
                info!(url = %entry.url, title = %entry.title, "entry");
                on_entry(entry).await;
            },
            CrawlEvent::Failed { url, error } => warn!(%url, retryable = error.is_retryable(), "{error:?}"),
            CrawlEvent::Complete(complete) => summary = complete,
        }
    }
    summary
}

fn report(summary: CrawlSummary) -> Result<()> {
    info!(
        discovered = summary.discovered,
        emitted = summary.emitted,
        failed = summary.failed,
        cancelled = summary.cancelled,
        "done"
    );
    if summary.failed > 0 {
        exn::bail!(ErrorKind::Incomplete(summary.failed, summary.discovered));
    }
    Ok(())
}
