use crate::error::{ErrorKind, Result};
use crate::event::{CrawlEvent, CrawlSummary};
use async_stream::stream;
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use memex_extract::models::{Entry, FollowUp};
use memex_extract::{ExtractOptions, Extraction, parse_list_page};
use memex_fetch::error::Result as FetchResult;
use memex_fetch::{FetchHandle, Fetcher, Page};
use memex_relations::{EntryAssembler, RelationCache, RelationResolver};
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSettings {
    /// Entry pages extracted at the same time. Relation list chains run on
    /// their own and don't count against this.
    pub concurrency: usize,
    /// Stop scheduling new entries once this many were scheduled.
    pub max_entries: Option<usize>,
    pub follow_parents: bool,
}
impl Default for CrawlSettings {
    fn default() -> Self {
        Self { concurrency: DEFAULT_CONCURRENCY, max_entries: None, follow_parents: true }
    }
}

enum Job {
    Index(String),
    Entry(String),
}

enum Done {
    Index { url: String, result: FetchResult<Page> },
    Entry { url: String, result: Result<Extraction> },
}

enum Step {
    Cancelled,
    Emitted(Entry),
    Done(Done),
}

/// Crawls entry pages and emits assembled entries.
///
/// The relation cache lives as long as the crawler: crawling twice with the
/// same crawler never fetches a relation list twice.
pub struct Crawler {
    fetcher: FetchHandle,
    options: Arc<ExtractOptions>,
    resolver: RelationResolver,
    settings: CrawlSettings,
    cancel: CancellationToken,
}

impl Crawler {
    pub fn new(fetcher: FetchHandle, options: ExtractOptions, settings: CrawlSettings, cancel: CancellationToken) -> Self {
        let options = Arc::new(options);
        let resolver = RelationResolver::new(
            Arc::new(RelationCache::new()),
            Arc::clone(&fetcher),
            Arc::clone(&options),
            cancel.clone(),
        );
        let settings = CrawlSettings { concurrency: settings.concurrency.max(1), ..settings };
        Self { fetcher, options, resolver, settings, cancel }
    }

    pub fn relations(&self) -> &Arc<RelationCache> {
        self.resolver.cache()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Crawls the entry index starting at `start_url`, following its "next"
    /// links, and every entry it lists.
    pub fn crawl(&self, start_url: &str) -> impl Stream<Item = CrawlEvent> + '_ {
        self.run(Some(start_url.to_string()), Vec::new())
    }

    /// Crawls the given entry pages (and their parents) without touching the
    /// index.
    pub fn crawl_urls(&self, urls: impl IntoIterator<Item = impl Into<String>>) -> impl Stream<Item = CrawlEvent> + '_ {
        self.run(None, urls.into_iter().map(Into::into).collect())
    }

    fn limit_reached(&self, scheduled: &HashSet<String>) -> bool {
        self.settings.max_entries.is_some_and(|max| scheduled.len() >= max)
    }

    fn job(&self, job: Job) -> impl Future<Output = Done> + Send + 'static {
        let fetcher = Arc::clone(&self.fetcher);
        let options = Arc::clone(&self.options);
        async move {
            match job {
                Job::Index(url) => {
                    let result = fetcher.fetch(&url).await;
                    Done::Index { url, result }
                },
                Job::Entry(url) => {
                    let result = extract_entry(&*fetcher, &options, &url).await;
                    Done::Entry { url, result }
                },
            }
        }
    }

    fn run(&self, index: Option<String>, seeds: Vec<String>) -> impl Stream<Item = CrawlEvent> + '_ {
        // `rustfmt` does not format macros that use braces. Wrap in parentheses!
        stream!({
            yield CrawlEvent::Started;
            info!(fetcher = self.fetcher.name(), index = ?index, seeds = seeds.len(), "crawl started");

            let mut summary = CrawlSummary::default();
            let mut scheduled = HashSet::new();
            let mut queue = VecDeque::new();
            for url in seeds {
                if self.limit_reached(&scheduled) {
                    break;
                }
                if scheduled.insert(url.clone()) {
                    queue.push_back(url.clone());
                    summary.discovered += 1;
                    yield CrawlEvent::Discovered(url);
                }
            }

            let mut next_index = index;
            let mut visited_index = HashSet::new();
            let mut index_in_flight = false;
            let mut entries_in_flight = 0;
            let mut processing = FuturesUnordered::new();
            let (emit, mut emitted) = mpsc::unbounded_channel();

            loop {
                // The index is read lazily: the next page only once every
                // entry from the previous ones has been started.
                if !index_in_flight
                    && queue.is_empty()
                    && !self.limit_reached(&scheduled)
                    && let Some(url) = next_index.take()
                {
                    visited_index.insert(url.clone());
                    index_in_flight = true;
                    processing.push(self.job(Job::Index(url)));
                }
                while entries_in_flight < self.settings.concurrency
                    && let Some(url) = queue.pop_front()
                {
                    entries_in_flight += 1;
                    processing.push(self.job(Job::Entry(url)));
                }
                if processing.is_empty() {
                    break;
                }

                let step = tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => Step::Cancelled,
                    Some(entry) = emitted.recv() => Step::Emitted(entry),
                    Some(done) = processing.next() => Step::Done(done),
                };
                match step {
                    Step::Cancelled => {
                        summary.cancelled = true;
                        break;
                    },
                    Step::Emitted(entry) => {
                        summary.emitted += 1;
                        yield CrawlEvent::Emitted(entry);
                    },
                    Step::Done(Done::Index { url, result }) => {
                        index_in_flight = false;
                        let page = match result {
                            Ok(page) => page,
                            Err(err) => {
                                warn!(index = %url, error = %err, "index page failed, no further index pages");
                                summary.failed += 1;
                                yield CrawlEvent::Failed { error: err.raise(ErrorKind::Fetch(url.clone())), url };
                                continue;
                            },
                        };
                        let list = parse_list_page(&page.body, &self.options);
                        debug!(index = %url, found = list.entries.len(), "index page");
                        for entry_url in list.entries {
                            if self.limit_reached(&scheduled) {
                                break;
                            }
                            if scheduled.insert(entry_url.clone()) {
                                queue.push_back(entry_url.clone());
                                summary.discovered += 1;
                                yield CrawlEvent::Discovered(entry_url);
                            }
                        }
                        match list.next {
                            Some(next) if visited_index.contains(&next) || next == page.url => {
                                summary.failed += 1;
                                yield CrawlEvent::Failed { error: exn::Exn::from(ErrorKind::PaginationLoop(next.clone())), url: next };
                            },
                            next => next_index = next,
                        }
                    },
                    Step::Done(Done::Entry { url, result }) => {
                        entries_in_flight -= 1;
                        let Extraction { draft, follow_ups } = match result {
                            Ok(extraction) => extraction,
                            Err(error) => {
                                warn!(entry = %url, %error, "entry failed");
                                summary.failed += 1;
                                yield CrawlEvent::Failed { url, error };
                                continue;
                            },
                        };
                        summary.extracted += 1;
                        // A redirect must not get the same entry extracted again.
                        scheduled.insert(draft.url().to_string());
                        for follow_up in follow_ups {
                            let FollowUp::Parent(parent) = follow_up else {
                                continue;
                            };
                            if self.settings.follow_parents
                                && !self.limit_reached(&scheduled)
                                && scheduled.insert(parent.clone())
                            {
                                queue.push_back(parent.clone());
                                summary.discovered += 1;
                                yield CrawlEvent::Discovered(parent);
                            }
                        }
                        EntryAssembler::start(draft, &self.resolver, emit.clone());
                    },
                }
            }

            if !summary.cancelled {
                // Every extraction is done; what's left are drafts waiting on
                // relation lists. The channel closes once the last of them
                // has been emitted.
                drop(emit);
                loop {
                    let step = tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => None,
                        entry = emitted.recv() => Some(entry),
                    };
                    match step {
                        None => {
                            summary.cancelled = true;
                            break;
                        },
                        Some(None) => break,
                        Some(Some(entry)) => {
                            summary.emitted += 1;
                            yield CrawlEvent::Emitted(entry);
                        },
                    }
                }
            }

            info!(
                discovered = summary.discovered,
                emitted = summary.emitted,
                failed = summary.failed,
                cancelled = summary.cancelled,
                "crawl complete"
            );
            yield CrawlEvent::Complete(summary);
        })
    }
}

#[instrument(skip(fetcher, options))]
async fn extract_entry(fetcher: &dyn Fetcher, options: &ExtractOptions, url: &str) -> Result<Extraction> {
    let page = fetcher.fetch(url).await.or_raise(|| ErrorKind::Fetch(url.to_string()))?;
    // Relative links and the entry's own URL follow the final URL.
    memex_extract::extract(&page.body, &page.url, options).or_raise(|| ErrorKind::Extract(url.to_string()))
}
