use crate::error::Error;
use memex_extract::models::Entry;

/// Progress events emitted by a crawl.
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started) exactly once.
/// 2. [`Discovered`](Self::Discovered), [`Emitted`](Self::Emitted) and
///    [`Failed`](Self::Failed), interleaved, zero or more times each.
/// 3. [`Complete`](Self::Complete) exactly once, signalling the stream is
///    finished.
///
/// Every discovered URL ends up either emitted or failed, unless the crawl is
/// cancelled first.
#[derive(Debug)]
pub enum CrawlEvent {
    /// Crawling has begun; emitted exactly once before any other event.
    Started,
    /// A URL was scheduled for extraction (from the index, the seed list, or
    /// an entry's parent link).
    Discovered(String),
    /// An entry was extracted and its relation lists have settled.
    Emitted(Entry),
    /// A URL could not be turned into an entry.
    Failed { url: String, error: Error },
    /// Nothing is left to do, or the crawl was cancelled.
    Complete(CrawlSummary),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub discovered: usize,
    pub extracted: usize,
    pub emitted: usize,
    pub failed: usize,
    /// Drafts still waiting on relations when the crawl was cancelled are
    /// never emitted.
    pub cancelled: bool,
}
