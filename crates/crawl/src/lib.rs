//! Crawl driver.
//!
//! Walks the paginated entry index (or an explicit list of entry URLs),
//! extracts every entry page with bounded concurrency, follows parent links,
//! and hands each draft to an [`EntryAssembler`](memex_relations::EntryAssembler)
//! that emits it once its relation lists have settled.

mod crawler;
pub mod error;
mod event;

pub use crate::crawler::{CrawlSettings, Crawler, DEFAULT_CONCURRENCY};
pub use crate::event::{CrawlEvent, CrawlSummary};
