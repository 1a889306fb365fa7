pub mod error;
pub mod fetcher;
mod page;

pub use crate::fetcher::Fetcher;
pub use crate::page::Page;
use std::sync::Arc;

pub type FetchHandle = Arc<dyn Fetcher + Send + Sync>;
