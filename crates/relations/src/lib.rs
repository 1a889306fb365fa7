//! Resolution of relation lists (an entry's siblings and children) and the
//! assembly of entries that depend on them.
//!
//! - [`RelationCache`] is the run-scoped map from relation URL to resolution
//!   state; at most one fetch chain runs per URL.
//! - [`RelationResolver`] walks a paginated list and settles its cache key.
//! - [`EntryAssembler`] holds a draft entry until every relation it
//!   references has settled, then emits it exactly once.

mod assembler;
mod cache;
pub mod error;
mod resolver;

pub use crate::assembler::EntryAssembler;
pub use crate::cache::{Claim, RelationCache, RelationState};
pub use crate::resolver::RelationResolver;
