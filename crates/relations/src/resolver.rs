use crate::cache::{Claim, RelationCache, RelationState};
use crate::error::{ErrorKind, Result};
use memex_extract::{ExtractOptions, parse_list_page};
use memex_fetch::FetchHandle;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, instrument, warn};

/// Resolves relation lists through the shared [`RelationCache`].
///
/// Cheap to clone; clones share the cache, the fetcher and the cancellation
/// token of the run.
#[derive(Clone)]
pub struct RelationResolver {
    cache: Arc<RelationCache>,
    fetcher: FetchHandle,
    options: Arc<ExtractOptions>,
    cancel: CancellationToken,
}
impl RelationResolver {
    pub fn new(
        cache: Arc<RelationCache>,
        fetcher: FetchHandle,
        options: Arc<ExtractOptions>,
        cancel: CancellationToken,
    ) -> Self {
        Self { cache, fetcher, options, cancel }
    }

    pub fn cache(&self) -> &Arc<RelationCache> {
        &self.cache
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Waits for `key` to settle, starting its fetch chain if nobody has.
    ///
    /// The chain runs as its own task: dropping this future stops the wait,
    /// not the resolution other callers may be sharing.
    ///
    /// # Errors
    ///
    /// Fails only if the run is cancelled (or the cache dropped) before the
    /// key settles. Fetch failures settle the key as
    /// [`Failed`](RelationState::Failed) instead.
    #[instrument(skip(self))]
    pub async fn resolve(&self, key: &str) -> Result<RelationState> {
        let receiver = match self.cache.claim(key) {
            Claim::Ready(state) => return Ok(state),
            Claim::Wait(receiver) => receiver,
            Claim::Fetch(receiver) => {
                self.spawn_chain(key.to_string());
                receiver
            },
        };
        self.wait(key, receiver).await
    }

    async fn wait(&self, key: &str, mut receiver: watch::Receiver<RelationState>) -> Result<RelationState> {
        tokio::select! {
            () = self.cancel.cancelled() => exn::bail!(ErrorKind::Cancelled(key.to_string())),
            settled = receiver.wait_for(RelationState::is_settled) => match settled {
                Ok(state) => Ok((*state).clone()),
                Err(_) => exn::bail!(ErrorKind::Abandoned(key.to_string())),
            },
        }
    }

    fn spawn_chain(&self, key: String) {
        let resolver = self.clone();
        let span = info_span!("relation_chain", key = %key);
        tokio::spawn(
            async move {
                tokio::select! {
                    () = resolver.cancel.cancelled() => {
                        // The key stays `Resolving`; nobody waits past cancellation.
                        debug!("relation chain cancelled");
                    },
                    state = resolver.paginate(&key) => {
                        resolver.cache.settle(&key, state);
                    },
                }
            }
            .instrument(span),
        );
    }

    /// Walks the list from its first page, following "next" links until
    /// there are none. Pages are fetched one after the other, in link order.
    async fn paginate(&self, key: &str) -> RelationState {
        let mut visited = HashSet::new();
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut next = Some(key.to_string());
        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                warn!(page = %url, "relation list pagination loops back, giving up");
                return RelationState::Failed { partial: entries };
            }
            let page = match self.fetcher.fetch(&url).await {
                Ok(page) => page,
                Err(error) => {
                    warn!(page = %url, %error, collected = entries.len(), "relation list page failed");
                    return RelationState::Failed { partial: entries };
                },
            };
            // The final URL counts as visited too, so a redirect back to an
            // earlier page is caught as a loop.
            visited.insert(page.url.clone());
            let list = parse_list_page(&page.body, &self.options);
            debug!(page = %url, found = list.entries.len(), has_next = list.next.is_some(), "relation list page");
            for entry in list.entries {
                if seen.insert(entry.clone()) {
                    entries.push(entry);
                }
            }
            next = list.next;
        }
        RelationState::Resolved(entries)
    }
}
