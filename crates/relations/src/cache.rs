use memex_extract::models::RelationStatus;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::debug;

/// Resolution state of one relation list, as held by the cache.
///
/// A key that was never claimed is absent from the cache (unresolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationState {
    /// A fetch chain is running for this key.
    Resolving,
    /// Every page was fetched. Entry URLs are deduplicated and in the order
    /// they were first seen.
    Resolved(Vec<String>),
    /// A page could not be fetched (or pagination looped). Whatever was
    /// gathered before that stays here; entries only ever see `failed`.
    Failed { partial: Vec<String> },
}
impl RelationState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Resolving)
    }

    /// The status an entry carries for this state.
    pub fn status(&self) -> RelationStatus {
        match self {
            Self::Resolving => RelationStatus::Resolving,
            Self::Resolved(entries) => RelationStatus::Resolved { entries: entries.clone() },
            Self::Failed { .. } => RelationStatus::Failed,
        }
    }
}

/// Outcome of claiming a key.
#[derive(Debug)]
pub enum Claim {
    /// The caller is the sole fetcher for this key and must eventually
    /// [`settle`](RelationCache::settle) it. The receiver observes that
    /// settlement like any other waiter.
    Fetch(watch::Receiver<RelationState>),
    /// Another caller is fetching; wait on the receiver.
    Wait(watch::Receiver<RelationState>),
    /// The key already settled.
    Ready(RelationState),
}

/// Run-scoped singleflight map from relation list URL to its state.
///
/// Every claim and transition happens under one lock, so two callers can
/// never both become the fetcher of the same key. Waiters are notified
/// through a per-key [`watch`] channel once the key settles.
#[derive(Debug, Default)]
pub struct RelationCache {
    keys: Mutex<HashMap<String, watch::Sender<RelationState>>>,
}
impl RelationCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, watch::Sender<RelationState>>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims `key`: the first caller on an unresolved key moves it to
    /// [`Resolving`](RelationState::Resolving) and is told to fetch.
    pub fn claim(&self, key: &str) -> Claim {
        let mut keys = self.lock();
        match keys.get(key) {
            Some(sender) => {
                let state = sender.borrow().clone();
                match state.is_settled() {
                    true => Claim::Ready(state),
                    false => Claim::Wait(sender.subscribe()),
                }
            },
            None => {
                let (sender, receiver) = watch::channel(RelationState::Resolving);
                keys.insert(key.to_string(), sender);
                debug!(key, "claimed relation list");
                Claim::Fetch(receiver)
            },
        }
    }

    /// Moves `key` to a settled state and wakes every waiter. Settled keys
    /// are terminal: settling again is ignored and reported as `false`.
    pub fn settle(&self, key: &str, state: RelationState) -> bool {
        if !state.is_settled() {
            return false;
        }
        let keys = self.lock();
        let Some(sender) = keys.get(key) else {
            return false;
        };
        sender.send_if_modified(|current| match current.is_settled() {
            true => false,
            false => {
                *current = state;
                true
            },
        })
    }

    /// Current state of `key`, or `None` if nobody claimed it yet.
    pub fn get(&self, key: &str) -> Option<RelationState> {
        self.lock().get(key).map(|sender| sender.borrow().clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys that have not settled yet.
    pub fn in_flight(&self) -> usize {
        self.lock().values().filter(|sender| !sender.borrow().is_settled()).count()
    }
}
