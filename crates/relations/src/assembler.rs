use crate::cache::{RelationCache, RelationState};
use crate::resolver::RelationResolver;
use memex_extract::models::{Entry, EntryDraft, RelationKind, RelationStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// Holds a draft entry until each relation it references has settled, then
/// emits the finalized [`Entry`] exactly once.
///
/// Every outstanding relation counts as one dependency. Each settlement
/// writes into the draft and decrements the count in a single atomic step;
/// whichever settlement takes the count to zero emits. A draft with no
/// outstanding relations is emitted on creation.
#[derive(Debug)]
pub struct EntryAssembler {
    url: String,
    draft: Mutex<Option<EntryDraft>>,
    pending: AtomicUsize,
    emit: UnboundedSender<Entry>,
}
impl EntryAssembler {
    /// Creates the assembler for `draft`. Relations whose key already settled
    /// in `cache` are copied into the draft right away and don't count as
    /// dependencies.
    pub fn new(mut draft: EntryDraft, cache: &RelationCache, emit: UnboundedSender<Entry>) -> Arc<Self> {
        let mut pending = 0;
        for (kind, key) in draft.unsettled() {
            let status = match cache.get(&key) {
                Some(state) if state.is_settled() => state.status(),
                _ => {
                    pending += 1;
                    RelationStatus::Resolving
                },
            };
            draft.set_relation(kind, status);
        }
        let assembler = Arc::new(Self {
            url: draft.url().to_string(),
            draft: Mutex::new(Some(draft)),
            pending: AtomicUsize::new(pending),
            emit,
        });
        if pending == 0 {
            assembler.finalize();
        }
        assembler
    }

    /// Creates the assembler and waits on every outstanding relation through
    /// `resolver`, each on its own task. Cancelling the run abandons the
    /// draft: it is never emitted.
    pub fn start(draft: EntryDraft, resolver: &RelationResolver, emit: UnboundedSender<Entry>) -> Arc<Self> {
        let assembler = Self::new(draft, resolver.cache(), emit);
        for (kind, key) in assembler.outstanding() {
            let assembler = Arc::clone(&assembler);
            let resolver = resolver.clone();
            tokio::spawn(async move {
                match resolver.resolve(&key).await {
                    Ok(state) => {
                        assembler.settle(kind, &state);
                    },
                    Err(error) => debug!(entry = %assembler.url, %error, "abandoning draft"),
                }
            });
        }
        assembler
    }

    fn lock(&self) -> MutexGuard<'_, Option<EntryDraft>> {
        self.draft.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Relations still waiting to settle.
    pub fn outstanding(&self) -> Vec<(RelationKind, String)> {
        self.lock().as_ref().map(EntryDraft::unsettled).unwrap_or_default()
    }

    /// Number of dependencies left before the entry is emitted.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_emitted(&self) -> bool {
        self.lock().is_none()
    }

    /// Records the settled state of one relation. Returns `true` if this
    /// settlement emitted the entry.
    ///
    /// Only the first settlement of a relation counts; repeats and
    /// still-resolving states are ignored.
    pub fn settle(&self, kind: RelationKind, state: &RelationState) -> bool {
        if !state.is_settled() {
            return false;
        }
        let applied = match self.lock().as_mut() {
            Some(draft) => draft.set_relation(kind, state.status()),
            None => false,
        };
        if !applied {
            return false;
        }
        match self.pending.fetch_sub(1, Ordering::AcqRel) {
            1 => self.finalize(),
            _ => false,
        }
    }

    fn finalize(&self) -> bool {
        let Some(draft) = self.lock().take() else {
            return false;
        };
        let entry = draft.finalize();
        debug!(entry = %entry.url, "emitting entry");
        if self.emit.send(entry).is_err() {
            warn!(entry = %self.url, "entry receiver dropped before emission");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memex_extract::models::Relation;
    use memex_extract::{ExtractOptions, extract};
    use memex_fetch::fetcher::MockFetcher;
    use rstest::rstest;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    const SIBLINGS: &str = "https://knowyourmeme.com/memes/doge/siblings";
    const CHILDREN: &str = "https://knowyourmeme.com/memes/doge/children";

    fn draft(siblings: bool, children: bool) -> EntryDraft {
        let html = format!(
            r#"<article class="entry"><header><section class="info"><h1>Doge</h1></section></header>
               <nav>{}{}</nav></article>"#,
            if siblings { r#"<a href="/memes/doge/siblings">Related</a>"# } else { "" },
            if children { r#"<a href="/memes/doge/children">Children</a>"# } else { "" },
        );
        extract(&html, "https://knowyourmeme.com/memes/doge", &ExtractOptions::default()).unwrap().draft
    }

    fn list(entries: &[&str]) -> String {
        let rows: String =
            entries.iter().map(|href| format!(r#"<td><h2><a href="{href}">{href}</a></h2></td>"#)).collect();
        format!(r#"<table class="entry_list"><tr>{rows}</tr></table>"#)
    }

    #[test]
    fn test_no_dependencies_emits_immediately() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let assembler = EntryAssembler::new(draft(false, false), &RelationCache::new(), tx);
        assert!(assembler.is_emitted());
        assert_eq!(rx.try_recv().unwrap().title, "Doge");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_already_resolved_key_is_copied() {
        let cache = RelationCache::new();
        let _claim = cache.claim(SIBLINGS);
        cache.settle(SIBLINGS, RelationState::Resolved(vec!["https://knowyourmeme.com/memes/a".into()]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let assembler = EntryAssembler::new(draft(true, true), &cache, tx);
        assert_eq!(assembler.pending(), 1);
        assert_eq!(assembler.outstanding(), vec![(RelationKind::Children, CHILDREN.to_string())]);
        assert!(rx.try_recv().is_err());

        assert!(assembler.settle(RelationKind::Children, &RelationState::Failed { partial: vec!["x".into()] }));
        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.siblings.as_ref().and_then(Relation::entries), Some(&["https://knowyourmeme.com/memes/a".to_string()][..]));
        assert_eq!(entry.children.unwrap().status, RelationStatus::Failed);
    }

    #[test]
    fn test_repeated_settlement_is_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let assembler = EntryAssembler::new(draft(true, true), &RelationCache::new(), tx);
        assert!(!assembler.settle(RelationKind::Siblings, &RelationState::Resolving));
        assert!(!assembler.settle(RelationKind::Siblings, &RelationState::Resolved(vec![])));
        assert!(!assembler.settle(RelationKind::Siblings, &RelationState::Resolved(vec![])));
        assert_eq!(assembler.pending(), 1);
        assert!(rx.try_recv().is_err());
        assert!(assembler.settle(RelationKind::Children, &RelationState::Resolved(vec![])));
        assert!(rx.try_recv().is_ok());
    }

    #[rstest]
    #[case::siblings_first([RelationKind::Siblings, RelationKind::Children])]
    #[case::children_first([RelationKind::Children, RelationKind::Siblings])]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_settlements_emit_once(#[case] order: [RelationKind; 2]) {
        for _ in 0..50 {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let assembler = EntryAssembler::new(draft(true, true), &RelationCache::new(), tx);
            let handles: Vec<_> = order
                .into_iter()
                .chain(order)
                .map(|kind| {
                    let assembler = Arc::clone(&assembler);
                    tokio::spawn(async move { assembler.settle(kind, &RelationState::Resolved(vec![])) })
                })
                .collect();
            let mut emitted = 0;
            for handle in handles {
                emitted += usize::from(handle.await.unwrap());
            }
            drop(assembler);
            assert_eq!(emitted, 1);
            assert!(rx.recv().await.is_some());
            assert!(rx.recv().await.is_none());
        }
    }

    #[tokio::test]
    async fn test_start_resolves_through_cache() {
        let fetcher = Arc::new(MockFetcher::with_pages([
            (SIBLINGS, list(&["/memes/a", "/memes/b"])),
            (CHILDREN, list(&["/memes/c"])),
        ]));
        let resolver = RelationResolver::new(
            Arc::new(RelationCache::new()),
            fetcher.clone(),
            Arc::new(ExtractOptions::default()),
            CancellationToken::new(),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        EntryAssembler::start(draft(true, true), &resolver, tx.clone());
        EntryAssembler::start(draft(true, false), &resolver, tx);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(rx.recv().await.is_none());
        for entry in [&first, &second] {
            assert_eq!(entry.siblings.as_ref().and_then(Relation::entries).map(<[String]>::len), Some(2));
        }
        assert_eq!(fetcher.fetch_count(SIBLINGS).await, 1);
        assert_eq!(fetcher.fetch_count(CHILDREN).await, 1);
    }

    #[tokio::test]
    async fn test_cancellation_abandons_draft() {
        let fetcher = Arc::new(
            MockFetcher::with_pages([(SIBLINGS, list(&[]))]).with_delay(SIBLINGS, Duration::from_secs(60)),
        );
        let cancel = CancellationToken::new();
        let resolver = RelationResolver::new(
            Arc::new(RelationCache::new()),
            fetcher,
            Arc::new(ExtractOptions::default()),
            cancel.clone(),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let assembler = EntryAssembler::start(draft(true, false), &resolver, tx);
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        drop(assembler);
        assert!(rx.recv().await.is_none());
    }
}
