use lru::LruCache;
use relaydns_domain::{Answer, Question};
use rustc_hash::FxBuildHasher;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

struct CacheEntry {
    answer: Arc<Answer>,
    expires_at: Instant,
}

/// Bounded LRU of answers keyed by question.
///
/// Reactor-local: no locking. Expired entries are dropped lazily on lookup.
pub struct AnswerCache {
    entries: LruCache<Question, CacheEntry, FxBuildHasher>,
    max_ttl: u32,
}

impl AnswerCache {
    pub fn new(max_entries: usize, max_ttl: u32) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::with_hasher(capacity, FxBuildHasher),
            max_ttl,
        }
    }

    pub fn get(&mut self, question: &Question) -> Option<Arc<Answer>> {
        let entry = self.entries.get(question)?;
        if Instant::now() < entry.expires_at {
            return Some(Arc::clone(&entry.answer));
        }
        self.entries.pop(question);
        None
    }

    /// Cache `answer` for its TTL (capped at the configured maximum).
    ///
    /// Failures and zero TTLs are not stored. Returns whether it was cached.
    pub fn insert(&mut self, answer: Arc<Answer>) -> bool {
        if !answer.status.is_cacheable() {
            return false;
        }
        let ttl = answer.ttl.min(self.max_ttl);
        if ttl == 0 {
            return false;
        }

        let expires_at = Instant::now() + Duration::from_secs(u64::from(ttl));
        let question = answer.question.clone();
        self.entries.put(question, CacheEntry { answer, expires_at });
        true
    }

    /// Seconds until `question` expires, if cached and live.
    pub fn remaining_ttl(&self, question: &Question) -> Option<u32> {
        let entry = self.entries.peek(question)?;
        let remaining = entry.expires_at.checked_duration_since(Instant::now())?;
        Some(remaining.as_secs().min(u64::from(u32::MAX)) as u32)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
