use std::num::NonZeroUsize;
use std::sync::{RwLock, RwLockWriteGuard};
use std::time::Duration;

use bytes::Bytes;
use lru::LruCache;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Pages kept at once; the least recently used page goes first.
const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(1024).unwrap();

#[derive(Clone)]
struct CachedBody {
    body: Bytes,
    stored_at: Instant,
}

/// Time-bounded cache of serialized global-feed pages, keyed by page number.
///
/// Entries are served unchanged until they are `ttl` old, whatever happens
/// to the underlying rows in the meantime. Concurrent misses race and the
/// last writer wins.
pub struct FeedCache {
    ttl: Duration,
    pages: RwLock<LruCache<usize, CachedBody>>,
}

impl FeedCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(ttl: Duration, capacity: NonZeroUsize) -> Self {
        Self {
            ttl,
            pages: RwLock::new(LruCache::new(capacity)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, page: usize) -> Option<Bytes> {
        let mut pages = self.write("get");
        let cached = pages.get(&page)?.clone();
        if cached.stored_at.elapsed() < self.ttl {
            return Some(cached.body);
        }

        pages.pop(&page);
        debug!("Feed cache entry for page {} expired", page);
        None
    }

    pub fn insert(&self, page: usize, body: Bytes) {
        if self.ttl.is_zero() {
            return;
        }

        let evicted = self.write("insert").push(
            page,
            CachedBody {
                body,
                stored_at: Instant::now(),
            },
        );
        if let Some((evicted_page, _)) = evicted.filter(|(evicted_page, _)| *evicted_page != page) {
            debug!("Feed cache evicted page {}", evicted_page);
        }
    }

    pub fn clear(&self) {
        self.write("clear").clear();
        debug!("Feed cache cleared");
    }

    fn write(&self, op: &'static str) -> RwLockWriteGuard<'_, LruCache<usize, CachedBody>> {
        self.pages.write().unwrap_or_else(|poisoned| {
            warn!(op, "Recovered from poisoned feed cache lock");
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn serves_cached_body_until_ttl() {
        let cache = FeedCache::new(Duration::from_secs(20));
        cache.insert(1, Bytes::from_static(b"first"));

        tokio::time::advance(Duration::from_secs(19)).await;
        assert_eq!(cache.get(1), Some(Bytes::from_static(b"first")));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(1), None);
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let cache = FeedCache::new(Duration::from_secs(20));
        cache.insert(1, Bytes::from_static(b"a"));
        cache.insert(2, Bytes::from_static(b"b"));
        cache.clear();
        assert_eq!(cache.get(1), None);
        assert_eq!(cache.get(2), None);
    }

    #[tokio::test]
    async fn pages_are_cached_independently() {
        let cache = FeedCache::new(Duration::from_secs(20));
        cache.insert(1, Bytes::from_static(b"page one"));
        assert_eq!(cache.get(2), None);
        assert_eq!(cache.get(1), Some(Bytes::from_static(b"page one")));
    }

    #[tokio::test]
    async fn zero_ttl_disables_caching() {
        let cache = FeedCache::new(Duration::ZERO);
        cache.insert(1, Bytes::from_static(b"a"));
        assert_eq!(cache.get(1), None);
    }

    #[tokio::test]
    async fn full_cache_evicts_least_recently_used_page() {
        let cache = FeedCache::with_capacity(Duration::from_secs(20), NonZeroUsize::new(2).unwrap());
        cache.insert(1, Bytes::from_static(b"one"));
        cache.insert(2, Bytes::from_static(b"two"));

        // Touch page 1 so page 2 is the oldest.
        assert!(cache.get(1).is_some());
        cache.insert(3, Bytes::from_static(b"three"));

        assert_eq!(cache.get(1), Some(Bytes::from_static(b"one")));
        assert_eq!(cache.get(2), None);
        assert_eq!(cache.get(3), Some(Bytes::from_static(b"three")));
    }
}
