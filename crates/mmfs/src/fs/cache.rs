//! Entity-tag validated caching of remote listings
//!
//! A [`CachedResource`] remembers the last value derived from a remote
//! listing together with the entity tag the remote attached to it. Each
//! fetch sends that tag back; when the remote reports the listing is
//! unchanged the stored value is handed out again and nothing is
//! re-derived. There is no time-based expiry.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use client::models::Fetched;
use moka::sync::Cache;
use tokio::sync::Mutex;

/// The remote answered "not modified" although nothing was cached
#[derive(Debug, thiserror::Error)]
#[error("remote reported an unchanged listing but nothing is cached")]
pub struct NothingCached;

struct Entry<T> {
    value: Arc<T>,
    etag: Option<String>,
}

/// A derived value plus the entity tag of the listing it came from
pub struct CachedResource<T> {
    slot: Mutex<Option<Entry<T>>>,
}

impl<T> Default for CachedResource<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T> CachedResource<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revalidate against the remote and return the current value.
    ///
    /// `fetch` receives the stored entity tag (if any) and performs the
    /// conditional remote call. `derive` turns a fresh payload into the
    /// stored value and only runs when the tag changed. The whole sequence
    /// holds this resource's lock, so concurrent callers cannot install an
    /// older value over a newer one. On any error the stored entry is left
    /// as it was.
    pub async fn fetch<R, E, F, FFut, D, DFut>(&self, fetch: F, derive: D) -> Result<Arc<T>, E>
    where
        F: FnOnce(Option<String>) -> FFut,
        FFut: Future<Output = Result<Fetched<R>, E>>,
        D: FnOnce(R) -> DFut,
        DFut: Future<Output = Result<T, E>>,
        E: From<NothingCached>,
    {
        let mut slot = self.slot.lock().await;
        let known = slot.as_ref().and_then(|entry| entry.etag.clone());

        let (raw, etag) = match fetch(known.clone()).await? {
            Fetched::NotModified => {
                return slot
                    .as_ref()
                    .map(|entry| entry.value.clone())
                    .ok_or_else(|| NothingCached.into());
            }
            Fetched::Fresh { value, etag } => (value, etag),
        };

        if let (Some(entry), Some(tag)) = (slot.as_ref(), etag.as_deref()) {
            if known.as_deref() == Some(tag) {
                tracing::trace!(etag = tag, "entity tag unchanged, reusing cached value");
                return Ok(entry.value.clone());
            }
        }

        let value = Arc::new(derive(raw).await?);
        *slot = Some(Entry {
            value: value.clone(),
            etag,
        });
        Ok(value)
    }

    /// The entity tag of the stored value
    pub async fn etag(&self) -> Option<String> {
        self.slot.lock().await.as_ref().and_then(|e| e.etag.clone())
    }

    /// The stored value, without contacting the remote
    pub async fn cached(&self) -> Option<Arc<T>> {
        self.slot.lock().await.as_ref().map(|e| e.value.clone())
    }
}

/// One [`CachedResource`] per key, created on first use.
///
/// Each key has its own lock; revalidating one key never waits on another.
pub struct CachedResources<K, T> {
    entries: Cache<K, Arc<CachedResource<T>>>,
}

impl<K, T> CachedResources<K, T>
where
    K: Hash + Eq + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().build(),
        }
    }

    /// The resource for `key`, shared by every caller asking for that key
    pub fn get(&self, key: K) -> Arc<CachedResource<T>> {
        self.entries
            .get_with(key, || Arc::new(CachedResource::new()))
    }
}

impl<K, T> Default for CachedResources<K, T>
where
    K: Hash + Eq + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("remote down")]
        Remote,
        #[error(transparent)]
        Cache(#[from] NothingCached),
    }

    fn fresh(value: &str, etag: &str) -> Result<Fetched<String>, TestError> {
        Ok(Fetched::fresh(value.to_string(), etag.to_string()))
    }

    async fn derive_counting(
        derived: &AtomicUsize,
        raw: String,
    ) -> Result<String, TestError> {
        derived.fetch_add(1, Ordering::SeqCst);
        Ok(raw.to_uppercase())
    }

    #[tokio::test]
    async fn test_first_fetch_populates() {
        let cache = CachedResource::<String>::new();
        let derived = AtomicUsize::new(0);

        let value = cache
            .fetch(
                |etag| async move {
                    assert_eq!(etag, None);
                    fresh("teams", "v1")
                },
                |raw| derive_counting(&derived, raw),
            )
            .await
            .unwrap();

        assert_eq!(*value, "TEAMS");
        assert_eq!(cache.etag().await.as_deref(), Some("v1"));
        assert_eq!(derived.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_same_etag_reuses_value_without_deriving() {
        let cache = CachedResource::<String>::new();
        let derived = AtomicUsize::new(0);

        let first = cache
            .fetch(|_| async { fresh("teams", "v1") }, |raw| derive_counting(&derived, raw))
            .await
            .unwrap();

        // the remote ignores If-None-Match and resends the same tag
        let second = cache
            .fetch(
                |etag| async move {
                    assert_eq!(etag.as_deref(), Some("v1"));
                    fresh("something else", "v1")
                },
                |raw| derive_counting(&derived, raw),
            )
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(derived.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_modified_reuses_value() {
        let cache = CachedResource::<String>::new();
        let derived = AtomicUsize::new(0);

        let first = cache
            .fetch(|_| async { fresh("teams", "v1") }, |raw| derive_counting(&derived, raw))
            .await
            .unwrap();
        let second = cache
            .fetch(
                |_| async { Ok::<_, TestError>(Fetched::NotModified) },
                |raw| derive_counting(&derived, raw),
            )
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(derived.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_new_etag_replaces_value_and_tag() {
        let cache = CachedResource::<String>::new();
        let derived = AtomicUsize::new(0);

        cache
            .fetch(|_| async { fresh("old", "v1") }, |raw| derive_counting(&derived, raw))
            .await
            .unwrap();
        let value = cache
            .fetch(|_| async { fresh("new", "v2") }, |raw| derive_counting(&derived, raw))
            .await
            .unwrap();

        assert_eq!(*value, "NEW");
        assert_eq!(cache.etag().await.as_deref(), Some("v2"));
        assert_eq!(derived.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_etag_always_replaces() {
        let cache = CachedResource::<String>::new();

        for body in ["one", "two"] {
            let value = cache
                .fetch(
                    |_| async move { Ok::<_, TestError>(Fetched::fresh(body.to_string(), None::<String>)) },
                    |raw| async move { Ok(raw) },
                )
                .await
                .unwrap();
            assert_eq!(*value, body);
        }
        assert_eq!(cache.etag().await, None);
    }

    #[tokio::test]
    async fn test_fetch_error_leaves_cache_untouched() {
        let cache = CachedResource::<String>::new();

        cache
            .fetch(|_| async { fresh("good", "v1") }, |raw| async move { Ok(raw) })
            .await
            .unwrap();

        let err = cache
            .fetch(
                |_| async { Err::<Fetched<String>, _>(TestError::Remote) },
                |raw| async move { Ok(raw) },
            )
            .await;
        assert!(matches!(err, Err(TestError::Remote)));

        assert_eq!(cache.cached().await.as_deref().map(String::as_str), Some("good"));
        assert_eq!(cache.etag().await.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_derive_error_leaves_cache_untouched() {
        let cache = CachedResource::<String>::new();

        cache
            .fetch(|_| async { fresh("good", "v1") }, |raw| async move { Ok(raw) })
            .await
            .unwrap();

        let err = cache
            .fetch(
                |_| async { fresh("bad", "v2") },
                |_| async { Err::<String, _>(TestError::Remote) },
            )
            .await;
        assert!(err.is_err());

        assert_eq!(cache.cached().await.as_deref().map(String::as_str), Some("good"));
        assert_eq!(cache.etag().await.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_not_modified_without_cache_is_an_error() {
        let cache = CachedResource::<String>::new();
        let err = cache
            .fetch(
                |_| async { Ok::<_, TestError>(Fetched::NotModified) },
                |raw: String| async move { Ok(raw) },
            )
            .await;
        assert!(matches!(err, Err(TestError::Cache(_))));
    }

    #[tokio::test]
    async fn test_concurrent_fetches_derive_once() {
        let cache = Arc::new(CachedResource::<String>::new());
        let derived = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let derived = derived.clone();
                tokio::spawn(async move {
                    cache
                        .fetch(
                            |_| async {
                                tokio::task::yield_now().await;
                                fresh("teams", "v1")
                            },
                            |raw| async move {
                                derived.fetch_add(1, Ordering::SeqCst);
                                Ok(raw)
                            },
                        )
                        .await
                        .unwrap()
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(*task.await.unwrap(), "teams");
        }
        assert_eq!(derived.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_keyed_resources_are_shared_per_key() {
        let resources = CachedResources::<String, String>::new();

        let a = resources.get("team-a".to_string());
        let a_again = resources.get("team-a".to_string());
        let b = resources.get("team-b".to_string());

        assert!(Arc::ptr_eq(&a, &a_again));
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_keyed_resources_do_not_block_each_other() {
        let resources = CachedResources::<String, String>::new();
        let a = resources.get("team-a".to_string());
        let b = resources.get("team-b".to_string());

        // hold a's lock while b completes a full fetch
        let _held = a.slot.lock().await;
        let value = b
            .fetch(|_| async { fresh("b", "v1") }, |raw| async move { Ok(raw) })
            .await
            .unwrap();
        assert_eq!(*value, "b");
    }
}
