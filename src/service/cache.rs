//! TTL response cache in front of a [`QueryService`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use super::{FetchRequest, QueryService, ServiceError};
use crate::models::DataRow;

/// Default lifetime of a cached response.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

struct Entry {
    rows: Vec<DataRow>,
    stored_at: Instant,
}

/// One cached response, as reported by [`CachedQueryService::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryInfo {
    pub key: String,
    pub rows: usize,
    pub age: Duration,
    pub expires_in: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub ttl: Duration,
    pub entries: Vec<CacheEntryInfo>,
}

/// Caches successful responses keyed by target, category and parameters.
///
/// Requests with `ignore_cache` skip the lookup and overwrite the entry with
/// the fresh response. Failures are never cached.
pub struct CachedQueryService<S> {
    inner: S,
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl<S: QueryService> CachedQueryService<S> {
    pub fn new(inner: S) -> Self {
        Self::with_ttl(inner, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Drops the entries of one target, or everything.
    pub fn clear(&self, target_id: Option<&str>) {
        let mut entries = self.lock();
        match target_id {
            Some(id) => {
                let prefix = key_prefix(id);
                entries.retain(|key, _| !key.starts_with(&prefix));
                debug!(target = id, "cache cleared for target");
            }
            None => {
                entries.clear();
                debug!("cache cleared");
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.lock();
        let mut infos: Vec<CacheEntryInfo> = entries
            .iter()
            .map(|(key, entry)| {
                let age = now.saturating_duration_since(entry.stored_at);
                CacheEntryInfo {
                    key: key.clone(),
                    rows: entry.rows.len(),
                    age,
                    expires_in: self.ttl.saturating_sub(age),
                }
            })
            .collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        CacheStats {
            ttl: self.ttl,
            entries: infos,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // Entries are plain data; a panic mid-update cannot leave them torn.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, key: &str) -> Option<Vec<DataRow>> {
        let mut entries = self.lock();
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() < self.ttl {
            debug!(key, rows = entry.rows.len(), "cache hit");
            return Some(entry.rows.clone());
        }
        entries.remove(key);
        debug!(key, "cache entry expired");
        None
    }
}

fn key_prefix(target_id: &str) -> String {
    format!("{}|", target_id)
}

fn cache_key(request: &FetchRequest) -> String {
    format!(
        "{}{}|{}",
        key_prefix(&request.target.id),
        request.category.wire_name(),
        request.parameters.fingerprint()
    )
}

#[async_trait]
impl<S: QueryService> QueryService for CachedQueryService<S> {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<DataRow>, ServiceError> {
        let key = cache_key(request);
        if !request.ignore_cache
            && let Some(rows) = self.lookup(&key)
        {
            return Ok(rows);
        }
        debug!(key = %key, ignore_cache = request.ignore_cache, "cache miss");

        let rows = self.inner.fetch(request).await?;
        self.lock().insert(
            key,
            Entry {
                rows: rows.clone(),
                stored_at: Instant::now(),
            },
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ApiVersion, CapacityParams, Category, ClusterTarget, Credentials, QueryParameters,
        TargetKind,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl QueryService for Counting {
        async fn fetch(&self, request: &FetchRequest) -> Result<Vec<DataRow>, ServiceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(ServiceError::Failed("backend down".into()));
            }
            Ok(vec![DataRow::empty(request.category).with("call", n as i64)])
        }
    }

    fn request(target_id: &str, category: Category, ignore_cache: bool) -> FetchRequest {
        FetchRequest {
            generation: 1,
            target: ClusterTarget {
                id: target_id.into(),
                display_name: "c".into(),
                address: "10.0.0.1".into(),
                credentials: Credentials::new("u", "p"),
                kind: TargetKind::Element,
                api_version: ApiVersion::V2,
                verified: true,
            },
            category,
            parameters: QueryParameters::defaults_for(category, chrono::Utc::now()),
            ignore_cache,
        }
    }

    fn calls(service: &CachedQueryService<Counting>) -> usize {
        service.inner().calls.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_hit_within_ttl() {
        let service = CachedQueryService::new(Counting::default());
        let req = request("t1", Category::Inventory, false);
        let first = service.fetch(&req).await.unwrap();
        let second = service.fetch(&req).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(calls(&service), 1);
    }

    #[tokio::test]
    async fn test_ignore_cache_refreshes_entry() {
        let service = CachedQueryService::new(Counting::default());
        service.fetch(&request("t1", Category::Hardware, false)).await.unwrap();
        let fresh = service.fetch(&request("t1", Category::Hardware, true)).await.unwrap();
        assert_eq!(fresh[0].get("call").and_then(|v| v.as_f64()), Some(2.0));

        let cached = service.fetch(&request("t1", Category::Hardware, false)).await.unwrap();
        assert_eq!(cached, fresh);
        assert_eq!(calls(&service), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_refetched() {
        let service = CachedQueryService::with_ttl(Counting::default(), Duration::from_secs(60));
        let req = request("t1", Category::Inventory, false);
        service.fetch(&req).await.unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        let stats = service.stats();
        assert_eq!(stats.entries[0].age, Duration::from_secs(30));
        assert_eq!(stats.entries[0].expires_in, Duration::from_secs(30));

        tokio::time::advance(Duration::from_secs(31)).await;
        service.fetch(&req).await.unwrap();
        assert_eq!(calls(&service), 2);
    }

    #[tokio::test]
    async fn test_parameters_are_part_of_key() {
        let service = CachedQueryService::new(Counting::default());
        let mut req = request("t1", Category::Capacity, false);
        service.fetch(&req).await.unwrap();
        req.parameters = QueryParameters::Capacity(CapacityParams {
            cpu_ratio: Some(5),
            ..CapacityParams::default()
        });
        service.fetch(&req).await.unwrap();
        assert_eq!(calls(&service), 2);
        assert_eq!(service.stats().entries.len(), 2);
    }

    #[tokio::test]
    async fn test_clear_by_target() {
        let service = CachedQueryService::new(Counting::default());
        service.fetch(&request("t1", Category::Inventory, false)).await.unwrap();
        service.fetch(&request("t10", Category::Inventory, false)).await.unwrap();
        service.fetch(&request("t2", Category::Hardware, false)).await.unwrap();

        service.clear(Some("t1"));
        let keys: Vec<_> = service.stats().entries.into_iter().map(|e| e.key).collect();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| !k.starts_with("t1|")));

        service.clear(None);
        assert!(service.stats().entries.is_empty());
    }

    #[tokio::test]
    async fn test_failures_not_cached() {
        let service = CachedQueryService::new(Counting {
            fail: true,
            ..Counting::default()
        });
        let req = request("t1", Category::Inventory, false);
        assert!(service.fetch(&req).await.is_err());
        assert!(service.fetch(&req).await.is_err());
        assert_eq!(calls(&service), 2);
        assert!(service.stats().entries.is_empty());
    }
}
