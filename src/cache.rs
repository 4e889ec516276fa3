use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use futures::Future;
use serde_json::Value;

use crate::store::EntityKind;
use crate::time::DateRange;
use crate::AppResult;

/// Scope component of a cache key. Distinct scopes cache independently;
/// overlapping ranges are never merged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The whole collection for an entity kind.
    Collection,
    /// A single record.
    ById(String),
    /// Rows whose creation timestamp falls inside an inclusive RFC 3339
    /// window.
    Range(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub entity: EntityKind,
    pub scope: Scope,
}

impl QueryKey {
    pub fn collection(entity: EntityKind) -> Self {
        QueryKey {
            entity,
            scope: Scope::Collection,
        }
    }

    pub fn by_id(entity: EntityKind, id: impl Into<String>) -> Self {
        QueryKey {
            entity,
            scope: Scope::ById(id.into()),
        }
    }

    pub fn range(entity: EntityKind, range: &DateRange) -> Self {
        let (from, to) = range.bounds_iso();
        QueryKey {
            entity,
            scope: Scope::Range(from, to),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Scope::Collection => write!(f, "{}", self.entity),
            Scope::ById(id) => write!(f, "{}/{id}", self.entity),
            Scope::Range(from, to) => write!(f, "{}/{from}..{to}", self.entity),
        }
    }
}

#[derive(Default)]
struct Entry {
    value: Option<Value>,
    stale: bool,
    /// Bumped by every write, invalidation, removal and cancellation. A
    /// fetch that started under an older epoch discards its result rather
    /// than clobbering whatever happened in between.
    epoch: u64,
}

/// Process-wide keyed cache of query results.
///
/// Constructed once at startup and injected by handle; readers observe
/// pre-mutation, optimistic, or reconciled state, never a torn
/// intermediate.
#[derive(Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<QueryKey, Entry>>,
}

impl QueryCache {
    pub fn new() -> Self {
        QueryCache::default()
    }

    /// Current cached value for the key, fresh or stale.
    pub fn read(&self, key: &QueryKey) -> Option<Value> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).and_then(|entry| entry.value.clone())
    }

    /// Apply `updater` to the cached value and store the result as fresh.
    pub fn write<F>(&self, key: &QueryKey, updater: F)
    where
        F: FnOnce(Option<Value>) -> Value,
    {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(key.clone()).or_default();
        let next = updater(entry.value.take());
        entry.value = Some(next);
        entry.stale = false;
        entry.epoch += 1;
        tracing::trace!(target: "tallybook::cache", key = %key, epoch = entry.epoch, "cache_write");
    }

    /// Restore a snapshot taken with [`read`]: `Some` writes the value
    /// back, `None` removes the entry's data.
    pub fn restore(&self, key: &QueryKey, snapshot: Option<Value>) {
        match snapshot {
            Some(value) => self.write(key, |_| value),
            None => self.remove(key),
        }
    }

    /// Mark the key stale so the next read refetches. Idempotent with
    /// respect to the next read's behavior.
    pub fn invalidate(&self, key: &QueryKey) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(key.clone()).or_default();
        entry.stale = true;
        entry.epoch += 1;
        tracing::trace!(target: "tallybook::cache", key = %key, "cache_invalidate");
    }

    /// Drop the cached data for the key entirely.
    pub fn remove(&self, key: &QueryKey) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(key.clone()).or_default();
        entry.value = None;
        entry.stale = false;
        entry.epoch += 1;
        tracing::trace!(target: "tallybook::cache", key = %key, "cache_remove");
    }

    /// Best-effort cancellation of in-flight reads for the key: any fetch
    /// already underway will discard its result. Server-side work is not
    /// aborted.
    pub fn cancel_in_flight(&self, key: &QueryKey) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(key.clone()).or_default();
        entry.epoch += 1;
        tracing::trace!(target: "tallybook::cache", key = %key, "cache_cancel_in_flight");
    }

    /// Read-through fetch: return the fresh cached value if present,
    /// otherwise run `loader` and cache its result — unless the key was
    /// written, invalidated or cancelled while the load was in flight, in
    /// which case the loaded value is returned but not cached.
    pub async fn fetch<F, Fut>(&self, key: &QueryKey, loader: F) -> AppResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<Value>>,
    {
        let started_epoch = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            let entry = entries.entry(key.clone()).or_default();
            if !entry.stale {
                if let Some(value) = &entry.value {
                    return Ok(value.clone());
                }
            }
            entry.epoch
        };

        let loaded = loader().await?;

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(key.clone()).or_default();
        if entry.epoch == started_epoch {
            entry.value = Some(loaded.clone());
            entry.stale = false;
            tracing::trace!(target: "tallybook::cache", key = %key, "cache_fill");
        } else {
            tracing::debug!(target: "tallybook::cache", key = %key, "stale_fetch_discarded");
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;
    use tokio::sync::oneshot;

    use super::*;

    fn key() -> QueryKey {
        QueryKey::collection(EntityKind::Category)
    }

    #[test]
    fn write_then_read_round_trips() {
        let cache = QueryCache::new();
        cache.write(&key(), |_| json!([1, 2, 3]));
        assert_eq!(cache.read(&key()), Some(json!([1, 2, 3])));
    }

    #[test]
    fn updater_sees_previous_value() {
        let cache = QueryCache::new();
        cache.write(&key(), |_| json!([1]));
        cache.write(&key(), |old| {
            let mut items = old.unwrap().as_array().unwrap().clone();
            items.push(json!(2));
            Value::Array(items)
        });
        assert_eq!(cache.read(&key()), Some(json!([1, 2])));
    }

    #[test]
    fn restore_with_none_clears_the_entry() {
        let cache = QueryCache::new();
        cache.write(&key(), |_| json!([1]));
        cache.restore(&key(), None);
        assert_eq!(cache.read(&key()), None);
    }

    #[test]
    fn distinct_ranges_are_distinct_keys() {
        use chrono::{TimeZone, Utc};
        let jan = DateRange::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let feb = DateRange::new(
            Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let cache = QueryCache::new();
        cache.write(&QueryKey::range(EntityKind::Transaction, &jan), |_| json!(["jan"]));
        cache.write(&QueryKey::range(EntityKind::Transaction, &feb), |_| json!(["feb"]));
        assert_eq!(
            cache.read(&QueryKey::range(EntityKind::Transaction, &jan)),
            Some(json!(["jan"]))
        );
        assert_eq!(
            cache.read(&QueryKey::range(EntityKind::Transaction, &feb)),
            Some(json!(["feb"]))
        );
    }

    #[tokio::test]
    async fn fetch_uses_fresh_cache_without_calling_loader() {
        let cache = QueryCache::new();
        cache.write(&key(), |_| json!(["cached"]));
        let calls = AtomicUsize::new(0);
        let value = cache
            .fetch(&key(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(json!(["loaded"])) }
            })
            .await
            .unwrap();
        assert_eq!(value, json!(["cached"]));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalidate_forces_reload_and_is_idempotent() {
        let cache = QueryCache::new();
        cache.write(&key(), |_| json!(["old"]));
        // Invalidate twice; the next read behaves exactly as after one.
        cache.invalidate(&key());
        cache.invalidate(&key());

        let value = cache
            .fetch(&key(), || async { Ok(json!(["reloaded"])) })
            .await
            .unwrap();
        assert_eq!(value, json!(["reloaded"]));
        assert_eq!(cache.read(&key()), Some(json!(["reloaded"])));

        // The reload marked the entry fresh again.
        let value = cache
            .fetch(&key(), || async { Ok(json!(["not used"])) })
            .await
            .unwrap();
        assert_eq!(value, json!(["reloaded"]));
    }

    #[tokio::test]
    async fn cancelled_fetch_does_not_clobber_a_later_write() {
        let cache = Arc::new(QueryCache::new());
        let (tx, rx) = oneshot::channel::<()>();

        let fetcher = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .fetch(&key(), move || async move {
                        rx.await.ok();
                        Ok(json!(["stale server rows"]))
                    })
                    .await
            })
        };

        // Give the fetch a chance to record its epoch, then cancel and
        // write optimistically, as a mutation would.
        tokio::task::yield_now().await;
        cache.cancel_in_flight(&key());
        cache.write(&key(), |_| json!(["optimistic"]));

        tx.send(()).unwrap();
        let loaded = fetcher.await.unwrap().unwrap();
        // The caller still receives the loaded rows,
        assert_eq!(loaded, json!(["stale server rows"]));
        // but the optimistic write survives in the cache.
        assert_eq!(cache.read(&key()), Some(json!(["optimistic"])));
    }
}
