//! Memoized reference-data lookups.
//!
//! One moka cache per [`EntityKind`], keyed by entity id. Entries live for
//! the whole process: names of characters, ships and systems practically
//! never change, and the set of ids seen by a single bot stays small.
//!
//! ## Lookup rules
//!
//! | Input | External call | Result |
//! |-------|---------------|--------|
//! | `None` id | no | placeholder |
//! | cached id | no | cached record |
//! | uncached id, fetch ok | yes | record (now cached) |
//! | uncached id, fetch fails | yes | placeholder (not cached) |
//!
//! Concurrent lookups of the same uncached id share one fetch: moka runs a
//! single init future per key and hands its result to every waiter.

use killwatch_core::{Category, HealthMonitor};
use moka::future::Cache;
use std::collections::HashMap;
use std::sync::Arc;

use crate::esi::{EntityKind, ReferenceRecord, ReferenceSource};

type RecordCache = Cache<i64, ReferenceRecord>;

/// Process-lifetime cache in front of a [`ReferenceSource`].
pub struct ReferenceCache<S> {
    source: S,
    caches: HashMap<EntityKind, RecordCache>,
    health: Arc<HealthMonitor>,
}

impl<S: ReferenceSource> ReferenceCache<S> {
    pub fn new(source: S, health: Arc<HealthMonitor>) -> Self {
        let caches = EntityKind::ALL
            .into_iter()
            .map(|kind| (kind, Cache::builder().build()))
            .collect();

        Self {
            source,
            caches,
            health,
        }
    }

    /// The underlying source, for calls that bypass the cache.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Resolve an entity id to its display record.
    ///
    /// Never fails: absent ids and failed fetches yield the kind's
    /// placeholder. Only a successful fetch touches the `externalCall`
    /// health category.
    pub async fn lookup(&self, kind: EntityKind, id: Option<i64>) -> ReferenceRecord {
        let Some(id) = id else {
            return ReferenceRecord::placeholder(kind);
        };

        let result = self
            .cache(kind)
            .try_get_with(id, async {
                tracing::debug!(kind = kind.as_str(), id, "reference cache miss, fetching");
                let record = self.source.fetch(kind, id).await?;
                self.health.touch(Category::ExternalCall);
                Ok::<_, crate::Error>(record)
            })
            .await;

        match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(kind = kind.as_str(), id, error = %e, "reference lookup failed");
                ReferenceRecord::placeholder(kind)
            }
        }
    }

    fn cache(&self, kind: EntityKind) -> &RecordCache {
        // Every kind is inserted in `new`.
        &self.caches[&kind]
    }
}
