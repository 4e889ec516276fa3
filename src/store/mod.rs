use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::time::DateRange;
use crate::AppResult;

pub mod memory;

pub use memory::MemoryBackend;

/// The five entity families the backend exposes. The string form is both
/// the remote table name and the cache-key namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Budget,
    Category,
    Event,
    Source,
    Transaction,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Budget,
        EntityKind::Category,
        EntityKind::Event,
        EntityKind::Source,
        EntityKind::Transaction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Budget => "budget",
            EntityKind::Category => "category",
            EntityKind::Event => "event",
            EntityKind::Source => "source",
            EntityKind::Transaction => "transaction",
        }
    }

    /// Human form used in notification templates.
    pub fn display_name(&self) -> &'static str {
        match self {
            EntityKind::Budget => "Budget",
            EntityKind::Category => "Category",
            EntityKind::Event => "Event",
            EntityKind::Source => "Source",
            EntityKind::Transaction => "Transaction",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row filter for `DataService::select`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectQuery {
    /// Restrict to a single record.
    pub id: Option<String>,
    /// Inclusive RFC 3339 bounds on the creation timestamp.
    pub created_between: Option<(String, String)>,
    /// Embed relation summaries (transaction reads embed category, source
    /// and event).
    pub embed_relations: bool,
    /// Order results by creation timestamp, ascending.
    pub order_created_asc: bool,
}

impl SelectQuery {
    pub fn all() -> Self {
        SelectQuery::default()
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        SelectQuery {
            id: Some(id.into()),
            ..SelectQuery::default()
        }
    }

    /// The dashboard shape: range-bounded, embedded, creation-ordered.
    pub fn range(range: &DateRange) -> Self {
        let (from, to) = range.bounds_iso();
        SelectQuery {
            created_between: Some((from, to)),
            embed_relations: true,
            order_created_asc: true,
            ..SelectQuery::default()
        }
    }
}

/// The hosted backend data service, one logical table per [`EntityKind`].
///
/// The remote store owns persistence, access control and referential
/// constraints; every method may fail with a human-readable error.
#[async_trait]
pub trait DataService: Send + Sync {
    async fn select(&self, entity: EntityKind, query: SelectQuery) -> AppResult<Vec<Value>>;

    /// Insert a row and return the confirmed, server-stamped record.
    async fn insert(&self, entity: EntityKind, row: Map<String, Value>) -> AppResult<Value>;

    async fn update(&self, entity: EntityKind, id: &str, patch: Map<String, Value>)
        -> AppResult<()>;

    async fn delete(&self, entity: EntityKind, id: &str) -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn kind_strings_are_stable() {
        let names: Vec<&str> = EntityKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec!["budget", "category", "event", "source", "transaction"]
        );
    }

    #[test]
    fn range_query_sets_dashboard_shape() {
        let from = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap();
        let range = DateRange::new(from, to).unwrap();
        let query = SelectQuery::range(&range);
        assert!(query.embed_relations);
        assert!(query.order_created_asc);
        assert!(query.id.is_none());
        let (lo, hi) = query.created_between.unwrap();
        assert!(lo.starts_with("2025-01-01"));
        assert!(hi.starts_with("2025-01-31"));
    }
}
