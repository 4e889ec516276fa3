use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::{QueryCache, QueryKey};
use crate::id::new_uuid_v7;
use crate::notify::Notify;
use crate::store::{DataService, EntityKind};
use crate::{AppError, AppResult};

/// Lifecycle phase of a cached row.
///
/// Confirmed rows serialize without a marker; pending rows carry a
/// `status` field so the UI can render the transient affordance and
/// disable edit/delete actions. At most one marker applies to a row, and
/// a pending-create row is never transitioned to pending-delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowStatus {
    #[default]
    Confirmed,
    PendingCreate,
    PendingDelete,
}

impl RowStatus {
    /// Used to keep the marker off the wire for settled rows.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, RowStatus::Confirmed)
    }
}

const STATUS_FIELD: &str = "status";

/// Lifecycle status of a cached row; an absent or unrecognized marker
/// means confirmed.
pub fn row_status(row: &Value) -> RowStatus {
    match row.get(STATUS_FIELD).and_then(Value::as_str) {
        Some("pending-create") => RowStatus::PendingCreate,
        Some("pending-delete") => RowStatus::PendingDelete,
        _ => RowStatus::Confirmed,
    }
}

pub fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

fn set_status(row: &mut Value, status: RowStatus) {
    if let Value::Object(map) = row {
        match status {
            RowStatus::Confirmed => {
                map.remove(STATUS_FIELD);
            }
            RowStatus::PendingCreate => {
                map.insert(STATUS_FIELD.into(), Value::String("pending-create".into()));
            }
            RowStatus::PendingDelete => {
                map.insert(STATUS_FIELD.into(), Value::String("pending-delete".into()));
            }
        }
    }
}

fn as_rows(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(rows)) => rows,
        _ => Vec::new(),
    }
}

/// Optimistic mutation engine for one entity kind.
///
/// Every mutation follows the same shape: cancel in-flight collection
/// reads, snapshot the cache, patch it optimistically, issue the remote
/// call, reconcile on success or roll back to the snapshot on failure,
/// and always invalidate afterwards so the cache re-synchronizes with the
/// backend even if a reconcile step misbehaved.
///
/// No per-key lock is taken across mutations: two mutations interleaving
/// between snapshot and write-back can lose one optimistic patch (last
/// writer wins). The trailing invalidation restores consistency; see
/// DESIGN.md.
pub struct EntityController {
    kind: EntityKind,
    cache: Arc<QueryCache>,
    backend: Arc<dyn DataService>,
    notifier: Arc<dyn Notify>,
}

impl EntityController {
    pub fn new(
        kind: EntityKind,
        cache: Arc<QueryCache>,
        backend: Arc<dyn DataService>,
        notifier: Arc<dyn Notify>,
    ) -> Self {
        EntityController {
            kind,
            cache,
            backend,
            notifier,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    fn collection_key(&self) -> QueryKey {
        QueryKey::collection(self.kind)
    }

    fn wrap(&self, err: AppError, operation: &str) -> AppError {
        err.with_context("operation", operation.to_string())
            .with_context("entity", self.kind.as_str())
    }

    /// Create a record. The draft is appended to the cached collection
    /// under a fresh pending-create identifier before the remote insert is
    /// issued; on success all pending-create rows are replaced by the
    /// confirmed record, on failure the pre-mutation snapshot is restored.
    pub async fn create(&self, draft: Map<String, Value>) -> AppResult<Value> {
        let key = self.collection_key();
        self.cache.cancel_in_flight(&key);
        let snapshot = self.cache.read(&key);

        let pending_id = new_uuid_v7();
        let mut pending = Value::Object(draft.clone());
        if let Value::Object(map) = &mut pending {
            map.insert("id".into(), Value::String(pending_id.clone()));
        }
        set_status(&mut pending, RowStatus::PendingCreate);
        self.cache.write(&key, |old| {
            let mut rows = as_rows(old);
            rows.push(pending);
            Value::Array(rows)
        });
        tracing::debug!(
            target: "tallybook::engine",
            entity = %self.kind,
            pending_id = %pending_id,
            "optimistic_create"
        );

        let result = self.backend.insert(self.kind, draft).await;
        let outcome = match result {
            Ok(confirmed) => {
                self.cache.write(&key, |old| {
                    let mut rows = as_rows(old);
                    rows.retain(|row| row_status(row) != RowStatus::PendingCreate);
                    rows.push(confirmed.clone());
                    Value::Array(rows)
                });
                self.notifier
                    .success(&format!("{} Added", self.kind.display_name()));
                Ok(confirmed)
            }
            Err(err) => {
                self.cache.restore(&key, snapshot);
                self.notifier.error(err.message());
                tracing::warn!(
                    target: "tallybook::engine",
                    entity = %self.kind,
                    error = %err,
                    "create_rolled_back"
                );
                Err(self.wrap(err, "create"))
            }
        };

        self.cache.invalidate(&key);
        outcome
    }

    /// Update a record in place on the backend. No optimistic field patch
    /// is applied; the cache keeps showing pre-update data until the
    /// post-success invalidation forces a refetch.
    pub async fn update(&self, id: &str, patch: Map<String, Value>) -> AppResult<()> {
        let key = self.collection_key();
        match self.backend.update(self.kind, id, patch).await {
            Ok(()) => {
                self.cache.invalidate(&key);
                self.notifier
                    .success(&format!("{} Updated", self.kind.display_name()));
                Ok(())
            }
            Err(err) => {
                self.notifier.error(err.message());
                tracing::warn!(
                    target: "tallybook::engine",
                    entity = %self.kind,
                    id,
                    error = %err,
                    "update_failed"
                );
                Err(self.wrap(err, "update").with_context("id", id.to_string()))
            }
        }
    }

    /// Delete a record. The cached row is marked pending-delete in place
    /// (not removed) so the UI can render a transient "deleting" state;
    /// removal happens only on server confirmation. The single-record
    /// entry is dropped up front so it cannot be independently refetched
    /// while the deletion settles.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let key = self.collection_key();
        let single_key = QueryKey::by_id(self.kind, id);

        self.notifier
            .loading(&format!("Deleting {}...", self.kind.display_name()));
        self.cache.cancel_in_flight(&key);

        let snapshot = self.cache.read(&key);
        let single_snapshot = self.cache.read(&single_key);

        self.cache.write(&key, |old| {
            let mut rows = as_rows(old);
            for row in &mut rows {
                // Pending-create rows are never marked for deletion; the
                // record does not exist server-side yet.
                if row_id(row) == Some(id) && row_status(row) == RowStatus::Confirmed {
                    set_status(row, RowStatus::PendingDelete);
                }
            }
            Value::Array(rows)
        });
        if single_snapshot.is_some() {
            self.cache.remove(&single_key);
        }
        tracing::debug!(
            target: "tallybook::engine",
            entity = %self.kind,
            id,
            "optimistic_delete"
        );

        let outcome = match self.backend.delete(self.kind, id).await {
            Ok(()) => {
                self.cache.write(&key, |old| {
                    let mut rows = as_rows(old);
                    rows.retain(|row| {
                        !(row_status(row) == RowStatus::PendingDelete && row_id(row) == Some(id))
                    });
                    Value::Array(rows)
                });
                self.notifier.success("Successfully deleted");
                Ok(())
            }
            Err(err) => {
                self.cache.restore(&key, snapshot);
                if single_snapshot.is_some() {
                    self.cache.restore(&single_key, single_snapshot);
                }
                self.notifier.error("Deletion failed. Please try again.");
                tracing::warn!(
                    target: "tallybook::engine",
                    entity = %self.kind,
                    id,
                    error = %err,
                    "delete_rolled_back"
                );
                Err(self.wrap(err, "delete").with_context("id", id.to_string()))
            }
        };

        self.cache.invalidate(&key);
        outcome
    }
}
