use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::cache::QueryKey;
use crate::state::AppState;
use crate::store::{EntityKind, SelectQuery};
use crate::time::DateRange;
use crate::{AppError, AppResult};

/// Decode a backend/cache row into its typed form.
pub(crate) fn decode_row<T: DeserializeOwned>(kind: EntityKind, value: Value) -> AppResult<T> {
    serde_json::from_value(value).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "decode")
            .with_context("entity", kind.as_str())
    })
}

/// Serialize a draft or patch into the object payload the backend expects.
pub(crate) fn to_object<T: Serialize>(kind: EntityKind, value: &T) -> AppResult<Map<String, Value>> {
    match serde_json::to_value(value).map_err(AppError::from)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::new("QUERY/PAYLOAD", "Expected an object payload")
            .with_context("entity", kind.as_str())
            .with_context("got", other.to_string())),
    }
}

fn rows_of(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        _ => Vec::new(),
    }
}

/// Cache-backed collection read for an entity kind.
pub async fn list_rows(state: &AppState, kind: EntityKind) -> AppResult<Vec<Value>> {
    let key = QueryKey::collection(kind);
    let backend = state.backend().clone();
    let value = state
        .cache()
        .fetch(&key, || async move {
            backend.select(kind, SelectQuery::all()).await.map(Value::Array)
        })
        .await
        .map_err(|err| {
            err.with_context("operation", "list")
                .with_context("entity", kind.as_str())
        })?;
    Ok(rows_of(value))
}

/// Cache-backed single-record read; `None` when the backend has no row.
pub async fn get_row(state: &AppState, kind: EntityKind, id: &str) -> AppResult<Option<Value>> {
    let key = QueryKey::by_id(kind, id);
    let backend = state.backend().clone();
    let id_owned = id.to_string();
    let value = state
        .cache()
        .fetch(&key, || async move {
            let rows = backend
                .select(kind, SelectQuery::by_id(id_owned.as_str()))
                .await?;
            Ok(rows.into_iter().next().unwrap_or(Value::Null))
        })
        .await
        .map_err(|err| {
            err.with_context("operation", "get")
                .with_context("entity", kind.as_str())
                .with_context("id", id.to_string())
        })?;
    match value {
        Value::Null => Ok(None),
        row => Ok(Some(row)),
    }
}

/// Range-scoped expanded transaction read: relation summaries embedded,
/// rows ordered by creation time, both bounds required. Each distinct
/// range caches independently.
pub async fn list_transactions_in_range(
    state: &AppState,
    range: Option<&DateRange>,
) -> AppResult<Vec<Value>> {
    let range = range.ok_or_else(|| {
        AppError::new("QUERY/RANGE_REQUIRED", "Date range must be fully specified")
    })?;
    let key = QueryKey::range(EntityKind::Transaction, range);
    let backend = state.backend().clone();
    let query = SelectQuery::range(range);
    let value = state
        .cache()
        .fetch(&key, || async move {
            backend
                .select(EntityKind::Transaction, query)
                .await
                .map(Value::Array)
        })
        .await
        .map_err(|err| {
            err.with_context("operation", "list_range")
                .with_context("entity", EntityKind::Transaction.as_str())
        })?;
    Ok(rows_of(value))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::notify::LogNotifier;
    use crate::prefs::PrefsHandle;
    use crate::store::memory::{MemoryBackend, OpKind};
    use crate::store::DataService;

    use super::*;

    fn state_with(backend: Arc<MemoryBackend>) -> AppState {
        AppState::new(backend, Arc::new(LogNotifier), PrefsHandle::in_memory())
    }

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[tokio::test]
    async fn list_caches_the_first_read() {
        let backend = Arc::new(MemoryBackend::new("user-1"));
        backend
            .insert(EntityKind::Source, obj(json!({ "name": "Cash" })))
            .await
            .unwrap();
        let state = state_with(backend.clone());

        let first = list_rows(&state, EntityKind::Source).await.unwrap();
        assert_eq!(first.len(), 1);

        // A select failure after the cache is warm goes unnoticed.
        backend
            .fail_next(OpKind::Select, AppError::new("STORE/DOWN", "offline"))
            .await;
        let second = list_rows(&state, EntityKind::Source).await.unwrap();
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn get_row_caches_absence_as_none() {
        let backend = Arc::new(MemoryBackend::new("user-1"));
        let state = state_with(backend);
        let row = get_row(&state, EntityKind::Budget, "missing").await.unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn range_query_requires_both_bounds() {
        let backend = Arc::new(MemoryBackend::new("user-1"));
        let state = state_with(backend);
        let err = list_transactions_in_range(&state, None).await.unwrap_err();
        assert_eq!(err.code(), "QUERY/RANGE_REQUIRED");
        assert_eq!(err.message(), "Date range must be fully specified");
    }
}
