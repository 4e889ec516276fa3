use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::id::new_uuid_v7;
use crate::time::{parse_iso, to_iso};
use crate::{AppError, AppResult};

use super::{DataService, EntityKind, SelectQuery};

/// Backend operation families, used to script failures in tests and demos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Default)]
struct Inner {
    tables: HashMap<EntityKind, Vec<Map<String, Value>>>,
    planned_failures: HashMap<OpKind, VecDeque<AppError>>,
}

/// In-process stand-in for the hosted backend: one table per entity kind,
/// server-side stamping of `id`, `created_at` and `user_id` on insert, and
/// the relation-embedding join for transaction reads.
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    user_id: String,
}

impl MemoryBackend {
    pub fn new(user_id: impl Into<String>) -> Self {
        MemoryBackend {
            inner: Mutex::new(Inner::default()),
            user_id: user_id.into(),
        }
    }

    /// Queue an error for the next operation of the given kind. Queued
    /// failures are consumed in FIFO order.
    pub async fn fail_next(&self, op: OpKind, error: AppError) {
        let mut inner = self.inner.lock().await;
        inner.planned_failures.entry(op).or_default().push_back(error);
    }

    pub async fn row_count(&self, entity: EntityKind) -> usize {
        let inner = self.inner.lock().await;
        inner.tables.get(&entity).map_or(0, Vec::len)
    }

    fn take_failure(inner: &mut Inner, op: OpKind) -> Option<AppError> {
        inner.planned_failures.get_mut(&op)?.pop_front()
    }
}

fn row_id(row: &Map<String, Value>) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

fn not_found(entity: EntityKind, id: &str) -> AppError {
    AppError::new("STORE/NOT_FOUND", "Record not found")
        .with_context("entity", entity.as_str())
        .with_context("id", id.to_string())
}

/// Summary object a transaction read embeds in place of a relation id.
fn relation_summary(
    tables: &HashMap<EntityKind, Vec<Map<String, Value>>>,
    entity: EntityKind,
    id: &str,
    keys: &[&str],
) -> Value {
    let Some(rows) = tables.get(&entity) else {
        return Value::Null;
    };
    match rows.iter().find(|row| row_id(row) == Some(id)) {
        Some(row) => {
            let mut summary = Map::new();
            for key in keys {
                if let Some(value) = row.get(*key) {
                    summary.insert((*key).to_string(), value.clone());
                }
            }
            Value::Object(summary)
        }
        None => Value::Null,
    }
}

fn embed_transaction(
    tables: &HashMap<EntityKind, Vec<Map<String, Value>>>,
    mut row: Map<String, Value>,
) -> Map<String, Value> {
    if let Some(category_id) = row.get("category").and_then(Value::as_str).map(String::from) {
        let summary = relation_summary(
            tables,
            EntityKind::Category,
            &category_id,
            &["id", "name", "type"],
        );
        row.insert("category".into(), summary);
    }
    if let Some(source_id) = row.get("source").and_then(Value::as_str).map(String::from) {
        let summary = relation_summary(tables, EntityKind::Source, &source_id, &["id", "name"]);
        row.insert("source".into(), summary);
    }
    if let Some(event_id) = row.get("event").and_then(Value::as_str).map(String::from) {
        let summary = relation_summary(tables, EntityKind::Event, &event_id, &["id", "name"]);
        row.insert("event".into(), summary);
    }
    row
}

#[async_trait]
impl DataService for MemoryBackend {
    async fn select(&self, entity: EntityKind, query: SelectQuery) -> AppResult<Vec<Value>> {
        let mut inner = self.inner.lock().await;
        if let Some(err) = Self::take_failure(&mut inner, OpKind::Select) {
            return Err(err.with_context("operation", "select"));
        }

        let mut rows: Vec<Map<String, Value>> = inner
            .tables
            .get(&entity)
            .map(|rows| rows.to_vec())
            .unwrap_or_default();

        if let Some(id) = &query.id {
            rows.retain(|row| row_id(row) == Some(id.as_str()));
        }

        if let Some((from, to)) = &query.created_between {
            let from = parse_iso(from)?;
            let to = parse_iso(to)?;
            rows.retain(|row| {
                row.get("created_at")
                    .and_then(Value::as_str)
                    .and_then(|raw| parse_iso(raw).ok())
                    .map(|ts| ts >= from && ts <= to)
                    .unwrap_or(false)
            });
        }

        if query.order_created_asc {
            rows.sort_by(|a, b| {
                let a = a.get("created_at").and_then(Value::as_str).unwrap_or("");
                let b = b.get("created_at").and_then(Value::as_str).unwrap_or("");
                a.cmp(b)
            });
        }

        if query.embed_relations && entity == EntityKind::Transaction {
            let tables = &inner.tables;
            rows = rows
                .into_iter()
                .map(|row| embed_transaction(tables, row))
                .collect();
        }

        Ok(rows.into_iter().map(Value::Object).collect())
    }

    async fn insert(&self, entity: EntityKind, mut row: Map<String, Value>) -> AppResult<Value> {
        let mut inner = self.inner.lock().await;
        if let Some(err) = Self::take_failure(&mut inner, OpKind::Insert) {
            return Err(err.with_context("operation", "insert"));
        }

        let id = row
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(new_uuid_v7);
        row.insert("id".into(), Value::String(id));
        row.entry(String::from("created_at"))
            .or_insert_with(|| Value::String(to_iso(Utc::now())));
        row.insert("user_id".into(), Value::String(self.user_id.clone()));

        inner.tables.entry(entity).or_default().push(row.clone());
        Ok(Value::Object(row))
    }

    async fn update(
        &self,
        entity: EntityKind,
        id: &str,
        mut patch: Map<String, Value>,
    ) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(err) = Self::take_failure(&mut inner, OpKind::Update) {
            return Err(err.with_context("operation", "update"));
        }

        patch.remove("id");
        patch.remove("created_at");
        patch.remove("user_id");

        let rows = inner.tables.entry(entity).or_default();
        let row = rows
            .iter_mut()
            .find(|row| row_id(row) == Some(id))
            .ok_or_else(|| not_found(entity, id))?;
        for (key, value) in patch {
            row.insert(key, value);
        }
        Ok(())
    }

    async fn delete(&self, entity: EntityKind, id: &str) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(err) = Self::take_failure(&mut inner, OpKind::Delete) {
            return Err(err.with_context("operation", "delete"));
        }

        let rows = inner.tables.entry(entity).or_default();
        let before = rows.len();
        rows.retain(|row| row_id(row) != Some(id));
        if rows.len() == before {
            return Err(not_found(entity, id));
        }
        Ok(())
    }
}
