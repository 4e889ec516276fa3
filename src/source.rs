use serde::{Deserialize, Serialize};

use crate::engine::RowStatus;
use crate::queries::{decode_row, get_row, list_rows, to_object};
use crate::state::AppState;
use crate::store::EntityKind;
use crate::util::dispatch_async_app_result;
use crate::validate::{self, ValidationError};
use crate::AppResult;

/// A payment source (card, account, cash...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "RowStatus::is_confirmed")]
    pub status: RowStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NewSource {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate::name(&self.name, 3)
    }
}

pub async fn all(state: &AppState) -> AppResult<Vec<Source>> {
    let rows = list_rows(state, EntityKind::Source).await?;
    rows.into_iter()
        .map(|row| decode_row(EntityKind::Source, row))
        .collect()
}

pub async fn by_id(state: &AppState, id: &str) -> AppResult<Option<Source>> {
    get_row(state, EntityKind::Source, id)
        .await?
        .map(|row| decode_row(EntityKind::Source, row))
        .transpose()
}

pub async fn add(state: &AppState, draft: NewSource) -> AppResult<Source> {
    dispatch_async_app_result(|| async {
        draft.validate()?;
        let payload = to_object(EntityKind::Source, &draft)?;
        let confirmed = state.source_controller().create(payload).await?;
        decode_row(EntityKind::Source, confirmed)
    })
    .await
}

pub async fn update(state: &AppState, id: &str, patch: NewSource) -> AppResult<()> {
    dispatch_async_app_result(|| async {
        patch.validate()?;
        let payload = to_object(EntityKind::Source, &patch)?;
        state.source_controller().update(id, payload).await
    })
    .await
}

pub async fn delete(state: &AppState, id: &str) -> AppResult<()> {
    dispatch_async_app_result(|| async { state.source_controller().delete(id).await }).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn row_round_trips_through_json() {
        let source: Source = serde_json::from_value(json!({
            "id": "s1",
            "name": "Debit card",
            "created_at": "2025-03-01T00:00:00.000Z",
            "user_id": "u1"
        }))
        .unwrap();
        assert_eq!(source.status, RowStatus::Confirmed);
        let value = serde_json::to_value(&source).unwrap();
        assert!(value.get("status").is_none());
        assert!(value.get("description").is_none());
    }
}
