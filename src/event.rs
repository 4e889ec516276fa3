use serde::{Deserialize, Serialize};

use crate::engine::RowStatus;
use crate::queries::{decode_row, get_row, list_rows, to_object};
use crate::state::AppState;
use crate::store::EntityKind;
use crate::util::dispatch_async_app_result;
use crate::validate::{self, ValidationError};
use crate::AppResult;

/// An occasion transactions can be grouped under (a trip, a party...),
/// optionally carrying its own earmarked budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "RowStatus::is_confirmed")]
    pub status: RowStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
}

impl NewEvent {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate::name(&self.name, 1)?;
        if let Some(budget) = self.budget {
            validate::amount(budget)?;
        }
        Ok(())
    }
}

pub async fn all(state: &AppState) -> AppResult<Vec<Event>> {
    let rows = list_rows(state, EntityKind::Event).await?;
    rows.into_iter()
        .map(|row| decode_row(EntityKind::Event, row))
        .collect()
}

pub async fn by_id(state: &AppState, id: &str) -> AppResult<Option<Event>> {
    get_row(state, EntityKind::Event, id)
        .await?
        .map(|row| decode_row(EntityKind::Event, row))
        .transpose()
}

pub async fn add(state: &AppState, draft: NewEvent) -> AppResult<Event> {
    dispatch_async_app_result(|| async {
        draft.validate()?;
        let payload = to_object(EntityKind::Event, &draft)?;
        let confirmed = state.event_controller().create(payload).await?;
        decode_row(EntityKind::Event, confirmed)
    })
    .await
}

pub async fn update(state: &AppState, id: &str, patch: NewEvent) -> AppResult<()> {
    dispatch_async_app_result(|| async {
        patch.validate()?;
        let payload = to_object(EntityKind::Event, &patch)?;
        state.event_controller().update(id, payload).await
    })
    .await
}

pub async fn delete(state: &AppState, id: &str) -> AppResult<()> {
    dispatch_async_app_result(|| async { state.event_controller().delete(id).await }).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_character_names_are_enough_for_events() {
        let draft = NewEvent {
            name: "X".into(),
            description: None,
            budget: Some(250.0),
        };
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn event_budget_must_be_finite() {
        let draft = NewEvent {
            name: "Trip".into(),
            description: None,
            budget: Some(f64::NAN),
        };
        assert!(draft.validate().is_err());
    }
}
