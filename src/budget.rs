use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::RowStatus;
use crate::queries::{decode_row, get_row, list_rows, to_object};
use crate::state::AppState;
use crate::store::EntityKind;
use crate::time::DateRange;
use crate::util::dispatch_async_app_result;
use crate::validate::{self, ValidationError};
use crate::AppResult;

/// A spending target over a fixed window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: String,
    pub name: String,
    pub amount: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "RowStatus::is_confirmed")]
    pub status: RowStatus,
}

impl Budget {
    /// The budget window as a transaction query scope.
    pub fn window(&self) -> AppResult<DateRange> {
        DateRange::new(self.start, self.end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBudget {
    pub name: String,
    pub amount: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl NewBudget {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate::name(&self.name, 3)?;
        validate::amount(self.amount)?;
        if self.start >= self.end {
            return Err(ValidationError::WindowInverted);
        }
        Ok(())
    }
}

pub async fn all(state: &AppState) -> AppResult<Vec<Budget>> {
    let rows = list_rows(state, EntityKind::Budget).await?;
    rows.into_iter()
        .map(|row| decode_row(EntityKind::Budget, row))
        .collect()
}

pub async fn by_id(state: &AppState, id: &str) -> AppResult<Option<Budget>> {
    get_row(state, EntityKind::Budget, id)
        .await?
        .map(|row| decode_row(EntityKind::Budget, row))
        .transpose()
}

pub async fn add(state: &AppState, draft: NewBudget) -> AppResult<Budget> {
    dispatch_async_app_result(|| async {
        draft.validate()?;
        let payload = to_object(EntityKind::Budget, &draft)?;
        let confirmed = state.budget_controller().create(payload).await?;
        decode_row(EntityKind::Budget, confirmed)
    })
    .await
}

pub async fn update(state: &AppState, id: &str, patch: NewBudget) -> AppResult<()> {
    dispatch_async_app_result(|| async {
        patch.validate()?;
        let payload = to_object(EntityKind::Budget, &patch)?;
        state.budget_controller().update(id, payload).await
    })
    .await
}

pub async fn delete(state: &AppState, id: &str) -> AppResult<()> {
    dispatch_async_app_result(|| async { state.budget_controller().delete(id).await }).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn march() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 31, 23, 59, 59).unwrap(),
        )
    }

    #[test]
    fn inverted_window_is_rejected() {
        let (start, end) = march();
        let draft = NewBudget {
            name: "March".into(),
            amount: 1200.0,
            start: end,
            end: start,
        };
        assert_eq!(draft.validate(), Err(ValidationError::WindowInverted));
    }

    #[test]
    fn window_becomes_a_query_range() {
        let (start, end) = march();
        let budget = Budget {
            id: "b1".into(),
            name: "March".into(),
            amount: 1200.0,
            start,
            end,
            created_at: None,
            user_id: None,
            status: RowStatus::Confirmed,
        };
        let range = budget.window().unwrap();
        assert_eq!(range.from, start);
        assert_eq!(range.to, end);
    }
}
