use serde::{Deserialize, Serialize};

use crate::engine::RowStatus;
use crate::queries::{decode_row, get_row, list_rows, to_object};
use crate::state::AppState;
use crate::store::EntityKind;
use crate::util::dispatch_async_app_result;
use crate::validate::{self, ValidationError};
use crate::AppResult;

/// Direction of money movement. Categories are typed, and transactions
/// inherit the typing through their category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    Income,
    Expense,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Income => "income",
            FlowKind::Expense => "expense",
        }
    }
}

/// A cached category row. `created_at` and `user_id` are absent while the
/// row is still pending server confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: FlowKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "RowStatus::is_confirmed")]
    pub status: RowStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: FlowKind,
}

impl NewCategory {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate::name(&self.name, 3)
    }
}

pub async fn all(state: &AppState) -> AppResult<Vec<Category>> {
    let rows = list_rows(state, EntityKind::Category).await?;
    rows.into_iter()
        .map(|row| decode_row(EntityKind::Category, row))
        .collect()
}

pub async fn by_id(state: &AppState, id: &str) -> AppResult<Option<Category>> {
    get_row(state, EntityKind::Category, id)
        .await?
        .map(|row| decode_row(EntityKind::Category, row))
        .transpose()
}

pub async fn add(state: &AppState, draft: NewCategory) -> AppResult<Category> {
    dispatch_async_app_result(|| async {
        draft.validate()?;
        let payload = to_object(EntityKind::Category, &draft)?;
        let confirmed = state.category_controller().create(payload).await?;
        decode_row(EntityKind::Category, confirmed)
    })
    .await
}

pub async fn update(state: &AppState, id: &str, patch: NewCategory) -> AppResult<()> {
    dispatch_async_app_result(|| async {
        patch.validate()?;
        let payload = to_object(EntityKind::Category, &patch)?;
        state.category_controller().update(id, payload).await
    })
    .await
}

pub async fn delete(state: &AppState, id: &str) -> AppResult<()> {
    dispatch_async_app_result(|| async { state.category_controller().delete(id).await }).await
}
