use serde::{Deserialize, Serialize};

use crate::category::FlowKind;
use crate::engine::RowStatus;
use crate::queries::{decode_row, get_row, list_rows, list_transactions_in_range, to_object};
use crate::state::AppState;
use crate::store::EntityKind;
use crate::time::DateRange;
use crate::util::dispatch_async_app_result;
use crate::validate::{self, ValidationError};
use crate::AppResult;

/// A recorded income or expense. Relations are carried as identifiers in
/// the stored form; range-scoped dashboard reads return the expanded form
/// instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub name: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: FlowKind,
    pub category: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "RowStatus::is_confirmed")]
    pub status: RowStatus,
}

/// Relation summary embedded by expanded reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FlowKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRef {
    pub id: String,
    pub name: String,
}

/// A transaction with its relations embedded. A dangling reference embeds
/// as `None`; the reporting layer skips such rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionExpanded {
    pub id: String,
    pub name: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: FlowKind,
    #[serde(default)]
    pub category: Option<CategoryRef>,
    #[serde(default)]
    pub source: Option<SourceRef>,
    #[serde(default)]
    pub event: Option<EventRef>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub name: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: FlowKind,
    pub category: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl NewTransaction {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate::name(&self.name, 3)?;
        validate::amount(self.amount)
    }
}

pub async fn all(state: &AppState) -> AppResult<Vec<Transaction>> {
    let rows = list_rows(state, EntityKind::Transaction).await?;
    rows.into_iter()
        .map(|row| decode_row(EntityKind::Transaction, row))
        .collect()
}

pub async fn by_id(state: &AppState, id: &str) -> AppResult<Option<Transaction>> {
    get_row(state, EntityKind::Transaction, id)
        .await?
        .map(|row| decode_row(EntityKind::Transaction, row))
        .transpose()
}

/// Expanded transactions whose creation time falls in `range`; both
/// bounds are required. Each distinct range is its own cache entry.
pub async fn expanded_in_range(
    state: &AppState,
    range: Option<&DateRange>,
) -> AppResult<Vec<TransactionExpanded>> {
    let rows = list_transactions_in_range(state, range).await?;
    rows.into_iter()
        .map(|row| decode_row(EntityKind::Transaction, row))
        .collect()
}

pub async fn add(state: &AppState, draft: NewTransaction) -> AppResult<Transaction> {
    dispatch_async_app_result(|| async {
        draft.validate()?;
        let payload = to_object(EntityKind::Transaction, &draft)?;
        let confirmed = state.transaction_controller().create(payload).await?;
        decode_row(EntityKind::Transaction, confirmed)
    })
    .await
}

pub async fn update(state: &AppState, id: &str, patch: NewTransaction) -> AppResult<()> {
    dispatch_async_app_result(|| async {
        patch.validate()?;
        let payload = to_object(EntityKind::Transaction, &patch)?;
        state.transaction_controller().update(id, payload).await
    })
    .await
}

pub async fn delete(state: &AppState, id: &str) -> AppResult<()> {
    dispatch_async_app_result(|| async { state.transaction_controller().delete(id).await }).await
}
