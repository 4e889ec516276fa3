use serde::Serialize;

use crate::budget::Budget;
use crate::category::FlowKind;
use crate::time::parse_iso;
use crate::transaction::TransactionExpanded;

/// Deterministic display color for a category identifier: the same seed
/// yields the same `hsl(...)` token within and across runs.
pub fn generate_color(seed: &str) -> String {
    let mut hash: i32 = 0;
    for unit in seed.encode_utf16() {
        hash = hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(unit as i32);
    }

    let hue = hash % 360;
    let saturation = 70 + (hash % 30);
    let lightness = 50 + (hash % 20);

    format!("hsl({hue}, {saturation}%, {lightness}%)")
}

/// One category bucket of the aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FlowKind,
    pub value: f64,
    #[serde(rename = "fill")]
    pub color: String,
}

/// Sum transaction amounts per category for the requested flow kind.
///
/// Buckets key on the category identifier, not its name: two categories
/// with identical names stay distinct. Rows without an embedded category
/// (dangling reference) are skipped. Bucket order is first-seen.
pub fn aggregate_by_category(
    transactions: &[TransactionExpanded],
    kind: FlowKind,
) -> Vec<CategoryTotal> {
    let mut buckets: Vec<CategoryTotal> = Vec::new();
    for tx in transactions.iter().filter(|tx| tx.kind == kind) {
        let Some(category) = &tx.category else {
            tracing::debug!(
                target: "tallybook::report",
                transaction = %tx.id,
                "skipping_row_without_category"
            );
            continue;
        };
        match buckets.iter_mut().find(|bucket| bucket.id == category.id) {
            Some(bucket) => bucket.value += tx.amount,
            None => buckets.push(CategoryTotal {
                id: category.id.clone(),
                name: category.name.clone(),
                kind: category.kind,
                value: tx.amount,
                color: generate_color(&category.id),
            }),
        }
    }
    buckets
}

/// How much of a budget window has been consumed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetBreakdown {
    pub used: f64,
    /// Negative when overspent.
    pub available: f64,
    pub total_budget: f64,
}

impl BudgetBreakdown {
    /// Rounded percentage of the budget already spent; an empty budget
    /// reads as 0% rather than dividing by zero.
    pub fn usage_percentage(&self) -> i64 {
        if self.total_budget > 0.0 {
            (self.used / self.total_budget * 100.0).round() as i64
        } else {
            0
        }
    }
}

/// Compute the breakdown for a budget from transactions already restricted
/// to its window. Only expense-kind amounts count as used.
pub fn budget_breakdown(budget: &Budget, transactions: &[TransactionExpanded]) -> BudgetBreakdown {
    let used: f64 = transactions
        .iter()
        .filter(|tx| tx.kind == FlowKind::Expense)
        .map(|tx| tx.amount)
        .sum();
    let total_budget = budget.amount;
    BudgetBreakdown {
        used,
        available: total_budget - used,
        total_budget,
    }
}

/// One point of the transaction-history series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    /// Human date label, e.g. "Mar 1, 2025".
    pub date: String,
    pub name: String,
    pub amount: f64,
    pub category: Option<String>,
    pub source: Option<String>,
}

/// Per-transaction time series for the history chart, filtered by flow
/// kind and optionally by category identifier. Input order (creation
/// ascending) is preserved.
pub fn history_points(
    transactions: &[TransactionExpanded],
    kind: FlowKind,
    category_id: Option<&str>,
) -> Vec<HistoryPoint> {
    transactions
        .iter()
        .filter(|tx| tx.kind == kind)
        .filter(|tx| match category_id {
            Some(wanted) => tx
                .category
                .as_ref()
                .is_some_and(|category| category.id == wanted),
            None => true,
        })
        .map(|tx| HistoryPoint {
            date: date_label(&tx.created_at),
            name: tx.name.clone(),
            amount: tx.amount,
            category: tx.category.as_ref().map(|c| c.name.clone()),
            source: tx.source.as_ref().map(|s| s.name.clone()),
        })
        .collect()
}

fn date_label(created_at: &str) -> String {
    match parse_iso(created_at) {
        Ok(ts) => ts.format("%b %-d, %Y").to_string(),
        Err(_) => created_at.to_string(),
    }
}
