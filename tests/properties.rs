use std::sync::Arc;

use proptest::collection::vec;
use proptest::prelude::*;
use serde_json::{json, Value};

use tallybook::cache::QueryKey;
use tallybook::category::{FlowKind, NewCategory};
use tallybook::notify::LogNotifier;
use tallybook::prefs::PrefsHandle;
use tallybook::report::aggregate_by_category;
use tallybook::store::memory::{MemoryBackend, OpKind};
use tallybook::store::EntityKind;
use tallybook::transaction::{CategoryRef, SourceRef, TransactionExpanded};
use tallybook::{category, AppError, AppState};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

fn state() -> (AppState, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new("u1"));
    let state = AppState::new(
        backend.clone(),
        Arc::new(LogNotifier),
        PrefsHandle::in_memory(),
    );
    (state, backend)
}

fn confirmed_row((name, amount): &(String, u16)) -> Value {
    json!({
        "id": format!("c-{name}-{amount}"),
        "name": name,
        "type": "expense",
        "amount": amount,
        "created_at": "2025-03-01T00:00:00.000Z",
        "user_id": "u1"
    })
}

proptest! {
    // For any cached collection, a failed create leaves the collection
    // cache exactly as it was before the mutation began.
    #[test]
    fn failed_create_restores_any_prior_collection(
        rows in vec(("[a-z]{3,8}", any::<u16>()), 0..8),
        draft_name in "[a-z]{3,12}",
    ) {
        runtime().block_on(async {
            let (state, backend) = state();
            let key = QueryKey::collection(EntityKind::Category);

            let before: Option<Value> = if rows.is_empty() {
                None
            } else {
                let snapshot = Value::Array(rows.iter().map(confirmed_row).collect());
                state.cache().write(&key, |_| snapshot.clone());
                Some(snapshot)
            };

            backend
                .fail_next(OpKind::Insert, AppError::new("STORE/DOWN", "offline"))
                .await;
            let result = category::add(
                &state,
                NewCategory {
                    name: draft_name,
                    description: None,
                    kind: FlowKind::Expense,
                },
            )
            .await;
            prop_assert!(result.is_err());
            prop_assert_eq!(state.cache().read(&key), before);
            Ok(())
        })?;
    }

    // Bucket totals conserve the filtered amounts and key on identifiers.
    #[test]
    fn aggregation_conserves_amounts_and_identifiers(
        entries in vec((0u8..5, 1u16..500, any::<bool>()), 0..32),
    ) {
        let transactions: Vec<TransactionExpanded> = entries
            .iter()
            .enumerate()
            .map(|(i, (cat, amount, is_expense))| TransactionExpanded {
                id: format!("t{i}"),
                name: format!("tx {i}"),
                amount: f64::from(*amount),
                kind: if *is_expense { FlowKind::Expense } else { FlowKind::Income },
                category: Some(CategoryRef {
                    id: format!("cat-{cat}"),
                    name: "Bucket".into(),
                    kind: if *is_expense { FlowKind::Expense } else { FlowKind::Income },
                }),
                source: Some(SourceRef { id: "s1".into(), name: "Card".into() }),
                event: None,
                created_at: "2025-03-01T00:00:00.000Z".into(),
                user_id: None,
            })
            .collect();

        let buckets = aggregate_by_category(&transactions, FlowKind::Expense);

        let expected_total: f64 = transactions
            .iter()
            .filter(|tx| tx.kind == FlowKind::Expense)
            .map(|tx| tx.amount)
            .sum();
        let bucket_total: f64 = buckets.iter().map(|bucket| bucket.value).sum();
        prop_assert_eq!(bucket_total, expected_total);

        let mut ids: Vec<&str> = buckets.iter().map(|bucket| bucket.id.as_str()).collect();
        ids.sort();
        let len_before = ids.len();
        ids.dedup();
        prop_assert_eq!(ids.len(), len_before);

        for bucket in &buckets {
            prop_assert!(bucket.value > 0.0);
        }
    }
}
