//! proptest strategies for work items, selections and outcomes

use avatar_batch::models::{FailureKind, ItemOutcome, WorkItem};
use proptest::prelude::*;
use uuid::Uuid;

/// Between 0 and 20 slides with distinct numbers
pub fn work_items_strategy() -> impl Strategy<Value = Vec<WorkItem>> {
    prop::collection::btree_set(1u32..200, 0..20)
        .prop_map(|numbers| numbers.into_iter().map(WorkItem::new).collect())
}

/// Items plus, for each, whether it is selected and whether it has a completed artifact
pub fn scenario_strategy() -> impl Strategy<Value = (Vec<WorkItem>, Vec<bool>, Vec<bool>, bool)> {
    work_items_strategy().prop_flat_map(|items| {
        let n = items.len();
        (
            Just(items),
            prop::collection::vec(any::<bool>(), n),
            prop::collection::vec(any::<bool>(), n),
            any::<bool>(),
        )
    })
}

pub fn failure_kind_strategy() -> impl Strategy<Value = FailureKind> {
    prop_oneof![
        Just(FailureKind::Precondition),
        Just(FailureKind::ProviderTransient),
        Just(FailureKind::ProviderRejection),
        Just(FailureKind::Interrupted),
        Just(FailureKind::Aborted),
    ]
}

/// Outcome for a given item: initiated or failed with some kind
pub fn outcome_for(item_id: Uuid) -> impl Strategy<Value = ItemOutcome> {
    prop_oneof![
        (1u32..=3).prop_map(move |attempts| ItemOutcome::initiated(
            item_id,
            format!("job-{attempts}"),
            attempts
        )),
        (failure_kind_strategy(), 0u32..=3).prop_map(move |(kind, attempts)| {
            ItemOutcome::failed(item_id, kind, format!("{kind} failure"), attempts)
        }),
    ]
}
