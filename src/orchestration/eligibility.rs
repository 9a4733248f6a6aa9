//! # Eligibility Filter
//!
//! Decides which selected slides need a new generation call. Pure: no I/O,
//! no shared state.

use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::models::{ExistingArtifact, Selection, WorkItem};

/// Partition of the selected items into work and skips
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Eligibility {
    /// Number of items the selection resolved to
    pub selected: usize,
    /// Items requiring a provider call, in collection order
    pub eligible: Vec<WorkItem>,
    /// Selected items that already have a completed artifact
    pub skipped: Vec<Uuid>,
    /// Explicitly selected ids that are not part of the collection
    pub unknown: Vec<Uuid>,
}

impl Eligibility {
    pub fn skipped_count(&self) -> usize {
        self.selected - self.eligible.len()
    }
}

/// Restrict the collection to the selection, ordered by slide number.
pub fn select_items(items: &[WorkItem], selection: &Selection) -> Vec<WorkItem> {
    let mut selected: Vec<WorkItem> = match selection {
        Selection::All => items.to_vec(),
        Selection::Items(ids) => {
            let wanted: HashSet<&Uuid> = ids.iter().collect();
            items
                .iter()
                .filter(|item| wanted.contains(&item.item_id))
                .cloned()
                .collect()
        }
    };
    selected.sort_by_key(|item| item.slide_number);
    selected
}

/// Compute the eligible work list for a request.
///
/// With `regenerate_existing` every selected item is eligible; otherwise
/// items whose id has an existing artifact are skipped.
pub fn filter_eligible(
    items: &[WorkItem],
    selection: &Selection,
    existing: &HashMap<Uuid, ExistingArtifact>,
    regenerate_existing: bool,
) -> Eligibility {
    let selected = select_items(items, selection);

    let unknown = match selection {
        Selection::All => Vec::new(),
        Selection::Items(ids) => {
            let known: HashSet<Uuid> = items.iter().map(|item| item.item_id).collect();
            ids.iter().filter(|id| !known.contains(id)).copied().collect()
        }
    };

    let selected_count = selected.len();
    let (eligible, skipped): (Vec<WorkItem>, Vec<WorkItem>) = selected
        .into_iter()
        .partition(|item| regenerate_existing || !existing.contains_key(&item.item_id));

    Eligibility {
        selected: selected_count,
        eligible,
        skipped: skipped.into_iter().map(|item| item.item_id).collect(),
        unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn collection(count: u32) -> Vec<WorkItem> {
        // Deliberately out of slide order
        (1..=count).rev().map(WorkItem::new).collect()
    }

    fn artifact_for(item: &WorkItem) -> (Uuid, ExistingArtifact) {
        (
            item.item_id,
            ExistingArtifact {
                item_id: item.item_id,
                artifact_id: Uuid::new_v4(),
                handle: format!("video-{}", item.slide_number),
                completed_at: Utc::now(),
            },
        )
    }

    #[test]
    fn test_existing_artifacts_are_skipped() {
        let items = collection(5);
        let existing: HashMap<_, _> = items.iter().take(3).map(artifact_for).collect();

        let result = filter_eligible(&items, &Selection::All, &existing, false);

        assert_eq!(result.selected, 5);
        assert_eq!(result.eligible.len(), 2);
        assert_eq!(result.skipped.len(), 3);
        assert_eq!(result.skipped_count(), 3);
        assert!(result
            .eligible
            .iter()
            .all(|item| !existing.contains_key(&item.item_id)));
    }

    #[test]
    fn test_regenerate_returns_full_selection() {
        let items = collection(4);
        let existing: HashMap<_, _> = items.iter().map(artifact_for).collect();

        let result = filter_eligible(&items, &Selection::All, &existing, true);

        assert_eq!(result.eligible.len(), 4);
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn test_subset_preserves_collection_order() {
        let items = collection(6);
        let by_slide: HashMap<u32, Uuid> =
            items.iter().map(|i| (i.slide_number, i.item_id)).collect();
        let selection = Selection::Items(vec![by_slide[&5], by_slide[&2], by_slide[&4]]);

        let result = filter_eligible(&items, &selection, &HashMap::new(), false);

        let slides: Vec<u32> = result.eligible.iter().map(|i| i.slide_number).collect();
        assert_eq!(slides, vec![2, 4, 5]);
        assert_eq!(result.selected, 3);
    }

    #[test]
    fn test_large_selection_over_large_collection() {
        let items: Vec<WorkItem> = (1..=20_000).map(WorkItem::new).collect();
        // Every other slide, listed in reverse
        let ids: Vec<Uuid> = items.iter().step_by(2).rev().map(|item| item.item_id).collect();

        let selected = select_items(&items, &Selection::Items(ids));

        assert_eq!(selected.len(), 10_000);
        assert_eq!(selected.first().map(|item| item.slide_number), Some(1));
        assert_eq!(selected.last().map(|item| item.slide_number), Some(19_999));
        assert!(selected.windows(2).all(|pair| pair[0].slide_number < pair[1].slide_number));
    }

    #[test]
    fn test_unknown_ids_are_reported_not_processed() {
        let items = collection(2);
        let stray = Uuid::new_v4();
        let selection = Selection::Items(vec![items[0].item_id, stray]);

        let result = filter_eligible(&items, &selection, &HashMap::new(), false);

        assert_eq!(result.eligible.len(), 1);
        assert_eq!(result.unknown, vec![stray]);
    }

    #[test]
    fn test_empty_collection() {
        let result = filter_eligible(&[], &Selection::All, &HashMap::new(), false);
        assert_eq!(result, Eligibility::default());
    }
}
