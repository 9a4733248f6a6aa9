//! # Result Aggregator
//!
//! Collects item outcomes into the terminal [`BatchSummary`]. Outcomes are
//! reported in work-list order regardless of arrival order, which makes
//! [`summarize`] a pure function of its inputs.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::warn;
use uuid::Uuid;

use crate::models::{BatchSummary, ItemOutcome, WorkItem};
use crate::state_machine::BatchState;

/// Fixed facts about a batch needed to build its summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryContext {
    pub batch_id: Uuid,
    pub target_id: Uuid,
    pub total_selected: usize,
    /// Eligible item ids in work-list order
    pub work_order: Vec<Uuid>,
    pub started_at: DateTime<Utc>,
}

impl SummaryContext {
    pub fn new(
        batch_id: Uuid,
        target_id: Uuid,
        total_selected: usize,
        eligible: &[WorkItem],
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            batch_id,
            target_id,
            total_selected,
            work_order: eligible.iter().map(|item| item.item_id).collect(),
            started_at,
        }
    }
}

/// Build a summary from a set of outcomes.
///
/// Running this twice over the same inputs yields the same summary.
pub fn summarize(
    context: &SummaryContext,
    outcomes: &[ItemOutcome],
    state: BatchState,
    not_completed: &[Uuid],
    ended_at: DateTime<Utc>,
) -> BatchSummary {
    let position: HashMap<Uuid, usize> = context
        .work_order
        .iter()
        .enumerate()
        .map(|(index, id)| (*id, index))
        .collect();

    let mut ordered = outcomes.to_vec();
    ordered.sort_by_key(|outcome| {
        position
            .get(&outcome.item_id)
            .copied()
            .unwrap_or(usize::MAX)
    });

    let initiated = ordered.iter().filter(|o| o.initiated).count();
    let failed = ordered.len() - initiated;
    let eligible_items = context.work_order.len();

    BatchSummary {
        batch_id: context.batch_id,
        target_id: context.target_id,
        state,
        total_items: context.total_selected,
        eligible_items,
        initiated,
        failed,
        skipped: context.total_selected.saturating_sub(eligible_items),
        not_completed: not_completed.to_vec(),
        started_at: context.started_at,
        ended_at,
        outcomes: ordered,
    }
}

/// Mutable accumulator owned by the scheduler while a batch runs
#[derive(Debug)]
pub struct ResultAggregator {
    context: SummaryContext,
    outcomes: Vec<ItemOutcome>,
    seen: HashSet<Uuid>,
}

impl ResultAggregator {
    pub fn new(context: SummaryContext) -> Self {
        let capacity = context.work_order.len();
        Self {
            context,
            outcomes: Vec::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    pub fn context(&self) -> &SummaryContext {
        &self.context
    }

    /// Record an outcome. A second outcome for the same item is ignored.
    pub fn record(&mut self, outcome: ItemOutcome) -> bool {
        if !self.seen.insert(outcome.item_id) {
            warn!(
                batch_id = %self.context.batch_id,
                item_id = %outcome.item_id,
                "Ignoring duplicate outcome"
            );
            return false;
        }
        self.outcomes.push(outcome);
        true
    }

    pub fn has_outcome(&self, item_id: &Uuid) -> bool {
        self.seen.contains(item_id)
    }

    /// Outcomes in arrival order
    pub fn outcomes(&self) -> &[ItemOutcome] {
        &self.outcomes
    }

    /// Eligible items without an outcome, in work-list order
    pub fn pending(&self) -> Vec<Uuid> {
        self.context
            .work_order
            .iter()
            .filter(|id| !self.seen.contains(id))
            .copied()
            .collect()
    }

    /// Freeze the batch into its terminal summary
    pub fn finalize(self, state: BatchState, ended_at: DateTime<Utc>) -> BatchSummary {
        let not_completed = if matches!(state, BatchState::TimedOut | BatchState::Aborted) {
            self.pending()
        } else {
            Vec::new()
        };
        summarize(&self.context, &self.outcomes, state, &not_completed, ended_at)
    }

    /// Summary for a batch with nothing to do: zero counts, start == end
    pub fn empty_summary(context: &SummaryContext) -> BatchSummary {
        summarize(
            context,
            &[],
            BatchState::Completed,
            &[],
            context.started_at,
        )
    }
}
