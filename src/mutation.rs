//! Confirmed-apply item status transitions.
//!
//! A transition is computed locally, sent to the server, and only applied
//! once the server confirms it. The status and the feed counters always
//! move together.

use std::collections::HashSet;

use crate::model::{Item, ItemStatus};
use crate::stats::FeedStats;
use crate::store::EntityStore;

/// Two-state toggle over the three item statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusToggle {
    pub target: ItemStatus,
    pub fallback: ItemStatus,
}

impl StatusToggle {
    pub const STAR: Self = Self {
        target: ItemStatus::Starred,
        fallback: ItemStatus::Read,
    };

    pub const READ: Self = Self {
        target: ItemStatus::Unread,
        fallback: ItemStatus::Read,
    };

    pub fn next(self, current: ItemStatus) -> ItemStatus {
        if current != self.target {
            self.target
        } else {
            self.fallback
        }
    }
}

/// A status transition awaiting (or having received) confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub item_id: i64,
    pub feed_id: i64,
    pub old: ItemStatus,
    pub new: ItemStatus,
}

impl StatusChange {
    pub fn toggle(item: &Item, toggle: StatusToggle) -> Self {
        Self {
            item_id: item.id,
            feed_id: item.feed_id,
            old: item.status,
            new: toggle.next(item.status),
        }
    }

    pub fn mark_read(item: &Item) -> Self {
        Self {
            item_id: item.id,
            feed_id: item.feed_id,
            old: item.status,
            new: ItemStatus::Read,
        }
    }
}

/// Item ids with a status update on the wire.
#[derive(Debug, Default)]
pub struct PendingUpdates(HashSet<i64>);

impl PendingUpdates {
    /// Claim `item_id`; false if an update is already pending for it.
    pub fn claim(&mut self, item_id: i64) -> bool {
        self.0.insert(item_id)
    }

    pub fn release(&mut self, item_id: i64) {
        self.0.remove(&item_id);
    }
}

/// Apply a confirmed change to the counters, the loaded list and the
/// detail copy.
///
/// Counters never go below zero; an underflow is clamped and logged. A feed
/// without stats keeps having none.
pub fn apply_confirmed(
    change: &StatusChange,
    store: &mut EntityStore,
    stats: &mut FeedStats,
    detail: Option<&mut Item>,
) {
    if change.old != change.new {
        if let Some(stat) = stats.get_mut(&change.feed_id) {
            if let Some(count) = stat.count_mut(change.old) {
                if *count == 0 {
                    tracing::warn!(
                        feed_id = change.feed_id,
                        status = %change.old,
                        "Counter already at zero, not decrementing"
                    );
                } else {
                    *count -= 1;
                }
            }
            if let Some(count) = stat.count_mut(change.new) {
                *count += 1;
            }
        } else {
            tracing::debug!(feed_id = change.feed_id, "No stats for feed, counters untouched");
        }
    }

    store.set_item_status(change.item_id, change.new);
    if let Some(item) = detail.filter(|d| d.id == change.item_id) {
        item.status = change.new;
    }
}
