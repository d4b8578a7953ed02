//! Counter aggregation under the active status filter.

use std::collections::HashMap;

use crate::model::{Feed, FeedStat, ItemStatus, StatusFilter};

pub type FeedStats = HashMap<i64, FeedStat>;

/// Counters for one status, rolled up per feed, per folder and overall.
///
/// `folders` is keyed by `folder_id`; `None` is the no-folder group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredStats {
    pub status: Option<ItemStatus>,
    pub feeds: HashMap<i64, i64>,
    pub folders: HashMap<Option<i64>, i64>,
    pub total: i64,
}

impl FilteredStats {
    pub fn feed(&self, feed_id: i64) -> Option<i64> {
        self.feeds.get(&feed_id).copied()
    }

    pub fn folder(&self, folder_id: Option<i64>) -> Option<i64> {
        self.folders.get(&folder_id).copied()
    }
}

/// Roll `stats` up for `filter`. Returns `None` when no filter is active.
///
/// Feeds without an entry in `stats` are skipped rather than counted as
/// zero, so a folder only gets an accumulator once one of its feeds has
/// stats.
pub fn compute(feeds: &[Feed], stats: &FeedStats, filter: StatusFilter) -> Option<FilteredStats> {
    let status = filter.status()?;
    let mut out = FilteredStats {
        status: Some(status),
        ..FilteredStats::default()
    };

    for feed in feeds {
        let Some(stat) = stats.get(&feed.id) else {
            continue;
        };
        let n = stat.count(status);
        out.feeds.insert(feed.id, n);
        *out.folders.entry(feed.folder_id).or_insert(0) += n;
        out.total += n;
    }
    Some(out)
}

/// Unread count across every feed with stats, independent of the filter.
pub fn total_unread(stats: &FeedStats) -> i64 {
    stats.values().map(|s| s.unread).sum()
}

pub fn window_title(app_name: &str, stats: &FeedStats) -> String {
    match total_unread(stats) {
        0 => app_name.to_string(),
        n => format!("{} ({})", app_name, n),
    }
}
