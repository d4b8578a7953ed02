//! Relative keyboard moves over the feed tree and the item list.

use crate::model::{Item, Selection};
use crate::store::EntityStore;

/// Outcome of a relative move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<T> {
    /// Move to this entry.
    Select(T),
    /// Keep the current selection (zero delta or past either end).
    Stay,
    /// The current entry was not found; reset to this one.
    Fallback(T),
}

impl<T> Step<T> {
    /// The entry to select, if the selection changes.
    pub fn target(self) -> Option<T> {
        match self {
            Self::Select(t) | Self::Fallback(t) => Some(t),
            Self::Stay => None,
        }
    }
}

/// Visible feed-list keys in display order.
///
/// `AllFeeds` first, then each folder followed by its feeds when it is
/// expanded. Feeds outside any folder are always listed, with no key for
/// the group itself.
pub fn feed_order(store: &EntityStore) -> Vec<Selection> {
    let mut order = vec![Selection::AllFeeds];
    for group in store.folders_with_feeds() {
        match group.folder {
            Some(folder) => {
                order.push(Selection::Folder(folder.id));
                if folder.is_expanded {
                    order.extend(group.feeds.iter().map(|f| Selection::Feed(f.id)));
                }
            }
            None => order.extend(group.feeds.iter().map(|f| Selection::Feed(f.id))),
        }
    }
    order
}

fn offset(position: usize, delta: isize, len: usize) -> Option<usize> {
    let target = position.checked_add_signed(delta)?;
    (target < len).then_some(target)
}

/// Move `delta` entries from `current` in `order`.
pub fn move_feed(order: &[Selection], current: Option<Selection>, delta: isize) -> Step<Selection> {
    let Some(position) = current.and_then(|c| order.iter().position(|k| *k == c)) else {
        return Step::Fallback(Selection::AllFeeds);
    };
    if delta == 0 {
        return Step::Stay;
    }
    match offset(position, delta, order.len()) {
        Some(target) => Step::Select(order[target]),
        None => Step::Stay,
    }
}

/// Move `delta` items from `current` in the loaded list.
///
/// From no selection, or from an item that is no longer loaded, the first
/// item is selected. An empty list never moves.
pub fn move_item(items: &[Item], current: Option<i64>, delta: isize) -> Step<i64> {
    let Some(first) = items.first().map(|i| i.id) else {
        return Step::Stay;
    };
    let Some(current) = current else {
        return Step::Select(first);
    };
    let Some(position) = items.iter().position(|i| i.id == current) else {
        return Step::Fallback(first);
    };
    if delta == 0 {
        return Step::Stay;
    }
    match offset(position, delta, items.len()) {
        Some(target) => Step::Select(items[target].id),
        None => Step::Stay,
    }
}
