//! Canonical in-memory collections of folders, feeds and items.
//!
//! Sequences are the source of truth. The `*_by_id` lookups are derived
//! views rebuilt by every mutator that touches the matching sequence.

use std::collections::{HashMap, HashSet};

use crate::model::{Feed, Folder, Item, ItemStatus};

/// Feeds sharing one `folder_id`. `folder_id = None` is the virtual
/// "no folder" group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderGroup<'a> {
    pub folder_id: Option<i64>,
    pub folder: Option<&'a Folder>,
    pub feeds: Vec<&'a Feed>,
}

#[derive(Debug, Default)]
pub struct EntityStore {
    folders: Vec<Folder>,
    feeds: Vec<Feed>,
    items: Vec<Item>,
    folder_index: HashMap<i64, usize>,
    feed_index: HashMap<i64, usize>,
    item_index: HashMap<i64, usize>,
}

fn index_by<T>(entries: &[T], id: impl Fn(&T) -> i64) -> HashMap<i64, usize> {
    entries
        .iter()
        .enumerate()
        .map(|(pos, entry)| (id(entry), pos))
        .collect()
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Sequences and lookups
    // ------------------------------------------------------------------

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn feeds(&self) -> &[Feed] {
        &self.feeds
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn folder(&self, id: i64) -> Option<&Folder> {
        self.folder_index.get(&id).map(|&pos| &self.folders[pos])
    }

    pub fn feed(&self, id: i64) -> Option<&Feed> {
        self.feed_index.get(&id).map(|&pos| &self.feeds[pos])
    }

    pub fn item(&self, id: i64) -> Option<&Item> {
        self.item_index.get(&id).map(|&pos| &self.items[pos])
    }

    pub fn folders_by_id(&self) -> HashMap<i64, &Folder> {
        self.folders.iter().map(|f| (f.id, f)).collect()
    }

    pub fn feeds_by_id(&self) -> HashMap<i64, &Feed> {
        self.feeds.iter().map(|f| (f.id, f)).collect()
    }

    pub fn items_by_id(&self) -> HashMap<i64, &Item> {
        self.items.iter().map(|i| (i.id, i)).collect()
    }

    /// Position of an item in the loaded list.
    pub fn item_position(&self, id: i64) -> Option<usize> {
        self.item_index.get(&id).copied()
    }

    pub fn last_item_id(&self) -> Option<i64> {
        self.items.last().map(|i| i.id)
    }

    /// Groups feeds by folder in folder order, then the no-folder group.
    ///
    /// Feeds keep store order inside each group. Folders with no feeds
    /// still get a group; the no-folder group only appears when non-empty.
    /// Feeds pointing at an unknown folder land in the no-folder group.
    pub fn folders_with_feeds(&self) -> Vec<FolderGroup<'_>> {
        let mut groups: Vec<FolderGroup<'_>> = self
            .folders
            .iter()
            .map(|folder| FolderGroup {
                folder_id: Some(folder.id),
                folder: Some(folder),
                feeds: Vec::new(),
            })
            .collect();
        let mut orphans = Vec::new();

        for feed in &self.feeds {
            match feed.folder_id.and_then(|id| self.folder_index.get(&id)) {
                Some(&pos) => groups[pos].feeds.push(feed),
                None => orphans.push(feed),
            }
        }

        if !orphans.is_empty() {
            groups.push(FolderGroup {
                folder_id: None,
                folder: None,
                feeds: orphans,
            });
        }
        groups
    }

    /// Feed ids inside one folder, in store order.
    pub fn feed_ids_in_folder(&self, folder_id: i64) -> Vec<i64> {
        self.feeds
            .iter()
            .filter(|f| f.folder_id == Some(folder_id))
            .map(|f| f.id)
            .collect()
    }

    /// Feed ids referenced by loaded items but absent from the feed list.
    pub fn unknown_item_feeds(&self) -> HashSet<i64> {
        self.items
            .iter()
            .map(|i| i.feed_id)
            .filter(|id| !self.feed_index.contains_key(id))
            .collect()
    }

    // ------------------------------------------------------------------
    // Tree mutators
    // ------------------------------------------------------------------

    /// Replace folders and feeds together.
    pub fn replace_tree(&mut self, folders: Vec<Folder>, feeds: Vec<Feed>) {
        self.folders = folders;
        self.feeds = feeds;
        self.reindex_folders();
        self.reindex_feeds();
    }

    /// Rename and re-sort folders by title.
    pub fn rename_folder(&mut self, id: i64, title: &str) -> bool {
        let Some(&pos) = self.folder_index.get(&id) else {
            return false;
        };
        self.folders[pos].title = title.to_string();
        self.folders
            .sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        self.reindex_folders();
        true
    }

    pub fn set_folder_expanded(&mut self, id: i64, expanded: bool) -> bool {
        match self.folder_index.get(&id) {
            Some(&pos) => {
                self.folders[pos].is_expanded = expanded;
                true
            }
            None => false,
        }
    }

    /// Remove a folder; its feeds move to the no-folder group.
    pub fn remove_folder(&mut self, id: i64) -> bool {
        let before = self.folders.len();
        self.folders.retain(|f| f.id != id);
        if self.folders.len() == before {
            return false;
        }
        for feed in self.feeds.iter_mut().filter(|f| f.folder_id == Some(id)) {
            feed.folder_id = None;
        }
        self.reindex_folders();
        true
    }

    pub fn rename_feed(&mut self, id: i64, title: &str) -> bool {
        self.feed_mut(id).map(|f| f.title = title.to_string()).is_some()
    }

    pub fn set_feed_link(&mut self, id: i64, feed_link: &str) -> bool {
        self.feed_mut(id)
            .map(|f| f.feed_link = feed_link.to_string())
            .is_some()
    }

    pub fn set_feed_folder(&mut self, id: i64, folder_id: Option<i64>) -> bool {
        self.feed_mut(id).map(|f| f.folder_id = folder_id).is_some()
    }

    /// Remove a feed and every loaded item belonging to it.
    pub fn remove_feed(&mut self, id: i64) -> bool {
        let before = self.feeds.len();
        self.feeds.retain(|f| f.id != id);
        if self.feeds.len() == before {
            return false;
        }
        self.reindex_feeds();
        let items_before = self.items.len();
        self.items.retain(|i| i.feed_id != id);
        if self.items.len() != items_before {
            self.reindex_items();
        }
        true
    }

    // ------------------------------------------------------------------
    // Item mutators
    // ------------------------------------------------------------------

    pub fn replace_items(&mut self, items: Vec<Item>) {
        self.items = items;
        self.reindex_items();
    }

    /// Append a page. Items already loaded (same id) are skipped so a page
    /// boundary shifted by new arrivals cannot duplicate entries.
    ///
    /// Returns the number of items actually appended.
    pub fn append_items(&mut self, items: Vec<Item>) -> usize {
        let before = self.items.len();
        for item in items {
            if self.item_index.contains_key(&item.id) {
                tracing::debug!(item_id = item.id, "Skipping duplicate item in page");
                continue;
            }
            self.item_index.insert(item.id, self.items.len());
            self.items.push(item);
        }
        self.items.len() - before
    }

    pub fn clear_items(&mut self) {
        self.items.clear();
        self.item_index.clear();
    }

    /// Returns the previous status if the item is loaded.
    pub fn set_item_status(&mut self, id: i64, status: ItemStatus) -> Option<ItemStatus> {
        let pos = *self.item_index.get(&id)?;
        Some(std::mem::replace(&mut self.items[pos].status, status))
    }

    // ------------------------------------------------------------------
    // Index maintenance
    // ------------------------------------------------------------------

    fn feed_mut(&mut self, id: i64) -> Option<&mut Feed> {
        let pos = *self.feed_index.get(&id)?;
        self.feeds.get_mut(pos)
    }

    fn reindex_folders(&mut self) {
        self.folder_index = index_by(&self.folders, |f| f.id);
    }

    fn reindex_feeds(&mut self) {
        self.feed_index = index_by(&self.feeds, |f| f.id);
    }

    fn reindex_items(&mut self) {
        self.item_index = index_by(&self.items, |i| i.id);
    }
}
