//! Item list loading, selection, navigation and status changes.

use std::sync::Arc;

use super::{Session, SessionError, SessionEvent};
use crate::backend::{BackendError, ItemPage, ItemQuery};
use crate::debounce::SettingChange;
use crate::model::{Item, ItemStatus, Selection, StatusFilter};
use crate::mutation::{self, StatusChange, StatusToggle};
use crate::navigation::{self, Step};
use crate::pagination::{PageRequest, ScrollMetrics};

impl Session {
    // ------------------------------------------------------------------
    // Query building
    // ------------------------------------------------------------------

    /// Query for the current selection, filter, search and sort order.
    /// `None` when nothing is selected.
    pub fn item_query(&self) -> Option<ItemQuery> {
        let mut query = ItemQuery {
            status: self.filter.status(),
            oldest_first: !self.sort_newest_first,
            ..ItemQuery::default()
        };
        match self.feed_selected? {
            Selection::AllFeeds => {}
            Selection::Feed(id) => query.feed_id = Some(id),
            Selection::Folder(id) => query.folder_id = Some(id),
        }
        if !self.search_applied.is_empty() {
            query.search = Some(self.search_applied.clone());
        }
        Some(query)
    }

    fn spawn_list(&mut self, generation: u64, request: PageRequest) {
        let Some(mut query) = self.item_query() else {
            return;
        };
        match request {
            PageRequest::First => {}
            PageRequest::After(id) => query.after = Some(id),
            PageRequest::Page(n) => query.page = Some(n),
        }
        let append = request != PageRequest::First;
        tracing::debug!(generation, ?request, "Fetching items");

        let backend = Arc::clone(&self.backend);
        self.spawn(
            "list_items",
            async move { backend.list_items(&query).await },
            move |result| SessionEvent::ItemsLoaded {
                generation,
                append,
                result,
            },
        );
    }

    // ------------------------------------------------------------------
    // List lifecycle
    // ------------------------------------------------------------------

    /// Clear the list and fetch the first page for the current query.
    ///
    /// Any fetch still in flight becomes stale. With nothing selected the
    /// list just stays empty.
    pub(super) fn reset_list(&mut self) {
        self.pagination.reset();
        self.store.clear_items();
        self.last_scroll = None;
        if self.feed_selected.is_some() {
            let (generation, request) = self.pagination.begin_refresh();
            self.spawn_list(generation, request);
        }
    }

    /// Refetch the first page, keeping the current items until it arrives.
    pub fn refresh_items(&mut self) {
        if self.feed_selected.is_none() {
            self.pagination.reset();
            self.store.clear_items();
            return;
        }
        let (generation, request) = self.pagination.begin_refresh();
        self.spawn_list(generation, request);
    }

    /// Fetch the next page if one exists and nothing is in flight.
    pub fn load_more_items(&mut self) {
        if self.feed_selected.is_none() {
            return;
        }
        if let Some((generation, request)) =
            self.pagination.begin_load_more(self.store.last_item_id())
        {
            self.spawn_list(generation, request);
        }
    }

    /// Record the list viewport and load more if it is near the bottom.
    pub fn report_scroll(&mut self, metrics: ScrollMetrics) {
        self.last_scroll = Some(metrics);
        self.maybe_load_more();
    }

    fn maybe_load_more(&mut self) {
        if self.pagination.should_load_more(
            self.last_scroll.as_ref(),
            self.theme.size,
            self.item_selected,
            self.store.last_item_id(),
        ) {
            self.load_more_items();
        }
    }

    pub(super) fn on_items_loaded(
        &mut self,
        generation: u64,
        append: bool,
        result: Result<ItemPage, BackendError>,
    ) -> Result<(), SessionError> {
        if !self.pagination.finish(generation) {
            tracing::debug!(
                generation,
                current = self.pagination.generation(),
                "Discarding stale item page"
            );
            return Ok(());
        }
        let page = result.map_err(SessionError::rejected("list_items"))?;

        self.pagination.apply(&page);
        let received = page.list.len();
        if append {
            self.store.append_items(page.list);
        } else {
            self.store.replace_items(page.list);
        }
        tracing::debug!(
            generation,
            received,
            total = self.store.items().len(),
            has_more = self.pagination.has_more(),
            "Items loaded"
        );

        let unknown = self.store.unknown_item_feeds();
        if !unknown.is_empty() && !self.tree_loading {
            tracing::info!(feeds = ?unknown, "Items reference unknown feeds, reloading tree");
            self.refresh_tree();
        }

        // Scroll metrics describe the list before this page; wait for fresh ones.
        self.last_scroll = None;
        self.maybe_load_more();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Selection, filter, search, sort
    // ------------------------------------------------------------------

    /// Select a feed, a folder, all feeds, or nothing.
    pub fn select_feed(&mut self, selection: Option<Selection>) {
        if selection == self.feed_selected {
            return;
        }
        tracing::debug!(?selection, "Feed selection changed");
        self.feed_selected = selection;
        self.clear_item_selection();
        self.observe_setting(SettingChange::Feed(selection));
        self.reset_list();
    }

    pub fn set_filter(&mut self, filter: StatusFilter) {
        if filter == self.filter {
            return;
        }
        self.filter = filter;
        self.clear_item_selection();
        self.recompute_stats();
        self.observe_setting(SettingChange::Filter(filter));
        self.reset_list();
    }

    pub fn set_sort_newest_first(&mut self, newest_first: bool) {
        if newest_first == self.sort_newest_first {
            return;
        }
        self.sort_newest_first = newest_first;
        self.observe_setting(SettingChange::SortNewestFirst(newest_first));
        self.reset_list();
    }

    /// Update the search text. The list is refetched once typing pauses.
    pub fn set_search(&mut self, text: impl Into<String>) {
        let now = tokio::time::Instant::now();
        self.search_input.observe(text.into(), now);
    }

    pub(super) fn clear_item_selection(&mut self) {
        self.item_selected = None;
        self.item_details = None;
    }

    /// Select an item (or nothing) and fetch its full form.
    pub fn select_item(&mut self, item_id: Option<i64>) {
        if item_id == self.item_selected {
            return;
        }
        self.item_selected = item_id;
        self.item_details = None;

        if let Some(id) = item_id {
            let backend = Arc::clone(&self.backend);
            self.spawn(
                "get_item",
                async move { backend.get_item(id).await },
                move |result| SessionEvent::ItemDetailsLoaded {
                    item_id: id,
                    result,
                },
            );
        }
    }

    pub(super) fn on_item_details_loaded(
        &mut self,
        item_id: i64,
        result: Result<Item, BackendError>,
    ) -> Result<(), SessionError> {
        if self.item_selected != Some(item_id) {
            tracing::debug!(item_id, "Discarding details for deselected item");
            return Ok(());
        }
        let item = result.map_err(SessionError::rejected("get_item"))?;

        if item.status == ItemStatus::Unread {
            self.submit_status_change(StatusChange::mark_read(&item));
        }
        self.item_details = Some(item);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Move the item selection by `delta` and prefetch when the last
    /// loaded item becomes selected.
    pub fn navigate_item(&mut self, delta: isize) {
        let step = navigation::move_item(self.store.items(), self.item_selected, delta);
        if let Step::Fallback(id) = step {
            tracing::debug!(selected = ?self.item_selected, fallback = id, "Selected item not loaded");
        }
        if let Some(id) = step.target() {
            self.select_item(Some(id));
        }
        self.maybe_load_more();
    }

    /// Move the feed selection by `delta` over the visible tree.
    pub fn navigate_feed(&mut self, delta: isize) {
        let order = navigation::feed_order(&self.store);
        if let Some(selection) = navigation::move_feed(&order, self.feed_selected, delta).target() {
            self.select_feed(Some(selection));
        }
    }

    /// Visible feed-list keys in display order.
    pub fn feed_order(&self) -> Vec<Selection> {
        navigation::feed_order(&self.store)
    }

    // ------------------------------------------------------------------
    // Status changes
    // ------------------------------------------------------------------

    pub fn toggle_item_starred(&mut self, item_id: i64) -> bool {
        self.toggle_item_status(item_id, StatusToggle::STAR)
    }

    pub fn toggle_item_read(&mut self, item_id: i64) -> bool {
        self.toggle_item_status(item_id, StatusToggle::READ)
    }

    /// Returns whether an update was sent.
    fn toggle_item_status(&mut self, item_id: i64, toggle: StatusToggle) -> bool {
        let item = self
            .item_details
            .as_ref()
            .filter(|d| d.id == item_id)
            .or_else(|| self.store.item(item_id));
        let Some(item) = item else {
            tracing::debug!(item_id, "Toggle for unknown item ignored");
            return false;
        };
        let change = StatusChange::toggle(item, toggle);
        self.submit_status_change(change)
    }

    fn submit_status_change(&mut self, change: StatusChange) -> bool {
        if !self.pending_updates.claim(change.item_id) {
            tracing::debug!(item_id = change.item_id, "Status update already pending");
            return false;
        }
        let backend = Arc::clone(&self.backend);
        self.spawn(
            "update_item",
            async move { backend.update_item(change.item_id, change.new).await },
            move |result| SessionEvent::StatusUpdated { change, result },
        );
        true
    }

    pub(super) fn on_status_updated(
        &mut self,
        change: StatusChange,
        result: Result<(), BackendError>,
    ) -> Result<(), SessionError> {
        self.pending_updates.release(change.item_id);
        result.map_err(SessionError::rejected("update_item"))?;

        mutation::apply_confirmed(
            &change,
            &mut self.store,
            &mut self.feed_stats,
            self.item_details.as_mut(),
        );
        self.recompute_stats();
        tracing::debug!(item_id = change.item_id, old = %change.old, new = %change.new, "Status updated");
        Ok(())
    }

    /// Mark everything matching the current query as read.
    pub fn mark_items_read(&mut self) {
        let Some(query) = self.item_query() else {
            return;
        };
        let backend = Arc::clone(&self.backend);
        self.spawn(
            "mark_read",
            async move { backend.mark_read(&query).await },
            SessionEvent::ItemsMarkedRead,
        );
    }

    pub(super) fn on_items_marked_read(
        &mut self,
        result: Result<(), BackendError>,
    ) -> Result<(), SessionError> {
        result.map_err(SessionError::rejected("mark_read"))?;
        self.pagination.reset();
        self.store.clear_items();
        self.clear_item_selection();
        self.refresh_stats(false);
        Ok(())
    }
}
