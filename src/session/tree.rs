//! Folder and feed management.
//!
//! Edits are sent first and applied locally on confirmation, except folder
//! expansion which is applied immediately and persisted afterwards.

use std::sync::Arc;

use super::{FeedChange, FolderChange, Session, SessionError, SessionEvent};
use crate::backend::{BackendError, FeedCreate, FeedCreateOutcome, FeedUpdate, FolderUpdate};
use crate::model::{Folder, Selection};

impl Session {
    // ------------------------------------------------------------------
    // Folders
    // ------------------------------------------------------------------

    pub fn create_folder(&mut self, title: &str) {
        let title = title.trim().to_string();
        if title.is_empty() {
            return;
        }
        let backend = Arc::clone(&self.backend);
        self.spawn(
            "create_folder",
            async move { backend.create_folder(&title).await },
            SessionEvent::FolderCreated,
        );
    }

    pub(super) fn on_folder_created(
        &mut self,
        result: Result<Folder, BackendError>,
    ) -> Result<(), SessionError> {
        let folder = result.map_err(SessionError::rejected("create_folder"))?;
        tracing::info!(folder_id = folder.id, title = %folder.title, "Folder created");
        self.refresh_tree();
        Ok(())
    }

    pub fn rename_folder(&mut self, id: i64, title: &str) {
        let title = title.trim().to_string();
        if title.is_empty() {
            return;
        }
        let update = FolderUpdate {
            title: Some(title.clone()),
            ..FolderUpdate::default()
        };
        self.send_folder_update(id, update, FolderChange::Renamed { id, title });
    }

    /// Flip a folder's expansion. The local tree changes right away.
    pub fn toggle_folder_expanded(&mut self, id: i64) {
        let Some(expanded) = self.store.folder(id).map(|f| !f.is_expanded) else {
            return;
        };
        self.store.set_folder_expanded(id, expanded);
        let update = FolderUpdate {
            is_expanded: Some(expanded),
            ..FolderUpdate::default()
        };
        self.send_folder_update(id, update, FolderChange::Expanded { id, expanded });
    }

    pub fn delete_folder(&mut self, id: i64) {
        let backend = Arc::clone(&self.backend);
        let change = FolderChange::Deleted { id };
        self.spawn(
            "delete_folder",
            async move { backend.delete_folder(id).await },
            move |result| SessionEvent::FolderUpdated { change, result },
        );
    }

    fn send_folder_update(&mut self, id: i64, update: FolderUpdate, change: FolderChange) {
        let backend = Arc::clone(&self.backend);
        self.spawn(
            "update_folder",
            async move { backend.update_folder(id, &update).await },
            move |result| SessionEvent::FolderUpdated { change, result },
        );
    }

    pub(super) fn on_folder_updated(
        &mut self,
        change: FolderChange,
        result: Result<(), BackendError>,
    ) -> Result<(), SessionError> {
        if let Err(e) = result {
            if let FolderChange::Expanded { id, .. } = change {
                tracing::warn!(folder_id = id, error = %e, "Failed to persist folder expansion");
                return Ok(());
            }
            let operation = match change {
                FolderChange::Deleted { .. } => "delete_folder",
                _ => "update_folder",
            };
            return Err(SessionError::rejected(operation)(e));
        }

        match change {
            FolderChange::Renamed { id, title } => {
                self.store.rename_folder(id, &title);
            }
            FolderChange::Expanded { .. } => {}
            FolderChange::Deleted { id } => {
                tracing::info!(folder_id = id, "Folder deleted");
                self.store.remove_folder(id);
                if self.feed_selected == Some(Selection::Folder(id)) {
                    self.select_feed(Some(Selection::AllFeeds));
                }
                self.refresh_stats(false);
                self.refresh_tree();
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Feeds
    // ------------------------------------------------------------------

    /// Subscribe to `url`, optionally inside a folder.
    pub fn create_feed(&mut self, url: &str, folder_id: Option<i64>) {
        let request = FeedCreate {
            url: url.trim().to_string(),
            folder_id,
        };
        let url = request.url.clone();
        let backend = Arc::clone(&self.backend);
        self.spawn(
            "create_feed",
            async move { backend.create_feed(&request).await },
            move |result| SessionEvent::FeedCreated { url, result },
        );
    }

    pub(super) fn on_feed_created(
        &mut self,
        url: String,
        result: Result<FeedCreateOutcome, BackendError>,
    ) -> Result<(), SessionError> {
        match result.map_err(SessionError::rejected("create_feed"))? {
            FeedCreateOutcome::Success { feed } => {
                tracing::info!(feed_id = feed.id, url = %url, "Subscribed");
                self.feed_choices.clear();
                self.refresh_tree();
                self.refresh_stats(false);
                self.select_feed(Some(Selection::Feed(feed.id)));
                Ok(())
            }
            FeedCreateOutcome::Multiple { choice } => {
                tracing::info!(url = %url, candidates = choice.len(), "Several feeds found");
                self.feed_choices = choice;
                Ok(())
            }
            FeedCreateOutcome::NotFound => Err(SessionError::FeedNotFound(url)),
        }
    }

    pub fn rename_feed(&mut self, id: i64, title: &str) {
        let title = title.trim().to_string();
        if title.is_empty() {
            return;
        }
        let update = FeedUpdate {
            title: Some(title.clone()),
            ..FeedUpdate::default()
        };
        self.send_feed_update(id, update, FeedChange::Renamed { id, title });
    }

    pub fn update_feed_link(&mut self, id: i64, feed_link: &str) {
        let feed_link = feed_link.trim().to_string();
        if feed_link.is_empty() {
            return;
        }
        let update = FeedUpdate {
            feed_link: Some(feed_link.clone()),
            ..FeedUpdate::default()
        };
        self.send_feed_update(id, update, FeedChange::LinkChanged { id, feed_link });
    }

    /// Move a feed into `folder_id`, or out of any folder with `None`.
    pub fn move_feed(&mut self, id: i64, folder_id: Option<i64>) {
        let update = FeedUpdate {
            folder_id: Some(folder_id),
            ..FeedUpdate::default()
        };
        self.send_feed_update(id, update, FeedChange::Moved { id, folder_id });
    }

    /// Create a folder and move the feed into it.
    pub fn move_feed_to_new_folder(&mut self, feed_id: i64, title: &str) {
        let title = title.trim().to_string();
        if title.is_empty() {
            return;
        }
        let backend = Arc::clone(&self.backend);
        self.spawn(
            "move_feed_to_new_folder",
            async move {
                let folder = backend.create_folder(&title).await?;
                let update = FeedUpdate {
                    folder_id: Some(Some(folder.id)),
                    ..FeedUpdate::default()
                };
                backend.update_feed(feed_id, &update).await?;
                Ok(folder)
            },
            move |result| SessionEvent::FeedMovedToNewFolder { feed_id, result },
        );
    }

    pub(super) fn on_feed_moved_to_new_folder(
        &mut self,
        feed_id: i64,
        result: Result<Folder, BackendError>,
    ) -> Result<(), SessionError> {
        let folder = result.map_err(SessionError::rejected("move_feed_to_new_folder"))?;
        tracing::info!(feed_id, folder_id = folder.id, "Feed moved to new folder");
        self.refresh_tree();
        self.refresh_stats(false);
        Ok(())
    }

    pub fn delete_feed(&mut self, id: i64) {
        let backend = Arc::clone(&self.backend);
        let change = FeedChange::Deleted { id };
        self.spawn(
            "delete_feed",
            async move { backend.delete_feed(id).await },
            move |result| SessionEvent::FeedUpdated { change, result },
        );
    }

    fn send_feed_update(&mut self, id: i64, update: FeedUpdate, change: FeedChange) {
        let backend = Arc::clone(&self.backend);
        self.spawn(
            "update_feed",
            async move { backend.update_feed(id, &update).await },
            move |result| SessionEvent::FeedUpdated { change, result },
        );
    }

    pub(super) fn on_feed_updated(
        &mut self,
        change: FeedChange,
        result: Result<(), BackendError>,
    ) -> Result<(), SessionError> {
        let operation = match change {
            FeedChange::Deleted { .. } => "delete_feed",
            _ => "update_feed",
        };
        result.map_err(SessionError::rejected(operation))?;

        match change {
            FeedChange::Renamed { id, title } => {
                self.store.rename_feed(id, &title);
            }
            FeedChange::LinkChanged { id, feed_link } => {
                self.store.set_feed_link(id, &feed_link);
            }
            FeedChange::Moved { id, folder_id } => {
                self.store.set_feed_folder(id, folder_id);
                self.recompute_stats();
                self.refresh_stats(false);
            }
            FeedChange::Deleted { id } => {
                tracing::info!(feed_id = id, "Feed deleted");
                let folder_id = self.store.feed(id).and_then(|f| f.folder_id);
                self.store.remove_feed(id);
                let selected = self.feed_selected.is_some_and(|s| match s {
                    Selection::Feed(feed_id) => feed_id == id,
                    Selection::Folder(folder) => Some(folder) == folder_id,
                    Selection::AllFeeds => false,
                });
                if selected {
                    self.select_feed(None);
                } else if self
                    .item_selected
                    .is_some_and(|item_id| self.store.item(item_id).is_none())
                {
                    self.clear_item_selection();
                }
                self.refresh_stats(false);
                self.refresh_tree();
            }
        }
        Ok(())
    }
}
