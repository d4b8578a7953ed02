//! Background task results and their dispatch.

use std::collections::HashMap;

use super::{Session, SessionError};
use crate::backend::{BackendError, FeedCreateOutcome, ItemPage, ServerStatus};
use crate::model::{Feed, Folder, Item};
use crate::mutation::StatusChange;

/// A folder edit awaiting server confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderChange {
    Renamed { id: i64, title: String },
    /// Already applied locally; the server only persists it.
    Expanded { id: i64, expanded: bool },
    Deleted { id: i64 },
}

/// A feed edit awaiting server confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedChange {
    Renamed { id: i64, title: String },
    LinkChanged { id: i64, feed_link: String },
    Moved { id: i64, folder_id: Option<i64> },
    Deleted { id: i64 },
}

/// Result of one background task.
#[derive(Debug)]
pub enum SessionEvent {
    /// Status poll. `loop_mode` is set for polls scheduled by a previous
    /// poll that saw a refresh running.
    StatusLoaded {
        loop_mode: bool,
        result: Result<ServerStatus, BackendError>,
    },
    /// Folders and feeds, fetched together.
    TreeLoaded(Result<(Vec<Folder>, Vec<Feed>), BackendError>),
    /// One page of the item list.
    ///
    /// Fields:
    /// - `generation`: list generation the fetch was issued for
    /// - `append`: whether the page extends the list or replaces it
    ItemsLoaded {
        generation: u64,
        append: bool,
        result: Result<ItemPage, BackendError>,
    },
    ItemDetailsLoaded {
        item_id: i64,
        result: Result<Item, BackendError>,
    },
    StatusUpdated {
        change: StatusChange,
        result: Result<(), BackendError>,
    },
    ItemsMarkedRead(Result<(), BackendError>),
    FeedErrorsLoaded(Result<HashMap<i64, String>, BackendError>),
    SettingsSaved(Result<(), BackendError>),
    FolderCreated(Result<Folder, BackendError>),
    FolderUpdated {
        change: FolderChange,
        result: Result<(), BackendError>,
    },
    FeedCreated {
        url: String,
        result: Result<FeedCreateOutcome, BackendError>,
    },
    FeedUpdated {
        change: FeedChange,
        result: Result<(), BackendError>,
    },
    /// A new folder was created and the feed moved into it.
    FeedMovedToNewFolder {
        feed_id: i64,
        result: Result<Folder, BackendError>,
    },
    FeedsRefreshStarted(Result<(), BackendError>),
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StatusLoaded { .. } => "StatusLoaded",
            Self::TreeLoaded(_) => "TreeLoaded",
            Self::ItemsLoaded { .. } => "ItemsLoaded",
            Self::ItemDetailsLoaded { .. } => "ItemDetailsLoaded",
            Self::StatusUpdated { .. } => "StatusUpdated",
            Self::ItemsMarkedRead(_) => "ItemsMarkedRead",
            Self::FeedErrorsLoaded(_) => "FeedErrorsLoaded",
            Self::SettingsSaved(_) => "SettingsSaved",
            Self::FolderCreated(_) => "FolderCreated",
            Self::FolderUpdated { .. } => "FolderUpdated",
            Self::FeedCreated { .. } => "FeedCreated",
            Self::FeedUpdated { .. } => "FeedUpdated",
            Self::FeedMovedToNewFolder { .. } => "FeedMovedToNewFolder",
            Self::FeedsRefreshStarted(_) => "FeedsRefreshStarted",
        }
    }
}

impl Session {
    /// Apply one task result to the session.
    ///
    /// Stale results are dropped silently. A failed server call is returned
    /// as [`SessionError::Rejected`] after any guard it held is released.
    pub fn handle_event(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        self.pending_tasks = self.pending_tasks.saturating_sub(1);
        tracing::trace!(event = event.name(), pending = self.pending_tasks, "Handling event");

        match event {
            SessionEvent::StatusLoaded { loop_mode, result } => {
                self.on_status_loaded(loop_mode, result)
            }
            SessionEvent::TreeLoaded(result) => self.on_tree_loaded(result),
            SessionEvent::ItemsLoaded {
                generation,
                append,
                result,
            } => self.on_items_loaded(generation, append, result),
            SessionEvent::ItemDetailsLoaded { item_id, result } => {
                self.on_item_details_loaded(item_id, result)
            }
            SessionEvent::StatusUpdated { change, result } => self.on_status_updated(change, result),
            SessionEvent::ItemsMarkedRead(result) => self.on_items_marked_read(result),
            SessionEvent::FeedErrorsLoaded(result) => {
                match result {
                    Ok(errors) => self.feed_errors = errors,
                    Err(e) => tracing::warn!(error = %e, "Failed to load feed errors"),
                }
                Ok(())
            }
            SessionEvent::SettingsSaved(result) => {
                result.map_err(SessionError::rejected("update_settings"))
            }
            SessionEvent::FolderCreated(result) => self.on_folder_created(result),
            SessionEvent::FolderUpdated { change, result } => self.on_folder_updated(change, result),
            SessionEvent::FeedCreated { url, result } => self.on_feed_created(url, result),
            SessionEvent::FeedUpdated { change, result } => self.on_feed_updated(change, result),
            SessionEvent::FeedMovedToNewFolder { feed_id, result } => {
                self.on_feed_moved_to_new_folder(feed_id, result)
            }
            SessionEvent::FeedsRefreshStarted(result) => self.on_feeds_refresh_started(result),
        }
    }
}
