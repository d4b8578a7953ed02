//! Session: the single owner of all client-side state.
//!
//! Every user operation is a synchronous method that updates local state
//! and, where the server is involved, spawns a background task. Each task
//! sends exactly one [`SessionEvent`] back over the session's channel;
//! results only touch state once the owner passes them to
//! [`Session::handle_event`] (directly, or through [`Session::settle`]).
//!
//! - [`events`] - event enum and dispatch
//! - [`tasks`] - task spawning with panic capture
//! - [`refresh`] - startup, status polling, tree reloads
//! - [`items`] - selection, list loading, navigation, status changes
//! - [`tree`] - folder and feed management
//! - [`prefs`] - theme, layout and other persisted preferences
//! - [`actions`] - keyboard action dispatch

mod actions;
mod events;
mod items;
mod prefs;
mod refresh;
mod tasks;
mod tree;


pub use actions::Dispatch;
pub use events::{FeedChange, FolderChange, SessionEvent};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::backend::{Backend, BackendError, FeedChoice};
use crate::config::Config;
use crate::debounce::{Debounced, SettingsDebouncer};
use crate::model::{Feed, Folder, Item, Selection, StatusFilter, ThemeSettings};
use crate::mutation::PendingUpdates;
use crate::pagination::{ListingMode, Pagination, ScrollMetrics};
use crate::stats::{self, FeedStats, FilteredStats};
use crate::store::EntityStore;

/// Shown in the window title.
pub const APP_NAME: &str = "rill";

/// Capacity of the task → session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum SessionError {
    /// A server call failed; local state was left as it was.
    #[error("{operation} failed: {source}")]
    Rejected {
        operation: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("No feeds found at {0}")]
    FeedNotFound(String),
}

impl SessionError {
    pub(crate) fn rejected(operation: &'static str) -> impl FnOnce(BackendError) -> Self {
        move |source| Self::Rejected { operation, source }
    }
}

// ============================================================================
// Options
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub listing_mode: ListingMode,
    pub near_bottom_px: f64,
    pub poll_interval: Duration,
    pub search_debounce: Duration,
    pub layout_debounce: Duration,
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            listing_mode: config.listing_mode,
            near_bottom_px: config.near_bottom_px,
            poll_interval: config.poll_interval(),
            search_debounce: config.search_debounce(),
            layout_debounce: config.layout_debounce(),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

// ============================================================================
// Session
// ============================================================================

pub struct Session {
    backend: Arc<dyn Backend>,
    options: SessionOptions,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    /// Spawned tasks whose event has not been handled yet.
    pending_tasks: usize,

    // Entities and counters
    store: EntityStore,
    feed_stats: FeedStats,
    filtered: Option<FilteredStats>,
    window_title: String,
    feed_errors: HashMap<i64, String>,

    // Selection and list state
    feed_selected: Option<Selection>,
    item_selected: Option<i64>,
    item_details: Option<Item>,
    filter: StatusFilter,
    sort_newest_first: bool,
    /// Text as typed; becomes `search_applied` once the quiet window closes.
    search_input: Debounced<String>,
    search_applied: String,
    pagination: Pagination,
    last_scroll: Option<ScrollMetrics>,
    pending_updates: PendingUpdates,

    // Preferences
    theme: ThemeSettings,
    feed_list_width: u32,
    item_list_width: u32,
    refresh_rate: u32,
    settings: SettingsDebouncer,

    // Background activity
    refreshing: bool,
    poll_scheduled: bool,
    tree_loading: bool,
    feed_choices: Vec<FeedChoice>,
}

impl Session {
    pub fn new(backend: Arc<dyn Backend>, options: SessionOptions) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let defaults = crate::model::Settings::default();
        Self {
            backend,
            events_tx,
            events_rx,
            pending_tasks: 0,
            store: EntityStore::new(),
            feed_stats: FeedStats::new(),
            filtered: None,
            window_title: APP_NAME.to_string(),
            feed_errors: HashMap::new(),
            feed_selected: defaults.selection(),
            item_selected: None,
            item_details: None,
            filter: defaults.filter,
            sort_newest_first: defaults.sort_newest_first,
            search_input: Debounced::initialized(options.search_debounce, String::new()),
            search_applied: String::new(),
            pagination: Pagination::new(options.listing_mode, options.near_bottom_px),
            last_scroll: None,
            pending_updates: PendingUpdates::default(),
            theme: defaults.theme(),
            feed_list_width: defaults.feed_list_width,
            item_list_width: defaults.item_list_width,
            refresh_rate: defaults.refresh_rate,
            settings: SettingsDebouncer::new(options.layout_debounce),
            refreshing: false,
            poll_scheduled: false,
            tree_loading: false,
            feed_choices: Vec::new(),
            options,
        }
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn folders(&self) -> &[Folder] {
        self.store.folders()
    }

    pub fn feeds(&self) -> &[Feed] {
        self.store.feeds()
    }

    pub fn items(&self) -> &[Item] {
        self.store.items()
    }

    pub fn feed_stats(&self) -> &FeedStats {
        &self.feed_stats
    }

    /// Counters under the active filter; `None` when no filter is active.
    pub fn filtered_stats(&self) -> Option<&FilteredStats> {
        self.filtered.as_ref()
    }

    pub fn window_title(&self) -> &str {
        &self.window_title
    }

    pub fn feed_errors(&self) -> &HashMap<i64, String> {
        &self.feed_errors
    }

    pub fn feed_selected(&self) -> Option<Selection> {
        self.feed_selected
    }

    pub fn item_selected(&self) -> Option<i64> {
        self.item_selected
    }

    /// Full form of the selected item, once fetched.
    pub fn item_details(&self) -> Option<&Item> {
        self.item_details.as_ref()
    }

    pub fn filter(&self) -> StatusFilter {
        self.filter
    }

    pub fn sort_newest_first(&self) -> bool {
        self.sort_newest_first
    }

    /// Search text currently applied to the item list.
    pub fn search(&self) -> &str {
        &self.search_applied
    }

    pub fn theme(&self) -> &ThemeSettings {
        &self.theme
    }

    pub fn feed_list_width(&self) -> u32 {
        self.feed_list_width
    }

    pub fn item_list_width(&self) -> u32 {
        self.item_list_width
    }

    pub fn refresh_rate(&self) -> u32 {
        self.refresh_rate
    }

    /// Whether the server reported a feed refresh in progress.
    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn is_loading_items(&self) -> bool {
        self.pagination.is_loading()
    }

    pub fn has_more_items(&self) -> bool {
        self.pagination.has_more()
    }

    /// Candidates offered by the last subscribe attempt that found several
    /// feeds at one URL.
    pub fn feed_choices(&self) -> &[FeedChoice] {
        &self.feed_choices
    }

    pub fn pending_tasks(&self) -> usize {
        self.pending_tasks
    }

    // ------------------------------------------------------------------
    // Event loop plumbing
    // ------------------------------------------------------------------

    /// Wait for the next task event. Returns `None` when no task is
    /// outstanding.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if self.pending_tasks == 0 {
            return None;
        }
        self.events_rx.recv().await
    }

    /// Earliest pending debounce deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.settings.next_deadline(), self.search_input.deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    /// Fire every debounce whose quiet window has closed.
    pub fn tick(&mut self) {
        let now = Instant::now();

        if let Some(update) = self.settings.take_due(now) {
            tracing::debug!(?update, "Persisting settings");
            let backend = Arc::clone(&self.backend);
            self.spawn(
                "update_settings",
                async move { backend.update_settings(&update).await },
                SessionEvent::SettingsSaved,
            );
        }

        if let Some(search) = self.search_input.take_due(now) {
            tracing::debug!(search = %search, "Applying search");
            self.search_applied = search;
            self.reset_list();
        }
    }

    /// Run until no task is outstanding and no debounce is pending.
    ///
    /// Every event is handled even if an earlier one failed; the first
    /// failure is returned.
    pub async fn settle(&mut self) -> Result<(), SessionError> {
        let mut first_error = None;
        loop {
            self.tick();
            let deadline = self.next_deadline();
            if self.pending_tasks == 0 && deadline.is_none() {
                break;
            }

            let sleep = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };
            let event = tokio::select! {
                event = self.events_rx.recv() => event,
                _ = sleep => None,
            };

            if let Some(event) = event {
                if let Err(e) = self.handle_event(event) {
                    tracing::warn!(error = %e, "Operation failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Recompute the filtered counters and the window title.
    pub(crate) fn recompute_stats(&mut self) {
        self.filtered = stats::compute(self.store.feeds(), &self.feed_stats, self.filter);
        self.window_title = stats::window_title(APP_NAME, &self.feed_stats);
    }
}
