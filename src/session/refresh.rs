//! Startup, status polling and tree reloads.
//!
//! A status poll replaces every feed counter. While the server reports a
//! refresh running, the next poll is scheduled one poll interval later;
//! the chain stops at the first poll that reports idle.

use std::sync::Arc;

use super::{Session, SessionError, SessionEvent};
use crate::backend::{BackendError, ServerStatus};
use crate::model::{Feed, Folder, Settings};

impl Session {
    /// Load settings, then kick off the status, tree and item fetches.
    ///
    /// Settings are awaited so the first list fetch uses the persisted
    /// selection and filter. If they cannot be loaded the defaults are
    /// used.
    pub async fn start(&mut self) {
        let settings = match self.backend.get_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load settings, using defaults");
                Settings::default()
            }
        };
        self.apply_settings(&settings);

        self.refresh_stats(false);
        self.refresh_tree();
        self.refresh_items();
    }

    /// Adopt server-held preferences without writing them back.
    pub(super) fn apply_settings(&mut self, settings: &Settings) {
        self.filter = settings.filter;
        self.feed_selected = settings.selection();
        self.sort_newest_first = settings.sort_newest_first;
        self.theme = settings.theme();
        self.feed_list_width = settings.feed_list_width;
        self.item_list_width = settings.item_list_width;
        self.refresh_rate = settings.refresh_rate;
        self.settings.load(settings);
        self.recompute_stats();

        tracing::info!(
            filter = ?self.filter,
            selection = ?self.feed_selected,
            "Applied settings"
        );
    }

    /// Poll server status now.
    pub fn refresh_stats(&mut self, loop_mode: bool) {
        let backend = Arc::clone(&self.backend);
        self.spawn(
            "status",
            async move { backend.status().await },
            move |result| SessionEvent::StatusLoaded { loop_mode, result },
        );
    }

    fn schedule_poll(&mut self) {
        self.poll_scheduled = true;
        let backend = Arc::clone(&self.backend);
        let delay = self.options.poll_interval;
        self.spawn(
            "status_poll",
            async move {
                tokio::time::sleep(delay).await;
                backend.status().await
            },
            |result| SessionEvent::StatusLoaded {
                loop_mode: true,
                result,
            },
        );
    }

    pub(super) fn on_status_loaded(
        &mut self,
        loop_mode: bool,
        result: Result<ServerStatus, BackendError>,
    ) -> Result<(), SessionError> {
        if loop_mode {
            self.poll_scheduled = false;
        }
        let status = match result {
            Ok(status) => status,
            Err(e) => {
                self.refreshing = false;
                return Err(SessionError::rejected("status")(e));
            }
        };

        if loop_mode && self.item_selected.is_none() {
            self.refresh_items();
        }

        self.refreshing = status.running;
        if status.running && !self.poll_scheduled {
            self.schedule_poll();
        } else if !status.running && loop_mode {
            tracing::info!("Server refresh finished");
        }

        self.feed_stats = status.stats.into_iter().map(|s| (s.feed_id, s)).collect();
        self.recompute_stats();

        let backend = Arc::clone(&self.backend);
        self.spawn(
            "feed_errors",
            async move { backend.list_feed_errors().await },
            SessionEvent::FeedErrorsLoaded,
        );
        Ok(())
    }

    /// Reload folders and feeds together.
    pub fn refresh_tree(&mut self) {
        self.tree_loading = true;
        let backend = Arc::clone(&self.backend);
        self.spawn(
            "tree",
            async move { futures::try_join!(backend.list_folders(), backend.list_feeds()) },
            SessionEvent::TreeLoaded,
        );
    }

    pub(super) fn on_tree_loaded(
        &mut self,
        result: Result<(Vec<Folder>, Vec<Feed>), BackendError>,
    ) -> Result<(), SessionError> {
        self.tree_loading = false;
        let (folders, feeds) = result.map_err(SessionError::rejected("list_tree"))?;
        tracing::debug!(folders = folders.len(), feeds = feeds.len(), "Tree loaded");
        self.store.replace_tree(folders, feeds);
        self.recompute_stats();
        Ok(())
    }

    /// Ask the server to refresh every feed, then follow it with status
    /// polls. Does nothing while a refresh is already running.
    pub fn fetch_all_feeds(&mut self) {
        if self.refreshing {
            tracing::debug!("Refresh already running");
            return;
        }
        let backend = Arc::clone(&self.backend);
        self.spawn(
            "refresh_feeds",
            async move { backend.refresh_feeds().await },
            SessionEvent::FeedsRefreshStarted,
        );
    }

    pub(super) fn on_feeds_refresh_started(
        &mut self,
        result: Result<(), BackendError>,
    ) -> Result<(), SessionError> {
        result.map_err(SessionError::rejected("refresh_feeds"))?;
        tracing::info!("Server refresh started");
        self.refresh_stats(false);
        Ok(())
    }
}
