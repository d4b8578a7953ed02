//! Quiet-window batching of preference writes.
//!
//! Each watched value goes through a [`Debounced`] cell: changes restart
//! the window, and only the value standing when the window closes is
//! released. The very first value a cell sees is the echo of server
//! state and is never released.

use std::time::Duration;
use tokio::time::Instant;

use crate::model::{Selection, Settings, SettingsUpdate, StatusFilter, ThemeSettings};

/// What [`Debounced::observe`] did with a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observed {
    /// First value seen; recorded as the baseline, never written.
    Suppressed,
    /// A write is pending for when the window closes.
    Scheduled,
    /// Same as the last written value with nothing pending.
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct Debounced<T> {
    window: Duration,
    committed: Option<T>,
    pending: Option<(T, Instant)>,
}

impl<T: Clone + PartialEq> Debounced<T> {
    /// A cell that has not seen any value yet.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            committed: None,
            pending: None,
        }
    }

    /// A cell whose baseline is already known.
    pub fn initialized(window: Duration, value: T) -> Self {
        Self {
            window,
            committed: Some(value),
            pending: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.committed.is_some()
    }

    /// Replace the baseline and drop anything pending.
    pub fn sync(&mut self, value: T) {
        self.committed = Some(value);
        self.pending = None;
    }

    pub fn observe(&mut self, value: T, now: Instant) -> Observed {
        if self.committed.is_none() {
            self.committed = Some(value);
            return Observed::Suppressed;
        }
        if self.pending.is_none() && self.committed.as_ref() == Some(&value) {
            return Observed::Unchanged;
        }
        self.pending = Some((value, now + self.window));
        Observed::Scheduled
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }

    /// Release the pending value if its window has closed.
    ///
    /// A burst that ends on the value already written releases nothing.
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, at)) if *at <= now => {}
            _ => return None,
        }
        let (value, _) = self.pending.take()?;
        if self.committed.as_ref() == Some(&value) {
            return None;
        }
        self.committed = Some(value.clone());
        Some(value)
    }
}

/// A change to one persisted preference.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingChange {
    Filter(StatusFilter),
    Feed(Option<Selection>),
    SortNewestFirst(bool),
    Theme(ThemeSettings),
    RefreshRate(u32),
    FeedListWidth(u32),
    ItemListWidth(u32),
}

/// One [`Debounced`] cell per persisted preference.
///
/// Filter, selection, sort order, theme and refresh rate use a zero window
/// (written on the next tick); list widths use the layout window.
#[derive(Debug)]
pub struct SettingsDebouncer {
    filter: Debounced<StatusFilter>,
    feed: Debounced<Option<Selection>>,
    sort_newest_first: Debounced<bool>,
    theme: Debounced<ThemeSettings>,
    refresh_rate: Debounced<u32>,
    feed_list_width: Debounced<u32>,
    item_list_width: Debounced<u32>,
}

impl SettingsDebouncer {
    pub fn new(layout_window: Duration) -> Self {
        Self {
            filter: Debounced::new(Duration::ZERO),
            feed: Debounced::new(Duration::ZERO),
            sort_newest_first: Debounced::new(Duration::ZERO),
            theme: Debounced::new(Duration::ZERO),
            refresh_rate: Debounced::new(Duration::ZERO),
            feed_list_width: Debounced::new(layout_window),
            item_list_width: Debounced::new(layout_window),
        }
    }

    /// Record server state as the baseline for every cell.
    pub fn load(&mut self, settings: &Settings) {
        self.filter.sync(settings.filter);
        self.feed.sync(settings.selection());
        self.sort_newest_first.sync(settings.sort_newest_first);
        self.theme.sync(settings.theme());
        self.refresh_rate.sync(settings.refresh_rate);
        self.feed_list_width.sync(settings.feed_list_width);
        self.item_list_width.sync(settings.item_list_width);
    }

    pub fn observe(&mut self, change: SettingChange, now: Instant) -> Observed {
        match change {
            SettingChange::Filter(v) => self.filter.observe(v, now),
            SettingChange::Feed(v) => self.feed.observe(v, now),
            SettingChange::SortNewestFirst(v) => self.sort_newest_first.observe(v, now),
            SettingChange::Theme(v) => self.theme.observe(v, now),
            SettingChange::RefreshRate(v) => self.refresh_rate.observe(v, now),
            SettingChange::FeedListWidth(v) => self.feed_list_width.observe(v, now),
            SettingChange::ItemListWidth(v) => self.item_list_width.observe(v, now),
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.filter.deadline(),
            self.feed.deadline(),
            self.sort_newest_first.deadline(),
            self.theme.deadline(),
            self.refresh_rate.deadline(),
            self.feed_list_width.deadline(),
            self.item_list_width.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Collect every value whose window has closed into one partial write.
    pub fn take_due(&mut self, now: Instant) -> Option<SettingsUpdate> {
        let mut update = SettingsUpdate {
            filter: self.filter.take_due(now),
            feed: self
                .feed
                .take_due(now)
                .map(|sel| sel.map(|s| s.to_string())),
            sort_newest_first: self.sort_newest_first.take_due(now),
            refresh_rate: self.refresh_rate.take_due(now),
            feed_list_width: self.feed_list_width.take_due(now),
            item_list_width: self.item_list_width.take_due(now),
            ..SettingsUpdate::default()
        };
        if let Some(theme) = self.theme.take_due(now) {
            update.theme_name = Some(theme.name);
            update.theme_font = Some(theme.font);
            update.theme_size = Some(theme.size);
        }
        (!update.is_empty()).then_some(update)
    }
}
