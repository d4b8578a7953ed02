//! Incremental item-list loading.
//!
//! Every list fetch is tagged with a generation. Resetting the list bumps
//! the generation, so a response that comes back for an older generation
//! can be recognised and dropped. At most one fetch is in flight at a time.

use serde::{Deserialize, Serialize};

use crate::backend::ItemPage;

/// How the server pages `items.list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingMode {
    /// `after = <last loaded id>`, response carries `has_more`.
    #[default]
    Cursor,
    /// `page = n`, response carries `{cur, num}`.
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCursor {
    Page { cur: u32, num: u32 },
    Cursor { has_more: bool },
}

impl PageCursor {
    fn exhausted(mode: ListingMode) -> Self {
        match mode {
            ListingMode::Page => Self::Page { cur: 1, num: 1 },
            ListingMode::Cursor => Self::Cursor { has_more: false },
        }
    }

    pub fn has_more(&self) -> bool {
        match *self {
            Self::Page { cur, num } => cur < num,
            Self::Cursor { has_more } => has_more,
        }
    }
}

/// Which slice of the list a fetch asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    First,
    After(i64),
    Page(u32),
}

/// Geometry of the item list viewport, as reported by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    pub scroll_height: f64,
    pub scroll_top: f64,
    pub offset_height: f64,
}

impl ScrollMetrics {
    /// True when less than `bottom_space * scale` remains below the
    /// viewport. A list with zero scroll height is hidden and never counts.
    pub fn close_to_bottom(&self, bottom_space: f64, scale: f64) -> bool {
        if self.scroll_height == 0.0 {
            return false;
        }
        self.scroll_height - self.scroll_top - self.offset_height < bottom_space * scale
    }
}

#[derive(Debug)]
pub struct Pagination {
    mode: ListingMode,
    cursor: PageCursor,
    generation: u64,
    in_flight: Option<u64>,
    bottom_space: f64,
}

impl Pagination {
    pub fn new(mode: ListingMode, bottom_space: f64) -> Self {
        Self {
            mode,
            cursor: PageCursor::exhausted(mode),
            generation: 0,
            in_flight: None,
            bottom_space,
        }
    }

    pub fn mode(&self) -> ListingMode {
        self.mode
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn has_more(&self) -> bool {
        self.cursor.has_more()
    }

    /// Start over: nothing loaded, nothing more to load, and any in-flight
    /// fetch becomes stale.
    pub fn reset(&mut self) -> u64 {
        self.cursor = PageCursor::exhausted(self.mode);
        self.generation += 1;
        self.in_flight = None;
        self.generation
    }

    /// Take the guard for a first-page fetch.
    ///
    /// Supersedes whatever was in flight. The cursor is left alone so a
    /// background refresh does not hide the "more" state of the list it
    /// is about to replace.
    pub fn begin_refresh(&mut self) -> (u64, PageRequest) {
        self.generation += 1;
        self.in_flight = Some(self.generation);
        (self.generation, PageRequest::First)
    }

    /// Take the guard for the next page, if one is available and nothing
    /// is in flight.
    pub fn begin_load_more(&mut self, last_item_id: Option<i64>) -> Option<(u64, PageRequest)> {
        if let Some(generation) = self.in_flight {
            tracing::debug!(generation, "Load more skipped: fetch in flight");
            return None;
        }
        if !self.cursor.has_more() {
            return None;
        }
        let request = match self.cursor {
            PageCursor::Page { cur, .. } => PageRequest::Page(cur + 1),
            PageCursor::Cursor { .. } => PageRequest::After(last_item_id?),
        };
        self.in_flight = Some(self.generation);
        Some((self.generation, request))
    }

    /// Release the guard taken for `generation`.
    ///
    /// Returns whether the response is current and should be applied.
    pub fn finish(&mut self, generation: u64) -> bool {
        if self.in_flight == Some(generation) {
            self.in_flight = None;
        }
        generation == self.generation
    }

    /// Update the cursor from a response that [`finish`](Self::finish)
    /// accepted.
    pub fn apply(&mut self, page: &ItemPage) {
        self.cursor = match self.mode {
            ListingMode::Cursor => PageCursor::Cursor {
                has_more: page.has_more.unwrap_or(false),
            },
            ListingMode::Page => match page.page {
                Some(info) => PageCursor::Page {
                    cur: info.cur,
                    num: info.num,
                },
                None => PageCursor::exhausted(ListingMode::Page),
            },
        };
    }

    /// Whether either load-more trigger fires: the list is scrolled near
    /// its bottom, or the selected item is the last loaded one.
    pub fn should_load_more(
        &self,
        scroll: Option<&ScrollMetrics>,
        scale: f64,
        selected: Option<i64>,
        last_item_id: Option<i64>,
    ) -> bool {
        if self.is_loading() || !self.has_more() {
            return false;
        }
        if scroll.is_some_and(|m| m.close_to_bottom(self.bottom_space, scale)) {
            return true;
        }
        selected.is_some() && selected == last_item_id
    }
}
