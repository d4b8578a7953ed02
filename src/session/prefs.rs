//! Theme, layout and refresh-rate preferences.

use super::Session;
use crate::debounce::{Observed, SettingChange};

/// Bounds for both list widths.
const MIN_LIST_WIDTH: u32 = 200;
const MAX_LIST_WIDTH: u32 = 700;

/// Smallest font multiplier `incr_font` will go down to.
const MIN_FONT_SIZE: f64 = 0.1;

impl Session {
    /// Hand a changed preference to the settings debouncer and flush
    /// anything with a zero window straight away.
    pub(super) fn observe_setting(&mut self, change: SettingChange) {
        let now = tokio::time::Instant::now();
        let observed = self.settings.observe(change, now);
        if observed == Observed::Scheduled {
            self.tick();
        }
    }

    pub fn set_theme(&mut self, name: &str) {
        if self.theme.name == name {
            return;
        }
        self.theme.name = name.to_string();
        self.observe_setting(SettingChange::Theme(self.theme.clone()));
    }

    pub fn set_theme_font(&mut self, font: &str) {
        if self.theme.font == font {
            return;
        }
        self.theme.font = font.to_string();
        self.observe_setting(SettingChange::Theme(self.theme.clone()));
    }

    /// Step the font multiplier by `steps` tenths, kept to one decimal.
    pub fn incr_font(&mut self, steps: i32) {
        let size = ((self.theme.size + 0.1 * f64::from(steps)) * 10.0).round() / 10.0;
        let size = size.max(MIN_FONT_SIZE);
        if size == self.theme.size {
            return;
        }
        self.theme.size = size;
        self.observe_setting(SettingChange::Theme(self.theme.clone()));
    }

    pub fn resize_feed_list(&mut self, width: u32) {
        let width = width.clamp(MIN_LIST_WIDTH, MAX_LIST_WIDTH);
        if width == self.feed_list_width {
            return;
        }
        self.feed_list_width = width;
        self.observe_setting(SettingChange::FeedListWidth(width));
    }

    pub fn resize_item_list(&mut self, width: u32) {
        let width = width.clamp(MIN_LIST_WIDTH, MAX_LIST_WIDTH);
        if width == self.item_list_width {
            return;
        }
        self.item_list_width = width;
        self.observe_setting(SettingChange::ItemListWidth(width));
    }

    /// Server-side auto-refresh period in minutes; 0 disables it.
    pub fn set_refresh_rate(&mut self, minutes: u32) {
        if minutes == self.refresh_rate {
            return;
        }
        self.refresh_rate = minutes;
        self.observe_setting(SettingChange::RefreshRate(minutes));
    }
}
