use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Serde Helpers
// ============================================================================

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Entities
// ============================================================================

/// A named grouping of feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub is_expanded: bool,
}

/// A subscribed source. `folder_id = None` places it in the virtual
/// "no folder" group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub folder_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub link: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub feed_link: String,
}

/// Tri-state item status. Only `Unread` and `Starred` are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Unread,
    Read,
    Starred,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Read => "read",
            Self::Starred => "starred",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaLink {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    #[serde(default)]
    pub description: Option<String>,
}

/// A single entry from a feed.
///
/// List responses carry the summary fields only; `content`, `description`
/// and `media_links` are filled in by the single-item fetch used for the
/// detail view. `status` is the only field this crate ever writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub feed_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub link: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    pub status: ItemStatus,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub media_links: Vec<MediaLink>,
}

/// An item's media links split by kind, for the detail view.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MediaPartition<'a> {
    pub images: Vec<&'a MediaLink>,
    pub audios: Vec<&'a MediaLink>,
    pub videos: Vec<&'a MediaLink>,
}

impl Item {
    pub fn media(&self, kind: MediaKind) -> impl Iterator<Item = &MediaLink> {
        self.media_links.iter().filter(move |l| l.kind == kind)
    }

    /// Links of unknown kind are left out.
    pub fn media_partition(&self) -> MediaPartition<'_> {
        let mut out = MediaPartition::default();
        for link in &self.media_links {
            match link.kind {
                MediaKind::Image => out.images.push(link),
                MediaKind::Audio => out.audios.push(link),
                MediaKind::Video => out.videos.push(link),
                MediaKind::Other => {}
            }
        }
        out
    }
}

/// Server-maintained per-feed counters, mirrored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedStat {
    pub feed_id: i64,
    #[serde(default)]
    pub unread: i64,
    #[serde(default)]
    pub starred: i64,
}

impl FeedStat {
    pub fn count(&self, status: ItemStatus) -> i64 {
        match status {
            ItemStatus::Unread => self.unread,
            ItemStatus::Starred => self.starred,
            ItemStatus::Read => 0,
        }
    }

    pub(crate) fn count_mut(&mut self, status: ItemStatus) -> Option<&mut i64> {
        match status {
            ItemStatus::Unread => Some(&mut self.unread),
            ItemStatus::Starred => Some(&mut self.starred),
            ItemStatus::Read => None,
        }
    }
}

// ============================================================================
// Selection
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid selection key: {0:?}")]
pub struct ParseSelectionError(String);

/// What the feed list points at.
///
/// "Nothing selected" is represented by `Option<Selection>::None` at the
/// call sites, never by a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selection {
    AllFeeds,
    Folder(i64),
    Feed(i64),
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllFeeds => Ok(()),
            Self::Folder(id) => write!(f, "folder:{}", id),
            Self::Feed(id) => write!(f, "feed:{}", id),
        }
    }
}

/// Parses the persisted `feed` setting (`""`, `"feed:<id>"`, `"folder:<id>"`).
impl FromStr for Selection {
    type Err = ParseSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::AllFeeds);
        }
        let err = || ParseSelectionError(s.to_string());
        let (kind, id) = s.split_once(':').ok_or_else(err)?;
        let id: i64 = id.parse().map_err(|_| err())?;
        match kind {
            "feed" => Ok(Self::Feed(id)),
            "folder" => Ok(Self::Folder(id)),
            _ => Err(err()),
        }
    }
}

/// Status filter applied to the item list and the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StatusFilter {
    #[default]
    #[serde(rename = "")]
    All,
    #[serde(rename = "unread")]
    Unread,
    #[serde(rename = "starred")]
    Starred,
}

impl StatusFilter {
    pub fn status(self) -> Option<ItemStatus> {
        match self {
            Self::All => None,
            Self::Unread => Some(ItemStatus::Unread),
            Self::Starred => Some(ItemStatus::Starred),
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Theme triple, persisted together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeSettings {
    pub name: String,
    pub font: String,
    pub size: f64,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            name: "light".to_string(),
            font: String::new(),
            size: 1.0,
        }
    }
}

/// Server-held user preferences as returned by `settings.get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub filter: StatusFilter,
    pub feed: Option<String>,
    pub feed_list_width: u32,
    pub item_list_width: u32,
    pub sort_newest_first: bool,
    pub theme_name: String,
    pub theme_font: String,
    pub theme_size: f64,
    pub refresh_rate: u32,
}

impl Default for Settings {
    fn default() -> Self {
        let theme = ThemeSettings::default();
        Self {
            filter: StatusFilter::All,
            feed: Some(String::new()),
            feed_list_width: 300,
            item_list_width: 300,
            sort_newest_first: true,
            theme_name: theme.name,
            theme_font: theme.font,
            theme_size: theme.size,
            refresh_rate: 0,
        }
    }
}

impl Settings {
    /// Decode the persisted feed selection; unparseable keys fall back to
    /// "all feeds".
    pub fn selection(&self) -> Option<Selection> {
        let key = self.feed.as_deref()?;
        match key.parse() {
            Ok(selection) => Some(selection),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring persisted feed selection");
                Some(Selection::AllFeeds)
            }
        }
    }

    pub fn theme(&self) -> ThemeSettings {
        ThemeSettings {
            name: self.theme_name.clone(),
            font: self.theme_font.clone(),
            size: self.theme_size,
        }
    }
}

/// Partial settings write. Only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<StatusFilter>,
    /// `Some(None)` persists "nothing selected".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_list_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_list_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_newest_first: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_font: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_rate: Option<u32>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_selection_round_trip_keys() {
        for sel in [
            Selection::AllFeeds,
            Selection::Feed(7),
            Selection::Folder(3),
        ] {
            assert_eq!(sel.to_string().parse::<Selection>(), Ok(sel));
        }
        assert_eq!(Selection::AllFeeds.to_string(), "");
        assert_eq!(Selection::Feed(12).to_string(), "feed:12");
    }

    #[test]
    fn test_selection_rejects_garbage() {
        assert!("feed".parse::<Selection>().is_err());
        assert!("feed:abc".parse::<Selection>().is_err());
        assert!("tag:1".parse::<Selection>().is_err());
    }

    #[test]
    fn test_settings_selection_null_means_nothing_selected() {
        let settings = Settings {
            feed: None,
            ..Settings::default()
        };
        assert_eq!(settings.selection(), None);

        let settings = Settings {
            feed: Some("bogus".to_string()),
            ..Settings::default()
        };
        assert_eq!(settings.selection(), Some(Selection::AllFeeds));
    }

    #[test]
    fn test_status_filter_serde_uses_empty_string_for_all() {
        assert_eq!(serde_json::to_string(&StatusFilter::All).unwrap(), "\"\"");
        let f: StatusFilter = serde_json::from_str("\"starred\"").unwrap();
        assert_eq!(f, StatusFilter::Starred);
    }

    #[test]
    fn test_item_tolerates_null_fields() {
        let json = r#"{
            "id": 1, "feed_id": 2, "title": null, "link": "https://e.com/1",
            "date": "2024-01-02T03:04:05Z", "status": "unread", "media_links": null
        }"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.title, "");
        assert!(item.media_links.is_empty());
        assert_eq!(item.status, ItemStatus::Unread);
    }

    #[test]
    fn test_media_partition() {
        let json = r#"{
            "id": 1, "feed_id": 2, "status": "read",
            "media_links": [
                {"url": "a.png", "type": "image"},
                {"url": "b.mp3", "type": "audio"},
                {"url": "c.gif", "type": "image"},
                {"url": "d.bin", "type": "torrent"}
            ]
        }"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.media(MediaKind::Image).count(), 2);
        assert_eq!(item.media(MediaKind::Audio).count(), 1);
        assert_eq!(item.media(MediaKind::Video).count(), 0);
        assert_eq!(item.media(MediaKind::Other).count(), 1);

        let parts = item.media_partition();
        let urls: Vec<&str> = parts.images.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["a.png", "c.gif"]);
        assert_eq!(parts.audios.len(), 1);
        assert!(parts.videos.is_empty());
    }

    #[test]
    fn test_settings_update_skips_unset_fields() {
        let update = SettingsUpdate {
            feed: Some(None),
            item_list_width: Some(420),
            ..SettingsUpdate::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"feed": null, "item_list_width": 420})
        );
        assert!(SettingsUpdate::default().is_empty());
    }
}
