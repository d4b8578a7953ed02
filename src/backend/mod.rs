//! Server capability consumed by the session.
//!
//! The session never talks HTTP directly: everything goes through the
//! object-safe [`Backend`] trait so the transport can be swapped out (the
//! [`HttpBackend`] adapter for a live server, a scripted mock in tests).
//!
//! - [`http`] - reqwest adapter for the JSON API

mod http;
#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::model::{Feed, FeedStat, Folder, Item, ItemStatus, Settings, SettingsUpdate};

pub use http::HttpBackend;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error: status {0}")]
    HttpStatus(u16),

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),

    #[error("Invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The server answered but refused the operation.
    #[error("Rejected by server: {0}")]
    Rejected(String),

    /// The background task running the call panicked.
    #[error("Task panicked: {0}")]
    TaskPanicked(String),
}

pub type Result<T, E = BackendError> = std::result::Result<T, E>;

// ============================================================================
// Request Types
// ============================================================================

/// Query for `items.list` and `items.mark_read`.
///
/// `after` is used in cursor listing mode, `page` in page listing mode;
/// never both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemQuery {
    pub feed_id: Option<i64>,
    pub folder_id: Option<i64>,
    pub status: Option<ItemStatus>,
    pub search: Option<String>,
    pub after: Option<i64>,
    pub page: Option<u32>,
    pub oldest_first: bool,
}

impl ItemQuery {
    /// Key/value pairs in wire order. Unset fields are omitted.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = self.feed_id {
            pairs.push(("feed_id", id.to_string()));
        }
        if let Some(id) = self.folder_id {
            pairs.push(("folder_id", id.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(after) = self.after {
            pairs.push(("after", after.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if self.oldest_first {
            pairs.push(("oldest_first", "true".to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FolderUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_expanded: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_link: Option<String>,
    /// `Some(None)` moves the feed out of any folder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<Option<i64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedCreate {
    pub url: String,
    pub folder_id: Option<i64>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub cur: u32,
    pub num: u32,
}

/// One page of `items.list`. Cursor-mode servers send `has_more`,
/// page-mode servers send `page`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ItemPage {
    #[serde(default)]
    pub list: Vec<Item>,
    #[serde(default)]
    pub has_more: Option<bool>,
    #[serde(default)]
    pub page: Option<PageInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedChoice {
    pub url: String,
    #[serde(default)]
    pub title: String,
}

/// Result of subscribing by URL: discovery may find one feed, several
/// candidates, or nothing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FeedCreateOutcome {
    Success { feed: Feed },
    Multiple { choice: Vec<FeedChoice> },
    NotFound,
}

/// `running` is a pending-feed count on some servers and a bool on others.
fn running_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Running {
        Flag(bool),
        Count(u64),
    }
    Ok(match Running::deserialize(deserializer)? {
        Running::Flag(b) => b,
        Running::Count(n) => n > 0,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerStatus {
    #[serde(deserialize_with = "running_flag")]
    pub running: bool,
    #[serde(default)]
    pub stats: Vec<FeedStat>,
}

// ============================================================================
// Backend Trait
// ============================================================================

/// Async operations over folders, feeds, items and settings.
///
/// Every method either returns the server's answer or a [`BackendError`];
/// none of them touch local state.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn list_folders(&self) -> Result<Vec<Folder>>;
    async fn create_folder(&self, title: &str) -> Result<Folder>;
    async fn update_folder(&self, id: i64, update: &FolderUpdate) -> Result<()>;
    async fn delete_folder(&self, id: i64) -> Result<()>;

    async fn list_feeds(&self) -> Result<Vec<Feed>>;
    async fn create_feed(&self, feed: &FeedCreate) -> Result<FeedCreateOutcome>;
    async fn update_feed(&self, id: i64, update: &FeedUpdate) -> Result<()>;
    async fn delete_feed(&self, id: i64) -> Result<()>;
    /// Ask the server to start refreshing every feed in the background.
    async fn refresh_feeds(&self) -> Result<()>;
    async fn list_feed_errors(&self) -> Result<HashMap<i64, String>>;

    async fn get_item(&self, id: i64) -> Result<Item>;
    async fn list_items(&self, query: &ItemQuery) -> Result<ItemPage>;
    async fn update_item(&self, id: i64, status: ItemStatus) -> Result<()>;
    async fn mark_read(&self, query: &ItemQuery) -> Result<()>;

    async fn get_settings(&self) -> Result<Settings>;
    async fn update_settings(&self, update: &SettingsUpdate) -> Result<()>;

    async fn status(&self) -> Result<ServerStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_query_pairs_omit_unset_fields() {
        assert!(ItemQuery::default().to_pairs().is_empty());

        let query = ItemQuery {
            folder_id: Some(4),
            status: Some(ItemStatus::Starred),
            search: Some("rust async".to_string()),
            after: Some(99),
            oldest_first: true,
            ..ItemQuery::default()
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("folder_id", "4".to_string()),
                ("status", "starred".to_string()),
                ("search", "rust async".to_string()),
                ("after", "99".to_string()),
                ("oldest_first", "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_status_running_accepts_count_or_flag() {
        let s: ServerStatus = serde_json::from_str(r#"{"running": 3, "stats": []}"#).unwrap();
        assert!(s.running);
        let s: ServerStatus = serde_json::from_str(r#"{"running": 0, "stats": []}"#).unwrap();
        assert!(!s.running);
        let s: ServerStatus = serde_json::from_str(
            r#"{"running": true, "stats": [{"feed_id": 1, "unread": 2, "starred": 0}]}"#,
        )
        .unwrap();
        assert!(s.running);
        assert_eq!(s.stats[0].unread, 2);
    }

    #[test]
    fn test_feed_create_outcome_variants() {
        let ok: FeedCreateOutcome = serde_json::from_str(
            r#"{"status": "success", "feed": {"id": 5, "title": "Blog", "folder_id": null, "feed_link": "https://b/rss"}}"#,
        )
        .unwrap();
        assert!(matches!(ok, FeedCreateOutcome::Success { feed } if feed.id == 5));

        let multiple: FeedCreateOutcome = serde_json::from_str(
            r#"{"status": "multiple", "choice": [{"url": "https://a/atom", "title": "Atom"}]}"#,
        )
        .unwrap();
        assert!(matches!(multiple, FeedCreateOutcome::Multiple { choice } if choice.len() == 1));

        let none: FeedCreateOutcome =
            serde_json::from_str(r#"{"status": "notfound"}"#).unwrap();
        assert_eq!(none, FeedCreateOutcome::NotFound);
    }

    #[test]
    fn test_feed_update_serializes_null_folder() {
        let update = FeedUpdate {
            folder_id: Some(None),
            ..FeedUpdate::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({"folder_id": null})
        );
    }
}
