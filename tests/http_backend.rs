//! Integration tests for `HttpBackend` against a mock JSON API.
//!
//! Each test starts its own wiremock server; mocks that carry `expect(n)`
//! are verified when the server is dropped.

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rill::backend::{
    Backend, BackendError, FeedCreate, FeedCreateOutcome, FeedUpdate, FolderUpdate, ItemQuery,
};
use rill::model::{ItemStatus, MediaKind, SettingsUpdate, StatusFilter};

async fn setup() -> (MockServer, rill::backend::HttpBackend) {
    let server = MockServer::start().await;
    let base = Url::parse(&format!("{}/", server.uri())).unwrap();
    let backend = rill::backend::HttpBackend::new(base, None).unwrap();
    (server, backend)
}

fn ok() -> ResponseTemplate {
    ResponseTemplate::new(200)
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn test_list_tree_decodes_nulls() {
    let (server, backend) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/folders"))
        .respond_with(ok().set_body_json(json!([
            { "id": 1, "title": "News", "is_expanded": true },
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/feeds"))
        .respond_with(ok().set_body_json(json!([
            { "id": 3, "title": "Blog", "folder_id": 1, "link": null, "feed_link": "https://blog.example/rss" },
            { "id": 4, "title": "Loose", "folder_id": null },
        ])))
        .mount(&server)
        .await;

    let folders = backend.list_folders().await.unwrap();
    assert_eq!(folders.len(), 1);
    assert!(folders[0].is_expanded);

    let feeds = backend.list_feeds().await.unwrap();
    assert_eq!(feeds[0].folder_id, Some(1));
    assert_eq!(feeds[0].link, "");
    assert_eq!(feeds[1].folder_id, None);
    assert_eq!(feeds[1].feed_link, "");
}

#[tokio::test]
async fn test_list_items_sends_query() {
    let (server, backend) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/items"))
        .and(query_param("feed_id", "3"))
        .and(query_param("status", "unread"))
        .and(query_param("search", "rust async"))
        .and(query_param("after", "10"))
        .respond_with(ok().set_body_json(json!({
            "list": [
                { "id": 11, "feed_id": 3, "title": "One", "link": "https://blog.example/1",
                  "date": "2024-03-01T10:00:00Z", "status": "unread" },
                { "id": 12, "feed_id": 3, "title": null, "status": "unread" },
            ],
            "has_more": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let query = ItemQuery {
        feed_id: Some(3),
        status: Some(ItemStatus::Unread),
        search: Some("rust async".to_string()),
        after: Some(10),
        ..ItemQuery::default()
    };
    let page = backend.list_items(&query).await.unwrap();

    assert_eq!(page.has_more, Some(true));
    assert_eq!(page.page, None);
    assert_eq!(page.list.len(), 2);
    assert_eq!(page.list[0].date.map(|d| d.to_rfc3339()).as_deref(), Some("2024-03-01T10:00:00+00:00"));
    assert_eq!(page.list[1].title, "");
}

#[tokio::test]
async fn test_list_items_page_mode() {
    let (server, backend) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/items"))
        .and(query_param("page", "2"))
        .and(query_param("oldest_first", "true"))
        .respond_with(ok().set_body_json(json!({
            "list": [],
            "page": { "cur": 2, "num": 5 },
        })))
        .mount(&server)
        .await;

    let query = ItemQuery {
        page: Some(2),
        oldest_first: true,
        ..ItemQuery::default()
    };
    let page = backend.list_items(&query).await.unwrap();
    assert_eq!(page.page.map(|p| (p.cur, p.num)), Some((2, 5)));
    assert_eq!(page.has_more, None);
}

#[tokio::test]
async fn test_get_item_with_media() {
    let (server, backend) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/items/7"))
        .respond_with(ok().set_body_json(json!({
            "id": 7, "feed_id": 3, "title": "Episode", "status": "starred",
            "content": "<p>Show notes</p>",
            "media_links": [
                { "url": "https://cdn.example/ep.mp3", "type": "audio" },
                { "url": "https://cdn.example/cover.jpg", "type": "image", "description": "Cover" },
                { "url": "https://cdn.example/x.bin", "type": "torrent" },
            ],
        })))
        .mount(&server)
        .await;

    let item = backend.get_item(7).await.unwrap();
    assert_eq!(item.status, ItemStatus::Starred);
    assert_eq!(item.content.as_deref(), Some("<p>Show notes</p>"));
    assert_eq!(item.media_links[2].kind, MediaKind::Other);

    let media = item.media_partition();
    assert_eq!(media.audios.len(), 1);
    assert_eq!(media.images[0].description.as_deref(), Some("Cover"));
    assert!(media.videos.is_empty());
}

#[tokio::test]
async fn test_status_accepts_running_count() {
    let (server, backend) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ok().set_body_json(json!({
            "running": 2,
            "stats": [{ "feed_id": 3, "unread": 5, "starred": 1 }],
        })))
        .mount(&server)
        .await;

    let status = backend.status().await.unwrap();
    assert!(status.running);
    assert_eq!(status.stats[0].unread, 5);
}

#[tokio::test]
async fn test_feed_errors_keys_become_ids() {
    let (server, backend) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/feeds/errors"))
        .respond_with(ok().set_body_json(json!({
            "3": "connection timed out",
            "bogus": "ignored",
        })))
        .mount(&server)
        .await;

    let errors = backend.list_feed_errors().await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[&3], "connection timed out");
}

#[tokio::test]
async fn test_settings_round_trip() {
    let (server, backend) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/settings"))
        .respond_with(ok().set_body_json(json!({
            "filter": "unread",
            "feed": "folder:2",
            "sort_newest_first": false,
            "theme_name": "sepia",
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/settings"))
        .and(header("x-requested-by", "rill"))
        .and(body_json(json!({ "feed": null, "item_list_width": 420 })))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;

    let settings = backend.get_settings().await.unwrap();
    assert_eq!(settings.filter, StatusFilter::Unread);
    assert_eq!(settings.selection(), Some(rill::model::Selection::Folder(2)));
    assert!(!settings.sort_newest_first);
    assert_eq!(settings.theme().name, "sepia");
    assert_eq!(settings.theme().size, 1.0);

    let update = SettingsUpdate {
        feed: Some(None),
        item_list_width: Some(420),
        ..SettingsUpdate::default()
    };
    backend.update_settings(&update).await.unwrap();
}

// ============================================================================
// Writes
// ============================================================================

#[tokio::test]
async fn test_update_item_sends_status_with_header() {
    let (server, backend) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/items/5"))
        .and(header("x-requested-by", "rill"))
        .and(body_json(json!({ "status": "read" })))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;

    backend.update_item(5, ItemStatus::Read).await.unwrap();
}

#[tokio::test]
async fn test_mark_read_uses_query_string() {
    let (server, backend) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/items"))
        .and(query_param("folder_id", "2"))
        .and(query_param("status", "unread"))
        .and(header("x-requested-by", "rill"))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;

    let query = ItemQuery {
        folder_id: Some(2),
        status: Some(ItemStatus::Unread),
        ..ItemQuery::default()
    };
    backend.mark_read(&query).await.unwrap();
}

#[tokio::test]
async fn test_folder_and_feed_edits() {
    let (server, backend) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/folders"))
        .and(body_json(json!({ "title": "Later" })))
        .respond_with(ok().set_body_json(json!({ "id": 9, "title": "Later", "is_expanded": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/folders/9"))
        .and(body_json(json!({ "is_expanded": false })))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/feeds/3"))
        .and(body_json(json!({ "folder_id": null })))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/feeds/3"))
        .and(header("x-requested-by", "rill"))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/feeds/refresh"))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;

    let folder = backend.create_folder("Later").await.unwrap();
    assert_eq!(folder.id, 9);
    let collapse = FolderUpdate {
        is_expanded: Some(false),
        ..FolderUpdate::default()
    };
    backend.update_folder(9, &collapse).await.unwrap();
    let unfile = FeedUpdate {
        folder_id: Some(None),
        ..FeedUpdate::default()
    };
    backend.update_feed(3, &unfile).await.unwrap();
    backend.delete_feed(3).await.unwrap();
    backend.refresh_feeds().await.unwrap();
}

#[tokio::test]
async fn test_create_feed_outcomes() {
    let (server, backend) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/feeds"))
        .and(body_json(json!({ "url": "https://one.example", "folder_id": null })))
        .respond_with(ok().set_body_json(json!({
            "status": "success",
            "feed": { "id": 20, "title": "One", "folder_id": null },
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/feeds"))
        .and(body_json(json!({ "url": "https://many.example", "folder_id": 2 })))
        .respond_with(ok().set_body_json(json!({
            "status": "multiple",
            "choice": [
                { "url": "https://many.example/atom", "title": "Atom" },
                { "url": "https://many.example/rss", "title": "RSS" },
            ],
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/feeds"))
        .and(body_json(json!({ "url": "https://none.example", "folder_id": null })))
        .respond_with(ok().set_body_json(json!({ "status": "notfound" })))
        .mount(&server)
        .await;

    let create = |url: &str, folder_id| FeedCreate {
        url: url.to_string(),
        folder_id,
    };

    match backend.create_feed(&create("https://one.example", None)).await.unwrap() {
        FeedCreateOutcome::Success { feed } => assert_eq!(feed.id, 20),
        other => panic!("unexpected outcome {:?}", other),
    }
    match backend.create_feed(&create("https://many.example", Some(2))).await.unwrap() {
        FeedCreateOutcome::Multiple { choice } => assert_eq!(choice.len(), 2),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(
        backend.create_feed(&create("https://none.example", None)).await.unwrap(),
        FeedCreateOutcome::NotFound
    );
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let (server, backend) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/items/5"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = backend.update_item(5, ItemStatus::Starred).await.unwrap_err();
    assert!(matches!(err, BackendError::HttpStatus(500)));

    // Nothing mounted for this path
    let err = backend.get_item(1).await.unwrap_err();
    assert!(matches!(err, BackendError::HttpStatus(404)));
}

#[tokio::test]
async fn test_malformed_body_is_a_decode_error() {
    let (server, backend) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/folders"))
        .respond_with(ok().set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let err = backend.list_folders().await.unwrap_err();
    assert!(matches!(err, BackendError::Decode(_)));
}

#[tokio::test]
async fn test_oversized_response_is_rejected() {
    let (server, backend) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/items"))
        .respond_with(ok().set_body_string("x".repeat(16 * 1024 * 1024 + 1)))
        .mount(&server)
        .await;

    let err = backend.list_items(&ItemQuery::default()).await.unwrap_err();
    assert!(matches!(err, BackendError::ResponseTooLarge(_)));
}
