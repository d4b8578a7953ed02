use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use super::{
    Backend, BackendError, FeedCreate, FeedCreateOutcome, FeedUpdate, FolderUpdate, ItemPage,
    ItemQuery, Result, ServerStatus,
};
use crate::model::{Feed, Folder, Item, ItemStatus, Settings, SettingsUpdate};

/// Largest response body accepted from the server (16 MB).
const MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

/// Header sent on every mutating request so the server can reject
/// cross-site form posts.
const REQUESTED_BY: (&str, &str) = ("x-requested-by", "rill");

/// [`Backend`] over the server's JSON API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base: Url,
}

impl HttpBackend {
    /// `base` must end with `/` so API paths resolve underneath it.
    pub fn new(base: Url, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?, base))
    }

    pub fn with_client(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }

    fn url(&self, path: &str, query: &[(&'static str, String)]) -> Result<Url> {
        let mut url = self.base.join(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Send a request and return the (size-limited) body text.
    async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<&B>,
    ) -> Result<String> {
        let url = self.url(path, query)?;
        let mutating = method != Method::GET;
        tracing::debug!(%method, %url, "Backend request");

        let mut request = self.client.request(method, url);
        if mutating {
            request = request.header(REQUESTED_BY.0, REQUESTED_BY.1);
        }
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(serde_json::to_vec(body)?);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(BackendError::HttpStatus(response.status().as_u16()));
        }
        read_limited_text(response, MAX_RESPONSE_SIZE).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<T> {
        let text = self.execute::<()>(Method::GET, path, query, None).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn send<B: Serialize + ?Sized>(&self, method: Method, path: &str, body: &B) -> Result<()> {
        self.execute(method, path, &[], Some(body)).await?;
        Ok(())
    }

    async fn send_for<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let text = self.execute(method, path, &[], Some(body)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.execute::<()>(Method::DELETE, path, &[], None).await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_folders(&self) -> Result<Vec<Folder>> {
        self.get("api/folders", &[]).await
    }

    async fn create_folder(&self, title: &str) -> Result<Folder> {
        self.send_for(Method::POST, "api/folders", &serde_json::json!({ "title": title }))
            .await
    }

    async fn update_folder(&self, id: i64, update: &FolderUpdate) -> Result<()> {
        self.send(Method::PUT, &format!("api/folders/{}", id), update).await
    }

    async fn delete_folder(&self, id: i64) -> Result<()> {
        self.delete(&format!("api/folders/{}", id)).await
    }

    async fn list_feeds(&self) -> Result<Vec<Feed>> {
        self.get("api/feeds", &[]).await
    }

    async fn create_feed(&self, feed: &FeedCreate) -> Result<FeedCreateOutcome> {
        self.send_for(Method::POST, "api/feeds", feed).await
    }

    async fn update_feed(&self, id: i64, update: &FeedUpdate) -> Result<()> {
        self.send(Method::PUT, &format!("api/feeds/{}", id), update).await
    }

    async fn delete_feed(&self, id: i64) -> Result<()> {
        self.delete(&format!("api/feeds/{}", id)).await
    }

    async fn refresh_feeds(&self) -> Result<()> {
        self.execute::<()>(Method::POST, "api/feeds/refresh", &[], None)
            .await?;
        Ok(())
    }

    async fn list_feed_errors(&self) -> Result<HashMap<i64, String>> {
        // JSON object keys are strings; ids that do not parse are dropped.
        let raw: HashMap<String, String> = self.get("api/feeds/errors", &[]).await?;
        Ok(raw
            .into_iter()
            .filter_map(|(id, message)| Some((id.parse().ok()?, message)))
            .collect())
    }

    async fn get_item(&self, id: i64) -> Result<Item> {
        self.get(&format!("api/items/{}", id), &[]).await
    }

    async fn list_items(&self, query: &ItemQuery) -> Result<ItemPage> {
        self.get("api/items", &query.to_pairs()).await
    }

    async fn update_item(&self, id: i64, status: ItemStatus) -> Result<()> {
        self.send(
            Method::PUT,
            &format!("api/items/{}", id),
            &serde_json::json!({ "status": status }),
        )
        .await
    }

    async fn mark_read(&self, query: &ItemQuery) -> Result<()> {
        self.execute::<()>(Method::PUT, "api/items", &query.to_pairs(), None)
            .await?;
        Ok(())
    }

    async fn get_settings(&self) -> Result<Settings> {
        self.get("api/settings", &[]).await
    }

    async fn update_settings(&self, update: &SettingsUpdate) -> Result<()> {
        self.send(Method::PUT, "api/settings", update).await
    }

    async fn status(&self) -> Result<ServerStatus> {
        self.get("api/status", &[]).await
    }
}

/// Read a response body, refusing anything larger than `limit` bytes.
async fn read_limited_text(response: reqwest::Response, limit: usize) -> Result<String> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(BackendError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(BackendError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
