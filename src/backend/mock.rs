//! Scripted in-memory [`Backend`] for session tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{
    Backend, BackendError, FeedCreate, FeedCreateOutcome, FeedUpdate, FolderUpdate, ItemPage,
    ItemQuery, PageInfo, Result, ServerStatus,
};
use crate::model::{Feed, FeedStat, Folder, Item, ItemStatus, Settings, SettingsUpdate};
use crate::pagination::ListingMode;

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    ListFolders,
    CreateFolder(String),
    UpdateFolder(i64, FolderUpdate),
    DeleteFolder(i64),
    ListFeeds,
    CreateFeed(FeedCreate),
    UpdateFeed(i64, FeedUpdate),
    DeleteFeed(i64),
    RefreshFeeds,
    ListFeedErrors,
    GetItem(i64),
    ListItems(ItemQuery),
    UpdateItem(i64, ItemStatus),
    MarkRead(ItemQuery),
    GetSettings,
    UpdateSettings(SettingsUpdate),
    Status,
}

#[derive(Debug)]
pub(crate) struct MockState {
    pub folders: Vec<Folder>,
    pub feeds: Vec<Feed>,
    pub items: Vec<Item>,
    pub settings: Settings,
    pub feed_errors: HashMap<i64, String>,
    pub page_size: usize,
    pub mode: ListingMode,
    /// Remaining `status` responses that report a running refresh.
    pub running_polls: usize,
    pub create_feed_outcome: Option<FeedCreateOutcome>,
    pub fail_updates: bool,
    pub fail_lists: bool,
    /// Delay applied to `list_items` for a given feed id.
    pub list_delay: HashMap<i64, Duration>,
    pub calls: Vec<Call>,
    /// Last id handed out to a created entity.
    pub next_id: i64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            folders: Vec::new(),
            feeds: Vec::new(),
            items: Vec::new(),
            settings: Settings::default(),
            feed_errors: HashMap::new(),
            page_size: 20,
            mode: ListingMode::Cursor,
            running_polls: 0,
            create_feed_outcome: None,
            fail_updates: false,
            fail_lists: false,
            list_delay: HashMap::new(),
            calls: Vec::new(),
            next_id: 1000,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new(state: MockState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) -> MutexGuard<'_, MockState> {
        let mut state = self.state();
        state.calls.push(call);
        state
    }

    fn rejected(op: &str) -> BackendError {
        BackendError::Rejected(format!("{} refused by mock", op))
    }
}

fn matches_query(state: &MockState, item: &Item, query: &ItemQuery) -> bool {
    if query.feed_id.is_some_and(|id| item.feed_id != id) {
        return false;
    }
    if let Some(folder_id) = query.folder_id {
        let in_folder = state
            .feeds
            .iter()
            .any(|f| f.id == item.feed_id && f.folder_id == Some(folder_id));
        if !in_folder {
            return false;
        }
    }
    if query.status.is_some_and(|s| item.status != s) {
        return false;
    }
    if let Some(search) = &query.search {
        if !item.title.to_lowercase().contains(&search.to_lowercase()) {
            return false;
        }
    }
    true
}

fn page_of(state: &MockState, query: &ItemQuery) -> ItemPage {
    let mut matching: Vec<&Item> = state
        .items
        .iter()
        .filter(|i| matches_query(state, i, query))
        .collect();
    if query.oldest_first {
        matching.reverse();
    }

    match state.mode {
        ListingMode::Cursor => {
            let start = match query.after {
                Some(after) => matching
                    .iter()
                    .position(|i| i.id == after)
                    .map_or(matching.len(), |p| p + 1),
                None => 0,
            };
            let rest = &matching[start..];
            let list: Vec<Item> = rest.iter().take(state.page_size).map(|i| (*i).clone()).collect();
            ItemPage {
                has_more: Some(rest.len() > list.len()),
                list,
                page: None,
            }
        }
        ListingMode::Page => {
            let num = matching.len().div_ceil(state.page_size).max(1) as u32;
            let cur = query.page.unwrap_or(1);
            let list = matching
                .iter()
                .skip((cur as usize - 1) * state.page_size)
                .take(state.page_size)
                .map(|i| (*i).clone())
                .collect();
            ItemPage {
                list,
                has_more: None,
                page: Some(PageInfo { cur, num }),
            }
        }
    }
}

fn stats_of(state: &MockState) -> Vec<FeedStat> {
    state
        .feeds
        .iter()
        .map(|feed| {
            let mut stat = FeedStat {
                feed_id: feed.id,
                unread: 0,
                starred: 0,
            };
            for item in state.items.iter().filter(|i| i.feed_id == feed.id) {
                if let Some(count) = stat.count_mut(item.status) {
                    *count += 1;
                }
            }
            stat
        })
        .collect()
}

#[async_trait]
impl Backend for MockBackend {
    async fn list_folders(&self) -> Result<Vec<Folder>> {
        Ok(self.record(Call::ListFolders).folders.clone())
    }

    async fn create_folder(&self, title: &str) -> Result<Folder> {
        let mut state = self.record(Call::CreateFolder(title.to_string()));
        if state.fail_updates {
            return Err(Self::rejected("create_folder"));
        }
        state.next_id += 1;
        let folder = Folder {
            id: state.next_id,
            title: title.to_string(),
            is_expanded: true,
        };
        state.folders.push(folder.clone());
        Ok(folder)
    }

    async fn update_folder(&self, id: i64, update: &FolderUpdate) -> Result<()> {
        let mut state = self.record(Call::UpdateFolder(id, update.clone()));
        if state.fail_updates {
            return Err(Self::rejected("update_folder"));
        }
        if let Some(folder) = state.folders.iter_mut().find(|f| f.id == id) {
            if let Some(title) = &update.title {
                folder.title = title.clone();
            }
            if let Some(expanded) = update.is_expanded {
                folder.is_expanded = expanded;
            }
        }
        Ok(())
    }

    async fn delete_folder(&self, id: i64) -> Result<()> {
        let mut state = self.record(Call::DeleteFolder(id));
        if state.fail_updates {
            return Err(Self::rejected("delete_folder"));
        }
        state.folders.retain(|f| f.id != id);
        for feed in state.feeds.iter_mut().filter(|f| f.folder_id == Some(id)) {
            feed.folder_id = None;
        }
        Ok(())
    }

    async fn list_feeds(&self) -> Result<Vec<Feed>> {
        Ok(self.record(Call::ListFeeds).feeds.clone())
    }

    async fn create_feed(&self, feed: &FeedCreate) -> Result<FeedCreateOutcome> {
        let mut state = self.record(Call::CreateFeed(feed.clone()));
        if state.fail_updates {
            return Err(Self::rejected("create_feed"));
        }
        let outcome = state.create_feed_outcome.clone().unwrap_or(FeedCreateOutcome::NotFound);
        if let FeedCreateOutcome::Success { feed } = &outcome {
            state.feeds.push(feed.clone());
        }
        Ok(outcome)
    }

    async fn update_feed(&self, id: i64, update: &FeedUpdate) -> Result<()> {
        let mut state = self.record(Call::UpdateFeed(id, update.clone()));
        if state.fail_updates {
            return Err(Self::rejected("update_feed"));
        }
        if let Some(feed) = state.feeds.iter_mut().find(|f| f.id == id) {
            if let Some(title) = &update.title {
                feed.title = title.clone();
            }
            if let Some(link) = &update.feed_link {
                feed.feed_link = link.clone();
            }
            if let Some(folder_id) = update.folder_id {
                feed.folder_id = folder_id;
            }
        }
        Ok(())
    }

    async fn delete_feed(&self, id: i64) -> Result<()> {
        let mut state = self.record(Call::DeleteFeed(id));
        if state.fail_updates {
            return Err(Self::rejected("delete_feed"));
        }
        state.feeds.retain(|f| f.id != id);
        state.items.retain(|i| i.feed_id != id);
        Ok(())
    }

    async fn refresh_feeds(&self) -> Result<()> {
        let mut state = self.record(Call::RefreshFeeds);
        if state.running_polls == 0 {
            state.running_polls = 1;
        }
        Ok(())
    }

    async fn list_feed_errors(&self) -> Result<HashMap<i64, String>> {
        Ok(self.record(Call::ListFeedErrors).feed_errors.clone())
    }

    async fn get_item(&self, id: i64) -> Result<Item> {
        let state = self.record(Call::GetItem(id));
        state
            .items
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or(BackendError::HttpStatus(404))
    }

    async fn list_items(&self, query: &ItemQuery) -> Result<ItemPage> {
        let (page, delay) = {
            let state = self.record(Call::ListItems(query.clone()));
            if state.fail_lists {
                return Err(Self::rejected("list_items"));
            }
            let delay = query.feed_id.and_then(|id| state.list_delay.get(&id).copied());
            (page_of(&state, query), delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(page)
    }

    async fn update_item(&self, id: i64, status: ItemStatus) -> Result<()> {
        let mut state = self.record(Call::UpdateItem(id, status));
        if state.fail_updates {
            return Err(Self::rejected("update_item"));
        }
        if let Some(item) = state.items.iter_mut().find(|i| i.id == id) {
            item.status = status;
        }
        Ok(())
    }

    async fn mark_read(&self, query: &ItemQuery) -> Result<()> {
        let mut state = self.record(Call::MarkRead(query.clone()));
        if state.fail_updates {
            return Err(Self::rejected("mark_read"));
        }
        let ids: HashSet<i64> = state
            .items
            .iter()
            .filter(|i| i.status == ItemStatus::Unread && matches_query(&state, i, query))
            .map(|i| i.id)
            .collect();
        for item in state.items.iter_mut().filter(|i| ids.contains(&i.id)) {
            item.status = ItemStatus::Read;
        }
        Ok(())
    }

    async fn get_settings(&self) -> Result<Settings> {
        Ok(self.record(Call::GetSettings).settings.clone())
    }

    async fn update_settings(&self, update: &SettingsUpdate) -> Result<()> {
        let mut state = self.record(Call::UpdateSettings(update.clone()));
        if state.fail_updates {
            return Err(Self::rejected("update_settings"));
        }
        Ok(())
    }

    async fn status(&self) -> Result<ServerStatus> {
        let mut state = self.record(Call::Status);
        let running = state.running_polls > 0;
        state.running_polls = state.running_polls.saturating_sub(1);
        Ok(ServerStatus {
            running,
            stats: stats_of(&state),
        })
    }
}
