//! In-memory item source

use super::engine::EngineCall;
use crate::error::{Error, Result};
use crate::feed::{FeedFilter, ItemKind, MediaItem, Page};
use crate::source::ItemSource;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type PageKey = (String, Option<String>);

#[derive(Default)]
struct SourceState {
    /// Pages by (filter category, cursor)
    pages: HashMap<PageKey, Page>,
    failing_cursors: HashSet<String>,
    failing_items: HashSet<String>,
    resolve_delays: HashMap<String, Duration>,
    fetch_log: Vec<(FeedFilter, Option<String>)>,
    resolve_log: Vec<String>,
}

/// Item source backed by in-memory pages
///
/// Play URLs resolve to `sim://<kind>/<id>`.
#[derive(Default)]
pub struct SimSource {
    state: Mutex<SourceState>,
    fetch_latency: Duration,
    resolve_latency: Duration,
}

impl SimSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied to every page fetch and URL resolution
    pub fn with_latency(mut self, fetch: Duration, resolve: Duration) -> Self {
        self.fetch_latency = fetch;
        self.resolve_latency = resolve;
        self
    }

    /// Build a paginated feed of `total` items split into pages of `page_size`
    ///
    /// Items are named `<prefix>-<n>`; cursors are `<prefix>-page-<n>`.
    pub fn paginated(
        filter: &FeedFilter,
        prefix: &str,
        kind: ItemKind,
        total: usize,
        page_size: usize,
    ) -> Self {
        let source = Self::new();
        source.add_paginated(filter, prefix, kind, total, page_size);
        source
    }

    /// Register the pages of a generated feed for `filter`
    pub fn add_paginated(
        &self,
        filter: &FeedFilter,
        prefix: &str,
        kind: ItemKind,
        total: usize,
        page_size: usize,
    ) {
        let page_size = page_size.max(1);
        let page_count = total.div_ceil(page_size).max(1);
        for page_index in 0..page_count {
            let items = (page_index * page_size..total.min((page_index + 1) * page_size))
                .map(|n| MediaItem {
                    id: format!("{}-{}", prefix, n),
                    play_url: None,
                    kind,
                })
                .collect();
            let cursor = (page_index > 0).then(|| format!("{}-page-{}", prefix, page_index));
            let next = (page_index + 1 < page_count).then(|| format!("{}-page-{}", prefix, page_index + 1));
            self.insert_page(filter, cursor.as_deref(), Page::new(items, next));
        }
    }

    /// Serve `page` for `filter` at `cursor` (None = first page)
    pub fn insert_page(&self, filter: &FeedFilter, cursor: Option<&str>, page: Page) {
        lock(&self.state)
            .pages
            .insert((filter.category.clone(), cursor.map(String::from)), page);
    }

    /// Fetches with this cursor fail
    pub fn fail_cursor(&self, cursor: impl Into<String>) {
        lock(&self.state).failing_cursors.insert(cursor.into());
    }

    /// Play URL resolution for this item fails
    pub fn fail_item(&self, item_id: impl Into<String>) {
        lock(&self.state).failing_items.insert(item_id.into());
    }

    /// Extra resolution delay for one item
    pub fn delay_item(&self, item_id: impl Into<String>, delay: Duration) {
        lock(&self.state)
            .resolve_delays
            .insert(item_id.into(), delay);
    }

    /// Cursors fetched so far, in call order
    pub fn fetched_cursors(&self) -> Vec<Option<String>> {
        lock(&self.state)
            .fetch_log
            .iter()
            .map(|(_, cursor)| cursor.clone())
            .collect()
    }

    /// Filters fetched so far, in call order
    pub fn fetched_filters(&self) -> Vec<FeedFilter> {
        lock(&self.state)
            .fetch_log
            .iter()
            .map(|(filter, _)| filter.clone())
            .collect()
    }

    /// Item ids resolved so far, in call order
    pub fn resolved_items(&self) -> Vec<String> {
        lock(&self.state).resolve_log.clone()
    }

    /// URL this source resolves for `item`
    pub fn play_url_for(item: &MediaItem) -> String {
        format!("sim://{}/{}", item.kind, item.id)
    }

    /// Engine call that loading `item` produces
    pub fn load_call_for(item: &MediaItem) -> EngineCall {
        EngineCall::Load(Self::play_url_for(item))
    }
}

#[async_trait]
impl ItemSource for SimSource {
    async fn fetch_page(&self, filter: &FeedFilter, cursor: Option<&str>) -> Result<Page> {
        let outcome = {
            let mut state = lock(&self.state);
            state
                .fetch_log
                .push((filter.clone(), cursor.map(String::from)));
            if cursor.is_some_and(|c| state.failing_cursors.contains(c)) {
                Err(Error::Source(format!("fetch of {:?} failed", cursor)))
            } else {
                state
                    .pages
                    .get(&(filter.category.clone(), cursor.map(String::from)))
                    .cloned()
                    .ok_or_else(|| {
                        Error::Source(format!("no page for {} at {:?}", filter, cursor))
                    })
            }
        };

        if !self.fetch_latency.is_zero() {
            tokio::time::sleep(self.fetch_latency).await;
        }
        debug!("Served page for {} at {:?}", filter, cursor);
        outcome
    }

    async fn resolve_play_url(&self, item: &MediaItem) -> Result<String> {
        let (failing, delay) = {
            let mut state = lock(&self.state);
            state.resolve_log.push(item.id.clone());
            (
                state.failing_items.contains(&item.id),
                state.resolve_delays.get(&item.id).copied(),
            )
        };

        let delay = delay.unwrap_or(self.resolve_latency);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if failing {
            return Err(Error::Resolve {
                item_id: item.id.clone(),
                reason: "no playable stream".to_string(),
            });
        }
        Ok(Self::play_url_for(item))
    }
}
