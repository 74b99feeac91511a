//! Paginated feed session
//!
//! **Responsibilities:**
//! - Hold the ordered item list in swipe order
//! - Track the pagination cursor and the `has_more` / `loading` flags
//! - De-duplicate appended pages by item id
//! - Decide when a pagination round should start
//!
//! A pagination round starts with [`FeedSession::begin_round`] and ends when
//! [`FeedSession::append_page`] returns anything but
//! [`AppendOutcome::RetryWithCursor`], or when [`FeedSession::fail_fetch`] is
//! called. At most one automatic retry happens per round.

use super::item::{FeedFilter, MediaItem};
use std::collections::HashSet;
use std::ops::Range;
use uuid::Uuid;

/// Result of applying a fetched page to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// New items were appended at `range`
    Appended { range: Range<usize> },

    /// Page held only known items but a new cursor; fetch again with it
    RetryWithCursor(String),

    /// Retry also produced nothing new; the round ends, `has_more` unchanged
    NothingNew,

    /// Source has nothing further; `has_more` is now false
    Exhausted,
}

/// Ordered item list plus pagination state
#[derive(Debug, Clone)]
pub struct FeedSession {
    id: Uuid,
    filter: FeedFilter,
    items: Vec<MediaItem>,
    known_ids: HashSet<String>,
    cursor: Option<String>,
    has_more: bool,
    loading: bool,
    retry_used: bool,
}

impl FeedSession {
    /// Create a session from the first page of a list
    ///
    /// Duplicate ids in `items` keep their first occurrence.
    pub fn new(filter: FeedFilter, items: Vec<MediaItem>, cursor: Option<String>) -> Self {
        let mut session = Self {
            id: Uuid::new_v4(),
            filter,
            items: Vec::with_capacity(items.len()),
            known_ids: HashSet::new(),
            has_more: cursor.is_some(),
            cursor,
            loading: false,
            retry_used: false,
        };
        session.push_unique(items);
        session
    }

    /// Empty session used while no feed is open
    pub fn empty() -> Self {
        Self::new(FeedFilter::default(), Vec::new(), None)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn filter(&self) -> &FeedFilter {
        &self.filter
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn get(&self, position: usize) -> Option<&MediaItem> {
        self.items.get(position)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Drop every item and reset pagination to its initial state
    pub fn reset(&mut self) {
        self.items.clear();
        self.known_ids.clear();
        self.cursor = None;
        self.has_more = true;
        self.loading = false;
        self.retry_used = false;
    }

    /// True when `current` is within `lookahead` of the end and a fetch may start
    pub fn should_paginate(&self, current: usize, lookahead: usize) -> bool {
        self.has_more && !self.loading && current + lookahead >= self.items.len()
    }

    /// Start a pagination round
    ///
    /// Returns the cursor to fetch with, or None when a round is already in
    /// flight or there is no cursor to continue from.
    pub fn begin_round(&mut self) -> Option<String> {
        if !self.has_more || self.loading {
            return None;
        }
        let cursor = self.cursor.clone()?;
        self.loading = true;
        self.retry_used = false;
        Some(cursor)
    }

    /// Apply a fetched page to the list
    pub fn append_page(
        &mut self,
        items: Vec<MediaItem>,
        next_cursor: Option<String>,
    ) -> AppendOutcome {
        let start = self.items.len();
        self.push_unique(items);
        let end = self.items.len();

        if end > start {
            self.has_more = next_cursor.is_some();
            self.cursor = next_cursor;
            self.loading = false;
            return AppendOutcome::Appended { range: start..end };
        }

        match next_cursor {
            Some(next) if self.cursor.as_deref() != Some(next.as_str()) => {
                self.cursor = Some(next.clone());
                if self.retry_used {
                    self.loading = false;
                    AppendOutcome::NothingNew
                } else {
                    self.retry_used = true;
                    AppendOutcome::RetryWithCursor(next)
                }
            }
            _ => {
                self.has_more = false;
                self.loading = false;
                AppendOutcome::Exhausted
            }
        }
    }

    /// A fetch failed: stop paginating, keep what is loaded
    pub fn fail_fetch(&mut self) {
        self.has_more = false;
        self.loading = false;
    }

    fn push_unique(&mut self, items: Vec<MediaItem>) {
        for item in items {
            if self.known_ids.insert(item.id.clone()) {
                self.items.push(item);
            }
        }
    }
}
