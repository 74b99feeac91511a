//! Pagination and filter changes
//!
//! **Responsibilities:**
//! - Trigger a page fetch when the current position nears the end of the list
//! - Apply fetched pages, including the single duplicate-page retry per round
//! - Fetch the first page of a new filter and replace the session with it
//!
//! Fetch results are tagged with the generation and cursor they were requested
//! for; anything that no longer matches is dropped.

use super::core::Scheduler;
use super::messages::SchedulerMessage;
use crate::error::Result;
use crate::feed::{AppendOutcome, FeedFilter, FeedSession, Page};
use chrono::Utc;
use reelfeed_common::FeedEvent;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl Scheduler {
    pub(super) fn maybe_paginate(&mut self, position: usize) {
        if !self
            .session
            .should_paginate(position, self.config.pagination_lookahead)
        {
            return;
        }
        if let Some(cursor) = self.session.begin_round() {
            debug!("Position {} near end of list, fetching next page", position);
            self.spawn_page_fetch(cursor);
        }
    }

    fn spawn_page_fetch(&mut self, cursor: String) {
        let generation = self.generation;
        let token = self.session_token.child_token();
        let source = Arc::clone(&self.source);
        let filter = self.session.filter().clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let result: Result<Page> = tokio::select! {
                _ = token.cancelled() => return,
                result = source.fetch_page(&filter, Some(cursor.as_str())) => result,
            };
            let _ = tx.send(SchedulerMessage::PageFetched {
                generation,
                requested_cursor: cursor,
                result,
            });
        });
    }

    pub(super) fn on_page_fetched(
        &mut self,
        generation: u64,
        requested_cursor: String,
        result: Result<Page>,
    ) {
        if generation != self.generation
            || !self.session.is_loading()
            || self.session.cursor() != Some(requested_cursor.as_str())
        {
            debug!("Dropping stale page for cursor {}", requested_cursor);
            return;
        }

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                warn!("Pagination failed, no further pages will be requested: {}", e);
                self.session.fail_fetch();
                self.emit(FeedEvent::PaginationFailed {
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                });
                return;
            }
        };

        match self.session.append_page(page.items, page.next_cursor) {
            AppendOutcome::Appended { range } => {
                let appended = range.len();
                info!(
                    "Appended {} items, list now {} (more: {})",
                    appended,
                    self.session.len(),
                    self.session.has_more()
                );
                self.view.items_appended(range);
                self.emit(FeedEvent::PageAppended {
                    appended,
                    total: self.session.len(),
                    has_more: self.session.has_more(),
                    timestamp: Utc::now(),
                });
                // The current position may have been the last one
                if let Some(current) = self.current {
                    self.preload_neighbors(current);
                }
            }
            AppendOutcome::RetryWithCursor(next) => {
                debug!("Page held only known items, retrying with cursor {}", next);
                self.spawn_page_fetch(next);
            }
            AppendOutcome::NothingNew => {
                debug!("Retry page also held only known items, ending round");
            }
            AppendOutcome::Exhausted => {
                info!("Feed source exhausted at {} items", self.session.len());
            }
        }
    }

    /// Fetch the first page for `filter`; the list is replaced when it arrives
    pub(super) fn change_filter(&mut self, filter: FeedFilter) {
        if !self.session_open {
            warn!("Filter change to {} with no open session", filter);
            return;
        }

        self.filter_request += 1;
        let request = self.filter_request;
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        info!("Changing feed filter to {}", filter);

        tokio::spawn(async move {
            let result = source.fetch_page(&filter, None).await;
            let _ = tx.send(SchedulerMessage::FilterFetched {
                request,
                filter,
                result,
            });
        });
    }

    pub(super) fn on_filter_fetched(&mut self, request: u64, filter: FeedFilter, result: Result<Page>) {
        if request != self.filter_request || !self.session_open {
            debug!("Dropping outdated first page for filter {}", filter);
            return;
        }
        match result {
            Ok(page) => {
                let session = FeedSession::new(filter, page.items, page.next_cursor);
                self.replace_session(session);
            }
            Err(e) => {
                warn!("First page for filter {} failed, keeping current list: {}", filter, e);
            }
        }
    }
}
