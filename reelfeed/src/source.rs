//! Item source seam
//!
//! The scheduler never talks to the network itself. Pages and play URLs come
//! from an `ItemSource`; both calls run on spawned tasks and their results are
//! re-validated by the scheduler before use.

use crate::feed::{FeedFilter, MediaItem, Page};
use crate::Result;
use async_trait::async_trait;

/// Provider of feed pages and play URLs
#[async_trait]
pub trait ItemSource: Send + Sync + 'static {
    /// Fetch one page of items for `filter`
    ///
    /// `cursor` is None for the first page of a list.
    async fn fetch_page(&self, filter: &FeedFilter, cursor: Option<&str>) -> Result<Page>;

    /// Resolve the play URL of an item whose `play_url` is unknown
    async fn resolve_play_url(&self, item: &MediaItem) -> Result<String>;
}
