//! Feed item types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind discriminator for a feed item
///
/// Clips are finite and seekable: promotion rewinds them and ENDED loops them.
/// Live channels are never seeked and ENDED marks them as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Clip,
    Live,
}

impl ItemKind {
    /// True for kinds that support seeking and progress display
    pub fn is_seekable(self) -> bool {
        matches!(self, ItemKind::Clip)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Clip => write!(f, "clip"),
            ItemKind::Live => write!(f, "live"),
        }
    }
}

/// One entry of the swipeable feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Stable identifier, used for de-duplication across pages
    pub id: String,

    /// Play URL if the source already knows it
    #[serde(default)]
    pub play_url: Option<String>,

    pub kind: ItemKind,
}

impl MediaItem {
    pub fn clip(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            play_url: None,
            kind: ItemKind::Clip,
        }
    }

    pub fn live(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            play_url: None,
            kind: ItemKind::Live,
        }
    }

    /// Attach a known play URL
    pub fn with_play_url(mut self, url: impl Into<String>) -> Self {
        self.play_url = Some(url.into());
        self
    }
}

/// Query parameters for a feed list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedFilter {
    pub category: String,
    pub sort: String,
}

impl FeedFilter {
    pub fn new(category: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            sort: sort.into(),
        }
    }
}

impl Default for FeedFilter {
    fn default() -> Self {
        Self::new("all", "featured")
    }
}

impl fmt::Display for FeedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.sort)
    }
}

/// One page returned by an item source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<MediaItem>,

    /// Cursor for the next page; None when the source has nothing further
    pub next_cursor: Option<String>,
}

impl Page {
    pub fn new(items: Vec<MediaItem>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }
}
