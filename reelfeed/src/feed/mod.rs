//! Feed data: items, pages and the paginated session

pub mod item;
pub mod session;

pub use item::{FeedFilter, ItemKind, MediaItem, Page};
pub use session::{AppendOutcome, FeedSession};
