//! # ReelFeed Scheduler Library (reelfeed)
//!
//! Bounded player-pool scheduler for a swipeable media feed.
//!
//! **Purpose:** Multiplex a small fixed pool of playback engines across the
//! feed positions the user is near: one foreground engine at the current
//! position, muted preloads on its neighbors, eviction of engines the user has
//! scrolled away from, last-frame caching for seamless transitions and
//! pagination as the end of the list approaches.
//!
//! **Architecture:** A single scheduler task owns all state and consumes one
//! inbound message channel. View events, controls, engine state changes and
//! the results of async work (URL resolution, page fetches, timers) all arrive
//! on that channel.

pub mod error;
pub mod feed;
pub mod playback;
pub mod scheduler;
pub mod sim;
pub mod source;
pub mod view;

pub use error::{Error, Result};
pub use feed::{FeedFilter, FeedSession, ItemKind, MediaItem, Page};
pub use playback::{EngineEvent, EngineFactory, EngineState, PlaybackEngine, SlotId, SurfaceHandle};
pub use scheduler::{Scheduler, SchedulerHandle, SchedulerSnapshot};
pub use source::ItemSource;
pub use view::FeedView;
