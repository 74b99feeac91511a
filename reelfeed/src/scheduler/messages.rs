//! Inbound scheduler messages
//!
//! Everything that can change scheduler state arrives as one of these, on one
//! channel, and is handled in arrival order by the scheduler task.

use super::diagnostics::SchedulerSnapshot;
use crate::feed::{FeedFilter, MediaItem, Page};
use crate::playback::{EngineEvent, SlotId, SurfaceHandle};
use crate::Result;
use tokio::sync::oneshot;

/// Commands issued by the view layer and by controls
#[derive(Debug)]
pub(crate) enum FeedCommand {
    OpenSession {
        filter: FeedFilter,
        items: Vec<MediaItem>,
        start: usize,
        cursor: Option<String>,
    },
    PositionSelected(usize),
    RowAttached {
        position: usize,
        surface: SurfaceHandle,
    },
    RowDetached(usize),
    ToggleMute,
    TogglePlayPause,
    SeekFraction(f32),
    SetAutoAdvance(bool),
    ChangeFilter(FeedFilter),
    Hide,
    Show,
    EnterBackground,
    EnterForeground,
    CloseSession,
    Snapshot(oneshot::Sender<SchedulerSnapshot>),
    Shutdown,
}

/// Message consumed by the scheduler task
#[derive(Debug)]
pub(crate) enum SchedulerMessage {
    Command(FeedCommand),

    /// State notification from the engine of `slot_id`
    Engine {
        slot_id: SlotId,
        /// Binding epoch of the slot when the engine emitted the event
        epoch: u64,
        event: EngineEvent,
    },

    /// Play URL resolution finished for the binding identified by `epoch`
    UrlResolved {
        slot_id: SlotId,
        epoch: u64,
        position: usize,
        item_id: String,
        result: Result<String>,
    },

    /// Pagination fetch finished
    PageFetched {
        generation: u64,
        requested_cursor: String,
        result: Result<Page>,
    },

    /// First page for a new filter arrived
    FilterFetched {
        request: u64,
        filter: FeedFilter,
        result: Result<Page>,
    },

    /// Periodic progress poll for the foreground clip
    ProgressTick { position: usize, ticket: u64 },

    /// Grace delay after foreground PLAYING elapsed
    RevealSurface { slot_id: SlotId, epoch: u64 },
}
