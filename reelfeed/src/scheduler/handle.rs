//! Cloneable command handle for a running scheduler

use super::diagnostics::SchedulerSnapshot;
use super::messages::{FeedCommand, SchedulerMessage};
use crate::error::{Error, Result};
use crate::feed::{FeedFilter, MediaItem};
use crate::playback::SurfaceHandle;
use reelfeed_common::{EventBus, FeedEvent};
use tokio::sync::{broadcast, mpsc, oneshot};

/// Sends view events and controls to the scheduler task
///
/// Commands are handled in the order they are sent. Every method fails with
/// [`Error::SchedulerClosed`] once the scheduler has shut down.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<SchedulerMessage>,
    events: EventBus,
}

impl SchedulerHandle {
    pub(super) fn new(tx: mpsc::UnboundedSender<SchedulerMessage>, events: EventBus) -> Self {
        Self { tx, events }
    }

    fn send(&self, command: FeedCommand) -> Result<()> {
        self.tx
            .send(SchedulerMessage::Command(command))
            .map_err(|_| Error::SchedulerClosed)
    }

    /// Open a feed with its first page and start playing at `start`
    pub fn open_session(
        &self,
        filter: FeedFilter,
        items: Vec<MediaItem>,
        start: usize,
        cursor: Option<String>,
    ) -> Result<()> {
        self.send(FeedCommand::OpenSession {
            filter,
            items,
            start,
            cursor,
        })
    }

    /// The list settled on `position`
    pub fn position_selected(&self, position: usize) -> Result<()> {
        self.send(FeedCommand::PositionSelected(position))
    }

    pub fn row_attached(&self, position: usize, surface: SurfaceHandle) -> Result<()> {
        self.send(FeedCommand::RowAttached { position, surface })
    }

    pub fn row_detached(&self, position: usize) -> Result<()> {
        self.send(FeedCommand::RowDetached(position))
    }

    pub fn toggle_mute(&self) -> Result<()> {
        self.send(FeedCommand::ToggleMute)
    }

    pub fn toggle_play_pause(&self) -> Result<()> {
        self.send(FeedCommand::TogglePlayPause)
    }

    /// Seek the foreground clip; `fraction` is clamped to 0.0..=1.0
    pub fn seek_fraction(&self, fraction: f32) -> Result<()> {
        self.send(FeedCommand::SeekFraction(fraction))
    }

    pub fn set_auto_advance(&self, enabled: bool) -> Result<()> {
        self.send(FeedCommand::SetAutoAdvance(enabled))
    }

    /// Reload the feed for a new filter
    pub fn change_filter(&self, filter: FeedFilter) -> Result<()> {
        self.send(FeedCommand::ChangeFilter(filter))
    }

    pub fn hide(&self) -> Result<()> {
        self.send(FeedCommand::Hide)
    }

    pub fn show(&self) -> Result<()> {
        self.send(FeedCommand::Show)
    }

    pub fn enter_background(&self) -> Result<()> {
        self.send(FeedCommand::EnterBackground)
    }

    pub fn enter_foreground(&self) -> Result<()> {
        self.send(FeedCommand::EnterForeground)
    }

    pub fn close_session(&self) -> Result<()> {
        self.send(FeedCommand::CloseSession)
    }

    /// Close the session, release all engines and stop the scheduler task
    pub fn shutdown(&self) -> Result<()> {
        self.send(FeedCommand::Shutdown)
    }

    /// Snapshot taken after every command sent before this call
    pub async fn snapshot(&self) -> Result<SchedulerSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(FeedCommand::Snapshot(reply))?;
        rx.await.map_err(|_| Error::SchedulerClosed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
