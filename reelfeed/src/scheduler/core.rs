//! Core scheduler - ownership, message loop and session lifecycle
//!
//! **Responsibilities:**
//! - Scheduler struct definition and construction
//! - Message loop: every state change is handled here, one message at a time
//! - Session lifecycle (open, replace, close, shutdown)
//! - Generation tracking and cancellation of in-flight async work

use super::handle::SchedulerHandle;
use super::messages::{FeedCommand, SchedulerMessage};
use crate::error::Result;
use crate::feed::{FeedFilter, FeedSession, MediaItem};
use crate::playback::{EngineEventSink, EngineFactory, FrameCache, PlayerPool, SurfaceHandle};
use crate::source::ItemSource;
use crate::view::FeedView;
use chrono::Utc;
use reelfeed_common::{EventBus, FeedEvent, SchedulerConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Running progress poller for the foreground clip
pub(super) struct ProgressTask {
    pub(super) position: usize,
    pub(super) ticket: u64,
    pub(super) token: CancellationToken,
}

/// Bounded player-pool feed scheduler
///
/// Exclusively owns the feed session, the player pool and the frame cache.
/// Runs as a single task; see [`Scheduler::spawn`].
pub struct Scheduler {
    pub(super) config: SchedulerConfig,
    pub(super) source: Arc<dyn ItemSource>,
    pub(super) view: Box<dyn FeedView>,
    pub(super) factory: Box<dyn EngineFactory>,

    pub(super) pool: PlayerPool,
    pub(super) session: FeedSession,
    pub(super) frames: FrameCache,

    /// Position of the foreground slot; None when nothing is active
    pub(super) current: Option<usize>,
    pub(super) session_open: bool,

    pub(super) muted: bool,
    pub(super) auto_advance: bool,
    /// False while the feed is hidden behind another screen
    pub(super) visible: bool,
    /// Foreground was playing when the app went to background
    pub(super) paused_by_lifecycle: bool,

    /// Incremented on every open, replace and close
    pub(super) generation: u64,
    /// Parent token of all async work belonging to the current generation
    pub(super) session_token: CancellationToken,
    /// Incremented on every filter change request
    pub(super) filter_request: u64,

    pub(super) progress: Option<ProgressTask>,
    pub(super) next_ticket: u64,

    /// Surfaces of attached rows, by position
    pub(super) surfaces: HashMap<usize, SurfaceHandle>,
    /// Resolved play URLs by item id
    pub(super) url_cache: HashMap<String, String>,

    pub(super) events: EventBus,
    pub(super) tx: mpsc::UnboundedSender<SchedulerMessage>,
    inbox: mpsc::UnboundedReceiver<SchedulerMessage>,
}

impl Scheduler {
    /// Create a scheduler and the handle that drives it
    ///
    /// Engines are not created until the first session opens.
    pub fn new(
        config: SchedulerConfig,
        source: Arc<dyn ItemSource>,
        view: Box<dyn FeedView>,
        factory: Box<dyn EngineFactory>,
    ) -> Result<(Self, SchedulerHandle)> {
        config.validate()?;
        let pool_size = u8::try_from(config.pool_size).map_err(|_| {
            reelfeed_common::Error::Config(format!("pool_size {} too large", config.pool_size))
        })?;

        let (tx, inbox) = mpsc::unbounded_channel();
        let events = EventBus::new(config.event_capacity);
        let handle = SchedulerHandle::new(tx.clone(), events.clone());

        info!(
            "Creating feed scheduler: {} slots, preload radius {}",
            pool_size, config.preload_radius
        );

        let scheduler = Self {
            pool: PlayerPool::new(pool_size),
            session: FeedSession::empty(),
            frames: FrameCache::new(config.frame_cache_radius),
            current: None,
            session_open: false,
            muted: config.start_muted,
            auto_advance: config.auto_advance,
            visible: true,
            paused_by_lifecycle: false,
            generation: 0,
            session_token: CancellationToken::new(),
            filter_request: 0,
            progress: None,
            next_ticket: 0,
            surfaces: HashMap::new(),
            url_cache: HashMap::new(),
            events,
            tx,
            inbox,
            config,
            source,
            view,
            factory,
        };

        Ok((scheduler, handle))
    }

    /// Create a scheduler and run it on a new tokio task
    pub fn spawn(
        config: SchedulerConfig,
        source: Arc<dyn ItemSource>,
        view: Box<dyn FeedView>,
        factory: Box<dyn EngineFactory>,
    ) -> Result<(SchedulerHandle, JoinHandle<()>)> {
        let (scheduler, handle) = Self::new(config, source, view, factory)?;
        let join = tokio::spawn(scheduler.run());
        Ok((handle, join))
    }

    /// Process messages until shutdown
    pub async fn run(mut self) {
        info!("Feed scheduler started");
        while let Some(message) = self.inbox.recv().await {
            if !self.handle_message(message) {
                break;
            }
        }
        info!("Feed scheduler stopped");
    }

    /// Handle every message already queued, without waiting for more
    ///
    /// Returns the number of messages handled.
    pub fn drain_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.inbox.try_recv() {
            handled += 1;
            if !self.handle_message(message) {
                break;
            }
        }
        handled
    }

    /// Returns false when the scheduler should stop
    pub(crate) fn handle_message(&mut self, message: SchedulerMessage) -> bool {
        match message {
            SchedulerMessage::Command(command) => return self.handle_command(command),
            SchedulerMessage::Engine {
                slot_id,
                epoch,
                event,
            } => self.on_engine_event(slot_id, epoch, event),
            SchedulerMessage::UrlResolved {
                slot_id,
                epoch,
                position,
                item_id,
                result,
            } => self.on_url_resolved(slot_id, epoch, position, item_id, result),
            SchedulerMessage::PageFetched {
                generation,
                requested_cursor,
                result,
            } => self.on_page_fetched(generation, requested_cursor, result),
            SchedulerMessage::FilterFetched {
                request,
                filter,
                result,
            } => self.on_filter_fetched(request, filter, result),
            SchedulerMessage::ProgressTick { position, ticket } => {
                self.on_progress_tick(position, ticket)
            }
            SchedulerMessage::RevealSurface { slot_id, epoch } => {
                self.on_reveal_surface(slot_id, epoch)
            }
        }
        true
    }

    fn handle_command(&mut self, command: FeedCommand) -> bool {
        match command {
            FeedCommand::OpenSession {
                filter,
                items,
                start,
                cursor,
            } => self.open_session(filter, items, start, cursor),
            FeedCommand::PositionSelected(position) => self.position_selected(position),
            FeedCommand::RowAttached { position, surface } => self.row_attached(position, surface),
            FeedCommand::RowDetached(position) => self.row_detached(position),
            FeedCommand::ToggleMute => self.toggle_mute(),
            FeedCommand::TogglePlayPause => self.toggle_play_pause(),
            FeedCommand::SeekFraction(fraction) => self.seek_fraction(fraction),
            FeedCommand::SetAutoAdvance(enabled) => self.set_auto_advance(enabled),
            FeedCommand::ChangeFilter(filter) => self.change_filter(filter),
            FeedCommand::Hide => self.hide(),
            FeedCommand::Show => self.show(),
            FeedCommand::EnterBackground => self.enter_background(),
            FeedCommand::EnterForeground => self.enter_foreground(),
            FeedCommand::CloseSession => self.close_session(),
            FeedCommand::Snapshot(reply) => {
                if reply.send(self.snapshot()).is_err() {
                    debug!("Snapshot requester went away");
                }
            }
            FeedCommand::Shutdown => {
                self.shutdown();
                return false;
            }
        }
        true
    }

    /// Install a new item list and navigate to `start`
    pub(super) fn open_session(
        &mut self,
        filter: FeedFilter,
        items: Vec<MediaItem>,
        start: usize,
        cursor: Option<String>,
    ) {
        self.install_session(FeedSession::new(filter, items, cursor));
        self.url_cache.clear();

        let len = self.session.len();
        info!(
            "Opened feed session {} with {} items (filter {})",
            self.session.id(),
            len,
            self.session.filter()
        );
        self.view.list_replaced(len);

        if len == 0 {
            self.emit(FeedEvent::SessionOpened {
                session_id: self.session.id(),
                item_count: 0,
                start_position: 0,
                timestamp: Utc::now(),
            });
            return;
        }

        let start = if start < len {
            start
        } else {
            warn!("Start position {} out of range, clamping to {}", start, len - 1);
            len - 1
        };
        self.emit(FeedEvent::SessionOpened {
            session_id: self.session.id(),
            item_count: len,
            start_position: start,
            timestamp: Utc::now(),
        });
        self.navigate_to(start);
    }

    /// Replace the session's list after a filter change and start over at 0
    pub(super) fn replace_session(&mut self, session: FeedSession) {
        self.install_session(session);
        self.url_cache.clear();

        let len = self.session.len();
        info!(
            "Replaced feed list: {} items for filter {}",
            len,
            self.session.filter()
        );
        self.emit(FeedEvent::SessionReplaced {
            session_id: self.session.id(),
            filter: self.session.filter().to_string(),
            item_count: len,
            timestamp: Utc::now(),
        });
        self.view.list_replaced(len);

        if len > 0 {
            self.view.scroll_to(0);
            self.navigate_to(0);
        }
    }

    /// Swap in a new session: frames cleared, then every slot released
    fn install_session(&mut self, session: FeedSession) {
        self.begin_generation();
        self.cancel_progress();
        self.frames.clear();

        let tx = self.tx.clone();
        self.pool
            .ensure_engines(self.factory.as_mut(), |slot_id, epoch| {
                EngineEventSink::new(slot_id, epoch, tx.clone())
            });
        self.pool.release_all();
        self.pool.set_muted_all(self.muted);

        self.session = session;
        self.current = None;
        self.session_open = true;
        self.visible = true;
        self.paused_by_lifecycle = false;
    }

    /// Cancel async work, release every slot and forget the list
    pub(super) fn close_session(&mut self) {
        if !self.session_open {
            debug!("Close requested with no open session");
            return;
        }

        let session_id = self.session.id();
        self.begin_generation();
        self.cancel_progress();
        self.pool.release_all();
        self.frames.clear();
        self.session.reset();
        self.url_cache.clear();
        self.surfaces.clear();
        self.current = None;
        self.session_open = false;
        self.paused_by_lifecycle = false;
        self.view.set_screen_active(false);

        info!("Closed feed session {}", session_id);
        self.emit(FeedEvent::SessionClosed {
            session_id,
            timestamp: Utc::now(),
        });
    }

    /// Close the session and release every engine
    pub(super) fn shutdown(&mut self) {
        self.close_session();
        self.session_token.cancel();
        self.pool.shutdown();
        info!("Feed scheduler shutting down, engines released");
    }

    /// Start a new generation; async work from earlier generations is cancelled
    fn begin_generation(&mut self) {
        self.session_token.cancel();
        self.session_token = CancellationToken::new();
        self.generation += 1;
        // A pending filter change would otherwise land on the new list
        self.filter_request += 1;
        debug!("Scheduler generation {}", self.generation);
    }

    pub(super) fn emit(&self, event: FeedEvent) {
        self.events.emit_lossy(event);
    }

    /// Event bus the scheduler publishes on
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn current_position(&self) -> Option<usize> {
        self.current
    }

    pub fn session(&self) -> &FeedSession {
        &self.session
    }

    pub fn pool(&self) -> &PlayerPool {
        &self.pool
    }

    pub fn frame_cache(&self) -> &FrameCache {
        &self.frames
    }
}
