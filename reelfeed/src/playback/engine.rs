//! Playback engine abstraction
//!
//! A `PlaybackEngine` is an expensive, stateful decoder bound to at most one
//! rendering surface. The scheduler owns every engine exclusively through its
//! pool slot and drives it with synchronous commands. Engines report state
//! changes asynchronously through an [`EngineEventSink`], which funnels
//! `(slot_id, event)` pairs into the scheduler's single inbound channel.
//! Each event is stamped with the slot's binding epoch at emission, so events
//! left over from a previous binding can be told apart.

use super::pool::SlotId;
use crate::scheduler::SchedulerMessage;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// Opaque handle to a rendering surface owned by the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceHandle(pub u64);

/// Engine playback state as reported through events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// Nothing loaded, or released
    Idle,
    /// Loaded and paused
    Ready,
    Buffering,
    Playing,
    Ended,
}

/// Asynchronous notification from an engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged(EngineState),

    /// Media duration became known or changed
    DurationChanged(u64),

    /// Playback stalled waiting for data
    Rebuffering,

    Error(String),
}

/// Command surface of one playback engine
pub trait PlaybackEngine: Send {
    /// Begin loading `url`; replaces anything loaded before
    fn load(&mut self, url: &str);

    fn play(&mut self);

    fn pause(&mut self);

    fn seek_to(&mut self, position_ms: u64);

    fn set_muted(&mut self, muted: bool);

    /// Volume in 0.0..=1.0
    fn set_volume(&mut self, volume: f32);

    /// Live sources rebuffer to the live edge instead of seeking
    fn set_live_mode(&mut self, live: bool);

    fn attach_surface(&mut self, surface: SurfaceHandle);

    fn detach_surface(&mut self);

    fn state(&self) -> EngineState;

    fn position_ms(&self) -> u64;

    /// None until the duration is known; always None for live sources
    fn duration_ms(&self) -> Option<u64>;

    /// Free decoder resources; the engine is not used afterwards
    fn release(&mut self);
}

/// Creates engines for pool slots
///
/// Called once per slot, lazily, on the first session open.
pub trait EngineFactory: Send {
    fn create(&mut self, sink: EngineEventSink) -> Box<dyn PlaybackEngine>;
}

/// Event outlet handed to each engine at creation
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    slot_id: SlotId,
    /// Binding epoch shared with the slot
    epoch: Arc<AtomicU64>,
    tx: mpsc::UnboundedSender<SchedulerMessage>,
}

impl EngineEventSink {
    pub(crate) fn new(
        slot_id: SlotId,
        epoch: Arc<AtomicU64>,
        tx: mpsc::UnboundedSender<SchedulerMessage>,
    ) -> Self {
        Self { slot_id, epoch, tx }
    }

    /// Slot this sink reports for
    pub fn slot_id(&self) -> SlotId {
        self.slot_id
    }

    /// Deliver an event to the scheduler
    ///
    /// Returns false once the scheduler has stopped.
    pub fn emit(&self, event: EngineEvent) -> bool {
        let epoch = self.epoch.load(Ordering::Acquire);
        trace!("{} emits {:?} (epoch {})", self.slot_id, event, epoch);
        self.tx
            .send(SchedulerMessage::Engine {
                slot_id: self.slot_id,
                epoch,
                event,
            })
            .is_ok()
    }
}
