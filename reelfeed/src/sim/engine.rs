//! Simulated playback engine

use crate::playback::{
    EngineEvent, EngineEventSink, EngineFactory, EngineState, PlaybackEngine, SlotId, SurfaceHandle,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::trace;

/// A command received by a simulated engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Load(String),
    Play,
    Pause,
    SeekTo(u64),
    SetMuted(bool),
    SetVolume(f32),
    SetLiveMode(bool),
    AttachSurface(SurfaceHandle),
    DetachSurface,
    Release,
}

#[derive(Debug)]
struct EngineInner {
    state: EngineState,
    url: Option<String>,
    live: bool,
    muted: bool,
    surface: Option<SurfaceHandle>,
    /// Playhead at the last pause/seek
    offset_ms: u64,
    /// Set while playing
    started_at: Option<Instant>,
    calls: Vec<EngineCall>,
}

impl EngineInner {
    fn position_ms(&self, duration_ms: u64) -> u64 {
        let running = self
            .started_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        (self.offset_ms + running).min(duration_ms)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Engine with a wall-clock playhead
///
/// `load` emits `DurationChanged` for clips; `play` emits `Buffering` then
/// `Playing`; `pause` emits `Ready`. URLs registered as failing emit `Error`
/// on load and never play.
pub struct SimEngine {
    sink: EngineEventSink,
    inner: Arc<Mutex<EngineInner>>,
    duration_ms: u64,
    failing_urls: Arc<Mutex<HashSet<String>>>,
}

impl SimEngine {
    fn emit(&self, event: EngineEvent) {
        self.sink.emit(event);
    }

    fn record(&self, call: EngineCall) -> MutexGuard<'_, EngineInner> {
        trace!("{} <- {:?}", self.sink.slot_id(), call);
        let mut inner = lock(&self.inner);
        inner.calls.push(call);
        inner
    }
}

impl PlaybackEngine for SimEngine {
    fn load(&mut self, url: &str) {
        let failing = lock(&self.failing_urls).contains(url);
        let live = {
            let mut inner = self.record(EngineCall::Load(url.to_string()));
            inner.url = (!failing).then(|| url.to_string());
            inner.offset_ms = 0;
            inner.started_at = None;
            inner.state = if failing {
                EngineState::Idle
            } else {
                EngineState::Ready
            };
            inner.live
        };
        if failing {
            self.emit(EngineEvent::Error(format!("cannot open {}", url)));
        } else if !live {
            self.emit(EngineEvent::DurationChanged(self.duration_ms));
        }
    }

    fn play(&mut self) {
        let started = {
            let mut inner = self.record(EngineCall::Play);
            let state = inner.state;
            match state {
                EngineState::Ready | EngineState::Ended if inner.url.is_some() => {
                    if state == EngineState::Ended {
                        inner.offset_ms = 0;
                    }
                    inner.state = EngineState::Playing;
                    inner.started_at = Some(Instant::now());
                    true
                }
                _ => false,
            }
        };
        if started {
            self.emit(EngineEvent::StateChanged(EngineState::Buffering));
            self.emit(EngineEvent::StateChanged(EngineState::Playing));
        }
    }

    fn pause(&mut self) {
        let duration = self.duration_ms;
        let paused = {
            let mut inner = self.record(EngineCall::Pause);
            if inner.state == EngineState::Playing {
                inner.offset_ms = inner.position_ms(duration);
                inner.started_at = None;
                inner.state = EngineState::Ready;
                true
            } else {
                false
            }
        };
        if paused {
            self.emit(EngineEvent::StateChanged(EngineState::Ready));
        }
    }

    fn seek_to(&mut self, position_ms: u64) {
        let duration = self.duration_ms;
        let mut inner = self.record(EngineCall::SeekTo(position_ms));
        inner.offset_ms = position_ms.min(duration);
        if inner.started_at.is_some() {
            inner.started_at = Some(Instant::now());
        }
    }

    fn set_muted(&mut self, muted: bool) {
        self.record(EngineCall::SetMuted(muted)).muted = muted;
    }

    fn set_volume(&mut self, volume: f32) {
        drop(self.record(EngineCall::SetVolume(volume)));
    }

    fn set_live_mode(&mut self, live: bool) {
        self.record(EngineCall::SetLiveMode(live)).live = live;
    }

    fn attach_surface(&mut self, surface: SurfaceHandle) {
        self.record(EngineCall::AttachSurface(surface)).surface = Some(surface);
    }

    fn detach_surface(&mut self) {
        self.record(EngineCall::DetachSurface).surface = None;
    }

    fn state(&self) -> EngineState {
        lock(&self.inner).state
    }

    fn position_ms(&self) -> u64 {
        lock(&self.inner).position_ms(self.duration_ms)
    }

    fn duration_ms(&self) -> Option<u64> {
        let inner = lock(&self.inner);
        (inner.url.is_some() && !inner.live).then_some(self.duration_ms)
    }

    fn release(&mut self) {
        let mut inner = self.record(EngineCall::Release);
        inner.state = EngineState::Idle;
        inner.url = None;
        inner.started_at = None;
        inner.surface = None;
    }
}

struct EngineEntry {
    sink: EngineEventSink,
    inner: Arc<Mutex<EngineInner>>,
    duration_ms: u64,
}

/// Inspection and fault injection for every engine a factory created
#[derive(Clone, Default)]
pub struct SimEngineControl {
    engines: Arc<Mutex<BTreeMap<SlotId, EngineEntry>>>,
    failing_urls: Arc<Mutex<HashSet<String>>>,
}

impl SimEngineControl {
    /// Number of engines created so far
    pub fn engine_count(&self) -> usize {
        lock(&self.engines).len()
    }

    /// Make every future `load` of `url` fail
    pub fn fail_url(&self, url: impl Into<String>) {
        lock(&self.failing_urls).insert(url.into());
    }

    pub fn state(&self, slot_id: SlotId) -> Option<EngineState> {
        lock(&self.engines)
            .get(&slot_id)
            .map(|e| lock(&e.inner).state)
    }

    pub fn is_muted(&self, slot_id: SlotId) -> Option<bool> {
        lock(&self.engines)
            .get(&slot_id)
            .map(|e| lock(&e.inner).muted)
    }

    pub fn surface(&self, slot_id: SlotId) -> Option<SurfaceHandle> {
        lock(&self.engines)
            .get(&slot_id)
            .and_then(|e| lock(&e.inner).surface)
    }

    pub fn loaded_url(&self, slot_id: SlotId) -> Option<String> {
        lock(&self.engines)
            .get(&slot_id)
            .and_then(|e| lock(&e.inner).url.clone())
    }

    /// Commands received by the engine of `slot_id`, oldest first
    pub fn calls(&self, slot_id: SlotId) -> Vec<EngineCall> {
        lock(&self.engines)
            .get(&slot_id)
            .map(|e| lock(&e.inner).calls.clone())
            .unwrap_or_default()
    }

    pub fn clear_calls(&self) {
        for entry in lock(&self.engines).values() {
            lock(&entry.inner).calls.clear();
        }
    }

    /// Deliver an arbitrary event as if the engine of `slot_id` emitted it
    pub fn emit(&self, slot_id: SlotId, event: EngineEvent) -> bool {
        lock(&self.engines)
            .get(&slot_id)
            .map(|e| e.sink.emit(event))
            .unwrap_or(false)
    }

    /// Drive the engine of `slot_id` to its end
    pub fn finish(&self, slot_id: SlotId) -> bool {
        let engines = lock(&self.engines);
        let Some(entry) = engines.get(&slot_id) else {
            return false;
        };
        {
            let mut inner = lock(&entry.inner);
            inner.state = EngineState::Ended;
            inner.offset_ms = entry.duration_ms;
            inner.started_at = None;
        }
        entry
            .sink
            .emit(EngineEvent::StateChanged(EngineState::Ended))
    }

    /// End every playing clip whose playhead reached its duration
    ///
    /// Returns the slots that ended.
    pub fn end_finished(&self) -> Vec<SlotId> {
        let engines = lock(&self.engines);
        let mut ended = Vec::new();
        for (slot_id, entry) in engines.iter() {
            let finished = {
                let mut inner = lock(&entry.inner);
                let done = inner.state == EngineState::Playing
                    && !inner.live
                    && inner.position_ms(entry.duration_ms) >= entry.duration_ms;
                if done {
                    inner.state = EngineState::Ended;
                    inner.offset_ms = entry.duration_ms;
                    inner.started_at = None;
                }
                done
            };
            if finished {
                entry
                    .sink
                    .emit(EngineEvent::StateChanged(EngineState::Ended));
                ended.push(*slot_id);
            }
        }
        ended
    }
}

/// Creates [`SimEngine`]s and registers them with a [`SimEngineControl`]
pub struct SimEngineFactory {
    control: SimEngineControl,
    clip_duration_ms: u64,
}

impl SimEngineFactory {
    pub fn new(clip_duration_ms: u64) -> (Self, SimEngineControl) {
        let control = SimEngineControl::default();
        (
            Self {
                control: control.clone(),
                clip_duration_ms,
            },
            control,
        )
    }
}

impl EngineFactory for SimEngineFactory {
    fn create(&mut self, sink: EngineEventSink) -> Box<dyn PlaybackEngine> {
        let inner = Arc::new(Mutex::new(EngineInner {
            state: EngineState::Idle,
            url: None,
            live: false,
            muted: false,
            surface: None,
            offset_ms: 0,
            started_at: None,
            calls: Vec::new(),
        }));
        lock(&self.control.engines).insert(
            sink.slot_id(),
            EngineEntry {
                sink: sink.clone(),
                inner: Arc::clone(&inner),
                duration_ms: self.clip_duration_ms,
            },
        );
        Box::new(SimEngine {
            sink,
            inner,
            duration_ms: self.clip_duration_ms,
            failing_urls: Arc::clone(&self.control.failing_urls),
        })
    }
}
