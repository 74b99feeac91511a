//! Bounded player pool
//!
//! **Responsibilities:**
//! - Own the K playback slots and their engines
//! - Answer slot lookups (by position, first idle)
//! - Pick eviction candidates outside the keep set
//! - Keep surface bindings exclusive: a surface is attached to at most one engine
//!
//! Slot ids are 1-based and stable for the lifetime of the pool. Engines are
//! created once and reused; only position bindings change.

use super::engine::{EngineFactory, EngineEventSink, PlaybackEngine, SurfaceHandle};
use reelfeed_common::SlotPhase;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Stable 1-based slot identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u8);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot{}", self.0)
    }
}

/// One pool entry: an engine plus its current binding
pub struct PlaybackSlot {
    id: SlotId,
    position: Option<usize>,
    phase: SlotPhase,
    engine: Option<Box<dyn PlaybackEngine>>,
    surface: Option<SurfaceHandle>,
    /// Incremented on every (re)binding; async work and engine events
    /// captured with an older epoch are stale. Shared with the engine's sink.
    epoch: Arc<AtomicU64>,
    /// Cancels the in-flight play URL resolution for the current binding
    pending: Option<CancellationToken>,
    loaded_url: Option<String>,
    warmed: bool,
    /// The engine reported an error for the current load
    failed: bool,
}

impl PlaybackSlot {
    fn new(id: SlotId) -> Self {
        Self {
            id,
            position: None,
            phase: SlotPhase::Idle,
            engine: None,
            surface: None,
            epoch: Arc::new(AtomicU64::new(0)),
            pending: None,
            loaded_url: None,
            warmed: false,
            failed: false,
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn phase(&self) -> SlotPhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.position.is_none()
    }

    pub fn surface(&self) -> Option<SurfaceHandle> {
        self.surface
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn loaded_url(&self) -> Option<&str> {
        self.loaded_url.as_deref()
    }

    /// True once a preload produced its first frame
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn is_warmed(&self) -> bool {
        self.warmed
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    pub fn engine(&self) -> Option<&dyn PlaybackEngine> {
        self.engine.as_deref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut (dyn PlaybackEngine + 'static)> {
        self.engine.as_deref_mut()
    }

    pub(crate) fn set_phase(&mut self, phase: SlotPhase) {
        self.phase = phase;
    }

    pub(crate) fn set_loaded_url(&mut self, url: &str) {
        self.loaded_url = Some(url.to_string());
        self.warmed = false;
        self.failed = false;
    }

    pub(crate) fn mark_failed(&mut self) {
        self.failed = true;
    }

    pub(crate) fn mark_warmed(&mut self) -> bool {
        !std::mem::replace(&mut self.warmed, true)
    }

    pub(crate) fn set_pending(&mut self, token: CancellationToken) {
        self.cancel_pending();
        self.pending = Some(token);
    }

    pub(crate) fn clear_pending(&mut self) {
        self.pending = None;
    }

    pub fn has_pending_resolution(&self) -> bool {
        self.pending.is_some()
    }

    fn cancel_pending(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }

    pub(crate) fn pause(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.pause();
        }
    }

    pub(crate) fn attach_surface(&mut self, surface: SurfaceHandle) {
        if self.surface == Some(surface) {
            return;
        }
        self.detach_surface();
        if let Some(engine) = self.engine.as_mut() {
            engine.attach_surface(surface);
        }
        self.surface = Some(surface);
    }

    pub(crate) fn detach_surface(&mut self) -> Option<SurfaceHandle> {
        let surface = self.surface.take()?;
        if let Some(engine) = self.engine.as_mut() {
            engine.detach_surface();
        }
        Some(surface)
    }

    /// Pause, unbind and return to idle, keeping the engine
    fn reset(&mut self) {
        self.pause();
        self.detach_surface();
        self.cancel_pending();
        self.position = None;
        self.phase = SlotPhase::Idle;
        self.loaded_url = None;
        self.warmed = false;
        self.failed = false;
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for PlaybackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSlot")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("phase", &self.phase)
            .field("surface", &self.surface)
            .field("epoch", &self.epoch())
            .field("failed", &self.failed)
            .field("has_engine", &self.engine.is_some())
            .finish()
    }
}

/// Outcome of [`PlayerPool::choose_slot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotChoice {
    Idle(SlotId),
    /// Bound slot taken away from position `from`
    Evict { slot: SlotId, from: usize },
    /// Every bound slot is kept; the configured fallback is reused
    Fallback(SlotId),
}

impl SlotChoice {
    pub fn slot_id(self) -> SlotId {
        match self {
            SlotChoice::Idle(id) | SlotChoice::Fallback(id) => id,
            SlotChoice::Evict { slot, .. } => slot,
        }
    }
}

/// Fixed set of playback slots
#[derive(Debug)]
pub struct PlayerPool {
    slots: Vec<PlaybackSlot>,
}

impl PlayerPool {
    /// Create `size` idle slots without engines
    ///
    /// `size` is validated by the scheduler config to fit in a `u8`.
    pub fn new(size: u8) -> Self {
        Self {
            slots: (1..=size).map(|n| PlaybackSlot::new(SlotId(n))).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> impl Iterator<Item = &PlaybackSlot> {
        self.slots.iter()
    }

    pub fn slot(&self, id: SlotId) -> Option<&PlaybackSlot> {
        self.slots.iter().find(|s| s.id == id)
    }

    pub fn slot_mut(&mut self, id: SlotId) -> Option<&mut PlaybackSlot> {
        self.slots.iter_mut().find(|s| s.id == id)
    }

    /// Create engines for slots that do not have one yet
    ///
    /// Returns the number of engines created.
    pub fn ensure_engines<F>(&mut self, factory: &mut dyn EngineFactory, mut make_sink: F) -> usize
    where
        F: FnMut(SlotId, Arc<AtomicU64>) -> EngineEventSink,
    {
        let mut created = 0;
        for slot in self.slots.iter_mut().filter(|s| s.engine.is_none()) {
            let sink = make_sink(slot.id, Arc::clone(&slot.epoch));
            slot.engine = Some(factory.create(sink));
            created += 1;
        }
        if created > 0 {
            debug!("Created {} playback engines", created);
        }
        created
    }

    /// Slot bound to `position`, if any
    pub fn slot_for(&self, position: usize) -> Option<SlotId> {
        self.slots
            .iter()
            .find(|s| s.position == Some(position))
            .map(|s| s.id)
    }

    /// First idle slot in slot order
    pub fn idle_slot(&self) -> Option<SlotId> {
        self.slots.iter().find(|s| s.is_idle()).map(|s| s.id)
    }

    /// `(slot_id, position)` for every bound slot
    pub fn assignments(&self) -> Vec<(SlotId, usize)> {
        self.slots
            .iter()
            .filter_map(|s| s.position.map(|p| (s.id, p)))
            .collect()
    }

    /// See [`eviction_candidate`]
    pub fn eviction_candidate(&self, target: usize, keep: &[usize]) -> Option<SlotId> {
        eviction_candidate(&self.assignments(), target, keep)
    }

    /// Pick the slot to bind next: the first idle slot, else the eviction
    /// candidate for `target`, else `fallback` when given
    pub fn choose_slot(
        &self,
        target: usize,
        keep: &[usize],
        fallback: Option<SlotId>,
    ) -> Option<SlotChoice> {
        if let Some(id) = self.idle_slot() {
            return Some(SlotChoice::Idle(id));
        }
        if let Some(id) = self.eviction_candidate(target, keep) {
            let from = self.slot(id).and_then(|s| s.position)?;
            return Some(SlotChoice::Evict { slot: id, from });
        }
        fallback
            .filter(|id| self.slot(*id).is_some())
            .map(SlotChoice::Fallback)
    }

    /// Bind a slot to `position`
    ///
    /// The slot's old binding is torn down first (engine paused, surface
    /// detached, pending resolution cancelled). Returns the position the slot
    /// was bound to before.
    pub fn assign(&mut self, id: SlotId, position: usize, phase: SlotPhase) -> Option<usize> {
        let slot = self.slot_mut(id)?;
        let previous = slot.position;
        slot.reset();
        slot.position = Some(position);
        slot.phase = phase;
        debug!(
            "{} bound to position {} ({}), previously {:?}",
            id, position, phase, previous
        );
        previous
    }

    /// Return one slot to idle
    pub fn release(&mut self, id: SlotId) {
        if let Some(slot) = self.slot_mut(id) {
            slot.reset();
        }
    }

    /// Pause every engine, detach all surfaces and reset every slot to idle
    pub fn release_all(&mut self) {
        for slot in &mut self.slots {
            slot.reset();
        }
    }

    /// Attach `surface` to slot `id`, detaching it from any other slot first
    pub fn bind_surface(&mut self, id: SlotId, surface: SurfaceHandle) {
        for slot in self
            .slots
            .iter_mut()
            .filter(|s| s.id != id && s.surface == Some(surface))
        {
            debug!("Surface {:?} moved away from {}", surface, slot.id);
            slot.detach_surface();
        }
        if let Some(slot) = self.slot_mut(id) {
            slot.attach_surface(surface);
        }
    }

    /// Apply the mute flag to every engine
    pub fn set_muted_all(&mut self, muted: bool) {
        for engine in self.slots.iter_mut().filter_map(|s| s.engine.as_mut()) {
            engine.set_muted(muted);
        }
    }

    /// Release every engine; the pool cannot play afterwards
    pub fn shutdown(&mut self) {
        self.release_all();
        for slot in &mut self.slots {
            if let Some(mut engine) = slot.engine.take() {
                engine.release();
            }
        }
    }
}

/// Pick the bound slot to take over for `target`
///
/// Only slots whose position is outside `keep` are eligible. The one farthest
/// from `target` wins; on equal distance the lowest slot id wins. Returns None
/// when every bound slot is kept.
pub fn eviction_candidate(
    assignments: &[(SlotId, usize)],
    target: usize,
    keep: &[usize],
) -> Option<SlotId> {
    assignments
        .iter()
        .filter(|(_, position)| !keep.contains(position))
        .max_by(|(a_id, a_pos), (b_id, b_pos)| {
            a_pos
                .abs_diff(target)
                .cmp(&b_pos.abs_diff(target))
                .then_with(|| b_id.cmp(a_id))
        })
        .map(|(id, _)| *id)
}

/// Positions within `radius` of `center`
pub fn keep_window(center: usize, radius: usize) -> Vec<usize> {
    (center.saturating_sub(radius)..=center.saturating_add(radius)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::engine::EngineState;
    use std::sync::{Arc, Mutex};

    /// Engine that records calls into a shared log
    struct RecordingEngine {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingEngine {
        fn push(&self, call: String) {
            self.log.lock().unwrap().push(call);
        }
    }

    impl PlaybackEngine for RecordingEngine {
        fn load(&mut self, url: &str) {
            self.push(format!("load {}", url));
        }
        fn play(&mut self) {
            self.push("play".into());
        }
        fn pause(&mut self) {
            self.push("pause".into());
        }
        fn seek_to(&mut self, position_ms: u64) {
            self.push(format!("seek {}", position_ms));
        }
        fn set_muted(&mut self, muted: bool) {
            self.push(format!("muted {}", muted));
        }
        fn set_volume(&mut self, _volume: f32) {}
        fn set_live_mode(&mut self, _live: bool) {}
        fn attach_surface(&mut self, surface: SurfaceHandle) {
            self.push(format!("attach {}", surface.0));
        }
        fn detach_surface(&mut self) {
            self.push("detach".into());
        }
        fn state(&self) -> EngineState {
            EngineState::Idle
        }
        fn position_ms(&self) -> u64 {
            0
        }
        fn duration_ms(&self) -> Option<u64> {
            None
        }
        fn release(&mut self) {
            self.push("release".into());
        }
    }

    fn pool_with_engines(size: u8) -> (PlayerPool, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pool = PlayerPool::new(size);
        for slot in &mut pool.slots {
            slot.engine = Some(Box::new(RecordingEngine { log: log.clone() }));
        }
        (pool, log)
    }

    #[test]
    fn test_eviction_picks_farthest_outside_keep_set() {
        let assignments = [(SlotId(1), 2), (SlotId(2), 5), (SlotId(3), 9)];
        let picked = eviction_candidate(&assignments, 5, &[4, 5, 6]);
        assert_eq!(picked, Some(SlotId(3)));
    }

    #[test]
    fn test_eviction_tie_goes_to_lowest_slot_id() {
        let assignments = [(SlotId(3), 3), (SlotId(1), 7), (SlotId(2), 5)];
        // 3 and 7 are both two away from 5
        let picked = eviction_candidate(&assignments, 5, &[4, 5, 6]);
        assert_eq!(picked, Some(SlotId(1)));

        let assignments = [(SlotId(2), 3), (SlotId(3), 7)];
        assert_eq!(eviction_candidate(&assignments, 5, &[]), Some(SlotId(2)));
    }

    #[test]
    fn test_eviction_none_when_all_kept() {
        let assignments = [(SlotId(1), 4), (SlotId(2), 5), (SlotId(3), 6)];
        assert_eq!(eviction_candidate(&assignments, 5, &[4, 5, 6]), None);
        assert_eq!(eviction_candidate(&[], 5, &[4, 5, 6]), None);
    }

    #[test]
    fn test_keep_window_saturates_at_zero() {
        assert_eq!(keep_window(0, 1), vec![0, 1]);
        assert_eq!(keep_window(5, 1), vec![4, 5, 6]);
        assert_eq!(keep_window(3, 0), vec![3]);
    }

    #[test]
    fn test_choose_slot_prefers_idle_then_eviction() {
        let (mut pool, _) = pool_with_engines(3);
        pool.assign(SlotId(1), 0, SlotPhase::Foreground);
        assert_eq!(
            pool.choose_slot(1, &[0, 1, 2], None),
            Some(SlotChoice::Idle(SlotId(2)))
        );

        pool.assign(SlotId(2), 1, SlotPhase::Preloading);
        pool.assign(SlotId(3), 2, SlotPhase::Preloading);
        assert_eq!(
            pool.choose_slot(3, &[2, 3, 4], Some(SlotId(1))),
            Some(SlotChoice::Evict {
                slot: SlotId(1),
                from: 0
            })
        );
    }

    #[test]
    fn test_choose_slot_uses_fallback_when_all_kept() {
        let (mut pool, _) = pool_with_engines(3);
        pool.assign(SlotId(1), 4, SlotPhase::Preloading);
        pool.assign(SlotId(2), 5, SlotPhase::Foreground);
        pool.assign(SlotId(3), 6, SlotPhase::Preloading);

        assert_eq!(pool.choose_slot(5, &[4, 5, 6], None), None);
        assert_eq!(
            pool.choose_slot(5, &[4, 5, 6], Some(SlotId(2))),
            Some(SlotChoice::Fallback(SlotId(2)))
        );
        // A fallback outside the pool is never handed out
        assert_eq!(pool.choose_slot(5, &[4, 5, 6], Some(SlotId(9))), None);
    }

    #[test]
    fn test_new_pool_is_idle_in_slot_order() {
        let pool = PlayerPool::new(3);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.idle_slot(), Some(SlotId(1)));
        assert!(pool.assignments().is_empty());
        assert_eq!(pool.slot_for(0), None);
    }

    #[test]
    fn test_assign_and_lookup() {
        let (mut pool, _) = pool_with_engines(3);
        assert_eq!(pool.assign(SlotId(1), 4, SlotPhase::Foreground), None);
        assert_eq!(pool.assign(SlotId(2), 5, SlotPhase::Preloading), None);

        assert_eq!(pool.slot_for(4), Some(SlotId(1)));
        assert_eq!(pool.slot_for(5), Some(SlotId(2)));
        assert_eq!(pool.idle_slot(), Some(SlotId(3)));

        let previous = pool.assign(SlotId(1), 9, SlotPhase::Preloading);
        assert_eq!(previous, Some(4));
        assert_eq!(pool.slot_for(4), None);
        assert_eq!(pool.slot(SlotId(1)).unwrap().phase(), SlotPhase::Preloading);
    }

    #[test]
    fn test_assign_bumps_epoch_and_detaches_surface() {
        let (mut pool, log) = pool_with_engines(2);
        pool.assign(SlotId(1), 0, SlotPhase::Foreground);
        pool.bind_surface(SlotId(1), SurfaceHandle(7));
        let epoch = pool.slot(SlotId(1)).unwrap().epoch();
        log.lock().unwrap().clear();

        pool.assign(SlotId(1), 3, SlotPhase::Preloading);

        let slot = pool.slot(SlotId(1)).unwrap();
        assert_eq!(slot.surface(), None);
        assert!(slot.epoch() > epoch);
        assert_eq!(*log.lock().unwrap(), vec!["pause", "detach"]);
    }

    #[test]
    fn test_surface_is_never_shared() {
        let (mut pool, _) = pool_with_engines(3);
        pool.assign(SlotId(1), 0, SlotPhase::Foreground);
        pool.assign(SlotId(2), 1, SlotPhase::Preloading);

        pool.bind_surface(SlotId(1), SurfaceHandle(42));
        pool.bind_surface(SlotId(2), SurfaceHandle(42));

        assert_eq!(pool.slot(SlotId(1)).unwrap().surface(), None);
        assert_eq!(pool.slot(SlotId(2)).unwrap().surface(), Some(SurfaceHandle(42)));
    }

    #[test]
    fn test_assign_cancels_pending_resolution() {
        let (mut pool, _) = pool_with_engines(1);
        pool.assign(SlotId(1), 0, SlotPhase::Foreground);
        let token = CancellationToken::new();
        pool.slot_mut(SlotId(1)).unwrap().set_pending(token.clone());

        pool.assign(SlotId(1), 1, SlotPhase::Foreground);
        assert!(token.is_cancelled());
        assert!(!pool.slot(SlotId(1)).unwrap().has_pending_resolution());
    }

    #[test]
    fn test_release_all_keeps_engines() {
        let (mut pool, _) = pool_with_engines(3);
        pool.assign(SlotId(1), 0, SlotPhase::Foreground);
        pool.assign(SlotId(3), 1, SlotPhase::Preloading);

        pool.release_all();

        assert!(pool.assignments().is_empty());
        assert!(pool.slots().all(|s| s.phase() == SlotPhase::Idle));
        assert!(pool.slots().all(|s| s.has_engine()));
    }

    #[test]
    fn test_shutdown_releases_engines() {
        let (mut pool, log) = pool_with_engines(2);
        pool.shutdown();
        assert!(pool.slots().all(|s| !s.has_engine()));
        let releases = log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == "release")
            .count();
        assert_eq!(releases, 2);
    }

    #[test]
    fn test_mark_warmed_reports_first_time_only() {
        let (mut pool, _) = pool_with_engines(1);
        pool.assign(SlotId(1), 2, SlotPhase::Preloading);
        let slot = pool.slot_mut(SlotId(1)).unwrap();
        slot.set_loaded_url("sim://a");
        assert!(slot.mark_warmed());
        assert!(!slot.mark_warmed());
        slot.set_loaded_url("sim://b");
        assert!(slot.mark_warmed());
    }
}
