//! Unit tests for scheduler internals
//!
//! The scheduler is driven directly: commands go through the handle, queued
//! messages are handled with `drain_pending`, and spawned work gets a few
//! milliseconds to finish between drains.

use super::core::Scheduler;
use super::handle::SchedulerHandle;
use super::messages::SchedulerMessage;
use crate::feed::{FeedFilter, MediaItem};
use crate::playback::{EngineEvent, EngineState, SlotId, SurfaceHandle};
use crate::sim::{EngineCall, RecordingView, SimEngineControl, SimEngineFactory, SimSource, ViewCall, ViewLog};
use reelfeed_common::{SchedulerConfig, SlotPhase};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    scheduler: Scheduler,
    handle: SchedulerHandle,
    source: Arc<SimSource>,
    engines: SimEngineControl,
    view: ViewLog,
}

impl Harness {
    fn new(config: SchedulerConfig) -> Self {
        let source = Arc::new(SimSource::new());
        let (factory, engines) = SimEngineFactory::new(10_000);
        let (view, view_log) = RecordingView::new();
        let (scheduler, handle) =
            Scheduler::new(config, source.clone(), Box::new(view), Box::new(factory)).unwrap();
        Self {
            scheduler,
            handle,
            source,
            engines,
            view: view_log,
        }
    }

    fn with_defaults() -> Self {
        Self::new(SchedulerConfig::default())
    }

    /// Let spawned work finish and handle everything it produced
    async fn settle(&mut self) {
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.scheduler.drain_pending();
        }
    }

    async fn open(&mut self, ids: &[&str], start: usize) {
        let items = ids.iter().map(|id| MediaItem::clip(*id)).collect();
        self.handle
            .open_session(FeedFilter::default(), items, start, None)
            .unwrap();
        self.settle().await;
    }

    async fn select(&mut self, position: usize) {
        self.handle.position_selected(position).unwrap();
        self.settle().await;
    }

    fn slot_at(&self, position: usize) -> SlotId {
        self.scheduler.pool.slot_for(position).unwrap()
    }
}

#[tokio::test]
async fn test_open_binds_foreground_and_one_preload() {
    let mut h = Harness::with_defaults();
    h.open(&["a", "b", "c", "d", "e"], 0).await;

    let snapshot = h.scheduler.snapshot();
    assert_eq!(snapshot.current_position, Some(0));
    assert_eq!(snapshot.covered_positions(), vec![0, 1]);
    assert_eq!(snapshot.slot_at(0).unwrap().phase, SlotPhase::Foreground);
    assert_eq!(snapshot.slot_at(1).unwrap().phase, SlotPhase::Preloading);
    assert_eq!(snapshot.foreground_slots().count(), 1);

    // Foreground plays, the preload is parked after its first frame
    assert_eq!(h.engines.state(h.slot_at(0)), Some(EngineState::Playing));
    assert_eq!(h.engines.state(h.slot_at(1)), Some(EngineState::Ready));
    assert!(snapshot.slot_at(1).unwrap().warmed);
    assert_eq!(h.engines.is_muted(h.slot_at(1)), Some(true));
}

#[tokio::test]
async fn test_navigation_evicts_position_left_behind() {
    let mut h = Harness::with_defaults();
    h.open(&["a", "b", "c", "d", "e"], 0).await;
    let first = h.slot_at(0);

    h.select(1).await;
    h.select(2).await;

    assert_eq!(h.scheduler.snapshot().covered_positions(), vec![1, 2, 3]);
    // The slot that held position 0 was reused for 3
    assert_eq!(h.slot_at(3), first);
    assert_eq!(h.scheduler.current_position(), Some(2));
}

#[tokio::test]
async fn test_promoted_preload_plays_from_start() {
    let mut h = Harness::with_defaults();
    h.open(&["a", "b", "c"], 0).await;
    let preload = h.slot_at(1);
    h.engines.clear_calls();

    h.select(1).await;

    let calls = h.engines.calls(preload);
    assert!(calls.contains(&EngineCall::SeekTo(0)));
    assert!(calls.contains(&EngineCall::Play));
    assert!(calls.contains(&EngineCall::SetMuted(false)));
    assert_eq!(h.engines.state(preload), Some(EngineState::Playing));
    assert!(h.view.contains(&ViewCall::ShowPlaybackSurface(1)));
}

#[tokio::test]
async fn test_preload_neighbors_is_idempotent() {
    let mut h = Harness::with_defaults();
    h.open(&["a", "b", "c", "d"], 1).await;
    let before = h.scheduler.pool.assignments();

    h.scheduler.preload_neighbors(1);
    h.scheduler.preload_neighbors(1);

    assert_eq!(h.scheduler.pool.assignments(), before);
}

#[tokio::test]
async fn test_foreground_not_demoted_by_background_rule() {
    let mut h = Harness::with_defaults();
    h.open(&["a", "b", "c"], 0).await;
    let foreground = h.slot_at(0);
    h.engines.clear_calls();

    h.engines
        .emit(foreground, EngineEvent::StateChanged(EngineState::Playing));
    h.settle().await;

    assert!(!h.engines.calls(foreground).contains(&EngineCall::Pause));
    assert_eq!(h.engines.state(foreground), Some(EngineState::Playing));
}

#[tokio::test]
async fn test_stale_url_resolution_is_dropped() {
    let mut h = Harness::with_defaults();
    h.open(&["a", "b", "c"], 0).await;
    let slot = h.slot_at(1);
    let old_epoch = h.scheduler.pool.slot(slot).unwrap().epoch();

    // Rebind the slot to another position
    h.scheduler
        .pool
        .assign(slot, 2, SlotPhase::Preloading);
    h.engines.clear_calls();

    h.scheduler.handle_message(SchedulerMessage::UrlResolved {
        slot_id: slot,
        epoch: old_epoch,
        position: 1,
        item_id: "b".to_string(),
        result: Ok("sim://clip/b".to_string()),
    });

    assert!(h.engines.calls(slot).is_empty());
    assert_eq!(h.scheduler.pool.slot(slot).unwrap().position(), Some(2));
}

#[tokio::test]
async fn test_resolution_for_moved_slot_never_loads() {
    let mut h = Harness::with_defaults();
    h.source.delay_item("c", Duration::from_millis(200));
    h.open(&["a", "b", "c", "d", "e", "f", "g"], 0).await;
    h.select(1).await;
    // "c" is still resolving on its slot; jump away so that slot is reused
    h.select(5).await;
    tokio::time::sleep(Duration::from_millis(250)).await;
    h.settle().await;

    let loaded_c = [SlotId(1), SlotId(2), SlotId(3)]
        .iter()
        .any(|&slot| h.engines.loaded_url(slot).as_deref() == Some("sim://clip/c"));
    assert!(!loaded_c);
    assert_eq!(h.scheduler.snapshot().covered_positions(), vec![4, 5, 6]);
}

#[tokio::test]
async fn test_foreground_resolution_failure_shows_placeholder() {
    let mut h = Harness::with_defaults();
    h.source.fail_item("a");
    h.open(&["a", "b"], 0).await;

    assert!(h.view.contains(&ViewCall::HideLoading(0)));
    let placeholders = h.view.count(|c| {
        matches!(c, ViewCall::ShowPlaceholder { position: 0, .. })
    });
    assert!(placeholders >= 2);
    // No retry
    let attempts = h.source.resolved_items().iter().filter(|id| *id == "a").count();
    assert_eq!(attempts, 1);
}

#[tokio::test]
async fn test_preload_failure_is_silent() {
    let mut h = Harness::with_defaults();
    h.source.fail_item("b");
    h.open(&["a", "b"], 0).await;

    assert!(!h
        .view
        .contains(&ViewCall::ShowPlaceholder { position: 1, cached: false }));
    assert!(!h.view.contains(&ViewCall::HideLoading(1)));
    assert_eq!(h.scheduler.current_position(), Some(0));
}

#[tokio::test]
async fn test_swipe_to_unresolved_preload_resolves_in_foreground() {
    let mut h = Harness::with_defaults();
    h.source.fail_item("b");
    h.open(&["a", "b", "c"], 0).await;
    let slot = h.slot_at(1);
    assert!(!h.scheduler.pool.slot(slot).unwrap().has_pending_resolution());

    h.select(1).await;

    // Resolved once as a preload and once as the foreground, then given up
    let attempts = h.source.resolved_items().iter().filter(|id| *id == "b").count();
    assert_eq!(attempts, 2);
    assert!(h.view.contains(&ViewCall::HideLoading(1)));
    assert!(h
        .view
        .contains(&ViewCall::ShowPlaceholder { position: 1, cached: false }));
    assert_eq!(h.scheduler.current_position(), Some(1));
}

#[tokio::test]
async fn test_swipe_to_failed_preload_shows_placeholder() {
    let mut h = Harness::with_defaults();
    h.engines.fail_url("sim://clip/b");
    h.open(&["a", "b", "c"], 0).await;
    let slot = h.slot_at(1);
    assert!(h.scheduler.snapshot().slot_at(1).unwrap().failed);
    // Still silent while in the background
    assert!(!h.view.contains(&ViewCall::HideLoading(1)));
    h.engines.clear_calls();

    h.select(1).await;

    assert!(h.view.contains(&ViewCall::HideLoading(1)));
    assert!(h
        .view
        .contains(&ViewCall::ShowPlaceholder { position: 1, cached: false }));
    assert!(!h.view.contains(&ViewCall::ShowLoading(1)));
    // No reload and no play on the failed engine
    let calls = h.engines.calls(slot);
    assert!(!calls.iter().any(|c| matches!(c, EngineCall::Load(_))));
    assert!(!calls.contains(&EngineCall::Play));
}

#[tokio::test]
async fn test_events_from_previous_binding_are_dropped() {
    let mut h = Harness::with_defaults();
    let items = ["a", "b", "c", "d", "e", "f", "g"]
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let item = MediaItem::clip(*id);
            if i < 2 {
                let url = SimSource::play_url_for(&item);
                item.with_play_url(url)
            } else {
                item
            }
        })
        .collect();

    // Both commands are queued before either is handled, so the engine
    // events of the first bindings are still waiting when slots move on
    h.handle
        .open_session(FeedFilter::default(), items, 0, None)
        .unwrap();
    h.handle.position_selected(5).unwrap();
    h.scheduler.drain_pending();

    let snapshot = h.scheduler.snapshot();
    assert_eq!(snapshot.covered_positions(), vec![4, 5, 6]);
    for position in [4, 6] {
        let slot = snapshot.slot_at(position).unwrap();
        assert!(slot.resolving);
        assert!(!slot.warmed);
    }
    assert!(!h.view.contains(&ViewCall::HideLoading(5)));
}

#[tokio::test]
async fn test_stale_ended_does_not_loop_foreground() {
    let mut h = Harness::with_defaults();
    h.open(&["a", "b"], 0).await;
    let slot = h.slot_at(0);
    let epoch = h.scheduler.pool.slot(slot).unwrap().epoch();
    h.engines.clear_calls();

    h.scheduler.handle_message(SchedulerMessage::Engine {
        slot_id: slot,
        epoch: epoch - 1,
        event: EngineEvent::StateChanged(EngineState::Ended),
    });

    assert!(h.engines.calls(slot).is_empty());
    assert_eq!(h.engines.state(slot), Some(EngineState::Playing));
}

#[tokio::test]
async fn test_toggle_mute_applies_to_every_engine() {
    let mut h = Harness::with_defaults();
    h.open(&["a", "b", "c"], 1).await;

    h.handle.toggle_mute().unwrap();
    h.settle().await;

    for slot in [SlotId(1), SlotId(2), SlotId(3)] {
        assert_eq!(h.engines.is_muted(slot), Some(true));
    }
    assert!(h.view.contains(&ViewCall::UpdateMuteIndicator {
        position: 1,
        muted: true
    }));
    assert!(h.scheduler.snapshot().muted);
}

#[tokio::test]
async fn test_leaving_position_caches_its_frame() {
    let mut h = Harness::with_defaults();
    h.open(&["a", "b", "c", "d", "e", "f", "g", "h"], 0).await;

    h.select(1).await;
    assert_eq!(
        h.scheduler.frame_cache().get(0),
        Some(&RecordingView::frame_for(0))
    );

    // Frames outside the radius around the new position are pruned
    h.select(6).await;
    assert_eq!(h.scheduler.frame_cache().get(0), None);
    assert!(h.scheduler.frame_cache().is_empty());
}

#[tokio::test]
async fn test_surface_moves_with_recycled_row() {
    let mut h = Harness::with_defaults();
    h.open(&["a", "b", "c"], 0).await;

    h.handle.row_attached(0, SurfaceHandle(9)).unwrap();
    h.settle().await;
    assert_eq!(h.engines.surface(h.slot_at(0)), Some(SurfaceHandle(9)));

    h.handle.row_attached(1, SurfaceHandle(9)).unwrap();
    h.settle().await;
    assert_eq!(h.engines.surface(h.slot_at(0)), None);
    assert_eq!(h.engines.surface(h.slot_at(1)), Some(SurfaceHandle(9)));
}

#[tokio::test]
async fn test_row_detach_captures_frame_and_unbinds() {
    let mut h = Harness::with_defaults();
    h.open(&["a", "b", "c"], 0).await;
    h.handle.row_attached(1, SurfaceHandle(4)).unwrap();
    h.handle.row_detached(1).unwrap();
    h.settle().await;

    assert_eq!(h.engines.surface(h.slot_at(1)), None);
    assert!(h.scheduler.frame_cache().get(1).is_some());
}

#[tokio::test]
async fn test_close_releases_everything() {
    let mut h = Harness::with_defaults();
    h.open(&["a", "b", "c"], 1).await;
    let generation = h.scheduler.generation;

    h.handle.close_session().unwrap();
    h.settle().await;

    let snapshot = h.scheduler.snapshot();
    assert!(!snapshot.session_open);
    assert_eq!(snapshot.current_position, None);
    assert!(snapshot.covered_positions().is_empty());
    assert!(snapshot.cached_frames.is_empty());
    assert_eq!(snapshot.item_count, 0);
    assert!(h.scheduler.generation > generation);
    // Engines survive for the next session
    assert_eq!(h.engines.engine_count(), 3);
}

#[tokio::test]
async fn test_progress_poller_stops_when_hidden() {
    let mut h = Harness::with_defaults();
    h.open(&["a", "b"], 0).await;
    assert_eq!(h.scheduler.snapshot().progress_position, Some(0));

    h.handle.hide().unwrap();
    h.settle().await;
    assert_eq!(h.scheduler.snapshot().progress_position, None);
    assert_eq!(h.engines.state(h.slot_at(0)), Some(EngineState::Ready));

    h.handle.show().unwrap();
    h.settle().await;
    assert_eq!(h.scheduler.snapshot().progress_position, Some(0));
    assert_eq!(h.engines.state(h.slot_at(0)), Some(EngineState::Playing));
}

#[tokio::test]
async fn test_stale_progress_tick_ignored() {
    let mut h = Harness::with_defaults();
    h.open(&["a", "b"], 0).await;
    h.view.clear();

    h.scheduler.handle_message(SchedulerMessage::ProgressTick {
        position: 0,
        ticket: 0,
    });

    assert_eq!(h.view.last_progress(), None);
}
