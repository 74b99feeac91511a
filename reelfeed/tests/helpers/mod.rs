//! Test helpers for reelfeed integration tests
//!
//! `TestFeed` runs a real scheduler task wired to the simulation kit and
//! exposes the handles tests need to drive and inspect it.

#![allow(dead_code)]

use reelfeed::sim::{RecordingView, SimEngineControl, SimEngineFactory, SimSource, ViewLog};
use reelfeed::{FeedFilter, MediaItem, Scheduler, SchedulerHandle, SchedulerSnapshot};
use reelfeed_common::{FeedEvent, SchedulerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Clip length used by simulated engines unless a test finishes them early
pub const CLIP_MS: u64 = 60_000;

/// A running scheduler plus its simulated collaborators
pub struct TestFeed {
    pub handle: SchedulerHandle,
    pub source: Arc<SimSource>,
    pub engines: SimEngineControl,
    pub view: ViewLog,
    pub events: broadcast::Receiver<FeedEvent>,
    task: JoinHandle<()>,
}

impl TestFeed {
    pub fn start(config: SchedulerConfig) -> Self {
        Self::with_source(config, SimSource::new())
    }

    pub fn with_source(config: SchedulerConfig, source: SimSource) -> Self {
        let source = Arc::new(source);
        let (factory, engines) = SimEngineFactory::new(CLIP_MS);
        let (view, view_log) = RecordingView::new();
        let (handle, task) =
            Scheduler::spawn(config, source.clone(), Box::new(view), Box::new(factory))
                .expect("scheduler should start");
        let events = handle.subscribe();
        Self {
            handle,
            source,
            engines,
            view: view_log,
            events,
            task,
        }
    }

    pub fn default_config() -> SchedulerConfig {
        SchedulerConfig::default()
    }

    /// Open a clip feed built from `ids`
    pub async fn open_clips(&self, ids: &[&str], start: usize, cursor: Option<&str>) {
        let items = clips(ids);
        self.handle
            .open_session(FeedFilter::default(), items, start, cursor.map(String::from))
            .unwrap();
        settle().await;
    }

    pub async fn select(&self, position: usize) {
        self.handle.position_selected(position).unwrap();
        settle().await;
    }

    pub async fn snapshot(&self) -> SchedulerSnapshot {
        self.handle.snapshot().await.unwrap()
    }

    /// Events received so far, oldest first
    pub fn drain_events(&mut self) -> Vec<FeedEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Shut the scheduler down and wait for its task
    pub async fn stop(self) {
        self.handle.shutdown().unwrap();
        tokio::time::timeout(Duration::from_secs(1), self.task)
            .await
            .expect("scheduler should stop")
            .unwrap();
    }
}

pub fn clips(ids: &[&str]) -> Vec<MediaItem> {
    ids.iter().map(|id| MediaItem::clip(*id)).collect()
}

pub fn lives(ids: &[&str]) -> Vec<MediaItem> {
    ids.iter().map(|id| MediaItem::live(*id)).collect()
}

/// Give spawned resolutions, fetches and timers time to land
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}
