//! Playback controls, visibility and row binding
//!
//! **Responsibilities:**
//! - Global mute, play/pause, seek and auto-advance
//! - Feed visibility (hide/show) and app lifecycle (background/foreground)
//! - Row attach/detach: surface bookkeeping and last-frame capture

use super::core::Scheduler;
use crate::playback::{EngineState, PlaybackEngine, SurfaceHandle};
use chrono::Utc;
use reelfeed_common::FeedEvent;
use tracing::{debug, info};

impl Scheduler {
    /// Engine of the foreground slot
    fn foreground_engine(&mut self) -> Option<&mut (dyn PlaybackEngine + 'static)> {
        let position = self.current?;
        let id = self.pool.slot_for(position)?;
        self.pool.slot_mut(id)?.engine_mut()
    }

    pub(super) fn toggle_mute(&mut self) {
        self.muted = !self.muted;
        self.pool.set_muted_all(self.muted);
        if let Some(position) = self.current {
            self.view.update_mute_indicator(position, self.muted);
        }
        debug!("Mute {}", if self.muted { "on" } else { "off" });
        self.emit(FeedEvent::MuteChanged {
            muted: self.muted,
            timestamp: Utc::now(),
        });
    }

    pub(super) fn toggle_play_pause(&mut self) {
        let Some(engine) = self.foreground_engine() else {
            return;
        };
        match engine.state() {
            EngineState::Playing | EngineState::Buffering => engine.pause(),
            EngineState::Ended => {
                engine.seek_to(0);
                engine.play();
            }
            EngineState::Ready | EngineState::Idle => engine.play(),
        }
    }

    /// Seek the foreground clip to `fraction` of its duration
    pub(super) fn seek_fraction(&mut self, fraction: f32) {
        let Some(position) = self.current else {
            return;
        };
        let seekable = self
            .session
            .get(position)
            .map(|item| item.kind.is_seekable())
            .unwrap_or(false);
        if !seekable || !fraction.is_finite() {
            return;
        }
        let fraction = f64::from(fraction.clamp(0.0, 1.0));
        if let Some(engine) = self.foreground_engine() {
            if let Some(total) = engine.duration_ms() {
                engine.seek_to((total as f64 * fraction) as u64);
            }
        }
        self.refresh_progress(position);
    }

    pub(super) fn set_auto_advance(&mut self, enabled: bool) {
        self.auto_advance = enabled;
        debug!("Auto-advance {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Feed covered by another screen: pause the foreground and stop progress
    pub(super) fn hide(&mut self) {
        if !self.visible {
            return;
        }
        self.visible = false;
        self.cancel_progress();
        if let Some(engine) = self.foreground_engine() {
            engine.pause();
        }
        self.view.set_screen_active(false);
        info!("Feed hidden");
    }

    pub(super) fn show(&mut self) {
        if self.visible || !self.session_open {
            return;
        }
        self.visible = true;
        if let Some(engine) = self.foreground_engine() {
            engine.play();
        }
        if let Some(position) = self.current {
            self.start_progress(position);
        }
        info!("Feed shown");
    }

    /// App went to background: pause the foreground only if it was playing
    pub(super) fn enter_background(&mut self) {
        if !self.visible {
            return;
        }
        if let Some(engine) = self.foreground_engine() {
            if engine.state() == EngineState::Playing {
                engine.pause();
                self.paused_by_lifecycle = true;
                debug!("Paused foreground for app background");
            }
        }
    }

    pub(super) fn enter_foreground(&mut self) {
        if !std::mem::take(&mut self.paused_by_lifecycle) || !self.visible {
            return;
        }
        if let Some(engine) = self.foreground_engine() {
            engine.play();
            debug!("Resumed foreground after app background");
        }
    }

    /// A row view became attached at `position` with its rendering surface
    pub(super) fn row_attached(&mut self, position: usize, surface: SurfaceHandle) {
        // Recycled views carry their surface to a new position
        self.surfaces.retain(|_, s| *s != surface);
        self.surfaces.insert(position, surface);

        if let Some(frame) = self.frames.get(position) {
            self.view.show_placeholder(position, Some(frame));
        }

        let Some(slot_id) = self.pool.slot_for(position) else {
            return;
        };
        self.pool.bind_surface(slot_id, surface);

        let playing = self
            .pool
            .slot(slot_id)
            .and_then(|s| s.engine())
            .map(|e| e.state() == EngineState::Playing)
            .unwrap_or(false);
        if self.current == Some(position) && playing {
            self.view.show_playback_surface(position);
        }
    }

    pub(super) fn row_detached(&mut self, position: usize) {
        if let Some(frame) = self.view.capture_frame(position) {
            self.frames.insert(position, frame);
        }
        if let Some(slot) = self
            .pool
            .slot_for(position)
            .and_then(|id| self.pool.slot_mut(id))
        {
            slot.detach_surface();
        }
        self.surfaces.remove(&position);
    }
}
