//! Engine event handling
//!
//! Engine events arrive as `(slot_id, epoch, event)`. Events stamped with an
//! epoch other than the slot's current one belong to an earlier binding and
//! are dropped. Whether an event is treated as foreground or background
//! depends on the slot's position at the time the event is handled, not when
//! it was emitted.

use super::core::Scheduler;
use super::messages::SchedulerMessage;
use crate::feed::ItemKind;
use crate::playback::{EngineEvent, EngineState, SlotId};
use chrono::Utc;
use reelfeed_common::FeedEvent;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

impl Scheduler {
    pub(super) fn on_engine_event(&mut self, slot_id: SlotId, epoch: u64, event: EngineEvent) {
        let Some(slot) = self.pool.slot_mut(slot_id) else {
            return;
        };
        if slot.epoch() != epoch {
            trace!("Dropping {:?} from an earlier binding of {}", event, slot_id);
            return;
        }
        let Some(position) = slot.position() else {
            debug!("Ignoring {:?} from idle {}", event, slot_id);
            return;
        };
        if matches!(event, EngineEvent::Error(_)) {
            slot.mark_failed();
        }

        if self.current == Some(position) {
            self.on_foreground_event(slot_id, position, event);
        } else {
            self.on_background_event(slot_id, position, event);
        }
    }

    fn on_foreground_event(&mut self, slot_id: SlotId, position: usize, event: EngineEvent) {
        match event {
            EngineEvent::StateChanged(EngineState::Playing) => {
                self.view.hide_loading(position);
                self.schedule_reveal(slot_id);
                self.view.set_screen_active(true);
                self.refresh_progress(position);
            }
            EngineEvent::StateChanged(EngineState::Buffering) | EngineEvent::Rebuffering => {
                self.view.show_loading(position);
            }
            EngineEvent::StateChanged(EngineState::Ended) => self.on_foreground_ended(slot_id, position),
            EngineEvent::StateChanged(EngineState::Idle) => {
                self.view.set_screen_active(false);
            }
            EngineEvent::StateChanged(EngineState::Ready) => {}
            EngineEvent::DurationChanged(_) => self.refresh_progress(position),
            EngineEvent::Error(reason) => {
                warn!("Playback failed at position {} on {}: {}", position, slot_id, reason);
                self.view.hide_loading(position);
                self.view.show_placeholder(position, self.frames.get(position));
                self.view.set_screen_active(false);
            }
        }
    }

    fn on_background_event(&mut self, slot_id: SlotId, position: usize, event: EngineEvent) {
        match event {
            EngineEvent::StateChanged(EngineState::Playing) => self.park_preload(slot_id, position),
            EngineEvent::Error(reason) => {
                debug!("Preload of position {} on {} failed: {}", position, slot_id, reason);
            }
            _ => {}
        }
    }

    /// First frame of a preload is buffered: pause it and rewind clips
    fn park_preload(&mut self, slot_id: SlotId, position: usize) {
        let kind = self.session.get(position).map(|item| item.kind);
        let Some(slot) = self.pool.slot_mut(slot_id) else {
            return;
        };
        if let Some(engine) = slot.engine_mut() {
            engine.pause();
            if kind == Some(ItemKind::Clip) {
                engine.seek_to(0);
            }
        }
        if slot.mark_warmed() {
            debug!("Preload warmed at position {} on {}", position, slot_id);
            self.emit(FeedEvent::PreloadWarmed {
                slot_id: slot_id.0,
                position,
                timestamp: Utc::now(),
            });
        }
    }

    fn on_foreground_ended(&mut self, slot_id: SlotId, position: usize) {
        let next = position + 1;
        if self.auto_advance && next < self.session.len() {
            info!("Auto-advancing from {} to {}", position, next);
            self.view.scroll_to(next);
            self.navigate_to(next);
            return;
        }

        match self.session.get(position).map(|item| item.kind) {
            Some(ItemKind::Clip) => {
                debug!("Looping clip at position {}", position);
                if let Some(engine) = self.pool.slot_mut(slot_id).and_then(|s| s.engine_mut()) {
                    engine.seek_to(0);
                    engine.play();
                }
            }
            Some(ItemKind::Live) => {
                info!("Live stream at position {} ended", position);
                self.cancel_progress();
                self.view.hide_loading(position);
                self.view.show_ended(position);
                self.view.set_screen_active(false);
            }
            None => {}
        }
    }

    /// Reveal the surface after the grace delay, unless the binding changed
    fn schedule_reveal(&mut self, slot_id: SlotId) {
        let Some(epoch) = self.pool.slot(slot_id).map(|s| s.epoch()) else {
            return;
        };
        let delay = Duration::from_millis(self.config.surface_reveal_delay_ms);
        let token = self.session_token.child_token();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(SchedulerMessage::RevealSurface { slot_id, epoch });
                }
            }
        });
    }

    pub(super) fn on_reveal_surface(&mut self, slot_id: SlotId, epoch: u64) {
        let Some(slot) = self.pool.slot(slot_id) else {
            return;
        };
        if slot.epoch() != epoch {
            return;
        }
        match slot.position() {
            Some(position) if self.current == Some(position) && self.visible => {
                self.view.show_playback_surface(position);
            }
            _ => debug!("Skipping reveal for {}, no longer foreground", slot_id),
        }
    }
}
