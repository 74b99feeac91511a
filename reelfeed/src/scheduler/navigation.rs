//! Navigation - position changes, slot acquisition and preloading
//!
//! **Responsibilities:**
//! - Position-change state machine (leave, promote or load, preload, paginate)
//! - Slot acquisition: idle slot, then eviction outside the keep set, then fallback
//! - Play URL resolution with stale-response guard
//! - Loading engines for foreground and preload bindings

use super::core::Scheduler;
use super::messages::SchedulerMessage;
use crate::error::Result;
use crate::feed::ItemKind;
use crate::playback::{keep_window, EngineState, SlotChoice, SlotId};
use chrono::Utc;
use reelfeed_common::{FeedEvent, SlotPhase};
use std::sync::Arc;
use tracing::{debug, info, warn};

impl Scheduler {
    /// View reported a new settled position
    pub(super) fn position_selected(&mut self, position: usize) {
        if !self.session_open {
            debug!("Position {} selected with no open session", position);
            return;
        }
        if self.current == Some(position) {
            // Echo of a scroll the scheduler requested itself
            debug!("Position {} is already current", position);
            return;
        }
        self.navigate_to(position);
    }

    /// Make `target` the foreground position
    pub(super) fn navigate_to(&mut self, target: usize) {
        if target >= self.session.len() {
            debug!(
                "Ignoring navigation to {} beyond list of {}",
                target,
                self.session.len()
            );
            return;
        }

        let previous = self.current;
        if let Some(prev) = previous.filter(|&p| p != target) {
            self.leave_position(prev);
        }
        self.cancel_progress();

        let promoted = match self.pool.slot_for(target) {
            Some(slot_id) => {
                self.promote(slot_id, target);
                true
            }
            None => {
                self.load_foreground(target);
                false
            }
        };

        debug!(
            "Navigated {:?} -> {} ({})",
            previous,
            target,
            if promoted { "promoted" } else { "loading" }
        );
        self.emit(FeedEvent::PositionChanged {
            old_position: previous,
            new_position: target,
            promoted,
            timestamp: Utc::now(),
        });

        self.frames.retain_window(target);
        self.start_progress(target);
        self.preload_neighbors(target);
        self.maybe_paginate(target);
    }

    /// Park the slot of the position being left
    fn leave_position(&mut self, position: usize) {
        if let Some(frame) = self.view.capture_frame(position) {
            self.frames.insert(position, frame);
        }
        if let Some(slot) = self
            .pool
            .slot_for(position)
            .and_then(|id| self.pool.slot_mut(id))
        {
            slot.pause();
            slot.set_phase(SlotPhase::Preloading);
        }
        self.view.hide_loading(position);
        self.view.show_placeholder(position, self.frames.get(position));
    }

    /// Bring an already bound slot to the foreground
    fn promote(&mut self, slot_id: SlotId, target: usize) {
        let Some(kind) = self.session.get(target).map(|item| item.kind) else {
            return;
        };
        self.current = Some(target);
        if let Some(surface) = self.surfaces.get(&target).copied() {
            self.pool.bind_surface(slot_id, surface);
        }

        let muted = self.muted;
        let Some(slot) = self.pool.slot_mut(slot_id) else {
            return;
        };
        slot.set_phase(SlotPhase::Foreground);
        let failed = slot.is_failed();
        let unresolved = slot.loaded_url().is_none() && !slot.has_pending_resolution();
        let loaded = slot.loaded_url().is_some();

        self.view.update_mute_indicator(target, muted);
        if failed {
            // Failed loads are not retried
            warn!("Promoted {} at position {} holds a failed load", slot_id, target);
            self.view.hide_loading(target);
            self.view.show_placeholder(target, self.frames.get(target));
            self.view.set_screen_active(false);
            return;
        }
        if unresolved {
            // Background resolution failed; resolve again as the foreground
            debug!("Promoted {} at position {} has no play URL, loading", slot_id, target);
            self.view.show_loading(target);
            self.start_load(slot_id, target);
            return;
        }

        let Some(slot) = self.pool.slot_mut(slot_id) else {
            return;
        };
        let mut playing = false;
        if let Some(engine) = slot.engine_mut() {
            engine.set_muted(muted);
            engine.set_volume(1.0);
            match kind {
                ItemKind::Clip => {
                    engine.seek_to(0);
                    engine.play();
                }
                ItemKind::Live => {
                    if !matches!(engine.state(), EngineState::Playing | EngineState::Buffering) {
                        engine.play();
                    }
                }
            }
            playing = engine.state() == EngineState::Playing;
        }

        debug!("Promoted {} at position {}", slot_id, target);
        if playing {
            self.view.hide_loading(target);
            self.view.show_playback_surface(target);
            self.view.set_screen_active(true);
        } else if !loaded {
            self.view.show_loading(target);
        }
    }

    /// Bind a slot to `target` and start loading it in the foreground
    fn load_foreground(&mut self, target: usize) {
        self.view.show_placeholder(target, self.frames.get(target));

        let keep = keep_window(target, self.config.preload_radius);
        let fallback = SlotId(self.config.fallback_slot);
        let Some(slot_id) = self.acquire_slot(target, target, &keep, Some(fallback)) else {
            warn!("No slot for position {}, fallback {} is not in the pool", target, fallback);
            return;
        };

        self.current = Some(target);
        self.bind_slot(slot_id, target, SlotPhase::Foreground);
        self.view.show_loading(target);
        self.view.update_mute_indicator(target, self.muted);
        self.start_load(slot_id, target);
    }

    /// Preload every neighbor within the radius that has no slot yet
    ///
    /// Offsets are visited +1, -1, +2, -2 and so on.
    pub(super) fn preload_neighbors(&mut self, target: usize) {
        let keep = keep_window(target, self.config.preload_radius);
        for offset in 1..=self.config.preload_radius {
            let neighbors = [target.checked_add(offset), target.checked_sub(offset)];
            for neighbor in neighbors.into_iter().flatten() {
                if neighbor >= self.session.len() || self.pool.slot_for(neighbor).is_some() {
                    continue;
                }
                let Some(slot_id) = self.acquire_slot(neighbor, target, &keep, None) else {
                    debug!("No slot available to preload position {}", neighbor);
                    continue;
                };
                self.bind_slot(slot_id, neighbor, SlotPhase::Preloading);
                self.start_load(slot_id, neighbor);
            }
        }
    }

    /// Find a slot for `position`: idle first, then evict the farthest from
    /// `reference` outside `keep`, then `fallback` if given
    fn acquire_slot(
        &mut self,
        position: usize,
        reference: usize,
        keep: &[usize],
        fallback: Option<SlotId>,
    ) -> Option<SlotId> {
        let choice = self.pool.choose_slot(reference, keep, fallback)?;
        match choice {
            SlotChoice::Idle(_) => {}
            SlotChoice::Evict { slot, from } => {
                self.pool.release(slot);
                debug!(
                    "Evicted {} from position {} for position {}",
                    slot, from, position
                );
                self.view.show_placeholder(from, self.frames.get(from));
                self.emit(FeedEvent::SlotEvicted {
                    slot_id: slot.0,
                    from_position: from,
                    for_position: position,
                    timestamp: Utc::now(),
                });
            }
            SlotChoice::Fallback(slot) => {
                warn!(
                    "Player pool exhausted for position {}, reusing fallback {}",
                    position, slot
                );
                self.pool.release(slot);
                self.emit(FeedEvent::PoolExhausted {
                    target: position,
                    fallback_slot: slot.0,
                    timestamp: Utc::now(),
                });
            }
        }
        Some(choice.slot_id())
    }

    fn bind_slot(&mut self, slot_id: SlotId, position: usize, phase: SlotPhase) {
        self.pool.assign(slot_id, position, phase);
        if let Some(surface) = self.surfaces.get(&position).copied() {
            self.pool.bind_surface(slot_id, surface);
        }
        self.emit(FeedEvent::SlotAssigned {
            slot_id: slot_id.0,
            position,
            phase,
            timestamp: Utc::now(),
        });
    }

    /// Load the item at `position` into the slot, resolving its URL if needed
    fn start_load(&mut self, slot_id: SlotId, position: usize) {
        let Some(item) = self.session.get(position).cloned() else {
            return;
        };

        let known = item
            .play_url
            .clone()
            .or_else(|| self.url_cache.get(&item.id).cloned());
        if let Some(url) = known {
            self.apply_url(slot_id, position, &url);
            return;
        }

        let Some(slot) = self.pool.slot_mut(slot_id) else {
            return;
        };
        let epoch = slot.epoch();
        let token = self.session_token.child_token();
        slot.set_pending(token.clone());

        debug!("Resolving play URL for {} at position {}", item.id, position);
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result: Result<String> = tokio::select! {
                _ = token.cancelled() => return,
                result = source.resolve_play_url(&item) => result,
            };
            // Scheduler gone means nobody cares about the answer
            let _ = tx.send(SchedulerMessage::UrlResolved {
                slot_id,
                epoch,
                position,
                item_id: item.id,
                result,
            });
        });
    }

    pub(super) fn on_url_resolved(
        &mut self,
        slot_id: SlotId,
        epoch: u64,
        position: usize,
        item_id: String,
        result: Result<String>,
    ) {
        let Some(slot) = self.pool.slot_mut(slot_id) else {
            return;
        };
        if slot.epoch() != epoch || slot.position() != Some(position) {
            debug!(
                "Dropping stale play URL for {} ({} moved on)",
                item_id, slot_id
            );
            return;
        }
        slot.clear_pending();

        match result {
            Ok(url) => {
                self.url_cache.insert(item_id, url.clone());
                self.apply_url(slot_id, position, &url);
            }
            Err(e) if self.current == Some(position) => {
                warn!("Play URL resolution failed for position {}: {}", position, e);
                self.view.hide_loading(position);
                self.view.show_placeholder(position, self.frames.get(position));
            }
            Err(e) => {
                debug!("Abandoning preload of position {}: {}", position, e);
            }
        }
    }

    /// Start playback of `url` on the slot
    ///
    /// The foreground slot honors the mute flag; preloads are always muted and
    /// are parked on their first PLAYING event.
    fn apply_url(&mut self, slot_id: SlotId, position: usize, url: &str) {
        let foreground = self.current == Some(position);
        let live = self
            .session
            .get(position)
            .map(|item| item.kind == ItemKind::Live)
            .unwrap_or(false);
        let muted = if foreground { self.muted } else { true };

        let Some(slot) = self.pool.slot_mut(slot_id) else {
            return;
        };
        slot.set_loaded_url(url);
        if let Some(engine) = slot.engine_mut() {
            engine.set_live_mode(live);
            engine.set_muted(muted);
            engine.set_volume(1.0);
            engine.load(url);
            engine.play();
        }

        if foreground {
            info!("Loading position {} on {}", position, slot_id);
        } else {
            debug!("Preloading position {} on {}", position, slot_id);
        }
    }
}
