//! Foreground progress polling
//!
//! A periodic task sends `ProgressTick` messages for the foreground clip. Each
//! tick carries a ticket; ticks from a replaced poller, or for a position that
//! is no longer current and visible, stop the poller.

use super::core::{ProgressTask, Scheduler};
use super::messages::SchedulerMessage;
use crate::playback::EngineState;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

impl Scheduler {
    /// Start polling progress for `position` if it holds a clip and the feed is visible
    pub(super) fn start_progress(&mut self, position: usize) {
        self.cancel_progress();
        if !self.visible {
            return;
        }
        let seekable = self
            .session
            .get(position)
            .map(|item| item.kind.is_seekable())
            .unwrap_or(false);
        if !seekable {
            return;
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let token = self.session_token.child_token();
        let period = Duration::from_millis(self.config.progress_interval_ms);
        let tx = self.tx.clone();
        let task_token = token.clone();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        if tx.send(SchedulerMessage::ProgressTick { position, ticket }).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        trace!("Progress poller {} started for position {}", ticket, position);
        self.progress = Some(ProgressTask {
            position,
            ticket,
            token,
        });
    }

    pub(super) fn cancel_progress(&mut self) {
        if let Some(task) = self.progress.take() {
            task.token.cancel();
            trace!("Progress poller {} stopped", task.ticket);
        }
    }

    pub(super) fn on_progress_tick(&mut self, position: usize, ticket: u64) {
        let Some(task) = self.progress.as_ref() else {
            return;
        };
        if task.ticket != ticket || task.position != position {
            return;
        }
        if self.current != Some(position) || !self.visible {
            debug!("Progress poller for position {} no longer relevant", position);
            self.cancel_progress();
            return;
        }
        self.refresh_progress(position);
    }

    /// Push the foreground clip's position and duration to the view
    pub(super) fn refresh_progress(&mut self, position: usize) {
        let seekable = self
            .session
            .get(position)
            .map(|item| item.kind.is_seekable())
            .unwrap_or(false);
        if !seekable {
            return;
        }
        let Some(engine) = self
            .pool
            .slot_for(position)
            .and_then(|id| self.pool.slot(id))
            .and_then(|slot| slot.engine())
        else {
            return;
        };
        if engine.state() == EngineState::Idle {
            return;
        }
        if let Some(total) = engine.duration_ms().filter(|&d| d > 0) {
            let current = engine.position_ms().min(total);
            self.view.update_progress(position, current, total);
        }
    }
}
