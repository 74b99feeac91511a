//! Diagnostics - point-in-time scheduler snapshots

use super::core::Scheduler;
use crate::playback::EngineState;
use reelfeed_common::SlotPhase;
use serde::Serialize;
use uuid::Uuid;

/// State of one pool slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotSnapshot {
    pub slot_id: u8,
    pub position: Option<usize>,
    pub phase: SlotPhase,
    pub surface: Option<u64>,
    pub engine_state: Option<EngineState>,
    pub loaded_url: Option<String>,
    pub warmed: bool,
    pub resolving: bool,
    /// The engine reported an error for the current load
    pub failed: bool,
}

/// Scheduler state as seen from its own task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerSnapshot {
    pub session_id: Uuid,
    pub session_open: bool,
    pub filter: String,
    pub current_position: Option<usize>,
    pub item_count: usize,
    pub cursor: Option<String>,
    pub has_more: bool,
    pub loading: bool,
    pub muted: bool,
    pub auto_advance: bool,
    pub visible: bool,
    pub generation: u64,
    pub progress_position: Option<usize>,
    pub cached_frames: Vec<usize>,
    pub slots: Vec<SlotSnapshot>,
}

impl SchedulerSnapshot {
    /// Slot bound to `position`, if any
    pub fn slot_at(&self, position: usize) -> Option<&SlotSnapshot> {
        self.slots.iter().find(|s| s.position == Some(position))
    }

    /// Positions held by non-idle slots, ascending
    pub fn covered_positions(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = self.slots.iter().filter_map(|s| s.position).collect();
        positions.sort_unstable();
        positions
    }

    /// Slots currently in the foreground phase
    pub fn foreground_slots(&self) -> impl Iterator<Item = &SlotSnapshot> {
        self.slots
            .iter()
            .filter(|s| s.phase == SlotPhase::Foreground)
    }
}

impl Scheduler {
    pub fn snapshot(&self) -> SchedulerSnapshot {
        let slots = self
            .pool
            .slots()
            .map(|slot| SlotSnapshot {
                slot_id: slot.id().0,
                position: slot.position(),
                phase: slot.phase(),
                surface: slot.surface().map(|s| s.0),
                engine_state: slot.engine().map(|e| e.state()),
                loaded_url: slot.loaded_url().map(String::from),
                warmed: slot.is_warmed(),
                resolving: slot.has_pending_resolution(),
                failed: slot.is_failed(),
            })
            .collect();

        SchedulerSnapshot {
            session_id: self.session.id(),
            session_open: self.session_open,
            filter: self.session.filter().to_string(),
            current_position: self.current,
            item_count: self.session.len(),
            cursor: self.session.cursor().map(String::from),
            has_more: self.session.has_more(),
            loading: self.session.is_loading(),
            muted: self.muted,
            auto_advance: self.auto_advance,
            visible: self.visible,
            generation: self.generation,
            progress_position: self.progress.as_ref().map(|p| p.position),
            cached_frames: self.frames.positions(),
            slots,
        }
    }
}
