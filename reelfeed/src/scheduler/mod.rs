//! Feed scheduler
//!
//! **Module Structure:**
//! - `core.rs`: Scheduler struct, message loop, session lifecycle
//! - `navigation.rs`: position changes, slot acquisition, URL resolution, preload
//! - `engine_events.rs`: foreground/background engine event rules
//! - `progress.rs`: foreground progress poller
//! - `pagination.rs`: page fetches and filter changes
//! - `controls.rs`: mute, play/pause, seek, visibility, lifecycle, row binding
//! - `diagnostics.rs`: snapshots
//! - `handle.rs`: command handle used by the view layer

mod controls;
mod core;
mod diagnostics;
mod engine_events;
mod handle;
mod messages;
mod navigation;
mod pagination;
mod progress;

pub use self::core::Scheduler;
pub use diagnostics::{SchedulerSnapshot, SlotSnapshot};
pub use handle::SchedulerHandle;
pub(crate) use messages::SchedulerMessage;

#[cfg(test)]
mod tests;
