//! In-memory collaborators for running the scheduler without real media
//!
//! - [`SimEngineFactory`]: engines that follow the load/play/pause state
//!   machine with a wall-clock playhead and record every command
//! - [`SimSource`]: page and play URL provider backed by maps, with latency
//!   and failure injection
//! - [`RecordingView`]: a view that records every callback
//!
//! Used by the demo binary and by tests.

mod engine;
mod source;
mod view;

pub use engine::{EngineCall, SimEngine, SimEngineControl, SimEngineFactory};
pub use source::SimSource;
pub use view::{RecordingView, ViewCall, ViewLog};
