//! Playback engines and the bounded slot pool

pub mod engine;
pub mod frame_cache;
pub mod pool;

pub use engine::{
    EngineEvent, EngineEventSink, EngineFactory, EngineState, PlaybackEngine, SurfaceHandle,
};
pub use frame_cache::{FrameCache, LastFrame};
pub use pool::{eviction_candidate, keep_window, PlaybackSlot, PlayerPool, SlotChoice, SlotId};
