//! # ReelFeed Common Library
//!
//! Shared code for the ReelFeed workspace:
//! - Error type and `Result` alias
//! - Bootstrap TOML configuration and scheduler tunables
//! - Observable feed events (`FeedEvent`) and the `EventBus` that carries them

pub mod config;
pub mod error;
pub mod events;

pub use config::{LoggingConfig, SchedulerConfig, TomlConfig};
pub use error::{Error, Result};
pub use events::{EventBus, FeedEvent, SlotPhase};
