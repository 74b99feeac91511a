//! Error types for reelfeed
//!
//! Scheduler-internal failures never surface to the view as errors; they are
//! turned into placeholder states. These variants cover the seams where a
//! caller can observe a failure.

use thiserror::Error;

/// Main error type for the reelfeed crate
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(#[from] reelfeed_common::Error),

    /// Item source failed to deliver a page
    #[error("Item source error: {0}")]
    Source(String),

    /// Play URL could not be resolved for an item
    #[error("Play URL resolution failed for {item_id}: {reason}")]
    Resolve { item_id: String, reason: String },

    /// The scheduler task has stopped and no longer accepts commands
    #[error("Scheduler is not running")]
    SchedulerClosed,
}

/// Convenience Result type using reelfeed Error
pub type Result<T> = std::result::Result<T, Error>;
