//! Event types for the ReelFeed event system
//!
//! The scheduler broadcasts `FeedEvent`s describing what it did with the pool
//! and the session. Observers (diagnostics, the demo binary, tests) subscribe
//! through the `EventBus`. Events are serializable so they can be logged as
//! JSON lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Playback phase of a single pool slot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotPhase {
    /// Not bound to any position
    Idle,
    /// Bound to a neighbor, muted, paused after the first frame
    Preloading,
    /// Bound to the current position, audible and advancing
    Foreground,
}

impl std::fmt::Display for SlotPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotPhase::Idle => write!(f, "idle"),
            SlotPhase::Preloading => write!(f, "preloading"),
            SlotPhase::Foreground => write!(f, "foreground"),
        }
    }
}

/// Feed scheduler events
///
/// All events carry the time they were emitted. Positions are indexes into the
/// session's item list at the time of emission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum FeedEvent {
    /// A feed session was opened with an initial item list
    SessionOpened {
        session_id: Uuid,
        item_count: usize,
        start_position: usize,
        timestamp: DateTime<Utc>,
    },

    /// The session's list was replaced after a filter change
    SessionReplaced {
        session_id: Uuid,
        filter: String,
        item_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The session was closed and every slot released
    SessionClosed {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// The foreground position changed
    PositionChanged {
        old_position: Option<usize>,
        new_position: usize,
        /// True when the target already had a preloaded slot
        promoted: bool,
        timestamp: DateTime<Utc>,
    },

    /// A slot was bound to a position
    SlotAssigned {
        slot_id: u8,
        position: usize,
        phase: SlotPhase,
        timestamp: DateTime<Utc>,
    },

    /// A slot was taken away from one position for another
    SlotEvicted {
        slot_id: u8,
        from_position: usize,
        for_position: usize,
        timestamp: DateTime<Utc>,
    },

    /// Every slot was inside the keep set; the fallback slot was reused
    PoolExhausted {
        target: usize,
        fallback_slot: u8,
        timestamp: DateTime<Utc>,
    },

    /// A preloading slot produced its first frame and was parked
    PreloadWarmed {
        slot_id: u8,
        position: usize,
        timestamp: DateTime<Utc>,
    },

    /// A pagination round appended items
    PageAppended {
        appended: usize,
        total: usize,
        has_more: bool,
        timestamp: DateTime<Utc>,
    },

    /// A pagination fetch failed; no further pages will be requested
    PaginationFailed {
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The global mute flag changed
    MuteChanged {
        muted: bool,
        timestamp: DateTime<Utc>,
    },
}

impl FeedEvent {
    /// Event name used for log lines
    pub fn event_type(&self) -> &'static str {
        match self {
            FeedEvent::SessionOpened { .. } => "SessionOpened",
            FeedEvent::SessionReplaced { .. } => "SessionReplaced",
            FeedEvent::SessionClosed { .. } => "SessionClosed",
            FeedEvent::PositionChanged { .. } => "PositionChanged",
            FeedEvent::SlotAssigned { .. } => "SlotAssigned",
            FeedEvent::SlotEvicted { .. } => "SlotEvicted",
            FeedEvent::PoolExhausted { .. } => "PoolExhausted",
            FeedEvent::PreloadWarmed { .. } => "PreloadWarmed",
            FeedEvent::PageAppended { .. } => "PageAppended",
            FeedEvent::PaginationFailed { .. } => "PaginationFailed",
            FeedEvent::MuteChanged { .. } => "MuteChanged",
        }
    }
}

/// Broadcast bus for `FeedEvent`s
///
/// Slow subscribers lose the oldest events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FeedEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring the case where nobody is listening
    pub fn emit_lossy(&self, event: FeedEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        bus.emit_lossy(FeedEvent::MuteChanged {
            muted: true,
            timestamp: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            FeedEvent::MuteChanged { muted, .. } => assert!(muted),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit_lossy(FeedEvent::SessionClosed {
            session_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        });
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = FeedEvent::SlotAssigned {
            slot_id: 2,
            position: 7,
            phase: SlotPhase::Preloading,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"SlotAssigned\""));
        assert!(json.contains("\"phase\":\"preloading\""));
        assert_eq!(event.event_type(), "SlotAssigned");
    }
}
