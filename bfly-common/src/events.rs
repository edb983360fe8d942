//! Event types for the BFLY event system
//!
//! Provides shared event definitions and the EventBus used by the engine to
//! announce committed observations to SSE clients and other listeners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{ConservationStatus, GeoPoint};

/// BFLY event types
///
/// Events are broadcast via EventBus after the engine commits (or rejects) a
/// submission, and serialize directly to SSE payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BflyEvent {
    /// Observation validated and folded into aggregates and ledger
    ObservationAccepted {
        observation_id: Uuid,
        species_id: String,
        submitted_by: String,
        confidence: f64,
        location_label: Option<String>,
        /// Points awarded to the submitter
        points_awarded: u64,
        timestamp: DateTime<Utc>,
    },

    /// Submission rejected by the validator
    ///
    /// `reason` is the stable rule code (e.g. "UNKNOWN_SPECIES").
    ObservationRejected {
        submitted_by: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A user unlocked an achievement
    AchievementUnlocked {
        user_id: String,
        achievement_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Geolocated sighting of a threatened species
    ConservationAlert {
        observation_id: Uuid,
        species_id: String,
        status: ConservationStatus,
        location: GeoPoint,
        timestamp: DateTime<Utc>,
    },
}

impl BflyEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            BflyEvent::ObservationAccepted { .. } => "ObservationAccepted",
            BflyEvent::ObservationRejected { .. } => "ObservationRejected",
            BflyEvent::AchievementUnlocked { .. } => "AchievementUnlocked",
            BflyEvent::ConservationAlert { .. } => "ConservationAlert",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block the engine)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use bfly_common::events::{BflyEvent, EventBus};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(BflyEvent::AchievementUnlocked {
///     user_id: "alex".to_string(),
///     achievement_id: "first_identification".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BflyEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<BflyEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: BflyEvent,
    ) -> Result<usize, broadcast::error::SendError<BflyEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: BflyEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
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

    fn unlocked(achievement: &str) -> BflyEvent {
        BflyEvent::AchievementUnlocked {
            user_id: "u1".to_string(),
            achievement_id: achievement.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        assert!(bus.emit(unlocked("first_identification")).is_err());
        // Lossy variant never panics
        bus.emit_lossy(unlocked("first_identification"));
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(unlocked("a")).unwrap();
        bus.emit(unlocked("b")).unwrap();

        for expected in ["a", "b"] {
            match rx.recv().await.unwrap() {
                BflyEvent::AchievementUnlocked { achievement_id, .. } => {
                    assert_eq!(achievement_id, expected)
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let event = BflyEvent::ObservationRejected {
            submitted_by: "u1".to_string(),
            reason: "UNKNOWN_SPECIES".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ObservationRejected");
        assert_eq!(json["reason"], "UNKNOWN_SPECIES");
        assert_eq!(event.event_type(), "ObservationRejected");
    }
}
