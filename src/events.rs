//! Engine event bus
//!
//! State transitions and per-turn completion records are published to an
//! in-process broadcast channel. The bus is constructed explicitly and
//! handed to the engine; publishing is best-effort and never blocks the
//! frame loop, and a bus with no subscribers is valid.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::engine::ConversationState;

/// Per-turn completion record
#[derive(Debug, Clone)]
pub struct TurnRecord {
    /// Turn identifier
    pub id: Uuid,
    /// When the utterance was finalized and generation began
    pub started_at: DateTime<Utc>,
    /// When generation finished
    pub completed_at: DateTime<Utc>,
    /// Accumulated assistant text, pad tokens filtered
    pub text: String,
    /// Concatenated generated audio (24kHz mono f32)
    pub audio: Vec<f32>,
    /// Generator steps spent on this turn
    pub steps: usize,
    /// Peak input visualization level during the utterance
    pub input_peak: f32,
    /// Peak output visualization level during generation
    pub output_peak: f32,
    /// True when the step budget ended the turn early
    pub truncated: bool,
}

/// Events published by the conversation engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The conversation state machine moved
    StateChanged {
        from: ConversationState,
        to: ConversationState,
    },
    /// An utterance was finalized and generation started
    TurnStarted { id: Uuid },
    /// A turn finished (naturally or truncated)
    TurnComplete(TurnRecord),
}

/// Cloneable in-process event bus
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bus retaining up to `capacity` undelivered events per
    /// subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to all future events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; lagging or absent subscribers are ignored
    pub fn publish(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        // must not panic or error
        bus.publish(EngineEvent::StateChanged {
            from: ConversationState::Idle,
            to: ConversationState::Listening,
        });
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();

        bus.publish(EngineEvent::TurnStarted { id: Uuid::new_v4() });

        match rx.recv().await.unwrap() {
            EngineEvent::TurnStarted { .. } => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
