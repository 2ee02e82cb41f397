// src/events.rs

use serde::Serialize;
use tokio::sync::broadcast;

pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Notifications emitted by the quiz/attempt write paths.
///
/// Consumers (cache invalidation, websocket fan-out) are external; the
/// transport is not modeled here. Events are fire-and-forget: a send into a
/// channel with no subscribers is not an error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    QuizChanged { quiz_id: i64, lesson_id: i64 },
    QuizDeleted { quiz_id: i64, lesson_id: i64 },
    QuestionChanged { quiz_id: i64, question_id: i64 },
    AttemptStarted { attempt_id: i64, quiz_id: i64, user_id: i64 },
    AttemptCompleted { attempt_id: i64, quiz_id: i64, user_id: i64, passed: bool },
    AttemptRegraded { attempt_id: i64 },
}

/// Publishes an event, ignoring the no-subscribers case.
pub fn publish(tx: &broadcast::Sender<DomainEvent>, event: DomainEvent) {
    if let Err(e) = tx.send(event) {
        tracing::debug!("No event subscribers: {:?}", e.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let (tx, mut rx) = broadcast::channel(8);
        publish(
            &tx,
            DomainEvent::QuizChanged {
                quiz_id: 1,
                lesson_id: 9,
            },
        );
        match rx.recv().await.unwrap() {
            DomainEvent::QuizChanged { quiz_id, lesson_id } => {
                assert_eq!(quiz_id, 1);
                assert_eq!(lesson_id, 9);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let (tx, _) = broadcast::channel::<DomainEvent>(8);
        // Receiver dropped immediately; publishing must not panic.
        publish(&tx, DomainEvent::AttemptRegraded { attempt_id: 3 });
    }
}
