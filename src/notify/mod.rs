// Notification and real-time event contracts
//
// Both collaborators are strictly best-effort: the caller logs a failure and
// moves on. A delivery error must never fail or roll back a state transition,
// so nothing in this module is invoked inside a database transaction.

use async_trait::async_trait;

/// Error raised by a notification backend
#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Push-notification contract consumed by the ride core
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification to a single user. Fire and forget.
    async fn notify(
        &self,
        user_id: i32,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<(), NotifyError>;
}

/// Real-time event-room contract (e.g. a websocket room per ride)
#[async_trait]
pub trait EventRoom: Send + Sync {
    /// Emit an event to everyone in the room. Fire and forget.
    async fn emit(
        &self,
        room: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError>;
}

/// Default backend that only logs; real delivery lives behind the gateway
/// this service talks to in production.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        user_id: i32,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<(), NotifyError> {
        tracing::info!(user_id, title, body, %data, "notification dispatched");
        Ok(())
    }
}

#[async_trait]
impl EventRoom for LogNotifier {
    async fn emit(
        &self,
        room: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError> {
        tracing::info!(room, event, %payload, "room event emitted");
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every notification for assertions; can be told to fail so
    /// tests can prove delivery failures never surface to callers.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(i32, String)>>,
        pub events: Mutex<Vec<(String, String)>>,
        pub fail: bool,
    }

    impl RecordingNotifier {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(
            &self,
            user_id: i32,
            title: &str,
            _body: &str,
            _data: serde_json::Value,
        ) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError("simulated outage".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((user_id, title.to_string()));
            Ok(())
        }
    }

    #[async_trait]
    impl EventRoom for RecordingNotifier {
        async fn emit(
            &self,
            room: &str,
            event: &str,
            _payload: serde_json::Value,
        ) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError("simulated outage".to_string()));
            }
            self.events
                .lock()
                .unwrap()
                .push((room.to_string(), event.to_string()));
            Ok(())
        }
    }
}
