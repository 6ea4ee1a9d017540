//! Notifications published after a committed import.

use std::sync::Mutex;

use serde::Serialize;
use tracing::info;

/// What changed, for observers outside the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    ActivePeriodChanged {
        period_id: String,
        period_name: String,
        source: String,
    },
    DataChanged,
}

/// Receives notifications. Called only after the transaction committed.
pub trait EventSink: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Logs every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn notify(&self, notification: &Notification) {
        match notification {
            Notification::ActivePeriodChanged {
                period_id,
                period_name,
                source,
            } => info!(period = %period_id, name = %period_name, %source, "Active period changed"),
            Notification::DataChanged => info!("Data changed"),
        }
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    received: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far.
    pub fn received(&self) -> Vec<Notification> {
        self.received
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl EventSink for RecordingSink {
    fn notify(&self, notification: &Notification) {
        if let Ok(mut received) = self.received.lock() {
            received.push(notification.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.notify(&Notification::ActivePeriodChanged {
            period_id: "p1".into(),
            period_name: "Fall".into(),
            source: "import".into(),
        });
        sink.notify(&Notification::DataChanged);

        let received = sink.received();
        assert_eq!(received.len(), 2);
        assert_eq!(received[1], Notification::DataChanged);
    }

    #[test]
    fn test_notification_json_shape() {
        let json = serde_json::to_value(Notification::ActivePeriodChanged {
            period_id: "p1".into(),
            period_name: "Fall".into(),
            source: "import".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "active_period_changed");
        assert_eq!(json["source"], "import");
    }
}
