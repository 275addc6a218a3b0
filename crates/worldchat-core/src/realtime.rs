//! Per-group realtime fan-out
//!
//! Best effort: a subscriber that falls more than the channel capacity behind
//! loses events and is expected to refetch lines from storage.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::constants::realtime::GROUP_CHANNEL_CAPACITY;
use crate::generation::SchedulerStatus;
use crate::storage::ConversationLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Event pushed to a group's subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GroupEvent {
    LineInserted { line: ConversationLine },
    Notice { level: NoticeLevel, message: String },
    Status { status: SchedulerStatus },
    /// Events were dropped; refetch from storage
    Resync,
}

/// Broadcast channels keyed by world group id
#[derive(Clone, Default)]
pub struct ConversationHub {
    channels: Arc<DashMap<String, broadcast::Sender<GroupEvent>>>,
}

impl ConversationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, world_group_id: &str) -> broadcast::Receiver<GroupEvent> {
        self.channels
            .entry(world_group_id.to_string())
            .or_insert_with(|| broadcast::channel(GROUP_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Send to current subscribers; returns how many received it
    pub fn publish(&self, world_group_id: &str, event: GroupEvent) -> usize {
        let Some(sender) = self.channels.get(world_group_id) else {
            return 0;
        };
        sender.send(event).unwrap_or(0)
    }

    pub fn notice(&self, world_group_id: &str, level: NoticeLevel, message: impl Into<String>) {
        self.publish(
            world_group_id,
            GroupEvent::Notice {
                level,
                message: message.into(),
            },
        );
    }

    /// Drop a group's channel; open subscriptions end
    pub fn remove(&self, world_group_id: &str) {
        self.channels.remove(world_group_id);
    }

    pub fn subscriber_count(&self, world_group_id: &str) -> usize {
        self.channels
            .get(world_group_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn test_publish_reaches_group_subscribers_only() {
        let hub = ConversationHub::new();
        let mut a = hub.subscribe("a");
        let mut b = hub.subscribe("b");

        assert_eq!(hub.publish("a", GroupEvent::Resync), 1);
        assert!(matches!(a.recv().await.unwrap(), GroupEvent::Resync));
        assert!(b.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let hub = ConversationHub::new();
        assert_eq!(hub.publish("nobody", GroupEvent::Resync), 0);
        assert_eq!(hub.subscriber_count("nobody"), 0);
    }

    #[tokio::test]
    async fn test_remove_closes_subscriptions() {
        let hub = ConversationHub::new();
        let mut rx = hub.subscribe("a");
        hub.remove("a");
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
    }

    #[test]
    fn test_event_wire_format() {
        let notice = GroupEvent::Notice {
            level: NoticeLevel::Error,
            message: "paused".into(),
        };
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["type"], "notice");
        assert_eq!(json["level"], "error");

        let json = serde_json::to_value(GroupEvent::Resync).unwrap();
        assert_eq!(json, serde_json::json!({"type": "resync"}));
    }
}
