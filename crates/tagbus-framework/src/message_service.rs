//! Host-level message service.
//!
//! Distinct from the tag bus: tags carry typed process values with a
//! last-value mirror, while messages are fire-and-forget topic broadcasts
//! (used, for instance, by a consumer plugin raising `alarm.high_temperature`
//! when a subscribed tag crosses a threshold). No mirror, no replay - a
//! subscriber only sees messages published after it subscribes.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::warn;

const CHANNEL_CAPACITY: usize = 256;

/// A broadcast message: a topic plus an arbitrary string payload.
#[derive(Debug, Clone)]
pub struct PluginMessage {
    pub topic: String,
    pub payload: String,
}

/// Per-topic fan-out broadcast, shared by every plugin through the context.
pub struct MessageService {
    topics: Mutex<HashMap<String, broadcast::Sender<PluginMessage>>>,
}

impl Default for MessageService {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageService {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<PluginMessage> {
        self.topics
            .lock()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Broadcasts `payload` on `topic`. A no-op (not an error) if nobody is
    /// currently subscribed.
    pub fn publish(&self, topic: &str, payload: impl Into<String>) {
        let sender = self.sender_for(topic);
        let message = PluginMessage {
            topic: topic.to_string(),
            payload: payload.into(),
        };
        if sender.send(message).is_err() {
            warn!(topic, "published message with no subscribers");
        }
    }

    /// Subscribes to `topic`, receiving messages published from this point
    /// onward.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<PluginMessage> {
        self.sender_for(topic).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_a_message_published_after_subscribing() {
        let service = MessageService::new();
        let mut rx = service.subscribe("alarm.high_temperature");

        service.publish("alarm.high_temperature", "line1 over threshold");

        let message = rx.recv().await.unwrap();
        assert_eq!(message.topic, "alarm.high_temperature");
        assert_eq!(message.payload, "line1 over threshold");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let service = MessageService::new();
        service.publish("nobody.listening", "ignored");
    }

    #[tokio::test]
    async fn subscriber_does_not_see_messages_published_before_it_subscribed() {
        let service = MessageService::new();
        service.publish("alarm.high_temperature", "before");

        let mut rx = service.subscribe("alarm.high_temperature");
        service.publish("alarm.high_temperature", "after");

        let message = rx.recv().await.unwrap();
        assert_eq!(message.payload, "after");
    }

    #[tokio::test]
    async fn distinct_topics_do_not_cross_deliver() {
        let service = MessageService::new();
        let mut temp_rx = service.subscribe("temp");
        let mut pressure_rx = service.subscribe("pressure");

        service.publish("temp", "hot");

        let message = temp_rx.recv().await.unwrap();
        assert_eq!(message.payload, "hot");
        assert!(pressure_rx.try_recv().is_err());
    }
}
