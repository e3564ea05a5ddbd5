//! In-memory last-value mirror and fan-out subscription delivery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{BackplaneError, BackplaneResult};
use crate::types::{Handle, Quality, TagEnvelope, TagValue};

/// Depth of a subscriber's delivery channel. A subscriber that falls behind
/// this many unconsumed updates has its oldest pending update dropped
/// rather than stalling the publisher.
const SUBSCRIBER_CHANNEL_DEPTH: usize = 256;

static SUBSCRIBER_IDS: AtomicU64 = AtomicU64::new(1);

/// A handle to an active subscription. Dropping it unsubscribes, whether the
/// subscription is backed by the in-memory backplane or a remote transport.
pub struct Subscription {
    pub receiver: mpsc::Receiver<TagEnvelope>,
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Builds a subscription from a receiver and an arbitrary teardown
    /// callback, invoked exactly once when the subscription is dropped.
    pub fn new(receiver: mpsc::Receiver<TagEnvelope>, teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            receiver,
            teardown: Some(Box::new(teardown)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

struct BackplaneInner {
    last_values: RwLock<HashMap<Handle, TagEnvelope>>,
    subscribers: RwLock<HashMap<Handle, Vec<(u64, mpsc::Sender<TagEnvelope>)>>>,
    per_handle_locks: Mutex<HashMap<Handle, Arc<Mutex<()>>>>,
    disposed: AtomicBool,
}

impl BackplaneInner {
    fn handle_lock(&self, handle: Handle) -> Arc<Mutex<()>> {
        self.per_handle_locks
            .lock()
            .entry(handle)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn unsubscribe(&self, handle: Handle, id: u64) {
        if let Some(subs) = self.subscribers.write().get_mut(&handle) {
            subs.retain(|(sub_id, _)| *sub_id != id);
        }
    }
}

/// An in-process publish/subscribe value mirror, keyed by registry handle.
///
/// Publishes to different handles never contend: each handle has its own
/// lock, taken only for the duration of updating that handle's last value
/// and notifying its subscribers.
pub struct InMemoryBackplane {
    inner: Arc<BackplaneInner>,
}

impl Default for InMemoryBackplane {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackplane {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BackplaneInner {
                last_values: RwLock::new(HashMap::new()),
                subscribers: RwLock::new(HashMap::new()),
                per_handle_locks: Mutex::new(HashMap::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    fn check_disposed(&self) -> BackplaneResult<()> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(BackplaneError::Disposed);
        }
        Ok(())
    }

    /// Publishes a value for `handle`, updating the last-value mirror and
    /// fanning the update out to every live subscriber. Ordering between
    /// publishes to the *same* handle is preserved; publishes to different
    /// handles never block one another.
    pub fn publish(
        &self,
        handle: Handle,
        value: TagValue,
        source: impl Into<String>,
        timestamp_ms: u64,
    ) -> BackplaneResult<()> {
        self.check_disposed()?;
        let lock = self.inner.handle_lock(handle);
        let _guard = lock.lock();

        let envelope = TagEnvelope {
            handle,
            value,
            timestamp_ms,
            quality: Quality::Good,
            source: source.into(),
        };

        self.inner
            .last_values
            .write()
            .insert(handle, envelope.clone());

        if let Some(subs) = self.inner.subscribers.read().get(&handle) {
            for (id, tx) in subs {
                if let Err(err) = tx.try_send(envelope.clone()) {
                    warn!(handle, subscriber = id, %err, "dropping update for slow subscriber");
                }
            }
        }

        Ok(())
    }

    /// Returns the last published value for `handle`, if any.
    pub fn get_last_value(&self, handle: Handle) -> BackplaneResult<Option<TagEnvelope>> {
        self.check_disposed()?;
        Ok(self.inner.last_values.read().get(&handle).cloned())
    }

    /// Subscribes to future updates for `handle`. The returned
    /// [`Subscription`] owns a bounded channel; dropping it unsubscribes.
    pub fn subscribe(&self, handle: Handle) -> BackplaneResult<Subscription> {
        self.check_disposed()?;
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_DEPTH);
        let id = SUBSCRIBER_IDS.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .write()
            .entry(handle)
            .or_default()
            .push((id, tx));
        let inner = self.inner.clone();
        Ok(Subscription::new(rx, move || inner.unsubscribe(handle, id)))
    }

    /// Number of live subscribers for `handle`.
    pub fn subscriber_count(&self, handle: Handle) -> usize {
        self.inner
            .subscribers
            .read()
            .get(&handle)
            .map_or(0, |v| v.len())
    }

    /// Tears the backplane down: clears all state and rejects further use.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::Release);
        self.inner.last_values.write().clear();
        self.inner.subscribers.write().clear();
    }
}

impl Clone for InMemoryBackplane {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_subscribe_sees_last_value_not_replayed() {
        let bp = InMemoryBackplane::new();
        bp.publish(1, TagValue::Int(41), "test", 0).unwrap();
        let mut sub = bp.subscribe(1).unwrap();
        assert_eq!(
            bp.get_last_value(1).unwrap().unwrap().value,
            TagValue::Int(41)
        );
        bp.publish(1, TagValue::Int(42), "test", 1).unwrap();
        let update = sub.receiver.recv().await.unwrap();
        assert_eq!(update.value, TagValue::Int(42));
    }

    #[test]
    fn unknown_handle_last_value_is_none() {
        let bp = InMemoryBackplane::new();
        assert!(bp.get_last_value(7).unwrap().is_none());
    }

    #[tokio::test]
    async fn dropping_subscription_removes_it() {
        let bp = InMemoryBackplane::new();
        {
            let _sub = bp.subscribe(5).unwrap();
            assert_eq!(bp.subscriber_count(5), 1);
        }
        assert_eq!(bp.subscriber_count(5), 0);
    }

    #[test]
    fn disposed_backplane_rejects_operations() {
        let bp = InMemoryBackplane::new();
        bp.dispose();
        assert!(matches!(
            bp.publish(1, TagValue::Bool(true), "x", 0),
            Err(BackplaneError::Disposed)
        ));
        assert!(matches!(
            bp.get_last_value(1),
            Err(BackplaneError::Disposed)
        ));
        assert!(matches!(bp.subscribe(1), Err(BackplaneError::Disposed)));
    }

    #[tokio::test]
    async fn independent_handles_do_not_cross_deliver() {
        let bp = InMemoryBackplane::new();
        let mut sub_a = bp.subscribe(1).unwrap();
        let mut sub_b = bp.subscribe(2).unwrap();
        bp.publish(1, TagValue::Int(1), "t", 0).unwrap();
        bp.publish(2, TagValue::Int(2), "t", 0).unwrap();
        assert_eq!(sub_a.receiver.recv().await.unwrap().handle, 1);
        assert_eq!(sub_b.receiver.recv().await.unwrap().handle, 2);
    }
}
