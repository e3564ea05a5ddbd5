//! Plugin-facing façade over the tag registry and backplane: `SetTag`,
//! `GetTag`/`TryGetTag`, `DeclareProducer`/`DeclareConsumer`, `SubscribeTag`,
//! and `OnTagsRegistered`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use tagbus_core::{AssignedTag, Handle, TagBackplane, TagCoerce, TagRegistry, TagRole, TagValue};

use crate::error::TagServiceError;

/// One queued publish: value, attributed source, and producer timestamp.
type PublishMsg = (TagValue, String, u64);

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn normalize(path: &str) -> String {
    path.trim().to_ascii_lowercase()
}

type Callback = Arc<dyn Fn(TagValue) + Send + Sync>;

struct BackendSubscription {
    cancel: CancellationToken,
    join: tokio::task::JoinHandle<()>,
}

impl Drop for BackendSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.join.abort();
    }
}

#[derive(Default)]
struct PathEntry {
    handle: Option<Handle>,
    callbacks: HashMap<u64, Callback>,
    backend: Option<BackendSubscription>,
}

/// A handle to an active `SubscribeTag` registration. Dropping it removes
/// the local callback and, once the last local callback for that path is
/// gone, tears down the shared backend subscription.
pub struct Disposable {
    subscribers: Arc<Mutex<HashMap<String, PathEntry>>>,
    path: String,
    id: u64,
}

impl Drop for Disposable {
    fn drop(&mut self) {
        let mut subs = self.subscribers.lock();
        if let Some(entry) = subs.get_mut(&self.path) {
            entry.callbacks.remove(&self.id);
            if entry.callbacks.is_empty() {
                entry.backend = None;
            }
        }
    }
}

pub struct TagService {
    registry: Arc<TagRegistry>,
    backplane: Arc<dyn TagBackplane>,
    declared_roles: Mutex<HashMap<String, TagRole>>,
    subscribers: Arc<Mutex<HashMap<String, PathEntry>>>,
    next_sub_id: AtomicU64,
    /// One draining task per handle, so publishes for a given handle reach
    /// the backplane strictly in the order `set_tag` was called, even though
    /// each publish is an async operation.
    publish_queues: Mutex<HashMap<Handle, UnboundedSender<PublishMsg>>>,
}

impl TagService {
    pub fn new(registry: Arc<TagRegistry>, backplane: Arc<dyn TagBackplane>) -> Self {
        Self {
            registry,
            backplane,
            declared_roles: Mutex::new(HashMap::new()),
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            next_sub_id: AtomicU64::new(1),
            publish_queues: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the sender for `handle`'s publish queue, spawning its drain
    /// task the first time the handle is seen.
    fn publish_sender(&self, handle: Handle) -> UnboundedSender<PublishMsg> {
        let mut queues = self.publish_queues.lock();
        if let Some(sender) = queues.get(&handle) {
            return sender.clone();
        }
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<PublishMsg>();
        let backplane = self.backplane.clone();
        tokio::spawn(async move {
            while let Some((value, source, timestamp_ms)) = rx.recv().await {
                if let Err(err) = backplane.publish(handle, value, source, timestamp_ms).await {
                    error!(%err, handle, "SetTag publish failed");
                }
            }
        });
        queues.insert(handle, tx.clone());
        tx
    }

    /// Records that the calling plugin intends to write this path. Idempotent;
    /// the host consults this map when building the batch it hands to
    /// `TagRegistry::register_tags`.
    pub fn declare_producer(&self, path: &str) {
        self.declared_roles
            .lock()
            .insert(normalize(path), TagRole::Producer);
    }

    pub fn declare_consumer(&self, path: &str) {
        self.declared_roles
            .lock()
            .insert(normalize(path), TagRole::Consumer);
    }

    pub fn declared_role(&self, path: &str) -> Option<TagRole> {
        self.declared_roles.lock().get(&normalize(path)).copied()
    }

    /// Publishes `value` for `path`, attributed to `source` (normally the
    /// calling plugin's `instance_id`). Rejects unregistered paths with
    /// `NotRegistered` but does not wait for the publish - and, for a remote
    /// backplane, its RPC round-trip - to complete; failures are logged
    /// rather than propagated, matching the non-blocking `SetTag` contract.
    ///
    /// Publishes for the same handle are enqueued onto that handle's single
    /// drain task in call order, so concurrent `set_tag` calls from one
    /// producer can never reach the backplane out of order.
    pub fn set_tag(
        &self,
        path: &str,
        source: &str,
        value: impl Into<TagValue>,
    ) -> Result<(), TagServiceError> {
        let desc = self.registry.get_by_path(path)?;
        let sender = self.publish_sender(desc.handle);
        let _ = sender.send((value.into(), source.to_string(), now_ms()));
        Ok(())
    }

    /// Resolves `path`, fetches its last value, and coerces it to `T`.
    /// Returns `T::default()` on any failure (unregistered path, no value
    /// published yet, or an incompatible coercion) - this operation never
    /// fails loudly.
    pub async fn get_tag<T: TagCoerce>(&self, path: &str) -> T {
        self.try_get_tag(path).await.unwrap_or_default()
    }

    pub async fn try_get_tag<T: TagCoerce>(&self, path: &str) -> Option<T> {
        let handle = self.registry.get_by_path(path).ok()?.handle;
        let envelope = self.backplane.get_last_value(handle).await.ok()??;
        envelope.value.coerce::<T>()
    }

    /// Subscribes `callback` to updates on `path`. Multiple local callbacks
    /// for the same resolved handle share exactly one backend subscription;
    /// subscribing before the path is registered is accepted and the
    /// subscription activates once `on_tags_registered` reveals the handle.
    pub async fn subscribe_tag<F>(&self, path: &str, callback: F) -> Disposable
    where
        F: Fn(TagValue) + Send + Sync + 'static,
    {
        let key = normalize(path);
        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        let handle = self.registry.get_by_path(&key).ok().map(|d| d.handle);

        {
            let mut subs = self.subscribers.lock();
            let entry = subs.entry(key.clone()).or_default();
            if entry.handle.is_none() {
                entry.handle = handle;
            }
            entry.callbacks.insert(id, Arc::new(callback));
        }

        if let Some(handle) = handle {
            self.ensure_backend_subscription(&key, handle).await;
        }

        Disposable {
            subscribers: self.subscribers.clone(),
            path: key,
            id,
        }
    }

    /// Called by the host after a `RegisterTags` batch completes, so that
    /// subscriptions registered before their handle existed can be activated.
    pub async fn on_tags_registered(&self, assigned: &[AssignedTag]) {
        let mut to_establish = Vec::new();
        {
            let mut subs = self.subscribers.lock();
            for tag in assigned {
                let key = normalize(&tag.tag_path);
                if let Some(entry) = subs.get_mut(&key) {
                    entry.handle = Some(tag.handle);
                    if entry.backend.is_none() && !entry.callbacks.is_empty() {
                        to_establish.push((key, tag.handle));
                    }
                }
            }
        }
        for (key, handle) in to_establish {
            self.ensure_backend_subscription(&key, handle).await;
        }
    }

    async fn ensure_backend_subscription(&self, key: &str, handle: Handle) {
        let needs = {
            let subs = self.subscribers.lock();
            subs.get(key)
                .is_some_and(|e| e.backend.is_none() && !e.callbacks.is_empty())
        };
        if !needs {
            return;
        }

        let mut subscription = match self.backplane.subscribe(handle).await {
            Ok(s) => s,
            Err(err) => {
                warn!(%err, handle, "failed to establish backend subscription");
                return;
            }
        };

        let subscribers = self.subscribers.clone();
        let key_owned = key.to_string();
        let cancel = CancellationToken::new();
        let cancel_child = cancel.clone();

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_child.cancelled() => break,
                    received = subscription.receiver.recv() => {
                        let Some(envelope) = received else { break };
                        let callbacks: Vec<Callback> = {
                            let subs = subscribers.lock();
                            subs.get(&key_owned)
                                .map(|e| e.callbacks.values().cloned().collect())
                                .unwrap_or_default()
                        };
                        for callback in callbacks {
                            callback(envelope.value.clone());
                        }
                    }
                }
            }
        });

        let mut subs = self.subscribers.lock();
        if let Some(entry) = subs.get_mut(key) {
            if entry.backend.is_none() {
                entry.backend = Some(BackendSubscription { cancel, join });
            } else {
                cancel.cancel();
                join.abort();
            }
        } else {
            cancel.cancel();
            join.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use tagbus_core::{InMemoryBackplane, TagRegistration};

    fn service() -> (Arc<TagRegistry>, TagService) {
        let registry = Arc::new(TagRegistry::new());
        let backplane = Arc::new(InMemoryBackplane::new());
        let service = TagService::new(registry.clone(), backplane);
        (registry, service)
    }

    #[tokio::test]
    async fn set_tag_on_unregistered_path_fails() {
        let (_registry, service) = service();
        let err = service.set_tag("nope", "p1", TagValue::Int(1));
        assert!(matches!(err, Err(TagServiceError::NotRegistered(_))));
    }

    #[tokio::test]
    async fn get_tag_on_unknown_path_returns_default() {
        let (_registry, service) = service();
        let value: i64 = service.get_tag("nope").await;
        assert_eq!(value, 0);
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let (registry, service) = service();
        registry.register(vec![TagRegistration {
            path: "a/b".into(),
            role: TagRole::Producer,
            owner_plugin_instance_id: "p1".into(),
        }]);
        service.set_tag("a/b", "p1", 42i64).unwrap();
        // set_tag dispatches asynchronously; yield so the spawned publish runs.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let value: i64 = service.get_tag("a/b").await;
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn rapid_set_tag_calls_on_one_handle_publish_in_submission_order() {
        let (registry, service) = service();
        registry.register(vec![TagRegistration {
            path: "a/b".into(),
            role: TagRole::Producer,
            owner_plugin_instance_id: "p1".into(),
        }]);

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let _sub = service
            .subscribe_tag("a/b", move |v| {
                received_clone.lock().push(v);
            })
            .await;

        for i in 0..50i64 {
            service.set_tag("a/b", "p1", i).unwrap();
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let got: Vec<i64> = received
            .lock()
            .iter()
            .map(|v| v.coerce::<i64>().unwrap())
            .collect();
        let expected: Vec<i64> = (0..50).collect();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn subscribe_before_register_delivers_after_on_tags_registered() {
        let (registry, service) = service();
        let received = Arc::new(Mutex::new(None));
        let received_clone = received.clone();
        let _sub = service
            .subscribe_tag("x/y", move |v| {
                *received_clone.lock() = Some(v);
            })
            .await;

        let assigned = registry.register_tags(
            "producer",
            vec![tagbus_core::TagRegistrationItem {
                path: "x/y".into(),
                role: TagRole::Producer,
                source_override: None,
            }],
        );
        service.on_tags_registered(&assigned).await;

        service.set_tag("x/y", "producer", 7i64).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(*received.lock(), Some(TagValue::Int(7)));
    }

    #[tokio::test]
    async fn disposing_subscription_stops_delivery() {
        let (registry, service) = service();
        registry.register(vec![TagRegistration {
            path: "a/b".into(),
            role: TagRole::Producer,
            owner_plugin_instance_id: "p1".into(),
        }]);
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();
        let sub = service
            .subscribe_tag("a/b", move |_| called_clone.store(true, Ordering::SeqCst))
            .await;
        drop(sub);
        service.set_tag("a/b", "p1", 1i64).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!called.load(Ordering::SeqCst));
    }
}
