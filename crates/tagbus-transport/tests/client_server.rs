//! End-to-end test of the remote backplane: a real `TagBusService` bound to
//! a loopback port, reached through `RemoteBackplane` exactly as
//! `tagbus-framework`'s `PluginHost` would.

use std::sync::Arc;
use std::time::Duration;

use tagbus_core::{
    InMemoryBackplane, TagBackplane, TagRegistrar, TagRegistrationItem, TagRegistry, TagRole,
    TagValue,
};
use tagbus_transport::{RemoteBackplane, TagBusService};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;

async fn spawn_server() -> (String, Arc<TagRegistry>, Arc<InMemoryBackplane>) {
    let registry = Arc::new(TagRegistry::new());
    let backplane = Arc::new(InMemoryBackplane::new());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let incoming = TcpListenerStream::new(listener);

    let registry_for_server = registry.clone();
    let backplane_for_server: Arc<dyn TagBackplane> = backplane.clone();
    tokio::spawn(async move {
        TagBusService::serve_incoming(registry_for_server, backplane_for_server, incoming)
            .await
            .unwrap();
    });

    (format!("http://{addr}"), registry, backplane)
}

#[tokio::test]
async fn publish_through_remote_backplane_reaches_the_server_side_mirror() {
    let (endpoint, registry, backplane) = spawn_server().await;
    let assigned = registry.register_tags(
        "gateway",
        vec![TagRegistrationItem {
            path: "plant/line1/temperature".into(),
            role: TagRole::Producer,
            source_override: None,
        }],
    );
    let handle = assigned[0].handle;

    let remote = RemoteBackplane::connect(endpoint).await.unwrap();
    remote
        .publish(handle, TagValue::Float(72.5), "gateway".into(), 0)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let mirrored = backplane.get_last_value(handle).unwrap().unwrap();
    assert_eq!(mirrored.value, TagValue::Float(72.5));
}

#[tokio::test]
async fn get_last_value_round_trips_through_the_wire() {
    let (endpoint, registry, backplane) = spawn_server().await;
    let assigned = registry.register_tags(
        "gateway",
        vec![TagRegistrationItem {
            path: "plant/line1/pressure".into(),
            role: TagRole::Producer,
            source_override: None,
        }],
    );
    let handle = assigned[0].handle;
    backplane
        .publish(handle, TagValue::Int(101), "gateway", 0)
        .unwrap();

    let remote = RemoteBackplane::connect(endpoint).await.unwrap();
    let value = remote.get_last_value(handle).await.unwrap().unwrap();
    assert_eq!(value.value, TagValue::Int(101));
}

#[tokio::test]
async fn get_last_value_on_unpublished_handle_is_none() {
    let (endpoint, registry, _backplane) = spawn_server().await;
    let assigned = registry.register_tags(
        "gateway",
        vec![TagRegistrationItem {
            path: "plant/line1/unused".into(),
            role: TagRole::Producer,
            source_override: None,
        }],
    );
    let handle = assigned[0].handle;

    let remote = RemoteBackplane::connect(endpoint).await.unwrap();
    assert!(remote.get_last_value(handle).await.unwrap().is_none());
}

#[tokio::test]
async fn subscribe_delivers_the_mirrored_value_then_live_updates() {
    let (endpoint, registry, backplane) = spawn_server().await;
    let assigned = registry.register_tags(
        "gateway",
        vec![TagRegistrationItem {
            path: "plant/line1/flow".into(),
            role: TagRole::Producer,
            source_override: None,
        }],
    );
    let handle = assigned[0].handle;
    backplane
        .publish(handle, TagValue::Float(1.0), "gateway", 0)
        .unwrap();

    let remote = RemoteBackplane::connect(endpoint).await.unwrap();
    let mut subscription = remote.subscribe(handle).await.unwrap();

    let first = subscription.receiver.recv().await.unwrap();
    assert_eq!(first.value, TagValue::Float(1.0));

    backplane
        .publish(handle, TagValue::Float(2.0), "gateway", 1)
        .unwrap();
    let second = subscription.receiver.recv().await.unwrap();
    assert_eq!(second.value, TagValue::Float(2.0));
}

#[tokio::test]
async fn register_tags_over_the_wire_assigns_a_stable_handle() {
    let (endpoint, registry, _backplane) = spawn_server().await;

    let remote = RemoteBackplane::connect(endpoint).await.unwrap();
    let assigned = remote
        .register_tags(
            "remote-plugin",
            vec![TagRegistrationItem {
                path: "plant/line1/remote".into(),
                role: TagRole::Producer,
                source_override: None,
            }],
        )
        .await
        .unwrap();

    assert_eq!(assigned.len(), 1);
    assert_eq!(
        registry.get_by_path("plant/line1/remote").unwrap().handle,
        assigned[0].handle
    );
}

#[tokio::test]
async fn register_tags_over_the_wire_is_idempotent_across_clients() {
    let (endpoint, registry, _backplane) = spawn_server().await;

    let remote = RemoteBackplane::connect(endpoint).await.unwrap();
    let first = remote
        .register_tags(
            "p1",
            vec![TagRegistrationItem {
                path: "a/b".into(),
                role: TagRole::Producer,
                source_override: None,
            }],
        )
        .await
        .unwrap();
    let second = remote
        .register_tags(
            "p1",
            vec![TagRegistrationItem {
                path: "a/b".into(),
                role: TagRole::Producer,
                source_override: None,
            }],
        )
        .await
        .unwrap();

    assert_eq!(first[0].handle, second[0].handle);
    assert_eq!(registry.get_by_path("a/b").unwrap().handle, first[0].handle);
}
