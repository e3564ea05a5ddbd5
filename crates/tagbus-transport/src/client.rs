//! Remote `TagBackplane` implementation: a thin gRPC client satisfying the
//! same capability trait `InMemoryBackplane` implements, so the tag service
//! and plugin host never need to know which one they are talking to.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;
use tracing::warn;

use tagbus_core::{
    AssignedTag, BackplaneError, BackplaneResult, Handle, Subscription, TagBackplane,
    TagEnvelope, TagRegistrar, TagRegistrationItem, TagValue,
};

use crate::error::TransportError;
use crate::pb;
use crate::pb::tag_bus_client::TagBusClient;

/// A backplane reached over gRPC. Cloning is cheap - the underlying
/// `tonic` client multiplexes calls over one HTTP/2 connection.
#[derive(Clone)]
pub struct RemoteBackplane {
    client: TagBusClient<Channel>,
}

impl RemoteBackplane {
    /// Connects to `endpoint` (e.g. `http://127.0.0.1:50051`).
    pub async fn connect(endpoint: impl Into<String>) -> Result<Self, TransportError> {
        let client = TagBusClient::connect(endpoint.into()).await?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TagBackplane for RemoteBackplane {
    async fn publish(
        &self,
        handle: Handle,
        value: TagValue,
        source: String,
        timestamp_ms: u64,
    ) -> BackplaneResult<()> {
        let envelope = pb::TagEnvelope {
            handle,
            value: Some(value.into()),
            timestamp_ms,
            quality: pb::Quality::Good as i32,
            source,
        };
        let request = pb::PublishRequest {
            payload: Some(pb::publish_request::Payload::Tag(envelope)),
        };
        self.client
            .clone()
            .publish(request)
            .await
            .map_err(TransportError::from)?;
        Ok(())
    }

    async fn get_last_value(&self, handle: Handle) -> BackplaneResult<Option<TagEnvelope>> {
        let response = self
            .client
            .clone()
            .get_last_value(pb::GetLastValueRequest { handle })
            .await
            .map_err(TransportError::from)?
            .into_inner();

        response
            .envelope
            .map(TagEnvelope::try_from)
            .transpose()
            .map_err(BackplaneError::from)
    }

    /// Opens the server-streaming `Subscribe` RPC and relays deliveries into
    /// a local channel. Dropping the returned `Subscription` cancels the
    /// forwarding task, which closes the gRPC stream from the client side -
    /// this is the channel `tagbus-framework`'s auto-wire teardown relies on
    /// for Scenario F-style unsubscribe-on-drop behavior.
    async fn subscribe(&self, handle: Handle) -> BackplaneResult<Subscription> {
        let mut stream = self
            .client
            .clone()
            .subscribe(pb::SubscribeRequest { handle })
            .await
            .map_err(TransportError::from)?
            .into_inner();

        let (tx, rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_task.cancelled() => break,
                    item = stream.message() => {
                        match item {
                            Ok(Some(envelope)) => {
                                match TagEnvelope::try_from(envelope) {
                                    Ok(envelope) => {
                                        if tx.send(envelope).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(err) => {
                                        warn!(%err, handle, "malformed envelope from remote backplane");
                                    }
                                }
                            }
                            Ok(None) => break,
                            Err(err) => {
                                warn!(%err, handle, "remote subscription stream error");
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(Subscription::new(rx, move || cancel.cancel()))
    }
}

#[async_trait]
impl TagRegistrar for RemoteBackplane {
    /// Calls the server's `RegisterTags` RPC and returns the handles it
    /// assigned, so a client-mode host's local registry mirrors the
    /// server's allocation instead of numbering handles independently.
    async fn register_tags(
        &self,
        reference_plugin_instance_id: &str,
        items: Vec<TagRegistrationItem>,
    ) -> BackplaneResult<Vec<AssignedTag>> {
        let request = pb::RegisterTagsRequest {
            plugin_instance_id: reference_plugin_instance_id.to_string(),
            items: items
                .into_iter()
                .map(|item| pb::RegisterTagsItem {
                    tag_path: item.path,
                    role: pb::Role::from(item.role) as i32,
                    source_plugin_instance_id: item.source_override,
                })
                .collect(),
        };

        let response = self
            .client
            .clone()
            .register_tags(request)
            .await
            .map_err(TransportError::from)?
            .into_inner();

        Ok(response.assigned.into_iter().map(AssignedTag::from).collect())
    }
}
