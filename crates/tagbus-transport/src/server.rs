//! gRPC front end for a backplane and registry pair, so a plugin host in
//! another process (or a non-Rust client) can reach them over the network.
//!
//! A client-mode `tagbus-framework` `PluginHost` talks to this service
//! through [`crate::RemoteBackplane`] for all four RPCs - `RegisterTags`,
//! `Publish`, `GetLastValue`, and `Subscribe` - mirroring the handles this
//! service assigns into its own local `TagRegistry` rather than allocating
//! independently; see `DESIGN.md`.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};
use tonic::{Request, Response, Status, transport::Server};
use tracing::{debug, info};

use tagbus_core::{TagBackplane, TagRegistrationItem, TagRegistry};

use crate::pb;
use crate::pb::tag_bus_server::{TagBus, TagBusServer};

/// Wraps an `Arc<TagRegistry>` and an `Arc<dyn TagBackplane>` as one gRPC
/// service. Every RPC is a thin translation: decode the request, call the
/// registry or backplane, encode the response.
pub struct TagBusService {
    registry: Arc<TagRegistry>,
    backplane: Arc<dyn TagBackplane>,
}

impl TagBusService {
    pub fn new(registry: Arc<TagRegistry>, backplane: Arc<dyn TagBackplane>) -> Self {
        Self { registry, backplane }
    }

    /// Builds the tonic server and serves until the underlying TCP listener
    /// is dropped or the process is signalled externally.
    pub async fn serve(
        registry: Arc<TagRegistry>,
        backplane: Arc<dyn TagBackplane>,
        addr: SocketAddr,
    ) -> Result<(), tonic::transport::Error> {
        info!(%addr, "tag bus gRPC server listening");
        Server::builder()
            .add_service(TagBusServer::new(Self::new(registry, backplane)))
            .serve(addr)
            .await
    }

    /// Like [`Self::serve`], but accepts connections from a caller-supplied
    /// listener stream. Lets callers bind eagerly (so a bind failure
    /// surfaces before the serve future is even spawned) rather than letting
    /// `serve` perform the bind internally.
    pub async fn serve_incoming<I>(
        registry: Arc<TagRegistry>,
        backplane: Arc<dyn TagBackplane>,
        incoming: I,
    ) -> Result<(), tonic::transport::Error>
    where
        I: Stream<Item = std::io::Result<tokio::net::TcpStream>> + Send + 'static,
    {
        Server::builder()
            .add_service(TagBusServer::new(Self::new(registry, backplane)))
            .serve_with_incoming(incoming)
            .await
    }
}

type SubscribeStream = Pin<Box<dyn Stream<Item = Result<pb::TagEnvelope, Status>> + Send>>;

#[tonic::async_trait]
impl TagBus for TagBusService {
    async fn register_tags(
        &self,
        request: Request<pb::RegisterTagsRequest>,
    ) -> Result<Response<pb::RegisterTagsResponse>, Status> {
        let req = request.into_inner();
        let items = req
            .items
            .into_iter()
            .map(|item| {
                let role = pb::Role::try_from(item.role).unwrap_or(pb::Role::Producer).into();
                TagRegistrationItem {
                    path: item.tag_path,
                    role,
                    source_override: item.source_plugin_instance_id,
                }
            })
            .collect();

        let assigned = self.registry.register_tags(&req.plugin_instance_id, items);
        debug!(count = assigned.len(), "RegisterTags served remotely");

        Ok(Response::new(pb::RegisterTagsResponse {
            success: true,
            message: String::new(),
            assigned: assigned.into_iter().map(pb::AssignedTag::from).collect(),
        }))
    }

    async fn publish(
        &self,
        request: Request<pb::PublishRequest>,
    ) -> Result<Response<pb::PublishResponse>, Status> {
        let payload = request
            .into_inner()
            .payload
            .ok_or_else(|| Status::invalid_argument("missing payload"))?;

        let envelopes = match payload {
            pb::publish_request::Payload::Tag(envelope) => vec![envelope],
            pb::publish_request::Payload::Batch(batch) => batch.items,
        };

        for envelope in envelopes {
            let handle = envelope.handle;
            let source = envelope.source.clone();
            let timestamp_ms = envelope.timestamp_ms;
            let value = envelope
                .value
                .ok_or_else(|| Status::invalid_argument("missing value"))?
                .try_into()
                .map_err(|err: crate::error::TransportError| Status::invalid_argument(err.to_string()))?;

            self.backplane
                .publish(handle, value, source, timestamp_ms)
                .await
                .map_err(|err| Status::internal(err.to_string()))?;
        }

        Ok(Response::new(pb::PublishResponse {
            success: true,
            message: String::new(),
        }))
    }

    async fn get_last_value(
        &self,
        request: Request<pb::GetLastValueRequest>,
    ) -> Result<Response<pb::GetLastValueResponse>, Status> {
        let handle = request.into_inner().handle;
        let envelope = self
            .backplane
            .get_last_value(handle)
            .await
            .map_err(|err| Status::internal(err.to_string()))?;

        let envelope = envelope
            .map(pb::TagEnvelope::try_from)
            .transpose()
            .map_err(|err: crate::error::TransportError| Status::internal(err.to_string()))?;

        Ok(Response::new(pb::GetLastValueResponse { envelope }))
    }

    type SubscribeStream = SubscribeStream;

    async fn subscribe(
        &self,
        request: Request<pb::SubscribeRequest>,
    ) -> Result<Response<Self::SubscribeStream>, Status> {
        let handle = request.into_inner().handle;
        let mut subscription = self
            .backplane
            .subscribe(handle)
            .await
            .map_err(|err| Status::internal(err.to_string()))?;

        debug!(handle, "remote subscriber attached");

        // Forward from the backplane subscription into a fresh channel owned
        // by this task, so `subscription` (and its teardown-on-drop) stays
        // alive for exactly as long as the client keeps the stream open.
        let (tx, rx) = tokio::sync::mpsc::channel(64);

        // Per §6: send one initial update from the mirror if a value is
        // already present, before relaying live deliveries.
        if let Ok(Some(initial)) = self.backplane.get_last_value(handle).await {
            let _ = tx.send(initial).await;
        }

        tokio::spawn(async move {
            while let Some(envelope) = subscription.receiver.recv().await {
                if tx.send(envelope).await.is_err() {
                    break;
                }
            }
            debug!(handle, "remote subscriber detached");
        });

        let stream = ReceiverStream::new(rx).map(|envelope| {
            pb::TagEnvelope::try_from(envelope).map_err(|err| Status::internal(err.to_string()))
        });

        Ok(Response::new(Box::pin(stream)))
    }
}
