//! Operator gRPC API
//!
//! Serves configuration/component/subscription reads and the long-lived
//! `ComponentUpdate` stream. Every connected sidecar registers a bounded
//! per-stream queue keyed by a fresh identifier; component changes are
//! broadcast to every queue under a single registry mutex, serializing
//! fan-out with registration and deregistration.

pub mod channel;

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use gantry_proto::operator_server::{Operator, OperatorServer};
use gantry_proto::{
    ComponentUpdateEvent, ComponentUpdateRequest, GetConfigurationRequest,
    GetConfigurationResponse, ListComponentsRequest, ListComponentsResponse,
    ListSubscriptionsRequest, ListSubscriptionsResponse,
};
use gantry_resources::{Component, SUBSCRIPTION_API_VERSION_V2ALPHA1};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::secrets::process_component_secrets;
use crate::store::ResourceStore;
use channel::UpdateChannel;

/// Capacity of each per-subscriber queue. One slot: together with the
/// registry mutex this strongly serializes broadcast with registration.
const UPDATE_CHANNEL_CAPACITY: usize = 1;

/// Capacity of the outbound wire buffer per stream
const OUTBOUND_BUFFER: usize = 32;

type ChannelMap = Arc<Mutex<HashMap<Uuid, Arc<UpdateChannel>>>>;

/// The operator API server
pub struct OperatorApi {
    store: Arc<dyn ResourceStore>,
    channels: ChannelMap,
}

impl OperatorApi {
    /// Create the API server over a resource store
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Convert to a tonic service
    pub fn into_service(self) -> OperatorServer<Self> {
        OperatorServer::new(self)
    }

    /// Number of currently registered update streams
    pub async fn subscriber_count(&self) -> usize {
        self.channels.lock().await.len()
    }

    /// Fan a component change out to every connected sidecar.
    ///
    /// Holding the registry lock across the sends bounds the time a slow
    /// subscriber can stall others to one queued item each; a closed queue
    /// is skipped.
    pub async fn on_component_updated(&self, component: &Component) {
        let channels = self.channels.lock().await;
        for chan in channels.values() {
            if chan.send(component.clone()).await.is_err() {
                // Stream worker is shutting this queue down
                debug!(component = component.name(), "update channel closed, dropping event");
            }
        }
    }
}

/// Per-stream worker: consumes the queue sequentially so delivery order
/// equals enqueue order for this subscriber.
async fn stream_worker(
    store: Arc<dyn ResourceStore>,
    channels: ChannelMap,
    key: Uuid,
    chan: Arc<UpdateChannel>,
    mut rx: mpsc::Receiver<Component>,
    namespace: String,
    pod_name: String,
    out_tx: mpsc::Sender<Result<ComponentUpdateEvent, Status>>,
) {
    while let Some(component) = rx.recv().await {
        if component.namespace() != namespace {
            continue;
        }

        let mut component = component;
        if let Err(e) =
            process_component_secrets(&mut component, &namespace, store.as_ref()).await
        {
            warn!(
                component = component.name(),
                pod = %pod_name,
                error = %e,
                "error processing component secrets, dropping event"
            );
            continue;
        }

        let blob = match serde_json::to_vec(&component) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(component = component.name(), error = %e, "error serializing component, dropping event");
                continue;
            }
        };

        if out_tx
            .send(Ok(ComponentUpdateEvent { component: blob }))
            .await
            .is_err()
        {
            warn!(pod = %pod_name, "sidecar stream unavailable, closing update channel");
            chan.close();
            break;
        }
        info!(component = component.name(), pod = %pod_name, "updated sidecar with component");
    }

    // The receiver must be gone before taking the registry lock: a broadcast
    // blocked on this queue then fails fast instead of deadlocking
    drop(rx);
    channels.lock().await.remove(&key);
    chan.close();
    info!(pod = %pod_name, "component update stream closed");
}

#[tonic::async_trait]
impl Operator for OperatorApi {
    async fn get_configuration(
        &self,
        request: Request<GetConfigurationRequest>,
    ) -> Result<Response<GetConfigurationResponse>, Status> {
        let req = request.into_inner();
        let configuration = self
            .store
            .get_configuration(&req.namespace, &req.name)
            .await
            .map_err(|e| Status::internal(format!("error getting configuration: {e}")))?;
        let blob = serde_json::to_vec(&configuration)
            .map_err(|e| Status::internal(format!("error serializing configuration: {e}")))?;
        Ok(Response::new(GetConfigurationResponse {
            configuration: blob,
        }))
    }

    async fn list_components(
        &self,
        request: Request<ListComponentsRequest>,
    ) -> Result<Response<ListComponentsResponse>, Status> {
        let req = request.into_inner();
        let components = self
            .store
            .list_components(&req.namespace)
            .await
            .map_err(|e| Status::internal(format!("error getting components: {e}")))?;

        let mut blobs = Vec::with_capacity(components.len());
        for mut component in components {
            // A secret-resolution failure aborts the whole call
            process_component_secrets(&mut component, &req.namespace, self.store.as_ref())
                .await
                .map_err(|e| {
                    warn!(
                        component = component.name(),
                        namespace = %req.namespace,
                        pod = %req.pod_name,
                        error = %e,
                        "error processing component secrets"
                    );
                    Status::internal(format!("error processing component secrets: {e}"))
                })?;

            match serde_json::to_vec(&component) {
                Ok(blob) => blobs.push(blob),
                Err(e) => {
                    warn!(component = component.name(), error = %e, "error serializing component, skipping");
                }
            }
        }
        Ok(Response::new(ListComponentsResponse { components: blobs }))
    }

    async fn list_subscriptions(
        &self,
        request: Request<ListSubscriptionsRequest>,
    ) -> Result<Response<ListSubscriptionsResponse>, Status> {
        let req = request.into_inner();
        let subscriptions = self
            .store
            .list_subscriptions()
            .await
            .map_err(|e| Status::internal(format!("error getting subscriptions: {e}")))?;

        let mut blobs = Vec::new();
        for listed in subscriptions {
            // Only the storage version is returned
            if listed.api_version != SUBSCRIPTION_API_VERSION_V2ALPHA1 {
                continue;
            }
            match serde_json::to_vec(&listed.subscription) {
                Ok(blob) => blobs.push(blob),
                Err(e) => {
                    warn!(
                        namespace = %req.namespace,
                        pod = %req.pod_name,
                        error = %e,
                        "error serializing subscription, skipping"
                    );
                }
            }
        }
        Ok(Response::new(ListSubscriptionsResponse {
            subscriptions: blobs,
        }))
    }

    type ComponentUpdateStream =
        Pin<Box<dyn Stream<Item = Result<ComponentUpdateEvent, Status>> + Send + 'static>>;

    async fn component_update(
        &self,
        request: Request<ComponentUpdateRequest>,
    ) -> Result<Response<Self::ComponentUpdateStream>, Status> {
        let req = request.into_inner();
        info!(namespace = %req.namespace, pod = %req.pod_name, "sidecar connected for component updates");

        let key = Uuid::new_v4();
        let (chan, rx) = UpdateChannel::new(UPDATE_CHANNEL_CAPACITY);
        let chan = Arc::new(chan);
        self.channels.lock().await.insert(key, chan.clone());

        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_BUFFER);
        tokio::spawn(stream_worker(
            self.store.clone(),
            self.channels.clone(),
            key,
            chan,
            rx,
            req.namespace,
            req.pod_name,
            out_tx,
        ));

        Ok(Response::new(Box::pin(ReceiverStream::new(out_rx))))
    }
}
