//! Cluster component loader
//!
//! Fetches component definitions from the operator over gRPC, with bounded
//! retries and a per-call timeout, and exposes the live `ComponentUpdate`
//! stream. Each returned blob is deserialized independently; a blob that
//! fails to decode is logged and skipped.

use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use gantry_common::{Error, Result};
use gantry_proto::operator_client::OperatorClient;
use gantry_proto::{ComponentUpdateRequest, ListComponentsRequest};
use gantry_resources::Component;
use tokio_stream::StreamExt;
use tonic::transport::Channel;
use tracing::{info, warn};

use super::ComponentLoader;

/// Per-call timeout against the operator
const OPERATOR_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum attempts for the initial component list
const OPERATOR_MAX_RETRIES: u32 = 100;

/// Delay between retry attempts
const RETRY_DELAY: Duration = Duration::from_millis(200);

/// Loads component definitions from the operator API
pub struct ClusterLoader {
    client: OperatorClient<Channel>,
    namespace: String,
    pod_name: String,
}

impl ClusterLoader {
    /// Create a loader for the given subscriber identity
    pub fn new(
        client: OperatorClient<Channel>,
        namespace: impl Into<String>,
        pod_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            pod_name: pod_name.into(),
        }
    }

    fn request(&self) -> ListComponentsRequest {
        ListComponentsRequest {
            namespace: self.namespace.clone(),
            pod_name: self.pod_name.clone(),
        }
    }

    /// Open the live component-update stream.
    ///
    /// The stream yields decoded components until the connection drops or
    /// the caller drops the stream; undecodable events are skipped.
    pub async fn stream_updates(&self) -> Result<impl Stream<Item = Component>> {
        let mut client = self.client.clone();
        let response = client
            .component_update(ComponentUpdateRequest {
                namespace: self.namespace.clone(),
                pod_name: self.pod_name.clone(),
            })
            .await
            .map_err(|status| Error::unavailable(format!("opening component update stream: {status}")))?;

        info!(namespace = %self.namespace, pod = %self.pod_name, "component update stream open");

        let inbound = response.into_inner();
        Ok(inbound.filter_map(|event| match event {
            Ok(event) => decode_component(&event.component),
            Err(status) => {
                warn!(error = %status, "component update stream error");
                None
            }
        }))
    }
}

fn decode_component(blob: &[u8]) -> Option<Component> {
    match serde_json::from_slice::<Component>(blob) {
        Ok(component) => Some(component),
        Err(e) => {
            warn!(error = %e, "error deserializing component");
            None
        }
    }
}

#[async_trait]
impl ComponentLoader for ClusterLoader {
    async fn load(&self) -> Result<Vec<Component>> {
        let mut last_error = None;
        for attempt in 1..=OPERATOR_MAX_RETRIES {
            let mut client = self.client.clone();
            let call = client.list_components(self.request());
            match tokio::time::timeout(OPERATOR_CALL_TIMEOUT, call).await {
                Ok(Ok(response)) => {
                    let components = response
                        .into_inner()
                        .components
                        .iter()
                        .filter_map(|blob| decode_component(blob))
                        .collect();
                    return Ok(components);
                }
                Ok(Err(status)) => {
                    warn!(attempt, error = %status, "list components failed");
                    last_error = Some(Error::unavailable(format!("listing components: {status}")));
                }
                Err(_) => {
                    warn!(attempt, "list components timed out");
                    last_error = Some(Error::unavailable("listing components timed out"));
                }
            }
            tokio::time::sleep(RETRY_DELAY).await;
        }
        Err(last_error
            .unwrap_or_else(|| Error::unavailable("listing components: retries exhausted")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_skips_malformed_blobs() {
        assert!(decode_component(b"{not json").is_none());

        let component = Component::new("c", Default::default());
        let blob = serde_json::to_vec(&component).unwrap();
        let decoded = decode_component(&blob).unwrap();
        assert_eq!(decoded.name(), "c");
    }
}
