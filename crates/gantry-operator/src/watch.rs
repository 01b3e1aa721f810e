//! Component watcher
//!
//! Watches Component resources cluster-wide and feeds every applied change
//! into the API server's fan-out. Watch errors are logged; the watcher
//! restarts internally.

use std::sync::Arc;

use futures::StreamExt;
use gantry_resources::Component;
use kube::api::Api;
use kube::runtime::{watcher, WatchStreamExt};
use kube::Client;
use tracing::{debug, warn};

use crate::api::OperatorApi;

/// Run the component watcher until the stream ends
pub async fn watch_components(client: Client, api_server: Arc<OperatorApi>) {
    let api: Api<Component> = Api::all(client);
    let mut stream = watcher(api, watcher::Config::default())
        .applied_objects()
        .boxed();

    while let Some(event) = stream.next().await {
        match event {
            Ok(component) => {
                debug!(
                    component = component.name(),
                    namespace = component.namespace(),
                    "observed component to be synced"
                );
                api_server.on_component_updated(&component).await;
            }
            Err(e) => {
                warn!(error = %e, "component watch error");
            }
        }
    }
}
