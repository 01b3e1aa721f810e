//! Admission webhook server
//!
//! Serves `POST /mutate`. Pre-checks run in order: request kind, requester
//! allow-list, the enable annotation, and absence of an existing sidecar.
//! Only then is the sidecar synthesized and returned as a JSON patch.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use gantry_common::health::{self, Readiness};
use gantry_common::validation::validate_kubernetes_app_id;
use gantry_common::{
    service_address, Error, Result, ISSUER_CERT_FILENAME, ISSUER_KEY_FILENAME,
    OPERATOR_API_PORT, OPERATOR_API_SERVICE, PLACEMENT_SERVICE, PLACEMENT_SERVICE_PORT,
    ROOT_CERT_FILENAME, SENTRY_SERVICE, SENTRY_SERVICE_PORT, SIDECAR_CONTAINER_NAME,
    TRUST_BUNDLE_SECRET_NAME,
};
use gantry_resources::configuration::SYSTEM_CONFIGURATION_NAME;
use gantry_resources::Configuration;
use k8s_openapi::api::authentication::v1::UserInfo;
use k8s_openapi::api::core::v1::{Pod, Secret, ServiceAccount};
use kube::api::{Api, DynamicObject, ListParams};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::Client;
use tracing::{debug, error, info, warn};

use crate::annotations::{keys, Annotations};
use crate::config::InjectorConfig;
use crate::monitoring;
use crate::patch::build_patch_operations;
use crate::sidecar::{build_sidecar_container, token_volume_mount, SidecarInputs};

/// Group whose members may always call the webhook
pub const SYSTEM_MASTERS_GROUP: &str = "system:masters";

/// Controller service accounts allowed to create sidecar-enabled pods.
/// The first entry is mandatory at startup; the rest are best-effort.
const ALLOWED_CONTROLLER_ACCOUNTS: [&str; 6] = [
    "replicaset-controller",
    "deployment-controller",
    "cronjob-controller",
    "job-controller",
    "statefulset-controller",
    "daemon-set-controller",
];

const SERVICE_ACCOUNT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state of the webhook server
pub struct InjectorState {
    /// Injector configuration
    pub config: InjectorConfig,
    /// Cluster client for trust-bundle and configuration lookups
    pub client: Client,
    /// Pre-resolved UIDs of allow-listed controller service accounts
    pub authorized_uids: Vec<String>,
}

/// Resolve the UIDs of the allow-listed controller service accounts.
///
/// `replicaset-controller` must resolve or startup fails; the others are
/// logged and skipped on error. Each lookup is bounded by a ten-second
/// timeout.
pub async fn allowed_controller_uids(client: &Client) -> Result<Vec<String>> {
    let api: Api<ServiceAccount> = Api::namespaced(client.clone(), "kube-system");
    let mut uids = Vec::new();
    for (i, account) in ALLOWED_CONTROLLER_ACCOUNTS.iter().copied().enumerate() {
        let lookup = tokio::time::timeout(SERVICE_ACCOUNT_LOOKUP_TIMEOUT, api.get(account)).await;
        let result = match lookup {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::internal_with_context(
                "injector",
                format!("timed out resolving service account {account}"),
            )),
        };
        match result {
            Ok(sa) => {
                if let Some(uid) = sa.metadata.uid {
                    uids.push(uid);
                }
            }
            Err(e) if i == 0 => return Err(e),
            Err(e) => {
                warn!(account, error = %e, "unable to resolve service account UID");
            }
        }
    }
    Ok(uids)
}

/// Build the webhook router
pub fn routes(state: Arc<InjectorState>, readiness: Readiness) -> Router {
    Router::new()
        .route("/mutate", post(mutate_handler))
        .with_state(state)
        .merge(health::router(readiness))
}

/// Handle a mutating admission review
pub async fn mutate_handler(
    State(state): State<Arc<InjectorState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    monitoring::record_injection_request();

    let req: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    let response = mutate(&state, &req).await;
    Json(response.into_review())
}

/// The request-level prechecks: request kind, then the requester allow-list.
///
/// Returns the final response when a precheck settles the admission, `None`
/// when pod processing should continue.
pub fn precheck_response(
    req: &AdmissionRequest<DynamicObject>,
    authorized_uids: &[String],
) -> Option<AdmissionResponse> {
    // Only pod admissions are mutated; everything else passes unchanged
    if req.kind.kind != "Pod" {
        debug!(uid = %req.uid, kind = %req.kind.kind, "not a pod, allowing unchanged");
        return Some(AdmissionResponse::from(req));
    }

    if !is_authorized(&req.user_info, authorized_uids) {
        let username = req.user_info.username.as_deref().unwrap_or_default();
        error!(uid = %req.uid, username, "requester not on the list of allowed controller accounts");
        return Some(AdmissionResponse::from(req).deny(format!(
            "service account '{username}' not on the list of allowed controller accounts"
        )));
    }
    None
}

async fn mutate(
    state: &InjectorState,
    req: &AdmissionRequest<DynamicObject>,
) -> AdmissionResponse {
    let uid = req.uid.clone();

    if let Some(response) = precheck_response(req, &state.authorized_uids) {
        return response;
    }

    let pod: Pod = match req
        .object
        .as_ref()
        .ok_or_else(|| "no pod object in admission request".to_string())
        .and_then(|obj| {
            serde_json::to_value(obj)
                .and_then(serde_json::from_value)
                .map_err(|e| format!("could not unmarshal raw pod object: {e}"))
        }) {
        Ok(pod) => pod,
        Err(e) => {
            error!(uid = %uid, error = %e, "rejecting malformed pod");
            return AdmissionResponse::from(req).deny(e);
        }
    };

    let empty = BTreeMap::new();
    let annotations = Annotations::new(pod.metadata.annotations.as_ref().unwrap_or(&empty));
    let app_id = app_id(&pod, annotations);

    if !annotations.bool_or(keys::ENABLED, false) || contains_sidecar(&pod) {
        debug!(uid = %uid, pod = ?pod.metadata.name, "injection not requested, allowing unchanged");
        return AdmissionResponse::from(req);
    }

    if let Err(e) = validate_kubernetes_app_id(&app_id) {
        monitoring::record_failed_injection(&app_id, "validation");
        return AdmissionResponse::from(req).deny(e.to_string());
    }

    let namespace = req.namespace.clone().unwrap_or_default();
    let inputs = match sidecar_inputs(state, &pod, &namespace, &app_id).await {
        Ok(inputs) => inputs,
        Err(e) => {
            error!(uid = %uid, app_id = %app_id, error = %e, "failed to assemble sidecar inputs");
            monitoring::record_failed_injection(&app_id, "inputs");
            return AdmissionResponse::from(req).deny(e.to_string());
        }
    };

    let sidecar = match build_sidecar_container(annotations, &inputs.to_borrowed(&app_id, state)) {
        Ok(sidecar) => sidecar,
        Err(e) => {
            error!(uid = %uid, app_id = %app_id, error = %e, "failed to synthesize sidecar container");
            monitoring::record_failed_injection(&app_id, "patch");
            return AdmissionResponse::from(req).deny(e.to_string());
        }
    };

    let ops = build_patch_operations(&pod, sidecar);
    info!(uid = %uid, app_id = %app_id, patch_ops = ops.len(), "injecting sidecar");

    match AdmissionResponse::from(req).with_patch(json_patch::Patch(ops)) {
        Ok(response) => {
            monitoring::record_successful_injection(&app_id);
            response
        }
        Err(e) => {
            error!(uid = %uid, app_id = %app_id, error = %e, "failed to serialize patch");
            monitoring::record_failed_injection(&app_id, "response");
            AdmissionResponse::from(req).deny(format!("patch serialization error: {e}"))
        }
    }
}

/// Cluster lookups resolved per admission: addresses, trust bundle, mTLS
struct ResolvedInputs {
    namespace: String,
    control_plane_address: String,
    placement_address: String,
    sentry_address: String,
    trust_anchors: String,
    cert_chain: String,
    cert_key: String,
    mtls_enabled: bool,
    identity: String,
    token_volume_mount: Option<k8s_openapi::api::core::v1::VolumeMount>,
}

impl ResolvedInputs {
    fn to_borrowed<'a>(&'a self, app_id: &'a str, state: &'a InjectorState) -> SidecarInputs<'a> {
        SidecarInputs {
            app_id,
            image: &state.config.sidecar_image,
            image_pull_policy: &state.config.sidecar_image_pull_policy,
            namespace: &self.namespace,
            control_plane_address: self.control_plane_address.clone(),
            placement_address: self.placement_address.clone(),
            sentry_address: self.sentry_address.clone(),
            token_volume_mount: self.token_volume_mount.clone(),
            trust_anchors: self.trust_anchors.clone(),
            cert_chain: self.cert_chain.clone(),
            cert_key: self.cert_key.clone(),
            mtls_enabled: self.mtls_enabled,
            identity: self.identity.clone(),
        }
    }
}

async fn sidecar_inputs(
    state: &InjectorState,
    pod: &Pod,
    namespace: &str,
    _app_id: &str,
) -> Result<ResolvedInputs> {
    let control_plane_ns = &state.config.namespace;
    let domain = &state.config.kube_cluster_domain;

    let (trust_anchors, cert_chain, cert_key) =
        trust_bundle(&state.client, control_plane_ns).await;
    let mtls_enabled = mtls_enabled(&state.client).await;

    let service_account = pod
        .spec
        .as_ref()
        .and_then(|s| s.service_account_name.clone())
        .unwrap_or_default();

    Ok(ResolvedInputs {
        namespace: namespace.to_string(),
        control_plane_address: service_address(
            OPERATOR_API_SERVICE,
            control_plane_ns,
            domain,
            OPERATOR_API_PORT,
        ),
        placement_address: service_address(
            PLACEMENT_SERVICE,
            control_plane_ns,
            domain,
            PLACEMENT_SERVICE_PORT,
        ),
        sentry_address: service_address(SENTRY_SERVICE, control_plane_ns, domain, SENTRY_SERVICE_PORT),
        trust_anchors,
        cert_chain,
        cert_key,
        mtls_enabled,
        identity: format!("{namespace}:{service_account}"),
        token_volume_mount: token_volume_mount(pod),
    })
}

/// Fetch the platform trust bundle; absence yields empty strings
async fn trust_bundle(client: &Client, namespace: &str) -> (String, String, String) {
    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret = match api.get(TRUST_BUNDLE_SECRET_NAME).await {
        Ok(secret) => secret,
        Err(e) => {
            warn!(error = %e, "trust bundle not available");
            return (String::new(), String::new(), String::new());
        }
    };
    let field = |name: &str| {
        secret
            .data
            .as_ref()
            .and_then(|d| d.get(name))
            .map(|v| String::from_utf8_lossy(&v.0).to_string())
            .unwrap_or_default()
    };
    (
        field(ROOT_CERT_FILENAME),
        field(ISSUER_CERT_FILENAME),
        field(ISSUER_KEY_FILENAME),
    )
}

/// Whether workload mTLS is enabled, from the platform configuration.
///
/// Defaults to enabled when the configuration is missing or unreadable.
async fn mtls_enabled(client: &Client) -> bool {
    const DEFAULT_MTLS_ENABLED: bool = true;
    let api: Api<Configuration> = Api::all(client.clone());
    match api.list(&ListParams::default()).await {
        Ok(configs) => configs
            .items
            .iter()
            .find(|c| c.metadata.name.as_deref() == Some(SYSTEM_CONFIGURATION_NAME))
            .map(|c| c.spec.mtls.enabled)
            .unwrap_or_else(|| {
                info!(
                    config = SYSTEM_CONFIGURATION_NAME,
                    default = DEFAULT_MTLS_ENABLED,
                    "platform configuration not found, using default mTLS setting"
                );
                DEFAULT_MTLS_ENABLED
            }),
        Err(e) => {
            error!(error = %e, default = DEFAULT_MTLS_ENABLED, "failed to load platform configuration");
            DEFAULT_MTLS_ENABLED
        }
    }
}

/// Whether the requester is on the allow-list: either in `system:masters`
/// or a pre-resolved controller service-account UID
pub fn is_authorized(user_info: &UserInfo, authorized_uids: &[String]) -> bool {
    if let Some(uid) = &user_info.uid {
        if authorized_uids.iter().any(|allowed| allowed == uid) {
            return true;
        }
    }
    user_info
        .groups
        .as_ref()
        .is_some_and(|groups| groups.iter().any(|g| g == SYSTEM_MASTERS_GROUP))
}

/// App ID of a pod: the annotation when present, else the pod name
pub fn app_id(pod: &Pod, annotations: Annotations<'_>) -> String {
    annotations.string_or(
        keys::APP_ID,
        pod.metadata.name.as_deref().unwrap_or_default(),
    )
}

fn contains_sidecar(pod: &Pod) -> bool {
    pod.spec
        .as_ref()
        .is_some_and(|spec| spec.containers.iter().any(|c| c.name == SIDECAR_CONTAINER_NAME))
}
