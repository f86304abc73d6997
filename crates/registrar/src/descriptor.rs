//! Builds the registry-side instance descriptor for a service.

use std::collections::BTreeMap;

use registrar_core::{InstanceId, InstanceStatus, ServiceDescription, ServiceInstance};

/// Status path; enables health checking when present.
pub const ATTR_CHECK_HTTP: &str = "check_http";
/// Seconds between health checks.
pub const ATTR_CHECK_INTERVAL: &str = "check_interval";
/// Overrides the computed initial status.
pub const ATTR_CHECK_INITIAL_STATUS: &str = "check_initial_status";
pub const ATTR_CONTEXT_PATH: &str = "context_path";
pub const ATTR_DEPENDS_ON: &str = "depends_on";

pub const META_CONTEXT_PATH: &str = "context-path";
pub const META_DEPENDS_ON: &str = "depends_on";

/// Registry identity of an instance.
pub fn instance_id(hostname: &str, app: &str, port: u16) -> InstanceId {
    format!("{hostname}:{app}:{port}")
}

/// Build the descriptor announced for `service`.
///
/// The status starts as `UP`; callers decide the real initial status.
pub fn build_instance(service: &ServiceDescription) -> ServiceInstance {
    let mut metadata = BTreeMap::new();
    if let Some(path) = service.attr(ATTR_CONTEXT_PATH) {
        metadata.insert(META_CONTEXT_PATH.to_string(), path.to_string());
    }
    if let Some(deps) = service.attr(ATTR_DEPENDS_ON) {
        metadata.insert(META_DEPENDS_ON.to_string(), deps.to_string());
    }

    ServiceInstance {
        instance_id: instance_id(service.hostname(), &service.name, service.port),
        app: service.name.clone(),
        host_name: service.ip.clone(),
        ip_addr: service.ip.clone(),
        port: service.port,
        status: InstanceStatus::Up,
        metadata,
    }
}

/// URL polled for the service's health, if health checking is enabled.
pub fn status_url(service: &ServiceDescription) -> Option<String> {
    service
        .attr(ATTR_CHECK_HTTP)
        .map(|path| format!("http://{}:{}{}", service.ip, service.port, path))
}
