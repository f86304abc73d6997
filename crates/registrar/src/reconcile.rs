//! Ghost reconciliation.
//!
//! Decides the status a freshly built instance is first announced with,
//! based on what the registry listed before this process started:
//!
//! - same instance id → the workload kept running while the adapter
//!   restarted; announce its live status instead of `STARTING`.
//! - same IP, other port → a leftover ("ghost") registration from an
//!   earlier incarnation; remove it unless this adapter manages it, and
//!   announce the new instance as `STARTING`.
//! - nothing known → `STARTING`.

use std::sync::Arc;

use tracing::{info, warn};

use registrar_core::{Application, InstanceStatus, ServiceInstance};
use registrar_eureka::RegistryClient;
use registrar_health::StatusProbe;

use crate::adapter::Registrations;
use crate::known::KnownApplications;

/// How a new instance relates to what the registry already listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The registry already lists this exact instance.
    ExactMatch(ServiceInstance),
    /// The registry lists an instance of the same application on the same
    /// IP under another identity.
    Ghost(ServiceInstance),
    New,
}

/// Classify `candidate` against the registry's record of its application.
///
/// Instances are scanned in registry order and the first hit wins. For
/// each one, an instance-id match is checked before the IP match; an IP
/// match on the same port also counts as exact.
pub fn classify(known: Option<&Application>, candidate: &ServiceInstance) -> Reconciliation {
    let Some(app) = known else {
        return Reconciliation::New;
    };

    for existing in &app.instances {
        if existing.is_same_instance(candidate) {
            return Reconciliation::ExactMatch(existing.clone());
        }
        if existing.ip_addr == candidate.ip_addr {
            return if existing.port == candidate.port {
                Reconciliation::ExactMatch(existing.clone())
            } else {
                Reconciliation::Ghost(existing.clone())
            };
        }
    }

    Reconciliation::New
}

/// Resolves initial statuses and removes ghosts.
#[derive(Clone)]
pub struct GhostReconciler {
    known: KnownApplications,
    registrations: Registrations,
    client: Arc<dyn RegistryClient>,
    probe: Arc<dyn StatusProbe>,
}

impl GhostReconciler {
    pub fn new(
        known: KnownApplications,
        registrations: Registrations,
        client: Arc<dyn RegistryClient>,
        probe: Arc<dyn StatusProbe>,
    ) -> Self {
        Self {
            known,
            registrations,
            client,
            probe,
        }
    }

    /// Initial status for a health-checked instance.
    ///
    /// Ghost cleanup is best-effort: failures are logged, never returned.
    pub async fn initial_status(&self, candidate: &ServiceInstance, status_url: &str) -> InstanceStatus {
        let known = self.known.get(&candidate.app).await;

        match classify(known.as_ref(), candidate) {
            Reconciliation::ExactMatch(existing) => {
                info!(instance_id = %existing.instance_id, "instance already registered, checking its status directly");
                let status = self.probe.probe(status_url).await;
                info!(instance_id = %existing.instance_id, %status, "instance will get status");
                status
            }
            Reconciliation::Ghost(ghost) => {
                let managed = self
                    .registrations
                    .read()
                    .await
                    .contains_key(&ghost.instance_id);
                if !managed {
                    self.remove_ghost(&ghost).await;
                }
                InstanceStatus::Starting
            }
            Reconciliation::New => InstanceStatus::Starting,
        }
    }

    async fn remove_ghost(&self, ghost: &ServiceInstance) {
        info!(instance_id = %ghost.instance_id, "ghost instance found");
        match self.client.unregister_instance(ghost).await {
            Ok(()) => info!(instance_id = %ghost.instance_id, "ghost instance removed"),
            Err(e) => warn!(instance_id = %ghost.instance_id, error = %e, "failed to remove ghost instance"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn inst(id: &str, ip: &str, port: u16) -> ServiceInstance {
        ServiceInstance {
            instance_id: id.to_string(),
            app: "WEB".to_string(),
            host_name: ip.to_string(),
            ip_addr: ip.to_string(),
            port,
            status: InstanceStatus::Up,
            metadata: BTreeMap::new(),
        }
    }

    fn app(instances: Vec<ServiceInstance>) -> Application {
        Application {
            name: "WEB".to_string(),
            instances,
        }
    }

    #[test]
    fn unknown_application_is_new() {
        let candidate = inst("h:WEB:2", "10.0.0.1", 2);
        assert_eq!(classify(None, &candidate), Reconciliation::New);
        assert_eq!(classify(Some(&app(vec![])), &candidate), Reconciliation::New);
    }

    #[test]
    fn same_id_is_exact() {
        let existing = inst("h:WEB:2", "10.0.0.1", 2);
        let candidate = inst("h:WEB:2", "10.0.0.1", 2);
        assert_eq!(
            classify(Some(&app(vec![existing.clone()])), &candidate),
            Reconciliation::ExactMatch(existing)
        );
    }

    #[test]
    fn same_ip_other_port_is_ghost() {
        let ghost = inst("h:WEB:1", "10.0.0.1", 1);
        let candidate = inst("h:WEB:2", "10.0.0.1", 2);
        assert_eq!(
            classify(Some(&app(vec![ghost.clone()])), &candidate),
            Reconciliation::Ghost(ghost)
        );
    }

    #[test]
    fn same_ip_same_port_is_exact() {
        let existing = inst("old-host:WEB:2", "10.0.0.1", 2);
        let candidate = inst("h:WEB:2", "10.0.0.1", 2);
        assert_eq!(
            classify(Some(&app(vec![existing.clone()])), &candidate),
            Reconciliation::ExactMatch(existing)
        );
    }

    #[test]
    fn other_ip_is_new() {
        let other = inst("x:WEB:1", "10.0.0.9", 1);
        let candidate = inst("h:WEB:2", "10.0.0.1", 2);
        assert_eq!(classify(Some(&app(vec![other])), &candidate), Reconciliation::New);
    }

    #[test]
    fn first_hit_in_registry_order_wins() {
        // The ghost is listed before the exact match, so it is found first.
        let ghost = inst("h:WEB:1", "10.0.0.1", 1);
        let exact = inst("h:WEB:2", "10.0.0.1", 2);
        let candidate = inst("h:WEB:2", "10.0.0.1", 2);
        assert_eq!(
            classify(Some(&app(vec![ghost.clone(), exact.clone()])), &candidate),
            Reconciliation::Ghost(ghost)
        );

        // Per instance, the id check precedes the IP check.
        assert_eq!(
            classify(Some(&app(vec![exact.clone()])), &candidate),
            Reconciliation::ExactMatch(exact)
        );
    }
}
