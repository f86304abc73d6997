//! The registration state machine.
//!
//! `EurekaAdapter` owns every registration it made. Register builds the
//! instance descriptor, resolves its initial status, starts a health poller
//! when a status URL is configured and announces the instance. Deregister
//! stops the poller and removes the instance. Refresh renews the lease and
//! re-registers when the registry has forgotten the instance.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use registrar_core::config::{AdapterConfig, DEFAULT_RESERVED_PORT, DEFAULT_RESERVED_SERVICE_NAME};
use registrar_core::{InstanceId, InstanceStatus, ServiceDescription, ServiceInstance};
use registrar_eureka::{RegistryClient, RegistryResult};
use registrar_health::{
    parse_check_interval, BoxFuture, HealthPoller, HttpStatusProbe, PollerHandle, StatusCallback,
    StatusProbe,
};

use crate::descriptor::{
    build_instance, status_url, ATTR_CHECK_INITIAL_STATUS, ATTR_CHECK_INTERVAL,
};
use crate::known::KnownApplications;
use crate::reconcile::GhostReconciler;

/// Registrations managed by this process, keyed by instance id.
pub type Registrations = Arc<RwLock<HashMap<InstanceId, ManagedRegistration>>>;

/// One instance this adapter is responsible for.
#[derive(Debug)]
pub struct ManagedRegistration {
    /// Last state announced to the registry.
    pub instance: ServiceInstance,
    /// Health check URL; `None` when the service has no `check_http`.
    pub status_url: Option<String>,
    /// Distinguishes this registration from earlier ones of the same id.
    generation: u64,
    poller: Option<PollerHandle>,
}

impl ManagedRegistration {
    pub fn has_poller(&self) -> bool {
        self.poller.is_some()
    }

    /// Stop the poller, if any. Safe to call more than once.
    fn stop_poller(&self) {
        if let Some(poller) = &self.poller {
            poller.stop();
        }
    }
}

/// Services that must never be managed through the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipRule {
    pub port: u16,
    pub service_name: String,
}

impl Default for SkipRule {
    fn default() -> Self {
        Self {
            port: DEFAULT_RESERVED_PORT,
            service_name: DEFAULT_RESERVED_SERVICE_NAME.to_string(),
        }
    }
}

impl SkipRule {
    pub fn matches(&self, service: &ServiceDescription) -> bool {
        service.port == self.port && service.name == self.service_name
    }
}

impl From<&AdapterConfig> for SkipRule {
    fn from(config: &AdapterConfig) -> Self {
        Self {
            port: config.reserved_port,
            service_name: config.reserved_service_name.clone(),
        }
    }
}

/// Keeps the registry in line with the services handed to it.
pub struct EurekaAdapter {
    client: Arc<dyn RegistryClient>,
    probe: Arc<dyn StatusProbe>,
    skip: SkipRule,
    known: KnownApplications,
    registrations: Registrations,
    generations: AtomicU64,
}

impl EurekaAdapter {
    pub fn new(client: Arc<dyn RegistryClient>) -> Self {
        Self {
            client,
            probe: Arc::new(HttpStatusProbe::new()),
            skip: SkipRule::default(),
            known: KnownApplications::default(),
            registrations: Arc::new(RwLock::new(HashMap::new())),
            generations: AtomicU64::new(0),
        }
    }

    pub fn from_config(client: Arc<dyn RegistryClient>, config: &AdapterConfig) -> Self {
        Self::new(client).with_skip_rule(SkipRule::from(config))
    }

    /// Use a custom status probe (the HTTP probe by default).
    pub fn with_probe(mut self, probe: Arc<dyn StatusProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_skip_rule(mut self, skip: SkipRule) -> Self {
        self.skip = skip;
        self
    }

    /// Set how long a ping's registry snapshot is kept.
    pub fn with_known_window(mut self, window: Duration) -> Self {
        self.known = KnownApplications::new(window);
        self
    }

    pub fn known_applications(&self) -> &KnownApplications {
        &self.known
    }

    fn reconciler(&self) -> GhostReconciler {
        GhostReconciler::new(
            self.known.clone(),
            self.registrations.clone(),
            self.client.clone(),
            self.probe.clone(),
        )
    }

    /// Snapshot the registry's applications for ghost detection.
    ///
    /// Returns the number of known applications.
    pub async fn ping(&self) -> RegistryResult<usize> {
        self.known.ping(self.client.as_ref()).await
    }

    pub async fn register(&self, service: &ServiceDescription) -> RegistryResult<()> {
        if self.skip.matches(service) {
            debug!(service = %service.name, port = service.port, "skipping reserved service");
            return Ok(());
        }

        let mut instance = build_instance(service);
        let url = status_url(service);

        instance.status = match &url {
            Some(url) => self.reconciler().initial_status(&instance, url).await,
            None => InstanceStatus::Up,
        };

        if let Some(raw) = service.attr(ATTR_CHECK_INITIAL_STATUS) {
            match raw.parse::<InstanceStatus>() {
                Ok(status) => instance.status = status,
                Err(e) => warn!(instance_id = %instance.instance_id, error = %e, "ignoring check_initial_status"),
            }
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let poller = url.as_ref().map(|url| {
            HealthPoller::new(
                instance.instance_id.clone(),
                url.clone(),
                self.probe.clone(),
                self.status_callback(generation),
            )
            .with_interval(parse_check_interval(service.attr(ATTR_CHECK_INTERVAL)))
            .spawn(instance.status)
        });

        let replaced = self.registrations.write().await.insert(
            instance.instance_id.clone(),
            ManagedRegistration {
                instance: instance.clone(),
                status_url: url,
                generation,
                poller,
            },
        );
        if let Some(old) = replaced {
            // Registering the same instance twice replaces its poller.
            old.stop_poller();
        }

        info!(instance_id = %instance.instance_id, status = %instance.status, "registering");
        self.client.register_instance(&instance).await
    }

    /// Re-announces an instance whose probed status changed.
    ///
    /// Results from a poller that belongs to an older registration of the
    /// same id are dropped.
    fn status_callback(&self, generation: u64) -> StatusCallback {
        let registrations = self.registrations.clone();
        let client = self.client.clone();

        Arc::new(move |instance_id: InstanceId, status: InstanceStatus| -> BoxFuture {
            let registrations = registrations.clone();
            let client = client.clone();
            Box::pin(async move {
                let instance = {
                    let mut map = registrations.write().await;
                    let Some(reg) = map.get_mut(&instance_id) else {
                        return;
                    };
                    if reg.generation != generation {
                        debug!(%instance_id, %status, "status from a replaced registration, ignoring");
                        return;
                    }
                    reg.instance.status = status;
                    reg.instance.clone()
                };
                if let Err(e) = client.register_instance(&instance).await {
                    warn!(%instance_id, %status, error = %e, "failed to announce status change");
                }
            })
        })
    }

    pub async fn deregister(&self, service: &ServiceDescription) -> RegistryResult<()> {
        if self.skip.matches(service) {
            return Ok(());
        }

        let instance = build_instance(service);
        info!(instance_id = %instance.instance_id, "deregistering");

        let removed = self.registrations.write().await.remove(&instance.instance_id);
        if let Some(reg) = removed {
            reg.stop_poller();
        }

        self.client.unregister_instance(&instance).await
    }

    pub async fn refresh(&self, service: &ServiceDescription) -> RegistryResult<()> {
        if self.skip.matches(service) {
            return Ok(());
        }

        let fresh = build_instance(service);
        let instance = self
            .registrations
            .read()
            .await
            .get(&fresh.instance_id)
            .map(|reg| reg.instance.clone())
            .unwrap_or(fresh);

        if self.client.send_heartbeat(&instance).await {
            return Ok(());
        }

        info!(instance_id = %instance.instance_id, status = %instance.status, "heartbeat rejected, registering again");
        self.client.register_instance(&instance).await
    }

    /// Services known to the registry, for reconciling back to the caller.
    ///
    /// Not supported; always empty.
    pub async fn services(&self) -> RegistryResult<Vec<ServiceDescription>> {
        Ok(Vec::new())
    }

    pub async fn is_managed(&self, instance_id: &str) -> bool {
        self.registrations.read().await.contains_key(instance_id)
    }

    /// Last announced state of a managed instance.
    pub async fn managed_instance(&self, instance_id: &str) -> Option<ServiceInstance> {
        self.registrations
            .read()
            .await
            .get(instance_id)
            .map(|reg| reg.instance.clone())
    }

    pub async fn managed_ids(&self) -> Vec<InstanceId> {
        self.registrations.read().await.keys().cloned().collect()
    }

    /// Stop every poller without touching the registry.
    pub async fn shutdown(&self) {
        let map = self.registrations.read().await;
        for reg in map.values() {
            reg.stop_poller();
        }
        info!(registrations = map.len(), "all health pollers stopped");
    }
}
