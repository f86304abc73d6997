//! In-memory registry and probe fakes shared by the adapter tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use registrar_core::{Application, Applications, InstanceStatus, ServiceDescription, ServiceInstance};
use registrar_eureka::{RegistryClient, RegistryError, RegistryResult};
use registrar_health::StatusProbe;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetApplications,
    Register(ServiceInstance),
    Unregister(ServiceInstance),
    Heartbeat(ServiceInstance),
}

/// Records every call; responses are configurable.
#[derive(Default)]
pub struct MockRegistry {
    calls: Mutex<Vec<Call>>,
    applications: Mutex<Vec<Application>>,
    heartbeat_ok: AtomicBool,
    fail_register: AtomicBool,
    fail_unregister: AtomicBool,
    fail_fetch: AtomicBool,
}

impl MockRegistry {
    pub fn new() -> Arc<Self> {
        let mock = Self::default();
        mock.heartbeat_ok.store(true, Ordering::SeqCst);
        Arc::new(mock)
    }

    pub fn with_applications(apps: Vec<Application>) -> Arc<Self> {
        let mock = Self::new();
        *mock.applications.lock().unwrap() = apps;
        mock
    }

    pub fn set_heartbeat_ok(&self, ok: bool) {
        self.heartbeat_ok.store(ok, Ordering::SeqCst);
    }

    pub fn set_fail_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_unregister(&self, fail: bool) {
        self.fail_unregister.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn registrations(&self) -> Vec<ServiceInstance> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Register(i) => Some(i),
                _ => None,
            })
            .collect()
    }

    pub fn unregistrations(&self) -> Vec<ServiceInstance> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Unregister(i) => Some(i),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn unavailable() -> RegistryError {
    RegistryError::UnexpectedStatus {
        status: 503,
        body: "unavailable".to_string(),
    }
}

#[async_trait]
impl RegistryClient for MockRegistry {
    async fn get_applications(&self) -> RegistryResult<Applications> {
        self.record(Call::GetApplications);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(Applications {
            apps_hashcode: "UP_1_".to_string(),
            applications: self.applications.lock().unwrap().clone(),
        })
    }

    async fn register_instance(&self, instance: &ServiceInstance) -> RegistryResult<()> {
        self.record(Call::Register(instance.clone()));
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }

    async fn unregister_instance(&self, instance: &ServiceInstance) -> RegistryResult<()> {
        self.record(Call::Unregister(instance.clone()));
        if self.fail_unregister.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }

    async fn send_heartbeat(&self, instance: &ServiceInstance) -> bool {
        self.record(Call::Heartbeat(instance.clone()));
        self.heartbeat_ok.load(Ordering::SeqCst)
    }
}

/// Probe answering a settable status and counting calls.
pub struct FixedProbe {
    status: Mutex<InstanceStatus>,
    calls: AtomicU32,
}

impl FixedProbe {
    pub fn new(status: InstanceStatus) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status),
            calls: AtomicU32::new(0),
        })
    }

    pub fn set(&self, status: InstanceStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusProbe for FixedProbe {
    async fn probe(&self, _status_url: &str) -> InstanceStatus {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.status.lock().unwrap()
    }
}

/// Probe whose first answer arrives after `delay`; later answers are
/// immediate.
pub struct SlowFirstProbe {
    delay: Duration,
    first: InstanceStatus,
    then: InstanceStatus,
    calls: AtomicU32,
}

impl SlowFirstProbe {
    pub fn new(delay: Duration, first: InstanceStatus, then: InstanceStatus) -> Arc<Self> {
        Arc::new(Self {
            delay,
            first,
            then,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusProbe for SlowFirstProbe {
    async fn probe(&self, _status_url: &str) -> InstanceStatus {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(self.delay).await;
            return self.first;
        }
        self.then
    }
}

pub fn service(name: &str, ip: &str, port: u16, attrs: &[(&str, &str)]) -> ServiceDescription {
    ServiceDescription {
        id: format!("host-a:{port}"),
        name: name.to_string(),
        ip: ip.to_string(),
        port,
        attrs: attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
    }
}

pub fn registry_instance(id: &str, app: &str, ip: &str, port: u16) -> ServiceInstance {
    ServiceInstance {
        instance_id: id.to_string(),
        app: app.to_string(),
        host_name: ip.to_string(),
        ip_addr: ip.to_string(),
        port,
        status: InstanceStatus::Up,
        metadata: BTreeMap::new(),
    }
}

pub fn application(name: &str, instances: Vec<ServiceInstance>) -> Application {
    Application {
        name: name.to_string(),
        instances,
    }
}
