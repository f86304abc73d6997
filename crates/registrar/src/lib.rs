//! registrar — keeps a Eureka registry in line with live service health.
//!
//! # Architecture
//!
//! ```text
//! EurekaAdapter
//!   ├── register / deregister / refresh / ping
//!   ├── descriptor: ServiceDescription → ServiceInstance (host:app:port)
//!   ├── GhostReconciler
//!   │   ├── KnownApplications (registry snapshot, cleared after 90s)
//!   │   └── StatusProbe for instances that survived an adapter restart
//!   ├── HealthPoller per instance with `check_http`
//!   └── RegistryClient (Eureka REST)
//! ```
//!
//! Managed registrations and the known-applications snapshot are shared
//! with the pollers behind `RwLock`s; no lock is held across a registry
//! call or a probe.

pub mod adapter;
pub mod descriptor;
pub mod known;
pub mod reconcile;

pub use adapter::{EurekaAdapter, ManagedRegistration, Registrations, SkipRule};
pub use descriptor::{build_instance, instance_id, status_url};
pub use known::{KnownApplications, KNOWN_APPLICATIONS_WINDOW};
pub use reconcile::{classify, GhostReconciler, Reconciliation};
