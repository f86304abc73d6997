//! The RPC boundary between the adapter and the registry.

use async_trait::async_trait;

use registrar_core::{Applications, ServiceInstance};

use crate::error::RegistryResult;

/// Operations the adapter needs from a service registry.
///
/// Every call is bounded by the client's own timeout.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Fetch every application currently known to the registry.
    async fn get_applications(&self) -> RegistryResult<Applications>;

    /// Register (or re-announce) an instance with its current status.
    async fn register_instance(&self, instance: &ServiceInstance) -> RegistryResult<()>;

    /// Remove an instance from the registry.
    async fn unregister_instance(&self, instance: &ServiceInstance) -> RegistryResult<()>;

    /// Renew the instance's lease.
    ///
    /// Returns `false` when the registry no longer knows the instance
    /// (or the heartbeat could not be delivered).
    async fn send_heartbeat(&self, instance: &ServiceInstance) -> bool;
}
