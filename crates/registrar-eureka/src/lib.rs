//! registrar-eureka — the registry RPC boundary and its Eureka implementation.
//!
//! [`RegistryClient`] is the four-call surface the adapter depends on.
//! [`EurekaClient`] implements it against the Eureka REST API using JSON
//! bodies; [`wire`] holds the JSON mapping.

pub mod client;
pub mod error;
pub mod registry;
pub mod wire;

pub use client::EurekaClient;
pub use error::{RegistryError, RegistryResult};
pub use registry::RegistryClient;
