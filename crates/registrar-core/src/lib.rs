//! registrar-core — shared types and configuration for the registrar.

pub mod config;
pub mod types;

pub use config::RegistrarConfig;
pub use types::*;
