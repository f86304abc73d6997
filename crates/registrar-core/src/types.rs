//! Domain types shared by the registry client, the health poller and the
//! adapter.
//!
//! `ServiceDescription` is what the caller hands to the adapter;
//! `ServiceInstance` is what the adapter announces to the registry.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unique identifier for a registered instance (`hostname:app:port`).
pub type InstanceId = String;

// ── Status ─────────────────────────────────────────────────────────

/// Status of an instance as announced to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Starting,
    Up,
    Down,
    OutOfService,
    Unknown,
}

impl InstanceStatus {
    /// Wire representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Starting => "STARTING",
            InstanceStatus::Up => "UP",
            InstanceStatus::Down => "DOWN",
            InstanceStatus::OutOfService => "OUT_OF_SERVICE",
            InstanceStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a status string is not one the registry knows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown instance status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for InstanceStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STARTING" => Ok(InstanceStatus::Starting),
            "UP" => Ok(InstanceStatus::Up),
            "DOWN" => Ok(InstanceStatus::Down),
            "OUT_OF_SERVICE" => Ok(InstanceStatus::OutOfService),
            "UNKNOWN" => Ok(InstanceStatus::Unknown),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

// ── Service description (input) ────────────────────────────────────

/// A running service as reported by whatever discovers containers.
///
/// `id` has the form `hostname:suffix`; only the hostname part is used
/// for the registry identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescription {
    pub id: String,
    pub name: String,
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub attrs: HashMap<String, String>,
}

impl ServiceDescription {
    /// Look up an attribute, treating empty values as absent.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Hostname part of the service id.
    pub fn hostname(&self) -> &str {
        self.id
            .split_once(':')
            .map_or(self.id.as_str(), |(host, _)| host)
    }
}

// ── Registry-side instance ─────────────────────────────────────────

/// One instance as known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub instance_id: InstanceId,
    pub app: String,
    pub host_name: String,
    pub ip_addr: String,
    pub port: u16,
    pub status: InstanceStatus,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ServiceInstance {
    /// Two instances are the same iff their ids match (host, app and port).
    pub fn is_same_instance(&self, other: &ServiceInstance) -> bool {
        self.instance_id == other.instance_id
    }
}

/// An application record as returned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    pub instances: Vec<ServiceInstance>,
}

/// Snapshot of all applications in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Applications {
    pub apps_hashcode: String,
    pub applications: Vec<Application>,
}
