//! Eureka REST JSON representation.
//!
//! Eureka's JSON is an XML mapping: ports look like `{"$": 8080,
//! "@enabled": "true"}` and collections with one element are sometimes
//! emitted as a bare object instead of an array.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use registrar_core::{Application, Applications, InstanceStatus, ServiceInstance};

const DEFAULT_DATA_CENTER_CLASS: &str = "com.netflix.appinfo.InstanceInfo$DefaultDataCenterInfo";

/// A field that may hold one value or a list of values.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum PortNumber {
    Number(u16),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirePort {
    #[serde(rename = "$")]
    number: PortNumber,
    #[serde(rename = "@enabled", default = "enabled_true")]
    enabled: serde_json::Value,
}

fn enabled_true() -> serde_json::Value {
    serde_json::Value::String("true".to_string())
}

impl WirePort {
    fn enabled(port: u16, enabled: bool) -> Self {
        Self {
            number: PortNumber::Number(port),
            enabled: serde_json::Value::String(enabled.to_string()),
        }
    }

    fn number(&self) -> Option<u16> {
        match &self.number {
            PortNumber::Number(n) => Some(*n),
            PortNumber::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataCenterInfo {
    #[serde(rename = "@class")]
    class: String,
    name: String,
}

/// One instance as exchanged with Eureka.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireInstance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    instance_id: Option<String>,
    host_name: String,
    app: String,
    ip_addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vip_address: Option<String>,
    status: String,
    port: WirePort,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secure_port: Option<WirePort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data_center_info: Option<DataCenterInfo>,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

/// Body of `POST /apps/{app}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct InstanceEnvelope {
    pub instance: WireInstance,
}

#[derive(Debug, Deserialize)]
struct ApplicationsEnvelope {
    applications: WireApplications,
}

#[derive(Debug, Deserialize)]
struct WireApplications {
    #[serde(rename = "apps__hashcode", default)]
    apps_hashcode: String,
    #[serde(default)]
    application: Option<OneOrMany<WireApplication>>,
}

#[derive(Debug, Deserialize)]
struct WireApplication {
    name: String,
    #[serde(default)]
    instance: Option<OneOrMany<WireInstance>>,
}

impl From<&ServiceInstance> for WireInstance {
    fn from(inst: &ServiceInstance) -> Self {
        Self {
            instance_id: Some(inst.instance_id.clone()),
            host_name: inst.host_name.clone(),
            app: inst.app.clone(),
            ip_addr: inst.ip_addr.clone(),
            vip_address: Some(inst.app.to_lowercase()),
            status: inst.status.as_str().to_string(),
            port: WirePort::enabled(inst.port, true),
            secure_port: Some(WirePort::enabled(443, false)),
            data_center_info: Some(DataCenterInfo {
                class: DEFAULT_DATA_CENTER_CLASS.to_string(),
                name: "MyOwn".to_string(),
            }),
            metadata: inst
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
        }
    }
}

impl WireInstance {
    /// Convert to the domain type. Instances with an unreadable port are
    /// dropped.
    pub fn into_instance(self) -> Option<ServiceInstance> {
        let Some(port) = self.port.number() else {
            debug!(app = %self.app, host = %self.host_name, "skipping instance with malformed port");
            return None;
        };
        let status = self.status.parse().unwrap_or_else(|_| {
            debug!(status = %self.status, app = %self.app, "unrecognised instance status");
            InstanceStatus::Unknown
        });
        let metadata = self
            .metadata
            .into_iter()
            .filter(|(k, _)| !k.starts_with('@'))
            .filter_map(|(k, v)| match v {
                serde_json::Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect();

        Some(ServiceInstance {
            instance_id: self.instance_id.unwrap_or_else(|| self.host_name.clone()),
            app: self.app,
            host_name: self.host_name,
            ip_addr: self.ip_addr,
            port,
            status,
            metadata,
        })
    }
}

/// Encode the body of a registration request.
pub fn encode_instance(inst: &ServiceInstance) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&InstanceEnvelope {
        instance: WireInstance::from(inst),
    })
}

/// Decode the body of `GET /apps`.
pub fn decode_applications(body: &[u8]) -> Result<Applications, serde_json::Error> {
    let envelope: ApplicationsEnvelope = serde_json::from_slice(body)?;
    let applications = envelope
        .applications
        .application
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(|app| Application {
            name: app.name,
            instances: app
                .instance
                .map(OneOrMany::into_vec)
                .unwrap_or_default()
                .into_iter()
                .filter_map(WireInstance::into_instance)
                .collect(),
        })
        .collect();

    Ok(Applications {
        apps_hashcode: envelope.applications.apps_hashcode,
        applications,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn instance() -> ServiceInstance {
        ServiceInstance {
            instance_id: "host-a:WEB:8080".to_string(),
            app: "WEB".to_string(),
            host_name: "10.0.0.5".to_string(),
            ip_addr: "10.0.0.5".to_string(),
            port: 8080,
            status: InstanceStatus::Starting,
            metadata: BTreeMap::from([("context-path".to_string(), "/web".to_string())]),
        }
    }

    #[test]
    fn encodes_registration_body() {
        let body = encode_instance(&instance()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let inst = &json["instance"];
        assert_eq!(inst["instanceId"], "host-a:WEB:8080");
        assert_eq!(inst["app"], "WEB");
        assert_eq!(inst["ipAddr"], "10.0.0.5");
        assert_eq!(inst["status"], "STARTING");
        assert_eq!(inst["port"]["$"], 8080);
        assert_eq!(inst["port"]["@enabled"], "true");
        assert_eq!(inst["securePort"]["@enabled"], "false");
        assert_eq!(inst["dataCenterInfo"]["name"], "MyOwn");
        assert_eq!(inst["metadata"]["context-path"], "/web");
    }

    #[test]
    fn decodes_application_list() {
        let body = br#"{
          "applications": {
            "versions__delta": "1",
            "apps__hashcode": "UP_2_",
            "application": [
              {
                "name": "WEB",
                "instance": [
                  {
                    "instanceId": "host-a:WEB:8080",
                    "hostName": "10.0.0.5",
                    "app": "WEB",
                    "ipAddr": "10.0.0.5",
                    "status": "UP",
                    "port": {"$": 8080, "@enabled": "true"},
                    "metadata": {"@class": "java.util.Collections$EmptyMap"}
                  },
                  {
                    "instanceId": "host-b:WEB:8081",
                    "hostName": "10.0.0.6",
                    "app": "WEB",
                    "ipAddr": "10.0.0.6",
                    "status": "OUT_OF_SERVICE",
                    "port": {"$": "8081", "@enabled": true},
                    "metadata": {"depends_on": "db"}
                  }
                ]
              }
            ]
          }
        }"#;

        let apps = decode_applications(body).unwrap();
        assert_eq!(apps.apps_hashcode, "UP_2_");
        assert_eq!(apps.applications.len(), 1);
        let web = &apps.applications[0];
        assert_eq!(web.name, "WEB");
        assert_eq!(web.instances.len(), 2);
        assert_eq!(web.instances[0].port, 8080);
        assert!(web.instances[0].metadata.is_empty());
        assert_eq!(web.instances[1].port, 8081);
        assert_eq!(web.instances[1].status, InstanceStatus::OutOfService);
        assert_eq!(web.instances[1].metadata["depends_on"], "db");
    }

    #[test]
    fn decodes_single_object_collections() {
        let body = br#"{
          "applications": {
            "apps__hashcode": "UP_1_",
            "application": {
              "name": "API",
              "instance": {
                "hostName": "10.0.0.7",
                "app": "API",
                "ipAddr": "10.0.0.7",
                "status": "SOMETHING",
                "port": {"$": 9000}
              }
            }
          }
        }"#;

        let apps = decode_applications(body).unwrap();
        let api = &apps.applications[0];
        assert_eq!(api.instances.len(), 1);
        // Without an instanceId, the host name identifies the instance.
        assert_eq!(api.instances[0].instance_id, "10.0.0.7");
        assert_eq!(api.instances[0].status, InstanceStatus::Unknown);
    }

    #[test]
    fn decodes_empty_registry() {
        let body = br#"{"applications": {"versions__delta": "1", "apps__hashcode": ""}}"#;
        let apps = decode_applications(body).unwrap();
        assert!(apps.applications.is_empty());
    }

    #[test]
    fn drops_instances_with_malformed_port() {
        let body = br#"{
          "applications": {
            "apps__hashcode": "UP_2_",
            "application": {
              "name": "WEB",
              "instance": [
                {"instanceId": "a", "hostName": "10.0.0.5", "app": "WEB", "ipAddr": "10.0.0.5", "status": "UP", "port": {"$": "http"}},
                {"instanceId": "b", "hostName": "10.0.0.6", "app": "WEB", "ipAddr": "10.0.0.6", "status": "UP", "port": {"$": "8080"}}
              ]
            }
          }
        }"#;

        let apps = decode_applications(body).unwrap();
        let web = &apps.applications[0];
        assert_eq!(web.instances.len(), 1);
        assert_eq!(web.instances[0].instance_id, "b");
        assert_eq!(web.instances[0].port, 8080);
    }
}
