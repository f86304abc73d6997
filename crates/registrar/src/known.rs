//! Short-lived snapshot of the registry's applications.
//!
//! Right after the adapter restarts the registry still lists the instances
//! registered by the previous process. `Ping` copies that listing here so
//! registrations in the next few moments can tell a restarted instance
//! from a new one. Each ping schedules a full clear after the window, so a
//! stale snapshot never outlives one registry refresh cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::info;

use registrar_core::Application;
use registrar_eureka::{RegistryClient, RegistryResult};

/// How long a ping's snapshot stays visible. The registry's first lease
/// refresh lands at 60s.
pub const KNOWN_APPLICATIONS_WINDOW: Duration = Duration::from_secs(90);

/// Application name → last fetched record.
///
/// Names are compared case-insensitively; the registry reports them
/// upper-cased.
#[derive(Clone)]
pub struct KnownApplications {
    apps: Arc<RwLock<HashMap<String, Application>>>,
    window: Duration,
}

impl Default for KnownApplications {
    fn default() -> Self {
        Self::new(KNOWN_APPLICATIONS_WINDOW)
    }
}

fn key(name: &str) -> String {
    name.to_ascii_uppercase()
}

impl KnownApplications {
    pub fn new(window: Duration) -> Self {
        Self {
            apps: Arc::new(RwLock::new(HashMap::new())),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Fetch the registry listing, merge it in, and schedule the clear.
    ///
    /// Fetch errors are returned as-is and leave the cache untouched.
    pub async fn ping(&self, client: &dyn RegistryClient) -> RegistryResult<usize> {
        let listing = client.get_applications().await?;

        let count = {
            let mut apps = self.apps.write().await;
            for app in listing.applications {
                apps.insert(key(&app.name), app);
            }
            apps.len()
        };
        info!(applications = count, apps_hashcode = %listing.apps_hashcode, "already registered applications");

        let apps = self.apps.clone();
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            apps.write().await.clear();
            info!("cleared the known applications");
        });

        Ok(count)
    }

    /// Look up an application by name. Names compare case-insensitively.
    pub async fn get(&self, name: &str) -> Option<Application> {
        self.apps.read().await.get(&key(name)).cloned()
    }

    pub async fn len(&self) -> usize {
        self.apps.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.apps.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.apps.write().await.clear();
    }
}
