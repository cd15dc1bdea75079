//! Document database reachability probe.

use std::time::Duration;

use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::Client;
use serde_json::json;
use tokio::sync::OnceCell;

use crate::config::DatabaseConfig;
use crate::probes::ProbeResult;

/// Lazily connected driver handle used only for `ping`.
#[derive(Debug)]
pub struct DatabaseProbe {
    name: String,
    uri: Option<String>,
    max_pool_size: u32,
    client: OnceCell<Client>,
}

impl DatabaseProbe {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            name: config.probe_name.clone(),
            uri: config.uri.clone().filter(|u| !u.trim().is_empty()),
            max_pool_size: config.max_pool_size,
            client: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_configured(&self) -> bool {
        self.uri.is_some()
    }

    async fn client(&self, uri: &str, timeout: Duration) -> mongodb::error::Result<&Client> {
        self.client
            .get_or_try_init(|| async {
                let mut options = ClientOptions::parse(uri).await?;
                options.app_name = Some("integration-gateway".to_string());
                options.server_selection_timeout = Some(timeout);
                options.connect_timeout = Some(timeout);
                options.max_pool_size = Some(self.max_pool_size);
                Client::with_options(options)
            })
            .await
    }

    /// Run `ping` against the `admin` database.
    pub async fn ping(&self, timeout: Duration) -> ProbeResult {
        let Some(uri) = self.uri.as_deref() else {
            return ProbeResult::failure("MONGODB_URI is not set");
        };

        let client = match self.client(uri, timeout).await {
            Ok(client) => client,
            Err(e) => return ProbeResult::failure(format!("invalid connection string: {}", e)),
        };

        match client.database("admin").run_command(doc! { "ping": 1 }).await {
            Ok(reply) => {
                let ok = reply.get_f64("ok").map(|v| v >= 1.0).unwrap_or(true);
                if ok {
                    ProbeResult::success(json!({ "ping": "ok" }))
                } else {
                    ProbeResult::failure("ping returned ok=0")
                }
            }
            Err(e) => ProbeResult::failure(format!("ping failed: {}", e)),
        }
    }

    /// Close pooled connections.
    pub async fn close(&self) {
        if let Some(client) = self.client.get() {
            client.clone().shutdown().await;
            tracing::debug!(probe = %self.name, "Database client closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_uri_fails_without_io() {
        let probe = DatabaseProbe::new(&DatabaseConfig::default());
        assert!(!probe.is_configured());
        let result = probe.ping(Duration::from_millis(100)).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("MONGODB_URI is not set"));
    }

    #[tokio::test]
    async fn test_malformed_uri_reported() {
        let probe = DatabaseProbe::new(&DatabaseConfig {
            uri: Some("postgres://nope".to_string()),
            ..DatabaseConfig::default()
        });
        let result = probe.ping(Duration::from_millis(100)).await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("invalid connection string"));
    }
}
