//! AWS Client
//!
//! Main client for calling AWS APIs, combining credentials, the HTTP
//! wrapper, and per-service endpoint construction. Cloneable and read-only;
//! safe to share across concurrent calls for one connection.

use super::credentials::Credentials;
use super::http::AwsHttpClient;
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use serde_json::Value;

/// Main AWS client
#[derive(Clone)]
pub struct AwsClient {
    pub credentials: Credentials,
    pub http: AwsHttpClient,
    pub region: String,
    endpoint_override: Option<String>,
}

impl AwsClient {
    /// Create a new AWS client from connection configuration
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let endpoint_override = config.effective_endpoint();
        if let Some(endpoint) = &endpoint_override {
            url::Url::parse(endpoint)
                .map_err(|e| Error::Config(format!("invalid endpoint URL '{endpoint}': {e}")))?;
        }

        Ok(Self {
            credentials: Credentials::resolve(config),
            http: AwsHttpClient::new()?,
            region: config.effective_region(),
            endpoint_override,
        })
    }

    /// Build the endpoint URL for a service. The endpoint override, when
    /// set, routes every service to the same host (emulator convention).
    pub fn service_url(&self, service: &str) -> String {
        match &self.endpoint_override {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.{}.amazonaws.com", service, self.region),
        }
    }

    /// Call one AWS operation on a service endpoint
    pub async fn call(&self, service: &str, target: &str, body: &Value) -> Result<Value> {
        self.http
            .post_target(
                &self.service_url(service),
                target,
                self.credentials.token(),
                body,
            )
            .await
    }
}
