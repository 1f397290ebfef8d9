use async_trait::async_trait;
use reqwest::{Client as HttpClient, Response, Url};

use super::config::RegistryClientConfig;
use super::error::RegistryError;
use super::traits::{RegistryClient, RegistryConnector};
use super::types::AgentServiceRegistration;

const DEFAULT_SCHEME: &str = "http";
const TOKEN_HEADER: &str = "X-Consul-Token";

/// Consul agent HTTP 客户端
#[derive(Debug, Clone)]
pub struct ConsulClient {
    http_client: HttpClient,
    base_url: Url,
    registry_url: String,
    token: Option<String>,
}

impl ConsulClient {
    /// 创建新的 Consul 客户端
    pub fn new(registry_url: &str, config: &RegistryClientConfig) -> Result<Self, RegistryError> {
        let base_url = Self::parse_base_url(registry_url)?;

        let mut builder = HttpClient::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| RegistryError::connection(registry_url, e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            registry_url: registry_url.to_string(),
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // 地址未带协议时补全为 http
    fn parse_base_url(registry_url: &str) -> Result<Url, RegistryError> {
        let trimmed = registry_url.trim();
        if trimmed.is_empty() {
            return Err(RegistryError::connection(registry_url, "empty registry address"));
        }

        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("{DEFAULT_SCHEME}://{trimmed}")
        };

        let url = Url::parse(&with_scheme)
            .map_err(|e| RegistryError::connection(registry_url, e.to_string()))?;
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(RegistryError::connection(
                registry_url,
                "registry address has no host",
            ));
        }
        Ok(url)
    }

    // 拼接 /v1/... 接口路径，每一段都会做转义
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RegistryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RegistryError::connection(&self.registry_url, "invalid base path"))?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    async fn put(
        &self,
        url: Url,
        body: Option<&AgentServiceRegistration>,
    ) -> Result<(), RegistryError> {
        let mut request = self.http_client.put(url);

        if let Some(ref token) = self.token {
            request = request.header(TOKEN_HEADER, token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        Self::check_status(response).await
    }

    async fn check_status(response: Response) -> Result<(), RegistryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(RegistryError::Rejected {
            status: status.as_u16(),
            message: message.trim().to_string(),
        })
    }
}

#[async_trait]
impl RegistryClient for ConsulClient {
    async fn register_service(
        &self,
        registration: &AgentServiceRegistration,
    ) -> Result<(), RegistryError> {
        let url = self.endpoint(&["agent", "service", "register"])?;
        tracing::debug!(
            service_id = %registration.id,
            url = %url,
            "Sending service registration"
        );
        self.put(url, Some(registration)).await
    }

    async fn deregister_service(&self, service_id: &str) -> Result<(), RegistryError> {
        let url = self.endpoint(&["agent", "service", "deregister", service_id])?;
        tracing::debug!(service_id = %service_id, url = %url, "Sending service deregistration");
        self.put(url, None).await
    }
}

/// 为每次调用新建 [`ConsulClient`]
#[derive(Debug, Clone, Default)]
pub struct ConsulConnector {
    config: RegistryClientConfig,
}

impl ConsulConnector {
    pub fn new(config: RegistryClientConfig) -> Self {
        Self { config }
    }
}

impl RegistryConnector for ConsulConnector {
    fn connect(&self, registry_url: &str) -> Result<Box<dyn RegistryClient>, RegistryError> {
        let client = ConsulClient::new(registry_url, &self.config)?;
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_without_scheme_defaults_to_http() {
        let client = ConsulClient::new("localhost:8500", &RegistryClientConfig::default()).unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8500/");
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let client =
            ConsulClient::new("https://consul.internal:8501", &RegistryClientConfig::default())
                .unwrap();
        assert_eq!(client.base_url().scheme(), "https");
        assert_eq!(client.base_url().port(), Some(8501));
    }

    #[test]
    fn empty_address_is_a_connection_error() {
        let result = ConsulClient::new("  ", &RegistryClientConfig::default());
        assert!(matches!(result, Err(RegistryError::Connection { .. })));
    }

    #[test]
    fn malformed_address_is_a_connection_error() {
        let result = ConsulClient::new("http://:8500", &RegistryClientConfig::default());
        assert!(matches!(result, Err(RegistryError::Connection { .. })));
    }

    #[test]
    fn deregister_endpoint_escapes_service_id() {
        let client = ConsulClient::new("localhost:8500", &RegistryClientConfig::default()).unwrap();
        let url = client
            .endpoint(&["agent", "service", "deregister", "svc/1"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8500/v1/agent/service/deregister/svc%2F1"
        );
    }
}
