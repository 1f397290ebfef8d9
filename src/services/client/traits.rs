use async_trait::async_trait;

use super::error::RegistryError;
use super::types::AgentServiceRegistration;

/// 注册中心的最小操作集合
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn register_service(
        &self,
        registration: &AgentServiceRegistration,
    ) -> Result<(), RegistryError>;

    async fn deregister_service(&self, service_id: &str) -> Result<(), RegistryError>;
}

/// 按注册中心地址构造客户端，每次调用都会新建
pub trait RegistryConnector: Send + Sync {
    fn connect(&self, registry_url: &str) -> Result<Box<dyn RegistryClient>, RegistryError>;
}
