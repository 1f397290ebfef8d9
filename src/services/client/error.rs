/// 注册中心客户端错误类型
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Connection error ({registry_url}): {message}")]
    Connection { registry_url: String, message: String },
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Registry rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),
}

impl RegistryError {
    pub fn connection(registry_url: &str, message: impl Into<String>) -> Self {
        Self::Connection {
            registry_url: registry_url.to_string(),
            message: message.into(),
        }
    }
}
