use serde::{Deserialize, Serialize};

// 健康检查固定参数
pub const CHECK_INTERVAL: &str = "10s";
pub const CHECK_TIMEOUT: &str = "5s";
pub const CHECK_INITIAL_STATUS: &str = "passing";

/// agent 服务注册请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentServiceRegistration {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub port: u16,
    pub check: AgentServiceCheck,
}

/// 附加在服务上的 HTTP 健康检查
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentServiceCheck {
    #[serde(rename = "HTTP")]
    pub http: String,
    pub interval: String,
    pub timeout: String,
    pub status: String,
    #[serde(rename = "TLSSkipVerify")]
    pub tls_skip_verify: bool,
}

impl AgentServiceCheck {
    pub fn http(url: String, tls_skip_verify: bool) -> Self {
        Self {
            http: url,
            interval: CHECK_INTERVAL.to_string(),
            timeout: CHECK_TIMEOUT.to_string(),
            status: CHECK_INITIAL_STATUS.to_string(),
            tls_skip_verify,
        }
    }
}
