use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 注册中心客户端配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryClientConfig {
    /// ACL 令牌，作为 X-Consul-Token 请求头发送
    pub token: Option<String>,
    /// 单次请求超时秒数，为空时不设置超时
    pub request_timeout_secs: Option<u64>,
}

impl RegistryClientConfig {
    /// 获取请求超时时长
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
