use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::client::{AgentServiceCheck, AgentServiceRegistration, RegistryError};

/// 主机地址占位符
pub const PLACEHOLDER_HOST: &str = "localhost";

pub const DEFAULT_PROTOCOL: &str = "http";
pub const DEFAULT_HEALTH_PATH: &str = "/health";
pub const DEFAULT_REGISTRY_URL: &str = "localhost:8500";

/// 单个服务实例的注册信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRegistration {
    /// 实例唯一 ID
    #[serde(rename = "id")]
    pub service_id: String,
    /// 逻辑服务名
    #[serde(rename = "name")]
    pub service_name: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_ip")]
    pub ip: String,
    pub port: u16,
    #[serde(rename = "healthUrl", default = "default_health_path")]
    pub health_path: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "consulUrl", default = "default_registry_url")]
    pub registry_url: String,
    #[serde(rename = "skipSsl", default = "default_skip_tls_verify")]
    pub skip_tls_verify: bool,
    // 注册状态只在运行时维护，不从配置读取
    #[serde(skip)]
    pub registered: bool,
}

fn default_protocol() -> String {
    DEFAULT_PROTOCOL.to_string()
}

fn default_ip() -> String {
    PLACEHOLDER_HOST.to_string()
}

fn default_health_path() -> String {
    DEFAULT_HEALTH_PATH.to_string()
}

fn default_registry_url() -> String {
    DEFAULT_REGISTRY_URL.to_string()
}

fn default_skip_tls_verify() -> bool {
    true
}

impl ServiceRegistration {
    /// 使用默认值创建注册信息
    pub fn new(name: impl Into<String>, id: impl Into<String>, port: u16) -> Self {
        Self {
            service_id: id.into(),
            service_name: name.into(),
            protocol: default_protocol(),
            ip: default_ip(),
            port,
            health_path: default_health_path(),
            tags: Vec::new(),
            registry_url: default_registry_url(),
            skip_tls_verify: default_skip_tls_verify(),
            registered: false,
        }
    }

    /// 生成形如 `{name}-{uuid}` 的实例 ID
    pub fn with_generated_id(name: impl Into<String>, port: u16) -> Self {
        let name = name.into();
        let id = format!("{}-{}", name, Uuid::new_v4());
        Self::new(name, id, port)
    }

    /// 健康检查地址：`protocol://ip:port` + 健康检查路径
    pub fn health_check_url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.protocol, self.ip, self.port, self.health_path
        )
    }

    /// 校验拼接健康检查地址所依赖的字段
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.service_id.trim().is_empty() {
            return Err(RegistryError::InvalidRegistration(
                "service id must not be empty".to_string(),
            ));
        }
        if self.service_name.trim().is_empty() {
            return Err(RegistryError::InvalidRegistration(
                "service name must not be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(RegistryError::InvalidRegistration(
                "port must not be 0".to_string(),
            ));
        }
        if !is_valid_scheme(&self.protocol) {
            return Err(RegistryError::InvalidRegistration(format!(
                "invalid protocol: {:?}",
                self.protocol
            )));
        }
        if self.ip.is_empty()
            || self
                .ip
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@'))
            || (self.ip.contains(':') && !is_bracketed(&self.ip))
        {
            return Err(RegistryError::InvalidRegistration(format!(
                "invalid ip: {:?}",
                self.ip
            )));
        }
        if !self.health_path.starts_with('/') {
            return Err(RegistryError::InvalidRegistration(format!(
                "health path must start with '/': {:?}",
                self.health_path
            )));
        }
        Ok(())
    }

    /// 用外部可见的主机 IP 替换占位主机名
    ///
    /// `ip` 恰好为 `localhost` 时替换 `ip`，健康检查路径中出现的第一个
    /// `localhost` 也会被替换。IPv6 地址会加上方括号。替换后占位符消失，
    /// 再次调用不会产生变化。返回是否发生了替换。
    pub fn apply_host_ip(&mut self, host_ip: Option<&str>) -> bool {
        let Some(host_ip) = host_ip.map(str::trim).filter(|ip| !ip.is_empty()) else {
            return false;
        };
        let host = if host_ip.contains(':') && !is_bracketed(host_ip) {
            format!("[{host_ip}]")
        } else {
            host_ip.to_string()
        };

        let mut substituted = false;
        if self.ip == PLACEHOLDER_HOST {
            self.ip = host.clone();
            substituted = true;
        }
        if self.health_path.contains(PLACEHOLDER_HOST) {
            self.health_path = self.health_path.replacen(PLACEHOLDER_HOST, &host, 1);
            substituted = true;
        }
        substituted
    }

    /// 构造发送给注册中心的请求体
    pub fn to_agent_registration(&self) -> AgentServiceRegistration {
        AgentServiceRegistration {
            id: self.service_id.clone(),
            name: self.service_name.clone(),
            tags: self.tags.clone(),
            port: self.port,
            check: AgentServiceCheck::http(self.health_check_url(), self.skip_tls_verify),
        }
    }
}

fn is_bracketed(host: &str) -> bool {
    host.starts_with('[') && host.ends_with(']')
}

// scheme = ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )
fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_applies_defaults() {
        let registration = ServiceRegistration::new("svc", "svc-1", 8080);

        assert_eq!(registration.service_name, "svc");
        assert_eq!(registration.service_id, "svc-1");
        assert_eq!(registration.port, 8080);
        assert_eq!(registration.protocol, "http");
        assert_eq!(registration.ip, "localhost");
        assert_eq!(registration.health_path, "/health");
        assert_eq!(registration.registry_url, "localhost:8500");
        assert!(registration.skip_tls_verify);
        assert!(!registration.registered);
        assert!(registration.tags.is_empty());
        assert_eq!(registration.health_check_url(), "http://localhost:8080/health");
    }

    #[test]
    fn generated_id_is_prefixed_with_name() {
        let a = ServiceRegistration::with_generated_id("svc", 8080);
        let b = ServiceRegistration::with_generated_id("svc", 8080);

        assert!(a.service_id.starts_with("svc-"));
        assert_ne!(a.service_id, b.service_id);
    }

    #[test]
    fn host_ip_replaces_placeholder_once() {
        let mut registration = ServiceRegistration::new("svc", "svc-1", 8080);

        assert!(registration.apply_host_ip(Some("10.0.0.7")));
        assert_eq!(registration.ip, "10.0.0.7");
        assert_eq!(registration.health_check_url(), "http://10.0.0.7:8080/health");

        // 占位符已经消失
        assert!(!registration.apply_host_ip(Some("10.0.0.8")));
        assert_eq!(registration.ip, "10.0.0.7");
    }

    #[test]
    fn host_ip_replaces_placeholder_inside_health_path() {
        let mut registration = ServiceRegistration::new("svc", "svc-1", 8080);
        registration.ip = "127.0.0.1".to_string();
        registration.health_path = "/check?target=localhost&host=localhost".to_string();

        assert!(registration.apply_host_ip(Some("10.0.0.7")));
        assert_eq!(registration.ip, "127.0.0.1");
        assert_eq!(
            registration.health_path,
            "/check?target=10.0.0.7&host=localhost"
        );
    }

    #[test]
    fn host_ip_ignores_hosts_that_only_contain_placeholder() {
        for ip in ["localhost.localdomain", "mylocalhost"] {
            let mut registration = ServiceRegistration::new("svc", "svc-1", 8080);
            registration.ip = ip.to_string();

            assert!(!registration.apply_host_ip(Some("10.0.0.7")));
            assert_eq!(registration.ip, ip);
        }
    }

    #[test]
    fn ipv6_host_ip_is_bracketed() {
        let mut registration = ServiceRegistration::new("svc", "svc-1", 8080);

        assert!(registration.apply_host_ip(Some("fd00::7")));
        assert_eq!(registration.ip, "[fd00::7]");
        assert_eq!(registration.health_check_url(), "http://[fd00::7]:8080/health");
        assert!(registration.validate().is_ok());

        let mut bracketed = ServiceRegistration::new("svc", "svc-1", 8080);
        assert!(bracketed.apply_host_ip(Some("[fd00::7]")));
        assert_eq!(bracketed.ip, "[fd00::7]");
    }

    #[test]
    fn validate_rejects_unbracketed_ipv6() {
        let mut registration = ServiceRegistration::new("svc", "svc-1", 8080);
        registration.ip = "fd00::7".to_string();

        assert!(matches!(
            registration.validate(),
            Err(RegistryError::InvalidRegistration(_))
        ));
    }

    #[test]
    fn missing_host_ip_leaves_fields_unchanged() {
        let mut registration = ServiceRegistration::new("svc", "svc-1", 8080);

        assert!(!registration.apply_host_ip(None));
        assert!(!registration.apply_host_ip(Some("  ")));
        assert_eq!(registration.ip, "localhost");
        assert_eq!(registration.health_check_url(), "http://localhost:8080/health");
    }

    #[test]
    fn explicit_ip_is_not_substituted() {
        let mut registration = ServiceRegistration::new("svc", "svc-1", 8080);
        registration.ip = "192.168.1.20".to_string();

        assert!(!registration.apply_host_ip(Some("10.0.0.7")));
        assert_eq!(registration.ip, "192.168.1.20");
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(ServiceRegistration::new("svc", "svc-1", 8080).validate().is_ok());
    }

    #[test]
    fn validate_rejects_malformed_fields() {
        let base = ServiceRegistration::new("svc", "svc-1", 8080);

        let cases: [fn(&mut ServiceRegistration); 8] = [
            |r| r.service_id = String::new(),
            |r| r.service_name = " ".to_string(),
            |r| r.port = 0,
            |r| r.protocol = "ht tp".to_string(),
            |r| r.protocol = "1http".to_string(),
            |r| r.ip = "host/path".to_string(),
            |r| r.ip = "user@host".to_string(),
            |r| r.health_path = "health".to_string(),
        ];

        for mutate in cases {
            let mut registration = base.clone();
            mutate(&mut registration);
            assert!(
                matches!(
                    registration.validate(),
                    Err(RegistryError::InvalidRegistration(_))
                ),
                "expected rejection for {registration:?}"
            );
        }
    }

    #[test]
    fn agent_registration_carries_health_check() {
        let mut registration = ServiceRegistration::new("svc", "svc-1", 8080);
        registration.tags = vec!["primary".to_string(), "v2".to_string()];
        registration.skip_tls_verify = false;

        let agent = registration.to_agent_registration();
        assert_eq!(agent.id, "svc-1");
        assert_eq!(agent.name, "svc");
        assert_eq!(agent.tags, vec!["primary", "v2"]);
        assert_eq!(agent.port, 8080);
        assert_eq!(agent.check.http, "http://localhost:8080/health");
        assert_eq!(agent.check.interval, "10s");
        assert_eq!(agent.check.timeout, "5s");
        assert_eq!(agent.check.status, "passing");
        assert!(!agent.check.tls_skip_verify);
    }

    #[test]
    fn deserializes_with_file_keys_and_defaults() {
        let registration: ServiceRegistration = toml::from_str(
            r#"
            id = "svc-1"
            name = "svc"
            port = 9000
            tags = ["a"]
            consulUrl = "consul:8500"
            "#,
        )
        .unwrap();

        assert_eq!(registration.service_id, "svc-1");
        assert_eq!(registration.port, 9000);
        assert_eq!(registration.tags, vec!["a"]);
        assert_eq!(registration.registry_url, "consul:8500");
        assert_eq!(registration.protocol, "http");
        assert_eq!(registration.health_path, "/health");
        assert!(registration.skip_tls_verify);
        assert!(!registration.registered);
    }
}
