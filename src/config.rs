use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::services::client::RegistryClientConfig;
use crate::services::registration::ServiceRegistration;

pub const ENV_PREFIX: &str = "REGISTRAR_";
pub const CONFIG_PATH_ENV: &str = "REGISTRAR_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 配置加载错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub service: ServiceRegistration,
    #[serde(default)]
    pub registry: RegistryClientConfig,
    #[serde(default = "default_auto_deregister")]
    pub auto_deregister: bool,
}

fn default_auto_deregister() -> bool {
    true
}

// REGISTRAR_* 环境变量
#[derive(Debug, Deserialize)]
struct EnvConfig {
    service_name: String,
    service_id: Option<String>,
    port: u16,
    protocol: Option<String>,
    ip: Option<String>,
    health_path: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    registry_url: Option<String>,
    skip_tls_verify: Option<bool>,
    token: Option<String>,
    request_timeout_secs: Option<u64>,
    #[serde(default = "default_auto_deregister")]
    auto_deregister: bool,
}

impl From<EnvConfig> for Config {
    fn from(env: EnvConfig) -> Self {
        let mut service = match env.service_id {
            Some(id) => ServiceRegistration::new(env.service_name, id, env.port),
            None => ServiceRegistration::with_generated_id(env.service_name, env.port),
        };
        if let Some(protocol) = env.protocol {
            service.protocol = protocol;
        }
        if let Some(ip) = env.ip {
            service.ip = ip;
        }
        if let Some(health_path) = env.health_path {
            service.health_path = health_path;
        }
        if let Some(registry_url) = env.registry_url {
            service.registry_url = registry_url;
        }
        if let Some(skip_tls_verify) = env.skip_tls_verify {
            service.skip_tls_verify = skip_tls_verify;
        }
        service.tags = env.tags;

        Config {
            service,
            registry: RegistryClientConfig {
                token: env.token,
                request_timeout_secs: env.request_timeout_secs,
            },
            auto_deregister: env.auto_deregister,
        }
    }
}

impl Config {
    /// 加载配置：先读取 .env，配置文件存在时使用文件，否则读取环境变量
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!(error = %e, "No .env file loaded");
        }

        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        if Path::new(&path).exists() {
            tracing::info!(path = %path, "Loading configuration from file");
            return Self::from_file(&path);
        }

        tracing::info!("Loading configuration from environment");
        Ok(envy::prefixed(ENV_PREFIX).from_env::<EnvConfig>()?.into())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&config_str)
    }

    pub fn from_toml(config_str: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(config_str)?;
        Ok(config)
    }

    /// 从键值对读取 REGISTRAR_* 配置
    pub fn from_env_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::prefixed(ENV_PREFIX).from_iter::<_, EnvConfig>(vars)?.into())
    }
}
