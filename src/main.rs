use std::sync::Arc;

use consul_registrar::config::Config;
use consul_registrar::services::{ConsulConnector, RegistrationManager, ShutdownTrigger};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    tracing::info!(
        service_name = %config.service.service_name,
        service_id = %config.service.service_id,
        registry_url = %config.service.registry_url,
        "Starting registrar"
    );

    let connector = Arc::new(ConsulConnector::new(config.registry.clone()));
    let manager = RegistrationManager::with_connector(config.service.clone(), connector);
    manager.register(config.auto_deregister).await?;

    if config.auto_deregister {
        // 后台任务负责注销并退出进程
        manager.wait_for_shutdown_hook().await;
    } else {
        ShutdownTrigger::OsSignals.wait().await;
        manager.deregister().await?;
    }

    Ok(())
}
