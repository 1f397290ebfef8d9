use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use super::shutdown::{EXIT_SUCCESS, ExitHandler, ShutdownTrigger};
use super::types::ServiceRegistration;
use crate::services::client::{ConsulConnector, RegistryConnector, RegistryError};

/// 提供外部可见主机 IP 的环境变量
pub const HOST_IP_ENV: &str = "HOST_IP";

// 主机 IP 的来源
#[derive(Debug, Clone)]
enum HostIpSource {
    Env(String),
    Fixed(Option<String>),
}

impl HostIpSource {
    fn resolve(&self) -> Option<String> {
        match self {
            HostIpSource::Env(name) => std::env::var(name).ok(),
            HostIpSource::Fixed(value) => value.clone(),
        }
    }
}

const HOOK_WAITING: u8 = 0;
const HOOK_TRIGGERED: u8 = 1;
const HOOK_CANCELLED: u8 = 2;

// 自动注销任务及其状态
#[derive(Debug)]
struct ShutdownHook {
    handle: JoinHandle<()>,
    state: Arc<AtomicU8>,
}

impl ShutdownHook {
    fn is_waiting(&self) -> bool {
        !self.handle.is_finished() && self.state.load(Ordering::SeqCst) == HOOK_WAITING
    }

    fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::SeqCst) == HOOK_CANCELLED
    }
}

/// 服务注册生命周期管理器
#[derive(Clone)]
pub struct RegistrationManager {
    registration: Arc<Mutex<ServiceRegistration>>,
    connector: Arc<dyn RegistryConnector>,
    host_ip: HostIpSource,
    trigger: ShutdownTrigger,
    exit_handler: ExitHandler,
    task_tracker: TaskTracker,
    shutdown_hook: Arc<std::sync::Mutex<Option<ShutdownHook>>>,
    signal_fallback: Arc<std::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for RegistrationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationManager")
            .field("host_ip", &self.host_ip)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

impl RegistrationManager {
    /// 使用 Consul HTTP 客户端创建管理器
    pub fn new(registration: ServiceRegistration) -> Self {
        Self::with_connector(registration, Arc::new(ConsulConnector::default()))
    }

    pub fn with_connector(
        registration: ServiceRegistration,
        connector: Arc<dyn RegistryConnector>,
    ) -> Self {
        Self {
            registration: Arc::new(Mutex::new(registration)),
            connector,
            host_ip: HostIpSource::Env(HOST_IP_ENV.to_string()),
            trigger: ShutdownTrigger::default(),
            exit_handler: ExitHandler::default(),
            task_tracker: TaskTracker::new(),
            shutdown_hook: Arc::new(std::sync::Mutex::new(None)),
            signal_fallback: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    /// 固定主机 IP，不再读取环境变量
    pub fn with_host_ip(mut self, host_ip: Option<String>) -> Self {
        self.host_ip = HostIpSource::Fixed(host_ip);
        self
    }

    /// 从指定环境变量读取主机 IP
    pub fn with_host_ip_var(mut self, name: impl Into<String>) -> Self {
        self.host_ip = HostIpSource::Env(name.into());
        self
    }

    pub fn with_shutdown_trigger(mut self, trigger: ShutdownTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_exit_handler(mut self, exit_handler: ExitHandler) -> Self {
        self.exit_handler = exit_handler;
        self
    }

    /// 当前注册信息的快照
    pub async fn registration(&self) -> ServiceRegistration {
        self.registration.lock().await.clone()
    }

    pub async fn is_registered(&self) -> bool {
        self.registration.lock().await.registered
    }

    /// 向注册中心注册服务
    ///
    /// `auto_deregister` 为 true 时启动后台任务，收到关闭信号后注销服务并退出进程。
    /// 网络请求期间不持有注册信息的锁。
    pub async fn register(&self, auto_deregister: bool) -> Result<(), RegistryError> {
        let host_ip = self.host_ip.resolve();

        let (request, registry_url) = {
            let mut registration = self.registration.lock().await;

            if registration.apply_host_ip(host_ip.as_deref()) {
                tracing::info!(
                    service_id = %registration.service_id,
                    ip = %registration.ip,
                    "Substituted host ip into health check address"
                );
            }

            if let Err(e) = registration.validate() {
                tracing::error!(
                    service_id = %registration.service_id,
                    error = %e,
                    "Refusing to register invalid service"
                );
                return Err(e);
            }

            (
                registration.to_agent_registration(),
                registration.registry_url.clone(),
            )
        };

        let result = match self.connector.connect(&registry_url) {
            Ok(client) => client.register_service(&request).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::error!(
                registry_url = %registry_url,
                service_id = %request.id,
                error = %e,
                "Error registering with registry"
            );
            return Err(e);
        }

        self.registration.lock().await.registered = true;
        tracing::info!(
            registry_url = %registry_url,
            service_id = %request.id,
            health_check = %request.check.http,
            "Registered service"
        );

        if auto_deregister {
            self.spawn_shutdown_hook();
        }

        Ok(())
    }

    /// 从注册中心注销服务，未注册时直接返回成功
    pub async fn deregister(&self) -> Result<(), RegistryError> {
        let (service_id, registry_url) = {
            let registration = self.registration.lock().await;
            if !registration.registered {
                tracing::debug!(
                    service_id = %registration.service_id,
                    "Service not registered, skipping deregistration"
                );
                return Ok(());
            }
            (
                registration.service_id.clone(),
                registration.registry_url.clone(),
            )
        };

        tracing::info!(
            registry_url = %registry_url,
            service_id = %service_id,
            "Attempting deregistration"
        );

        let result = match self.connector.connect(&registry_url) {
            Ok(client) => client.deregister_service(&service_id).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.registration.lock().await.registered = false;
                tracing::info!(
                    registry_url = %registry_url,
                    service_id = %service_id,
                    "Successfully deregistered"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    registry_url = %registry_url,
                    service_id = %service_id,
                    error = %e,
                    "Error deregistering from registry"
                );
                Err(e)
            }
        }
    }

    /// 自动注销任务是否仍在等待信号
    pub fn is_auto_deregister_active(&self) -> bool {
        self.shutdown_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|hook| hook.is_waiting())
    }

    /// 取消尚未触发的自动注销任务
    ///
    /// 信号已到达时任务必须跑完，返回 false。取消后改由后备任务处理
    /// SIGTERM/Ctrl-C：不注销，直接按信号退出进程。
    pub fn cancel_auto_deregister(&self) -> bool {
        let mut slot = self
            .shutdown_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(hook) = slot.as_ref() else {
            return false;
        };
        if hook.handle.is_finished() {
            return false;
        }
        if hook
            .state
            .compare_exchange(HOOK_WAITING, HOOK_CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::info!("Shutdown already triggered, auto-deregister cannot be cancelled");
            return false;
        }

        if let Some(hook) = slot.take() {
            hook.handle.abort();
        }
        drop(slot);

        self.spawn_signal_fallback();
        tracing::info!("Cancelled auto-deregister task");
        true
    }

    /// 等待自动注销任务结束
    pub async fn wait_for_shutdown_hook(&self) {
        self.task_tracker.close();
        self.task_tracker.wait().await;
    }

    // 同一时间只保留一个自动注销任务
    fn spawn_shutdown_hook(&self) {
        let mut slot = self
            .shutdown_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot
            .as_ref()
            .is_some_and(|hook| !hook.handle.is_finished() && !hook.is_cancelled())
        {
            tracing::debug!("Auto-deregister task already running");
            return;
        }

        // 新的自动注销任务接管信号
        if let Some(fallback) = self
            .signal_fallback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            fallback.abort();
        }

        let state = Arc::new(AtomicU8::new(HOOK_WAITING));
        let manager = self.clone();
        let hook_state = state.clone();
        let handle = self
            .task_tracker
            .spawn(async move { manager.run_shutdown_hook(hook_state).await });
        *slot = Some(ShutdownHook { handle, state });
    }

    async fn run_shutdown_hook(self, state: Arc<AtomicU8>) {
        let reason = self.trigger.wait().await;
        if state
            .compare_exchange(HOOK_WAITING, HOOK_TRIGGERED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        tracing::info!(reason = %reason, "Received shutdown signal, deregistering service");

        if let Err(e) = self.deregister().await {
            tracing::warn!(error = %e, "Deregistration on shutdown failed, exiting anyway");
        }

        self.exit_handler.exit(EXIT_SUCCESS);
    }

    fn spawn_signal_fallback(&self) {
        let trigger = self.trigger.clone();
        let exit_handler = self.exit_handler.clone();
        let handle = self.task_tracker.spawn(async move {
            let reason = trigger.wait().await;
            tracing::warn!(
                reason = %reason,
                "Received shutdown signal with auto-deregister cancelled, exiting without deregistration"
            );
            exit_handler.exit(reason.exit_code());
        });

        let previous = self
            .signal_fallback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}
