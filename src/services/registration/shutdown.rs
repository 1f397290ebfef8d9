use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// 进程正常退出码
pub const EXIT_SUCCESS: i32 = 0;

/// 触发关闭的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    Triggered,
}

impl ShutdownReason {
    /// 不经过注销直接退出时的退出码，信号为 128 + 信号值
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::Interrupt => 130,
            ShutdownReason::Terminate => 143,
            ShutdownReason::Triggered => EXIT_SUCCESS,
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Interrupt => write!(f, "interrupt"),
            ShutdownReason::Terminate => write!(f, "terminate"),
            ShutdownReason::Triggered => write!(f, "triggered"),
        }
    }
}

/// 自动注销任务等待的关闭事件
#[derive(Debug, Clone, Default)]
pub enum ShutdownTrigger {
    /// SIGTERM 或 Ctrl-C
    #[default]
    OsSignals,
    /// 由调用方取消令牌触发，测试中用来代替系统信号
    Token(CancellationToken),
}

impl ShutdownTrigger {
    /// 阻塞直到收到一次关闭事件
    pub async fn wait(&self) -> ShutdownReason {
        match self {
            ShutdownTrigger::OsSignals => wait_for_os_signal().await,
            ShutdownTrigger::Token(token) => {
                token.cancelled().await;
                ShutdownReason::Triggered
            }
        }
    }
}

async fn wait_for_os_signal() -> ShutdownReason {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => ShutdownReason::Interrupt,
        _ = terminate => ShutdownReason::Terminate,
    }
}

/// 注销完成后结束进程的回调
#[derive(Clone)]
pub struct ExitHandler(Arc<dyn Fn(i32) + Send + Sync>);

impl ExitHandler {
    pub fn new(f: impl Fn(i32) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn exit(&self, code: i32) {
        (self.0)(code)
    }
}

impl Default for ExitHandler {
    fn default() -> Self {
        Self::new(|code| std::process::exit(code))
    }
}

impl fmt::Debug for ExitHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExitHandler").finish_non_exhaustive()
    }
}
