//! Service registration module
//!
//! - `types`: 注册信息与健康检查地址
//! - `manager`: 注册/注销生命周期
//! - `shutdown`: 关闭信号与进程退出

pub mod manager;
pub mod shutdown;
pub mod types;

pub use manager::{HOST_IP_ENV, RegistrationManager};
pub use shutdown::{ExitHandler, ShutdownReason, ShutdownTrigger};
pub use types::ServiceRegistration;
