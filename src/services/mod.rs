pub mod client;
pub mod registration;

pub use client::{ConsulClient, ConsulConnector, RegistryClient, RegistryConnector, RegistryError};
pub use registration::{RegistrationManager, ServiceRegistration, ShutdownTrigger};
