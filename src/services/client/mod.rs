pub mod config;
pub mod consul;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use consul::*;
pub use error::*;
pub use traits::*;
pub use types::*;
