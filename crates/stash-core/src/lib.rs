pub mod config;
pub mod error;
pub mod logging;

pub use config::{CryptoConfig, LoggingConfig, StashConfig};
pub use error::{StashError, StashResult};
