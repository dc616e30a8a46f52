pub mod config;
pub mod logging;
pub mod paths;

pub const APP_NAME: &str = "portico";

pub use config::{ConfigError, PorticoConfig};
