//! gNB Application Layer
//!
//! Configuration loading and validation for the gNB binary.

pub mod config_loader;

pub use config_loader::{
    load_and_validate_gnb_config, load_gnb_config, load_gnb_config_from_str, validate_gnb_config,
    ConfigError, ConfigValidationError,
};
