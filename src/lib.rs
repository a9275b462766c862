//! wsbus demo application - Main Library
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI)
//! - **config**: YAML + environment configuration
//! - **logging**: tracing subscriber setup
//! - **wsbus**: WebSocket messaging client (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use wsbus_app::bin_common::{load_config_from_env, ConfigType};
//! use wsbus_app::config::AppConfig;
//! ```

// Re-export workspace libraries for convenience
pub use wsbus;

pub mod config;
pub mod logging;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
}
