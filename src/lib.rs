//! Medical-supply live dashboard - Main Library
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, logging, runners)
//! - **medsupply**: Dashboard domain (re-exported from workspace)
//! - **livesocket**: Realtime channel library (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use medsupply_live::bin_common::{load_config_from_env, ConfigType};
//! use medsupply_live::medsupply::DashboardConfig;
//! ```

// Re-export workspace libraries for convenience
pub use livesocket;
pub use medsupply;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod logging;
    pub mod runner;

    pub use cli::{config_type_from_args, load_config_from_env, parse_args, ConfigType};
    pub use logging::{build_env_filter, init_logging_with_level};
    pub use runner::{BinaryRunner, RunConfig, ShutdownSignal};
}
