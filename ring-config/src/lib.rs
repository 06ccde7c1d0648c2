//! Shared TOML config loading, pidfile management, and process control used
//! by both the `ring-master` and `ring-minion` binaries.

pub mod error;
pub mod loader;
pub mod pidfile;
pub mod process;

pub use error::{ConfigError, Result};
pub use loader::load;
pub use pidfile::PidFile;
