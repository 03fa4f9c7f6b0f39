pub mod pool;

pub use pool::*;

use std::path::PathBuf;

/// Default config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "companion-pool.yml";

/// Resolve the config path: the explicit one if given, otherwise
/// `companion-pool.yml` in the current directory.
pub fn resolve_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        cwd.join(DEFAULT_CONFIG_FILE)
    })
}
