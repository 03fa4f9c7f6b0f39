use crate::cli::CheckConfigArgs;
use crate::config::{self, PoolConfig};
use crate::error::{PoolError, Result};

/// Load and validate the configuration and print the effective values.
pub async fn run_check_config(args: CheckConfigArgs) -> Result<()> {
    let path = config::resolve_path(args.config);
    let config = PoolConfig::load(&path)?;

    if path.exists() {
        eprintln!("companion-pool: {} is valid", path.display());
    } else {
        eprintln!(
            "companion-pool: {} not found, using defaults",
            path.display()
        );
    }

    let rendered = serde_yaml::to_string(&config).map_err(|e| PoolError::InvalidConfig {
        reason: e.to_string(),
    })?;
    print!("{}", rendered);
    Ok(())
}
