pub mod completions;
pub mod install;
pub mod list;
pub mod owner;
pub mod reset;
pub mod search;
pub mod seed;
pub mod toggle;
pub mod uninstall;

use anyhow::{Context, Result};
use extmarket_core::{MarketConfig, PackageManager};

use crate::GlobalArgs;

/// Configuration after file, environment and command-line overrides.
pub fn load_config(global: &GlobalArgs) -> Result<MarketConfig> {
    let mut config =
        MarketConfig::load(global.config.as_deref()).context("Failed to load configuration")?;
    if let Some(namespace) = &global.namespace {
        config.namespace.clone_from(namespace);
    }
    if global.ignore_whitelist {
        config.ignore_whitelist = true;
    }
    Ok(config)
}

/// Build the package manager for this invocation.
pub fn open_manager(global: &GlobalArgs) -> Result<PackageManager> {
    let config = load_config(global)?;
    tracing::debug!("Using namespace {}", config.namespace);
    PackageManager::from_config(config).context("Failed to initialise the package manager")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "namespace = \"FROM_FILE\"\nkeyword = \"ide-ext\"\n").unwrap();

        let global = GlobalArgs {
            config: Some(path),
            namespace: Some("FROM_FLAG".into()),
            ignore_whitelist: true,
            ..GlobalArgs::default()
        };
        let config = load_config(&global).unwrap();
        assert_eq!(config.namespace, "FROM_FLAG");
        assert_eq!(config.keyword, "ide-ext");
        assert!(config.ignore_whitelist);
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let global = GlobalArgs {
            config: Some("/nonexistent/extm.toml".into()),
            ..GlobalArgs::default()
        };
        assert!(load_config(&global).is_err());
    }
}
