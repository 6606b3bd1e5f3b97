//! Market configuration.
//!
//! Loaded from `<base>/.extmarket/config.toml` when present, then overridden
//! by `EXTMARKET_*` environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::paths::{self, DEFAULT_SUFFIX};

/// Set to a non-empty value to skip allow-list filtering.
pub const IGNORE_WHITELIST_ENV: &str = "EXTMARKET_IGNORE_WHITELIST";
/// Overrides the allow-list location.
pub const WHITELIST_URL_ENV: &str = "EXTMARKET_WHITELIST_URL";

/// Market settings, loaded from TOML with environment overrides on top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Catalog search keyword.
    pub keyword: String,
    /// Namespace suffix.
    pub namespace: String,
    /// Base directory override; `EXTMARKET_HOME` or the home directory otherwise.
    pub home: Option<PathBuf>,
    /// Allow-list location; empty disables filtering.
    pub whitelist_url: String,
    /// Show the full catalog regardless of the allow-list.
    pub ignore_whitelist: bool,
    /// Registry mirrors.
    pub registries: Registries,
    /// Probed once to classify the network; empty means "public".
    pub probe_url: String,
    /// Network probe timeout in milliseconds.
    pub probe_timeout_ms: u64,
    /// Runtime and install tool sources.
    pub toolchain: ToolchainConfig,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            keyword: "extmarket".to_string(),
            namespace: DEFAULT_SUFFIX.to_string(),
            home: None,
            whitelist_url: String::new(),
            ignore_whitelist: false,
            registries: Registries::default(),
            probe_url: String::new(),
            probe_timeout_ms: 1000,
            toolchain: ToolchainConfig::default(),
        }
    }
}

/// Registry mirrors, picked by network classification.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Registries {
    /// Used on a restricted network.
    pub internal: Mirror,
    /// Used everywhere else.
    pub public: Mirror,
}

impl Registries {
    /// The mirror for the classified network. An unconfigured internal
    /// mirror falls back to the public one.
    pub fn select(&self, restricted: bool) -> &Mirror {
        if restricted && !self.internal.registry.is_empty() {
            &self.internal
        } else {
            &self.public
        }
    }
}

/// One registry mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mirror {
    /// Registry base URL; package documents live at `<registry>/<name>`.
    pub registry: String,
    /// Keyword search URL prefix; the keyword is appended.
    pub search: String,
}

impl Default for Mirror {
    fn default() -> Self {
        Self {
            registry: "https://registry.npmmirror.com".to_string(),
            search: "https://npmmirror.com/browse/keyword/".to_string(),
        }
    }
}

/// Where the runtime and install tool come from, and where their binaries
/// end up relative to the toolchain directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Runtime archive location.
    pub runtime_url: String,
    /// Runtime executable, relative to the toolchain directory.
    pub runtime_exe: PathBuf,
    /// Separate install tool archive; empty when the runtime ships the tool.
    pub tool_url: String,
    /// Install tool executable, relative to the toolchain directory.
    pub tool_exe: PathBuf,
}

const NODE_VERSION: &str = "v20.11.1";

impl Default for ToolchainConfig {
    fn default() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            "windows" => "win",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "x64",
            "aarch64" => "arm64",
            other => other,
        };
        let dist = format!("node-{NODE_VERSION}-{os}-{arch}");

        if cfg!(windows) {
            Self {
                runtime_url: format!("https://nodejs.org/dist/{NODE_VERSION}/{dist}.zip"),
                runtime_exe: Path::new(&dist).join("node.exe"),
                tool_url: String::new(),
                tool_exe: Path::new(&dist).join("npm.cmd"),
            }
        } else {
            Self {
                runtime_url: format!("https://nodejs.org/dist/{NODE_VERSION}/{dist}.tar.gz"),
                runtime_exe: Path::new(&dist).join("bin").join("node"),
                tool_url: String::new(),
                tool_exe: Path::new(&dist).join("bin").join("npm"),
            }
        }
    }
}

impl MarketConfig {
    /// Load from `path`, or from the default location when `None`. A missing
    /// default file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path.map(Path::to_path_buf);
        let candidate = explicit
            .clone()
            .or_else(|| paths::try_market_base().map(|b| paths::config_path(&b)));

        let mut config = match candidate {
            Some(p) if explicit.is_some() || p.exists() => Self::from_file(&p)?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML config file without applying environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(home) = lookup(paths::HOME_ENV).filter(|v| !v.is_empty()) {
            self.home = Some(PathBuf::from(home));
        }
        if lookup(IGNORE_WHITELIST_ENV).is_some_and(|v| !v.is_empty()) {
            self.ignore_whitelist = true;
        }
        if let Some(url) = lookup(WHITELIST_URL_ENV) {
            self.whitelist_url = url;
        }
    }

    /// Base directory namespaces live under.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.home.clone().or_else(paths::try_market_base)
    }
}
