//! On-disk layout of a market namespace.

use std::path::{Path, PathBuf};

use dirs::home_dir;
use extmarket_schema::Taxonomy;

/// Environment variable overriding the base directory namespaces live under.
pub const HOME_ENV: &str = "EXTMARKET_HOME";

/// Suffix of the shared namespace holding the install toolchain.
pub const BIN_SUFFIX: &str = "BIN";

/// Default namespace suffix.
pub const DEFAULT_SUFFIX: &str = "UNIVERSAL";

/// Returns the base directory, or None if the user's home cannot be resolved.
pub fn try_market_base() -> Option<PathBuf> {
    if let Some(val) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(val));
    }
    home_dir()
}

/// Config file path: `<base>/.extmarket/config.toml`
pub fn config_path(base: &Path) -> PathBuf {
    base.join(".extmarket").join("config.toml")
}

/// One isolated install root, addressed by a suffix.
///
/// Layout under `<base>/.extmarket_<SUFFIX>`:
/// - `installed-packages.json` (state file)
/// - `Project/<parent>/<child>@<version>/`
/// - `Plugin/<parent>/<child>@<version>/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    base: PathBuf,
    suffix: String,
}

impl Namespace {
    /// Namespace `suffix` under `base`.
    pub fn new(base: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            suffix: suffix.into(),
        }
    }

    /// Namespace under the default base directory.
    pub fn from_env(suffix: impl Into<String>) -> Option<Self> {
        try_market_base().map(|base| Self::new(base, suffix))
    }

    /// Namespace suffix.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Base directory the namespace root lives in.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Namespace root: `<base>/.extmarket_<SUFFIX>`
    pub fn root(&self) -> PathBuf {
        self.base.join(format!(".extmarket_{}", self.suffix))
    }

    /// State file: `<root>/installed-packages.json`
    pub fn state_file(&self) -> PathBuf {
        self.root().join("installed-packages.json")
    }

    /// `<root>/Project` or `<root>/Plugin`
    pub fn taxonomy_dir(&self, taxonomy: Taxonomy) -> PathBuf {
        self.root().join(taxonomy.as_str())
    }

    /// Working directory of one unit, relative to the namespace root.
    pub fn unit_subdir(taxonomy: Taxonomy, parent: &str, child: &str, version: &str) -> PathBuf {
        Path::new(taxonomy.as_str())
            .join(parent)
            .join(format!("{child}@{version}"))
    }

    /// Resolve a possibly relative directory against the namespace root.
    pub fn resolve(&self, dir: &Path) -> PathBuf {
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.root().join(dir)
        }
    }

    /// The shared toolchain namespace next to this one.
    pub fn bin(&self) -> Self {
        Self::new(self.base.clone(), BIN_SUFFIX)
    }

    /// Toolchain directory: `<base>/.extmarket_BIN/bin`
    pub fn toolchain_dir(&self) -> PathBuf {
        self.bin().root().join("bin")
    }
}

/// Manifest an install tool leaves behind for `name` inside a unit directory.
pub fn installed_manifest_path(unit_dir: &Path, name: &str) -> PathBuf {
    unit_dir.join("node_modules").join(name).join("package.json")
}

/// Extract the filename from a URL, ignoring any query string.
pub fn filename_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or("")
}
